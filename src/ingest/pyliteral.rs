//! Parser for Python literal expressions as written by `repr()` of
//! dict/list/str/number values, producing `serde_json::Value`.
//!
//! The raw metadata dump stores one Python dict per line (single-quoted
//! strings, `True`/`False`/`None`, tuples). JSON literals (`true`, `null`,
//! double-quoted strings) are accepted too, so strict JSON lines parse
//! through the same path.

use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("{message} at offset {offset}")]
pub struct LiteralError {
    pub offset: usize,
    pub message: String,
}

/// Deepest container nesting accepted, matching serde_json's own limit.
pub const MAX_DEPTH: usize = 128;

/// Parse a single literal; trailing non-whitespace is an error.
pub fn parse(input: &str) -> Result<Value, LiteralError> {
    let mut p = Parser { src: input.as_bytes(), text: input, pos: 0, depth: 0 };
    let value = p.value()?;
    p.skip_ws();
    if p.pos != p.src.len() {
        return Err(p.err("trailing characters"));
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a [u8],
    text: &'a str,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn err(&self, message: impl Into<String>) -> LiteralError {
        LiteralError { offset: self.pos, message: message.into() }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, b: u8) -> Result<(), LiteralError> {
        self.skip_ws();
        if self.peek() == Some(b) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.err(format!("expected '{}'", b as char)))
        }
    }

    fn value(&mut self) -> Result<Value, LiteralError> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.err("unexpected end of input")),
            Some(b'{') => self.nested(Self::dict),
            Some(b'[') => self.nested(|p| p.sequence(b'[', b']')),
            Some(b'(') => self.nested(|p| p.sequence(b'(', b')')),
            Some(b'\'' | b'"') => self.string(false).map(Value::String),
            Some(b'-' | b'+' | b'.' | b'0'..=b'9') => self.number(),
            Some(c) if c.is_ascii_alphabetic() => self.word(),
            Some(c) => Err(self.err(format!("unexpected character '{}'", c as char))),
        }
    }

    fn nested(
        &mut self,
        container: impl FnOnce(&mut Self) -> Result<Value, LiteralError>,
    ) -> Result<Value, LiteralError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.err(format!("nesting deeper than {MAX_DEPTH}")));
        }
        self.depth += 1;
        let value = container(self)?;
        self.depth -= 1;
        Ok(value)
    }

    fn dict(&mut self) -> Result<Value, LiteralError> {
        self.expect(b'{')?;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(b'}') {
                self.pos += 1;
                return Ok(Value::Object(map));
            }
            let key = match self.value()? {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => if b { "True".into() } else { "False".into() },
                Value::Null => "None".into(),
                _ => return Err(self.err("unhashable dict key")),
            };
            self.expect(b':')?;
            let value = self.value()?;
            map.insert(key, value);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {}
                _ => return Err(self.err("expected ',' or '}'")),
            }
        }
    }

    fn sequence(&mut self, open: u8, close: u8) -> Result<Value, LiteralError> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(Value::Array(items));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(c) if c == close => {}
                _ => return Err(self.err(format!("expected ',' or '{}'", close as char))),
            }
        }
    }

    fn word(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
            self.pos += 1;
        }
        let word = &self.text[start..self.pos];
        match word {
            "True" | "true" => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            "None" | "null" => Ok(Value::Null),
            // String prefixes: u'..', r'..', b'..' and combinations.
            w if matches!(self.peek(), Some(b'\'' | b'"'))
                && w.len() <= 2
                && w.chars().all(|c| matches!(c.to_ascii_lowercase(), 'u' | 'r' | 'b')) =>
            {
                let raw = w.chars().any(|c| c.eq_ignore_ascii_case(&'r'));
                self.string(raw).map(Value::String)
            }
            _ => {
                self.pos = start;
                Err(self.err(format!("unknown identifier '{word}'")))
            }
        }
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'-' | b'+')) {
            self.pos += 1;
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                b'0'..=b'9' | b'_' => {}
                b'.' => is_float = true,
                b'e' | b'E' => {
                    is_float = true;
                    if matches!(self.src.get(self.pos + 1), Some(b'-' | b'+')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
            self.pos += 1;
        }
        let literal: String = self.text[start..self.pos].chars().filter(|c| *c != '_').collect();
        let literal = literal.strip_prefix('+').unwrap_or(&literal);

        if !is_float {
            // Integers outside i64/u64 would lose digits as f64.
            return if let Ok(i) = literal.parse::<i64>() {
                Ok(Value::Number(i.into()))
            } else if let Ok(u) = literal.parse::<u64>() {
                Ok(Value::Number(u.into()))
            } else {
                Err(LiteralError { offset: start, message: format!("bad integer '{literal}'") })
            };
        }
        literal
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| LiteralError { offset: start, message: format!("bad number '{literal}'") })
    }

    fn string(&mut self, raw: bool) -> Result<String, LiteralError> {
        let quote = self.peek().ok_or_else(|| self.err("expected string"))?;
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        loop {
            let rest = &self.text[self.pos..];
            let Some(ch) = rest.chars().next() else {
                return Err(LiteralError { offset: start, message: "unterminated string".into() });
            };
            self.pos += ch.len_utf8();
            match ch {
                c if c as u32 == quote as u32 => return Ok(out),
                '\\' if raw => {
                    // Raw strings keep the backslash but still cannot end on an escaped quote.
                    out.push('\\');
                    if let Some(next) = self.text[self.pos..].chars().next() {
                        out.push(next);
                        self.pos += next.len_utf8();
                    }
                }
                '\\' => self.escape(&mut out)?,
                c => out.push(c),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), LiteralError> {
        let Some(ch) = self.text[self.pos..].chars().next() else {
            return Err(self.err("dangling escape"));
        };
        self.pos += ch.len_utf8();
        match ch {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0C}'),
            'v' => out.push('\u{0B}'),
            '\\' | '\'' | '"' | '/' => out.push(ch),
            '\n' => {}
            'x' => {
                let c = self.hex_char(2)?;
                out.push(c);
            }
            'u' => {
                let code = self.hex(4)?;
                if (0xD800..0xDC00).contains(&code) && self.text[self.pos..].starts_with("\\u") {
                    // JSON surrogate pair.
                    self.pos += 2;
                    let low = self.hex(4)?;
                    let combined = 0x10000 + ((code - 0xD800) << 10) + (low.wrapping_sub(0xDC00) & 0x3FF);
                    out.push(char::from_u32(combined).unwrap_or('\u{FFFD}'));
                } else {
                    out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                }
            }
            'U' => {
                let c = self.hex_char(8)?;
                out.push(c);
            }
            other => {
                // Python keeps unknown escapes verbatim.
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex(&mut self, digits: usize) -> Result<u32, LiteralError> {
        let end = self.pos + digits;
        let slice = self.text.get(self.pos..end).ok_or_else(|| self.err("truncated escape"))?;
        let code = u32::from_str_radix(slice, 16).map_err(|_| self.err("bad hex escape"))?;
        self.pos = end;
        Ok(code)
    }

    fn hex_char(&mut self, digits: usize) -> Result<char, LiteralError> {
        let code = self.hex(digits)?;
        Ok(char::from_u32(code).unwrap_or('\u{FFFD}'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_metadata_line() {
        let line = r#"{'asin': '0615391206', 'title': "Chef's Knife", 'price': 29.99, 'imUrl': 'http://x/y.jpg', 'categories': [['Home & Kitchen', 'Kitchen & Dining']], 'salesRank': {'Kitchen': 5}}"#;
        let v = parse(line).unwrap();
        assert_eq!(
            v,
            json!({
                "asin": "0615391206",
                "title": "Chef's Knife",
                "price": 29.99,
                "imUrl": "http://x/y.jpg",
                "categories": [["Home & Kitchen", "Kitchen & Dining"]],
                "salesRank": {"Kitchen": 5}
            })
        );
    }

    #[test]
    fn python_keywords_and_tuples() {
        assert_eq!(parse("(True, False, None, -3)").unwrap(), json!([true, false, null, -3]));
        assert_eq!(parse("[1, 2,]").unwrap(), json!([1, 2]));
        assert_eq!(parse("{1: 'a'}").unwrap(), json!({"1": "a"}));
    }

    #[test]
    fn json_lines_parse_too() {
        let line = r#"{"reviewerID": "A1", "helpful": [0, 0], "overall": 5.0, "ok": true, "x": null}"#;
        let v = parse(line).unwrap();
        assert_eq!(v["overall"], json!(5.0));
        assert_eq!(v["ok"], json!(true));
        assert_eq!(v["x"], Value::Null);
    }

    #[test]
    fn escapes_are_decoded() {
        assert_eq!(parse(r"'it\'s\n'").unwrap(), json!("it's\n"));
        assert_eq!(parse(r"'caf\xe9'").unwrap(), json!("café"));
        assert_eq!(parse(r#""\u00e9\ud83d\ude00""#).unwrap(), json!("é😀"));
        assert_eq!(parse(r"'a\qb'").unwrap(), json!("a\\qb"));
        assert_eq!(parse(r"u'unicode'").unwrap(), json!("unicode"));
        assert_eq!(parse(r"r'C:\dir'").unwrap(), json!("C:\\dir"));
    }

    #[test]
    fn multibyte_text_survives() {
        assert_eq!(parse("'Crème brûlée set'").unwrap(), json!("Crème brûlée set"));
    }

    #[test]
    fn numbers() {
        assert_eq!(parse("1e3").unwrap(), json!(1000.0));
        assert_eq!(parse("1_000").unwrap(), json!(1000));
        assert_eq!(parse("+7").unwrap(), json!(7));
    }

    #[test]
    fn errors_report_offsets() {
        let err = parse("{'a': 1").unwrap_err();
        assert_eq!(err.offset, 7);
        assert!(parse("'unterminated").is_err());
        assert!(parse("{'a': 1} extra").is_err());
        assert!(parse("nonsense").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn nesting_is_capped() {
        let ok = format!("{}{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
        assert!(parse(&ok).is_ok());

        let err = parse(&"[".repeat(200_000)).unwrap_err();
        assert_eq!(err.offset, MAX_DEPTH);
        assert!(err.message.contains("nesting"));

        let dicts = format!("{}1{}", "{'a': ".repeat(MAX_DEPTH + 1), "}".repeat(MAX_DEPTH + 1));
        assert!(parse(&dicts).is_err());
    }

    #[test]
    fn oversized_integers_are_rejected() {
        assert_eq!(parse("18446744073709551615").unwrap(), json!(u64::MAX));
        assert_eq!(parse("-9223372036854775808").unwrap(), json!(i64::MIN));
        let err = parse("{'salesRank': 123456789012345678901234567890}").unwrap_err();
        assert!(err.message.contains("bad integer"));
        assert!(parse("-").is_err());
    }
}
