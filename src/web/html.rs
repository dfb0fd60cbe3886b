//! HTML building blocks shared by the page handlers.

use std::fmt::Write;

use crate::store::Product;

const STYLE: &str = r#"
    *, *::before, *::after { box-sizing: border-box; margin: 0; padding: 0; }
    body {
      font-family: system-ui, -apple-system, sans-serif;
      background: #0f0f0f; color: #e0e0e0; line-height: 1.5;
    }
    header { padding: 1rem 2rem; border-bottom: 1px solid #333; display: flex; gap: 1.5rem; align-items: center; }
    header a { color: #c0c0e0; text-decoration: none; }
    main { max-width: 1100px; margin: 0 auto; padding: 2rem; }
    h1 { font-size: 1.5rem; margin-bottom: 1rem; }
    h2 { font-size: 1.15rem; margin: 1.5rem 0 0.75rem; }
    .grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(200px, 1fr)); gap: 1rem; }
    .card { padding: 1rem; border: 1px solid #333; border-radius: 12px; background: #1a1a1a; }
    .card img { max-width: 100%; max-height: 140px; display: block; margin-bottom: 0.5rem; }
    .card a { color: #e0e0e0; text-decoration: none; }
    .muted { color: #888; font-size: 0.9rem; }
    .pager { margin-top: 1.5rem; display: flex; gap: 1rem; }
    .pager a, button {
      padding: 0.35rem 1rem; border-radius: 8px; border: 0;
      background: #2a2a3a; color: #c0c0e0; text-decoration: none; cursor: pointer;
    }
    table { border-collapse: collapse; width: 100%; }
    th, td { border-bottom: 1px solid #333; padding: 0.4rem 0.6rem; text-align: left; }
    input[type=search] { padding: 0.4rem 0.8rem; border-radius: 8px; border: 1px solid #333; background: #1a1a1a; color: #e0e0e0; }
"#;

/// Escape text for use in element content and quoted attribute values.
pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

/// Percent-encode a query-string value.
pub(crate) fn url_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            let _ = write!(out, "%{b:02X}");
        }
    }
    out
}

pub(crate) fn layout(app_name: &str, title: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>{title} · {app}</title>
  <style>{STYLE}</style>
</head>
<body>
  <header>
    <a href="/"><strong>{app}</strong></a>
    <form action="/search/" method="get"><input type="search" name="q" placeholder="Search products" /></form>
    <a href="/random/">Random product</a>
    <a href="/analytics/">Analytics</a>
  </header>
  <main>
{body}
  </main>
</body>
</html>
"#,
        title = escape(title),
        app = escape(app_name),
    )
}

pub(crate) fn format_price(price: Option<f64>) -> String {
    match price {
        Some(p) => format!("${p:.2}"),
        None => "Price unavailable".to_string(),
    }
}

pub(crate) fn product_href(product_id: &str) -> String {
    format!("/product/{}/", url_encode(product_id))
}

/// A product tile; `extra` is pre-rendered HTML appended inside the card.
pub(crate) fn product_card(product: &Product, extra: &str) -> String {
    let image = if product.image_url.is_empty() {
        String::new()
    } else {
        format!(r#"<img src="{}" alt="" loading="lazy" />"#, escape(&product.image_url))
    };
    format!(
        r#"<div class="card">{image}<a href="{href}">{name}</a><div class="muted">{price}</div>{extra}</div>"#,
        href = escape(&product_href(&product.product_id)),
        name = escape(&product.name),
        price = escape(&format_price(product.price)),
    )
}

/// Previous / next links for a listing; `base` already carries any other
/// query parameters and ends in `?` or `&`.
pub(crate) fn pager(base: &str, number: usize, total_pages: usize) -> String {
    let mut out = String::from(r#"<div class="pager">"#);
    if number > 1 {
        let _ = write!(out, r#"<a href="{}page={}">&larr; Previous</a>"#, escape(base), number - 1);
    }
    let _ = write!(out, r#"<span class="muted">Page {number} of {total_pages}</span>"#);
    if number < total_pages {
        let _ = write!(out, r#"<a href="{}page={}">Next &rarr;</a>"#, escape(base), number + 1);
    }
    out.push_str("</div>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape(r#"<script>alert("x & 'y'")</script>"#),
            "&lt;script&gt;alert(&quot;x &amp; &#x27;y&#x27;&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn url_encoding() {
        assert_eq!(url_encode("pots & pans"), "pots%20%26%20pans");
        assert_eq!(url_encode("B00-X_1.~"), "B00-X_1.~");
        assert_eq!(url_encode("é"), "%C3%A9");
    }

    #[test]
    fn pager_links_only_where_pages_exist() {
        let first = pager("/search/?q=pan&", 1, 2);
        assert!(!first.contains("Previous"));
        assert!(first.contains("page=2"));
        let only = pager("/search/?", 1, 1);
        assert!(!only.contains("<a"));
    }

    #[test]
    fn price_formatting() {
        assert_eq!(format_price(Some(5.0)), "$5.00");
        assert_eq!(format_price(None), "Price unavailable");
    }
}
