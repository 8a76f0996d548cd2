// ABOUTME: Selector-based extraction helpers turning parsed HTML fragments into typed values.
// ABOUTME: Covers first-match and require-or-fail lookups, text/attribute reads and URL resolution.

//! Selector-based extraction utilities.
//!
//! Key behaviors:
//! - Invalid selectors match nothing; they never panic.
//! - Text is whitespace-normalized; empty strings count as "no value".
//! - `require_*` helpers fail with a `NotFound` error naming the page url and selector.
//! - Relative urls keep path, query and fragment; absolute urls are resolved against the
//!   source's base url.

use scraper::{ElementRef, Html};

use crate::dom::compiled::get_or_compile;
use crate::error::ParserError;

/// Normalizes whitespace in a string by collapsing runs of whitespace into single spaces.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses a full document.
pub fn parse_document(html: &str) -> Html {
    Html::parse_document(html)
}

/// All elements under `root` matching `css`, in document order.
pub fn select_all<'a>(root: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match get_or_compile(css) {
        Some(sel) => root.select(&sel).collect(),
        None => Vec::new(),
    }
}

/// First element under `root` matching `css`.
pub fn select_first<'a>(root: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let sel = get_or_compile(css)?;
    let first = root.select(&sel).next();
    first
}

/// Last element under `root` matching `css`.
pub fn select_last<'a>(root: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    select_all(root, css).pop()
}

/// First element matching `css`, or a `NotFound` error naming `page_url` and the selector.
pub fn require_first<'a>(
    root: ElementRef<'a>,
    css: &str,
    page_url: &str,
) -> Result<ElementRef<'a>, ParserError> {
    select_first(root, css).ok_or_else(|| ParserError::not_found(page_url, css))
}

/// First element matching `css` whose normalized text contains `needle` (case-insensitive).
pub fn select_containing<'a>(
    root: ElementRef<'a>,
    css: &str,
    needle: &str,
) -> Option<ElementRef<'a>> {
    let needle = needle.to_lowercase();
    select_all(root, css)
        .into_iter()
        .find(|el| text(*el).to_lowercase().contains(&needle))
}

/// The parent of `el` if it is an element.
pub fn parent_element<'a>(el: ElementRef<'a>) -> Option<ElementRef<'a>> {
    el.parent().and_then(ElementRef::wrap)
}

/// The next sibling of `el` that is an element.
pub fn next_element_sibling<'a>(el: ElementRef<'a>) -> Option<ElementRef<'a>> {
    el.next_siblings().find_map(ElementRef::wrap)
}

/// Whitespace-normalized text of `el` and its descendants.
pub fn text(el: ElementRef<'_>) -> String {
    normalize_whitespace(&el.text().collect::<String>())
}

/// Like [`text`] but `None` when empty.
pub fn text_or_none(el: ElementRef<'_>) -> Option<String> {
    Some(text(el)).filter(|t| !t.is_empty())
}

/// Whitespace-normalized text of the direct text children of `el`.
pub fn own_text(el: ElementRef<'_>) -> String {
    let raw: String = el
        .children()
        .filter_map(|node| node.value().as_text().map(|t| t.to_string()))
        .collect();
    normalize_whitespace(&raw)
}

/// Trimmed attribute value, `None` if absent or blank.
pub fn attr<'a>(el: ElementRef<'a>, name: &str) -> Option<&'a str> {
    el.value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Attribute value or a `NotFound` error.
pub fn require_attr<'a>(
    el: ElementRef<'a>,
    name: &str,
    page_url: &str,
) -> Result<&'a str, ParserError> {
    attr(el, name).ok_or_else(|| {
        ParserError::not_found(page_url, format!("{}[{}]", el.value().name(), name))
    })
}

/// Image source, preferring lazy-loading attributes over `src`.
pub fn image_src<'a>(el: ElementRef<'a>) -> Option<&'a str> {
    ["data-src", "data-lazy-src", "data-cfsrc", "data-original", "src"]
        .iter()
        .find_map(|name| attr(el, name))
        .filter(|v| !v.starts_with("data:"))
}

/// Resolves `url` against `base_url` (`scheme://domain`).
pub fn to_absolute_url(url: &str, base_url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    if let Some(rest) = url.strip_prefix("//") {
        let scheme = base_url.split("://").next().unwrap_or("https");
        return format!("{}://{}", scheme, rest);
    }
    let base = base_url.trim_end_matches('/');
    if url.starts_with('/') {
        format!("{}{}", base, url)
    } else {
        format!("{}/{}", base, url)
    }
}

/// Turns `url` into a path relative to `domain` when it points at that domain.
///
/// Urls on other hosts are returned unchanged; bare relative paths gain a leading slash.
pub fn to_relative_url(url: &str, domain: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("//") {
        let absolute = if url.starts_with("//") {
            format!("https:{}", url)
        } else {
            url.to_string()
        };
        if let Ok(parsed) = url::Url::parse(&absolute) {
            let host = parsed.host_str().unwrap_or_default();
            let host_with_port = match parsed.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            };
            if same_host(&host_with_port, domain) || same_host(host, domain) {
                let mut rel = parsed.path().to_string();
                if let Some(q) = parsed.query() {
                    rel.push('?');
                    rel.push_str(q);
                }
                if let Some(f) = parsed.fragment() {
                    rel.push('#');
                    rel.push_str(f);
                }
                return rel;
            }
        }
        return url.to_string();
    }
    if url.starts_with('/') {
        url.to_string()
    } else {
        format!("/{}", url)
    }
}

fn same_host(a: &str, b: &str) -> bool {
    a.trim_start_matches("www.")
        .eq_ignore_ascii_case(b.trim_start_matches("www."))
}

/// Attribute read as a url relative to `domain`.
pub fn attr_as_relative_url(el: ElementRef<'_>, name: &str, domain: &str) -> Option<String> {
    attr(el, name).map(|v| to_relative_url(v, domain))
}

/// Attribute read as an absolute url.
pub fn attr_as_absolute_url(el: ElementRef<'_>, name: &str, base_url: &str) -> Option<String> {
    attr(el, name).map(|v| to_absolute_url(v, base_url))
}

/// Text of every inline `<script>` element.
pub fn inline_scripts(doc: &Html) -> Vec<String> {
    select_all(doc.root_element(), "script")
        .into_iter()
        .filter(|el| el.value().attr("src").is_none())
        .map(|el| el.text().collect::<String>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_HTML: &str = r#"
        <html><body>
            <h1>  Main   Title  </h1>
            <div class="info">
                <div class="item"><span class="info-name">Author</span> <a>Jane</a><a>Joe</a></div>
                <div class="item"><b>Other names</b>: Alt One; Alt Two</div>
            </div>
            <img class="lazy" data-src="/covers/1.jpg" src="data:image/gif;base64,AA">
            <img class="plain" src="https://cdn.example.org/2.jpg">
            <a class="rel" href="https://example.org/manga/one/?p=1#top">One</a>
            <script>var imgsrcs = 'abc';</script>
            <script src="/chapter.js"></script>
        </body></html>
    "#;

    #[test]
    fn select_and_text_normalize() {
        let doc = parse_document(SAMPLE_HTML);
        let h1 = select_first(doc.root_element(), "h1").unwrap();
        assert_eq!(text(h1), "Main Title");
        assert!(select_first(doc.root_element(), "article").is_none());
        assert!(select_all(doc.root_element(), "[[[invalid").is_empty());
    }

    #[test]
    fn require_first_reports_selector() {
        let doc = parse_document(SAMPLE_HTML);
        let err = require_first(doc.root_element(), "div.missing", "https://example.org/x")
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.op, "div.missing");
        assert_eq!(err.url, "https://example.org/x");
    }

    #[test]
    fn containing_and_parent() {
        let doc = parse_document(SAMPLE_HTML);
        let label = select_containing(doc.root_element(), ".info-name", "author").unwrap();
        let parent = parent_element(label).unwrap();
        let names: Vec<String> = select_all(parent, "a").into_iter().map(text).collect();
        assert_eq!(names, vec!["Jane", "Joe"]);

        let sibling = next_element_sibling(label).unwrap();
        assert_eq!(text(sibling), "Jane");

        let other = select_containing(doc.root_element(), "b", "Other names").unwrap();
        let item = parent_element(other).unwrap();
        assert_eq!(own_text(item), ": Alt One; Alt Two");
    }

    #[test]
    fn image_src_skips_data_uris() {
        let doc = parse_document(SAMPLE_HTML);
        let lazy = select_first(doc.root_element(), "img.lazy").unwrap();
        assert_eq!(image_src(lazy), Some("/covers/1.jpg"));
        let plain = select_first(doc.root_element(), "img.plain").unwrap();
        assert_eq!(image_src(plain), Some("https://cdn.example.org/2.jpg"));
    }

    #[test]
    fn url_resolution() {
        assert_eq!(
            to_absolute_url("/a/b", "https://example.org"),
            "https://example.org/a/b"
        );
        assert_eq!(
            to_absolute_url("a/b", "https://example.org/"),
            "https://example.org/a/b"
        );
        assert_eq!(
            to_absolute_url("//cdn.example.org/x.jpg", "http://example.org"),
            "http://cdn.example.org/x.jpg"
        );
        assert_eq!(
            to_relative_url("https://www.example.org/manga/one/?p=1#top", "example.org"),
            "/manga/one/?p=1#top"
        );
        assert_eq!(
            to_relative_url("https://other.org/x", "example.org"),
            "https://other.org/x"
        );
        assert_eq!(to_relative_url("series/x", "example.org"), "/series/x");
        assert_eq!(
            to_relative_url("http://127.0.0.1:8080/m/1", "127.0.0.1:8080"),
            "/m/1"
        );
    }

    #[test]
    fn attr_urls_and_scripts() {
        let doc = parse_document(SAMPLE_HTML);
        let a = select_first(doc.root_element(), "a.rel").unwrap();
        assert_eq!(
            attr_as_relative_url(a, "href", "example.org").as_deref(),
            Some("/manga/one/?p=1#top")
        );
        let scripts = inline_scripts(&doc);
        assert_eq!(scripts.len(), 1);
        assert!(scripts[0].contains("imgsrcs"));
    }
}
