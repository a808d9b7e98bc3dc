//! Text helpers over a parsed DOM, approximating what a browser's
//! `innerText` would show line by line.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::ElementRef;

lazy_static! {
    /// A price fragment anywhere in a string: `47%`, `15¢`, `<1%`, `12.5 %`.
    pub(crate) static ref PRICE_FRAGMENT: Regex = Regex::new(
        r"[<>]?\d+(?:\.\d+)?\s*[%¢]"
    ).expect("price fragment regex is valid");

    /// A line that starts with a price, as trailing card snippets do.
    pub(crate) static ref PRICE_LINE: Regex = Regex::new(
        r"^[<>]?\d+(?:\.\d+)?\s*[%¢]"
    ).expect("price line regex is valid");

    /// Chart deltas such as `▲ 3` or `↓12%`.
    pub(crate) static ref DELTA: Regex = Regex::new(
        r"^[▲▼△▽↑↓+\-−]\s*\d"
    ).expect("delta regex is valid");
}

/// Tags whose text never belongs to an outcome row.
pub(crate) const NON_CONTENT_TAGS: &[&str] = &["script", "style", "noscript", "template", "title"];

/// Every non-empty trimmed text line under `element`, in document order.
/// Adjacent text nodes split only by comments (`98<!-- -->%`) are one run.
pub(crate) fn text_lines(element: ElementRef<'_>) -> Vec<String> {
    let mut runs: Vec<String> = Vec::new();

    for node in element.descendants().filter(|node| {
        node.ancestors()
            .filter_map(ElementRef::wrap)
            .take_while(|ancestor| ancestor.id() != element.id())
            .all(|ancestor| !NON_CONTENT_TAGS.contains(&ancestor.value().name()))
    }) {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let continues_run = node
            .prev_siblings()
            .find(|sibling| !sibling.value().is_comment())
            .is_some_and(|sibling| sibling.value().is_text());

        match runs.last_mut() {
            Some(run) if continues_run => run.push_str(text),
            _ => runs.push(text.to_string()),
        }
    }

    runs.iter()
        .flat_map(|run| run.lines())
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Text of the element's direct text children only, whitespace-collapsed.
pub(crate) fn own_text(element: ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|child| child.value().as_text())
        .map(|text| &**text)
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn first<'a>(doc: &'a Html, css: &str) -> ElementRef<'a> {
        let selector = Selector::parse(css).unwrap();
        doc.select(&selector).next().unwrap()
    }

    #[test]
    fn test_text_lines_skip_scripts() {
        let doc = Html::parse_document(
            "<div id=row><span>Kevin Warsh</span>\n<script>var x = 1;</script><b> 98% </b></div>",
        );
        assert_eq!(text_lines(first(&doc, "#row")), vec!["Kevin Warsh", "98%"]);
    }

    #[test]
    fn test_own_text_ignores_children() {
        let doc = Html::parse_document("<button id=b>Yes <span>ignored</span> 15¢</button>");
        assert_eq!(own_text(first(&doc, "#b")), "Yes 15¢");
    }

    #[test]
    fn test_react_split_price_text() {
        let doc = Html::parse_document("<div id=row><span>Kevin Warsh</span><span id=p>100<!-- -->%</span></div>");
        assert_eq!(own_text(first(&doc, "#p")), "100%");
        assert_eq!(text_lines(first(&doc, "#row")), vec!["Kevin Warsh", "100%"]);
    }

    #[test]
    fn test_patterns() {
        assert!(PRICE_FRAGMENT.is_match("Buy Yes 15¢"));
        assert!(PRICE_LINE.is_match("<1%"));
        assert!(!PRICE_LINE.is_match("Bitcoin above 100%"));
        assert!(DELTA.is_match("▲ 3"));
        assert!(!DELTA.is_match("Kevin Warsh"));
    }
}
