//! Visible text capture from rendered HTML
//!
//! The rendered document is serialized by the browser and reduced to the
//! text a visitor would read: `<body>` only, minus script-like elements.

use scraper::{ElementRef, Html, Node, Selector};

/// Elements whose content never reaches the screen as text
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "iframe", "template", "svg", "head",
];

/// Elements that start a new line of text
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "footer", "form",
    "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p", "section",
    "table", "tbody", "td", "th", "thead", "tr", "ul",
];

/// Extracts the visible body text from an HTML document
///
/// # Rules
///
/// - Only `<body>` is read (the whole document when there is none)
/// - `script`, `style`, `noscript`, `iframe`, `template` and `svg` subtrees
///   are dropped, as are elements carrying the `hidden` attribute
/// - Block-level elements are separated by newlines
/// - Whitespace runs collapse to one space; blank lines are removed
///
/// # Example
///
/// ```
/// use fibre_scout::extract::visible_text;
///
/// let html = r#"<html><body><h1>Deals</h1><script>var x = 1;</script>
///     <p>Fibre   500 for <b>£34.99</b></p></body></html>"#;
/// assert_eq!(visible_text(html), "Deals\nFibre 500 for £34.99");
/// ```
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let body = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next());
    let root = body.unwrap_or_else(|| document.root_element());

    let mut raw = String::new();
    collect_text(root, &mut raw);

    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_ELEMENTS.contains(&name) || el.attr("hidden").is_some() {
                    continue;
                }

                let block = BLOCK_ELEMENTS.contains(&name);
                if block {
                    out.push('\n');
                }
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_text(child_element, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}
