pub mod article;
pub mod fetcher;
pub mod listing;

pub use article::ArticleEnricher;
pub use fetcher::{HttpFetcher, PageFetcher};
pub use listing::ListingExtractor;

/// Common utilities for scrapers
pub(crate) mod utils {
    use chrono::NaiveDate;
    use lazy_static::lazy_static;
    use regex::Regex;
    use scraper::{ElementRef, Node, Selector};
    use sn_core::{Error, Result};
    use tracing::warn;

    lazy_static! {
        static ref HEADLINE: Regex = Regex::new(r"^(\d{2}\.\d{2}\.\d{4})\s+(.+)").unwrap();
        static ref LEADING_DATE: Regex = Regex::new(r"^\d{2}\.\d{2}\.\d{4}").unwrap();
        static ref DATE_TOKEN: Regex = Regex::new(r"\d{2}\.\d{2}\.\d{4}").unwrap();
    }

    const BLOCK_ELEMENTS: &[&str] = &[
        "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
        "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main",
        "nav", "ol", "p", "pre", "section", "table", "tbody", "td", "tfoot", "th", "thead", "tr",
        "ul",
    ];

    const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

    pub fn selector(selector: &str) -> Result<Selector> {
        Selector::parse(selector)
            .map_err(|e| Error::Config(format!("Invalid selector {:?}: {:?}", selector, e)))
    }

    /// Parse a configured selector list, skipping entries that don't parse.
    pub fn selectors(list: &[String]) -> Vec<Selector> {
        list.iter()
            .filter_map(|s| match selector(s) {
                Ok(sel) => Some(sel),
                Err(e) => {
                    warn!("{}", e);
                    None
                }
            })
            .collect()
    }

    /// Element text with a line break at every block boundary and
    /// whitespace collapsed inside each line.
    pub fn block_text(element: ElementRef) -> String {
        let mut raw = String::new();
        render(element, &mut raw);
        raw.lines()
            .map(collapse_whitespace)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render(element: ElementRef, out: &mut String) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => out.push_str(text),
                Node::Element(el) => {
                    let name = el.name();
                    if SKIPPED_ELEMENTS.contains(&name) {
                        continue;
                    }
                    let block = BLOCK_ELEMENTS.contains(&name);
                    if block {
                        out.push('\n');
                    }
                    if let Some(child) = ElementRef::wrap(child) {
                        render(child, out);
                    }
                    if block {
                        out.push('\n');
                    }
                }
                _ => {}
            }
        }
    }

    /// Single-line form of an element's text.
    pub fn flat_text(element: ElementRef) -> String {
        collapse_whitespace(&block_text(element))
    }

    pub fn collapse_whitespace(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Split `DD.MM.YYYY Title` into its date token and the rest of that line.
    pub fn split_headline(text: &str) -> Option<(String, String)> {
        let caps = HEADLINE.captures(text.trim())?;
        let title = collapse_whitespace(&caps[2]);
        if title.is_empty() {
            return None;
        }
        Some((caps[1].to_string(), title))
    }

    pub fn starts_with_date(text: &str) -> bool {
        LEADING_DATE.is_match(text.trim_start())
    }

    pub fn count_date_tokens(text: &str) -> usize {
        DATE_TOKEN.find_iter(text).count()
    }

    pub fn parse_listing_date(token: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(token, "%d.%m.%Y").ok()
    }

    pub fn char_len(text: &str) -> usize {
        text.chars().count()
    }

    pub fn starts_with_any(text: &str, prefixes: &[String]) -> bool {
        let lower = text.to_lowercase();
        prefixes
            .iter()
            .any(|prefix| lower.starts_with(&prefix.to_lowercase()))
    }
}
