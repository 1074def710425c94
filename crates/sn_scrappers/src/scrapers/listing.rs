use std::collections::{HashMap, HashSet};

use chrono::{Months, NaiveDate};
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use sn_core::{placeholder_content, Candidate, Result, SourceProfile};
use tracing::debug;

use super::utils;

/// A snippet must beat the headline by at least this many characters.
const SNIPPET_MARGIN_CHARS: usize = 20;
const SNIPPET_SIBLINGS: usize = 3;

lazy_static! {
    static ref ANCHOR: Selector = Selector::parse("a[href]").unwrap();
}

/// Turns the listing page into candidate news records.
#[derive(Debug, Clone)]
pub struct ListingExtractor {
    profile: SourceProfile,
}

struct Headline<'a> {
    element: ElementRef<'a>,
    date: String,
    title: String,
}

impl ListingExtractor {
    pub fn new(profile: SourceProfile) -> Self {
        Self { profile }
    }

    /// Parse `html` and collect every candidate it yields.
    pub fn extract(&self, html: &str, today: NaiveDate) -> Result<Vec<Candidate>> {
        let document = Html::parse_document(html);
        let candidates = self.candidates(&document, today)?.collect();
        Ok(candidates)
    }

    /// Lazily yields candidates in document order; the first occurrence of a
    /// `(title, date)` pair wins.
    pub fn candidates<'a>(
        &'a self,
        document: &'a Html,
        today: NaiveDate,
    ) -> Result<impl Iterator<Item = Candidate> + 'a> {
        let selector = utils::selector(&self.profile.headline_selector)?;
        let headlines = innermost_headlines(document, &selector);
        let links = link_index(document);
        let cutoff = today.checked_sub_months(Months::new(self.profile.staleness_months));
        let mut seen = HashSet::new();

        Ok(headlines.into_iter().filter_map(move |headline| {
            if self.is_noise(&headline.title) {
                return None;
            }
            let date = match utils::parse_listing_date(&headline.date) {
                Some(date) => date,
                None => {
                    debug!(date = %headline.date, title = %headline.title, "Skipping headline with invalid date");
                    return None;
                }
            };
            if cutoff.map_or(false, |cutoff| date < cutoff) {
                debug!(%date, title = %headline.title, "Skipping stale headline");
                return None;
            }

            if !seen.insert((headline.title.clone(), date)) {
                return None;
            }
            Some(self.build_candidate(&headline, date, &links))
        }))
    }

    fn build_candidate(
        &self,
        headline: &Headline,
        date: NaiveDate,
        links: &HashMap<String, String>,
    ) -> Candidate {
        let title = headline.title.clone();
        let content = self
            .snippet(headline.element, &title)
            .unwrap_or_else(|| placeholder_content(&title));

        Candidate {
            important: self.is_important(&title),
            link: self.resolve_link(headline.element, &title, links),
            content,
            date,
            title,
        }
    }

    fn is_noise(&self, title: &str) -> bool {
        if utils::char_len(title) < self.profile.min_title_chars {
            return true;
        }
        let lower = title.to_lowercase();
        if self
            .profile
            .ui_captions
            .iter()
            .any(|caption| caption.to_lowercase() == lower)
        {
            return true;
        }
        title
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_whitespace() || c.is_ascii_punctuation())
    }

    pub fn is_important(&self, title: &str) -> bool {
        let lower = title.to_lowercase();
        self.profile
            .important_keywords
            .iter()
            .any(|keyword| lower.contains(&keyword.to_lowercase()))
    }

    fn resolve_link(
        &self,
        element: ElementRef,
        title: &str,
        links: &HashMap<String, String>,
    ) -> Option<String> {
        let href = usable_href(element)
            .or_else(|| element.select(&ANCHOR).find_map(usable_href))
            .or_else(|| {
                element
                    .ancestors()
                    .filter_map(ElementRef::wrap)
                    .filter(|el| el.value().name() == "a")
                    .find_map(usable_href)
            })
            .or_else(|| links.get(title).cloned())?;

        match self.profile.resolve(&href) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                debug!(error = %e, "Ignoring unresolvable article link");
                None
            }
        }
    }

    fn snippet(&self, element: ElementRef, title: &str) -> Option<String> {
        headline_block(element)
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .take(SNIPPET_SIBLINGS)
            .map(utils::flat_text)
            .find(|text| is_snippet(text, title))
    }
}

fn is_snippet(text: &str, title: &str) -> bool {
    !text.is_empty()
        && utils::split_headline(text).is_none()
        && utils::char_len(text) >= utils::char_len(title) + SNIPPET_MARGIN_CHARS
}

/// Headline-bearing elements, keeping only the innermost one when nested
/// elements render the same headline. An outer element whose title merely
/// extends a nested headline of the same date (an inline teaser) is dropped
/// as well.
fn innermost_headlines<'a>(document: &'a Html, selector: &Selector) -> Vec<Headline<'a>> {
    document
        .select(selector)
        .filter_map(|element| {
            let (date, title) = utils::split_headline(&utils::block_text(element))?;
            let nested = element
                .descendants()
                .skip(1)
                .filter_map(ElementRef::wrap)
                .filter(|child| selector.matches(child))
                .any(|child| {
                    utils::split_headline(&utils::block_text(child))
                        .map_or(false, |(d, t)| d == date && title.starts_with(t.as_str()))
                });
            (!nested).then_some(Headline { element, date, title })
        })
        .collect()
}

/// Title -> href for every anchor whose own text is a dated headline.
fn link_index(document: &Html) -> HashMap<String, String> {
    let mut index = HashMap::new();
    for anchor in document.select(&ANCHOR) {
        let Some(href) = usable_href(anchor) else { continue };
        if let Some((_, title)) = utils::split_headline(&utils::block_text(anchor)) {
            index.entry(title).or_insert(href);
        }
    }
    index
}

fn usable_href(element: ElementRef) -> Option<String> {
    if element.value().name() != "a" {
        return None;
    }
    let href = element.value().attr("href")?.trim();
    let lower = href.to_lowercase();
    if href.is_empty()
        || href.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
    {
        return None;
    }
    Some(href.to_string())
}

/// Outermost wrapper that contains nothing but the headline itself.
fn headline_block(element: ElementRef) -> ElementRef {
    let text = utils::flat_text(element);
    let mut block = element;
    while let Some(parent) = block.parent().and_then(ElementRef::wrap) {
        if matches!(parent.value().name(), "body" | "html") || utils::flat_text(parent) != text {
            break;
        }
        block = parent;
    }
    block
}
