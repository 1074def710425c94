use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use sn_core::SourceProfile;

use super::utils;

const MIN_BODY_CHARS: usize = 50;
const MIN_PARAGRAPH_CHARS: usize = 50;
const MIN_FRAGMENT_CHARS: usize = 30;
const MIN_REGION_CHARS: usize = 200;
const TITLE_PREFIX_CHARS: usize = 30;

lazy_static! {
    static ref ANCHOR: Selector = Selector::parse("a").unwrap();
    static ref LIST: Selector = Selector::parse("ul, ol").unwrap();
    static ref PARAGRAPH: Selector = Selector::parse("p").unwrap();
}

/// Pulls the article body out of a full news page.
#[derive(Debug, Clone)]
pub struct ArticleEnricher {
    profile: SourceProfile,
    noise: Vec<Selector>,
    regions: Vec<Selector>,
}

impl ArticleEnricher {
    pub fn new(profile: SourceProfile) -> Self {
        let noise = utils::selectors(&profile.noise_selectors);
        let regions = utils::selectors(&profile.content_selectors);
        Self {
            profile,
            noise,
            regions,
        }
    }

    /// Extract the body of the article titled `title`, or `None` when the
    /// page yields nothing worth keeping.
    pub fn enrich(&self, html: &str, title: &str) -> Option<String> {
        let mut document = Html::parse_document(html);
        self.strip_noise(&mut document, title);

        let block = self.main_block(&document, title)?;
        let body = self
            .paragraph_body(block, title)
            .unwrap_or_else(|| self.block_body(block, title));
        let body = normalize_body(&body);

        (utils::char_len(&body) > MIN_BODY_CHARS).then_some(body)
    }

    fn strip_noise(&self, document: &mut Html, title: &str) {
        for selector in &self.noise {
            detach_where(document, selector, |_| true);
        }
        // Links to other dated stories
        detach_where(document, &ANCHOR, |anchor| {
            let text = utils::flat_text(anchor);
            utils::count_date_tokens(&text) > 0 && !text.contains(title)
        });
        detach_where(document, &LIST, |list| {
            utils::count_date_tokens(&utils::block_text(list)) > 1
        });
    }

    fn main_block<'a>(&self, document: &'a Html, title: &str) -> Option<ElementRef<'a>> {
        let prefix = title_prefix(title);
        let root = document.root_element();
        let regions: Vec<ElementRef<'a>> = self
            .regions
            .iter()
            .flat_map(|selector| root.select(selector))
            .collect();

        regions
            .iter()
            .copied()
            .find(|region| {
                let text = utils::flat_text(*region);
                text.contains(title) || text.contains(&prefix)
            })
            .or_else(|| {
                regions
                    .iter()
                    .copied()
                    .find(|region| utils::char_len(&utils::flat_text(*region)) > MIN_REGION_CHARS)
            })
    }

    fn paragraph_body(&self, block: ElementRef, title: &str) -> Option<String> {
        let mut paragraphs: Vec<String> = Vec::new();
        for paragraph in block.select(&PARAGRAPH) {
            let text = utils::flat_text(paragraph);
            if utils::char_len(&text) <= MIN_PARAGRAPH_CHARS
                || text == title
                || utils::starts_with_date(&text)
                || utils::starts_with_any(&text, &self.profile.headline_lead_ins)
            {
                continue;
            }
            if paragraphs.last() == Some(&text) {
                continue;
            }
            paragraphs.push(text);
        }
        (!paragraphs.is_empty()).then(|| paragraphs.join("\n"))
    }

    /// Whole block text with the title, date and photo credit lines removed
    /// from the front.
    fn block_body(&self, block: ElementRef, title: &str) -> String {
        let prefix = title_prefix(title);
        utils::block_text(block)
            .lines()
            .skip_while(|line| self.is_front_matter(line, title, &prefix))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn is_front_matter(&self, line: &str, title: &str, prefix: &str) -> bool {
        line == title
            || (!prefix.is_empty() && line.starts_with(prefix))
            || utils::starts_with_date(line)
            || utils::starts_with_any(line, &self.profile.photo_credit_prefixes)
    }
}

fn title_prefix(title: &str) -> String {
    title.chars().take(TITLE_PREFIX_CHARS).collect()
}

fn normalize_body(text: &str) -> String {
    text.lines()
        .map(utils::collapse_whitespace)
        .filter(|line| utils::char_len(line) >= MIN_FRAGMENT_CHARS)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Remove every element under the root matching `selector` and `predicate`.
fn detach_where<F>(document: &mut Html, selector: &Selector, predicate: F)
where
    F: Fn(ElementRef) -> bool,
{
    let ids: Vec<_> = document
        .root_element()
        .select(selector)
        .filter(|element| predicate(*element))
        .map(|element| element.id())
        .collect();

    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}
