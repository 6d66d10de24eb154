use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::render::RenderedPage;

/// One scraped news item. `link` is the identity key downstream; `title` is
/// guaranteed non-empty by the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleRecord {
    pub title: String,
    pub kicker: String,
    pub image_url: String,
    pub link: String,
}

/// CSS selectors for the article container and its fields.
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    pub container: String,
    pub kicker: String,
    pub anchor: String,
    pub image: String,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid selector `{selector}`: {message}")]
    Selector { selector: String, message: String },
}

/// Why a single container was skipped. Never aborts the batch.
#[derive(Debug, Error)]
enum NodeError {
    #[error("no element matched the {0} selector")]
    MissingElement(&'static str),
    #[error("anchor has no href attribute")]
    MissingHref,
}

struct CompiledSelectors {
    container: Selector,
    kicker: Selector,
    anchor: Selector,
    image: Selector,
}

fn compile(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|e| ExtractError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

impl CompiledSelectors {
    fn new(cfg: &SelectorConfig) -> Result<Self, ExtractError> {
        Ok(CompiledSelectors {
            container: compile(&cfg.container)?,
            kicker: compile(&cfg.kicker)?,
            anchor: compile(&cfg.anchor)?,
            image: compile(&cfg.image)?,
        })
    }
}

/// Walk every container in DOM order and build article records. A failure in
/// one container is logged and skips that container only; blank titles are
/// dropped. Invalid configured selectors fail the whole call since nothing
/// could be extracted.
pub fn extract(
    page: &RenderedPage,
    cfg: &SelectorConfig,
    limit: Option<usize>,
) -> Result<Vec<ArticleRecord>, ExtractError> {
    let selectors = CompiledSelectors::new(cfg)?;
    let doc = Html::parse_document(&page.html);
    let base = Url::parse(&page.url).ok();

    let mut records = Vec::new();
    for (idx, node) in doc.select(&selectors.container).enumerate() {
        if limit.is_some_and(|n| records.len() >= n) {
            break;
        }
        match extract_node(node, &selectors, base.as_ref()) {
            Ok(rec) if rec.title.is_empty() => {
                debug!("container {idx}: blank title, dropping record");
            }
            Ok(rec) => records.push(rec),
            Err(e) => {
                warn!(
                    "container {idx}: {e}; skipping (title fragment: {:?})",
                    partial_title(node, &selectors)
                );
            }
        }
    }

    debug!("extracted {} records from {}", records.len(), page.url);
    Ok(records)
}

fn extract_node(
    node: ElementRef,
    selectors: &CompiledSelectors,
    base: Option<&Url>,
) -> Result<ArticleRecord, NodeError> {
    let kicker_el = node
        .select(&selectors.kicker)
        .next()
        .ok_or(NodeError::MissingElement("kicker"))?;
    let anchor = node
        .select(&selectors.anchor)
        .next()
        .ok_or(NodeError::MissingElement("title anchor"))?;
    let image = node
        .select(&selectors.image)
        .next()
        .ok_or(NodeError::MissingElement("image"))?;

    let href = anchor.value().attr("href").ok_or(NodeError::MissingHref)?;

    Ok(ArticleRecord {
        title: element_text(anchor),
        kicker: element_text(kicker_el),
        image_url: image
            .value()
            .attr("src")
            .map(|src| absolutize(src, base))
            .unwrap_or_default(),
        link: absolutize(href, base),
    })
}

/// Collapse an element's text nodes into one whitespace-normalized string.
fn element_text(el: ElementRef) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve relative URLs against the page, mirroring what a browser reports.
fn absolutize(href: &str, base: Option<&Url>) -> String {
    let href = href.trim();
    match base {
        Some(base) => base
            .join(href)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string()),
        None => href.to_string(),
    }
}

/// Best-effort title context for skip logs, so partial failures stay auditable.
fn partial_title(node: ElementRef, selectors: &CompiledSelectors) -> Option<String> {
    node.select(&selectors.anchor)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

// ── Tests ──
