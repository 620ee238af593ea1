//! Generator-backed enrichment of a saved page: a short summary and a few
//! suggested tags. Nothing here touches the corpus; callers decide what to
//! store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    bookmarks::normalize_tags,
    providers::{Generator, ProviderError},
};

/// Page content beyond this many characters is not sent for summarizing
const SUMMARY_CONTENT_CHARS: usize = 8000;
/// Page content beyond this many characters is not sent for tagging
const TAGS_CONTENT_CHARS: usize = 4000;
const MAX_SUGGESTED_TAGS: usize = 5;

const SUMMARY_PREAMBLE: &str = "You are HyperMemo, a concise research assistant.";
const TAGS_INSTRUCTION: &str = "Suggest up to 5 concise tags (single words) describing the following page. Return comma-separated words only.";

/// A page as submitted for enrichment.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PageContent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryTagsResponse {
    pub tags: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    #[error("{0}")]
    Validation(String),

    #[error("generation failed: {0}")]
    Generation(#[from] ProviderError),
}

pub struct Summarizer {
    generator: Arc<dyn Generator>,
}

impl Summarizer {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    pub async fn summarize(&self, page: &PageContent) -> Result<String, EnrichError> {
        require_text(page)?;

        let summary = self.generator.generate(&summarize_prompt(page)).await?;
        log::info!(
            "summarized page={:?} content_chars={} summary_chars={}",
            page.url,
            page.content.chars().count(),
            summary.chars().count()
        );
        Ok(summary)
    }

    /// Asks the generator for tags and keeps at most `MAX_SUGGESTED_TAGS`
    /// normalized ones.
    pub async fn suggest_tags(&self, page: &PageContent) -> Result<Vec<String>, EnrichError> {
        require_text(page)?;

        let raw = self.generator.generate(&tags_prompt(page)).await?;
        let tags = parse_suggested_tags(&raw);
        log::info!("suggested tags={tags:?} page={:?}", page.url);
        Ok(tags)
    }
}

fn require_text(page: &PageContent) -> Result<(), EnrichError> {
    if page.title.trim().is_empty() && page.content.trim().is_empty() {
        return Err(EnrichError::Validation(
            "title or content is required".to_string(),
        ));
    }
    Ok(())
}

/// The first `max_chars` characters of `text`.
fn head(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn summarize_prompt(page: &PageContent) -> String {
    let mut lines = vec![SUMMARY_PREAMBLE.to_string()];
    if !page.title.is_empty() {
        lines.push(format!("Title: {}", page.title));
    }
    if !page.url.is_empty() {
        lines.push(format!("URL: {}", page.url));
    }
    lines.push("Content:".to_string());
    lines.push(head(&page.content, SUMMARY_CONTENT_CHARS).to_string());
    lines.join("\n")
}

fn tags_prompt(page: &PageContent) -> String {
    let title_line = format!("Title: {}", page.title);
    [
        TAGS_INSTRUCTION,
        title_line.as_str(),
        "Content:",
        head(&page.content, TAGS_CONTENT_CHARS),
    ]
    .join("\n")
}

/// Reads a comma separated generator reply into tags.
fn parse_suggested_tags(raw: &str) -> Vec<String> {
    normalize_tags(raw.split(','))
        .into_iter()
        .take(MAX_SUGGESTED_TAGS)
        .collect()
}
