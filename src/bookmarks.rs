use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, hash::Hash};

/// A saved page as held by the candidate store.
///
/// `embedding` and `summary` are filled in by an out-of-band enrichment
/// process, so either may be missing for freshly saved pages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Hash for Bookmark {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl PartialEq for Bookmark {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Bookmark {}

/// The public projection of a bookmark: what citations and API responses
/// carry. Raw content and embeddings never leave the store through it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkRef {
    pub id: String,
    pub title: String,
    pub url: String,
    pub summary: String,
    pub tags: Vec<String>,
}

impl From<&Bookmark> for BookmarkRef {
    fn from(bmark: &Bookmark) -> Self {
        BookmarkRef {
            id: bmark.id.clone(),
            title: bmark.title.clone(),
            url: bmark.url.clone(),
            summary: bmark.summary.clone(),
            tags: bmark.tags.clone(),
        }
    }
}

/// A bookmark as listed back to its owner: the public projection plus
/// timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedBookmark {
    #[serde(flatten)]
    pub bookmark: BookmarkRef,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Bookmark> for ListedBookmark {
    fn from(bmark: &Bookmark) -> Self {
        ListedBookmark {
            bookmark: BookmarkRef::from(bmark),
            created_at: bmark.created_at,
            updated_at: bmark.updated_at,
        }
    }
}

/// A bookmark returned by the candidate store for one query, scored by
/// cosine similarity in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub bookmark: BookmarkRef,
    pub similarity: f32,
}

/// A ranked citation: candidate metadata plus the final hybrid score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub bookmark: BookmarkRef,
    pub score: f32,
}

/// Normalizes a single tag name: trimmed and lowercased.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// Normalizes a list of tag names, dropping empties and duplicates while
/// keeping the first occurrence order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|tag| normalize_tag(tag.as_ref()))
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

/// Parses a comma or whitespace separated tag list.
pub fn parse_tags(tags: &str) -> Vec<String> {
    normalize_tags(tags.split(|c: char| c == ',' || c.is_whitespace()))
}
