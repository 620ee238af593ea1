//! Candidate retrieval over a user's bookmark corpus.
//!
//! # Architecture
//!
//! - `CandidateStore`: nearest-neighbour query by cosine similarity,
//!   filterable by owner, tag ids and bookmark ids, plus the owner's tag
//!   and recent bookmark listings
//! - `local`: exact in-memory implementation loaded from `bookmarks.json`

mod local;

use async_trait::async_trait;

use crate::{
    bookmarks::{Candidate, ListedBookmark},
    ids::{OwnerId, TagId},
};

pub use local::LocalStore;

/// Corpus file name inside the base path
pub const CORPUS_FILE: &str = "bookmarks.json";

/// How many bookmarks a listing returns at most
pub const BOOKMARK_LIST_LIMIT: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corpus is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Parameters of one nearest-neighbour query.
#[derive(Debug, Clone, Copy)]
pub struct CandidateQuery<'a> {
    pub vector: &'a [f32],
    /// Candidates scoring below this are dropped
    pub similarity_threshold: f32,
    pub max_count: usize,
    /// Keep only bookmarks carrying at least one of these tags.
    /// `None` means no tag filter. Never pass `Some(&[])`.
    pub tag_ids: Option<&'a [TagId]>,
    /// Keep only these bookmark ids. `None` means the whole corpus.
    pub scope: Option<&'a [String]>,
}

#[async_trait]
pub trait CandidateStore: Send + Sync {
    /// Maps normalized tag names to this owner's tag ids. Unknown names are
    /// dropped, so the result may be shorter than the input or empty.
    async fn resolve_tag_ids(
        &self,
        owner: &OwnerId,
        tag_names: &[String],
    ) -> Result<Vec<TagId>, StoreError>;

    /// Returns the owner's bookmarks ordered by similarity, highest first.
    async fn search_candidates(
        &self,
        owner: &OwnerId,
        query: CandidateQuery<'_>,
    ) -> Result<Vec<Candidate>, StoreError>;

    /// Lists the owner's tag names.
    async fn tags(&self, owner: &OwnerId) -> Result<Vec<String>, StoreError>;

    /// Lists up to `limit` of the owner's bookmarks, newest `created_at` first.
    async fn list_bookmarks(
        &self,
        owner: &OwnerId,
        limit: usize,
    ) -> Result<Vec<ListedBookmark>, StoreError>;
}
