
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    bookmarks::{BookmarkRef, Candidate, ListedBookmark},
    config::QueryConfig,
    ids::{OwnerId, TagId},
    providers::{Embedder, Generator, ProviderError},
    rag::QueryEngine,
    store::{CandidateQuery, CandidateStore, StoreError},
};

/// Embedder returning a fixed vector, optionally slow or failing.
#[derive(Default)]
pub struct MockEmbedder {
    pub vector: Vec<f32>,
    pub fail: bool,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn returning(vector: Vec<f32>) -> Self {
        Self {
            vector,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ProviderError::InvalidResponse(
                "embedder unreachable".to_string(),
            ));
        }
        Ok(self.vector.clone())
    }
}

/// Generator echoing a fixed answer and recording every prompt.
#[derive(Default)]
pub struct MockGenerator {
    pub answer: String,
    pub fail: bool,
    pub prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            return Err(ProviderError::InvalidResponse(
                "generator unreachable".to_string(),
            ));
        }
        Ok(self.answer.clone())
    }
}

/// What the engine passed to `search_candidates`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSearch {
    pub owner: OwnerId,
    pub similarity_threshold: f32,
    pub max_count: usize,
    pub tag_ids: Option<Vec<TagId>>,
    pub scope: Option<Vec<String>>,
}

/// Store with canned tag ids and candidates, counting every call.
#[derive(Default)]
pub struct MockStore {
    pub tag_ids: HashMap<String, TagId>,
    pub candidates: Vec<Candidate>,
    /// Returned by `list_bookmarks`, already newest first
    pub listed: Vec<ListedBookmark>,
    pub fail_search: bool,
    pub resolve_calls: AtomicUsize,
    pub searches: Mutex<Vec<RecordedSearch>>,
}

impl MockStore {
    pub fn with_candidates(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates,
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, name: &str, id: u64) -> Self {
        self.tag_ids.insert(name.to_string(), TagId(id));
        self
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.searches.lock().unwrap().len()
    }

    pub fn last_search(&self) -> Option<RecordedSearch> {
        self.searches.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CandidateStore for MockStore {
    async fn resolve_tag_ids(
        &self,
        _owner: &OwnerId,
        tag_names: &[String],
    ) -> Result<Vec<TagId>, StoreError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        Ok(tag_names
            .iter()
            .filter_map(|name| self.tag_ids.get(name).copied())
            .collect())
    }

    async fn search_candidates(
        &self,
        owner: &OwnerId,
        query: CandidateQuery<'_>,
    ) -> Result<Vec<Candidate>, StoreError> {
        self.searches.lock().unwrap().push(RecordedSearch {
            owner: owner.clone(),
            similarity_threshold: query.similarity_threshold,
            max_count: query.max_count,
            tag_ids: query.tag_ids.map(|ids| ids.to_vec()),
            scope: query.scope.map(|ids| ids.to_vec()),
        });
        if self.fail_search {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(self.candidates.clone())
    }

    async fn tags(&self, _owner: &OwnerId) -> Result<Vec<String>, StoreError> {
        let mut tags: Vec<String> = self.tag_ids.keys().cloned().collect();
        tags.sort();
        Ok(tags)
    }

    async fn list_bookmarks(
        &self,
        _owner: &OwnerId,
        limit: usize,
    ) -> Result<Vec<ListedBookmark>, StoreError> {
        Ok(self.listed.iter().take(limit).cloned().collect())
    }
}

pub fn candidate(id: &str, similarity: f32, tags: &[&str]) -> Candidate {
    Candidate {
        bookmark: BookmarkRef {
            id: id.to_string(),
            title: format!("Title {id}"),
            url: format!("https://example.com/{id}"),
            summary: format!("Summary of {id}"),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        },
        similarity,
    }
}

/// Engine over mocks, keeping handles so tests can inspect calls.
pub struct Harness {
    pub engine: QueryEngine,
    pub embedder: Arc<MockEmbedder>,
    pub store: Arc<MockStore>,
    pub generator: Arc<MockGenerator>,
}

impl Harness {
    pub fn new(embedder: MockEmbedder, store: MockStore, generator: MockGenerator) -> Self {
        Self::with_config(QueryConfig::default(), embedder, store, generator)
    }

    pub fn with_config(
        config: QueryConfig,
        embedder: MockEmbedder,
        store: MockStore,
        generator: MockGenerator,
    ) -> Self {
        let embedder = Arc::new(embedder);
        let store = Arc::new(store);
        let generator = Arc::new(generator);

        let engine = QueryEngine::new(
            config,
            embedder.clone(),
            store.clone(),
            generator.clone(),
        );

        Self {
            engine,
            embedder,
            store,
            generator,
        }
    }

    /// Default harness: a 3-dim query vector and a generator answering "answer".
    pub fn over(store: MockStore) -> Self {
        Self::new(
            MockEmbedder::returning(vec![1.0, 0.0, 0.0]),
            store,
            MockGenerator::answering("answer"),
        )
    }
}
