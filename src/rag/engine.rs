//! Query orchestration.
//!
//! One `ask` call runs a linear pipeline:
//!
//! received → embedding + tag-resolving → retrieving → ranking → formatting
//! → generating → done
//!
//! with two early exits: `rejected` (validation error, nothing called) and
//! `empty` (a successful, fixed answer with no matches). Embedding and tag
//! resolution run concurrently; the first error from either aborts the
//! query. No retries happen here and nothing is written anywhere.

use std::sync::Arc;
use std::time::Duration;

use futures::future;
use serde::{Deserialize, Serialize};

use super::{
    error::QueryError,
    ranker::HybridRanker,
    sources::{build_prompt, format_sources},
    tags::{resolve_tags, TagFilter},
};
use crate::{
    bookmarks::{normalize_tags, Match},
    config::QueryConfig,
    ids::{OwnerId, QueryId},
    providers::{Embedder, Generator},
    store::{CandidateQuery, CandidateStore},
};

pub const NO_TAG_MATCHES_ANSWER: &str = "No bookmarks found with the selected tags.";
pub const NO_MATCHES_ANSWER: &str = "No matching bookmarks yet.";

/// The caller's question. Owner identity is supplied separately.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AskRequest {
    pub question: String,

    /// Tag names to filter and boost by
    #[serde(default)]
    pub tags: Vec<String>,

    /// Restrict retrieval to these bookmark ids
    #[serde(default)]
    pub scope: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub matches: Vec<Match>,
}

/// Why a query ended without invoking the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// The embedder returned no vector for the question
    NoEmbeddableContent,
    /// Tags were requested and none exist for the owner
    NoTagMatches,
    /// Retrieval came back empty
    NoCandidates,
}

impl EmptyReason {
    pub fn answer(&self) -> &'static str {
        match self {
            EmptyReason::NoTagMatches => NO_TAG_MATCHES_ANSWER,
            EmptyReason::NoEmbeddableContent | EmptyReason::NoCandidates => NO_MATCHES_ANSWER,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Answered(AskResponse),
    Empty(EmptyReason),
}

impl QueryOutcome {
    pub fn into_response(self) -> AskResponse {
        match self {
            QueryOutcome::Answered(response) => response,
            QueryOutcome::Empty(reason) => AskResponse {
                answer: reason.answer().to_string(),
                matches: vec![],
            },
        }
    }
}

/// Answers questions against an owner's bookmarks.
///
/// Holds no per-request state, so one engine is shared by all requests.
pub struct QueryEngine {
    config: QueryConfig,
    ranker: HybridRanker,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn CandidateStore>,
    generator: Arc<dyn Generator>,
}

impl QueryEngine {
    pub fn new(
        config: QueryConfig,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn CandidateStore>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            ranker: HybridRanker::from_config(&config),
            config,
            embedder,
            store,
            generator,
        }
    }

    #[cfg(test)]
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CandidateStore> {
        &self.store
    }

    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    /// Trims the question and checks its length.
    pub fn validate(&self, question: &str) -> Result<String, QueryError> {
        let question = question.trim();
        if question.chars().count() < self.config.min_question_chars {
            return Err(QueryError::Validation("Question is too short".to_string()));
        }
        Ok(question.to_string())
    }

    /// Runs the full pipeline for `owner` under the configured deadline.
    pub async fn ask(
        &self,
        owner: &OwnerId,
        request: AskRequest,
    ) -> Result<QueryOutcome, QueryError> {
        let query_id = QueryId::new();

        let question = self.validate(&request.question).map_err(|err| {
            log::debug!("query={query_id} owner={owner} outcome=rejected");
            err
        })?;

        let deadline = Duration::from_secs(self.config.timeout_secs);
        let outcome = tokio::time::timeout(
            deadline,
            self.run(&query_id, owner, &question, &request),
        )
        .await
        .map_err(|_| QueryError::Timeout(deadline))
        .and_then(|result| result);

        match &outcome {
            Ok(QueryOutcome::Answered(response)) => log::info!(
                "query={query_id} owner={owner} outcome=answered matches={}",
                response.matches.len()
            ),
            Ok(QueryOutcome::Empty(reason)) => {
                log::info!("query={query_id} owner={owner} outcome=empty reason={reason:?}")
            }
            Err(err) => log::error!("query={query_id} owner={owner} outcome=error err={err}"),
        }

        outcome
    }

    async fn run(
        &self,
        query_id: &QueryId,
        owner: &OwnerId,
        question: &str,
        request: &AskRequest,
    ) -> Result<QueryOutcome, QueryError> {
        let tag_names = normalize_tags(&request.tags);

        log::debug!("query={query_id} stage=embedding+tag-resolving tags={tag_names:?}");
        let (vector, tag_filter) = future::try_join(
            async {
                self.embedder
                    .embed(question)
                    .await
                    .map_err(QueryError::Embedding)
            },
            async {
                resolve_tags(self.store.as_ref(), owner, &tag_names)
                    .await
                    .map_err(QueryError::from)
            },
        )
        .await?;

        // requested tags that match nothing decide the answer, whatever the vector
        if tag_filter == TagFilter::Unsatisfiable {
            return Ok(QueryOutcome::Empty(EmptyReason::NoTagMatches));
        }

        if vector.is_empty() {
            return Ok(QueryOutcome::Empty(EmptyReason::NoEmbeddableContent));
        }

        let scope: Vec<String> = request
            .scope
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();

        log::debug!("query={query_id} stage=retrieving");
        let candidates = self
            .store
            .search_candidates(
                owner,
                CandidateQuery {
                    vector: &vector,
                    similarity_threshold: self.config.similarity_threshold,
                    max_count: self.config.candidate_count,
                    tag_ids: tag_filter.ids(),
                    scope: (!scope.is_empty()).then_some(scope.as_slice()),
                },
            )
            .await?;

        if candidates.is_empty() {
            return Ok(QueryOutcome::Empty(EmptyReason::NoCandidates));
        }

        log::debug!(
            "query={query_id} stage=ranking candidates={} top_k={}",
            candidates.len(),
            self.ranker.top_k()
        );
        let matches = self.ranker.rank(candidates, &tag_names);

        log::debug!("query={query_id} stage=formatting matches={}", matches.len());
        let prompt = build_prompt(question, &format_sources(&matches));

        log::debug!("query={query_id} stage=generating prompt_chars={}", prompt.len());
        let answer = self
            .generator
            .generate(&prompt)
            .await
            .map_err(QueryError::Generation)?;

        Ok(QueryOutcome::Answered(AskResponse { answer, matches }))
    }
}
