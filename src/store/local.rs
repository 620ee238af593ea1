//! In-memory candidate store with exact cosine similarity search.
//!
//! The corpus is a JSON object keyed by owner id, each value a list of
//! bookmarks. It is read once at startup; queries never mutate it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;

use super::{CandidateQuery, CandidateStore, StoreError};
use crate::{
    bookmarks::{normalize_tags, Bookmark, BookmarkRef, Candidate, ListedBookmark},
    ids::{bookmark_id_for_url, OwnerId, TagId},
};

/// One owner's slice of the corpus.
#[derive(Debug, Default)]
struct OwnerCorpus {
    bookmarks: Vec<Bookmark>,
    /// Tag ids carried by `bookmarks[i]`
    bookmark_tags: Vec<HashSet<TagId>>,
    /// Normalized tag name -> id
    tag_ids: BTreeMap<String, TagId>,
}

impl OwnerCorpus {
    fn new(bookmarks: Vec<Bookmark>) -> Self {
        let mut corpus = OwnerCorpus::default();

        let mut seen = HashSet::with_capacity(bookmarks.len());
        for mut bmark in bookmarks {
            if bmark.id.trim().is_empty() {
                bmark.id = bookmark_id_for_url(&bmark.url);
            }
            if !seen.insert(bmark.id.clone()) {
                log::warn!("Duplicate bookmark id {} ({})", bmark.id, bmark.url);
            }
            bmark.tags = normalize_tags(&bmark.tags);

            let mut ids = HashSet::with_capacity(bmark.tags.len());
            for tag in &bmark.tags {
                let next_id = TagId(corpus.tag_ids.len() as u64 + 1);
                let id = *corpus.tag_ids.entry(tag.clone()).or_insert(next_id);
                ids.insert(id);
            }

            corpus.bookmarks.push(bmark);
            corpus.bookmark_tags.push(ids);
        }

        corpus
    }
}

/// Candidate store over a corpus held in memory.
#[derive(Debug, Default)]
pub struct LocalStore {
    owners: HashMap<OwnerId, OwnerCorpus>,
}

impl LocalStore {
    /// Builds a store from bookmarks grouped by owner.
    pub fn from_corpus(corpus: HashMap<OwnerId, Vec<Bookmark>>) -> Self {
        let owners = corpus
            .into_iter()
            .map(|(owner, bookmarks)| (owner, OwnerCorpus::new(bookmarks)))
            .collect();

        Self { owners }
    }

    /// Loads the corpus file. A missing file yields an empty store.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();

        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No corpus at {}, starting empty", path.display());
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };

        let corpus: HashMap<OwnerId, Vec<Bookmark>> = serde_json::from_slice(&raw)?;
        let store = Self::from_corpus(corpus);
        if store.is_empty() {
            log::warn!("Corpus at {} holds no bookmarks", path.display());
        }

        log::info!(
            "Loaded {} bookmarks for {} owners from {}",
            store.len(),
            store.owners.len(),
            path.display()
        );

        Ok(store)
    }

    /// Total number of bookmarks across owners.
    pub fn len(&self) -> usize {
        self.owners.values().map(|c| c.bookmarks.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CandidateStore for LocalStore {
    async fn resolve_tag_ids(
        &self,
        owner: &OwnerId,
        tag_names: &[String],
    ) -> Result<Vec<TagId>, StoreError> {
        let Some(corpus) = self.owners.get(owner) else {
            return Ok(vec![]);
        };

        Ok(tag_names
            .iter()
            .filter_map(|name| corpus.tag_ids.get(name).copied())
            .collect())
    }

    async fn search_candidates(
        &self,
        owner: &OwnerId,
        query: CandidateQuery<'_>,
    ) -> Result<Vec<Candidate>, StoreError> {
        let Some(corpus) = self.owners.get(owner) else {
            return Ok(vec![]);
        };

        let tag_filter: Option<HashSet<TagId>> =
            query.tag_ids.map(|ids| ids.iter().copied().collect());
        let scope: Option<HashSet<&str>> = query
            .scope
            .map(|ids| ids.iter().map(String::as_str).collect());

        let mut results: Vec<Candidate> = corpus
            .bookmarks
            .iter()
            .zip(corpus.bookmark_tags.iter())
            .filter(|(bmark, _)| {
                scope
                    .as_ref()
                    .map(|scope| scope.contains(bmark.id.as_str()))
                    .unwrap_or(true)
            })
            .filter(|(_, tags)| {
                tag_filter
                    .as_ref()
                    .map(|filter| !filter.is_disjoint(tags))
                    .unwrap_or(true)
            })
            .filter_map(|(bmark, _)| {
                let embedding = bmark.embedding.as_deref().filter(|e| !e.is_empty())?;
                let similarity = cosine_similarity(query.vector, embedding);
                if similarity >= query.similarity_threshold {
                    Some(Candidate {
                        bookmark: BookmarkRef::from(bmark),
                        similarity,
                    })
                } else {
                    None
                }
            })
            .collect();

        // Stable: equal scores keep corpus order
        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        results.truncate(query.max_count);

        Ok(results)
    }

    async fn tags(&self, owner: &OwnerId) -> Result<Vec<String>, StoreError> {
        Ok(self
            .owners
            .get(owner)
            .map(|corpus| corpus.tag_ids.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_bookmarks(
        &self,
        owner: &OwnerId,
        limit: usize,
    ) -> Result<Vec<ListedBookmark>, StoreError> {
        let Some(corpus) = self.owners.get(owner) else {
            return Ok(vec![]);
        };

        let mut listed: Vec<ListedBookmark> =
            corpus.bookmarks.iter().map(ListedBookmark::from).collect();
        // Stable: same timestamps keep corpus order
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listed.truncate(limit);

        Ok(listed)
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity over the common prefix of `a` and `b`.
///
/// Empty or zero-norm vectors score 0.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 0.0;
    }
    let (a, b) = (&a[..len], &b[..len]);

    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    (dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bmark(id: &str, tags: &[&str], embedding: Option<Vec<f32>>) -> Bookmark {
        Bookmark {
            id: id.to_string(),
            title: format!("title {id}"),
            url: format!("https://example.com/{id}"),
            summary: format!("summary {id}"),
            raw_content: Some("raw".to_string()),
            embedding,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    fn store() -> LocalStore {
        let mut corpus = HashMap::new();
        corpus.insert(
            OwnerId::from("alice"),
            vec![
                bmark("a1", &["Rust", "systems"], Some(vec![1.0, 0.0, 0.0])),
                bmark("a2", &["web"], Some(vec![0.9, 0.1, 0.0])),
                bmark("a3", &["rust"], Some(vec![0.0, 1.0, 0.0])),
                bmark("a4", &["rust"], None),
            ],
        );
        corpus.insert(
            OwnerId::from("bob"),
            vec![bmark("b1", &["rust", "private"], Some(vec![1.0, 0.0, 0.0]))],
        );
        LocalStore::from_corpus(corpus)
    }

    fn query(vector: &[f32]) -> CandidateQuery<'_> {
        CandidateQuery {
            vector,
            similarity_threshold: 0.1,
            max_count: 50,
            tag_ids: None,
            scope: None,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        // Length mismatch compares the common prefix
        assert!((cosine_similarity(&[1.0, 0.0, 5.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity_and_applies_threshold() {
        let store = store();
        let owner = OwnerId::from("alice");

        let results = store
            .search_candidates(&owner, query(&[1.0, 0.0, 0.0]))
            .await
            .unwrap();

        let ids: Vec<&str> = results.iter().map(|c| c.bookmark.id.as_str()).collect();
        // a3 is orthogonal (below threshold), a4 has no embedding
        assert_eq!(ids, vec!["a1", "a2"]);
        assert!(results[0].similarity > results[1].similarity);
    }

    #[tokio::test]
    async fn test_search_never_crosses_owners() {
        let store = store();

        let results = store
            .search_candidates(&OwnerId::from("alice"), query(&[1.0, 0.0, 0.0]))
            .await
            .unwrap();
        assert!(results.iter().all(|c| !c.bookmark.id.starts_with('b')));

        let results = store
            .search_candidates(&OwnerId::from("nobody"), query(&[1.0, 0.0, 0.0]))
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_tag_ids_is_owner_scoped() {
        let store = store();
        let names = vec!["rust".to_string(), "private".to_string(), "nope".to_string()];

        let alice = store
            .resolve_tag_ids(&OwnerId::from("alice"), &names)
            .await
            .unwrap();
        assert_eq!(alice.len(), 1);

        let bob = store
            .resolve_tag_ids(&OwnerId::from("bob"), &names)
            .await
            .unwrap();
        assert_eq!(bob.len(), 2);

        let nobody = store
            .resolve_tag_ids(&OwnerId::from("nobody"), &names)
            .await
            .unwrap();
        assert!(nobody.is_empty());
    }

    #[tokio::test]
    async fn test_search_with_tag_filter() {
        let store = store();
        let owner = OwnerId::from("alice");
        let ids = store
            .resolve_tag_ids(&owner, &["web".to_string()])
            .await
            .unwrap();

        let results = store
            .search_candidates(
                &owner,
                CandidateQuery {
                    tag_ids: Some(&ids),
                    ..query(&[1.0, 0.0, 0.0])
                },
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].bookmark.id, "a2");
    }

    #[tokio::test]
    async fn test_search_with_scope_and_limit() {
        let store = store();
        let owner = OwnerId::from("alice");
        let scope = vec!["a2".to_string(), "a3".to_string()];

        let results = store
            .search_candidates(
                &owner,
                CandidateQuery {
                    scope: Some(&scope),
                    similarity_threshold: -1.0,
                    ..query(&[1.0, 0.0, 0.0])
                },
            )
            .await
            .unwrap();
        let ids: Vec<&str> = results.iter().map(|c| c.bookmark.id.as_str()).collect();
        assert_eq!(ids, vec!["a2", "a3"]);

        let results = store
            .search_candidates(
                &owner,
                CandidateQuery {
                    max_count: 1,
                    ..query(&[1.0, 0.0, 0.0])
                },
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_tags_are_normalized_and_listed() {
        let store = store();
        let tags = store.tags(&OwnerId::from("alice")).await.unwrap();
        assert_eq!(tags, vec!["rust", "systems", "web"]);
    }

    #[tokio::test]
    async fn test_list_bookmarks_newest_first_and_limited() {
        use chrono::{Duration, TimeZone, Utc};

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let dated = |id: &str, days: i64| Bookmark {
            created_at: start + Duration::days(days),
            ..bmark(id, &[], None)
        };

        let mut corpus = HashMap::new();
        corpus.insert(
            OwnerId::from("alice"),
            vec![dated("old", 0), dated("new", 5), dated("mid", 2), dated("mid2", 2)],
        );
        let store = LocalStore::from_corpus(corpus);
        let owner = OwnerId::from("alice");

        let listed = store.list_bookmarks(&owner, 100).await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|b| b.bookmark.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "mid2", "old"]);

        assert_eq!(store.list_bookmarks(&owner, 2).await.unwrap().len(), 2);
        assert!(store
            .list_bookmarks(&OwnerId::from("nobody"), 100)
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalStore::load(tmp.path().join("missing.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_corpus_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bookmarks.json");
        std::fs::write(
            &path,
            r#"{"alice": [{"url": "https://example.com", "title": "t", "embedding": [1.0, 0.0]}]}"#,
        )
        .unwrap();

        let store = LocalStore::load(&path).unwrap();
        assert_eq!(store.len(), 1);
        // blank ids are derived from the url and survive a reload
        let corpus = store.owners.get(&OwnerId::from("alice")).unwrap();
        let id = corpus.bookmarks[0].id.clone();
        assert_eq!(id, bookmark_id_for_url("https://example.com"));

        let reloaded = LocalStore::load(&path).unwrap();
        assert_eq!(reloaded.owners[&OwnerId::from("alice")].bookmarks[0].id, id);
    }

    #[tokio::test]
    async fn test_derived_id_works_as_scope() {
        let mut corpus = HashMap::new();
        corpus.insert(
            OwnerId::from("alice"),
            vec![
                bmark("", &[], Some(vec![1.0, 0.0])),
                bmark("kept", &[], Some(vec![1.0, 0.0])),
            ],
        );
        let store = LocalStore::from_corpus(corpus);
        let scope = vec![bookmark_id_for_url("https://example.com/")];

        let results = store
            .search_candidates(
                &OwnerId::from("alice"),
                CandidateQuery {
                    scope: Some(&scope),
                    ..query(&[1.0, 0.0])
                },
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].bookmark.id, scope[0]);
    }

    #[tokio::test]
    async fn test_nan_embedding_never_becomes_a_candidate() {
        let mut corpus = HashMap::new();
        corpus.insert(
            OwnerId::from("alice"),
            vec![
                bmark("nan", &[], Some(vec![f32::NAN, 1.0])),
                bmark("low", &[], Some(vec![1.0, 1.0])),
                bmark("high", &[], Some(vec![1.0, 0.0])),
            ],
        );
        let store = LocalStore::from_corpus(corpus);

        let results = store
            .search_candidates(&OwnerId::from("alice"), query(&[1.0, 0.0]))
            .await
            .unwrap();

        let ids: Vec<&str> = results.iter().map(|c| c.bookmark.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "low"]);
    }

    #[test]
    fn test_load_malformed_corpus() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bookmarks.json");
        std::fs::write(&path, "[1, 2").unwrap();

        assert!(matches!(
            LocalStore::load(&path),
            Err(StoreError::Malformed(_))
        ));
    }
}
