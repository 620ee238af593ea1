use crate::{
    bookmarks::normalize_tags,
    ids::{OwnerId, TagId},
    store::{CandidateStore, StoreError},
};

/// Outcome of resolving requested tag names for one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagFilter {
    /// No tags were requested; retrieval runs over the whole corpus.
    Unfiltered,
    /// At least one requested tag exists for the owner.
    Resolved(Vec<TagId>),
    /// Tags were requested but none exist for the owner. Retrieval must not
    /// run, since an empty id filter would read as "no filter".
    Unsatisfiable,
}

impl TagFilter {
    /// Ids to pass to the store, `None` for an unfiltered search.
    pub fn ids(&self) -> Option<&[TagId]> {
        match self {
            TagFilter::Resolved(ids) => Some(ids.as_slice()),
            TagFilter::Unfiltered | TagFilter::Unsatisfiable => None,
        }
    }
}

/// Resolves `tag_names` against the owner's tags in `store`.
///
/// Names are normalized and deduplicated first. An empty (or all-blank)
/// request never touches the store.
pub async fn resolve_tags<S>(
    store: &S,
    owner: &OwnerId,
    tag_names: &[String],
) -> Result<TagFilter, StoreError>
where
    S: CandidateStore + ?Sized,
{
    let names = normalize_tags(tag_names);
    if names.is_empty() {
        return Ok(TagFilter::Unfiltered);
    }

    let mut ids = store.resolve_tag_ids(owner, &names).await?;
    ids.sort();
    ids.dedup();

    if ids.is_empty() {
        log::debug!("none of {names:?} exist for owner {owner}");
        Ok(TagFilter::Unsatisfiable)
    } else {
        Ok(TagFilter::Resolved(ids))
    }
}
