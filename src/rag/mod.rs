//! Retrieval-augmented answering over an owner's bookmarks.
//!
//! `tags` turns tag names into store ids, `ranker` re-scores retrieved
//! candidates, `sources` renders the citation block and `engine` drives
//! the whole query.

pub mod engine;
pub mod error;
pub mod ranker;
pub mod sources;
pub mod tags;

pub use engine::{AskRequest, AskResponse, QueryEngine};
pub use error::QueryError;
pub use ranker::{BoostStrategy, BOOST_WEIGHT};
