//! claudemem-search: the embed/lexical/index-store/retrieval layer (spec.md §4.8-§4.9).
//!
//! This crate owns everything that turns a project's indexed [`claudemem_core::CodeUnit`]s
//! into search results: the embedded SQLite [`store::IndexStore`], BM25 lexical
//! scoring in [`lexical`], the local/remote embed [`embeddings`] providers, and
//! the hybrid fusion [`hybrid::Retriever`].

pub mod embeddings;
pub mod error;
pub mod hybrid;
pub mod lexical;
pub mod schema;
pub mod store;

pub use error::{Result, SearchError};
pub use hybrid::{
    ContextExpansion, FeedbackEvent, FeedbackSignal, RetrievalMode, Retriever, RetrieverConfig, SearchResult,
};
pub use lexical::{tokenize, LexicalIndex};
pub use store::{cosine_similarity, IndexStore, QueryFilters, ScoredUnit};
