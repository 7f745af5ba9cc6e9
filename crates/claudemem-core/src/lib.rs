//! claudemem-core: source discovery, AST extraction, symbol graph, and PageRank.
//!
//! The engine's static-analysis layer (spec.md §2 components: Source
//! Discovery, AST Extractor, Symbol Graph Builder, PageRank Engine). Turns a
//! project root into a hierarchy of [`unit::CodeUnit`]s plus a
//! [`graph::SymbolGraph`] and per-unit centrality scores; the retrieval and
//! enrichment layers (`claudemem-search`, `claudemem-backend`) build on top.

pub mod discovery;
pub mod graph;
pub mod hash;
pub mod incremental;
pub mod pagerank;
pub mod parser;
pub mod unit;

pub use discovery::{DiscoveryConfig, DiscoveryError, FileDescriptor, SourceDiscovery};
pub use graph::{Edge, EdgeType, GraphError, SymbolGraph};
pub use hash::{content_hash, unit_id};
pub use incremental::{detect_changes, ChangeSet};
pub use pagerank::{compute as compute_pagerank, PageRankConfig};
pub use parser::{CodeParser, ParserError, SupportedLanguage};
pub use unit::{AstExtractor, AstMetadata, CodeUnit, UnitType};
