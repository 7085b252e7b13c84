//! Knowledge retrieval for TaskHelm.
//!
//! One vector index on disk, two logical partitions selected by tag:
//! `documentation` (general Q&A) and `cookbook` (process guidance consulted
//! before planning). Ingestion runs once at startup and must complete before
//! any `ask` call — there is no partial-availability window.

pub mod retriever;
pub mod store;
pub mod tools;

pub use retriever::{KnowledgeRetriever, Topic};
pub use store::{Chunk, VectorStore};
pub use tools::{ProcessGuidanceTool, RetrieveDocsTool};
