pub mod assets;
pub mod cli;
pub mod config;
pub mod embedding;
mod metrics;
pub mod pipeline;
pub mod registry;
pub mod search;
mod server;
pub mod store;
pub mod utils;

pub use config::Opts;
pub use embedding::{ClipResult, EmbeddingProvider};
pub use pipeline::{CancelToken, IndexEvent, IndexSummary, Indexer};
pub use registry::Registry;
pub use search::{SearchError, SearchOutcome, SearchService};
pub use store::{MemoryVectorStore, SqliteVectorStore, VectorStore};
