// Public modules
pub mod cache;
pub mod clustering;
pub mod config;
pub mod digest;
pub mod embedding;
pub mod error;
pub mod importance;
pub mod io;
pub mod models;
pub mod openai;
pub mod pipeline;
pub mod representatives;
pub mod retry;

// Re-export commonly used types
pub use cache::{Cache, MemoryCache};
pub use clustering::SimilarityClusterer;
pub use config::Config;
pub use digest::StoryDigest;
pub use embedding::{EmbeddingBackend, EmbeddingProvider, LocalTfidfBackend, RemoteEmbeddingBackend};
pub use error::ExternalError;
pub use importance::{Criterion, ImportanceScorer, ImportanceScores, RatingSource};
pub use io::{get_default_stories_dir, load_articles, load_report, save_report};
pub use models::{Article, ArticleRecord, Lean, RunReport, RunStats, StoryGroup, StoryReport};
pub use pipeline::{Pipeline, RunOutcome, Stage};
pub use representatives::RepresentativeSelector;
