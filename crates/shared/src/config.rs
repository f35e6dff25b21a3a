use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use crate::importance::Criterion;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Embedding provider settings
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub use_remote: bool,
    pub model: String,
    pub batch_size: usize,
    /// Above this many texts the local backend is always used
    pub max_remote_items: usize,
    /// Number of title+body chars fed to the embedder per article
    pub text_chars: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            use_remote: true,
            model: "text-embedding-3-small".to_string(),
            batch_size: 32,
            max_remote_items: 200,
            text_chars: 600,
        }
    }
}

/// Similarity clusterer settings
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub similarity_threshold: f64,
    pub min_cluster_size: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.6,
            min_cluster_size: 2,
        }
    }
}

/// Importance scoring and filtering settings
#[derive(Debug, Clone)]
pub struct ImportanceConfig {
    pub min_avg_importance: f64,
    /// Per-criterion floor, 0 disables the check
    pub min_any_criterion: f64,
    pub weights: BTreeMap<String, f64>,
    pub use_external_rater: bool,
    /// Only the first N groups (by size) go to the external rater
    pub rater_top_n: usize,
    pub model: String,
    pub bundle_chars: usize,
}

impl Default for ImportanceConfig {
    fn default() -> Self {
        Self {
            min_avg_importance: 6.0,
            min_any_criterion: 0.0,
            weights: Criterion::ALL
                .iter()
                .map(|c| (c.as_str().to_string(), 1.0))
                .collect(),
            use_external_rater: true,
            rater_top_n: 10,
            model: "gpt-4o-mini".to_string(),
            bundle_chars: 4500,
        }
    }
}

/// Bounded retry with exponential backoff for remote calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,
    pub initial_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            initial_delay: Duration::from_millis(600),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Remote API credentials, absent when no key is configured
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api: Option<ApiConfig>,
    pub embedding: EmbeddingConfig,
    pub cluster: ClusterConfig,
    pub importance: ImportanceConfig,
    pub retry: RetryPolicy,
    /// Groups considered downstream of clustering
    pub max_groups: usize,
    pub max_reps_per_lean: usize,
    pub max_text_extract: usize,
    pub scoring_concurrency: usize,
    /// Lifetime of cached article text and story summaries
    pub cache_ttl_hours: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: None,
            embedding: EmbeddingConfig::default(),
            cluster: ClusterConfig::default(),
            importance: ImportanceConfig::default(),
            retry: RetryPolicy::default(),
            max_groups: 25,
            max_reps_per_lean: 5,
            max_text_extract: 5000,
            scoring_concurrency: 4,
            cache_ttl_hours: 24,
        }
    }
}

impl Config {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_hours * 3600)
    }

    /// Build a config from the environment.
    ///
    /// A missing `OPENAI_API_KEY` is not an error: remote embeddings and the
    /// external rater are simply unavailable and the local fallbacks run.
    pub fn from_env() -> Self {
        // Try to load .env from multiple locations
        Self::try_load_dotenv();

        let mut config = Self::default();

        config.api = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(|api_key| ApiConfig {
                api_key,
                base_url: env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            });

        if let Ok(model) = env::var("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(model) = env::var("MODEL_NAME") {
            config.importance.model = model;
        }

        config
    }

    /// Turn off every remote collaborator
    pub fn local_only(mut self) -> Self {
        self.embedding.use_remote = false;
        self.importance.use_external_rater = false;
        self
    }

    pub fn remote_embeddings_enabled(&self) -> bool {
        self.api.is_some() && self.embedding.use_remote
    }

    pub fn external_rater_enabled(&self) -> bool {
        self.api.is_some() && self.importance.use_external_rater
    }

    fn try_load_dotenv() {
        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/cross-spectrum/.env
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("cross-spectrum").join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() {
                let _ = dotenvy::from_path(&home_path);
            }
        }
    }
}
