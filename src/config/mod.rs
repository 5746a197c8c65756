use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub embedding: EmbeddingConfig,
    pub recommendation: RecommendationConfig,
    pub training: TrainingConfig,
    pub interactions: InteractionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model_path: String,
    pub dimension: usize,
    /// Maximum number of cached item embeddings; 0 disables the cache.
    pub cache_size: usize,
    pub context_window_size: usize,
    pub batch_size: usize,
    pub thread_count: usize,
    /// Concurrent provider calls allowed per request.
    pub max_concurrency: usize,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    pub default_limit: usize,
    pub max_limit: usize,
    /// When false, generator output is re-scored by the vector scorer whenever
    /// an active model exists and the text is kept only as reasoning.
    pub text_scores_authoritative: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub max_commit_retries: usize,
    pub retry_backoff_ms: u64,
    pub item_limit: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LastClickedPolicy {
    /// Last write wins, even when an older event arrives late.
    #[default]
    Overwrite,
    /// Only move `last_clicked` forward in time.
    Monotonic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionConfig {
    pub last_clicked_policy: LastClickedPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                workers: num_cpus::get(),
            },
            embedding: EmbeddingConfig {
                provider: "hashing".to_string(),
                model_path: "./models/llama-2-7b-chat.gguf".to_string(),
                dimension: 256,
                cache_size: 10_000,
                context_window_size: 2048,
                batch_size: 512,
                thread_count: 4,
                max_concurrency: 4,
                timeout_ms: 30_000,
            },
            recommendation: RecommendationConfig {
                default_limit: 10,
                max_limit: 100,
                text_scores_authoritative: false,
            },
            training: TrainingConfig {
                max_commit_retries: 3,
                retry_backoff_ms: 200,
                item_limit: 10_000,
            },
            interactions: InteractionConfig {
                last_clicked_policy: LastClickedPolicy::Overwrite,
            },
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?)
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("CLICKRANK").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when it exists; otherwise defaults with environment overrides.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        if std::path::Path::new(path).exists() {
            return Self::from_file(path);
        }

        tracing::info!("Config file {} not found, using defaults", path);
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?)
            .add_source(config::Environment::with_prefix("CLICKRANK").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.embedding.dimension == 0 {
            anyhow::bail!("embedding.dimension must be greater than zero");
        }
        if self.embedding.max_concurrency == 0 {
            anyhow::bail!("embedding.max_concurrency must be greater than zero");
        }
        if self.embedding.timeout_ms == 0 {
            anyhow::bail!("embedding.timeout_ms must be greater than zero");
        }
        if self.recommendation.default_limit == 0 || self.recommendation.max_limit == 0 {
            anyhow::bail!("recommendation limits must be greater than zero");
        }
        if self.recommendation.default_limit > self.recommendation.max_limit {
            anyhow::bail!("recommendation.default_limit cannot exceed recommendation.max_limit");
        }
        Ok(())
    }
}
