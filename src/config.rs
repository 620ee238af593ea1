use crate::rag::{BoostStrategy, BOOST_WEIGHT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Default number of citations returned per query
pub const DEFAULT_TOP_K: usize = 5;
/// Default similarity floor passed to the candidate store
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.1;
/// Default number of raw candidates fetched for re-ranking
pub const DEFAULT_CANDIDATE_COUNT: usize = 50;
/// Minimum trimmed question length
pub const DEFAULT_MIN_QUESTION_CHARS: usize = 3;
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 60;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-small";
const DEFAULT_GEN_MODEL: &str = "gpt-4o";
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_EMBED_TIMEOUT_SECS: u64 = 30;
const DEFAULT_GEN_TIMEOUT_SECS: u64 = 60;

const DEFAULT_ANON_OWNER: &str = "dev-anon";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config is malformed: {0}")]
    Malformed(#[from] serde_yml::Error),

    #[error("config file is not valid utf8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("{0}")]
    Invalid(String),
}

/// Knobs of the query pipeline. Passed to the engine by value so tests can
/// vary them without touching global state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Maximum number of matches returned to the caller
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Maximum score shift contributed by tag overlap
    #[serde(default = "default_boost_weight")]
    pub boost_weight: f32,

    /// How tag overlap is turned into a boost
    #[serde(default)]
    pub boost_strategy: BoostStrategy,

    /// Similarity floor for candidate retrieval [-1.0, 1.0]
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// How many candidates to fetch before re-ranking
    #[serde(default = "default_candidate_count")]
    pub candidate_count: usize,

    /// Trimmed questions must be at least this long
    #[serde(default = "default_min_question_chars")]
    pub min_question_chars: usize,

    /// Deadline for the whole query, external calls included
    #[serde(default = "default_query_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            boost_weight: BOOST_WEIGHT,
            boost_strategy: BoostStrategy::default(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            candidate_count: DEFAULT_CANDIDATE_COUNT,
            min_question_chars: DEFAULT_MIN_QUESTION_CHARS,
            timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_boost_weight() -> f32 {
    BOOST_WEIGHT
}

fn default_similarity_threshold() -> f32 {
    DEFAULT_SIMILARITY_THRESHOLD
}

fn default_candidate_count() -> usize {
    DEFAULT_CANDIDATE_COUNT
}

fn default_min_question_chars() -> usize {
    DEFAULT_MIN_QUESTION_CHARS
}

fn default_query_timeout_secs() -> u64 {
    DEFAULT_QUERY_TIMEOUT_SECS
}

/// An OpenAI-compatible HTTP endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    pub model: String,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    pub timeout_secs: u64,
}

impl ProviderConfig {
    fn embedder() -> Self {
        Self {
            api_base: default_api_base(),
            model: DEFAULT_EMBED_MODEL.to_string(),
            api_key_env: default_api_key_env(),
            timeout_secs: DEFAULT_EMBED_TIMEOUT_SECS,
        }
    }

    fn generator() -> Self {
        Self {
            api_base: default_api_base(),
            model: DEFAULT_GEN_MODEL.to_string(),
            api_key_env: default_api_key_env(),
            timeout_secs: DEFAULT_GEN_TIMEOUT_SECS,
        }
    }

    /// Reads the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        url::Url::parse(&self.api_base).map_err(|err| {
            ConfigError::Invalid(format!(
                "{section}.api_base is not a valid url ({err}): {:?}",
                self.api_base
            ))
        })?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("{section}.model must not be empty")));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid(format!(
                "{section}.timeout_secs must be greater than 0"
            )));
        }

        Ok(())
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_embedder() -> ProviderConfig {
    ProviderConfig::embedder()
}

fn default_generator() -> ProviderConfig {
    ProviderConfig::generator()
}

/// A bearer token and the owner it authenticates as.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub token: String,
    pub owner: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_require_auth")]
    pub require_auth: bool,

    /// Owner used for every request when auth is disabled
    #[serde(default = "default_anon_owner")]
    pub anon_owner: String,

    #[serde(default)]
    pub tokens: Vec<TokenEntry>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            anon_owner: DEFAULT_ANON_OWNER.to_string(),
            tokens: vec![],
        }
    }
}

fn default_require_auth() -> bool {
    true
}

fn default_anon_owner() -> String {
    DEFAULT_ANON_OWNER.to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default = "default_embedder")]
    pub embedder: ProviderConfig,
    #[serde(default = "default_generator")]
    pub generator: ProviderConfig,
    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            query: QueryConfig::default(),
            embedder: ProviderConfig::embedder(),
            generator: ProviderConfig::generator(),
            auth: AuthConfig::default(),
            base_path: PathBuf::new(),
        }
    }
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

/// Parses boolean-ish env values; anything but an explicit "off" is `true`.
fn env_flag_enabled(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let query = &self.query;
        if query.top_k == 0 {
            return Err(ConfigError::Invalid(
                "query.top_k must be greater than 0".to_string(),
            ));
        }

        if query.candidate_count < query.top_k {
            return Err(ConfigError::Invalid(format!(
                "query.candidate_count ({}) must not be smaller than query.top_k ({})",
                query.candidate_count, query.top_k
            )));
        }

        if !(-1.0..=1.0).contains(&query.similarity_threshold) {
            return Err(ConfigError::Invalid(format!(
                "query.similarity_threshold must be between -1.0 and 1.0, got {}",
                query.similarity_threshold
            )));
        }

        if !query.boost_weight.is_finite() || query.boost_weight < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "query.boost_weight must be a non-negative number, got {}",
                query.boost_weight
            )));
        }

        if query.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "query.timeout_secs must be greater than 0".to_string(),
            ));
        }

        self.embedder.validate("embedder")?;
        self.generator.validate("generator")?;

        let auth = &self.auth;
        if auth.anon_owner.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "auth.anon_owner must not be empty".to_string(),
            ));
        }

        for (idx, entry) in auth.tokens.iter().enumerate() {
            let idx = idx + 1;
            if entry.token.trim().is_empty() || entry.owner.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "auth token #{idx} needs both a token and an owner"
                )));
            }
        }

        Ok(())
    }

    /// Extra checks for the HTTP server. CLI commands never authenticate,
    /// so only `serve` needs tokens when auth is required.
    pub fn validate_serving(&self) -> Result<(), ConfigError> {
        if self.auth.require_auth && self.auth.tokens.is_empty() {
            return Err(ConfigError::Invalid(
                "auth.require_auth is on but no auth.tokens are configured".to_string(),
            ));
        }

        Ok(())
    }

    /// Applies environment overrides on top of the file contents.
    fn apply_env(&mut self) {
        if let Ok(value) = std::env::var("HYPERMEMO_REQUIRE_AUTH") {
            self.auth.require_auth = env_flag_enabled(&value);
        }
    }

    /// Loads `config.yaml` from `base_path`, creating it with defaults when
    /// it does not exist yet.
    pub fn load_with(base_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let base_path = base_path.as_ref();
        let path = base_path.join(CONFIG_FILE);

        // create new if does not exist
        if !path.exists() {
            log::info!("Creating default config at {}", path.display());
            std::fs::create_dir_all(base_path)?;
            std::fs::write(&path, serde_yml::to_string(&Self::default())?)?;
        }

        let config_str = String::from_utf8(std::fs::read(&path)?)?;
        let mut config: Self = serde_yml::from_str(&config_str)?;

        config.base_path = base_path.to_path_buf();

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        config.apply_env();
        config.validate()?;

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let config_str = serde_yml::to_string(&self)?;
        std::fs::write(self.base_path.join(CONFIG_FILE), config_str)?;
        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}
