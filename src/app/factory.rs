use crate::{
    auth::Authenticator,
    config::Config,
    providers::{OpenAiEmbedder, OpenAiGenerator},
    rag::QueryEngine,
    store::{LocalStore, CORPUS_FILE},
};
use anyhow::{Context, Result};
use homedir::my_home;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Application factory for creating and configuring application components
pub struct AppFactory;

impl AppFactory {
    /// Get application paths, creating the base directory if needed
    pub fn get_paths() -> Result<AppPaths> {
        let base_path = Self::get_base_path()?;

        std::fs::create_dir_all(&base_path)
            .context("Failed to create application base directory")?;

        Ok(AppPaths::new(base_path))
    }

    /// Load and validate configuration from the base path
    pub fn create_config(paths: &AppPaths) -> Result<Config> {
        let config = Config::load_with(&paths.base_path).with_context(|| {
            format!(
                "Failed to load config from {}",
                paths.base_path.display()
            )
        })?;

        log::debug!("Using config from {}", config.base_path().display());
        Ok(config)
    }

    /// Build the query engine over the local corpus and the configured providers
    pub fn create_engine(config: &Config, paths: &AppPaths) -> Result<QueryEngine> {
        let store = LocalStore::load(&paths.corpus_path).with_context(|| {
            format!("Failed to load corpus from {}", paths.corpus_path.display())
        })?;

        let embedder =
            OpenAiEmbedder::new(&config.embedder).context("Failed to create embedder")?;
        let generator =
            OpenAiGenerator::new(&config.generator).context("Failed to create generator")?;

        log::info!(
            "Engine ready: embedder={} generator={} top_k={}",
            config.embedder.model,
            config.generator.model,
            config.query.top_k
        );

        Ok(QueryEngine::new(
            config.query.clone(),
            Arc::new(embedder),
            Arc::new(store),
            Arc::new(generator),
        ))
    }

    /// Build the HTTP authenticator. Only the server needs one, so the
    /// token requirement is checked here rather than on every config load.
    pub fn create_authenticator(config: &Config) -> Result<Authenticator> {
        config
            .validate_serving()
            .context("Refusing to serve with this auth config")?;

        let auth = Authenticator::from_config(&config.auth);
        if !auth.require_auth() {
            log::warn!(
                "Authentication is disabled; every request reads the corpus of {}",
                config.auth.anon_owner
            );
        }
        Ok(auth)
    }

    /// Get the base path for the application
    fn get_base_path() -> Result<PathBuf> {
        if let Ok(base_path) = std::env::var("HYPERMEMO_BASE_PATH") {
            return Ok(PathBuf::from(base_path));
        }

        let home = my_home()
            .context("Could not determine home directory")?
            .context("Home directory path is empty")?;

        Ok(home.join(".local/share/hypermemo"))
    }
}

/// Application paths structure
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub base_path: PathBuf,
    pub corpus_path: PathBuf,
}

impl AppPaths {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        let base_path = base_path.as_ref().to_path_buf();
        Self {
            corpus_path: base_path.join(CORPUS_FILE),
            base_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenEntry;

    #[test]
    fn test_app_paths() {
        let paths = AppPaths::new("/test/base");

        assert_eq!(paths.base_path, PathBuf::from("/test/base"));
        assert_eq!(paths.corpus_path, PathBuf::from("/test/base/bookmarks.json"));
    }

    #[test]
    fn test_create_engine_with_missing_corpus() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = AppPaths::new(tmp.path());

        let mut config = Config::default();
        config.query.top_k = 3;
        config.auth.tokens.push(TokenEntry {
            token: "secret".to_string(),
            owner: "alice".to_string(),
        });

        let engine = AppFactory::create_engine(&config, &paths).unwrap();
        assert_eq!(engine.config().top_k, 3);
    }

    #[test]
    fn test_fresh_install_can_ask_but_not_serve() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = AppPaths::new(tmp.path().join("fresh"));

        let config = AppFactory::create_config(&paths).unwrap();
        assert!(config.auth.require_auth);
        assert!(config.auth.tokens.is_empty());

        // the `ask` and `tags` path
        let engine = AppFactory::create_engine(&config, &paths).unwrap();
        assert_eq!(engine.config().top_k, 5);

        // the `serve` path
        let err = AppFactory::create_authenticator(&config).err().unwrap();
        assert!(format!("{err:#}").contains("no auth.tokens"));

        let mut open = config.clone();
        open.auth.require_auth = false;
        assert!(!AppFactory::create_authenticator(&open).unwrap().require_auth());
    }

    #[test]
    fn test_create_engine_rejects_malformed_corpus() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = AppPaths::new(tmp.path());
        std::fs::write(&paths.corpus_path, "not json").unwrap();

        let err = AppFactory::create_engine(&Config::default(), &paths)
            .err()
            .unwrap();
        assert!(err.to_string().contains("Failed to load corpus"));
    }
}
