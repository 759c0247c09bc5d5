//! Configuration management for Courier.
//!
//! Configuration is merged from several sources, later ones winning:
//! - Built-in defaults
//! - The workspace config file (`.courier/config.yaml`)
//! - Environment variables (`COURIER_*`, `OLLAMA_URL`, `RUST_LOG`, `NO_COLOR`)
//! - Command-line flags
//!
//! Relative directories are resolved against the workspace root.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .courier/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Index maintenance settings
    pub index: IndexSection,

    /// Embedding model settings
    pub embedding: EmbeddingSection,

    /// Answer-generation model settings
    pub llm: LlmSection,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub log_json: bool,
}

/// Watched directory, snapshot location and chunking parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexSection {
    /// Directory the mail collaborators drop attachments into
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Directory holding the persisted snapshot
    #[serde(default = "default_persist_dir")]
    pub persist_dir: PathBuf,

    /// File suffixes that count as documents (without the dot)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Descend into subdirectories when loading
    #[serde(default)]
    pub recursive: bool,

    /// Maximum chunk length in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Default number of chunks returned by a query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Coalescing window for watcher events; unset means one rebuild per event
    #[serde(default)]
    pub debounce_ms: Option<u64>,
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingSection {
    /// Provider name: "trigram" or "ollama"
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// Model identifier (provider-specific)
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding vector dimensions
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Texts per embedding request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Endpoint for HTTP providers
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Answer-generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LlmSection {
    /// Provider name (currently "ollama")
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// Model identifier
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Endpoint override
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("attachments")
}

fn default_persist_dir() -> PathBuf {
    PathBuf::from("index")
}

fn default_extensions() -> Vec<String> {
    vec!["pdf".to_string(), "txt".to_string(), "md".to_string()]
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    100
}

fn default_top_k() -> usize {
    3
}

fn default_embedding_provider() -> String {
    "trigram".to_string()
}

fn default_embedding_model() -> String {
    "trigram-v1".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_batch_size() -> usize {
    32
}

fn default_llm_provider() -> String {
    "ollama".to_string()
}

fn default_llm_model() -> String {
    "llama3".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

impl Default for IndexSection {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            persist_dir: default_persist_dir(),
            extensions: default_extensions(),
            recursive: false,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            debounce_ms: None,
        }
    }
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            batch_size: default_batch_size(),
            endpoint: None,
        }
    }
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            endpoint: None,
            temperature: default_temperature(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    index: Option<IndexSection>,
    embedding: Option<EmbeddingSection>,
    llm: Option<LlmSection>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            index: IndexSection::default(),
            embedding: EmbeddingSection::default(),
            llm: LlmSection::default(),
            log_level: None,
            verbose: false,
            no_color: false,
            log_json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the workspace config file and
    /// environment variables.
    ///
    /// Environment variables:
    /// - `COURIER_WORKSPACE`: Override workspace path
    /// - `COURIER_CONFIG`: Path to config file
    /// - `COURIER_SOURCE_DIR`: Watched attachments directory
    /// - `COURIER_INDEX_DIR`: Snapshot directory
    /// - `COURIER_EMBEDDING_PROVIDER`: Embedding provider
    /// - `COURIER_LLM_MODEL`: Answer-generation model
    /// - `OLLAMA_URL`: Endpoint shared by the Ollama clients
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use courier_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Watching: {:?}", config.source_dir());
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], with an explicit workspace and config file
    /// taking precedence over `COURIER_WORKSPACE` and `COURIER_CONFIG`.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) =
            workspace.or_else(|| std::env::var_os("COURIER_WORKSPACE").map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        if let Some(config_file) =
            config_file.or_else(|| std::env::var_os("COURIER_CONFIG").map(PathBuf::from))
        {
            config.config_file = Some(config_file);
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.courier_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        config.apply_env();

        Ok(config)
    }

    /// Overlay environment variables on top of file settings.
    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("COURIER_SOURCE_DIR") {
            self.index.source_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("COURIER_INDEX_DIR") {
            self.index.persist_dir = PathBuf::from(dir);
        }

        if let Ok(provider) = std::env::var("COURIER_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider;
        }

        if let Ok(model) = std::env::var("COURIER_LLM_MODEL") {
            self.llm.model = model;
        }

        if let Ok(url) = std::env::var("OLLAMA_URL") {
            self.llm.endpoint = Some(url.clone());
            self.embedding.endpoint = Some(url);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            self.no_color = true;
        }
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(index) = config_file.index {
            result.index = index;
        }

        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }

        if let Some(llm) = config_file.llm {
            result.llm = llm;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.log_json = json;
            }
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        source_dir: Option<PathBuf>,
        persist_dir: Option<PathBuf>,
        embedding_provider: Option<String>,
        llm_model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(source_dir) = source_dir {
            self.index.source_dir = source_dir;
        }

        if let Some(persist_dir) = persist_dir {
            self.index.persist_dir = persist_dir;
        }

        if let Some(provider) = embedding_provider {
            self.embedding.provider = provider;
        }

        if let Some(model) = llm_model {
            self.llm.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .courier directory.
    pub fn courier_dir(&self) -> PathBuf {
        self.workspace.join(".courier")
    }

    /// Watched attachments directory, resolved against the workspace.
    pub fn source_dir(&self) -> PathBuf {
        self.resolve(&self.index.source_dir)
    }

    /// Snapshot directory, resolved against the workspace.
    pub fn persist_dir(&self) -> PathBuf {
        self.resolve(&self.index.persist_dir)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    /// Validate settings that would otherwise fail deep inside a rebuild.
    pub fn validate(&self) -> AppResult<()> {
        let index = &self.index;

        if index.chunk_size == 0 {
            return Err(AppError::Config("chunkSize must be positive".to_string()));
        }

        if index.chunk_overlap >= index.chunk_size {
            return Err(AppError::Config(format!(
                "chunkOverlap ({}) must be smaller than chunkSize ({})",
                index.chunk_overlap, index.chunk_size
            )));
        }

        if index.top_k == 0 {
            return Err(AppError::Config("topK must be positive".to_string()));
        }

        if index.extensions.is_empty() {
            return Err(AppError::Config(
                "At least one document extension is required".to_string(),
            ));
        }

        if self.embedding.dimensions == 0 || self.embedding.batch_size == 0 {
            return Err(AppError::Config(
                "Embedding dimensions and batchSize must be positive".to_string(),
            ));
        }

        let known_llm = ["ollama"];
        if !known_llm.contains(&self.llm.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown LLM provider: {}. Supported: {}",
                self.llm.provider,
                known_llm.join(", ")
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.index.chunk_size, 1000);
        assert_eq!(config.index.chunk_overlap, 100);
        assert_eq!(config.index.top_k, 3);
        assert_eq!(config.embedding.provider, "trigram");
        assert_eq!(config.llm.model, "llama3");
        assert!(config.index.debounce_ms.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_paths_resolve_against_workspace() {
        let config = AppConfig {
            workspace: PathBuf::from("/srv/mail"),
            ..Default::default()
        };
        assert_eq!(config.source_dir(), PathBuf::from("/srv/mail/attachments"));
        assert_eq!(config.persist_dir(), PathBuf::from("/srv/mail/index"));
        assert!(config.courier_dir().ends_with(".courier"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            Some(PathBuf::from("/tmp/inbox")),
            None,
            Some("ollama".to_string()),
            Some("mistral".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.source_dir(), PathBuf::from("/tmp/inbox"));
        assert_eq!(overridden.embedding.provider, "ollama");
        assert_eq!(overridden.llm.model, "mistral");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_load_from_explicit_workspace() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(".courier")).unwrap();
        std::fs::write(
            temp.path().join(".courier").join("config.yaml"),
            "index:\n  topK: 5\n",
        )
        .unwrap();

        let config = AppConfig::load_from(Some(temp.path().to_path_buf()), None).unwrap();
        assert_eq!(config.workspace, temp.path());
        assert_eq!(config.index.top_k, 5);
    }

    #[test]
    fn test_load_from_missing_workspace() {
        let temp = TempDir::new().unwrap();
        let result = AppConfig::load_from(Some(temp.path().join("missing")), None);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_merge_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            "index:\n  sourceDir: inbox\n  chunkSize: 500\n  chunkOverlap: 50\n  debounceMs: 250\n\
             logging:\n  level: warn\n  color: false\n",
        )
        .unwrap();

        let config = AppConfig {
            workspace: temp.path().to_path_buf(),
            ..Default::default()
        };
        let merged = config.merge_yaml(&path).unwrap();

        assert_eq!(merged.index.source_dir, PathBuf::from("inbox"));
        assert_eq!(merged.index.chunk_size, 500);
        assert_eq!(merged.index.chunk_overlap, 50);
        assert_eq!(merged.index.top_k, 3);
        assert_eq!(merged.index.debounce_ms, Some(250));
        assert_eq!(merged.log_level, Some("warn".to_string()));
        assert!(merged.no_color);
    }

    #[test]
    fn test_validate_overlap_must_be_smaller() {
        let mut config = AppConfig::default();
        config.index.chunk_overlap = config.index.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_unknown_llm_provider() {
        let mut config = AppConfig::default();
        config.llm.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }
}
