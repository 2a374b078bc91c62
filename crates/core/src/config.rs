//! Configuration management for benebot.
//!
//! Configuration is merged from three layers, lowest precedence first:
//! - Built-in defaults
//! - Config file (`.benebot/config.yaml`)
//! - Environment variables (`BENEBOT_*`)
//! CLI flags are applied last via [`AppConfig::with_overrides`].
//!
//! Most state (index databases, session checkpoints, prompt overrides)
//! lives under `.benebot/` in the workspace directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .benebot/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Generation provider for the benefits ("pdf") source
    pub provider: String,

    /// Generation model for the benefits source
    pub model: String,

    /// Generation provider for the claims source
    pub claims_provider: String,

    /// Generation model for the claims source
    pub claims_model: String,

    /// Small model used for the routing classification call
    pub router_model: String,

    /// Embedding provider ("trigram", "ollama", "openai")
    pub embedding_provider: String,

    /// Embedding model identifier
    pub embedding_model: String,

    /// Embedding vector dimensions
    pub embedding_dimensions: usize,

    /// Ollama endpoint URL
    pub ollama_endpoint: String,

    /// API key for hosted providers (OpenAI)
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// The member this assistant is acting for
    pub member: MemberProfile,

    /// Numeric tunables for retrieval, history and guardrails
    pub tuning: Tuning,
}

/// The plan member the assistant personalizes replies for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberProfile {
    /// Full name, e.g. "Maria Martinez"
    pub name: String,
}

impl MemberProfile {
    /// First name used in greetings.
    pub fn first(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

impl Default for MemberProfile {
    fn default() -> Self {
        Self {
            name: "Maria Martinez".to_string(),
        }
    }
}

/// Tunable parameters with documented defaults.
///
/// Each field has an environment-variable override, listed in
/// [`Tuning::apply_env`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Retrieval depth for the benefits source (default 5)
    pub pdf_top_k: usize,

    /// Retrieval depth for the claims source (default 4)
    pub claims_top_k: usize,

    /// Maximum characters kept per retrieved chunk (default 900)
    pub max_chunk_chars: usize,

    /// Number of prior user/assistant pairs kept in prompt history (default 4)
    pub history_turns: usize,

    /// Acceptance threshold for the in-scope intent class (default 0.30)
    pub th_in_scope: f32,

    /// Acceptance threshold for the medical intent class (default 0.30)
    pub th_medical: f32,

    /// Acceptance threshold for the off-topic intent class (default 0.30)
    pub th_off_topic: f32,

    /// Per-turn deadline in seconds (default 120)
    pub turn_timeout_secs: u64,

    /// Capacity of the bounded event channel between agent tasks and the
    /// multiplexing consumer (default 64)
    pub event_buffer: usize,

    /// Ingestion chunk size in characters (default 800)
    pub chunk_size: usize,

    /// Ingestion chunk overlap in characters (default 100)
    pub chunk_overlap: usize,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            pdf_top_k: 5,
            claims_top_k: 4,
            max_chunk_chars: 900,
            history_turns: 4,
            th_in_scope: 0.30,
            th_medical: 0.30,
            th_off_topic: 0.30,
            turn_timeout_secs: 120,
            event_buffer: 64,
            chunk_size: 800,
            chunk_overlap: 100,
        }
    }
}

impl Tuning {
    /// Apply `BENEBOT_*` environment overrides to this tuning block.
    fn apply_env(&mut self) {
        read_env_num("BENEBOT_PDF_TOP_K", &mut self.pdf_top_k);
        read_env_num("BENEBOT_CLAIMS_TOP_K", &mut self.claims_top_k);
        read_env_num("BENEBOT_MAX_CHUNK_CHARS", &mut self.max_chunk_chars);
        read_env_num("BENEBOT_HISTORY_TURNS", &mut self.history_turns);
        read_env_num("BENEBOT_TH_IN_SCOPE", &mut self.th_in_scope);
        read_env_num("BENEBOT_TH_MEDICAL", &mut self.th_medical);
        read_env_num("BENEBOT_TH_OFF_TOPIC", &mut self.th_off_topic);
        read_env_num("BENEBOT_TURN_TIMEOUT_SECS", &mut self.turn_timeout_secs);
    }
}

/// Parse an environment variable into `target` if set and valid.
fn read_env_num<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(raw) = std::env::var(var) {
        match raw.parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => tracing::warn!("Ignoring invalid value for {}: {}", var, raw),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ConfigFile {
    llm: Option<LlmSection>,
    embedding: Option<EmbeddingSection>,
    member: Option<MemberProfile>,
    tuning: Option<Tuning>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct LlmSection {
    provider: Option<String>,
    model: Option<String>,
    claims_provider: Option<String>,
    claims_model: Option<String>,
    router_model: Option<String>,
    ollama_endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct EmbeddingSection {
    provider: Option<String>,
    model: Option<String>,
    dimensions: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "mistral".to_string(),
            claims_provider: "openai".to_string(),
            claims_model: "gpt-4o-mini".to_string(),
            router_model: "llama3.2:3b".to_string(),
            embedding_provider: "trigram".to_string(),
            embedding_model: "trigram-v1".to_string(),
            embedding_dimensions: 384,
            ollama_endpoint: "http://localhost:11434".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            member: MemberProfile::default(),
            tuning: Tuning::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Environment variables:
    /// - `BENEBOT_WORKSPACE`: Override workspace path
    /// - `BENEBOT_CONFIG`: Path to config file
    /// - `BENEBOT_PROVIDER`: Benefits generation provider
    /// - `BENEBOT_MODEL`: Benefits generation model
    /// - `BENEBOT_CLAIMS_PROVIDER` / `BENEBOT_CLAIMS_MODEL`
    /// - `BENEBOT_ROUTER_MODEL`
    /// - `BENEBOT_EMBED_PROVIDER` / `BENEBOT_EMBED_MODEL`
    /// - `BENEBOT_OLLAMA_URL`
    /// - `BENEBOT_API_KEY` (falls back to `OPENAI_API_KEY`)
    /// - Tuning overrides, see [`Tuning`]
    /// - `RUST_LOG`, `NO_COLOR`
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("BENEBOT_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("BENEBOT_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = if let Some(ref cf) = config.config_file {
            cf.clone()
        } else {
            config.workspace.join(".benebot/config.yaml")
        };

        if config_path.exists() {
            config.merge_yaml(&config_path)?;
        }

        // Environment variables override the YAML file
        if let Ok(provider) = std::env::var("BENEBOT_PROVIDER") {
            config.provider = provider;
        }
        if let Ok(model) = std::env::var("BENEBOT_MODEL") {
            config.model = model;
        }
        if let Ok(provider) = std::env::var("BENEBOT_CLAIMS_PROVIDER") {
            config.claims_provider = provider;
        }
        if let Ok(model) = std::env::var("BENEBOT_CLAIMS_MODEL") {
            config.claims_model = model;
        }
        if let Ok(model) = std::env::var("BENEBOT_ROUTER_MODEL") {
            config.router_model = model;
        }
        if let Ok(provider) = std::env::var("BENEBOT_EMBED_PROVIDER") {
            config.embedding_provider = provider;
        }
        if let Ok(model) = std::env::var("BENEBOT_EMBED_MODEL") {
            config.embedding_model = model;
        }
        if let Ok(url) = std::env::var("BENEBOT_OLLAMA_URL") {
            config.ollama_endpoint = url;
        }

        config.api_key = std::env::var("BENEBOT_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok();
        if config.log_level.is_none() {
            config.log_level = std::env::var("RUST_LOG").ok();
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        config.tuning.apply_env();

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &PathBuf) -> AppResult<()> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        if let Some(llm) = file.llm {
            merge_opt(&mut self.provider, llm.provider);
            merge_opt(&mut self.model, llm.model);
            merge_opt(&mut self.claims_provider, llm.claims_provider);
            merge_opt(&mut self.claims_model, llm.claims_model);
            merge_opt(&mut self.router_model, llm.router_model);
            merge_opt(&mut self.ollama_endpoint, llm.ollama_endpoint);
        }

        if let Some(embedding) = file.embedding {
            merge_opt(&mut self.embedding_provider, embedding.provider);
            merge_opt(&mut self.embedding_model, embedding.model);
            if let Some(dims) = embedding.dimensions {
                self.embedding_dimensions = dims;
            }
        }

        if let Some(member) = file.member {
            self.member = member;
        }

        if let Some(tuning) = file.tuning {
            self.tuning = tuning;
        }

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
        }

        Ok(())
    }

    /// Apply CLI overrides, giving flags precedence over everything else.
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .benebot directory.
    pub fn benebot_dir(&self) -> PathBuf {
        self.workspace.join(".benebot")
    }

    /// Ensure the .benebot directory exists.
    pub fn ensure_benebot_dir(&self) -> AppResult<()> {
        let dir = self.benebot_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .benebot directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Path of the session checkpoint database.
    pub fn checkpoint_db_path(&self) -> PathBuf {
        self.benebot_dir().join("checkpoints.sqlite3")
    }

    /// Path of a knowledge source's vector index database.
    pub fn index_db_path(&self, source: &str) -> PathBuf {
        self.benebot_dir().join(format!("index-{}.sqlite3", source))
    }
}

/// Replace `target` with `value` when the option is set.
fn merge_opt(target: &mut String, value: Option<String>) {
    if let Some(value) = value {
        *target = value;
    }
}
