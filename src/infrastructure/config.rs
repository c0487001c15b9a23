use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::domain::ChunkingOptions;

const DEFAULT_PROMPTS: &str = include_str!("prompts.yaml");

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to parse prompts: {0}")]
    Prompts(#[from] serde_yaml::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentMode {
    /// Retrieve once, then answer from the retrieved context.
    Pipeline,
    /// Let the model call the document tools until it answers.
    React,
}

impl FromStr for AgentMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pipeline" => Ok(Self::Pipeline),
            "react" => Ok(Self::React),
            other => Err(format!("expected `pipeline` or `react`, got `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpTransport {
    Stdio,
}

impl FromStr for McpTransport {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            other => Err(format!("unsupported transport `{other}`, only `stdio` is available")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct McpSettings {
    pub transport: McpTransport,
    pub command: String,
    pub args: Vec<String>,
    /// Route retrieval through the tool server before the local store.
    pub retrieval_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Messages kept per chat session; older turns are dropped.
    pub max_messages: usize,
    /// Sessions untouched for this long are evicted.
    pub idle_timeout: Duration,
    pub max_sessions: usize,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_embedding_model: String,
    pub embedding_dimension: usize,
    pub chroma_db_path: PathBuf,
    pub chroma_collection_name: String,
    pub qdrant_url: Option<String>,
    pub mcp: McpSettings,
    pub server: ServerSettings,
    pub sessions: SessionSettings,
    pub max_upload_bytes: usize,
    pub log_level: String,
    pub log_json: bool,
    pub chunking: ChunkingOptions,
    pub top_k_chunks: usize,
    pub relevance_threshold: f32,
    pub max_iterations: usize,
    pub temperature: f64,
    pub agent_mode: AgentMode,
    pub llm_timeout: Duration,
    pub prompts_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_model: "gpt-4-turbo-preview".to_string(),
            openai_embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimension: 1536,
            chroma_db_path: PathBuf::from("./data/chroma_db"),
            chroma_collection_name: "documents".to_string(),
            qdrant_url: None,
            mcp: McpSettings {
                transport: McpTransport::Stdio,
                command: "mcp-server".to_string(),
                args: Vec::new(),
                retrieval_enabled: false,
            },
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 8501,
            },
            sessions: SessionSettings {
                max_messages: 100,
                idle_timeout: Duration::from_secs(60 * 60),
                max_sessions: 1000,
            },
            max_upload_bytes: 50 * 1024 * 1024,
            log_level: "INFO".to_string(),
            log_json: false,
            chunking: ChunkingOptions::default(),
            top_k_chunks: 5,
            relevance_threshold: 0.3,
            max_iterations: 10,
            temperature: 0.7,
            agent_mode: AgentMode::Pipeline,
            llm_timeout: Duration::from_secs(120),
            prompts_path: None,
        }
    }
}

impl Settings {
    /// Reads settings from the process environment after loading `.env`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let settings = Self {
            openai_api_key: get("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?,
            openai_model: get("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_embedding_model: get("OPENAI_EMBEDDING_MODEL")
                .unwrap_or(defaults.openai_embedding_model),
            embedding_dimension: parse_or(
                "EMBEDDING_DIMENSION",
                get("EMBEDDING_DIMENSION"),
                defaults.embedding_dimension,
            )?,
            chroma_db_path: get("CHROMA_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.chroma_db_path),
            chroma_collection_name: get("CHROMA_COLLECTION_NAME")
                .unwrap_or(defaults.chroma_collection_name),
            qdrant_url: get("QDRANT_URL"),
            mcp: McpSettings {
                transport: parse_or(
                    "MCP_SERVER_TRANSPORT",
                    get("MCP_SERVER_TRANSPORT"),
                    defaults.mcp.transport,
                )?,
                command: get("MCP_SERVER_COMMAND").unwrap_or(defaults.mcp.command),
                args: get("MCP_SERVER_ARGS")
                    .map(|args| args.split_whitespace().map(str::to_string).collect())
                    .unwrap_or_default(),
                retrieval_enabled: parse_or(
                    "MCP_RETRIEVAL",
                    get("MCP_RETRIEVAL"),
                    defaults.mcp.retrieval_enabled,
                )?,
            },
            server: ServerSettings {
                host: get("STREAMLIT_HOST").unwrap_or(defaults.server.host),
                port: parse_or("STREAMLIT_PORT", get("STREAMLIT_PORT"), defaults.server.port)?,
            },
            sessions: SessionSettings {
                max_messages: parse_or(
                    "SESSION_MAX_MESSAGES",
                    get("SESSION_MAX_MESSAGES"),
                    defaults.sessions.max_messages,
                )?,
                idle_timeout: Duration::from_secs(
                    60 * parse_or(
                        "SESSION_IDLE_MINUTES",
                        get("SESSION_IDLE_MINUTES"),
                        defaults.sessions.idle_timeout.as_secs() / 60,
                    )?,
                ),
                max_sessions: parse_or(
                    "SESSION_LIMIT",
                    get("SESSION_LIMIT"),
                    defaults.sessions.max_sessions,
                )?,
            },
            max_upload_bytes: 1024
                * 1024
                * parse_or(
                    "MAX_UPLOAD_MB",
                    get("MAX_UPLOAD_MB"),
                    defaults.max_upload_bytes / (1024 * 1024),
                )?,
            log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_json: get("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
            chunking: ChunkingOptions {
                chunk_size: parse_or(
                    "CHUNK_SIZE",
                    get("CHUNK_SIZE"),
                    defaults.chunking.chunk_size,
                )?,
                chunk_overlap: parse_or(
                    "CHUNK_OVERLAP",
                    get("CHUNK_OVERLAP"),
                    defaults.chunking.chunk_overlap,
                )?,
            },
            top_k_chunks: parse_or("TOP_K_CHUNKS", get("TOP_K_CHUNKS"), defaults.top_k_chunks)?,
            relevance_threshold: parse_or(
                "RELEVANCE_THRESHOLD",
                get("RELEVANCE_THRESHOLD"),
                defaults.relevance_threshold,
            )?,
            max_iterations: parse_or(
                "MAX_ITERATIONS",
                get("MAX_ITERATIONS"),
                defaults.max_iterations,
            )?,
            temperature: parse_or("TEMPERATURE", get("TEMPERATURE"), defaults.temperature)?,
            agent_mode: parse_or("AGENT_MODE", get("AGENT_MODE"), defaults.agent_mode)?,
            llm_timeout: Duration::from_secs(parse_or(
                "LLM_TIMEOUT_SECONDS",
                get("LLM_TIMEOUT_SECONDS"),
                defaults.llm_timeout.as_secs(),
            )?),
            prompts_path: get("PROMPTS_PATH").map(PathBuf::from),
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let chunking = self.chunking;
        if chunking.chunk_size == 0 {
            return Err(invalid("CHUNK_SIZE", chunking.chunk_size, "must be positive"));
        }
        if chunking.chunk_overlap >= chunking.chunk_size {
            return Err(invalid(
                "CHUNK_OVERLAP",
                chunking.chunk_overlap,
                "must be smaller than CHUNK_SIZE",
            ));
        }
        if self.top_k_chunks == 0 {
            return Err(invalid("TOP_K_CHUNKS", self.top_k_chunks, "must be at least 1"));
        }
        if self.max_iterations == 0 {
            return Err(invalid("MAX_ITERATIONS", self.max_iterations, "must be at least 1"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid("TEMPERATURE", self.temperature, "must be within 0..=2"));
        }
        if !is_bind_host(&self.server.host) {
            return Err(invalid(
                "STREAMLIT_HOST",
                &self.server.host,
                "must be an IP address or a host name",
            ));
        }
        if self.sessions.max_messages < MIN_SESSION_MESSAGES {
            return Err(invalid(
                "SESSION_MAX_MESSAGES",
                self.sessions.max_messages,
                "must hold at least one exchange",
            ));
        }
        if self.sessions.idle_timeout.is_zero() {
            return Err(invalid("SESSION_IDLE_MINUTES", 0, "must be at least 1"));
        }
        if self.sessions.max_sessions == 0 {
            return Err(invalid("SESSION_LIMIT", 0, "must be at least 1"));
        }
        if self.max_upload_bytes == 0 {
            return Err(invalid("MAX_UPLOAD_MB", 0, "must be at least 1"));
        }
        if self.embedding_dimension == 0 {
            return Err(invalid(
                "EMBEDDING_DIMENSION",
                self.embedding_dimension,
                "must be positive",
            ));
        }
        Ok(())
    }

    /// Absolute location of the local vector store.
    pub fn chroma_db_path_resolved(&self) -> PathBuf {
        std::path::absolute(&self.chroma_db_path).unwrap_or_else(|_| self.chroma_db_path.clone())
    }

    pub fn ensure_data_directories(&self) -> Result<()> {
        let path = self.chroma_db_path_resolved();
        std::fs::create_dir_all(&path).map_err(|source| ConfigError::Io { path, source })
    }
}

const MIN_SESSION_MESSAGES: usize = 2;

/// An IP literal or an RFC 1123 host name such as `localhost`.
fn is_bind_host(host: &str) -> bool {
    if host.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }
    !host.is_empty()
        && host.len() <= 253
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

fn parse_or<T>(var: &'static str, value: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw,
            reason: e.to_string(),
        }),
    }
}

fn invalid(var: &'static str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptsConfig {
    pub react_system: String,
    pub final_response: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        // The embedded document is covered by `test_default_prompts_parse`.
        serde_yaml::from_str(DEFAULT_PROMPTS).unwrap_or_else(|_| Self {
            react_system: String::new(),
            final_response: "{context}\n\n{conversation_history}\n\n{question}".to_string(),
        })
    }
}

impl PromptsConfig {
    /// Loads prompts from `path`, or the built-in set when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            None => Ok(serde_yaml::from_str(DEFAULT_PROMPTS)?),
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Ok(serde_yaml::from_str(&raw)?)
            }
        }
    }

    pub fn final_response(&self, context: &str, history: &str, question: &str) -> String {
        fill_template(
            &self.final_response,
            &[
                ("context", context),
                ("conversation_history", history),
                ("question", question),
            ],
        )
    }
}

/// Replaces `{name}` placeholders in a single pass, so substituted values are never re-expanded.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, close))
        });

        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Settings plus prompt templates, everything a binary needs to wire services.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub settings: Settings,
    pub prompts: PromptsConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let settings = Settings::from_env()?;
        let prompts = PromptsConfig::load(settings.prompts_path.as_deref())?;
        Ok(Self { settings, prompts })
    }
}
