use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::transcript::DEFAULT_SYSTEM_INSTRUCTION;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_UPSTREAM_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_TOKENS: u32 = 300;
pub const DEFAULT_CHAT_URL: &str = "http://127.0.0.1:3000/api/chat";
pub const DEFAULT_TIMEOUT_SECS: u64 = 25;

/// Settings for the completion proxy, read from flags or the environment.
#[derive(Args, Debug, Clone)]
pub struct ProxyConfig {
    /// Credential attached to every upstream call. Empty counts as unset.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(long, env = "UPSTREAM_URL", default_value = DEFAULT_UPSTREAM_URL)]
    pub upstream_url: String,

    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[arg(long, env = "STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Response size cap sent upstream as `max_tokens`.
    #[arg(long, env = "MAX_TOKENS", default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,
}

impl ProxyConfig {
    pub fn convention_defaults() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            static_dir: PathBuf::from("static"),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Settings for the terminal chat client.
#[derive(Args, Debug, Clone)]
pub struct ClientConfig {
    /// Proxy endpoint accepting `POST {"messages": [...]}`.
    #[arg(long, env = "ADVISOR_CHAT_URL", default_value = DEFAULT_CHAT_URL)]
    pub url: String,

    #[arg(long, env = "ADVISOR_CHAT_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Show full error text instead of a short hint.
    #[arg(long, env = "ADVISOR_CHAT_VERBOSE", default_value_t = false)]
    pub verbose: bool,

    #[arg(long, env = "ADVISOR_CHAT_SYSTEM_PROMPT", default_value = DEFAULT_SYSTEM_INSTRUCTION)]
    pub system_prompt: String,
}

impl ClientConfig {
    pub fn convention_defaults() -> Self {
        Self {
            url: DEFAULT_CHAT_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            verbose: false,
            system_prompt: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}
