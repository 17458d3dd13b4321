//! Environment configuration.

use std::env;

pub const ENV_MODEL: &str = "DEEPSEEK_CHAT_MODEL";
pub const ENV_BASE_URL: &str = "DEEPSEEK_CHAT_BASE_URL";
pub const ENV_API_KEY_FILE: &str = "DEEPSEEK_CHAT_API_KEY_FILE";
pub const ENV_API_KEY: &str = "OPENROUTER_API_KEY";
pub const ENV_HISTORY: &str = "DEEPSEEK_CHAT_HISTORY";
pub const ENV_VERBOSE: &str = "DEEPSEEK_CHAT_VERBOSE";

#[derive(Clone, Default)]
pub struct EnvConfig {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key_file: Option<String>,
    pub api_key: Option<String>,
    pub history: Option<String>,
    pub verbose: bool,
}

impl std::fmt::Debug for EnvConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key_file", &self.api_key_file)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("history", &self.history)
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            model: env_string_opt(ENV_MODEL),
            base_url: env_string_opt(ENV_BASE_URL),
            api_key_file: env_string_opt(ENV_API_KEY_FILE),
            api_key: env_string_opt(ENV_API_KEY),
            history: env_string_opt(ENV_HISTORY),
            verbose: env_flag(ENV_VERBOSE),
        }
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}
