use std::time::Duration;

use chat_api::config::DEFAULT_MODEL;
use chat_api::url::DEFAULT_CHAT_BASE_URL;
use chat_api::{ChatApiConfig, RetryPolicy};
use clap::Parser;

use crate::config::EnvConfig;

#[derive(Debug, Parser)]
#[command(name = "deepseek-chat")]
#[command(about = "Continuous chat with a DeepSeek model over OpenRouter, keeping the last 30 turns as context.")]
pub struct Cli {
    /// Transcript to load at startup (.json array or .jsonl). Skips the load prompt.
    #[arg(long)]
    pub history: Option<String>,

    /// Model id sent with every request.
    #[arg(long)]
    pub model: Option<String>,

    /// API base URL; `/chat/completions` is appended when missing.
    #[arg(long)]
    pub base_url: Option<String>,

    /// File holding the API key (default: ~/api-openrouter.txt).
    #[arg(long)]
    pub api_key_file: Option<String>,

    /// Max completion requests in flight at once (default: 10).
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Per-request timeout in seconds (default: none).
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Log request attempts to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Flags merged over environment values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub model: String,
    pub base_url: String,
    pub api_key_file: Option<String>,
    pub history: Option<String>,
    pub max_concurrent: Option<usize>,
    pub timeout: Option<Duration>,
    pub verbose: bool,
}

impl Cli {
    pub fn resolve(self, env: &EnvConfig) -> Settings {
        Settings {
            model: self
                .model
                .or_else(|| env.model.clone())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: self
                .base_url
                .or_else(|| env.base_url.clone())
                .unwrap_or_else(|| DEFAULT_CHAT_BASE_URL.to_string()),
            api_key_file: self.api_key_file.or_else(|| env.api_key_file.clone()),
            history: self.history.or_else(|| env.history.clone()),
            max_concurrent: self.max_concurrent,
            timeout: self.timeout_secs.map(Duration::from_secs),
            verbose: self.verbose || env.verbose,
        }
    }
}

impl Settings {
    /// Client configuration for `api_key`.
    pub fn client_config(&self, api_key: String) -> ChatApiConfig {
        let mut config = ChatApiConfig::new(api_key)
            .with_model(&self.model)
            .with_base_url(&self.base_url)
            .with_retry_policy(RetryPolicy::default());
        if let Some(max) = self.max_concurrent {
            config = config.with_max_concurrent_requests(max);
        }
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        config
    }

    /// `tracing` filter used when `RUST_LOG` is unset.
    pub fn default_log_filter(&self) -> &'static str {
        if self.verbose {
            "deepseek_chat=debug,chat_api=debug,transcript_store=debug"
        } else {
            "deepseek_chat=warn,chat_api=warn,transcript_store=warn"
        }
    }
}
