//! Terminal chat client for OpenRouter-hosted DeepSeek models.
//!
//! The binary wires [`cli::Cli`] and [`config::EnvConfig`] into a
//! [`chat_api::ChatClient`] and drives it through a [`session::ChatSession`].
//! Transport, retry, and admission control live in `chat_api`; the bounded
//! transcript and its file formats live in `transcript_store`.

pub mod cli;
pub mod commands;
pub mod config;
pub mod secret;
pub mod session;
pub mod signals;

pub use cli::{Cli, Settings};
pub use commands::{parse_input_line, InputCommand};
pub use config::EnvConfig;
pub use session::{ChatSession, SessionEnd, SessionOutcome};
