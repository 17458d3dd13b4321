//! Chat-completion transport with bounded retry and admission control.
//!
//! [`ChatClient`] owns the conversation [`Transcript`], records each user turn
//! before the request leaves, and retries rate-limited (429) or overloaded (503)
//! responses with doubling backoff. At most
//! [`ChatApiConfig::max_concurrent_requests`] calls are in flight at once, and
//! every suspension point honours a [`CancelSignal`].
//!
//! The wire contract is the OpenAI-style `POST /chat/completions` endpoint as
//! served by OpenRouter.

pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod gate;
pub mod headers;
pub mod payload;
pub mod retry;
pub mod transport;
pub mod url;

pub use cancel::{new_cancel_signal, CancelSignal};
pub use client::{ChatClient, CompletionEvent};
pub use config::ChatApiConfig;
pub use error::ChatApiError;
pub use gate::{ConcurrencyGate, GatePermit};
pub use payload::{ChatMessage, ChatRequest};
pub use retry::{RetryDecision, RetryPolicy, RetryState};
pub use reqwest::StatusCode;
pub use transcript_store::{Role, Transcript, Turn};
pub use transport::{ChatTransport, HttpTransport, TransportError, TransportResponse};
pub use url::normalize_chat_url;
