use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, warn};
use transcript_store::{Role, Transcript};

use crate::cancel::{await_or_cancel, is_cancelled, CancelSignal};
use crate::config::ChatApiConfig;
use crate::error::{parse_error_message, ChatApiError};
use crate::gate::ConcurrencyGate;
use crate::payload::{completion_content, ChatRequest};
use crate::retry::{RetryDecision, RetryState};
use crate::transport::{ChatTransport, HttpTransport, TransportError};

/// Progress notifications emitted while a completion call runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionEvent {
    /// Attempt `attempt` (zero-based) is about to be sent.
    AttemptStarted { attempt: u32 },
    /// Attempt `attempt` hit a transient failure; the next one follows after `delay`.
    Retrying {
        attempt: u32,
        status: Option<StatusCode>,
        delay: Duration,
    },
}

/// Conversation-aware completion client.
///
/// Holds the transcript for one session. Concurrent `complete` calls on a
/// shared client are admitted through the concurrency gate; their user turns
/// are recorded in call order and their assistant turns in completion order.
pub struct ChatClient {
    config: ChatApiConfig,
    transport: Arc<dyn ChatTransport>,
    gate: ConcurrencyGate,
    transcript: Mutex<Transcript>,
}

enum AttemptFailure {
    Status(StatusCode, String),
    Transport(TransportError),
}

impl AttemptFailure {
    fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status(status, _) => Some(*status),
            Self::Transport(error) => error.status,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Status(_, message) => message.clone(),
            Self::Transport(error) => error.to_string(),
        }
    }

    fn into_error(self) -> ChatApiError {
        match self {
            Self::Status(status, message) => ChatApiError::Status(status, message),
            Self::Transport(error) => ChatApiError::Transport(error),
        }
    }
}

impl ChatClient {
    /// Creates a client using the HTTP transport.
    pub fn new(config: ChatApiConfig) -> Result<Self, ChatApiError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: ChatApiConfig, transport: Arc<dyn ChatTransport>) -> Self {
        let gate = ConcurrencyGate::new(config.max_concurrent_requests);
        Self {
            config,
            transport,
            gate,
            transcript: Mutex::new(Transcript::new()),
        }
    }

    #[must_use]
    pub fn with_transcript(self, transcript: Transcript) -> Self {
        self.replace_transcript(transcript);
        self
    }

    pub fn config(&self) -> &ChatApiConfig {
        &self.config
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Snapshot of the current window.
    pub fn transcript(&self) -> Transcript {
        lock_unpoisoned(&self.transcript).clone()
    }

    pub fn replace_transcript(&self, transcript: Transcript) {
        *lock_unpoisoned(&self.transcript) = transcript;
    }

    /// Request body for the current window.
    pub fn build_request(&self) -> ChatRequest {
        ChatRequest::from_transcript(&self.config.model, &lock_unpoisoned(&self.transcript))
    }

    pub async fn complete(
        &self,
        user_input: &str,
        cancellation: Option<&CancelSignal>,
    ) -> Result<String, ChatApiError> {
        self.complete_with_handler(user_input, cancellation, |_| {})
            .await
    }

    /// Sends `user_input` with the whole window and returns the assistant reply.
    ///
    /// The user turn is recorded before the first attempt and stays recorded
    /// whatever the outcome. The assistant turn is recorded only on success.
    pub async fn complete_with_handler<F>(
        &self,
        user_input: &str,
        cancellation: Option<&CancelSignal>,
        mut on_event: F,
    ) -> Result<String, ChatApiError>
    where
        F: FnMut(CompletionEvent) + Send,
    {
        let _permit = self.gate.acquire(cancellation).await?;

        let request = {
            let mut transcript = lock_unpoisoned(&self.transcript);
            transcript.append(Role::User, user_input);
            ChatRequest::from_transcript(&self.config.model, &transcript)
        };

        let policy = self.config.retry;
        let mut state = RetryState::default();

        loop {
            let attempt = state.attempt;
            if is_cancelled(cancellation) {
                return Err(ChatApiError::Cancelled);
            }

            debug!(
                attempt,
                model = %request.model,
                messages = request.messages.len(),
                "sending completion request"
            );
            on_event(CompletionEvent::AttemptStarted { attempt });

            let failure = match await_or_cancel(self.transport.send(&request), cancellation).await?
            {
                Ok(response) if response.status.is_success() => {
                    let content = completion_content(&response.body)?;
                    {
                        let mut transcript = lock_unpoisoned(&self.transcript);
                        transcript.append(Role::Assistant, content.clone());
                    }
                    debug!(attempt, chars = content.len(), "completion succeeded");
                    return Ok(content);
                }
                Ok(response) => AttemptFailure::Status(
                    response.status,
                    parse_error_message(response.status, &response.body),
                ),
                Err(error) => AttemptFailure::Transport(error),
            };

            let status = failure.status();
            state.record_failure(status, failure.message());

            match policy.decide(attempt, status) {
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        attempt,
                        status = status.map(|status| status.as_u16()),
                        delay_secs = delay.as_secs_f64(),
                        "transient upstream failure; backing off"
                    );
                    on_event(CompletionEvent::Retrying {
                        attempt,
                        status,
                        delay,
                    });
                    await_or_cancel(tokio::time::sleep(delay), cancellation).await?;
                    state.advance();
                }
                RetryDecision::GiveUp { exhausted: true } => {
                    warn!(attempts = attempt + 1, "retries exhausted");
                    return Err(ChatApiError::RetryExhausted {
                        status: state.last_status,
                        last_error: state.last_error,
                    });
                }
                RetryDecision::GiveUp { exhausted: false } => {
                    debug!(attempt, "non-retryable failure");
                    return Err(failure.into_error());
                }
            }
        }
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
