//! Interactive prompt loop around a [`ChatClient`].

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use chat_api::cancel::await_or_cancel;
use chat_api::{CancelSignal, ChatClient, CompletionEvent, StatusCode, Transcript};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};
use transcript_store::expand_user_path;

use crate::commands::{parse_input_line, InputCommand};

pub const LOAD_PROMPT: &str =
    "Load previous conversation? (path to .json/.jsonl file or Enter for new): ";
pub const INPUT_PROMPT: &str = "You: ";

/// How the input loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// `exit` or `quit` was typed.
    Exit,
    EndOfInput,
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub end: SessionEnd,
    pub saved_to: Option<PathBuf>,
}

enum ReadOutcome {
    Line(String),
    Eof,
    Interrupted,
}

/// One terminal conversation: load, chat, offer to save.
///
/// Reads prompts from `input` and writes everything the user sees to `output`.
/// Raising `cancel` aborts a pending read or completion and jumps to the save
/// step.
pub struct ChatSession<'a, R, W> {
    client: &'a ChatClient,
    input: R,
    output: W,
    cancel: CancelSignal,
    save_path: Option<String>,
}

impl<'a, R, W> ChatSession<'a, R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write + Send,
{
    pub fn new(client: &'a ChatClient, input: R, output: W, cancel: CancelSignal) -> Self {
        Self {
            client,
            input,
            output,
            cancel,
            save_path: None,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Runs the whole session.
    ///
    /// With `history` set the transcript is loaded from it without asking.
    pub async fn run(&mut self, history: Option<&str>) -> anyhow::Result<SessionOutcome> {
        writeln!(
            self.output,
            "DeepSeek chat (continuous conversation with context)"
        )?;
        writeln!(self.output, "Model: {}", self.client.config().model)?;

        let end = match self.load_phase(history).await? {
            Some(end) => end,
            None => self.chat_loop().await?,
        };
        if end == SessionEnd::Interrupted {
            writeln!(self.output, "\nInterrupted.")?;
        }

        let saved_to = self.save_phase().await?;
        writeln!(self.output, "Goodbye!")?;
        self.output.flush()?;

        Ok(SessionOutcome { end, saved_to })
    }

    async fn load_phase(&mut self, history: Option<&str>) -> anyhow::Result<Option<SessionEnd>> {
        let requested = match history {
            Some(path) => path.trim().to_string(),
            None => match self.read_line(LOAD_PROMPT, true).await? {
                ReadOutcome::Line(line) => line.trim().to_string(),
                ReadOutcome::Eof => String::new(),
                ReadOutcome::Interrupted => return Ok(Some(SessionEnd::Interrupted)),
            },
        };
        if requested.is_empty() {
            return Ok(None);
        }

        let path = expand_user_path(&requested);
        if !path.exists() {
            writeln!(
                self.output,
                "File not found: {requested}. Starting new conversation."
            )?;
        } else {
            match Transcript::load(&path) {
                Ok(transcript) => {
                    info!(path = %path.display(), turns = transcript.len(), "loaded conversation");
                    writeln!(
                        self.output,
                        "Loaded {} message(s) from {requested}",
                        transcript.len()
                    )?;
                    self.client.replace_transcript(transcript);
                }
                Err(error) => {
                    warn!(path = %path.display(), %error, "could not load conversation");
                    writeln!(
                        self.output,
                        "Could not load: {error}. Starting new conversation."
                    )?;
                }
            }
        }
        self.save_path = Some(requested);
        Ok(None)
    }

    async fn chat_loop(&mut self) -> anyhow::Result<SessionEnd> {
        loop {
            let line = match self.read_line(INPUT_PROMPT, true).await? {
                ReadOutcome::Line(line) => line,
                ReadOutcome::Eof => {
                    writeln!(self.output)?;
                    return Ok(SessionEnd::EndOfInput);
                }
                ReadOutcome::Interrupted => return Ok(SessionEnd::Interrupted),
            };

            let text = match parse_input_line(&line) {
                InputCommand::Exit => return Ok(SessionEnd::Exit),
                InputCommand::Blank => continue,
                InputCommand::Message(text) => text,
            };

            writeln!(self.output, "Processing...")?;
            self.output.flush()?;

            let output = &mut self.output;
            let result = self
                .client
                .complete_with_handler(&text, Some(&self.cancel), |event| {
                    if let CompletionEvent::Retrying { status, delay, .. } = event {
                        let _ = writeln!(
                            output,
                            "Rate limited ({}). Retrying in {}s...",
                            status_label(status),
                            format_delay(delay)
                        );
                        let _ = output.flush();
                    }
                })
                .await;

            match result {
                Ok(reply) => writeln!(self.output, "Assistant: {reply}\n")?,
                Err(error) if error.is_cancelled() => return Ok(SessionEnd::Interrupted),
                Err(error) => {
                    warn!(%error, "completion failed");
                    writeln!(self.output, "Error: {error}\n")?;
                }
            }
        }
    }

    async fn save_phase(&mut self) -> anyhow::Result<Option<PathBuf>> {
        let transcript = self.client.transcript();
        if transcript.is_empty() {
            return Ok(None);
        }

        let prompt = match &self.save_path {
            Some(path) => {
                format!("Save conversation? (path or Enter for same file [{path}]): ")
            }
            None => "Save conversation? (path to file or Enter to skip): ".to_string(),
        };
        let answer = match self.read_line(&prompt, false).await? {
            ReadOutcome::Line(line) => line.trim().to_string(),
            ReadOutcome::Eof | ReadOutcome::Interrupted => String::new(),
        };
        let Some(target) = Some(answer)
            .filter(|answer| !answer.is_empty())
            .or_else(|| self.save_path.clone())
        else {
            return Ok(None);
        };

        let path = expand_user_path(&target);
        match transcript.save(&path) {
            Ok(()) => {
                info!(path = %path.display(), turns = transcript.len(), "saved conversation");
                writeln!(
                    self.output,
                    "Saved {} message(s) to {target}",
                    transcript.len()
                )?;
                Ok(Some(path))
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "could not save conversation");
                writeln!(self.output, "Could not save: {error}")?;
                Ok(None)
            }
        }
    }

    async fn read_line(&mut self, prompt: &str, cancellable: bool) -> anyhow::Result<ReadOutcome> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;

        let mut line = String::new();
        let cancellation = cancellable.then_some(&self.cancel);
        match await_or_cancel(self.input.read_line(&mut line), cancellation).await {
            Err(_) => Ok(ReadOutcome::Interrupted),
            Ok(Ok(0)) => Ok(ReadOutcome::Eof),
            Ok(Ok(_)) => Ok(ReadOutcome::Line(line)),
            Ok(Err(error)) => Err(error.into()),
        }
    }
}

fn status_label(status: Option<StatusCode>) -> String {
    status
        .map(|status| status.as_u16().to_string())
        .unwrap_or_else(|| "no status".to_string())
}

fn format_delay(delay: Duration) -> String {
    if delay.subsec_nanos() == 0 {
        delay.as_secs().to_string()
    } else {
        format!("{:.2}", delay.as_secs_f64())
    }
}
