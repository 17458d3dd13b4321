//! Bounded, chronologically ordered conversation window with lenient JSON
//! load and pretty JSON save.

mod error;
mod paths;
mod schema;
mod transcript;

pub use error::TranscriptError;
pub use paths::expand_user_path;
pub use schema::{Role, Turn};
pub use transcript::{Transcript, TRANSCRIPT_CAPACITY};
