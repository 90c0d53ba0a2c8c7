use thiserror::Error;

/// Text written into an assistant message when its exchange fails.
pub const FALLBACK_MESSAGE: &str =
    "Sorry, I encountered an error while processing your request. Please try again.";

/// Failures reported by a [`Transport`](crate::transport::Transport).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Service unreachable: {0}")]
    Network(String),

    #[error("{detail}")]
    Status { status: u16, detail: String },

    #[error("Stream interrupted: {0}")]
    Interrupted(String),

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("{0}")]
    Rejected(String),
}

impl TransportError {
    /// A status failure carrying the server's detail, or the generic
    /// message when the server supplied none.
    pub fn status(status: u16, detail: Option<String>) -> Self {
        let detail = detail
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| generic_status_message(status));
        TransportError::Status { status, detail }
    }
}

pub fn generic_status_message(status: u16) -> String {
    format!("Request failed with status {}", status)
}

/// Preconditions refused by [`Session::send_question`](crate::session::Session::send_question).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("no documents or web sources available; upload a document or enable entertainment mode")]
    NoSources,
}
