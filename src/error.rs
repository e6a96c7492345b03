use std::time::Duration;

/// Failures of a single extraction unit (one document or one chunk).
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("API key not set (expected in ${0})")]
    MissingApiKey(String),

    #[error("collaborator request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("collaborator returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("collaborator did not answer within {0:?}")]
    Timeout(Duration),

    #[error("empty response from collaborator")]
    EmptyReply,

    #[error("invalid JSON response: {0}")]
    InvalidJson(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("all {0} chunks failed to extract")]
    AllChunksFailed(usize),
}

/// Hard failures of the pipeline as a whole.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Markdown content is required")]
    EmptyInput,
}
