//! Error types for the generation pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing credential: {var} environment variable is not set")]
    MissingCredential { var: &'static str },

    #[error("{service} request failed with status {status}: {body}")]
    RemoteService {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Unexpected {service} response: {reason}")]
    MalformedResponse {
        service: &'static str,
        reason: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(#[from] async_openai::error::OpenAIError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Build a `RemoteService` error from a non-success response, consuming its body.
    pub(crate) async fn from_response(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        PipelineError::RemoteService {
            service,
            status,
            body,
        }
    }
}
