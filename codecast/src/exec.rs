//! Code-execution collaborator client
//!
//! The coding-session tool hands source text to an external runner and
//! shows whatever comes back. Only the envelope is defined here: a request
//! carrying a language identifier and source text, answered with output
//! text or error text. The runner itself is not this system's concern.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A code-execution request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecRequest {
    /// Language identifier understood by the runner, e.g. `python`
    pub language: String,
    /// Source text to execute
    pub source: String,
}

impl ExecRequest {
    /// Build a request.
    pub fn new(language: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            source: source.into(),
        }
    }
}

/// Result of a code-execution request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    /// The program ran; its output text
    Output(String),
    /// The runner reported an error; its error text
    Error(String),
}

/// Errors from the collaborator client itself, as opposed to errors the
/// runner reports inside a well-formed response.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The request never produced a usable response
    #[error("Execution request failed: {reason}")]
    Request {
        /// Failure reason
        reason: String,
    },

    /// The runner answered with something outside the envelope
    #[error("Malformed execution response: {reason}")]
    InvalidResponse {
        /// What was wrong with the response
        reason: String,
    },
}

/// An external code runner.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Execute the request and return the runner's outcome.
    async fn execute(&self, request: &ExecRequest) -> Result<ExecOutcome, ExecError>;
}

#[derive(Debug, Deserialize)]
struct ExecResponseBody {
    output: Option<String>,
    error: Option<String>,
}

/// HTTP JSON implementation of [`CodeExecutor`].
///
/// Posts the request envelope to a single endpoint and expects a JSON
/// object with an `output` or `error` field.
#[derive(Debug, Clone)]
pub struct HttpCodeExecutor {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpCodeExecutor {
    /// Client posting to `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Client posting to `endpoint` with a preconfigured reqwest client.
    pub fn with_client(endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// The runner endpoint this client posts to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CodeExecutor for HttpCodeExecutor {
    async fn execute(&self, request: &ExecRequest) -> Result<ExecOutcome, ExecError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| ExecError::Request {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExecError::Request {
                reason: format!("runner answered {status}"),
            });
        }

        let body: ExecResponseBody =
            response.json().await.map_err(|e| ExecError::InvalidResponse {
                reason: e.to_string(),
            })?;

        match (body.error, body.output) {
            (Some(error), _) => Ok(ExecOutcome::Error(error)),
            (None, Some(output)) => Ok(ExecOutcome::Output(output)),
            (None, None) => Err(ExecError::InvalidResponse {
                reason: "response carries neither output nor error".to_string(),
            }),
        }
    }
}
