//! Error taxonomy shared by the hub and replicas.
//!
//! Request-local failures become HTTP status codes through the
//! [`IntoResponse`] impl and never take the process down. Peer failures inside
//! fan-out and forwarding are logged and swallowed by their callers; only
//! [`CounterError::Startup`] is allowed to end the process.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::message::ErrorBody;

pub type Result<T> = std::result::Result<T, CounterError>;

#[derive(Debug, Error)]
pub enum CounterError {
    /// Body or path did not parse into the expected shape.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Another live record already claims this node id.
    #[error("node '{node_id}' is already registered at {endpoint}")]
    DuplicateNode { node_id: String, endpoint: String },

    #[error("node '{0}' is not registered")]
    NodeNotFound(String),

    /// An outbound call to a peer failed or returned a non-success status.
    #[error("peer {endpoint} unreachable: {message}")]
    PeerUnreachable { endpoint: String, message: String },

    /// Bad configuration or failed registration; fatal before serving.
    #[error("startup failed: {0}")]
    Startup(String),
}

impl CounterError {
    pub fn status(&self) -> StatusCode {
        match self {
            CounterError::MalformedRequest(_) | CounterError::DuplicateNode { .. } => {
                StatusCode::BAD_REQUEST
            }
            CounterError::NodeNotFound(_) => StatusCode::NOT_FOUND,
            CounterError::PeerUnreachable { .. } => StatusCode::BAD_GATEWAY,
            CounterError::Startup(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn peer(endpoint: &str, err: impl std::fmt::Display) -> Self {
        CounterError::PeerUnreachable {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for CounterError {
    fn from(rejection: JsonRejection) -> Self {
        CounterError::MalformedRequest(rejection.body_text())
    }
}

impl From<PathRejection> for CounterError {
    fn from(rejection: PathRejection) -> Self {
        CounterError::MalformedRequest(rejection.body_text())
    }
}

impl IntoResponse for CounterError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
