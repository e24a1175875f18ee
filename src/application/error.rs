use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::application::render::PipelineError;
use crate::config::LoadError;
use crate::infra::error::InfraError;

/// Diagnostic attached to failed responses and consumed by the response
/// logging middleware. Never rendered to clients.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// A request failure: public-facing status plus the private report.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<PipelineError> for HttpError {
    fn from(error: PipelineError) -> Self {
        let (status, public_message) = if error.is_not_found() {
            (StatusCode::NOT_FOUND, "Not found")
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        };
        HttpError::from_error(
            "application::render::pipeline",
            status,
            public_message,
            &error,
        )
    }
}

/// Top-level failure reported by the binary before exit.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] LoadError),
    #[error("infrastructure error: {0}")]
    Infra(#[from] InfraError),
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_collects_the_source_chain() {
        let inner = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let outer = PipelineError::read(std::path::Path::new("a.css"), &inner);

        let report =
            ErrorReport::from_error("test", StatusCode::INTERNAL_SERVER_ERROR, &outer);
        assert!(report.messages[0].contains("a.css"));
    }

    #[test]
    fn missing_resource_maps_to_not_found() {
        let inner = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error = PipelineError::read(std::path::Path::new("a.css"), &inner);

        let response = HttpError::from(error).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn other_failures_map_to_server_error() {
        let error = PipelineError::Compression {
            path: "a.css".to_string(),
            detail: "gzip failed".to_string(),
        };

        let response = HttpError::from(error).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
