use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

const NOT_FOUND_PAGE: &str = include_str!("../templates/404.html");

#[derive(Debug, Error)]
pub enum AppError {
    /// The referenced user or message does not exist.
    #[error("not found")]
    NotFound,

    /// Authorization refusal. Carries the redirect (with its flash already
    /// queued) that the client receives instead of an error status.
    #[error("request refused")]
    Refused(Response),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<tera::Error> for AppError {
    fn from(err: tera::Error) -> Self {
        Self::Internal(anyhow::Error::new(err).context("template rendering failed"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound => (StatusCode::NOT_FOUND, Html(NOT_FOUND_PAGE)).into_response(),
            Self::Refused(redirect) => redirect,
            Self::Internal(err) => {
                error!("Request failed: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

/// Handler for unmatched routes.
pub async fn not_found() -> AppError {
    AppError::NotFound
}
