//! Traduction de la taxonomie d'erreurs vers HTTP
//!
//! `InvalidInput` → 400, `Timeout` → 504 avec un message actionnable,
//! `NotFound` → 404, `Backend` → 500 générique (les détails restent dans
//! les logs serveur, jamais dans la réponse).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use carto::QueryError;

/// Message utilisateur en cas de timeout: retenter plus précis / zoomer
pub const TIMEOUT_MESSAGE: &str = "Query timed out, try a more specific query or zoom in";

/// Erreur API: statut HTTP + message de l'enveloppe `{"error": ...}`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::InvalidInput(message) => Self {
                status: StatusCode::BAD_REQUEST,
                message,
            },
            QueryError::Timeout => Self {
                status: StatusCode::GATEWAY_TIMEOUT,
                message: TIMEOUT_MESSAGE.to_string(),
            },
            QueryError::NotFound => Self {
                status: StatusCode::NOT_FOUND,
                message: "Not found".to_string(),
            },
            QueryError::Backend(details) => {
                error!(details = %details, "Backend failure");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "Internal error".to_string(),
                }
            }
            // Une annulation est purement client; si elle remonte ici c'est
            // un défaut interne, pas une erreur utilisateur
            QueryError::Cancelled => Self::internal("Internal error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
