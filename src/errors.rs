use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned to API callers. `code` is the stable machine-readable
/// kind the calling UI branches on (several kinds share an HTTP status, so
/// the status alone is not enough to tell "slot just filled" from "already
/// paid").
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Conflict",
    "code": "slot_full",
    "message": "Slot full: no capacity left in 09:00-10:00 on 2025-03-14",
    "request_id": "req-abc123xyz",
    "timestamp": "2025-03-14T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Not Found", "Conflict")
    pub error: String,
    /// Stable machine-readable error kind
    #[schema(example = "slot_full")]
    pub code: String,
    /// Human-readable error description
    pub message: String,
    /// Additional details (joined validation failures)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Illegal transition: {0}")]
    IllegalTransition(String),

    #[error("Slot full: {0}")]
    SlotFull(String),

    #[error("Invalid slot: {0}")]
    InvalidSlot(String),

    #[error("Duplicate service: {0}")]
    DuplicateService(String),

    #[error("Referential conflict: {0}")]
    ReferentialConflict(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(Uuid),

    #[error("Invoice {0} is already paid")]
    AlreadyPaid(Uuid),

    #[error("No mechanic available: {0}")]
    NoMechanicAvailable(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidOperation(_) | Self::InvalidSlot(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::IllegalTransition(_)
            | Self::SlotFull(_)
            | Self::DuplicateService(_)
            | Self::ReferentialConflict(_)
            | Self::ConcurrentModification(_)
            | Self::AlreadyPaid(_)
            | Self::NoMechanicAvailable(_) => StatusCode::CONFLICT,
        }
    }

    /// Stable machine-readable kind. Callers branch on this, never on the
    /// message text.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database_error",
            Self::NotFound(_) => "not_found",
            Self::IllegalTransition(_) => "illegal_transition",
            Self::SlotFull(_) => "slot_full",
            Self::InvalidSlot(_) => "invalid_slot",
            Self::DuplicateService(_) => "duplicate_service",
            Self::ReferentialConflict(_) => "referential_conflict",
            Self::ConcurrentModification(_) => "concurrent_modification",
            Self::AlreadyPaid(_) => "already_paid",
            Self::NoMechanicAvailable(_) => "no_mechanic_available",
            Self::ValidationError(_) => "validation_error",
            Self::InvalidOperation(_) => "invalid_operation",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::InternalError(_) => "internal_error",
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            code: self.error_code().to_string(),
            message: self.response_message(),
            details: None,
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

// Result extensions for easier error handling
pub trait ResultExt<T> {
    fn map_err_to_service(self) -> Result<T, ServiceError>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<ServiceError>,
{
    fn map_err_to_service(self) -> Result<T, ServiceError> {
        self.map_err(|e| e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::to_bytes, http::StatusCode};
    use rstest::rstest;

    #[tokio::test]
    async fn error_response_includes_request_id_and_code() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::SlotFull("no capacity left".into()).into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
        assert_eq!(payload.code, "slot_full");
    }

    #[rstest]
    #[case(ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND)]
    #[case(ServiceError::IllegalTransition("x".into()), StatusCode::CONFLICT)]
    #[case(ServiceError::SlotFull("x".into()), StatusCode::CONFLICT)]
    #[case(ServiceError::InvalidSlot("x".into()), StatusCode::BAD_REQUEST)]
    #[case(ServiceError::DuplicateService("x".into()), StatusCode::CONFLICT)]
    #[case(ServiceError::ReferentialConflict("x".into()), StatusCode::CONFLICT)]
    #[case(ServiceError::ConcurrentModification(Uuid::nil()), StatusCode::CONFLICT)]
    #[case(ServiceError::AlreadyPaid(Uuid::nil()), StatusCode::CONFLICT)]
    #[case(ServiceError::NoMechanicAvailable("x".into()), StatusCode::CONFLICT)]
    #[case(ServiceError::ValidationError("x".into()), StatusCode::BAD_REQUEST)]
    #[case(ServiceError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED)]
    #[case(ServiceError::Forbidden("x".into()), StatusCode::FORBIDDEN)]
    #[case(ServiceError::InternalError("x".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn status_code_mapping(#[case] err: ServiceError, #[case] expected: StatusCode) {
        assert_eq!(err.status_code(), expected);
    }

    #[test]
    fn error_codes_are_distinct() {
        let errors = [
            ServiceError::NotFound("x".into()),
            ServiceError::IllegalTransition("x".into()),
            ServiceError::SlotFull("x".into()),
            ServiceError::InvalidSlot("x".into()),
            ServiceError::DuplicateService("x".into()),
            ServiceError::ReferentialConflict("x".into()),
            ServiceError::ConcurrentModification(Uuid::nil()),
            ServiceError::AlreadyPaid(Uuid::nil()),
            ServiceError::NoMechanicAvailable("x".into()),
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.error_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::db_error("connection refused at 10.0.0.5").response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::InternalError("stack details".into()).response_message(),
            "Internal server error"
        );

        // User-facing errors keep the actual message
        assert_eq!(
            ServiceError::NotFound("order 42".into()).response_message(),
            "Not found: order 42"
        );
        let id = Uuid::nil();
        assert_eq!(
            ServiceError::AlreadyPaid(id).response_message(),
            format!("Invoice {} is already paid", id)
        );
    }

    #[test]
    fn validation_errors_convert() {
        use validator::Validate;

        #[derive(Validate)]
        struct Probe {
            #[validate(length(min = 1))]
            name: String,
        }

        let err = Probe {
            name: String::new(),
        }
        .validate()
        .unwrap_err();
        let service_err = ServiceError::from(err);
        assert_eq!(service_err.error_code(), "validation_error");
    }
}
