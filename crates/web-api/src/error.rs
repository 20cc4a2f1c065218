//! API 错误与状态码映射

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use application::ApplicationError;
use domain::{DomainError, RepositoryError};

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        }));
        (self.status, body).into_response()
    }
}

impl From<ApplicationError> for ApiError {
    fn from(err: ApplicationError) -> Self {
        match err {
            ApplicationError::Domain(domain_err) => domain_err.into(),
            ApplicationError::Repository(repo_err) => repo_err.into(),
            ApplicationError::Authentication => {
                Self::unauthorized("身份认证失败")
            }
            ApplicationError::Infrastructure(message) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                message,
            ),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let message = err.to_string();
        match err {
            DomainError::ProductNotFound { .. } => {
                Self::new(StatusCode::NOT_FOUND, "PRODUCT_NOT_FOUND", message)
            }
            DomainError::ProductAlreadySold { .. } => {
                Self::new(StatusCode::CONFLICT, "PRODUCT_ALREADY_SOLD", message)
            }
            DomainError::CannotPurchaseOwnProduct => Self::new(
                StatusCode::FORBIDDEN,
                "CANNOT_PURCHASE_OWN_PRODUCT",
                message,
            ),
            DomainError::PermissionDenied { .. } => {
                Self::new(StatusCode::FORBIDDEN, "PERMISSION_DENIED", message)
            }
            DomainError::Validation { .. } => {
                Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
            }
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        let message = err.to_string();
        match err {
            RepositoryError::NotFound => Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message),
            RepositoryError::Conflict(_) => Self::new(StatusCode::CONFLICT, "CONFLICT", message),
            RepositoryError::Storage(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                message,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_expected_status() {
        let not_found: ApiError = DomainError::product_not_found(42).into();
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);

        let sold: ApiError = DomainError::already_sold(42).into();
        assert_eq!(sold.status, StatusCode::CONFLICT);

        let own: ApiError = DomainError::CannotPurchaseOwnProduct.into();
        assert_eq!(own.status, StatusCode::FORBIDDEN);

        let auth: ApiError = ApplicationError::Authentication.into();
        assert_eq!(auth.status, StatusCode::UNAUTHORIZED);
    }
}
