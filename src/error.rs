use std::collections::BTreeMap;

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use axum_valid::ValidRejection;
use compute::ComputeError;
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use tracing::{error, warn};
use validator::{ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::schemas::ErrorResponse;

/// Errors returned by the HTTP handlers. Every variant renders as an
/// `ErrorResponse` with a stable `code`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation failed")]
    Validation(BTreeMap<String, Vec<String>>),
    #[error("{0}")]
    BadRequest(String),
    #[error("Authentication credentials were not provided")]
    NotAuthenticated,
    #[error("Invalid token")]
    InvalidToken,
    #[error("You do not have permission to perform this action")]
    PermissionDenied,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Validation error on a single field.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.into(), vec![message.into()]);
        ApiError::Validation(fields)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotAuthenticated | ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::PermissionDenied => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotAuthenticated => "NOT_AUTHENTICATED",
            ApiError::InvalidToken => "INVALID_TOKEN",
            ApiError::PermissionDenied => "PERMISSION_DENIED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Database(_) => "DATABASE_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code().to_string();

        let (message, fields) = match self {
            ApiError::Validation(fields) => ("Validation failed".to_string(), Some(fields)),
            ApiError::Database(ref err) => {
                error!("Database error: {}", err);
                ("Database error".to_string(), None)
            }
            ApiError::Internal(ref reason) => {
                error!("Internal error: {}", reason);
                ("Internal server error".to_string(), None)
            }
            other => {
                warn!("Request rejected with {}: {}", status, other);
                (other.to_string(), None)
            }
        };

        let body = ErrorResponse {
            error: message,
            code,
            success: false,
            fields,
        };
        (status, Json(body)).into_response()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = BTreeMap::new();
        flatten_errors(&errors, None, &mut fields);
        ApiError::Validation(fields)
    }
}

impl From<ComputeError> for ApiError {
    fn from(err: ComputeError) -> Self {
        match err {
            ComputeError::Database(db) => ApiError::Database(db),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<axum_extra::extract::QueryRejection> for ApiError {
    fn from(rejection: axum_extra::extract::QueryRejection) -> Self {
        ApiError::BadRequest(rejection.to_string())
    }
}

impl From<ValidRejection<QueryRejection>> for ApiError {
    fn from(rejection: ValidRejection<QueryRejection>) -> Self {
        match rejection {
            ValidRejection::Valid(errors) => errors.into(),
            ValidRejection::Inner(inner) => inner.into(),
        }
    }
}

/// Whether the store rejected a write because of a unique or primary key
/// constraint.
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Flattens nested validator output into `field`, `parent.field` and
/// `list[index].field` keys.
fn flatten_errors(
    errors: &ValidationErrors,
    prefix: Option<&str>,
    out: &mut BTreeMap<String, Vec<String>>,
) {
    for (field, kind) in errors.errors() {
        let key = match prefix {
            Some(prefix) if *field == "__all__" => prefix.to_string(),
            Some(prefix) => format!("{}.{}", prefix, field),
            None => field.to_string(),
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                let messages = out.entry(key).or_default();
                messages.extend(list.iter().map(describe));
            }
            ValidationErrorsKind::Struct(nested) => flatten_errors(nested, Some(&key), out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    let item_key = format!("{}[{}]", key, index);
                    flatten_errors(nested, Some(&item_key), out);
                }
            }
        }
    }
}

fn describe(error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }

    let param = |name: &str| error.params.get(name).map(|value| value.to_string());
    match error.code.as_ref() {
        "required" => "This field is required".to_string(),
        "email" => "Enter a valid email address".to_string(),
        "length" => match (param("min"), param("max")) {
            (Some(min), Some(max)) => format!("Length must be between {} and {}", min, max),
            (Some(min), None) => format!("Length must be at least {}", min),
            (None, Some(max)) => format!("Length must be at most {}", max),
            (None, None) => "Invalid length".to_string(),
        },
        "range" => match (param("min"), param("max")) {
            (Some(min), Some(max)) => format!("Value must be between {} and {}", min, max),
            (Some(min), None) => format!("Value must be at least {}", min),
            (None, Some(max)) => format!("Value must be at most {}", max),
            (None, None) => "Value out of range".to_string(),
        },
        code => format!("Invalid value ({})", code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Item {
        #[validate(range(min = 1, max = 32000))]
        amount: i32,
    }

    #[derive(Validate)]
    struct Form {
        #[validate(length(min = 1, max = 5))]
        name: String,
        #[validate(nested)]
        items: Vec<Item>,
    }

    #[test]
    fn test_nested_errors_are_flattened_with_indices() {
        let form = Form {
            name: String::new(),
            items: vec![Item { amount: 3 }, Item { amount: 0 }],
        };
        let err: ApiError = form.validate().unwrap_err().into();

        match err {
            ApiError::Validation(fields) => {
                assert_eq!(fields["name"], vec!["Length must be between 1 and 5".to_string()]);
                assert_eq!(
                    fields["items[1].amount"],
                    vec!["Value must be between 1 and 32000".to_string()]
                );
                assert!(!fields.contains_key("items[0].amount"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_status_and_code_mapping() {
        assert_eq!(ApiError::NotFound("Recipe").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::NotFound("Recipe").to_string(), "Recipe not found");
        assert_eq!(ApiError::InvalidToken.code(), "INVALID_TOKEN");
        assert_eq!(ApiError::PermissionDenied.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::Database(DbErr::Custom("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
