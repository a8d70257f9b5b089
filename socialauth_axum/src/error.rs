use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::{Result as HttpResponse, StatusCode};
use serde::Serialize;

use socialauth::{AccountError, CoordinationError, MfaError, ReauthError, SocialError};

/// Helper trait for converting errors to a standard response error format
pub trait IntoResponseError<T> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)>;
}

/// Status code for a coordination error
pub(crate) fn status_for(err: &CoordinationError) -> StatusCode {
    match err {
        CoordinationError::Unauthorized
        | CoordinationError::Reauth(ReauthError::Required | ReauthError::NotAuthenticated) => {
            StatusCode::UNAUTHORIZED
        }
        CoordinationError::UnexpectedlyAuthorized
        | CoordinationError::Account(
            AccountError::NoPendingLoginCode | AccountError::TooManyCodeAttempts,
        ) => StatusCode::CONFLICT,
        CoordinationError::ResourceNotFound { .. }
        | CoordinationError::Social(SocialError::AccountNotFound)
        | CoordinationError::Mfa(MfaError::NotFound)
        | CoordinationError::Account(
            AccountError::EmailNotFound | AccountError::LoginByCodeDisabled,
        ) => StatusCode::NOT_FOUND,
        CoordinationError::Account(AccountError::SignupClosed) => StatusCode::FORBIDDEN,
        CoordinationError::Session(socialauth::SessionError::CsrfToken(_)) => StatusCode::FORBIDDEN,
        _ if err.code() == "server_error" => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

impl<T> IntoResponseError<T> for Result<T, CoordinationError> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)> {
        self.map_err(|e| (status_for(&e), e.to_string()))
    }
}

/// Implementation for http::Error (used by Response::builder())
impl<T> IntoResponseError<T> for HttpResponse<T> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)> {
        self.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
}

/// JSON error envelope of the headless API
///
/// `{"status": N, "errors": [{"code", "message", "param"}]}`
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub status: u16,
    pub errors: Vec<ErrorDetail>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            errors: vec![ErrorDetail {
                code: code.to_string(),
                message: message.into(),
                param: None,
            }],
        }
    }

    pub(crate) fn with_param(mut self, param: &str) -> Self {
        if let Some(detail) = self.errors.first_mut() {
            detail.param = Some(param.to_string());
        }
        self
    }
}

impl From<&CoordinationError> for ApiError {
    fn from(err: &CoordinationError) -> Self {
        let status = status_for(err);
        // Internal details stay in the logs
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal server error".to_string()
        } else {
            match err {
                CoordinationError::Account(e) => e.to_string(),
                CoordinationError::Social(e) => e.to_string(),
                CoordinationError::Provider(e) => e.to_string(),
                CoordinationError::Reauth(e) => e.to_string(),
                CoordinationError::Mfa(e) => e.to_string(),
                other => other.to_string(),
            }
        };
        Self {
            status: status.as_u16(),
            errors: vec![ErrorDetail {
                code: err.code().to_string(),
                message,
                param: err.param().map(str::to_string),
            }],
        }
    }
}

impl From<CoordinationError> for ApiError {
    fn from(err: CoordinationError) -> Self {
        Self::from(&err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn test_coordination_error_unauthorized() {
        let result: Result<(), CoordinationError> = Err(CoordinationError::Unauthorized);
        let Err((status, _)) = result.into_response_error() else {
            panic!("expected error");
        };
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_login_code_error_statuses() {
        let status = |e: AccountError| status_for(&CoordinationError::from(e));
        assert_eq!(status(AccountError::IncorrectCode), StatusCode::BAD_REQUEST);
        assert_eq!(status(AccountError::TooManyCodeAttempts), StatusCode::CONFLICT);
        assert_eq!(status(AccountError::NoPendingLoginCode), StatusCode::CONFLICT);
        assert_eq!(status(AccountError::LoginByCodeDisabled), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_reauthentication_required_is_unauthorized() {
        let err: CoordinationError = ReauthError::Required.into();
        assert_eq!(status_for(&err), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_validation_and_not_found() {
        let err: CoordinationError = AccountError::EmailTaken.into();
        assert_eq!(status_for(&err), StatusCode::BAD_REQUEST);

        let err: CoordinationError = SocialError::AccountNotFound.into();
        assert_eq!(status_for(&err), StatusCode::NOT_FOUND);

        let err = CoordinationError::ResourceNotFound {
            resource_type: "User".to_string(),
            resource_id: "123".to_string(),
        };
        assert_eq!(status_for(&err), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_server_errors_hide_details() {
        let err: CoordinationError = SocialError::Storage("db exploded".into()).into();
        let api = ApiError::from(&err);
        assert_eq!(api.status, 500);
        assert_eq!(api.errors[0].code, "server_error");
        assert_eq!(api.errors[0].message, "Internal server error");
    }

    #[tokio::test]
    async fn test_api_error_envelope() {
        let err: CoordinationError = AccountError::EmailTaken.into();
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], 400);
        assert_eq!(json["errors"][0]["code"], "email_taken");
        assert_eq!(json["errors"][0]["param"], "email");
    }

    #[test]
    fn test_http_error() {
        let result: HttpResponse<String> = Err(StatusCode::from_u16(1000).unwrap_err().into());
        let Err((status, _)) = result.into_response_error() else {
            panic!("expected error");
        };
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
