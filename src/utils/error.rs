use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;

/// Erros da camada de persistência
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("mongodb: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Erros de configuração detectados no startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Fixed set of error kinds the API exposes to clients.
///
/// Internal details (driver errors, IO errors) are logged where they happen
/// and never leave the process; the wire only carries `kind` and a fixed
/// message.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing URL parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid URL parameters")]
    InvalidParameter,
    #[error("Request body is missing")]
    MissingBody,
    #[error("{0}")]
    InvalidBody(&'static str),
    #[error("picture file is required")]
    MissingPicture,
    #[error("picture must be an image")]
    UnsupportedMediaType,
    #[error("picture exceeds the limit of {0} bytes")]
    PayloadTooLarge(u64),
    #[error("Failed to store upload")]
    UploadFailed,
    #[error("Database operation failed")]
    Database(#[from] StoreError),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::MissingParameter(_) => "missing_parameter",
            ApiError::InvalidParameter => "invalid_parameter",
            ApiError::MissingBody => "missing_body",
            ApiError::InvalidBody(_) => "invalid_body",
            ApiError::MissingPicture => "missing_picture",
            ApiError::UnsupportedMediaType => "unsupported_media_type",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::UploadFailed => "upload_failed",
            ApiError::Database(_) => "database",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingParameter(_)
            | ApiError::InvalidParameter
            | ApiError::MissingBody
            | ApiError::InvalidBody(_)
            | ApiError::MissingPicture => StatusCode::BAD_REQUEST,
            ApiError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UploadFailed | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Database display carries the driver message; only the fixed text goes out
        let message = match self {
            ApiError::Database(e) => {
                log::error!("❌ Database error: {}", e);
                "Database operation failed".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(ErrorBody {
            success: false,
            error: self.kind(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn database_errors_do_not_leak_driver_details() {
        let err = ApiError::from(StoreError::Unavailable("connection refused at 10.0.0.3".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "database");
        assert_eq!(json["message"], "Database operation failed");
        assert!(!String::from_utf8_lossy(&body).contains("10.0.0.3"));
    }

    #[test]
    fn client_errors_map_to_expected_status() {
        assert_eq!(ApiError::MissingParameter("email").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::MissingParameter("email").to_string(), "Missing URL parameter: email");
        assert_eq!(ApiError::MissingBody.to_string(), "Request body is missing");
        assert_eq!(ApiError::InvalidParameter.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::UnsupportedMediaType.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(ApiError::PayloadTooLarge(10).status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
