//! The API's uniform response envelopes.

use {
    axum::{Json, http::StatusCode, response::IntoResponse},
    serde::Serialize,
};

/// Success envelope: `{"success":true,"data":...,"message":...}`.
#[derive(Serialize)]
pub struct ApiSuccess<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Error envelope: `{"success":false,"error":...,"code":...,"details":...}`.
#[derive(Serialize)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip)]
    pub status: StatusCode,
}

pub fn ok<T: Serialize>(data: T) -> (StatusCode, Json<ApiSuccess<T>>) {
    (
        StatusCode::OK,
        Json(ApiSuccess {
            success: true,
            data,
            message: None,
        }),
    )
}

pub fn created<T: Serialize>(
    data: T,
    message: impl Into<String>,
) -> (StatusCode, Json<ApiSuccess<T>>) {
    (
        StatusCode::CREATED,
        Json(ApiSuccess {
            success: true,
            data,
            message: Some(message.into()),
        }),
    )
}

pub fn ok_with_message<T: Serialize>(
    data: T,
    message: impl Into<String>,
) -> (StatusCode, Json<ApiSuccess<T>>) {
    (
        StatusCode::OK,
        Json(ApiSuccess {
            success: true,
            data,
            message: Some(message.into()),
        }),
    )
}

impl ApiError {
    pub fn not_found(error: impl Into<String>, code: &'static str) -> Self {
        Self {
            success: false,
            error: error.into(),
            code: Some(code),
            details: None,
            status: StatusCode::NOT_FOUND,
        }
    }

    pub fn bad_request(
        error: impl Into<String>,
        code: &'static str,
        details: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            error: error.into(),
            code: Some(code),
            details: Some(details.into()),
            status: StatusCode::BAD_REQUEST,
        }
    }

    pub fn internal(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            code: None,
            details: None,
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}
