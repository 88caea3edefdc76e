use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

/// Body shape shared by every endpoint: `{code, data, message}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub code: u16,
    pub data: T,
    pub message: String,
}

/// 200 response wrapping `data`.
#[derive(Debug)]
pub struct ApiOk<T: Serialize>(pub T, pub &'static str);

impl<T: Serialize> IntoResponse for ApiOk<T> {
    fn into_response(self) -> Response {
        let body = Envelope {
            code: StatusCode::OK.as_u16(),
            data: self.0,
            message: self.1.to_string(),
        };
        (StatusCode::OK, Json(body)).into_response()
    }
}

/// 200 response with an empty `data` object.
pub fn ok_empty(message: &'static str) -> ApiOk<serde_json::Value> {
    ApiOk(json!({}), message)
}
