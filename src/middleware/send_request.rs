use axum::{
    Form, Json,
    body::Bytes,
    extract::{FromRequest, Request},
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;

use crate::error::ApiResponse;

/// Request body accepted either as JSON or as a urlencoded form.
/// An empty body deserializes to `T::default()`, so that field validation can
/// report every missing field.
pub struct SendBody<T>(pub T);

impl<S, T> FromRequest<S> for SendBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);

        match content_type.as_deref() {
            Some(ct) if ct.starts_with("application/x-www-form-urlencoded") => {
                let Form(body) = Form::<T>::from_request(req, state)
                    .await
                    .map_err(IntoResponse::into_response)?;
                Ok(Self(body))
            }
            _ => {
                let bytes = Bytes::from_request(req, state)
                    .await
                    .map_err(IntoResponse::into_response)?;
                parse_json_body(&bytes).map(Self)
            }
        }
    }
}

/// Empty or whitespace-only bodies become `T::default()`. Malformed JSON is a
/// 400 in the usual `{status, response}` envelope.
fn parse_json_body<T>(bytes: &[u8]) -> Result<T, Response>
where
    T: DeserializeOwned + Default,
{
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::failed(e.to_string())),
        )
            .into_response()
    })
}
