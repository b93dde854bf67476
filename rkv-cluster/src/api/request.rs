//! Request body helpers.

use super::error::ApiError;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::Request;
use hyper::body::Body;
use serde::de::DeserializeOwned;

/// Largest request body the control plane accepts.
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Error type of a size-limited body.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Read the whole body, enforcing [`MAX_BODY_SIZE`].
///
/// Reading stops as soon as the limit is crossed, so an oversized or
/// endless upload never buffers more than the limit.
pub async fn read_body_bytes<B>(req: Request<B>) -> Result<bytes::Bytes, ApiError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let collected = Limited::new(req.into_body(), MAX_BODY_SIZE)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                ApiError::payload_too_large("E103", format!("Body exceeds {} bytes", MAX_BODY_SIZE))
            } else {
                ApiError::bad_request("E102", format!("Failed to read body: {}", e))
            }
        })?;

    Ok(collected.to_bytes())
}

/// Read the body as UTF-8 text.
pub async fn read_body_string<B>(req: Request<B>) -> Result<String, ApiError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let bytes = read_body_bytes(req).await?;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| ApiError::bad_request("E104", format!("Body is not UTF-8: {}", e)))
}

/// Decode the body as JSON.
pub async fn read_body_json<T, B>(req: Request<B>) -> Result<T, ApiError>
where
    T: DeserializeOwned,
    B: Body,
    B::Error: Into<BoxError>,
{
    let bytes = read_body_bytes(req).await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::bad_request("E105", e.to_string()))
}
