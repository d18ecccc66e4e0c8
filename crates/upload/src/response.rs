//! Parsing of the gallery endpoint's success body.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::UploadError;
use crate::types::UploadResult;

/// Extracts the remote URL from a 2xx body and pairs it with the local path.
///
/// The body must be a JSON object with a non-empty string `url`; other
/// fields are ignored. Anything else is reported as a `Network` error with
/// detail `"malformed response"`.
pub fn parse_upload_response(
    body: &[u8],
    local_path: Option<&Path>,
) -> Result<UploadResult, UploadError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, len = body.len(), "unparseable upload response");
        UploadError::malformed_response()
    })?;

    let Some(object) = value.as_object() else {
        debug!("upload response is not a JSON object");
        return Err(UploadError::malformed_response());
    };

    let url = match object.get("url").and_then(Value::as_str) {
        Some(url) if !url.trim().is_empty() => url,
        _ => {
            debug!("upload response has no usable url");
            return Err(UploadError::malformed_response());
        }
    };

    Ok(UploadResult {
        remote_url: url.to_string(),
        local_path: local_path.map(Path::to_path_buf),
    })
}
