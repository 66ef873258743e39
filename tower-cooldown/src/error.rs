use std::time::Duration;

use shot_cooldown::CallableOnCooldown;
use shot_cooldown::CooldownError;

/// Errors produced by the cooldown middleware itself.
///
/// Errors of the inner service are passed through untouched and never appear
/// here.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CooldownServiceError {
    /// The request was rejected because its bucket is on cooldown.
    ///
    /// When the `axum` feature is enabled, this converts to
    /// `429 Too Many Requests` with a `Retry-After` header.
    #[error(transparent)]
    OnCooldown(CallableOnCooldown),

    /// The cooldown stack could not process the request, for example because
    /// a bucket strategy did not understand its arguments.
    ///
    /// When the `axum` feature is enabled, this converts to
    /// `500 Internal Server Error`.
    #[error("cooldown stack failed: {0}")]
    Cooldown(CooldownError),
}

impl CooldownServiceError {
    /// How long to wait before retrying, for rejections.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::OnCooldown(on_cooldown) => Some(on_cooldown.retry_after()),
            Self::Cooldown(_) => None,
        }
    }
}

impl From<CooldownError> for CooldownServiceError {
    fn from(err: CooldownError) -> Self {
        match err {
            CooldownError::OnCooldown(on_cooldown) => Self::OnCooldown(on_cooldown),
            other => Self::Cooldown(other),
        }
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for CooldownServiceError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let (status, headers) = match &self {
            Self::OnCooldown(on_cooldown) => {
                // Retry-After is whole seconds; round up so clients never
                // come back early.
                let retry_after = on_cooldown.retry_after();
                let mut secs = retry_after.as_secs();
                if retry_after.subsec_nanos() > 0 {
                    secs += 1;
                }
                let val = axum::http::HeaderValue::from(secs.max(1));
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    Some((axum::http::header::RETRY_AFTER, val)),
                )
            }
            Self::Cooldown(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };

        let mut response = (status, self.to_string()).into_response();
        if let Some((name, value)) = headers {
            response.headers_mut().insert(name, value);
        }
        response
    }
}
