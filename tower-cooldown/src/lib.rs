//! # Tower Cooldown
//!
//! `tower-cooldown` applies [`shot_cooldown`] cooldowns to
//! [Tower](https://github.com/tower-rs/tower) services.
//!
//! Each request is turned into an [`Invocation`](shot_cooldown::Invocation)
//! through [`IntoInvocation`](shot_cooldown::IntoInvocation), run through the
//! layer's [`CooldownStack`](shot_cooldown::CooldownStack), and only then
//! handed to the inner service:
//!
//! 1. **Fail Fast**: saturated buckets reject the request immediately with a
//!    boxed [`CooldownServiceError::OnCooldown`]. Requests are never queued.
//! 2. **No Partial Consumption**: when one cooldown of a stack rejects, slots
//!    taken by the others for that request are handed back.
//! 3. **Transparent Errors**: errors from the inner service pass through
//!    unchanged.
//!
//! ## Feature Flags
//!
//! - `axum`: Enables `IntoResponse` for [`CooldownServiceError`], converting
//!   rejections to `429 Too Many Requests` with a `Retry-After` header.

mod error;
mod layer;
mod service;


pub use error::CooldownServiceError;
pub use layer::CooldownLayer;
pub use service::CooldownService;
pub use service::ResponseFuture;
