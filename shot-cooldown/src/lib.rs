//! # shot-cooldown
//!
//! `shot-cooldown` provides per-callable cooldowns for async code using the
//! leaky-bucket algorithm.
//!
//! ## Key Concepts
//!
//! * **Buckets**: every call is mapped to a [`BucketKey`] by a
//!   [`BucketStrategy`], so callers with different arguments do not share a
//!   limit.
//! * **Leaky Slots**: an admitted call consumes one slot in its bucket. The
//!   slot leaks away one window after it was taken, regardless of how long
//!   the call runs or whether it fails.
//! * **Lazy Expiry**: expired slots are pruned at the moment of the next
//!   request, eliminating the need for background timers.
//! * **Stacking**: a [`CooldownStack`] admits a call only when every attached
//!   cooldown does, and rolls back partial admissions.
//!
//! ## Feature Flags
//!
//! - `http`: Implements [`IntoInvocation`] for `http::Request`.
//!
//! ## Example
//!
//! ```rust
//! use std::num::NonZeroUsize;
//! use std::time::Duration;
//!
//! use shot_cooldown::Bucket;
//! use shot_cooldown::Cooldown;
//! use shot_cooldown::Invocation;
//!
//! let limit = NonZeroUsize::new(1).unwrap();
//! let cooldown = Cooldown::new(limit, Duration::from_secs(60), Bucket::All).unwrap();
//! let call = Invocation::new().arg("alice");
//!
//! futures::executor::block_on(async {
//!     assert!(cooldown.acquire(&call).await.is_ok());
//!     let err = cooldown.acquire(&call).await.unwrap_err();
//!     let on_cooldown = err.as_on_cooldown().unwrap();
//!     assert!(on_cooldown.retry_after() <= Duration::from_secs(60));
//! });
//! ```

mod bucket;
mod check;
mod cooldown;
mod error;
mod guard;
mod invocation;
mod registry;
mod trigger;
mod window;

pub use bucket::Bucket;
pub use bucket::BucketKey;
pub use bucket::BucketStrategy;
pub use bucket::KeywordBucket;
pub use bucket::PositionalBucket;
pub use check::AdmissionCheck;
pub use cooldown::Admission;
pub use cooldown::Cooldown;
pub use cooldown::CooldownBuilder;
pub use cooldown::Permit;
pub use error::CallableOnCooldown;
pub use error::CooldownError;
pub use error::Result;
pub use guard::Guarded;
pub use invocation::IntoInvocation;
pub use invocation::Invocation;
pub use invocation::Value;
pub use registry::AttachedCooldown;
pub use registry::CooldownRegistry;
pub use registry::CooldownStack;
pub use registry::define_shared_cooldown;
pub use registry::get_remaining_calls;
pub use registry::reset_bucket;
pub use registry::reset_cooldown;
pub use registry::reset_cooldowns;
pub use registry::shared_cooldown;
pub use trigger::TriggerCooldown;
pub use window::Window;
