use std::time::Duration;

use time::OffsetDateTime;

use crate::bucket::BucketKey;
use crate::cooldown::Cooldown;

/// Result alias used across the crate.
pub type Result<T, E = CooldownError> = std::result::Result<T, E>;

/// Every failure produced by the cooldown engine.
///
/// `OnCooldown` is the expected control-flow signal when a call is rejected.
/// The remaining variants signal misuse at setup or query time.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CooldownError {
    /// The call was rejected because its bucket is saturated.
    #[error(transparent)]
    OnCooldown(#[from] CallableOnCooldown),

    /// The callable has no cooldowns attached to it.
    #[error("`{func}` has no attached cooldowns")]
    NoRegisteredCooldowns {
        /// Name of the callable which was queried.
        func: String,
    },

    /// No cooldown is registered under this id.
    #[error("no cooldown registered with id `{cooldown_id}`; was it defined first?")]
    NonExistent {
        /// The id which could not be found.
        cooldown_id: String,
    },

    /// A shared cooldown with this id already exists.
    #[error("a cooldown with id `{cooldown_id}` already exists")]
    CooldownAlreadyExists {
        /// The duplicated id.
        cooldown_id: String,
    },

    /// The bucket strategy could not derive a key from the arguments.
    #[error("failed to process the bucket: {0}")]
    UnknownBucket(String),

    /// The cooldown was constructed with an unusable configuration.
    #[error("invalid cooldown configuration: {0}")]
    InvalidConfig(&'static str),
}

impl CooldownError {
    /// Returns the rejection details if this error is a cooldown rejection.
    pub fn as_on_cooldown(&self) -> Option<&CallableOnCooldown> {
        match self {
            CooldownError::OnCooldown(on_cooldown) => Some(on_cooldown),
            _ => None,
        }
    }
}

/// A call was rejected because its bucket has no free slots.
///
/// Carries enough context to tell a caller when to come back.
#[derive(Debug, Clone, thiserror::Error)]
#[error("this function is being rate-limited; please try again in {retry_after:?}")]
pub struct CallableOnCooldown {
    pub(crate) func: Option<String>,
    pub(crate) cooldown: Cooldown,
    pub(crate) bucket: BucketKey,
    pub(crate) retry_after: Duration,
    pub(crate) resets_at: OffsetDateTime,
}

impl CallableOnCooldown {
    pub(crate) fn new(cooldown: Cooldown, bucket: BucketKey, retry_after: Duration) -> Self {
        Self {
            func: None,
            cooldown,
            bucket,
            retry_after,
            resets_at: OffsetDateTime::now_utc() + retry_after,
        }
    }

    pub(crate) fn with_func(mut self, func: impl Into<String>) -> Self {
        self.func = Some(func.into());
        self
    }

    /// Name of the rate-limited callable, when the rejection came through a
    /// named stack or wrapper.
    pub fn func(&self) -> Option<&str> {
        self.func.as_deref()
    }

    /// The cooldown which rejected the call.
    pub fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    /// The bucket which is saturated.
    pub fn bucket(&self) -> &BucketKey {
        &self.bucket
    }

    /// How long until the bucket frees its next slot.
    pub fn retry_after(&self) -> Duration {
        self.retry_after
    }

    /// [`retry_after`](Self::retry_after) in fractional seconds.
    pub fn retry_after_secs(&self) -> f64 {
        self.retry_after.as_secs_f64()
    }

    /// The UTC instant at which the bucket frees its next slot.
    pub fn resets_at(&self) -> OffsetDateTime {
        self.resets_at
    }
}
