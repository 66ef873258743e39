use std::future::Future;
use std::num::NonZeroUsize;
use std::time::Duration;

use crate::cooldown::Admission;
use crate::cooldown::Cooldown;
use crate::cooldown::CooldownBuilder;
use crate::error::CallableOnCooldown;
use crate::error::CooldownError;
use crate::error::Result;
use crate::invocation::Invocation;

/// A cooldown which can additionally be triggered from inside the guarded
/// call.
///
/// While triggered for a bucket, every call in that bucket is rejected until
/// the trigger period has elapsed. Otherwise calls go through the normal
/// cooldown.
#[derive(Debug, Clone)]
pub struct TriggerCooldown {
    cooldown: Cooldown,
    trigger: Cooldown,
}

impl TriggerCooldown {
    /// Builds a trigger cooldown around `cooldown`.
    ///
    /// The trigger half shares the bucket strategy, clock and admission check
    /// of `cooldown`. When `cooldown` has an id, the trigger half is tagged
    /// `"<id>:trigger"`.
    pub fn new(cooldown: Cooldown) -> Result<Self> {
        let mut builder = CooldownBuilder::new(
            NonZeroUsize::MIN,
            cooldown.window().clone(),
            cooldown.shared_bucket(),
        )
        .with_clock(cooldown.clock().clone());
        if let Some(check) = cooldown.admission_check() {
            builder = builder.with_admission_check(check.clone());
        }
        if let Some(id) = cooldown.cooldown_id() {
            builder = builder.with_cooldown_id(format!("{id}:trigger"));
        }
        Ok(Self {
            trigger: builder.build()?,
            cooldown,
        })
    }

    /// The cooldown applied while not triggered.
    pub fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    /// The limit-1 cooldown engaged by [`trigger`](Self::trigger).
    pub fn trigger_cooldown(&self) -> &Cooldown {
        &self.trigger
    }

    /// Rejects every call in the bucket of `invocation` for `period`.
    ///
    /// Triggering an already triggered bucket restarts its period.
    pub fn trigger(&self, period: Duration, invocation: &Invocation) -> Result<()> {
        let key = self.trigger.get_bucket(invocation)?;
        self.trigger.reset(Some(&key));
        tracing::debug!(cooldown = %self.cooldown, bucket = %key, period = ?period, "cooldown triggered");
        self.trigger.occupy(key, period).map(|_permit| ())
    }

    /// Returns `true` while the bucket of `invocation` is triggered.
    pub fn is_triggered(&self, invocation: &Invocation) -> Result<bool> {
        let key = self.trigger.get_bucket(invocation)?;
        Ok(self.trigger.remaining_calls_for(&key) == 0)
    }

    /// Calls left in the bucket of `invocation`; zero while triggered.
    pub fn remaining_calls(&self, invocation: &Invocation) -> Result<usize> {
        if self.is_triggered(invocation)? {
            return Ok(0);
        }
        self.cooldown.remaining_calls(invocation)
    }

    /// Attempts to admit a call, rejecting it while triggered.
    pub async fn acquire(&self, invocation: &Invocation) -> Result<Admission> {
        if !self.cooldown.applies_to(invocation).await {
            return Ok(Admission::Bypassed);
        }

        let trigger_key = self.trigger.get_bucket(invocation)?;
        if let Some(retry_after) = self.trigger.next_reset(&trigger_key) {
            return Err(CallableOnCooldown::new(self.trigger.clone(), trigger_key, retry_after).into());
        }

        let key = self.cooldown.get_bucket(invocation)?;
        self.cooldown.try_acquire_key(key).map(Admission::Granted)
    }

    /// Runs `f` once admitted. The consumed slot is not refunded if `f` fails.
    pub async fn run<F, Fut, T, E>(&self, invocation: &Invocation, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CooldownError>,
    {
        let _admission = self.acquire(invocation).await?;
        f().await
    }

    /// Clears both the normal and the trigger cooldown.
    pub fn reset(&self) {
        self.cooldown.reset(None);
        self.trigger.reset(None);
    }

    /// Clears the bucket of `invocation` in both halves, lifting any trigger.
    pub fn reset_bucket(&self, invocation: &Invocation) -> Result<()> {
        let key = self.cooldown.get_bucket(invocation)?;
        self.cooldown.reset(Some(&key));
        let key = self.trigger.get_bucket(invocation)?;
        self.trigger.reset(Some(&key));
        Ok(())
    }
}
