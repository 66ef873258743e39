use std::collections::BTreeSet;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use parking_lot::Mutex;
use quanta::Clock;
use quanta::Instant;
use time::OffsetDateTime;
use time::Time;

use crate::bucket::BucketKey;
use crate::bucket::BucketStrategy;
use crate::check::AdmissionCheck;
use crate::error::CallableOnCooldown;
use crate::error::Result;
use crate::invocation::Invocation;
use crate::window::Window;

/// A consumed slot, ordered by when it leaks out of its bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Slot {
    release_at: Instant,
    id: u64,
}

/// Pending releases for one bucket key, earliest first.
#[derive(Debug, Default)]
struct BucketState {
    releases: BTreeSet<Slot>,
}

impl BucketState {
    fn prune(&mut self, now: Instant) {
        while let Some(first) = self.releases.first() {
            if first.release_at > now {
                break;
            }
            self.releases.pop_first();
        }
    }

    fn live(&self, now: Instant) -> impl Iterator<Item = &Slot> {
        self.releases.iter().filter(move |slot| slot.release_at > now)
    }

    fn is_idle(&self, now: Instant) -> bool {
        self.live(now).next().is_none()
    }
}

/// Every tracked bucket, plus when idle ones are next swept away.
#[derive(Debug, Default)]
struct BucketMap {
    entries: HashMap<BucketKey, BucketState>,
    next_sweep: Option<Instant>,
}

impl BucketMap {
    /// Forgets buckets which no longer hold any live slot.
    fn sweep(&mut self, now: Instant) {
        self.entries.retain(|_, state| {
            state.prune(now);
            !state.releases.is_empty()
        });
    }

    /// Sweeps at most once per `interval`, measured from the first
    /// acquisition after the previous sweep.
    fn maybe_sweep(&mut self, now: Instant, interval: Duration) {
        let due = self.next_sweep.is_some_and(|at| at <= now);
        if due {
            let before = self.entries.len();
            self.sweep(now);
            tracing::trace!(evicted = before - self.entries.len(), "idle buckets swept");
        }
        if due || self.next_sweep.is_none() {
            self.next_sweep = Some(now + interval);
        }
    }
}

struct Inner {
    limit: NonZeroUsize,
    window: Window,
    bucket: Arc<dyn BucketStrategy>,
    check: Option<AdmissionCheck>,
    cooldown_id: Option<String>,
    clock: Clock,
    buckets: Mutex<BucketMap>,
    next_slot: AtomicU64,
}

/// A leaky-bucket cooldown.
///
/// Each bucket key may hold at most `limit` slots. A slot is consumed when a
/// call is admitted and leaks out of its bucket once the window has elapsed,
/// whether or not the call has finished (or failed).
///
/// `Cooldown` is a handle: clones share the same state, which is how one
/// cooldown is shared between several callables.
#[derive(Clone)]
pub struct Cooldown {
    inner: Arc<Inner>,
}

/// The outcome of a successful [`Cooldown::acquire`].
#[derive(Debug)]
pub enum Admission {
    /// A slot was consumed.
    Granted(Permit),
    /// The admission check declined to apply the cooldown; nothing was consumed.
    Bypassed,
}

impl Admission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Admission::Granted(_))
    }

    pub fn into_permit(self) -> Option<Permit> {
        match self {
            Admission::Granted(permit) => Some(permit),
            Admission::Bypassed => None,
        }
    }
}

/// A slot held in one bucket of a cooldown.
///
/// The slot expires on its own schedule: dropping the permit does not give
/// the slot back, so a permit can scope a call without tying the slot's
/// lifetime to it.
#[derive(Debug)]
pub struct Permit {
    cooldown: Cooldown,
    key: BucketKey,
    slot: Slot,
}

impl Permit {
    pub fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    pub fn bucket(&self) -> &BucketKey {
        &self.key
    }

    /// Time left until this slot leaks out of its bucket.
    pub fn expires_in(&self) -> Duration {
        self.slot
            .release_at
            .saturating_duration_since(self.cooldown.inner.clock.now())
    }

    /// Hands the slot back immediately.
    ///
    /// Only used to undo a partial admission through a stack.
    pub(crate) fn revoke(self) {
        let mut buckets = self.cooldown.inner.buckets.lock();
        if let Some(state) = buckets.entries.get_mut(&self.key) {
            state.releases.remove(&self.slot);
            if state.releases.is_empty() {
                buckets.entries.remove(&self.key);
            }
        }
    }
}

impl Cooldown {
    /// Creates a rolling-window cooldown allowing `limit` calls per
    /// `time_period` for each bucket.
    ///
    /// # Errors
    ///
    /// Returns [`CooldownError::InvalidConfig`](crate::CooldownError::InvalidConfig)
    /// if `time_period` is zero.
    pub fn new<B>(limit: NonZeroUsize, time_period: Duration, bucket: B) -> Result<Self>
    where
        B: BucketStrategy + 'static,
    {
        Self::builder(limit, time_period, bucket).build()
    }

    /// Creates a cooldown whose slots are all released at the next of
    /// `reset_times` (UTC).
    pub fn new_static<B>(limit: NonZeroUsize, reset_times: Vec<Time>, bucket: B) -> Result<Self>
    where
        B: BucketStrategy + 'static,
    {
        Self::builder(limit, Duration::ZERO, bucket)
            .with_window(Window::Static(reset_times))
            .build()
    }

    pub fn builder<B>(limit: NonZeroUsize, time_period: Duration, bucket: B) -> CooldownBuilder
    where
        B: BucketStrategy + 'static,
    {
        CooldownBuilder::new(limit, Window::Rolling(time_period), Arc::new(bucket))
    }

    pub fn limit(&self) -> NonZeroUsize {
        self.inner.limit
    }

    pub fn window(&self) -> &Window {
        &self.inner.window
    }

    /// The rolling period, `None` for static cooldowns.
    pub fn time_period(&self) -> Option<Duration> {
        self.inner.window.period()
    }

    pub fn cooldown_id(&self) -> Option<&str> {
        self.inner.cooldown_id.as_deref()
    }

    pub fn bucket_strategy(&self) -> &dyn BucketStrategy {
        self.inner.bucket.as_ref()
    }

    pub(crate) fn shared_bucket(&self) -> Arc<dyn BucketStrategy> {
        Arc::clone(&self.inner.bucket)
    }

    pub(crate) fn clock(&self) -> &Clock {
        &self.inner.clock
    }

    /// Returns `true` if both handles refer to the same cooldown state.
    pub fn ptr_eq(&self, other: &Cooldown) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Computes the bucket key for a call.
    pub fn get_bucket(&self, invocation: &Invocation) -> Result<BucketKey> {
        self.inner.bucket.process(invocation)
    }

    /// Attempts to admit a call.
    ///
    /// The admission check runs first; if it declines, the call is admitted
    /// without being counted. Otherwise one slot is consumed from the call's
    /// bucket.
    ///
    /// # Errors
    ///
    /// Returns [`CooldownError::OnCooldown`](crate::CooldownError::OnCooldown)
    /// if the bucket is saturated, or the bucket strategy's error.
    pub async fn acquire(&self, invocation: &Invocation) -> Result<Admission> {
        if !self.applies_to(invocation).await {
            return Ok(Admission::Bypassed);
        }
        let key = self.get_bucket(invocation)?;
        self.try_acquire_key(key).map(Admission::Granted)
    }

    /// Evaluates the admission check, `true` when there is none.
    pub async fn applies_to(&self, invocation: &Invocation) -> bool {
        let Some(check) = &self.inner.check else {
            return true;
        };
        let applies = check.evaluate(invocation).await;
        if !applies {
            tracing::debug!(cooldown = %self, "admission check declined, bypassing cooldown");
        }
        applies
    }

    pub(crate) fn admission_check(&self) -> Option<&AdmissionCheck> {
        self.inner.check.as_ref()
    }

    /// Consumes a slot in the given bucket, skipping the admission check.
    pub fn try_acquire_key(&self, key: BucketKey) -> Result<Permit> {
        let hold = self.inner.window.hold_for(OffsetDateTime::now_utc());
        self.occupy(key, hold)
    }

    /// Consumes a slot held for `hold`, regardless of the configured window.
    pub(crate) fn occupy(&self, key: BucketKey, hold: Duration) -> Result<Permit> {
        let limit = self.inner.limit.get();
        let now = self.inner.clock.now();

        // Check and increment under one lock so concurrent callers can never
        // both observe a free slot.
        let mut buckets = self.inner.buckets.lock();
        buckets.maybe_sweep(now, hold);
        let state = buckets.entries.entry(key.clone()).or_default();
        state.prune(now);

        let used = state.releases.len();
        if used >= limit {
            let retry_after = state
                .releases
                .first()
                .map(|slot| slot.release_at.saturating_duration_since(now))
                .unwrap_or_default();
            drop(buckets);
            tracing::debug!(
                cooldown = %self,
                bucket = %key,
                retry_after = ?retry_after,
                "bucket saturated, rejecting call"
            );
            return Err(CallableOnCooldown::new(self.clone(), key, retry_after).into());
        }

        let slot = Slot {
            release_at: now + hold,
            id: self.inner.next_slot.fetch_add(1, Ordering::Relaxed),
        };
        state.releases.insert(slot);
        drop(buckets);

        tracing::trace!(
            cooldown = %self,
            bucket = %key,
            remaining = limit - used - 1,
            "slot consumed"
        );
        Ok(Permit {
            cooldown: self.clone(),
            key,
            slot,
        })
    }

    /// Runs `f` once a slot has been acquired for `invocation`.
    ///
    /// The slot stays consumed if `f` fails.
    pub async fn run<F, Fut, T, E>(&self, invocation: &Invocation, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<crate::CooldownError>,
    {
        let _admission = self.acquire(invocation).await?;
        f().await
    }

    /// How many more calls with these arguments would be admitted right now.
    pub fn remaining_calls(&self, invocation: &Invocation) -> Result<usize> {
        let key = self.get_bucket(invocation)?;
        Ok(self.remaining_calls_for(&key))
    }

    /// How many more calls in this bucket would be admitted right now.
    pub fn remaining_calls_for(&self, key: &BucketKey) -> usize {
        let now = self.inner.clock.now();
        let buckets = self.inner.buckets.lock();
        let used = buckets
            .entries
            .get(key)
            .map_or(0, |state| state.live(now).count());
        self.inner.limit.get().saturating_sub(used)
    }

    /// Time until the earliest held slot in this bucket is released, `None`
    /// if the bucket holds no slots.
    pub fn next_reset(&self, key: &BucketKey) -> Option<Duration> {
        let now = self.inner.clock.now();
        let buckets = self.inner.buckets.lock();
        buckets
            .entries
            .get(key)
            .and_then(|state| state.live(now).next())
            .map(|slot| slot.release_at.saturating_duration_since(now))
    }

    /// Releases every slot, either in one bucket or in all of them.
    pub fn reset(&self, key: Option<&BucketKey>) {
        let mut buckets = self.inner.buckets.lock();
        match key {
            Some(key) => {
                buckets.entries.remove(key);
                tracing::debug!(cooldown = %self, bucket = %key, "bucket reset");
            }
            None => {
                buckets.entries.clear();
                tracing::debug!(cooldown = %self, "all buckets reset");
            }
        }
    }

    /// Forgets buckets which no longer hold any slots.
    ///
    /// Acquisitions already do this once per window; calling it directly
    /// frees memory sooner.
    pub fn clear(&self) {
        let now = self.inner.clock.now();
        self.inner.buckets.lock().sweep(now);
    }

    /// Number of buckets currently tracked, including idle ones not yet
    /// cleared.
    pub fn tracked_buckets(&self) -> usize {
        self.inner.buckets.lock().entries.len()
    }

    /// Returns `true` if any bucket holds a live slot.
    pub fn has_cooldown(&self) -> bool {
        let now = self.inner.clock.now();
        let buckets = self.inner.buckets.lock();
        buckets.entries.values().any(|state| !state.is_idle(now))
    }
}

impl fmt::Display for Cooldown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cooldown(limit={}", self.inner.limit)?;
        match &self.inner.window {
            Window::Rolling(period) => write!(f, ", time_period={period:?}")?,
            Window::Static(times) => write!(f, ", resets_at={times:?}")?,
        }
        if let Some(id) = &self.inner.cooldown_id {
            write!(f, ", id={id}")?;
        }
        f.write_str(")")
    }
}

impl fmt::Debug for Cooldown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cooldown")
            .field("limit", &self.inner.limit)
            .field("window", &self.inner.window)
            .field("bucket", &self.inner.bucket)
            .field("check", &self.inner.check)
            .field("cooldown_id", &self.inner.cooldown_id)
            .finish_non_exhaustive()
    }
}

/// Configures a [`Cooldown`].
#[derive(Debug)]
pub struct CooldownBuilder {
    limit: NonZeroUsize,
    window: Window,
    bucket: Arc<dyn BucketStrategy>,
    check: Option<AdmissionCheck>,
    cooldown_id: Option<String>,
    clock: Option<Clock>,
}

impl CooldownBuilder {
    pub(crate) fn new(limit: NonZeroUsize, window: Window, bucket: Arc<dyn BucketStrategy>) -> Self {
        Self {
            limit,
            window,
            bucket,
            check: None,
            cooldown_id: None,
            clock: None,
        }
    }

    pub fn with_window(mut self, window: Window) -> Self {
        self.window = window;
        self
    }

    /// Only apply the cooldown to calls for which `check` returns `true`.
    pub fn with_check<F>(self, check: F) -> Self
    where
        F: Fn(&Invocation) -> bool + Send + Sync + 'static,
    {
        self.with_admission_check(AdmissionCheck::sync(check))
    }

    /// Like [`with_check`](Self::with_check), but the check is awaited.
    pub fn with_async_check<F, Fut>(self, check: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.with_admission_check(AdmissionCheck::future(check))
    }

    pub fn with_admission_check(mut self, check: AdmissionCheck) -> Self {
        self.check = Some(check);
        self
    }

    /// Tag the cooldown so it can be found and reset by id.
    pub fn with_cooldown_id(mut self, cooldown_id: impl Into<String>) -> Self {
        self.cooldown_id = Some(cooldown_id.into());
        self
    }

    /// Use `clock` instead of the system clock to time slots.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<Cooldown> {
        self.window.validate()?;
        Ok(Cooldown {
            inner: Arc::new(Inner {
                limit: self.limit,
                window: self.window,
                bucket: self.bucket,
                check: self.check,
                cooldown_id: self.cooldown_id,
                clock: self.clock.unwrap_or_default(),
                buckets: Mutex::new(BucketMap::default()),
                next_slot: AtomicU64::new(0),
            }),
        })
    }
}
