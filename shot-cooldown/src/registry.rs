use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;

use parking_lot::RwLock;

use crate::bucket::BucketStrategy;
use crate::cooldown::Admission;
use crate::cooldown::Cooldown;
use crate::cooldown::Permit;
use crate::error::CooldownError;
use crate::error::Result;
use crate::guard::Guarded;
use crate::invocation::Invocation;
use crate::trigger::TriggerCooldown;

/// One entry of a [`CooldownStack`].
#[derive(Debug, Clone)]
pub enum AttachedCooldown {
    Plain(Cooldown),
    Trigger(TriggerCooldown),
}

impl From<Cooldown> for AttachedCooldown {
    fn from(cooldown: Cooldown) -> Self {
        AttachedCooldown::Plain(cooldown)
    }
}

impl From<TriggerCooldown> for AttachedCooldown {
    fn from(cooldown: TriggerCooldown) -> Self {
        AttachedCooldown::Trigger(cooldown)
    }
}

impl AttachedCooldown {
    async fn acquire(&self, invocation: &Invocation) -> Result<Admission> {
        match self {
            AttachedCooldown::Plain(cooldown) => cooldown.acquire(invocation).await,
            AttachedCooldown::Trigger(cooldown) => cooldown.acquire(invocation).await,
        }
    }

    fn remaining_calls(&self, invocation: &Invocation) -> Result<usize> {
        match self {
            AttachedCooldown::Plain(cooldown) => cooldown.remaining_calls(invocation),
            AttachedCooldown::Trigger(cooldown) => cooldown.remaining_calls(invocation),
        }
    }

    fn reset(&self) {
        match self {
            AttachedCooldown::Plain(cooldown) => cooldown.reset(None),
            AttachedCooldown::Trigger(cooldown) => cooldown.reset(),
        }
    }

    fn reset_bucket(&self, invocation: &Invocation) -> Result<()> {
        match self {
            AttachedCooldown::Plain(cooldown) => {
                let key = cooldown.get_bucket(invocation)?;
                cooldown.reset(Some(&key));
                Ok(())
            }
            AttachedCooldown::Trigger(cooldown) => cooldown.reset_bucket(invocation),
        }
    }

    /// Every cooldown making up this entry; both halves of a trigger.
    pub fn cooldowns(&self) -> impl Iterator<Item = &Cooldown> {
        let (main, trigger) = match self {
            AttachedCooldown::Plain(cooldown) => (cooldown, None),
            AttachedCooldown::Trigger(cooldown) => {
                (cooldown.cooldown(), Some(cooldown.trigger_cooldown()))
            }
        };
        std::iter::once(main).chain(trigger)
    }
}

/// Permits granted so far in one pass over a stack.
///
/// Dropped before [`disarm`](Self::disarm), it hands every slot back. This
/// covers both an explicit rejection and the admission future being dropped
/// while a later check is pending.
struct PendingPermits(Vec<Permit>);

impl PendingPermits {
    fn disarm(mut self) -> Vec<Permit> {
        std::mem::take(&mut self.0)
    }
}

impl Drop for PendingPermits {
    fn drop(&mut self) {
        self.0.drain(..).for_each(Permit::revoke);
    }
}

/// The ordered cooldowns attached to one callable.
///
/// Cooldowns are evaluated in the order they were pushed. A call is admitted
/// only if every cooldown admits it.
#[derive(Debug, Clone)]
pub struct CooldownStack {
    func: Arc<str>,
    cooldowns: Vec<AttachedCooldown>,
}

impl CooldownStack {
    pub fn new(func: impl Into<Arc<str>>) -> Self {
        Self {
            func: func.into(),
            cooldowns: Vec::new(),
        }
    }

    /// Adds a cooldown, evaluated after those already attached.
    pub fn with(mut self, cooldown: impl Into<AttachedCooldown>) -> Self {
        self.push(cooldown);
        self
    }

    pub fn push(&mut self, cooldown: impl Into<AttachedCooldown>) {
        self.cooldowns.push(cooldown.into());
    }

    /// Name of the callable this stack guards.
    pub fn func(&self) -> &str {
        &self.func
    }

    pub fn entries(&self) -> &[AttachedCooldown] {
        &self.cooldowns
    }

    /// Every cooldown in the stack, trigger halves included.
    pub fn cooldowns(&self) -> impl Iterator<Item = &Cooldown> {
        self.cooldowns.iter().flat_map(|entry| entry.cooldowns())
    }

    pub fn is_empty(&self) -> bool {
        self.cooldowns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cooldowns.len()
    }

    /// Runs a call through every attached cooldown.
    ///
    /// On the first rejection the slots already consumed by earlier
    /// cooldowns in this call are handed back, so a rejected call never
    /// leaves a partial footprint. The same happens if the returned future
    /// is dropped before it completes.
    ///
    /// # Errors
    ///
    /// Returns the first cooldown's error, with the callable name attached to
    /// rejections.
    pub async fn acquire(&self, invocation: &Invocation) -> Result<Vec<Permit>> {
        let mut pending = PendingPermits(Vec::with_capacity(self.cooldowns.len()));
        for cooldown in &self.cooldowns {
            match cooldown.acquire(invocation).await {
                Ok(Admission::Granted(permit)) => pending.0.push(permit),
                Ok(Admission::Bypassed) => {}
                Err(err) => {
                    if !pending.0.is_empty() {
                        tracing::debug!(
                            func = %self.func,
                            revoked = pending.0.len(),
                            "call rejected, revoking slots consumed earlier in the stack"
                        );
                    }
                    return Err(self.attribute(err));
                }
            }
        }
        Ok(pending.disarm())
    }

    fn attribute(&self, err: CooldownError) -> CooldownError {
        match err {
            CooldownError::OnCooldown(on_cooldown) => {
                CooldownError::OnCooldown(on_cooldown.with_func(self.func.as_ref()))
            }
            other => other,
        }
    }

    fn ensure_registered(&self) -> Result<()> {
        if self.cooldowns.is_empty() {
            Err(CooldownError::NoRegisteredCooldowns {
                func: self.func.to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// The lowest number of remaining calls across all attached cooldowns.
    pub fn remaining_calls(&self, invocation: &Invocation) -> Result<usize> {
        self.ensure_registered()?;
        let mut remaining = usize::MAX;
        for cooldown in &self.cooldowns {
            remaining = remaining.min(cooldown.remaining_calls(invocation)?);
        }
        Ok(remaining)
    }

    /// Resets every bucket of every attached cooldown.
    pub fn reset_cooldowns(&self) -> Result<()> {
        self.ensure_registered()?;
        self.cooldowns.iter().for_each(AttachedCooldown::reset);
        Ok(())
    }

    /// Resets, in every attached cooldown, the bucket these arguments map to.
    pub fn reset_bucket(&self, invocation: &Invocation) -> Result<()> {
        self.ensure_registered()?;
        for cooldown in &self.cooldowns {
            cooldown.reset_bucket(invocation)?;
        }
        Ok(())
    }

    /// Finds an attached cooldown by id, including trigger halves.
    pub fn get_cooldown(&self, cooldown_id: &str) -> Option<&Cooldown> {
        self.cooldowns()
            .find(|cooldown| cooldown.cooldown_id() == Some(cooldown_id))
    }
}

static GLOBAL: LazyLock<CooldownRegistry> = LazyLock::new(CooldownRegistry::new);

/// Tracks which cooldowns are attached to which callables, and the shared
/// cooldowns available to them by id.
#[derive(Debug, Default)]
pub struct CooldownRegistry {
    stacks: RwLock<HashMap<String, CooldownStack>>,
    shared: RwLock<HashMap<String, Cooldown>>,
}

impl CooldownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by the free functions of this crate.
    pub fn global() -> &'static CooldownRegistry {
        &GLOBAL
    }

    /// Attaches `cooldown` to `func`, after any cooldowns already attached.
    ///
    /// A [`TriggerCooldown`] attaches both its halves, and either can later
    /// be found by id.
    pub fn attach(&self, func: &str, cooldown: impl Into<AttachedCooldown>) {
        self.stacks
            .write()
            .entry(func.to_string())
            .or_insert_with(|| CooldownStack::new(func))
            .push(cooldown);
    }

    /// Attaches the shared cooldown registered as `cooldown_id` to `func`.
    pub fn attach_shared(&self, func: &str, cooldown_id: &str) -> Result<Cooldown> {
        let cooldown = self.shared_cooldown(cooldown_id)?;
        self.attach(func, cooldown.clone());
        Ok(cooldown)
    }

    /// A snapshot of the cooldowns attached to `func`.
    pub fn stack(&self, func: &str) -> Result<CooldownStack> {
        self.stacks
            .read()
            .get(func)
            .filter(|stack| !stack.is_empty())
            .cloned()
            .ok_or_else(|| CooldownError::NoRegisteredCooldowns {
                func: func.to_string(),
            })
    }

    /// Wraps `f` in the cooldowns currently attached to `func`.
    ///
    /// Attach cooldowns before wrapping; later attachments are not seen by
    /// the returned wrapper.
    pub fn wrap<F>(&self, func: &str, f: F) -> Guarded<F> {
        let stack = self
            .stacks
            .read()
            .get(func)
            .cloned()
            .unwrap_or_else(|| CooldownStack::new(func));
        Guarded::new(stack, f)
    }

    pub fn get_remaining_calls(&self, func: &str, invocation: &Invocation) -> Result<usize> {
        self.stack(func)?.remaining_calls(invocation)
    }

    pub fn reset_cooldowns(&self, func: &str) -> Result<()> {
        self.stack(func)?.reset_cooldowns()
    }

    pub fn reset_bucket(&self, func: &str, invocation: &Invocation) -> Result<()> {
        self.stack(func)?.reset_bucket(invocation)
    }

    /// Finds the cooldown with `cooldown_id` attached to `func`.
    pub fn get_cooldown(&self, func: &str, cooldown_id: &str) -> Result<Cooldown> {
        self.stack(func)?
            .get_cooldown(cooldown_id)
            .cloned()
            .ok_or_else(|| CooldownError::NonExistent {
                cooldown_id: cooldown_id.to_string(),
            })
    }

    /// Resets every cooldown tagged with `cooldown_id`, whether shared or
    /// attached directly to a callable.
    pub fn reset_cooldown(&self, cooldown_id: &str) -> Result<()> {
        let mut matched: Vec<Cooldown> = Vec::new();
        if let Some(shared) = self.shared.read().get(cooldown_id) {
            matched.push(shared.clone());
        }
        for stack in self.stacks.read().values() {
            for cooldown in stack.cooldowns() {
                if cooldown.cooldown_id() == Some(cooldown_id)
                    && !matched.iter().any(|seen| seen.ptr_eq(cooldown))
                {
                    matched.push(cooldown.clone());
                }
            }
        }

        if matched.is_empty() {
            return Err(CooldownError::NonExistent {
                cooldown_id: cooldown_id.to_string(),
            });
        }
        matched.iter().for_each(|cooldown| cooldown.reset(None));
        Ok(())
    }

    /// Creates a cooldown which several callables can share under
    /// `cooldown_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CooldownError::CooldownAlreadyExists`] if the id is taken.
    pub fn define_shared_cooldown<B>(
        &self,
        limit: NonZeroUsize,
        time_period: Duration,
        bucket: B,
        cooldown_id: &str,
    ) -> Result<Cooldown>
    where
        B: BucketStrategy + 'static,
    {
        let cooldown = Cooldown::builder(limit, time_period, bucket)
            .with_cooldown_id(cooldown_id)
            .build()?;
        self.define_shared(cooldown)
    }

    /// Registers an already configured cooldown for sharing under its id.
    pub fn define_shared(&self, cooldown: Cooldown) -> Result<Cooldown> {
        let cooldown_id = cooldown
            .cooldown_id()
            .ok_or(CooldownError::InvalidConfig("shared cooldowns need a cooldown id"))?
            .to_string();

        match self.shared.write().entry(cooldown_id) {
            Entry::Occupied(entry) => {
                tracing::warn!(cooldown_id = %entry.key(), "shared cooldown defined twice");
                Err(CooldownError::CooldownAlreadyExists {
                    cooldown_id: entry.key().clone(),
                })
            }
            Entry::Vacant(entry) => {
                tracing::debug!(cooldown = %cooldown, "shared cooldown defined");
                Ok(entry.insert(cooldown).clone())
            }
        }
    }

    /// The shared cooldown registered as `cooldown_id`.
    pub fn shared_cooldown(&self, cooldown_id: &str) -> Result<Cooldown> {
        self.shared
            .read()
            .get(cooldown_id)
            .cloned()
            .ok_or_else(|| CooldownError::NonExistent {
                cooldown_id: cooldown_id.to_string(),
            })
    }
}

/// [`CooldownRegistry::define_shared_cooldown`] on the global registry.
pub fn define_shared_cooldown<B>(
    limit: NonZeroUsize,
    time_period: Duration,
    bucket: B,
    cooldown_id: &str,
) -> Result<Cooldown>
where
    B: BucketStrategy + 'static,
{
    CooldownRegistry::global().define_shared_cooldown(limit, time_period, bucket, cooldown_id)
}

/// [`CooldownRegistry::shared_cooldown`] on the global registry.
pub fn shared_cooldown(cooldown_id: &str) -> Result<Cooldown> {
    CooldownRegistry::global().shared_cooldown(cooldown_id)
}

/// [`CooldownRegistry::get_remaining_calls`] on the global registry.
pub fn get_remaining_calls(func: &str, invocation: &Invocation) -> Result<usize> {
    CooldownRegistry::global().get_remaining_calls(func, invocation)
}

/// [`CooldownRegistry::reset_cooldowns`] on the global registry.
pub fn reset_cooldowns(func: &str) -> Result<()> {
    CooldownRegistry::global().reset_cooldowns(func)
}

/// [`CooldownRegistry::reset_bucket`] on the global registry.
pub fn reset_bucket(func: &str, invocation: &Invocation) -> Result<()> {
    CooldownRegistry::global().reset_bucket(func, invocation)
}

/// [`CooldownRegistry::reset_cooldown`] on the global registry.
pub fn reset_cooldown(cooldown_id: &str) -> Result<()> {
    CooldownRegistry::global().reset_cooldown(cooldown_id)
}

#[cfg(test)]
mod tests {
    use quanta::Clock;

    use super::*;
    use crate::bucket::Bucket;

    fn limit(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn cooldown(n: usize, bucket: Bucket) -> Cooldown {
        Cooldown::new(limit(n), Duration::from_secs(1), bucket).unwrap()
    }

    #[tokio::test]
    async fn stacked_rejection_leaves_no_partial_consumption() {
        let args = cooldown(1, Bucket::Args);
        let kwargs = cooldown(2, Bucket::Kwargs);
        let stack = CooldownStack::new("command")
            .with(args.clone())
            .with(kwargs.clone());
        let inv = Invocation::new().arg(1).kwarg("user", "bob");

        assert_eq!(stack.acquire(&inv).await.unwrap().len(), 2);
        assert_eq!(args.remaining_calls(&inv).unwrap(), 0);
        assert_eq!(kwargs.remaining_calls(&inv).unwrap(), 1);

        let err = stack.acquire(&inv).await.unwrap_err();
        let on_cooldown = err.as_on_cooldown().unwrap();
        assert!(on_cooldown.cooldown().ptr_eq(&args));
        assert_eq!(on_cooldown.func(), Some("command"));
        assert_eq!(kwargs.remaining_calls(&inv).unwrap(), 1);
    }

    #[tokio::test]
    async fn later_rejection_revokes_earlier_slots() {
        // Attachment order is evaluation order: the Kwargs cooldown is checked
        // first here, consumes, and then has to give its slot back.
        let kwargs = cooldown(2, Bucket::Kwargs);
        let args = cooldown(1, Bucket::Args);
        let stack = CooldownStack::new("command")
            .with(kwargs.clone())
            .with(args.clone());
        let inv = Invocation::new().arg(1).kwarg("user", "bob");

        stack.acquire(&inv).await.unwrap();
        let err = stack.acquire(&inv).await.unwrap_err();
        assert!(err.as_on_cooldown().unwrap().cooldown().ptr_eq(&args));
        assert_eq!(kwargs.remaining_calls(&inv).unwrap(), 1);
        assert_eq!(stack.remaining_calls(&inv).unwrap(), 0);
    }

    #[tokio::test]
    async fn remaining_calls_is_the_minimum() {
        let stack = CooldownStack::new("f")
            .with(cooldown(5, Bucket::All))
            .with(cooldown(2, Bucket::All))
            .with(cooldown(3, Bucket::All));
        let inv = Invocation::new();

        assert_eq!(stack.remaining_calls(&inv).unwrap(), 2);
        stack.acquire(&inv).await.unwrap();
        assert_eq!(stack.remaining_calls(&inv).unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_stacks_admit_but_refuse_queries() {
        let stack = CooldownStack::new("bare");
        assert!(stack.acquire(&Invocation::new()).await.unwrap().is_empty());
        assert!(matches!(
            stack.remaining_calls(&Invocation::new()),
            Err(CooldownError::NoRegisteredCooldowns { func }) if func == "bare"
        ));
        assert!(stack.reset_cooldowns().is_err());
        assert!(stack.reset_bucket(&Invocation::new()).is_err());
    }

    #[tokio::test]
    async fn reset_bucket_only_touches_that_bucket() {
        let registry = CooldownRegistry::new();
        registry.attach("f", cooldown(1, Bucket::Args));
        registry.attach("f", cooldown(2, Bucket::Args));
        let stack = registry.stack("f").unwrap();

        let one = Invocation::new().arg(1);
        let two = Invocation::new().arg(2);
        stack.acquire(&one).await.unwrap();
        stack.acquire(&two).await.unwrap();

        registry.reset_bucket("f", &one).unwrap();
        assert_eq!(registry.get_remaining_calls("f", &one).unwrap(), 1);
        assert_eq!(registry.get_remaining_calls("f", &two).unwrap(), 0);

        registry.reset_cooldowns("f").unwrap();
        assert_eq!(registry.get_remaining_calls("f", &two).unwrap(), 1);
        for cooldown in stack.cooldowns() {
            assert_eq!(cooldown.remaining_calls(&two).unwrap(), cooldown.limit().get());
        }
    }

    #[tokio::test]
    async fn dropped_admission_hands_back_earlier_slots() {
        use futures::FutureExt;

        let first = cooldown(2, Bucket::All);
        let stalled = Cooldown::builder(limit(1), Duration::from_secs(1), Bucket::All)
            .with_async_check(|_inv| futures::future::pending::<bool>())
            .build()
            .unwrap();
        let stack = CooldownStack::new("command")
            .with(first.clone())
            .with(stalled);
        let inv = Invocation::new().arg(1);

        // One poll takes the first slot and parks on the second check.
        assert!(stack.acquire(&inv).now_or_never().is_none());
        assert_eq!(first.remaining_calls(&inv).unwrap(), 2);
        assert_eq!(first.tracked_buckets(), 0);
    }

    #[tokio::test]
    async fn attached_triggers_can_be_engaged_and_reset_by_id() {
        let registry = CooldownRegistry::new();
        let command = Cooldown::builder(limit(3), Duration::from_secs(60), Bucket::Args)
            .with_cooldown_id("command")
            .build()
            .unwrap();
        let trigger = TriggerCooldown::new(command).unwrap();
        registry.attach("f", trigger.clone());
        registry.attach("f", cooldown(5, Bucket::All));

        let stack = registry.stack("f").unwrap();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.cooldowns().count(), 3);

        let inv = Invocation::new().arg("alice");
        stack.acquire(&inv).await.unwrap();
        assert_eq!(registry.get_remaining_calls("f", &inv).unwrap(), 2);

        trigger.trigger(Duration::from_secs(30), &inv).unwrap();
        assert_eq!(registry.get_remaining_calls("f", &inv).unwrap(), 0);
        let err = stack.acquire(&inv).await.unwrap_err();
        let on_cooldown = err.as_on_cooldown().unwrap();
        assert!(on_cooldown.cooldown().ptr_eq(trigger.trigger_cooldown()));
        assert_eq!(on_cooldown.func(), Some("f"));

        assert!(
            registry
                .get_cooldown("f", "command:trigger")
                .unwrap()
                .ptr_eq(trigger.trigger_cooldown())
        );
        registry.reset_cooldown("command:trigger").unwrap();
        assert!(!trigger.is_triggered(&inv).unwrap());
        assert_eq!(registry.get_remaining_calls("f", &inv).unwrap(), 2);

        trigger.trigger(Duration::from_secs(30), &inv).unwrap();
        registry.reset_bucket("f", &inv).unwrap();
        assert_eq!(registry.get_remaining_calls("f", &inv).unwrap(), 3);
    }

    #[test]
    fn unknown_callables_are_not_registered() {
        let registry = CooldownRegistry::new();
        assert!(matches!(
            registry.get_remaining_calls("nope", &Invocation::new()),
            Err(CooldownError::NoRegisteredCooldowns { .. })
        ));
        assert!(registry.reset_cooldowns("nope").is_err());
        assert!(registry.stack("nope").is_err());
    }

    #[test]
    fn shared_cooldowns_are_defined_once() {
        let registry = CooldownRegistry::new();
        let defined = registry
            .define_shared_cooldown(limit(1), Duration::from_secs(5), Bucket::All, "x")
            .unwrap();

        let again = registry.define_shared_cooldown(limit(1), Duration::from_secs(5), Bucket::All, "x");
        assert!(matches!(
            again,
            Err(CooldownError::CooldownAlreadyExists { cooldown_id }) if cooldown_id == "x"
        ));

        assert!(registry.shared_cooldown("x").unwrap().ptr_eq(&defined));
        assert!(matches!(
            registry.shared_cooldown("y"),
            Err(CooldownError::NonExistent { .. })
        ));
        assert!(registry.attach_shared("f", "y").is_err());

        let unnamed = cooldown(1, Bucket::All);
        assert!(matches!(
            registry.define_shared(unnamed),
            Err(CooldownError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn shared_state_is_visible_to_every_callable() {
        let registry = CooldownRegistry::new();
        registry
            .define_shared_cooldown(limit(1), Duration::from_secs(5), Bucket::All, "x")
            .unwrap();
        registry.attach_shared("first", "x").unwrap();
        registry.attach_shared("second", "x").unwrap();

        let inv = Invocation::new().arg(1).arg(2);
        registry.stack("first").unwrap().acquire(&inv).await.unwrap();

        let err = registry.stack("second").unwrap().acquire(&inv).await.unwrap_err();
        let on_cooldown = err.as_on_cooldown().unwrap();
        assert_eq!(on_cooldown.func(), Some("second"));
        assert_eq!(registry.get_remaining_calls("first", &inv).unwrap(), 0);
    }

    #[tokio::test]
    async fn reset_cooldown_finds_attached_and_shared_ids() {
        let registry = CooldownRegistry::new();
        let daily = Cooldown::builder(limit(1), Duration::from_secs(60), Bucket::All)
            .with_cooldown_id("daily")
            .build()
            .unwrap();
        registry.attach("f", daily.clone());
        registry.attach("f", cooldown(1, Bucket::All));
        registry
            .define_shared_cooldown(limit(1), Duration::from_secs(60), Bucket::All, "shared")
            .unwrap();
        registry.attach_shared("g", "shared").unwrap();

        let inv = Invocation::new();
        registry.stack("f").unwrap().acquire(&inv).await.unwrap();
        registry.stack("g").unwrap().acquire(&inv).await.unwrap();

        registry.reset_cooldown("daily").unwrap();
        assert_eq!(daily.remaining_calls(&inv).unwrap(), 1);
        // The untagged cooldown on `f` is left alone.
        assert_eq!(registry.get_remaining_calls("f", &inv).unwrap(), 0);

        registry.reset_cooldown("shared").unwrap();
        assert_eq!(registry.get_remaining_calls("g", &inv).unwrap(), 1);

        assert!(matches!(
            registry.reset_cooldown("missing"),
            Err(CooldownError::NonExistent { .. })
        ));
        assert!(registry.get_cooldown("f", "daily").unwrap().ptr_eq(&daily));
        assert!(registry.get_cooldown("f", "weekly").is_err());
    }

    #[test]
    fn global_registry_is_process_wide() {
        let id = "registry-tests-global";
        define_shared_cooldown(limit(1), Duration::from_secs(1), Bucket::All, id).unwrap();
        assert!(shared_cooldown(id).unwrap().ptr_eq(&CooldownRegistry::global().shared_cooldown(id).unwrap()));
        assert!(define_shared_cooldown(limit(1), Duration::from_secs(1), Bucket::All, id).is_err());

        CooldownRegistry::global().attach_shared("registry-tests-fn", id).unwrap();
        assert_eq!(get_remaining_calls("registry-tests-fn", &Invocation::new()).unwrap(), 1);
        reset_cooldowns("registry-tests-fn").unwrap();
        reset_bucket("registry-tests-fn", &Invocation::new()).unwrap();
        reset_cooldown(id).unwrap();
    }

    #[tokio::test]
    async fn concurrent_stack_calls_admit_exactly_limit() {
        let (clock, _mock) = Clock::mock();
        let shared = Cooldown::builder(limit(7), Duration::from_secs(1), Bucket::All)
            .with_clock(clock)
            .build()
            .unwrap();
        let stack = Arc::new(CooldownStack::new("hammer").with(shared));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let stack = Arc::clone(&stack);
            handles.push(tokio::spawn(async move {
                tokio::task::yield_now().await;
                stack.acquire(&Invocation::new().arg("same")).await.is_ok()
            }));
        }

        let mut admitted = 0;
        let mut rejected = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            } else {
                rejected += 1;
            }
        }
        assert_eq!(admitted, 7);
        assert_eq!(rejected, 43);
    }
}
