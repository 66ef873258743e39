use std::future::Future;

use crate::error::CooldownError;
use crate::error::Result;
use crate::invocation::Invocation;
use crate::registry::CooldownStack;

/// An async function guarded by a stack of cooldowns.
///
/// Every call runs the stack's admission chain before the function body. The
/// function's own errors come back untouched; its error type only needs to be
/// able to carry a [`CooldownError`] as well.
#[derive(Debug, Clone)]
pub struct Guarded<F> {
    stack: CooldownStack,
    f: F,
}

impl<F> Guarded<F> {
    pub fn new(stack: CooldownStack, f: F) -> Self {
        Self { stack, f }
    }

    pub fn stack(&self) -> &CooldownStack {
        &self.stack
    }

    /// Calls the wrapped function if every cooldown admits `invocation`.
    ///
    /// Slots are consumed when the call starts and are not refunded if the
    /// function fails.
    pub async fn call<Fut, T, E>(&self, invocation: Invocation) -> Result<T, E>
    where
        F: Fn(Invocation) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CooldownError>,
    {
        let _permits = self.stack.acquire(&invocation).await?;
        (self.f)(invocation).await
    }

    pub fn get_remaining_calls(&self, invocation: &Invocation) -> Result<usize> {
        self.stack.remaining_calls(invocation)
    }

    pub fn reset_cooldowns(&self) -> Result<()> {
        self.stack.reset_cooldowns()
    }

    pub fn reset_bucket(&self, invocation: &Invocation) -> Result<()> {
        self.stack.reset_bucket(invocation)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::bucket::Bucket;
    use crate::cooldown::Cooldown;
    use crate::registry::CooldownRegistry;
    use crate::trigger::TriggerCooldown;

    #[derive(Debug, thiserror::Error)]
    enum CommandError {
        #[error(transparent)]
        Cooldown(#[from] CooldownError),
        #[error("command failed")]
        Failed,
    }

    fn limit(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[tokio::test]
    async fn body_runs_only_when_admitted() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let registry = CooldownRegistry::new();
        registry.attach(
            "ping",
            Cooldown::new(limit(2), Duration::from_secs(60), Bucket::All).unwrap(),
        );
        let ping = registry.wrap("ping", move |inv: Invocation| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CommandError>(inv.args().len())
            }
        });

        let inv = Invocation::new().arg("pong");
        assert_eq!(ping.call(inv.clone()).await.unwrap(), 1);
        assert_eq!(ping.call(inv.clone()).await.unwrap(), 1);
        let err = ping.call(inv.clone()).await.unwrap_err();
        assert!(matches!(err, CommandError::Cooldown(CooldownError::OnCooldown(_))));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(ping.get_remaining_calls(&inv).unwrap(), 0);

        ping.reset_bucket(&inv).unwrap();
        assert_eq!(ping.get_remaining_calls(&inv).unwrap(), 2);
    }

    #[tokio::test]
    async fn body_errors_pass_through_and_keep_the_slot() {
        let stack = CooldownStack::new("fail")
            .with(Cooldown::new(limit(2), Duration::from_secs(60), Bucket::All).unwrap());
        let fail = Guarded::new(stack, |_inv: Invocation| async {
            Err::<(), _>(CommandError::Failed)
        });

        let inv = Invocation::new();
        assert!(matches!(fail.call(inv.clone()).await, Err(CommandError::Failed)));
        assert_eq!(fail.get_remaining_calls(&inv).unwrap(), 1);

        fail.reset_cooldowns().unwrap();
        assert_eq!(fail.get_remaining_calls(&inv).unwrap(), 2);
    }

    #[tokio::test]
    async fn bypassed_calls_are_not_counted() {
        let cooldown = Cooldown::builder(limit(1), Duration::from_secs(1), Bucket::Args)
            .with_check(|inv| inv.args().first().and_then(|v| v.as_i64()) == Some(1))
            .build()
            .unwrap();
        let guarded = Guarded::new(CooldownStack::new("f").with(cooldown), |_inv: Invocation| async {
            Ok::<_, CooldownError>(())
        });

        for _ in 0..5 {
            guarded.call(Invocation::new().arg(2)).await.unwrap();
        }
        guarded.call(Invocation::new().arg(1)).await.unwrap();
        assert!(guarded.call(Invocation::new().arg(1)).await.is_err());
    }

    #[tokio::test]
    async fn body_can_trigger_its_own_cooldown() {
        let command = Cooldown::new(limit(5), Duration::from_secs(60), Bucket::Args).unwrap();
        let trigger = TriggerCooldown::new(command).unwrap();
        let registry = CooldownRegistry::new();
        registry.attach("login", trigger.clone());

        let lockout = trigger.clone();
        let login = registry.wrap("login", move |inv: Invocation| {
            let lockout = lockout.clone();
            async move {
                if inv.args().get(1).and_then(|v| v.as_str()) == Some("wrong") {
                    lockout.trigger(Duration::from_secs(300), &inv)?;
                    return Err(CommandError::Failed);
                }
                Ok::<_, CommandError>(())
            }
        });

        login.call(Invocation::new().arg("alice").arg("right")).await.unwrap();
        let failed = login.call(Invocation::new().arg("alice").arg("wrong")).await;
        assert!(matches!(failed, Err(CommandError::Failed)));

        let locked = Invocation::new().arg("alice").arg("wrong");
        assert!(trigger.is_triggered(&locked).unwrap());
        let err = login.call(locked.clone()).await.unwrap_err();
        match err {
            CommandError::Cooldown(CooldownError::OnCooldown(on_cooldown)) => {
                assert!(on_cooldown.cooldown().ptr_eq(trigger.trigger_cooldown()));
                assert_eq!(on_cooldown.func(), Some("login"));
            }
            other => panic!("unexpected error {other:?}"),
        }

        // The trigger is per bucket, so other arguments still run.
        login.call(Invocation::new().arg("alice").arg("right")).await.unwrap();
        assert_eq!(login.get_remaining_calls(&locked).unwrap(), 0);
    }
}
