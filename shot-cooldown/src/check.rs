use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::invocation::Invocation;

type SyncCheck = dyn Fn(&Invocation) -> bool + Send + Sync;
type AsyncCheck = dyn Fn(Invocation) -> BoxFuture<'static, bool> + Send + Sync;

/// Decides whether a cooldown applies to a call.
///
/// Returning `false` bypasses the cooldown: the call proceeds and consumes no
/// slot. Checks see the same arguments as the guarded callable.
#[derive(Clone)]
pub enum AdmissionCheck {
    Sync(Arc<SyncCheck>),
    Async(Arc<AsyncCheck>),
}

impl AdmissionCheck {
    pub fn sync<F>(check: F) -> Self
    where
        F: Fn(&Invocation) -> bool + Send + Sync + 'static,
    {
        AdmissionCheck::Sync(Arc::new(check))
    }

    pub fn future<F, Fut>(check: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        AdmissionCheck::Async(Arc::new(move |invocation| check(invocation).boxed()))
    }

    /// Evaluates the check. A synchronous check resolves immediately.
    pub async fn evaluate(&self, invocation: &Invocation) -> bool {
        match self {
            AdmissionCheck::Sync(check) => check(invocation),
            AdmissionCheck::Async(check) => check(invocation.clone()).await,
        }
    }
}

impl fmt::Debug for AdmissionCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionCheck::Sync(_) => f.write_str("AdmissionCheck::Sync(..)"),
            AdmissionCheck::Async(_) => f.write_str("AdmissionCheck::Async(..)"),
        }
    }
}
