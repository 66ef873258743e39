use std::future::Future;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;
use std::task::ready;

use futures::future::BoxFuture;
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use pin_project_lite::pin_project;
use tower::BoxError;
use tower::Service;

use shot_cooldown::CooldownStack;
use shot_cooldown::IntoInvocation;
use shot_cooldown::Permit;

use crate::error::CooldownServiceError;

#[derive(Clone, Debug)]
struct CooldownServiceMetrics {
    admitted: Counter<u64>,
    rejected: Counter<u64>,
}

impl CooldownServiceMetrics {
    fn new() -> Self {
        let meter = global::meter("cooldown_service");
        Self {
            admitted: meter.u64_counter("cooldown_admitted").build(),
            rejected: meter.u64_counter("cooldown_rejected").build(),
        }
    }
}

/// Runs every request through a [`CooldownStack`] before calling the inner
/// service.
///
/// Rejected requests fail immediately with a boxed [`CooldownServiceError`];
/// they are never queued or retried.
#[derive(Clone, Debug)]
pub struct CooldownService<S> {
    inner: S,
    stack: CooldownStack,
    instruments: CooldownServiceMetrics,
}

impl<S> CooldownService<S> {
    pub fn new(inner: S, stack: CooldownStack) -> Self {
        Self {
            inner,
            stack,
            instruments: CooldownServiceMetrics::new(),
        }
    }

    pub fn stack(&self) -> &CooldownStack {
        &self.stack
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

pin_project! {
    #[project = StateProj]
    enum State<F> {
        Admitting {
            admission: BoxFuture<'static, shot_cooldown::Result<Vec<Permit>>>,
        },
        Calling {
            #[pin]
            future: F,
        },
    }
}

pin_project! {
    /// Waits for the cooldown stack to admit the request, then drives the
    /// inner service's future.
    pub struct ResponseFuture<S, Req, F> {
        #[pin]
        state: State<F>,
        inner: Option<S>,
        req: Option<Req>,
        func: String,
        instruments: CooldownServiceMetrics,
    }
}

impl<S, Req, F> Future for ResponseFuture<S, Req, F>
where
    S: Service<Req, Future = F, Error = BoxError>,
    F: Future<Output = Result<S::Response, BoxError>>,
{
    type Output = Result<S::Response, BoxError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();
        loop {
            match this.state.as_mut().project() {
                StateProj::Admitting { admission } => {
                    let outcome = ready!(admission.as_mut().poll(cx));
                    let func = KeyValue::new("func", this.func.clone());
                    if let Err(err) = outcome {
                        this.instruments.rejected.add(1, &[func]);
                        let err = CooldownServiceError::from(err);
                        return Poll::Ready(Err(Box::new(err)));
                    }
                    this.instruments.admitted.add(1, &[func]);

                    let (Some(mut inner), Some(req)) = (this.inner.take(), this.req.take()) else {
                        return Poll::Ready(Err("ResponseFuture polled after completion".into()));
                    };
                    this.state.set(State::Calling {
                        future: inner.call(req),
                    });
                }
                StateProj::Calling { future } => return future.poll(cx),
            }
        }
    }
}

impl<S, Req> Service<Req> for CooldownService<S>
where
    S: Service<Req, Error = BoxError> + Clone,
    Req: IntoInvocation,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = ResponseFuture<S, Req, S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        // The instance polled ready travels with the request; keep a fresh
        // clone for the next one.
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);

        let stack = self.stack.clone();
        let invocation = req.to_invocation();
        let admission: BoxFuture<'static, _> =
            Box::pin(async move { stack.acquire(&invocation).await });

        ResponseFuture {
            state: State::Admitting { admission },
            inner: Some(inner),
            req: Some(req),
            func: self.stack.func().to_string(),
            instruments: self.instruments.clone(),
        }
    }
}
