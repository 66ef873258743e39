use shot_cooldown::AttachedCooldown;
use shot_cooldown::CooldownRegistry;
use shot_cooldown::CooldownStack;
use tower::Layer;

use crate::service::CooldownService;

/// Applies a stack of cooldowns to requests.
///
/// Every service produced by one layer shares the same cooldown state, so
/// cloning a layer or layering several services rate limits them together.
#[derive(Clone, Debug)]
pub struct CooldownLayer {
    stack: CooldownStack,
}

impl CooldownLayer {
    /// Create a CooldownLayer
    pub fn new(stack: CooldownStack) -> Self {
        CooldownLayer { stack }
    }

    /// A layer applying a single cooldown.
    pub fn single(func: &str, cooldown: impl Into<AttachedCooldown>) -> Self {
        CooldownLayer::new(CooldownStack::new(func).with(cooldown))
    }

    /// A layer applying the cooldowns registered for `func`.
    ///
    /// # Errors
    ///
    /// Fails with `NoRegisteredCooldowns` if nothing is attached to `func`.
    pub fn from_registry(
        registry: &CooldownRegistry,
        func: &str,
    ) -> shot_cooldown::Result<Self> {
        registry.stack(func).map(CooldownLayer::new)
    }

    /// Add another cooldown, evaluated after those already in the layer.
    pub fn with_cooldown(mut self, cooldown: impl Into<AttachedCooldown>) -> Self {
        self.stack.push(cooldown);
        self
    }

    pub fn stack(&self) -> &CooldownStack {
        &self.stack
    }
}

impl<S> Layer<S> for CooldownLayer {
    type Service = CooldownService<S>;

    fn layer(&self, service: S) -> Self::Service {
        CooldownService::new(service, self.stack.clone())
    }
}
