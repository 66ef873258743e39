use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Debug;

use crate::error::CooldownError;
use crate::error::Result;
use crate::invocation::Invocation;
use crate::invocation::Value;

/// Identifies one bucket within a [`Cooldown`](crate::Cooldown).
///
/// Two invocations which produce equal keys share the same slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    args: Vec<Value>,
    kwargs: BTreeMap<String, Value>,
}

impl BucketKey {
    pub fn new(args: Vec<Value>, kwargs: BTreeMap<String, Value>) -> Self {
        Self { args, kwargs }
    }

    /// A key made from a single value.
    pub fn single(value: impl Into<Value>) -> Self {
        Self {
            args: vec![value.into()],
            kwargs: BTreeMap::new(),
        }
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn kwargs(&self) -> &BTreeMap<String, Value> {
        &self.kwargs
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        let mut first = true;
        for arg in &self.args {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{arg}")?;
        }
        for (name, value) in &self.kwargs {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{name}={value}")?;
        }
        f.write_str(")")
    }
}

/// Derives a bucket key from the arguments of an invocation.
///
/// Strategies must be `Send` and `Sync` so a cooldown can be shared across
/// tasks and threads.
pub trait BucketStrategy: Debug + Send + Sync {
    /// Processes the arguments of a call into a bucket key.
    ///
    /// # Errors
    ///
    /// Returns [`CooldownError::UnknownBucket`] if the arguments do not have
    /// the shape this strategy expects.
    fn process(&self, invocation: &Invocation) -> Result<BucketKey>;
}

impl<T> BucketStrategy for std::sync::Arc<T>
where
    T: BucketStrategy + ?Sized,
{
    fn process(&self, invocation: &Invocation) -> Result<BucketKey> {
        (**self).process(invocation)
    }
}

/// The generic bucket strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Buckets are defined using all arguments.
    #[default]
    All,
    /// Buckets are defined using only the positional arguments.
    Args,
    /// Buckets are defined using only the keyword arguments.
    Kwargs,
}

impl BucketStrategy for Bucket {
    fn process(&self, invocation: &Invocation) -> Result<BucketKey> {
        let key = match self {
            Bucket::All => BucketKey::new(invocation.args().to_vec(), invocation.kwargs().clone()),
            Bucket::Args => BucketKey::new(invocation.args().to_vec(), BTreeMap::new()),
            Bucket::Kwargs => BucketKey::new(Vec::new(), invocation.kwargs().clone()),
        };
        Ok(key)
    }
}

/// Buckets on the value of one keyword argument.
///
/// Fails with [`CooldownError::UnknownBucket`] when the keyword is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordBucket {
    name: String,
}

impl KeywordBucket {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl BucketStrategy for KeywordBucket {
    fn process(&self, invocation: &Invocation) -> Result<BucketKey> {
        invocation
            .get(&self.name)
            .map(|value| BucketKey::single(value.clone()))
            .ok_or_else(|| {
                CooldownError::UnknownBucket(format!("missing keyword argument `{}`", self.name))
            })
    }
}

/// Buckets on the positional argument at `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionalBucket {
    index: usize,
}

impl PositionalBucket {
    pub fn new(index: usize) -> Self {
        Self { index }
    }
}

impl BucketStrategy for PositionalBucket {
    fn process(&self, invocation: &Invocation) -> Result<BucketKey> {
        invocation
            .args()
            .get(self.index)
            .map(|value| BucketKey::single(value.clone()))
            .ok_or_else(|| {
                CooldownError::UnknownBucket(format!(
                    "expected at least {} positional arguments, found {}",
                    self.index + 1,
                    invocation.args().len()
                ))
            })
    }
}
