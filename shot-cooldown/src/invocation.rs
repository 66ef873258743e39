use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ordered_float::OrderedFloat;

/// A single hashable argument value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Unit,
    Bool(bool),
    /// Any integer. Every width and signedness lands here, so `5u8` and
    /// `5i64` are the same value.
    Int(i128),
    Float(OrderedFloat<f64>),
    Str(Arc<str>),
    Bytes(Arc<[u8]>),
    List(Vec<Value>),
}

impl Value {
    /// Returns the string slice if this is a `Str` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer if it fits in an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => i64::try_from(*i).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => f.write_str("()"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "b{:?}", &b[..]),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(i: $t) -> Self {
                Value::Int(i as i128)
            }
        })*
    };
}

value_from_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(OrderedFloat(x))
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(OrderedFloat(x as f64))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(Arc::from(b))
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(Arc::from(b))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Unit, Into::into)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// The arguments of one call to a cooldown-guarded callable.
///
/// Positional arguments keep their order. Keyword arguments are kept sorted by
/// name, so the order in which they were supplied never matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Invocation {
    args: Vec<Value>,
    kwargs: BTreeMap<String, Value>,
}

impl Invocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Set a keyword argument, replacing any previous value for `name`.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn kwargs(&self) -> &BTreeMap<String, Value> {
        &self.kwargs
    }

    /// Looks up a keyword argument by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.kwargs.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }
}

impl<V: Into<Value>> FromIterator<V> for Invocation {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self {
            args: iter.into_iter().map(Into::into).collect(),
            kwargs: BTreeMap::new(),
        }
    }
}

/// Types which can describe themselves as an [`Invocation`].
///
/// Request types passed through a cooldown-guarded service implement this so
/// that bucket strategies can see their arguments.
pub trait IntoInvocation {
    fn to_invocation(&self) -> Invocation;
}

impl IntoInvocation for Invocation {
    fn to_invocation(&self) -> Invocation {
        self.clone()
    }
}

impl IntoInvocation for () {
    fn to_invocation(&self) -> Invocation {
        Invocation::new()
    }
}

/// HTTP requests are described by their method and path as positional
/// arguments, with every header that has a textual value as a keyword
/// argument named after the lowercase header name.
#[cfg(feature = "http")]
impl<B> IntoInvocation for http::Request<B> {
    fn to_invocation(&self) -> Invocation {
        let mut invocation = Invocation::new()
            .arg(self.method().as_str())
            .arg(self.uri().path());
        for (name, value) in self.headers() {
            if let Ok(value) = value.to_str() {
                invocation = invocation.kwarg(name.as_str(), value);
            }
        }
        invocation
    }
}
