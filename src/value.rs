//! Host values - the dynamic side of every conversion
//!
//! Design: mirrors the host runtime's value model (a JavaScript-like engine):
//! a single double-precision number type, strings, sequences and opaque
//! handles owned by the host's object system.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque handle produced by the object/struct wrapper system.
///
/// Identity is pointer identity of the shared allocation: two handles are the
/// same host object exactly when `ptr_eq` holds.
#[derive(Clone)]
pub struct HostHandle(Arc<dyn Any + Send + Sync>);

impl HostHandle {
    pub fn new<T: Any + Send + Sync>(inner: T) -> Self {
        Self(Arc::new(inner))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostHandle({:p})", Arc::as_ptr(&self.0))
    }
}

pub type HostFn = dyn Fn(&[Value]) -> Value + Send + Sync;

/// Invocable host value.
#[derive(Clone)]
pub struct HostFunction {
    name: String,
    body: Arc<HostFn>,
}

impl HostFunction {
    pub fn new(name: impl Into<String>, body: impl Fn(&[Value]) -> Value + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            body: Arc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.body)(args)
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.body, &other.body)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostFunction({})", self.name)
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(HostHandle),
    Function(HostFunction),
    /// A native value the host cannot represent (list, hash, error, ...).
    /// Carries the native type name.
    Unrepresentable(String),
}

impl Value {
    #[inline]
    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Host `typeof` name, used in argument diagnostics
    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined | Self::Unrepresentable(_) => "undefined",
            Self::Null | Self::Array(_) | Self::Object(_) => "object",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Function(_) => "function",
        }
    }

    /// Host truthiness
    pub fn to_boolean(&self) -> bool {
        match self {
            Self::Undefined | Self::Null | Self::Unrepresentable(_) => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Array(_) | Self::Object(_) | Self::Function(_) => true,
        }
    }

    /// Host numeric conversion
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined | Self::Unrepresentable(_) => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Number(n) => *n,
            Self::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            Self::Array(items) => match items.as_slice() {
                [] => 0.0,
                [single] => single.to_number(),
                _ => f64::NAN,
            },
            Self::Object(_) | Self::Function(_) => f64::NAN,
        }
    }

    /// Number with an exact 32-bit signed representation
    pub fn is_int32(&self) -> bool {
        match self {
            Self::Number(n) => {
                n.fract() == 0.0
                    && *n >= i32::MIN as f64
                    && *n <= i32::MAX as f64
                    && !(*n == 0.0 && n.is_sign_negative())
            }
            _ => false,
        }
    }

    /// Number with an exact 32-bit unsigned representation
    pub fn is_uint32(&self) -> bool {
        match self {
            Self::Number(n) => {
                n.fract() == 0.0
                    && *n >= 0.0
                    && *n <= u32::MAX as f64
                    && !(*n == 0.0 && n.is_sign_negative())
            }
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&HostHandle> {
        match self {
            Self::Object(handle) => Some(handle),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            (Self::Unrepresentable(a), Self::Unrepresentable(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<HostFunction> for Value {
    fn from(f: HostFunction) -> Self {
        Self::Function(f)
    }
}
