//! Boxed generic values
//!
//! The runtime's tagged value container, used wherever metadata says "any
//! value" (property values, signal arguments, generic containers).

use std::ffi::c_void;

use super::encode::wrapping_integer;
use super::MarshalContext;
use crate::config::DecodePolicy;
use crate::errors::{MarshalError, Result};
use crate::metadata::types::{InterfaceDescriptor, InterfaceKind};
use crate::value::Value;

/// Type name used for objects and boxed values stored without one
pub const DEFAULT_OBJECT_TYPE: &str = "GObject.Object";
pub const DEFAULT_BOXED_TYPE: &str = "GObject.Boxed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Invalid,
    Char,
    UChar,
    Boolean,
    Int,
    UInt,
    Long,
    ULong,
    Int64,
    UInt64,
    Enum,
    Flags,
    Float,
    Double,
    String,
    Object,
    Boxed,
    Pointer,
    Array,
    /// The container type itself
    Value,
}

impl ValueType {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Char => "gchar",
            Self::UChar => "guchar",
            Self::Boolean => "gboolean",
            Self::Int => "gint",
            Self::UInt => "guint",
            Self::Long => "glong",
            Self::ULong => "gulong",
            Self::Int64 => "gint64",
            Self::UInt64 => "guint64",
            Self::Enum => "GEnum",
            Self::Flags => "GFlags",
            Self::Float => "gfloat",
            Self::Double => "gdouble",
            Self::String => "gchararray",
            Self::Object => "GObject",
            Self::Boxed => "GBoxed",
            Self::Pointer => "gpointer",
            Self::Array => "GValueArray",
            Self::Value => "GValue",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenericValue {
    Invalid,
    Char(i8),
    UChar(u8),
    Boolean(bool),
    Int(i32),
    UInt(u32),
    Long(i64),
    ULong(u64),
    Int64(i64),
    UInt64(u64),
    Enum(i32),
    Flags(u32),
    Float(f32),
    Double(f64),
    String(Option<String>),
    Object { ptr: *mut c_void, type_name: String },
    Boxed { ptr: *mut c_void, type_name: String },
    Pointer(*mut c_void),
    Array(Vec<GenericValue>),
}

impl Default for GenericValue {
    fn default() -> Self {
        Self::Invalid
    }
}

impl GenericValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Invalid => ValueType::Invalid,
            Self::Char(_) => ValueType::Char,
            Self::UChar(_) => ValueType::UChar,
            Self::Boolean(_) => ValueType::Boolean,
            Self::Int(_) => ValueType::Int,
            Self::UInt(_) => ValueType::UInt,
            Self::Long(_) => ValueType::Long,
            Self::ULong(_) => ValueType::ULong,
            Self::Int64(_) => ValueType::Int64,
            Self::UInt64(_) => ValueType::UInt64,
            Self::Enum(_) => ValueType::Enum,
            Self::Flags(_) => ValueType::Flags,
            Self::Float(_) => ValueType::Float,
            Self::Double(_) => ValueType::Double,
            Self::String(_) => ValueType::String,
            Self::Object { .. } => ValueType::Object,
            Self::Boxed { .. } => ValueType::Boxed,
            Self::Pointer(_) => ValueType::Pointer,
            Self::Array(_) => ValueType::Array,
        }
    }
}

/// Pick a container type for a host value
///
/// Never yields [`ValueType::Value`].
pub fn guess_type(value: &Value) -> Result<ValueType> {
    match value {
        Value::String(_) => Ok(ValueType::String),
        Value::Array(_) => Ok(ValueType::Array),
        Value::Bool(_) => Ok(ValueType::Boolean),
        v if v.is_int32() => Ok(ValueType::Int),
        v if v.is_uint32() => Ok(ValueType::UInt),
        Value::Number(_) => Ok(ValueType::Double),
        other => Err(MarshalError::guess_failure(other.type_of())),
    }
}

/// Store a host value in a generic container
///
/// Without a target the type is guessed.
pub fn to_generic(value: &Value, target: Option<ValueType>, ctx: &MarshalContext<'_>) -> Result<GenericValue> {
    let target = match target {
        Some(target) => target,
        None => guess_type(value)?,
    };
    let mismatch = || MarshalError::type_mismatch("", target.name(), value.type_of());

    let number = || value.as_number().ok_or_else(mismatch);
    let first_byte = || {
        value
            .as_str()
            .map(|s| s.as_bytes().first().copied().unwrap_or(0))
            .ok_or_else(mismatch)
    };

    let generic = match target {
        ValueType::Invalid => return Err(MarshalError::guess_failure(value.type_of())),
        ValueType::Value => {
            return Err(MarshalError::unsupported(ValueType::Value.name(), "value type")
                .with_hint("a generic value cannot hold another generic value"))
        }
        ValueType::Char => GenericValue::Char(first_byte()? as i8),
        ValueType::UChar => GenericValue::UChar(first_byte()?),
        ValueType::Boolean => match value {
            Value::Bool(b) => GenericValue::Boolean(*b),
            _ => return Err(mismatch()),
        },
        ValueType::Int => GenericValue::Int(wrapping_integer(number()?) as i32),
        ValueType::UInt => GenericValue::UInt(wrapping_integer(number()?) as u32),
        ValueType::Long => GenericValue::Long(wrapping_integer(number()?)),
        ValueType::ULong => GenericValue::ULong(wrapping_integer(number()?) as u64),
        ValueType::Int64 => GenericValue::Int64(wrapping_integer(number()?)),
        ValueType::UInt64 => GenericValue::UInt64(wrapping_integer(number()?) as u64),
        ValueType::Enum => GenericValue::Enum(wrapping_integer(number()?) as i32),
        ValueType::Flags => GenericValue::Flags(wrapping_integer(number()?) as u32),
        ValueType::Float => GenericValue::Float(number()? as f32),
        ValueType::Double => GenericValue::Double(number()?),
        ValueType::String => match value {
            Value::String(s) => GenericValue::String(Some(s.clone())),
            _ => return Err(mismatch()),
        },
        ValueType::Object => {
            let ptr = ctx.objects.unwrap_object(value).ok_or_else(mismatch)?;
            GenericValue::Object {
                ptr,
                type_name: DEFAULT_OBJECT_TYPE.to_string(),
            }
        }
        ValueType::Boxed => {
            let ptr = ctx.objects.unwrap_struct(value).ok_or_else(mismatch)?;
            GenericValue::Boxed {
                ptr,
                type_name: DEFAULT_BOXED_TYPE.to_string(),
            }
        }
        ValueType::Pointer => return Err(mismatch()),
        ValueType::Array => {
            let items = value.as_array().ok_or_else(mismatch)?;
            let elements = items
                .iter()
                .map(|item| to_generic(item, None, ctx))
                .collect::<Result<Vec<_>>>()?;
            GenericValue::Array(elements)
        }
    };

    Ok(generic)
}

/// Read a host value out of a generic container
pub fn from_generic(generic: &GenericValue, ctx: &MarshalContext<'_>) -> Result<Value> {
    let value = match generic {
        GenericValue::Invalid => Value::Undefined,
        GenericValue::Char(c) => Value::String(char::from(*c as u8).to_string()),
        GenericValue::UChar(c) => Value::String(char::from(*c).to_string()),
        GenericValue::Boolean(b) => Value::Bool(*b),
        GenericValue::Int(n) | GenericValue::Enum(n) => Value::Number(f64::from(*n)),
        GenericValue::UInt(n) | GenericValue::Flags(n) => Value::Number(f64::from(*n)),
        GenericValue::Long(n) | GenericValue::Int64(n) => Value::Number(*n as f64),
        GenericValue::ULong(n) | GenericValue::UInt64(n) => Value::Number(*n as f64),
        GenericValue::Float(f) => Value::Number(f64::from(*f)),
        GenericValue::Double(d) => Value::Number(*d),
        GenericValue::String(s) => Value::String(s.clone().unwrap_or_default()),
        GenericValue::Object { ptr, type_name } => {
            if ptr.is_null() {
                Value::Null
            } else {
                let iface = InterfaceDescriptor::new(type_name.as_str(), InterfaceKind::Object, 0);
                ctx.objects.wrap_object(*ptr, &iface)
            }
        }
        GenericValue::Boxed { ptr, type_name } => {
            if ptr.is_null() {
                Value::Null
            } else {
                let iface = InterfaceDescriptor::new(type_name.as_str(), InterfaceKind::Boxed, 0);
                ctx.objects.wrap_struct(*ptr, &iface)
            }
        }
        GenericValue::Pointer(_) => match ctx.config.decode.policy {
            DecodePolicy::Permissive => Value::Unrepresentable(ValueType::Pointer.name().to_string()),
            DecodePolicy::Strict => {
                return Err(MarshalError::unsupported(ValueType::Pointer.name(), "value type"))
            }
        },
        GenericValue::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| from_generic(item, ctx))
                .collect::<Result<Vec<_>>>()?,
        ),
    };

    Ok(value)
}
