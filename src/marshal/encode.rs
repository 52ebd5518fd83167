//! Host → native conversion
//!
//! Every cell produced here records who owns the memory behind it: string
//! copies and boxed values are owned by the cell, wrapped objects and structs
//! are borrowed from the object system.

use num_traits::{cast, AsPrimitive};

use super::array::encode_array;
use super::boxed::to_generic;
use super::MarshalContext;
use crate::config::NumericPolicy;
use crate::errors::{MarshalError, Result};
use crate::interop::cell::{CellValue, NativeCell, Storage};
use crate::interop::memory::{HeapBox, NativeBuffer};
use crate::metadata::types::{
    remap_type_handle, InterfaceDescriptor, InterfaceKind, ParameterDescriptor, TypeDescriptor,
    TypeTag,
};
use crate::value::Value;

/// Convert the host value passed for `param`
pub fn encode_argument(
    param: &ParameterDescriptor,
    value: &Value,
    ctx: &MarshalContext<'_>,
) -> Result<NativeCell> {
    if value.is_null_or_undefined() {
        if param.nullable || param.ty.tag == TypeTag::Void {
            return Ok(NativeCell::empty());
        }
        return Err(MarshalError::null_not_allowed(&param.name));
    }

    encode_type(&param.ty, value, ctx)
        .map_err(|e| e.for_argument(&param.name, param.ty.diagnostic_name(), value.type_of()))
}

/// Convert a host value to a native cell of type `ty`
///
/// Null and undefined become the empty cell for pointer-carried types.
pub fn encode_type(ty: &TypeDescriptor, value: &Value, ctx: &MarshalContext<'_>) -> Result<NativeCell> {
    let tag = remap_type_handle(ty.tag);

    if value.is_null_or_undefined() && tag.scalar_size().is_none() {
        return Ok(NativeCell::empty());
    }

    match tag {
        TypeTag::Void => Ok(NativeCell::empty()),
        TypeTag::Boolean => Ok(NativeCell::inline(CellValue::from_bool(value.to_boolean()))),
        TypeTag::Int8
        | TypeTag::UInt8
        | TypeTag::Int16
        | TypeTag::UInt16
        | TypeTag::Int32
        | TypeTag::UInt32
        | TypeTag::Int64
        | TypeTag::UInt64 => {
            let n = coerce_integer(tag, value, ctx)?;
            Ok(NativeCell::inline(CellValue::from_integer(tag, n)))
        }
        TypeTag::Float => {
            let n = value.to_number();
            let f = match ctx.config.numeric.policy {
                NumericPolicy::Truncate => n as f32,
                NumericPolicy::Checked => cast::<f64, f32>(n)
                    .ok_or_else(|| MarshalError::out_of_range("", tag.name(), n))?,
            };
            Ok(NativeCell::inline(CellValue::from_f32(f)))
        }
        TypeTag::Double => Ok(NativeCell::inline(CellValue::from_f64(value.to_number()))),
        TypeTag::Utf8 | TypeTag::Filename => encode_string(tag, value),
        TypeTag::Array => {
            let array = ty
                .array_info()
                .ok_or_else(|| MarshalError::unsupported("array", "argument type"))?;
            encode_array(array, value, ctx)
        }
        TypeTag::Interface => {
            let iface = ty
                .interface_info()
                .ok_or_else(|| MarshalError::unsupported("unresolved", "interface type"))?;
            encode_interface(iface, value, ctx)
        }
        TypeTag::GType
        | TypeTag::GList
        | TypeTag::GSList
        | TypeTag::GHash
        | TypeTag::Error
        | TypeTag::Unichar => Err(MarshalError::unsupported(tag.name(), "argument type")),
    }
}

/// Host number to a native integer of width `tag`
///
/// Under `Truncate` the fraction is dropped and the value is reduced modulo
/// 2^64; the cell then discards the bits above the target width. Under
/// `Checked` values outside the target range are rejected.
pub(crate) fn coerce_integer(tag: TypeTag, value: &Value, ctx: &MarshalContext<'_>) -> Result<i64> {
    let n = value.to_number();

    match ctx.config.numeric.policy {
        NumericPolicy::Truncate => Ok(wrapping_integer(n)),
        NumericPolicy::Checked => {
            checked_integer(tag, n).ok_or_else(|| MarshalError::out_of_range("", tag.name(), n))
        }
    }
}

/// Two's-complement bits of `n` truncated toward zero, modulo 2^64
///
/// NaN and infinities give 0. Finite values at or above 2^116 have no bits
/// below 2^64, so they also give 0.
pub(crate) fn wrapping_integer(n: f64) -> i64 {
    const TWO_POW_116: f64 = 83_076_749_736_557_242_056_487_941_267_521_536.0;

    if !n.is_finite() || n.abs() >= TWO_POW_116 {
        return 0;
    }
    AsPrimitive::<i128>::as_(n.trunc()) as i64
}

fn checked_integer(tag: TypeTag, n: f64) -> Option<i64> {
    let n = n.trunc();
    match tag {
        TypeTag::Int8 => cast::<f64, i8>(n).map(i64::from),
        TypeTag::UInt8 => cast::<f64, u8>(n).map(i64::from),
        TypeTag::Int16 => cast::<f64, i16>(n).map(i64::from),
        TypeTag::UInt16 => cast::<f64, u16>(n).map(i64::from),
        TypeTag::Int32 => cast::<f64, i32>(n).map(i64::from),
        TypeTag::UInt32 => cast::<f64, u32>(n).map(i64::from),
        TypeTag::Int64 => cast::<f64, i64>(n),
        TypeTag::UInt64 => cast::<f64, u64>(n).map(|v| v as i64),
        _ => None,
    }
}

fn encode_string(tag: TypeTag, value: &Value) -> Result<NativeCell> {
    let s = match value.as_str() {
        Some(s) if !s.contains('\0') => s,
        _ => return Err(MarshalError::type_mismatch("", tag.name(), value.type_of())),
    };

    let buffer = NativeBuffer::from_c_str(s);
    Ok(NativeCell::owned(
        CellValue::from_ptr(buffer.as_void_ptr()),
        Storage::Buffer(buffer),
    ))
}

fn encode_interface(
    iface: &InterfaceDescriptor,
    value: &Value,
    ctx: &MarshalContext<'_>,
) -> Result<NativeCell> {
    let mismatch = || MarshalError::type_mismatch("", iface.kind.name(), value.type_of());

    match &iface.kind {
        InterfaceKind::Object => ctx
            .objects
            .unwrap_object(value)
            .map(NativeCell::borrowed)
            .ok_or_else(mismatch),
        InterfaceKind::Struct | InterfaceKind::Union | InterfaceKind::Boxed => ctx
            .objects
            .unwrap_struct(value)
            .map(NativeCell::borrowed)
            .ok_or_else(mismatch),
        InterfaceKind::GenericValue => {
            let generic = to_generic(value, None, ctx)?;
            let slot = HeapBox::new(generic);
            Ok(NativeCell::owned(
                CellValue::from_ptr(slot.as_void_ptr()),
                Storage::Value(slot),
            ))
        }
        InterfaceKind::Enum { storage } | InterfaceKind::Flags { storage } => {
            let n = coerce_integer(*storage, value, ctx)?;
            Ok(NativeCell::inline(CellValue::from_integer(*storage, n)))
        }
        InterfaceKind::Callback { signature } => {
            let function = match value {
                Value::Function(function) => function,
                _ => return Err(mismatch()),
            };
            let trampolines = ctx.trampolines.ok_or_else(|| {
                MarshalError::unsupported("callback", "interface type")
                    .with_hint("no trampoline factory is configured")
            })?;
            let ptr = trampolines
                .create_trampoline(signature, function)
                .ok_or_else(|| {
                    MarshalError::unsupported("callback", "interface type")
                        .with_hint(format!("no trampoline for '{}'", signature.name))
                })?;
            tracing::trace!(target: "marshal", callback = %signature.name, "Created trampoline");
            Ok(NativeCell::borrowed(ptr))
        }
    }
}
