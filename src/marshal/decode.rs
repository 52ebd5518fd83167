//! Native → host conversion

use std::ffi::CStr;

use super::array::decode_array;
use super::boxed::{from_generic, GenericValue};
use super::MarshalContext;
use crate::config::DecodePolicy;
use crate::errors::{MarshalError, Result};
use crate::interop::cell::CellValue;
use crate::metadata::types::{remap_type_handle, InterfaceKind, TypeDescriptor, TypeTag};
use crate::value::Value;

/// Convert a native cell of type `ty` to a host value
///
/// `known_length` is the array length carried by a sibling parameter, if any.
/// 64-bit integers pass through `f64` and lose precision above 2^53.
///
/// # Safety
/// Pointer-carried values in `value` must be null or point to live native
/// data of the described type.
pub unsafe fn decode(
    value: CellValue,
    ty: &TypeDescriptor,
    known_length: Option<usize>,
    ctx: &MarshalContext<'_>,
) -> Result<Value> {
    let tag = remap_type_handle(ty.tag);

    let decoded = match tag {
        TypeTag::Void => Value::Undefined,
        TypeTag::Boolean => Value::Bool(value.boolean != 0),
        TypeTag::Int8
        | TypeTag::UInt8
        | TypeTag::Int16
        | TypeTag::UInt16
        | TypeTag::Int32
        | TypeTag::UInt32
        | TypeTag::Int64 => Value::Number(value.read_integer(tag).unwrap_or(0) as f64),
        TypeTag::UInt64 => Value::Number(value.uint64 as f64),
        TypeTag::Float => Value::Number(f64::from(value.float)),
        TypeTag::Double => Value::Number(value.double),
        TypeTag::Utf8 | TypeTag::Filename => {
            let ptr = value.as_ptr();
            if ptr.is_null() {
                Value::Null
            } else {
                Value::String(CStr::from_ptr(ptr.cast()).to_string_lossy().into_owned())
            }
        }
        TypeTag::Array => {
            let array = ty
                .array_info()
                .ok_or_else(|| MarshalError::unsupported("array", "native type"))?;
            decode_array(value.as_ptr().cast(), array, known_length, ctx)?
        }
        TypeTag::Interface => {
            let iface = ty
                .interface_info()
                .ok_or_else(|| MarshalError::unsupported("unresolved", "native type"))?;
            let ptr = value.as_ptr();

            match &iface.kind {
                InterfaceKind::Enum { storage } | InterfaceKind::Flags { storage } => {
                    Value::Number(value.read_integer(*storage).unwrap_or(0) as f64)
                }
                _ if ptr.is_null() => Value::Null,
                InterfaceKind::Object => ctx.objects.wrap_object(ptr, iface),
                InterfaceKind::Struct | InterfaceKind::Union | InterfaceKind::Boxed => {
                    ctx.objects.wrap_struct(ptr, iface)
                }
                InterfaceKind::GenericValue => from_generic(&*(ptr as *const GenericValue), ctx)?,
                InterfaceKind::Callback { .. } => unrepresentable("callback", ctx)?,
            }
        }
        TypeTag::GType
        | TypeTag::GList
        | TypeTag::GSList
        | TypeTag::GHash
        | TypeTag::Error
        | TypeTag::Unichar => unrepresentable(tag.name(), ctx)?,
    };

    Ok(decoded)
}

fn unrepresentable(name: &str, ctx: &MarshalContext<'_>) -> Result<Value> {
    match ctx.config.decode.policy {
        DecodePolicy::Permissive => {
            tracing::debug!(target: "marshal", native_type = name, "Decoded unrepresentable value");
            Ok(Value::Unrepresentable(name.to_string()))
        }
        DecodePolicy::Strict => Err(MarshalError::unsupported(name, "native type")),
    }
}
