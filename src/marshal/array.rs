//! Array marshaling
//!
//! C arrays are a bare element buffer. Growable and byte arrays carry a
//! runtime header `{ data, len, element_size }`; pointer arrays a header
//! `{ pdata, len }`.

use std::ffi::c_void;

use super::decode::decode;
use super::encode::encode_type;
use super::MarshalContext;
use crate::errors::{MarshalError, Result};
use crate::interop::cell::{CellValue, NativeCell, Storage};
use crate::interop::memory::{ArrayHeader, HeapBox, NativeBuffer, PointerArrayHeader};
use crate::metadata::types::{
    ArrayDescriptor, ArrayKind, InterfaceDescriptor, InterfaceKind, TypeDescriptor, TypeTag,
    POINTER_SIZE,
};
use crate::value::Value;

/// Struct or union element stored inline in the array buffer
fn inline_struct(element: &TypeDescriptor) -> Option<&InterfaceDescriptor> {
    match element.interface_info() {
        Some(iface)
            if !element.is_pointer
                && matches!(iface.kind, InterfaceKind::Struct | InterfaceKind::Union) =>
        {
            Some(iface)
        }
        _ => None,
    }
}

fn element_stride(array: &ArrayDescriptor) -> usize {
    match array.kind {
        ArrayKind::Bytes => 1,
        ArrayKind::Pointers => POINTER_SIZE,
        ArrayKind::C | ArrayKind::Growable => array.element.byte_size().max(1),
    }
}

fn accepts_bytes(array: &ArrayDescriptor) -> bool {
    array.kind == ArrayKind::Bytes
        || (array.kind == ArrayKind::C
            && matches!(array.element.tag, TypeTag::UInt8 | TypeTag::Int8))
}

/// Number of elements a host value will encode to
///
/// This is the value written into a hidden length parameter.
pub fn encoded_length(array: &ArrayDescriptor, value: &Value) -> Option<usize> {
    match value {
        Value::Array(items) => Some(items.len()),
        Value::String(s) if accepts_bytes(array) => Some(s.len()),
        _ => None,
    }
}

/// Encode a host sequence into a native array
///
/// The array buffer, its header and every element's storage are owned by the
/// returned cell.
pub fn encode_array(array: &ArrayDescriptor, value: &Value, ctx: &MarshalContext<'_>) -> Result<NativeCell> {
    if array.kind == ArrayKind::Pointers {
        return Err(MarshalError::unsupported(array.kind.name(), "array type"));
    }

    let stride = element_stride(array);
    let terminator = usize::from(array.zero_terminated);

    let (data, count, elements) = match value {
        Value::String(s) if accepts_bytes(array) => {
            let bytes = s.as_bytes();
            let slots = bytes.len().max(array.fixed_length.unwrap_or(0)) + terminator;
            let data = NativeBuffer::zeroed(slots);
            // SAFETY: data holds at least bytes.len() bytes
            unsafe {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), data.as_ptr(), bytes.len());
            }
            (data, bytes.len(), Vec::new())
        }
        Value::Array(items) => {
            let slots = items.len().max(array.fixed_length.unwrap_or(0)) + terminator;
            let data = NativeBuffer::zeroed(slots * stride);
            let mut elements = Vec::new();

            for (i, item) in items.iter().enumerate() {
                // SAFETY: i < slots, so the element lies inside data
                let dst = unsafe { data.as_ptr().add(i * stride) };

                if let Some(iface) = inline_struct(&array.element) {
                    if item.is_null_or_undefined() {
                        continue;
                    }
                    let src = ctx.objects.unwrap_struct(item).ok_or_else(|| {
                        MarshalError::type_mismatch("", iface.kind.name(), item.type_of())
                    })?;
                    // SAFETY: the wrapper owns iface.size bytes at src
                    unsafe {
                        std::ptr::copy_nonoverlapping(src.cast::<u8>(), dst, iface.size.min(stride))
                    };
                    continue;
                }

                let cell = encode_type(&array.element, item, ctx)?;
                let (cell_value, storage) = cell.into_parts();
                // SAFETY: dst is valid for stride bytes
                unsafe { cell_value.write_to(dst, stride) };
                elements.extend(storage);
            }

            (data, items.len(), elements)
        }
        other => return Err(MarshalError::type_mismatch("", "array", other.type_of())),
    };

    tracing::trace!(
        target: "marshal",
        kind = array.kind.name(),
        length = count,
        stride = stride,
        "Encoded array"
    );

    match array.kind {
        ArrayKind::C => Ok(NativeCell::owned(
            CellValue::from_ptr(data.as_void_ptr()),
            Storage::Array {
                data,
                header: None,
                elements,
            },
        )),
        ArrayKind::Growable | ArrayKind::Bytes => {
            let header = HeapBox::new(ArrayHeader {
                data: data.as_ptr(),
                len: count as u32,
                element_size: stride as u32,
            });
            Ok(NativeCell::owned(
                CellValue::from_ptr(header.as_void_ptr()),
                Storage::Array {
                    data,
                    header: Some(header),
                    elements,
                },
            ))
        }
        ArrayKind::Pointers => Err(MarshalError::unsupported(array.kind.name(), "array type")),
    }
}

/// Length of a native C array
///
/// Sources in order: fixed length, zero terminator, the length carried by a
/// sibling parameter.
///
/// # Safety
/// When the array is zero-terminated, `data` must point to a terminated run
/// of elements.
pub unsafe fn c_array_length(
    data: *const u8,
    array: &ArrayDescriptor,
    known_length: Option<usize>,
) -> Result<usize> {
    if let Some(length) = array.fixed_length {
        return Ok(length);
    }
    if array.zero_terminated {
        return Ok(zero_terminated_length(data, element_stride(array)));
    }
    known_length.ok_or_else(MarshalError::array_length)
}

unsafe fn zero_terminated_length(data: *const u8, stride: usize) -> usize {
    if data.is_null() {
        return 0;
    }
    let mut length = 0;
    loop {
        let element = std::slice::from_raw_parts(data.add(length * stride), stride);
        if element.iter().all(|b| *b == 0) {
            return length;
        }
        length += 1;
    }
}

/// Decode a native array into a host sequence
///
/// # Safety
/// `ptr` must be null or point to a live array of the described kind.
pub unsafe fn decode_array(
    ptr: *const c_void,
    array: &ArrayDescriptor,
    known_length: Option<usize>,
    ctx: &MarshalContext<'_>,
) -> Result<Value> {
    if ptr.is_null() {
        return Ok(Value::Array(Vec::new()));
    }

    let (data, length, stride) = match array.kind {
        ArrayKind::C => {
            let data = ptr.cast::<u8>();
            (data, c_array_length(data, array, known_length)?, element_stride(array))
        }
        ArrayKind::Growable | ArrayKind::Bytes => {
            let header = &*ptr.cast::<ArrayHeader>();
            let stride = match (array.kind, header.element_size) {
                (ArrayKind::Bytes, _) => 1,
                (_, 0) => element_stride(array),
                (_, size) => size as usize,
            };
            (header.data as *const u8, header.len as usize, stride)
        }
        ArrayKind::Pointers => {
            let header = &*ptr.cast::<PointerArrayHeader>();
            (header.pdata as *const u8, header.len as usize, POINTER_SIZE)
        }
    };

    if data.is_null() || length == 0 {
        return Ok(Value::Array(Vec::new()));
    }

    let inline = if array.kind == ArrayKind::Pointers {
        None
    } else {
        inline_struct(&array.element)
    };

    let mut items = Vec::with_capacity(length);
    for i in 0..length {
        let element = data.add(i * stride);
        let item = match inline {
            Some(iface) => ctx.objects.wrap_struct(element as *mut c_void, iface),
            None => decode(CellValue::read_from(element, stride), &array.element, None, ctx)?,
        };
        items.push(item);
    }

    Ok(Value::Array(items))
}
