//! Parameter binding
//!
//! Builds a call frame from a callable's declared parameters and the host
//! arguments, and converts the callee's results back afterwards.

use std::collections::HashMap;

use super::frame::{CallFrame, FrameEntry};
use crate::errors::{MarshalError, Result};
use crate::interop::cell::{CellValue, NativeCell, Storage};
use crate::interop::memory::{HeapBox, NativeBuffer};
use crate::marshal::array::encoded_length;
use crate::marshal::boxed::GenericValue;
use crate::marshal::decode::decode;
use crate::marshal::encode::encode_argument;
use crate::marshal::MarshalContext;
use crate::metadata::types::{
    CallableDescriptor, Direction, InterfaceKind, ParameterDescriptor, TypeDescriptor,
};
use crate::value::Value;

/// Indices of parameters the host never sees
pub fn hidden_parameters(signature: &CallableDescriptor, ctx: &MarshalContext<'_>) -> Vec<usize> {
    if ctx.config.binding.hide_length_parameters {
        signature.length_parameter_indices()
    } else {
        Vec::new()
    }
}

/// Number of host arguments the callable consumes
pub fn visible_arity(signature: &CallableDescriptor, ctx: &MarshalContext<'_>) -> usize {
    let hidden = hidden_parameters(signature, ctx);
    signature
        .parameters
        .iter()
        .enumerate()
        .filter(|(i, param)| param.direction.is_in() && !hidden.contains(i))
        .count()
}

/// Encode the arguments of one call
///
/// Host arguments are consumed positionally by visible IN and INOUT
/// parameters; missing ones count as undefined.
pub fn bind(
    signature: &CallableDescriptor,
    args: &[Value],
    receiver: Option<&Value>,
    ctx: &MarshalContext<'_>,
) -> Result<CallFrame> {
    let span = tracing::debug_span!(target: "binding", "bind", callable = %signature.name);
    let _enter = span.enter();

    let hidden = hidden_parameters(signature, ctx);

    let mut assigned: Vec<Option<&Value>> = vec![None; signature.parameters.len()];
    let mut remaining = args.iter();
    for (index, param) in signature.parameters.iter().enumerate() {
        if param.direction.is_in() && !hidden.contains(&index) {
            assigned[index] = remaining.next();
        }
    }
    let surplus = remaining.count();
    if surplus > 0 {
        tracing::debug!(target: "binding", callable = %signature.name, surplus, "Ignoring surplus arguments");
    }

    // Hidden lengths come from the arrays that reference them
    let mut lengths: HashMap<usize, usize> = HashMap::new();
    for (index, param) in signature.parameters.iter().enumerate() {
        let Some(array) = param.ty.array_info() else { continue };
        let (Some(length_index), Some(value)) = (array.length_parameter, assigned[index]) else {
            continue;
        };
        if let Some(length) = encoded_length(array, value) {
            lengths.insert(length_index, length);
        }
    }

    let mut frame = CallFrame::new();

    if signature.is_method || receiver.is_some() {
        let cell = bind_receiver(signature, receiver, ctx)?;
        frame.push(FrameEntry::receiver(cell));
    }

    for (index, param) in signature.parameters.iter().enumerate() {
        let is_hidden = hidden.contains(&index);
        let undefined = Value::Undefined;
        let value = assigned[index].unwrap_or(&undefined);

        let entry = match param.direction {
            Direction::In if is_hidden => {
                FrameEntry::input(&param.name, index, hidden_length(param, &lengths, index))
            }
            Direction::In => FrameEntry::input(&param.name, index, encode_argument(param, value, ctx)?),
            Direction::Out => allocate_out(param, index)?,
            Direction::InOut if is_hidden => {
                FrameEntry::inout(&param.name, index, hidden_length(param, &lengths, index))
            }
            Direction::InOut => FrameEntry::inout(&param.name, index, encode_argument(param, value, ctx)?),
        };

        frame.push(entry.hidden(is_hidden));
    }

    tracing::trace!(
        target: "binding",
        in_args = ?frame.in_names(),
        out_args = ?frame.out_names(),
        "Bound call frame"
    );

    Ok(frame)
}

/// Length for a hidden IN parameter, taken from the encoded array
///
/// A length only a returned or OUT array refers to has no input array to
/// measure and is passed as 0.
fn hidden_length(param: &ParameterDescriptor, lengths: &HashMap<usize, usize>, index: usize) -> NativeCell {
    let length = match lengths.get(&index) {
        Some(length) => *length,
        None => {
            tracing::debug!(
                target: "binding",
                param = %param.name,
                "No input array sets hidden length parameter, passing 0"
            );
            0
        }
    };
    NativeCell::inline(CellValue::from_integer(param.ty.tag, length as i64))
}

fn bind_receiver(
    signature: &CallableDescriptor,
    receiver: Option<&Value>,
    ctx: &MarshalContext<'_>,
) -> Result<NativeCell> {
    let receiver = match receiver {
        Some(value) if !value.is_null_or_undefined() => value,
        _ => return Err(MarshalError::null_not_allowed("self").with_callable(&signature.name)),
    };

    let object = InterfaceKind::Object;
    let kind = signature
        .container
        .as_ref()
        .map(|iface| &iface.kind)
        .unwrap_or(&object);

    let ptr = match kind {
        InterfaceKind::Object => ctx.objects.unwrap_object(receiver),
        InterfaceKind::Struct | InterfaceKind::Union | InterfaceKind::Boxed => {
            ctx.objects.unwrap_struct(receiver)
        }
        other => {
            return Err(MarshalError::unsupported(other.name(), "receiver type")
                .with_callable(&signature.name))
        }
    };

    ptr.map(NativeCell::borrowed).ok_or_else(|| {
        MarshalError::type_mismatch("self", kind.name(), receiver.type_of())
            .with_callable(&signature.name)
    })
}

fn allocate_out(param: &ParameterDescriptor, index: usize) -> Result<FrameEntry> {
    if !param.caller_allocates {
        let slot = HeapBox::new(CellValue::zeroed());
        let cell = NativeCell::owned(CellValue::from_ptr(slot.as_void_ptr()), Storage::Slot(slot));
        return Ok(FrameEntry::output(&param.name, index, cell, false));
    }

    let unsupported = || {
        MarshalError::unsupported(param.ty.diagnostic_name(), "caller-allocated type")
            .for_parameter(&param.name)
    };
    let iface = param.ty.interface_info().ok_or_else(unsupported)?;

    let cell = match iface.kind {
        InterfaceKind::Struct | InterfaceKind::Union => {
            let buffer = NativeBuffer::zeroed(iface.size);
            NativeCell::owned(CellValue::from_ptr(buffer.as_void_ptr()), Storage::Buffer(buffer))
        }
        InterfaceKind::GenericValue => {
            let value = HeapBox::new(GenericValue::Invalid);
            NativeCell::owned(CellValue::from_ptr(value.as_void_ptr()), Storage::Value(value))
        }
        _ => return Err(unsupported()),
    };

    Ok(FrameEntry::output(&param.name, index, cell, true))
}

/// Array length for `ty` carried by a sibling parameter, if any
///
/// IN lengths are read from the in cell, OUT and INOUT lengths from the out
/// slot, each with the sibling's own integer width.
pub fn get_array_length(
    frame: &CallFrame,
    signature: &CallableDescriptor,
    ty: &TypeDescriptor,
) -> Option<usize> {
    let index = ty.array_info()?.length_parameter?;
    let param = signature.parameters.get(index)?;
    let entry = frame.entry(index)?;

    let cell = if param.direction.is_out() {
        entry.result()?
    } else {
        entry.input_cell()?.value()
    };

    cell.read_integer(param.ty.tag).map(|n| n.max(0) as usize)
}

/// Convert every visible OUT and INOUT result of a completed call
///
/// # Safety
/// The frame's out slots must hold values written by a conforming dispatcher
/// (or still be zeroed).
pub unsafe fn extract_out(
    frame: &CallFrame,
    signature: &CallableDescriptor,
    ctx: &MarshalContext<'_>,
) -> Result<Vec<Value>> {
    let mut results = Vec::new();

    for entry in frame.entries() {
        let Some(index) = entry.index else { continue };
        if entry.hidden || !entry.direction.is_out() {
            continue;
        }
        let Some(param) = signature.parameters.get(index) else { continue };
        let Some(cell) = entry.result() else { continue };

        let value = match param.ty.interface_info() {
            Some(iface)
                if entry.caller_allocated
                    && matches!(iface.kind, InterfaceKind::Struct | InterfaceKind::Union) =>
            {
                let copy = NativeBuffer::copy_from(cell.as_ptr() as *const u8, iface.size);
                ctx.objects.adopt_struct(copy, iface)
            }
            _ => {
                let length = get_array_length(frame, signature, &param.ty);
                decode(cell, &param.ty, length, ctx).map_err(|e| e.for_parameter(&param.name))?
            }
        };

        results.push(value);
    }

    Ok(results)
}
