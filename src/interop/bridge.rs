//! Collaborator seams
//!
//! The marshaling engine never owns host objects, closures or the native call
//! itself. It reaches them through these traits, injected per context.

use std::ffi::c_void;
use std::fmt;

use super::cell::CellValue;
use super::memory::NativeBuffer;
use super::registry::CallableInfo;
use crate::metadata::types::{CallableDescriptor, InterfaceDescriptor};
use crate::value::{HostFunction, Value};

/// Host object/struct wrapper system
pub trait ObjectBridge {
    /// Native instance behind a wrapped object, `None` if `value` is not one
    fn unwrap_object(&self, value: &Value) -> Option<*mut c_void>;

    /// Host wrapper for a native instance.
    ///
    /// Must return the existing wrapper when `ptr` is already associated.
    fn wrap_object(&self, ptr: *mut c_void, iface: &InterfaceDescriptor) -> Value;

    /// Native pointer behind a wrapped struct, union or boxed value
    fn unwrap_struct(&self, value: &Value) -> Option<*mut c_void>;

    /// Host wrapper borrowing native struct memory
    fn wrap_struct(&self, ptr: *mut c_void, iface: &InterfaceDescriptor) -> Value;

    /// Host wrapper taking ownership of a struct copy
    fn adopt_struct(&self, buffer: NativeBuffer, iface: &InterfaceDescriptor) -> Value;
}

/// Produces native entry points that forward into host functions
pub trait TrampolineFactory {
    /// Returns `None` when no trampoline can be built for `signature`
    fn create_trampoline(&self, signature: &CallableInfo, function: &HostFunction) -> Option<*mut c_void>;
}

/// Failure reported by the native side of a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    pub domain: String,
    pub code: i32,
    pub message: String,
}

impl NativeError {
    pub fn new(domain: impl Into<String>, code: i32, message: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.domain, self.code, self.message)
    }
}

impl std::error::Error for NativeError {}

/// Performs the native call
///
/// # Safety
/// Implementors receive raw cells whose pointers are valid only for the
/// duration of `invoke`. A callee may write through OUT cells only within the
/// width of the slot each one targets.
pub unsafe trait Dispatcher {
    fn invoke(
        &self,
        callable: &CallableDescriptor,
        in_cells: &[CellValue],
        out_cells: &[CellValue],
    ) -> Result<CellValue, NativeError>;
}
