//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::Arc;

use gir_bridge::interop::{CallableInfo, CellValue, Dispatcher, NativeBuffer, NativeError};
use gir_bridge::metadata::{CallableDescriptor, InterfaceDescriptor, InterfaceKind};
use gir_bridge::{HostFunction, HostHandle, ObjectBridge, Repository, TrampolineFactory, Value};
use parking_lot::Mutex;

/// Host-side wrapper of a native object
#[derive(Debug)]
pub struct WrappedObject {
    pub ptr: usize,
    pub type_name: String,
}

/// Host-side wrapper of native struct memory
#[derive(Debug)]
pub struct WrappedStruct {
    pub ptr: usize,
    pub type_name: String,
    pub owned: bool,
}

/// Object system stub that keeps one wrapper per native address
#[derive(Default)]
pub struct StubBridge {
    objects: Mutex<HashMap<usize, HostHandle>>,
    adopted: Mutex<Vec<NativeBuffer>>,
}

impl StubBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrapper for a native object at `ptr`, created on first use
    pub fn object(&self, ptr: usize, type_name: &str) -> Value {
        let iface = InterfaceDescriptor::new(type_name, InterfaceKind::Object, 0);
        self.wrap_object(ptr as *mut c_void, &iface)
    }

    /// Host wrapper borrowing the given struct memory
    pub fn borrowed_struct(&self, ptr: *mut c_void, type_name: &str) -> Value {
        Value::Object(HostHandle::new(WrappedStruct {
            ptr: ptr as usize,
            type_name: type_name.to_string(),
            owned: false,
        }))
    }

    pub fn adopted_count(&self) -> usize {
        self.adopted.lock().len()
    }

    /// Bytes of the struct copy behind an adopted wrapper
    pub fn adopted_bytes(&self, value: &Value) -> Option<Vec<u8>> {
        let wrapped = value.as_handle()?.downcast_ref::<WrappedStruct>()?;
        self.adopted
            .lock()
            .iter()
            .find(|buffer| buffer.as_ptr() as usize == wrapped.ptr)
            .map(|buffer| buffer.as_slice().to_vec())
    }
}

impl ObjectBridge for StubBridge {
    fn unwrap_object(&self, value: &Value) -> Option<*mut c_void> {
        let wrapped = value.as_handle()?.downcast_ref::<WrappedObject>()?;
        Some(wrapped.ptr as *mut c_void)
    }

    fn wrap_object(&self, ptr: *mut c_void, iface: &InterfaceDescriptor) -> Value {
        let handle = self
            .objects
            .lock()
            .entry(ptr as usize)
            .or_insert_with(|| {
                HostHandle::new(WrappedObject {
                    ptr: ptr as usize,
                    type_name: iface.name.clone(),
                })
            })
            .clone();
        Value::Object(handle)
    }

    fn unwrap_struct(&self, value: &Value) -> Option<*mut c_void> {
        let wrapped = value.as_handle()?.downcast_ref::<WrappedStruct>()?;
        Some(wrapped.ptr as *mut c_void)
    }

    fn wrap_struct(&self, ptr: *mut c_void, iface: &InterfaceDescriptor) -> Value {
        self.borrowed_struct(ptr, &iface.name)
    }

    fn adopt_struct(&self, buffer: NativeBuffer, iface: &InterfaceDescriptor) -> Value {
        let value = Value::Object(HostHandle::new(WrappedStruct {
            ptr: buffer.as_ptr() as usize,
            type_name: iface.name.clone(),
            owned: true,
        }));
        self.adopted.lock().push(buffer);
        value
    }
}

pub fn struct_ptr(value: &Value) -> Option<usize> {
    value
        .as_handle()?
        .downcast_ref::<WrappedStruct>()
        .map(|wrapped| wrapped.ptr)
}

type Script = dyn Fn(&CallableDescriptor, &[CellValue], &[CellValue]) -> Result<CellValue, NativeError>;

/// Dispatcher that runs a test script in place of the native callee
pub struct ScriptedDispatcher {
    script: Box<Script>,
    calls: Mutex<Vec<(String, usize, usize)>>,
}

impl ScriptedDispatcher {
    pub fn new(
        script: impl Fn(&CallableDescriptor, &[CellValue], &[CellValue]) -> Result<CellValue, NativeError>
            + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Callee that returns nothing and writes nothing
    pub fn noop() -> Self {
        Self::new(|_, _, _| Ok(CellValue::zeroed()))
    }

    /// `(callable, in cell count, out cell count)` per call
    pub fn calls(&self) -> Vec<(String, usize, usize)> {
        self.calls.lock().clone()
    }
}

unsafe impl Dispatcher for ScriptedDispatcher {
    fn invoke(
        &self,
        callable: &CallableDescriptor,
        in_cells: &[CellValue],
        out_cells: &[CellValue],
    ) -> Result<CellValue, NativeError> {
        self.calls
            .lock()
            .push((callable.name.clone(), in_cells.len(), out_cells.len()));
        (self.script)(callable, in_cells, out_cells)
    }
}

/// Write `value` into the out slot a cell points at
///
/// # Safety
/// `cell` must carry the address of a live slot at least `size_of::<T>()` wide.
pub unsafe fn write_out<T>(cell: &CellValue, value: T) {
    std::ptr::write(cell.as_ptr() as *mut T, value);
}

/// Trampoline stub recording which host functions were bridged
#[derive(Default)]
pub struct StubTrampolines {
    pub created: Mutex<Vec<String>>,
}

impl TrampolineFactory for StubTrampolines {
    fn create_trampoline(&self, signature: &CallableInfo, function: &HostFunction) -> Option<*mut c_void> {
        let mut created = self.created.lock();
        created.push(format!("{}:{}", signature.name, function.name()));
        Some((0x7000 + created.len()) as *mut c_void)
    }
}

pub const DEMO_NAMESPACE: &str = r#"{
    "namespace": "Demo",
    "version": "1.0",
    "interfaces": [
        {
            "name": "Widget",
            "info_type": "object",
            "methods": [
                {
                    "name": "set_label",
                    "is_method": true,
                    "args": [
                        { "name": "label", "type": { "tag": "utf8", "is_pointer": true } }
                    ]
                }
            ]
        },
        { "name": "Point", "info_type": "struct", "size": 8 },
        { "name": "Value", "info_type": "struct", "size": 24, "is_value_container": true },
        { "name": "Mode", "info_type": "enum", "storage": "int32" },
        {
            "name": "Visitor",
            "info_type": "callback",
            "signature": {
                "name": "Visitor",
                "args": [ { "name": "item", "type": { "tag": "int32" } } ],
                "return_type": { "tag": "boolean" }
            }
        }
    ],
    "functions": [
        {
            "name": "add",
            "args": [
                { "name": "a", "type": { "tag": "int32" } },
                { "name": "b", "type": { "tag": "int32" } }
            ],
            "return_type": { "tag": "int32" }
        },
        {
            "name": "init",
            "args": [
                { "name": "argc", "direction": "inout", "type": { "tag": "int32" } },
                {
                    "name": "argv",
                    "direction": "inout",
                    "may_be_null": true,
                    "type": {
                        "tag": "array",
                        "is_pointer": true,
                        "array": {
                            "array_type": "c",
                            "element": { "tag": "utf8", "is_pointer": true },
                            "length": 0
                        }
                    }
                }
            ]
        },
        {
            "name": "get_origin",
            "args": [
                {
                    "name": "point",
                    "direction": "out",
                    "caller_allocates": true,
                    "type": { "tag": "interface", "interface": "Demo.Point" }
                }
            ]
        },
        {
            "name": "get_default",
            "return_type": { "tag": "interface", "is_pointer": true, "interface": "Demo.Widget" }
        }
    ]
}"#;

pub fn demo_repository() -> Repository {
    Repository::from_json(DEMO_NAMESPACE).expect("demo namespace loads")
}

pub fn object_iface(name: &str) -> Arc<InterfaceDescriptor> {
    Arc::new(InterfaceDescriptor::new(name, InterfaceKind::Object, 0))
}

pub fn struct_iface(name: &str, size: usize) -> Arc<InterfaceDescriptor> {
    Arc::new(InterfaceDescriptor::new(name, InterfaceKind::Struct, size))
}
