//! Interoperability - the native side of the boundary
//!
//! Architecture:
//! - `registry.rs` - raw introspection records and the in-memory repository
//! - `memory.rs` - buffers and slots owned by the marshaling layer
//! - `cell.rs` - ABI cells and their ownership tags
//! - `bridge.rs` - object system, trampoline and dispatcher seams

pub mod bridge;
pub mod cell;
pub mod memory;
pub mod registry;

pub use bridge::{Dispatcher, NativeError, ObjectBridge, TrampolineFactory};
pub use cell::{CellValue, NativeCell, Ownership, Storage};
pub use memory::{live_allocations, ArrayHeader, HeapBox, NativeBuffer, PointerArrayHeader};
pub use registry::{
    ArgInfo, CallableInfo, InfoType, InterfaceInfo, NamespaceInfo, RawArrayInfo, RawTypeInfo,
    Registry, RegistryError, Repository,
};
