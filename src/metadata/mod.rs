//! Introspection metadata as the marshaling engine sees it

pub mod resolve;
pub mod types;

pub use resolve::Resolver;
pub use types::{
    remap_type_handle, ArrayDescriptor, ArrayKind, CallableDescriptor, Direction,
    InterfaceDescriptor, InterfaceKind, ParameterDescriptor, TypeDescriptor, TypeDetail, TypeTag,
    POINTER_SIZE, TYPE_HANDLE_SIZE,
};
