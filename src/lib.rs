//! Argument marshaling between a dynamic host runtime and introspected native
//! libraries.
//!
//! The host hands in dynamic values; metadata from the registry says what the
//! native callable expects. This crate converts in both directions and builds
//! the cell arrays a native dispatcher consumes.

pub mod binding;
pub mod config;
pub mod errors;
pub mod interop;
pub mod logging;
pub mod marshal;
pub mod metadata;
pub mod value;

// Re-export commonly used items
pub use binding::{bind, extract_out, get_array_length, CallFrame, Invoker};
pub use config::{DecodePolicy, MarshalConfig, NumericPolicy};
pub use errors::{ErrorKind, MarshalError, Result};
pub use interop::{
    CellValue, Dispatcher, NativeCell, NativeError, ObjectBridge, Registry, Repository,
    TrampolineFactory,
};
pub use marshal::{decode, encode_argument, encode_type, GenericValue, MarshalContext, ValueType};
pub use metadata::{
    CallableDescriptor, Direction, ParameterDescriptor, Resolver, TypeDescriptor, TypeTag,
};
pub use value::{HostFunction, HostHandle, Value};
