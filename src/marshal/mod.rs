//! Value marshaling - host ↔ native conversions
//!
//! Architecture:
//! - `encode.rs` - host values into native cells
//! - `decode.rs` - native cells into host values
//! - `array.rs` - C, growable, byte and pointer arrays
//! - `boxed.rs` - the runtime's generic value container

pub mod array;
pub mod boxed;
pub mod decode;
pub mod encode;

pub use array::{c_array_length, decode_array, encode_array, encoded_length};
pub use boxed::{from_generic, guess_type, to_generic, GenericValue, ValueType};
pub use decode::decode;
pub use encode::{encode_argument, encode_type};

use crate::config::MarshalConfig;
use crate::interop::bridge::{ObjectBridge, TrampolineFactory};

/// Collaborators and policies shared by every conversion of a call
#[derive(Clone, Copy)]
pub struct MarshalContext<'a> {
    pub objects: &'a dyn ObjectBridge,
    pub trampolines: Option<&'a dyn TrampolineFactory>,
    pub config: &'a MarshalConfig,
}

impl<'a> MarshalContext<'a> {
    pub fn new(objects: &'a dyn ObjectBridge, config: &'a MarshalConfig) -> Self {
        Self {
            objects,
            trampolines: None,
            config,
        }
    }

    pub fn with_trampolines(mut self, trampolines: &'a dyn TrampolineFactory) -> Self {
        self.trampolines = Some(trampolines);
        self
    }
}
