//! Parameter binding and call driving
//!
//! Architecture:
//! - `frame.rs` - per-call cell storage and its teardown
//! - `params.rs` - host arguments into a frame, results out of it
//! - `invoke.rs` - bind, dispatch, extract

pub mod frame;
pub mod invoke;
pub mod params;

pub use frame::{CallFrame, FrameEntry};
pub use invoke::{fold_results, Invoker};
pub use params::{bind, extract_out, get_array_length, hidden_parameters, visible_arity};
