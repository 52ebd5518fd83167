//! Native argument cells
//!
//! A cell is the ABI storage unit handed to the dispatcher. Each cell records
//! whether the memory its pointer targets belongs to the cell, to someone
//! else, or to a sibling cell of the same frame.

use std::ffi::c_void;
use std::ptr;

use super::memory::{ArrayHeader, HeapBox, NativeBuffer};
use crate::marshal::boxed::GenericValue;
use crate::metadata::types::TypeTag;

/// Untagged ABI value
///
/// Always fully initialized: constructors start from the all-zero cell.
#[repr(C)]
pub union CellValue {
    pub boolean: i32,
    pub int8: i8,
    pub uint8: u8,
    pub int16: i16,
    pub uint16: u16,
    pub int32: i32,
    pub uint32: u32,
    pub int64: i64,
    pub uint64: u64,
    pub float: f32,
    pub double: f64,
    pub ptr: *mut c_void,
}

const CELL_SIZE: usize = std::mem::size_of::<CellValue>();

impl CellValue {
    #[inline]
    pub const fn zeroed() -> Self {
        Self { uint64: 0 }
    }

    #[inline]
    pub fn from_ptr(p: *mut c_void) -> Self {
        let mut cell = Self::zeroed();
        cell.ptr = p;
        cell
    }

    #[inline]
    pub fn from_bool(b: bool) -> Self {
        let mut cell = Self::zeroed();
        cell.boolean = i32::from(b);
        cell
    }

    #[inline]
    pub fn from_f32(v: f32) -> Self {
        let mut cell = Self::zeroed();
        cell.float = v;
        cell
    }

    #[inline]
    pub fn from_f64(v: f64) -> Self {
        Self { double: v }
    }

    /// Store an integer in the field matching `tag`; high bits are discarded.
    pub fn from_integer(tag: TypeTag, v: i64) -> Self {
        let mut cell = Self::zeroed();
        match tag {
            TypeTag::Int8 => cell.int8 = v as i8,
            TypeTag::UInt8 => cell.uint8 = v as u8,
            TypeTag::Int16 => cell.int16 = v as i16,
            TypeTag::UInt16 => cell.uint16 = v as u16,
            TypeTag::Int32 | TypeTag::Boolean => cell.int32 = v as i32,
            TypeTag::UInt32 | TypeTag::Unichar => cell.uint32 = v as u32,
            _ => cell.int64 = v,
        }
        cell
    }

    /// Read the integer field selected by `tag`
    pub fn read_integer(&self, tag: TypeTag) -> Option<i64> {
        // SAFETY: every field is plain data and the cell is fully initialized
        unsafe {
            match tag {
                TypeTag::Int8 => Some(i64::from(self.int8)),
                TypeTag::UInt8 => Some(i64::from(self.uint8)),
                TypeTag::Int16 => Some(i64::from(self.int16)),
                TypeTag::UInt16 => Some(i64::from(self.uint16)),
                TypeTag::Int32 => Some(i64::from(self.int32)),
                TypeTag::UInt32 => Some(i64::from(self.uint32)),
                TypeTag::Int64 => Some(self.int64),
                TypeTag::UInt64 | TypeTag::GType => Some(self.uint64 as i64),
                _ => None,
            }
        }
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut c_void {
        // SAFETY: fully initialized, any bit pattern is a valid pointer value
        unsafe { self.ptr }
    }

    /// Load a cell from `size` bytes of native memory
    ///
    /// # Safety
    /// `src` must be valid for reads of `size.min(8)` bytes.
    pub unsafe fn read_from(src: *const u8, size: usize) -> Self {
        let mut cell = Self::zeroed();
        ptr::copy_nonoverlapping(src, (&mut cell as *mut Self).cast::<u8>(), size.min(CELL_SIZE));
        cell
    }

    /// Store the first `size` bytes of the cell into native memory
    ///
    /// # Safety
    /// `dst` must be valid for writes of `size.min(8)` bytes.
    pub unsafe fn write_to(&self, dst: *mut u8, size: usize) {
        ptr::copy_nonoverlapping((self as *const Self).cast::<u8>(), dst, size.min(CELL_SIZE));
    }
}

impl Default for CellValue {
    #[inline]
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Copy for CellValue {}
impl Clone for CellValue {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl std::fmt::Debug for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // SAFETY: fully initialized
        write!(f, "CellValue({:#018x})", unsafe { self.uint64 })
    }
}

/// Memory owned by a cell, released when dropped
#[derive(Debug)]
pub enum Storage {
    /// String copies, by-value struct copies, caller-allocated buffers
    Buffer(NativeBuffer),
    /// Out slot a native callee writes into
    Slot(HeapBox<CellValue>),
    /// Array data, its optional runtime header and per-element storage
    Array {
        data: NativeBuffer,
        header: Option<HeapBox<ArrayHeader>>,
        elements: Vec<Storage>,
    },
    /// Boxed generic value
    Value(HeapBox<GenericValue>),
}

impl Storage {
    /// Number of allocations this storage holds
    pub fn allocation_count(&self) -> usize {
        match self {
            Self::Buffer(_) | Self::Slot(_) | Self::Value(_) => 1,
            Self::Array { header, elements, .. } => {
                1 + usize::from(header.is_some())
                    + elements.iter().map(Storage::allocation_count).sum::<usize>()
            }
        }
    }

    /// Free the storage
    pub fn release(self) {
        match self {
            Self::Buffer(buffer) => drop(buffer),
            Self::Slot(slot) => drop(slot),
            Self::Array { data, header, elements } => {
                for element in elements {
                    element.release();
                }
                drop(header);
                drop(data);
            }
            Self::Value(value) => drop(value),
        }
    }
}

#[derive(Debug)]
pub enum Ownership {
    /// Plain scalar, nothing behind it
    Inline,
    /// Targets memory this cell allocated
    Owned(Storage),
    /// Targets memory owned elsewhere
    Borrowed,
    /// Targets storage owned by another entry of the same frame
    Aliased,
}

#[derive(Debug)]
pub struct NativeCell {
    value: CellValue,
    ownership: Ownership,
}

impl NativeCell {
    /// Null pointer / zero cell
    pub fn empty() -> Self {
        Self::inline(CellValue::zeroed())
    }

    pub fn inline(value: CellValue) -> Self {
        Self {
            value,
            ownership: Ownership::Inline,
        }
    }

    pub fn borrowed(ptr: *mut c_void) -> Self {
        Self {
            value: CellValue::from_ptr(ptr),
            ownership: Ownership::Borrowed,
        }
    }

    pub fn owned(value: CellValue, storage: Storage) -> Self {
        Self {
            value,
            ownership: Ownership::Owned(storage),
        }
    }

    pub fn aliased(ptr: *mut c_void) -> Self {
        Self {
            value: CellValue::from_ptr(ptr),
            ownership: Ownership::Aliased,
        }
    }

    #[inline]
    pub fn value(&self) -> CellValue {
        self.value
    }

    #[inline]
    pub fn ownership(&self) -> &Ownership {
        &self.ownership
    }

    #[inline]
    pub fn is_owned(&self) -> bool {
        matches!(self.ownership, Ownership::Owned(_))
    }

    pub fn into_parts(self) -> (CellValue, Option<Storage>) {
        match self.ownership {
            Ownership::Owned(storage) => (self.value, Some(storage)),
            _ => (self.value, None),
        }
    }

    /// Free owned storage; returns how many allocations were released
    pub fn release(self) -> usize {
        match self.ownership {
            Ownership::Owned(storage) => {
                let count = storage.allocation_count();
                storage.release();
                count
            }
            Ownership::Inline | Ownership::Borrowed | Ownership::Aliased => 0,
        }
    }
}
