//! Native memory owned by the marshaling layer
//!
//! Every allocation handed to native code lives in one of these wrappers and
//! is released when the wrapper drops. Raw pointers into them stay valid for
//! as long as the wrapper is alive, regardless of where the wrapper moves.

use std::alloc::{self, Layout};
use std::cell::Cell;
use std::ffi::c_void;
use std::ptr::NonNull;
use std::slice;

/// Alignment of every buffer; enough for any scalar cell
const BUFFER_ALIGN: usize = 8;

thread_local! {
    static LIVE_ALLOCATIONS: Cell<usize> = const { Cell::new(0) };
}

#[inline]
fn track_alloc() {
    LIVE_ALLOCATIONS.with(|live| live.set(live.get() + 1));
}

#[inline]
fn track_free() {
    LIVE_ALLOCATIONS.with(|live| live.set(live.get().saturating_sub(1)));
}

/// Number of marshaling allocations alive on the current thread
pub fn live_allocations() -> usize {
    LIVE_ALLOCATIONS.with(Cell::get)
}

/// Zero-initialized byte buffer
pub struct NativeBuffer {
    ptr: NonNull<u8>,
    size: usize,
}

impl NativeBuffer {
    fn layout(size: usize) -> Layout {
        match Layout::from_size_align(size.max(1), BUFFER_ALIGN) {
            Ok(layout) => layout,
            Err(_) => panic!("capacity overflow"),
        }
    }

    pub fn zeroed(size: usize) -> Self {
        let layout = Self::layout(size);
        // SAFETY: layout has non-zero size
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = match NonNull::new(raw) {
            Some(ptr) => ptr,
            None => alloc::handle_alloc_error(layout),
        };
        track_alloc();
        Self { ptr, size }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let buffer = Self::zeroed(bytes.len());
        // SAFETY: buffer holds at least bytes.len() bytes and does not overlap
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), buffer.ptr.as_ptr(), bytes.len());
        }
        buffer
    }

    /// Copy of a string with a trailing NUL
    pub fn from_c_str(s: &str) -> Self {
        let buffer = Self::zeroed(s.len() + 1);
        // SAFETY: buffer holds s.len() + 1 zeroed bytes
        unsafe {
            std::ptr::copy_nonoverlapping(s.as_ptr(), buffer.ptr.as_ptr(), s.len());
        }
        buffer
    }

    /// Copy `size` bytes from native memory
    ///
    /// # Safety
    /// `src` must be valid for reads of `size` bytes.
    pub unsafe fn copy_from(src: *const u8, size: usize) -> Self {
        let buffer = Self::zeroed(size);
        if !src.is_null() {
            std::ptr::copy_nonoverlapping(src, buffer.ptr.as_ptr(), size);
        }
        buffer
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn as_void_ptr(&self) -> *mut c_void {
        self.ptr.as_ptr().cast()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for size initialized bytes
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.size) }
    }
}

impl Drop for NativeBuffer {
    fn drop(&mut self) {
        // SAFETY: allocated in `zeroed` with the same layout
        unsafe { alloc::dealloc(self.ptr.as_ptr(), Self::layout(self.size)) };
        track_free();
    }
}

impl std::fmt::Debug for NativeBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NativeBuffer({:p}, {} bytes)", self.ptr, self.size)
    }
}

/// Heap slot with a stable address
///
/// Unlike `Box`, moving a `HeapBox` does not invalidate raw pointers that
/// native code holds into it.
pub struct HeapBox<T> {
    ptr: NonNull<T>,
}

impl<T> HeapBox<T> {
    pub fn new(value: T) -> Self {
        let ptr = NonNull::from(Box::leak(Box::new(value)));
        track_alloc();
        Self { ptr }
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn as_void_ptr(&self) -> *mut c_void {
        self.ptr.as_ptr().cast()
    }

    pub fn get(&self) -> &T {
        // SAFETY: the slot is live and only written through raw pointers while
        // no reference is held
        unsafe { self.ptr.as_ref() }
    }

    pub fn get_mut(&mut self) -> &mut T {
        // SAFETY: see `get`
        unsafe { self.ptr.as_mut() }
    }
}

impl<T> Drop for HeapBox<T> {
    fn drop(&mut self) {
        // SAFETY: created from Box::leak in `new`
        drop(unsafe { Box::from_raw(self.ptr.as_ptr()) });
        track_free();
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for HeapBox<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("HeapBox").field(self.get()).finish()
    }
}

/// Runtime header of a growable or byte array
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ArrayHeader {
    pub data: *mut u8,
    pub len: u32,
    pub element_size: u32,
}

/// Runtime header of a pointer array
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PointerArrayHeader {
    pub pdata: *mut *mut c_void,
    pub len: u32,
}
