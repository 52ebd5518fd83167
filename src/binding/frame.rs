//! Call frames
//!
//! A frame holds every cell of one native call. Dropping it is the only place
//! storage allocated for the call is released.

use smallvec::SmallVec;

use crate::interop::cell::{CellValue, NativeCell, Ownership, Storage};
use crate::interop::memory::HeapBox;
use crate::logging::log_frame_release;
use crate::metadata::types::Direction;

#[derive(Debug)]
pub struct FrameEntry {
    pub name: String,
    /// Declaration index; `None` for the receiver
    pub index: Option<usize>,
    pub direction: Direction,
    /// Array length parameter not visible to the host
    pub hidden: bool,
    pub caller_allocated: bool,
    input: Option<NativeCell>,
    output: Option<NativeCell>,
    /// Storage behind an INOUT value that now lives in the out slot
    retained: Option<Storage>,
}

impl FrameEntry {
    pub fn receiver(cell: NativeCell) -> Self {
        Self {
            name: "self".to_string(),
            index: None,
            direction: Direction::In,
            hidden: false,
            caller_allocated: false,
            input: Some(cell),
            output: None,
            retained: None,
        }
    }

    pub fn input(name: impl Into<String>, index: usize, cell: NativeCell) -> Self {
        Self {
            name: name.into(),
            index: Some(index),
            direction: Direction::In,
            hidden: false,
            caller_allocated: false,
            input: Some(cell),
            output: None,
            retained: None,
        }
    }

    pub fn output(name: impl Into<String>, index: usize, cell: NativeCell, caller_allocated: bool) -> Self {
        Self {
            name: name.into(),
            index: Some(index),
            direction: Direction::Out,
            hidden: false,
            caller_allocated,
            input: None,
            output: Some(cell),
            retained: None,
        }
    }

    /// Rewire an encoded INOUT value: the value moves into an owned out slot
    /// and both views carry the slot's address.
    pub fn inout(name: impl Into<String>, index: usize, encoded: NativeCell) -> Self {
        let (value, retained) = encoded.into_parts();
        let slot = HeapBox::new(value);
        let address = slot.as_void_ptr();

        Self {
            name: name.into(),
            index: Some(index),
            direction: Direction::InOut,
            hidden: false,
            caller_allocated: false,
            input: Some(NativeCell::aliased(address)),
            output: Some(NativeCell::owned(CellValue::from_ptr(address), Storage::Slot(slot))),
            retained,
        }
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn input_cell(&self) -> Option<&NativeCell> {
        self.input.as_ref()
    }

    pub fn output_cell(&self) -> Option<&NativeCell> {
        self.output.as_ref()
    }

    /// Value the callee left for an OUT or INOUT entry
    ///
    /// For out slots this is the slot content; for caller-allocated entries
    /// the buffer address itself.
    pub fn result(&self) -> Option<CellValue> {
        let output = self.output.as_ref()?;
        match output.ownership() {
            Ownership::Owned(Storage::Slot(slot)) => Some(*slot.get()),
            _ => Some(output.value()),
        }
    }

    fn release(&mut self) -> usize {
        let mut released = 0;
        if let Some(cell) = self.input.take() {
            released += cell.release();
        }
        if let Some(cell) = self.output.take() {
            released += cell.release();
        }
        if let Some(storage) = self.retained.take() {
            released += storage.allocation_count();
            storage.release();
        }
        released
    }
}

#[derive(Debug, Default)]
pub struct CallFrame {
    entries: SmallVec<[FrameEntry; 8]>,
}

impl CallFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: FrameEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[FrameEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry of the parameter declared at `index`
    pub fn entry(&self, index: usize) -> Option<&FrameEntry> {
        self.entries.iter().find(|entry| entry.index == Some(index))
    }

    /// Receiver, IN and INOUT cells in declaration order
    pub fn in_cells(&self) -> SmallVec<[CellValue; 8]> {
        self.entries
            .iter()
            .filter_map(|entry| entry.input.as_ref().map(NativeCell::value))
            .collect()
    }

    /// OUT and INOUT cells in declaration order
    pub fn out_cells(&self) -> SmallVec<[CellValue; 8]> {
        self.entries
            .iter()
            .filter_map(|entry| entry.output.as_ref().map(NativeCell::value))
            .collect()
    }

    pub fn in_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.input.is_some())
            .map(|entry| entry.name.as_str())
            .collect()
    }

    pub fn out_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.output.is_some())
            .map(|entry| entry.name.as_str())
            .collect()
    }
}

impl Drop for CallFrame {
    fn drop(&mut self) {
        let released: usize = self.entries.iter_mut().map(FrameEntry::release).sum();
        log_frame_release(self.entries.len(), released);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interop::memory::{live_allocations, NativeBuffer};
    use crate::metadata::types::TypeTag;

    #[test]
    fn test_inout_rewiring() {
        let entry = FrameEntry::inout("count", 0, NativeCell::inline(CellValue::from_integer(TypeTag::Int32, 3)));
        let input = entry.input_cell().unwrap();
        let output = entry.output_cell().unwrap();

        assert!(matches!(input.ownership(), Ownership::Aliased));
        assert_eq!(input.value().as_ptr(), output.value().as_ptr());
        assert_eq!(entry.result().unwrap().read_integer(TypeTag::Int32), Some(3));

        unsafe { *(output.value().as_ptr() as *mut i32) = 9 };
        assert_eq!(entry.result().unwrap().read_integer(TypeTag::Int32), Some(9));
    }

    #[test]
    fn test_drop_releases_everything() {
        let before = live_allocations();
        {
            let mut frame = CallFrame::new();
            let name = NativeBuffer::from_c_str("name");
            frame.push(FrameEntry::input(
                "name",
                0,
                NativeCell::owned(CellValue::from_ptr(name.as_void_ptr()), Storage::Buffer(name)),
            ));
            let text = NativeBuffer::from_c_str("text");
            frame.push(FrameEntry::inout(
                "text",
                1,
                NativeCell::owned(CellValue::from_ptr(text.as_void_ptr()), Storage::Buffer(text)),
            ));
            assert_eq!(live_allocations(), before + 3);
            assert_eq!(frame.in_cells().len(), 2);
            assert_eq!(frame.out_cells().len(), 1);
        }
        assert_eq!(live_allocations(), before);
    }
}
