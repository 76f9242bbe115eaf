//! Guest linear memory access
//!
//! [`GuestMemory`] holds the wasmtime memory *handle*, never a slice into it.
//! Every read or write derives a fresh view from the store at the moment of
//! access, so growth performed by the guest between two accesses is always
//! observed. Views borrow the store, which keeps them from being held across
//! any call back into the guest.

use crate::abi::{exports, BridgeError, BridgeResult, GuestSpan};
use wasmtime::{AsContext, Caller, Extern, Instance, Memory, StoreContext, StoreContextMut};

/// Handle to the guest's exported linear memory
#[derive(Debug, Clone, Copy)]
pub struct GuestMemory {
    memory: Memory,
}

impl GuestMemory {
    pub fn new(memory: Memory) -> Self {
        Self { memory }
    }

    /// Resolve the `memory` export of an instance
    pub fn from_instance(
        store: impl wasmtime::AsContextMut,
        instance: &Instance,
    ) -> BridgeResult<Self> {
        instance
            .get_memory(store, exports::MEMORY)
            .map(Self::new)
            .ok_or_else(|| BridgeError::MissingExport {
                name: exports::MEMORY,
                reason: "no exported memory".to_string(),
            })
    }

    /// Resolve the `memory` export from inside a host callback
    pub fn from_caller<T>(caller: &mut Caller<'_, T>) -> BridgeResult<Self> {
        match caller.get_export(exports::MEMORY) {
            Some(Extern::Memory(memory)) => Ok(Self::new(memory)),
            Some(_) => Err(BridgeError::MissingExport {
                name: exports::MEMORY,
                reason: "export is not a memory".to_string(),
            }),
            None => Err(BridgeError::MissingExport {
                name: exports::MEMORY,
                reason: "no exported memory".to_string(),
            }),
        }
    }

    /// Current size of linear memory in bytes
    pub fn size(&self, store: impl AsContext) -> usize {
        self.memory.data_size(store)
    }

    /// Borrow `[ptr, ptr+len)` from the live memory.
    pub fn view<'a, T: 'a>(
        &self,
        store: impl Into<StoreContext<'a, T>>,
        span: GuestSpan,
    ) -> BridgeResult<&'a [u8]> {
        let data = self.memory.data(store);
        let range = checked_range(span, data.len())?;
        Ok(&data[range])
    }

    /// Mutably borrow `[ptr, ptr+len)` from the live memory.
    pub fn view_mut<'a, T: 'a>(
        &self,
        store: impl Into<StoreContextMut<'a, T>>,
        span: GuestSpan,
    ) -> BridgeResult<&'a mut [u8]> {
        let data = self.memory.data_mut(store);
        let range = checked_range(span, data.len())?;
        Ok(&mut data[range])
    }

    /// Copy a span out of guest memory
    pub fn read<'a, T: 'a>(
        &self,
        store: impl Into<StoreContext<'a, T>>,
        span: GuestSpan,
    ) -> BridgeResult<Vec<u8>> {
        self.view(store, span).map(<[u8]>::to_vec)
    }

    /// Copy `bytes` into guest memory starting at `ptr`
    pub fn write<'a, T: 'a>(
        &self,
        store: impl Into<StoreContextMut<'a, T>>,
        ptr: u32,
        bytes: &[u8],
    ) -> BridgeResult<()> {
        let len = u32::try_from(bytes.len()).map_err(|_| BridgeError::InputTooLarge(bytes.len()))?;
        let dst = self.view_mut(store, GuestSpan::new(ptr, len))?;
        dst.copy_from_slice(bytes);
        Ok(())
    }
}

/// Validate a span against the current memory size. Never clamps.
fn checked_range(span: GuestSpan, size: usize) -> BridgeResult<std::ops::Range<usize>> {
    match span.end() {
        Some(end) if end <= size => Ok(span.ptr as usize..end),
        _ => Err(BridgeError::OutOfBounds {
            offset: span.ptr,
            len: span.len,
            size,
        }),
    }
}
