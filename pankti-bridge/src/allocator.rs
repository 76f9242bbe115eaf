//! Proxy for the guest's own allocator exports
//!
//! The host never decides where bytes live inside the guest. It asks the
//! guest through `memAlloc` / `memFree` and tracks the returned span as a
//! [`StagedBuffer`], which is consumed by [`GuestAllocator::free`] so a buffer
//! cannot be released twice.

use crate::abi::{exports, BridgeError, BridgeResult, GuestSpan, NULL_PTR};
use wasmtime::{AsContextMut, Instance, TypedFunc};

/// A span of guest memory reserved for one entry-point invocation.
///
/// Deliberately neither `Clone` nor `Copy`.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a staged buffer must be released with GuestAllocator::free"]
pub struct StagedBuffer {
    span: GuestSpan,
}

impl StagedBuffer {
    pub fn ptr(&self) -> u32 {
        self.span.ptr
    }

    pub fn len(&self) -> u32 {
        self.span.len
    }
}

/// Typed handles to `memAlloc` and `memFree`
#[derive(Clone)]
pub struct GuestAllocator {
    alloc: TypedFunc<i32, i32>,
    free: TypedFunc<(i32, i32), ()>,
}

impl GuestAllocator {
    /// Resolve the allocator exports of an instance
    pub fn from_instance(mut store: impl AsContextMut, instance: &Instance) -> BridgeResult<Self> {
        let alloc = instance
            .get_typed_func::<i32, i32>(&mut store, exports::MEM_ALLOC)
            .map_err(|e| BridgeError::MissingExport {
                name: exports::MEM_ALLOC,
                reason: e.to_string(),
            })?;
        let free = instance
            .get_typed_func::<(i32, i32), ()>(&mut store, exports::MEM_FREE)
            .map_err(|e| BridgeError::MissingExport {
                name: exports::MEM_FREE,
                reason: e.to_string(),
            })?;

        Ok(Self { alloc, free })
    }

    /// Ask the guest for `len` bytes.
    ///
    /// A null pointer from the guest is reported as [`BridgeError::OutOfMemory`];
    /// no buffer is produced, so there is nothing to free.
    pub fn allocate(&self, store: impl AsContextMut, len: u32) -> BridgeResult<StagedBuffer> {
        let raw = self
            .alloc
            .call(store, len as i32)
            .map_err(|e| BridgeError::GuestTrap(format!("{}: {:#}", exports::MEM_ALLOC, e)))?;

        let ptr = raw as u32;
        if ptr == NULL_PTR {
            tracing::warn!(len, "guest allocator returned null");
            return Err(BridgeError::OutOfMemory { len });
        }

        tracing::debug!(ptr, len, "staged buffer allocated");
        Ok(StagedBuffer {
            span: GuestSpan::new(ptr, len),
        })
    }

    /// Release a buffer with the exact pair `allocate` produced.
    pub fn free(&self, store: impl AsContextMut, buffer: StagedBuffer) -> BridgeResult<()> {
        let GuestSpan { ptr, len } = buffer.span;
        tracing::debug!(ptr, len, "releasing staged buffer");
        self.free
            .call(store, (ptr as i32, len as i32))
            .map_err(|e| BridgeError::GuestTrap(format!("{}: {:#}", exports::MEM_FREE, e)))
    }
}
