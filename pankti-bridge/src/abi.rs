//! Guest ABI definitions
//!
//! This module pins down the fixed names and numeric conventions shared by the
//! host and the guest module, along with the bridge error taxonomy.

use serde::{Deserialize, Serialize};

/// Export names the guest module must provide
pub mod exports {
    /// The guest's linear memory
    pub const MEMORY: &str = "memory";
    /// `memAlloc(len: i32) -> i32`, returns 0 when out of memory
    pub const MEM_ALLOC: &str = "memAlloc";
    /// `memFree(ptr: i32, len: i32)`
    pub const MEM_FREE: &str = "memFree";
    /// `runCodeApi(ptr: i32, len: i32)`
    pub const RUN_CODE: &str = "runCodeApi";
}

/// Import names the host supplies to the guest
pub mod imports {
    /// Namespace every host import lives under
    pub const MODULE: &str = "env";
    /// `writeStdout(ptr: i32, len: i32)`
    pub const WRITE_STDOUT: &str = "writeStdout";
    /// `writeStderr(ptr: i32, len: i32)`
    pub const WRITE_STDERR: &str = "writeStderr";
    /// `getTimestamp() -> i64`
    pub const GET_TIMESTAMP: &str = "getTimestamp";
}

/// Pointer value `memAlloc` returns when it cannot satisfy a request
pub const NULL_PTR: u32 = 0;

/// Size of a WebAssembly page in bytes
pub const WASM_PAGE_SIZE: usize = 64 * 1024;

/// Message shown on the output surface when the guest allocator fails
pub const ALLOC_FAILED_MESSAGE: &str = "Failed to allocate memory";

/// A (pointer, length) span inside guest linear memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GuestSpan {
    pub ptr: u32,
    pub len: u32,
}

impl GuestSpan {
    pub fn new(ptr: u32, len: u32) -> Self {
        Self { ptr, len }
    }

    /// Interpret raw `i32` call arguments as an unsigned span.
    ///
    /// Guest pointers are unsigned 32-bit addresses carried in `i32` slots.
    pub fn from_raw(ptr: i32, len: i32) -> Self {
        Self {
            ptr: ptr as u32,
            len: len as u32,
        }
    }

    /// Exclusive end offset, or `None` if it overflows the address space
    pub fn end(&self) -> Option<usize> {
        (self.ptr as usize).checked_add(self.len as usize)
    }
}

/// Output stream a guest write is tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Stdout,
    Stderr,
}

/// How stdout and stderr are presented on an output surface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamRouting {
    /// Both streams land in the same surface, in call order
    #[default]
    Merged,
    /// Stderr is kept apart from stdout
    Split,
}

/// Resource limits applied to the guest store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestLimits {
    /// Maximum linear memory in bytes (default: 256MB)
    #[serde(default = "default_max_memory")]
    pub max_memory_bytes: usize,
    /// Fuel refilled before every run; `None` lets the guest run unbounded
    #[serde(default)]
    pub fuel_per_run: Option<u64>,
}

fn default_max_memory() -> usize {
    256 * 1024 * 1024
}

impl Default for GuestLimits {
    fn default() -> Self {
        Self {
            max_memory_bytes: default_max_memory(),
            fuel_per_run: None,
        }
    }
}

/// Error types for bridge operations
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("guest allocator could not reserve {len} bytes")]
    OutOfMemory { len: u32 },

    #[error("span [{offset}, {offset}+{len}) is outside guest memory of {size} bytes")]
    OutOfBounds { offset: u32, len: u32, size: usize },

    #[error("guest export `{name}` unavailable: {reason}")]
    MissingExport { name: &'static str, reason: String },

    #[error("source of {0} bytes does not fit a guest pointer")]
    InputTooLarge(usize),

    #[error("guest trapped: {0}")]
    GuestTrap(String),

    #[error("failed to load guest module: {0}")]
    Load(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BridgeResult<T> = Result<T, BridgeError>;
