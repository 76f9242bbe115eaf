//! Pankti Bridge - Host-side driver for the Pankti guest module
//!
//! This crate lets a host hand source text to a compiled, sandboxed Pankti
//! module and collect what it prints. It includes:
//!
//! - **Transcoder**: UTF-8 encode/decode between host strings and guest bytes
//! - **Guest memory**: Bounds-checked views over linear memory, re-derived on every access
//! - **Allocator proxy**: Brokers `memAlloc` / `memFree` calls into the guest
//! - **Call bridge**: Stages source, invokes `runCodeApi`, always releases the buffer
//! - **Callbacks**: `writeStdout`, `writeStderr` and `getTimestamp` for the guest
//!
//! ## Protocol
//!
//! 1. The host encodes the source and asks the guest to allocate that many bytes
//! 2. The bytes are copied into the returned span
//! 3. `runCodeApi(ptr, len)` runs the program; the guest calls back into the
//!    host for every write, synchronously
//! 4. The host frees the span through `memFree`, whatever the outcome of step 3
//!
//! ## Example
//!
//! ```rust,ignore
//! use pankti_bridge::{CallBridge, HostState, ModuleLoader, SharedOutput, StreamRouting};
//!
//! let loader = ModuleLoader::new()?;
//! let module = loader.load("pankti.wasm").await?;
//!
//! let output = SharedOutput::new(StreamRouting::Merged);
//! let instance = loader.instantiate(&module, HostState::new(output.clone()))?;
//! let mut bridge = CallBridge::new(instance)?;
//!
//! bridge.run("show(\"hi\")")?;
//! assert!(output.contents().ends_with("hi"));
//! ```
//!
//! ## Safety
//!
//! - Every guest span is checked against the memory size at the moment of
//!   access; out-of-range spans are errors, never truncated
//! - Guest memory growth is capped (default: 256MB)
//! - An optional per-run fuel budget bounds runaway programs

pub mod abi;
pub mod allocator;
pub mod bridge;
pub mod callbacks;
pub mod clock;
pub mod config;
pub mod engine;
pub mod host;
pub mod memory;
pub mod output;
pub mod transcoder;

// Re-export main types
pub use abi::{BridgeError, BridgeResult, GuestLimits, GuestSpan, Stream, StreamRouting};

pub use allocator::{GuestAllocator, StagedBuffer};

pub use bridge::CallBridge;

pub use clock::{Clock, FixedClock, SystemClock};

pub use config::{BridgeConfig, ConfigError};

pub use engine::{GuestInstance, GuestModule, ModuleLoader};

pub use host::HostState;

pub use memory::GuestMemory;

pub use output::{ConsoleOutput, OutputBuffer, OutputSurface, SharedOutput};

#[cfg(test)]
mod tests;
