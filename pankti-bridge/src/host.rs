//! Host state carried in the guest store
//!
//! This is the data every callback sees through `Caller::data_mut`. It holds
//! only the output sink, the clock and the store limits; callbacks append to
//! the output and otherwise leave it alone.

use crate::abi::{GuestLimits, Stream};
use crate::clock::{Clock, SystemClock};
use crate::output::OutputSurface;
use std::sync::Arc;
use wasmtime::ResourceLimiter;

/// Host functions' view of the world
pub struct HostState {
    output: Box<dyn OutputSurface>,
    clock: Arc<dyn Clock>,
    limits: GuestLimits,
}

impl HostState {
    pub fn new(output: impl OutputSurface + 'static) -> Self {
        Self {
            output: Box::new(output),
            clock: Arc::new(SystemClock),
            limits: GuestLimits::default(),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_limits(mut self, limits: GuestLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> &GuestLimits {
        &self.limits
    }

    /// Append decoded text to the output surface
    pub fn emit(&mut self, stream: Stream, text: &str) {
        self.output.append(stream, text);
    }

    pub fn clear_output(&mut self) {
        self.output.clear();
    }

    pub fn timestamp(&self) -> i64 {
        self.clock.now_millis()
    }
}

/// Memory growth past the configured cap is refused; the guest sees
/// `memory.grow` fail and its allocator reports null.
impl ResourceLimiter for HostState {
    fn memory_growing(
        &mut self,
        _current: usize,
        desired: usize,
        _maximum: Option<usize>,
    ) -> anyhow::Result<bool> {
        let allowed = desired <= self.limits.max_memory_bytes;
        if !allowed {
            tracing::warn!(
                desired,
                limit = self.limits.max_memory_bytes,
                "refusing guest memory growth"
            );
        }
        Ok(allowed)
    }

    fn table_growing(
        &mut self,
        _current: usize,
        desired: usize,
        _maximum: Option<usize>,
    ) -> anyhow::Result<bool> {
        const MAX_TABLE_ELEMENTS: usize = 10000;
        Ok(desired <= MAX_TABLE_ELEMENTS)
    }
}
