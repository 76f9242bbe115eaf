//! The call bridge
//!
//! [`CallBridge::run`] stages source text in guest memory, invokes
//! `runCodeApi` and releases the staged buffer on every path out of the
//! invocation. It takes `&mut self`, so at most one run is ever in flight.

use crate::abi::{exports, BridgeError, BridgeResult, Stream, ALLOC_FAILED_MESSAGE};
use crate::allocator::{GuestAllocator, StagedBuffer};
use crate::engine::GuestInstance;
use crate::host::HostState;
use crate::memory::GuestMemory;
use crate::transcoder;
use wasmtime::{Store, Trap, TypedFunc};

/// Drives one instantiated guest
pub struct CallBridge {
    store: Store<HostState>,
    instance: wasmtime::Instance,
    memory: GuestMemory,
    allocator: GuestAllocator,
    entry: TypedFunc<(i32, i32), ()>,
    runs: u64,
}

impl CallBridge {
    /// Take ownership of an instance and resolve its export table
    pub fn new(guest: GuestInstance) -> BridgeResult<Self> {
        let GuestInstance {
            mut store,
            instance,
        } = guest;

        let memory = GuestMemory::from_instance(&mut store, &instance)?;
        let allocator = GuestAllocator::from_instance(&mut store, &instance)?;
        let entry = instance
            .get_typed_func::<(i32, i32), ()>(&mut store, exports::RUN_CODE)
            .map_err(|e| BridgeError::MissingExport {
                name: exports::RUN_CODE,
                reason: e.to_string(),
            })?;

        Ok(Self {
            store,
            instance,
            memory,
            allocator,
            entry,
            runs: 0,
        })
    }

    /// Run a program.
    ///
    /// Output produced by the guest goes to the host's output surface as it is
    /// written. Bridge failures are also reported there on the stderr stream
    /// before being returned. Guest-level errors are ordinary output and do
    /// not make this return `Err`.
    ///
    /// An empty source is not staged: no allocation, no entry-point call and
    /// no release. The web playground instead passes a zero-length buffer
    /// through `memAlloc(0)`, `runCodeApi(ptr, 0)` and `memFree`.
    pub fn run(&mut self, source: &str) -> BridgeResult<()> {
        let result = self.run_inner(source);
        if let Err(e) = &result {
            self.report(e);
        }
        result
    }

    fn run_inner(&mut self, source: &str) -> BridgeResult<()> {
        let bytes = transcoder::encode(source);
        if bytes.is_empty() {
            tracing::debug!("empty source, nothing to run");
            return Ok(());
        }
        let len = i32::try_from(bytes.len())
            .map_err(|_| BridgeError::InputTooLarge(bytes.len()))? as u32;

        self.refuel()?;

        let staged = self.allocator.allocate(&mut self.store, len)?;
        let outcome = self.invoke(&staged, &bytes);
        // The guest may have burned its whole budget; the release gets a fresh one.
        let refueled = self.refuel();
        let released = self.allocator.free(&mut self.store, staged);
        let released = refueled.and(released);

        self.runs += 1;
        tracing::debug!(run = self.runs, ok = outcome.is_ok(), "run finished");

        match (outcome, released) {
            (Err(e), Err(release_err)) => {
                tracing::warn!("release after failed run also failed: {}", release_err);
                Err(e)
            }
            (outcome, released) => outcome.and(released),
        }
    }

    /// Copy the source in and call the entry point.
    fn invoke(&mut self, staged: &StagedBuffer, bytes: &[u8]) -> BridgeResult<()> {
        // The allocator call may have grown memory; write through a fresh view.
        self.memory.write(&mut self.store, staged.ptr(), bytes)?;

        tracing::debug!(ptr = staged.ptr(), len = staged.len(), "invoking {}", exports::RUN_CODE);
        self.entry
            .call(&mut self.store, (staged.ptr() as i32, staged.len() as i32))
            .map_err(guest_failure)
    }

    fn refuel(&mut self) -> BridgeResult<()> {
        if let Some(fuel) = self.store.data().limits().fuel_per_run {
            self.store
                .set_fuel(fuel)
                .map_err(|e| BridgeError::GuestTrap(format!("fuel setup failed: {}", e)))?;
        }
        Ok(())
    }

    fn report(&mut self, error: &BridgeError) {
        tracing::warn!("run failed: {}", error);
        let message = match error {
            BridgeError::OutOfMemory { .. } => format!("{}\n", ALLOC_FAILED_MESSAGE),
            other => format!("error: {}\n", other),
        };
        self.store.data_mut().emit(Stream::Stderr, &message);
    }

    /// Clear the output surface
    pub fn clear_output(&mut self) {
        self.store.data_mut().clear_output();
    }

    /// Number of runs that reached the guest allocator successfully
    pub fn runs(&self) -> u64 {
        self.runs
    }

    /// Current guest memory size in bytes
    pub fn memory_size(&self) -> usize {
        self.memory.size(&self.store)
    }

    /// Read an exported guest global
    pub fn guest_global(&mut self, name: &str) -> Option<wasmtime::Val> {
        let global = self.instance.get_global(&mut self.store, name)?;
        Some(global.get(&mut self.store))
    }
}

/// Recover a host-side error that trapped the guest, or describe the trap.
fn guest_failure(err: anyhow::Error) -> BridgeError {
    if let Some(trap) = err.downcast_ref::<Trap>() {
        return BridgeError::GuestTrap(trap.to_string());
    }
    match err.downcast::<BridgeError>() {
        Ok(bridge) => bridge,
        Err(other) => BridgeError::GuestTrap(format!("{:#}", other)),
    }
}
