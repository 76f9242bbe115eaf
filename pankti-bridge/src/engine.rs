//! Guest module loading and instantiation
//!
//! This module owns the wasmtime engine and the linker with the callback
//! surface registered. It turns a binary artifact into a [`GuestInstance`],
//! the single handle a [`CallBridge`](crate::bridge::CallBridge) is built from.

use crate::abi::{BridgeError, BridgeResult, GuestLimits};
use crate::callbacks;
use crate::config::BridgeConfig;
use crate::host::HostState;
use std::path::Path;
use wasmtime::*;

/// Compiles and instantiates guest modules
///
/// One loader can serve many instances; each instance gets its own store.
pub struct ModuleLoader {
    engine: Engine,
    linker: Linker<HostState>,
    limits: GuestLimits,
}

impl ModuleLoader {
    /// Create a loader with default limits
    pub fn new() -> BridgeResult<Self> {
        Self::with_limits(GuestLimits::default())
    }

    pub fn from_config(config: &BridgeConfig) -> BridgeResult<Self> {
        Self::with_limits(config.limits.clone())
    }

    pub fn with_limits(limits: GuestLimits) -> BridgeResult<Self> {
        let mut config = Config::new();
        config.wasm_multi_memory(false);
        config.wasm_bulk_memory(true);
        if limits.fuel_per_run.is_some() {
            config.consume_fuel(true);
        }

        let engine = Engine::new(&config)
            .map_err(|e| BridgeError::Load(format!("engine creation failed: {}", e)))?;

        let mut linker = Linker::new(&engine);
        callbacks::register(&mut linker)
            .map_err(|e| BridgeError::Load(format!("host import registration failed: {}", e)))?;

        Ok(Self {
            engine,
            linker,
            limits,
        })
    }

    pub fn limits(&self) -> &GuestLimits {
        &self.limits
    }

    /// Compile a module from WASM bytes
    pub fn compile(&self, wasm_bytes: &[u8]) -> BridgeResult<GuestModule> {
        let module = Module::new(&self.engine, wasm_bytes)
            .map_err(|e| BridgeError::Load(format!("module compilation failed: {:#}", e)))?;
        Ok(GuestModule { module })
    }

    /// Read and compile a module artifact without blocking the async runtime
    pub async fn load(&self, path: impl AsRef<Path>) -> BridgeResult<GuestModule> {
        let path = path.as_ref();
        tracing::info!("Loading guest module from {:?}", path);

        let bytes = tokio::fs::read(path).await?;
        let engine = self.engine.clone();
        let module = tokio::task::spawn_blocking(move || Module::new(&engine, &bytes))
            .await
            .map_err(|e| BridgeError::Load(format!("compile task failed: {}", e)))?
            .map_err(|e| BridgeError::Load(format!("module compilation failed: {:#}", e)))?;

        tracing::debug!("Guest module compiled");
        Ok(GuestModule { module })
    }

    /// Instantiate a compiled module against the host import surface
    pub fn instantiate(&self, module: &GuestModule, host: HostState) -> BridgeResult<GuestInstance> {
        let mut store = Store::new(&self.engine, host.with_limits(self.limits.clone()));
        store.limiter(|state| state as &mut dyn ResourceLimiter);

        let instance = self
            .linker
            .instantiate(&mut store, &module.module)
            .map_err(|e| BridgeError::Load(format!("instantiation failed: {:#}", e)))?;

        Ok(GuestInstance { store, instance })
    }
}

/// A compiled guest module
#[derive(Clone)]
pub struct GuestModule {
    module: Module,
}

impl GuestModule {
    /// Names of the module's exports
    pub fn exports(&self) -> impl Iterator<Item = &str> {
        self.module.exports().map(|e| e.name())
    }
}

/// An instantiated guest with its store
///
/// Lives for the whole session; there is no teardown beyond dropping it.
pub struct GuestInstance {
    pub(crate) store: Store<HostState>,
    pub(crate) instance: Instance,
}

impl GuestInstance {
    pub fn host(&self) -> &HostState {
        self.store.data()
    }
}
