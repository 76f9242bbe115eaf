//! Host functions imported by the guest
//!
//! The guest calls these synchronously while `runCodeApi` is on the stack.
//! Each write callback resolves the memory export again, reads the exact span
//! against the memory size at that instant, decodes it and appends it before
//! returning control. Nothing is cached between calls.

use crate::abi::{imports, GuestSpan, Stream};
use crate::host::HostState;
use crate::memory::GuestMemory;
use crate::transcoder;
use anyhow::Result;
use wasmtime::{Caller, Linker};

/// Register `writeStdout`, `writeStderr` and `getTimestamp` under `env`
pub fn register(linker: &mut Linker<HostState>) -> Result<()> {
    // env::writeStdout(ptr: i32, len: i32)
    linker.func_wrap(
        imports::MODULE,
        imports::WRITE_STDOUT,
        |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> Result<()> {
            write_stream(&mut caller, Stream::Stdout, GuestSpan::from_raw(ptr, len))
        },
    )?;

    // env::writeStderr(ptr: i32, len: i32)
    linker.func_wrap(
        imports::MODULE,
        imports::WRITE_STDERR,
        |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> Result<()> {
            write_stream(&mut caller, Stream::Stderr, GuestSpan::from_raw(ptr, len))
        },
    )?;

    // env::getTimestamp() -> i64
    linker.func_wrap(
        imports::MODULE,
        imports::GET_TIMESTAMP,
        |caller: Caller<'_, HostState>| -> i64 { caller.data().timestamp() },
    )?;

    Ok(())
}

/// Copy, decode and append one guest write.
///
/// A span outside memory traps the guest with the boundary error, which the
/// call bridge recovers once the entry point unwinds.
fn write_stream(caller: &mut Caller<'_, HostState>, stream: Stream, span: GuestSpan) -> Result<()> {
    let memory = GuestMemory::from_caller(caller)?;
    let text = transcoder::decode(memory.view(&*caller, span)?).into_owned();

    tracing::trace!(?stream, ptr = span.ptr, len = span.len, "guest write");
    caller.data_mut().emit(stream, &text);
    Ok(())
}
