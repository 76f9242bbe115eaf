//! Output surfaces
//!
//! Decoded guest writes end up in an [`OutputSurface`]. The surface only ever
//! receives appends and clears; it never reads back into the guest.

use crate::abi::{Stream, StreamRouting};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

/// Sink for decoded guest output
pub trait OutputSurface: Send {
    /// Append a decoded fragment tagged with the stream it was written to
    fn append(&mut self, stream: Stream, text: &str);

    /// Drop everything shown so far
    fn clear(&mut self);
}

/// In-memory output, the equivalent of the playground's output box
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    routing: StreamRouting,
    stdout: String,
    stderr: String,
}

impl OutputBuffer {
    pub fn new(routing: StreamRouting) -> Self {
        Self {
            routing,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Everything shown on the main surface.
    ///
    /// With merged routing this includes stderr writes in call order.
    pub fn contents(&self) -> &str {
        &self.stdout
    }

    /// Stderr writes kept apart under split routing; always empty when merged
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }
}

impl OutputSurface for OutputBuffer {
    fn append(&mut self, stream: Stream, text: &str) {
        match (self.routing, stream) {
            (StreamRouting::Split, Stream::Stderr) => self.stderr.push_str(text),
            _ => self.stdout.push_str(text),
        }
    }

    fn clear(&mut self) {
        self.stdout.clear();
        self.stderr.clear();
    }
}

/// Clonable handle to an [`OutputBuffer`].
///
/// The bridge owns one clone inside the guest store while the caller keeps
/// another to inspect what was written.
#[derive(Debug, Clone, Default)]
pub struct SharedOutput {
    inner: Arc<Mutex<OutputBuffer>>,
}

impl SharedOutput {
    pub fn new(routing: StreamRouting) -> Self {
        Self {
            inner: Arc::new(Mutex::new(OutputBuffer::new(routing))),
        }
    }

    pub fn contents(&self) -> String {
        self.inner.lock().contents().to_string()
    }

    pub fn stderr(&self) -> String {
        self.inner.lock().stderr().to_string()
    }

    /// Copy of the underlying buffer
    pub fn snapshot(&self) -> OutputBuffer {
        self.inner.lock().clone()
    }
}

impl OutputSurface for SharedOutput {
    fn append(&mut self, stream: Stream, text: &str) {
        self.inner.lock().append(stream, text);
    }

    fn clear(&mut self) {
        self.inner.lock().clear();
    }
}

/// Terminal output
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleOutput {
    routing: StreamRouting,
}

impl ConsoleOutput {
    pub fn new(routing: StreamRouting) -> Self {
        Self { routing }
    }
}

impl OutputSurface for ConsoleOutput {
    fn append(&mut self, stream: Stream, text: &str) {
        // A closed pipe is not a guest error; drop the fragment.
        let result = match (self.routing, stream) {
            (StreamRouting::Split, Stream::Stderr) => {
                let mut err = std::io::stderr().lock();
                err.write_all(text.as_bytes()).and_then(|_| err.flush())
            }
            _ => {
                let mut out = std::io::stdout().lock();
                out.write_all(text.as_bytes()).and_then(|_| out.flush())
            }
        };
        if let Err(e) = result {
            tracing::debug!("dropping guest output: {}", e);
        }
    }

    fn clear(&mut self) {}
}
