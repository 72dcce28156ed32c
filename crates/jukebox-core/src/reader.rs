use std::sync::Arc;

use tracing::debug;

use crate::error::ReaderError;

/// A tag reader that serves one logical user at a time.
///
/// Nothing here serializes callers. The dispatcher and the registration
/// workflow take turns according to the [`Coordinator`](crate::coordinator::Coordinator)
/// state.
pub trait TagReader: Send + Sync {
    /// Return the id of a tag currently on the reader, if any, without waiting.
    fn poll(&self) -> Result<Option<String>, ReaderError>;

    /// Wait, with no timeout, until a tag is presented.
    fn read_blocking(&self) -> Result<String, ReaderError>;

    /// Free the underlying hardware. A later `poll`/`read_blocking`
    /// re-acquires it.
    fn release(&self);
}

/// Releases the reader when dropped, however the owning scope is left.
pub struct ReaderGuard {
    reader: Arc<dyn TagReader>,
}

impl ReaderGuard {
    pub fn new(reader: Arc<dyn TagReader>) -> Self {
        Self { reader }
    }
}

impl Drop for ReaderGuard {
    fn drop(&mut self) {
        debug!("releasing tag reader");
        self.reader.release();
    }
}
