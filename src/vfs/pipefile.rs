/*!
 * Pipe File Adapter
 * Presents one pipe handle through a generic file-like interface
 */

use super::types::{VfsError, VfsResult};
use crate::pipe::{Pipe, PipeListener, PipesManager};
use log::debug;
use parking_lot::Mutex;
use std::io;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Fan-out relay between a pipe and this adapter's own listeners
///
/// The relay is the single pipe-level listener a handle registers; adapter
/// consumers subscribe to the relay. Two hops on purpose: the handle has
/// exactly one seat at the pipe while any number of external observers (a
/// player reacting to buffering stalls, say) sit behind it.
#[derive(Default)]
struct ListenerRelay {
    listeners: Mutex<Vec<Weak<dyn PipeListener>>>,
}

impl ListenerRelay {
    fn add(&self, listener: &Arc<dyn PipeListener>) {
        let candidate = Arc::downgrade(listener);
        let mut listeners = self.listeners.lock();
        listeners.retain(|l| l.strong_count() > 0);
        if !listeners.iter().any(|l| Weak::ptr_eq(l, &candidate)) {
            listeners.push(candidate);
        }
    }

    fn remove(&self, listener: &Arc<dyn PipeListener>) {
        let target = Arc::downgrade(listener);
        self.listeners
            .lock()
            .retain(|l| l.strong_count() > 0 && !Weak::ptr_eq(l, &target));
    }

    fn snapshot(&self) -> Vec<Arc<dyn PipeListener>> {
        self.listeners.lock().iter().filter_map(Weak::upgrade).collect()
    }
}

impl PipeListener for ListenerRelay {
    fn on_overflow(&self) {
        for listener in self.snapshot() {
            listener.on_overflow();
        }
    }

    fn on_underflow(&self) {
        for listener in self.snapshot() {
            listener.on_underflow();
        }
    }
}

/// File-like handle on a named pipe
///
/// A reader obtains an existing pipe with `open`; a writer registers a new
/// one with `open_for_write`. Reads and writes pass straight through to the
/// pipe with this handle's default timeout. Pipes are not seekable and have
/// no persistent identity, so `seek` always fails and there is nothing to
/// delete or rename. The handle releases the pipe on `close` or drop.
pub struct PipeFile {
    manager: Arc<PipesManager>,
    pipe: Option<Arc<Pipe>>,
    relay: Arc<ListenerRelay>,
    timeout: Option<Duration>,
    position: u64,
    length: Option<u64>,
}

impl PipeFile {
    /// Opens an existing pipe for reading on the global manager
    pub fn open(url: &str) -> VfsResult<Self> {
        Self::open_on(PipesManager::global(), url)
    }

    /// Opens an existing pipe for reading on a specific manager
    pub fn open_on(manager: Arc<PipesManager>, url: &str) -> VfsResult<Self> {
        let pipe = manager
            .open(url)
            .ok_or_else(|| VfsError::NotFound(url.to_owned()))?;
        Ok(Self::attach(manager, pipe))
    }

    /// Registers a new pipe for writing on the global manager
    ///
    /// An empty url lets the manager synthesize a unique name; query it back
    /// with `name()`. A duplicate name fails with `VfsError::AlreadyExists`.
    pub fn open_for_write(url: &str) -> VfsResult<Self> {
        Self::open_for_write_on(PipesManager::global(), url)
    }

    /// Registers a new pipe for writing on a specific manager
    pub fn open_for_write_on(manager: Arc<PipesManager>, url: &str) -> VfsResult<Self> {
        let pipe = manager.create(url, None)?;
        Ok(Self::attach(manager, pipe))
    }

    fn attach(manager: Arc<PipesManager>, pipe: Arc<Pipe>) -> Self {
        let relay = Arc::new(ListenerRelay::default());
        let as_listener: Arc<dyn PipeListener> = relay.clone();
        pipe.add_listener(&as_listener);
        Self {
            manager,
            pipe: Some(pipe),
            relay,
            timeout: None,
            position: 0,
            length: None,
        }
    }

    /// Whether a pipe with this url is currently registered globally
    pub fn exists(url: &str) -> bool {
        PipesManager::global().exists(url)
    }

    /// Name of the attached pipe, if the handle is still open
    pub fn name(&self) -> Option<&str> {
        self.pipe.as_deref().map(Pipe::name)
    }

    /// Overrides the default timeout applied to reads and writes
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Reads up to `buf.len()` bytes from the pipe
    pub fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        let pipe = self.pipe.as_ref().ok_or(VfsError::Closed)?;
        let n = pipe.read(buf, self.timeout)?;
        self.position += n as u64;
        Ok(n)
    }

    /// Writes all of `data` into the pipe
    pub fn write(&mut self, data: &[u8]) -> VfsResult<usize> {
        let pipe = self.pipe.as_ref().ok_or(VfsError::Closed)?;
        pipe.write(data, self.timeout)?;
        self.position += data.len() as u64;
        Ok(data.len())
    }

    /// Pipes are not seekable
    pub fn seek(&mut self, _offset: u64) -> VfsResult<u64> {
        Err(VfsError::NotSupported("pipes are not seekable".to_string()))
    }

    /// Releases the pipe handle; idempotent
    pub fn close(&mut self) {
        if let Some(pipe) = self.pipe.take() {
            debug!("Releasing pipe file handle on {}", pipe.name());
            let as_listener: Arc<dyn PipeListener> = self.relay.clone();
            pipe.remove_listener(&as_listener);
            self.manager.close(pipe);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.pipe.is_none()
    }

    /// Bytes moved through this handle so far; not a seekable offset
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Writer-declared logical stream length, independent of buffer occupancy
    pub fn length(&self) -> Option<u64> {
        self.length
    }

    pub fn set_length(&mut self, length: Option<u64>) {
        self.length = length;
    }

    /// Signals end of stream on the underlying pipe
    pub fn set_eof(&self) {
        if let Some(pipe) = &self.pipe {
            pipe.set_eof();
        }
    }

    pub fn is_eof(&self) -> bool {
        self.pipe.as_ref().map_or(true, |pipe| pipe.is_eof())
    }

    pub fn is_empty(&self) -> bool {
        self.pipe.as_ref().map_or(true, |pipe| pipe.is_empty())
    }

    /// Bytes currently buffered in the underlying pipe
    pub fn available_read(&self) -> usize {
        self.pipe.as_ref().map_or(0, |pipe| pipe.available_read())
    }

    /// Discards the pipe's buffered bytes
    pub fn flush(&self) {
        if let Some(pipe) = &self.pipe {
            pipe.flush();
        }
    }

    /// Subscribes an observer to this handle's buffering signals
    pub fn add_listener(&self, listener: &Arc<dyn PipeListener>) {
        self.relay.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn PipeListener>) {
        self.relay.remove(listener);
    }
}

impl Drop for PipeFile {
    fn drop(&mut self) {
        self.close();
    }
}

impl io::Read for PipeFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        PipeFile::read(self, buf).map_err(io::Error::from)
    }
}

impl io::Write for PipeFile {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        PipeFile::write(self, data).map_err(io::Error::from)
    }

    // Not wired to Pipe::flush: that call DISCARDS buffered bytes, while
    // io::Write::flush promises delivery. Written bytes are already visible
    // to the reader, so this is a no-op.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Seek for PipeFile {
    fn seek(&mut self, _pos: io::SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "pipes are not seekable",
        ))
    }
}

impl std::fmt::Debug for PipeFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeFile")
            .field("pipe", &self.name())
            .field("position", &self.position)
            .field("length", &self.length)
            .finish()
    }
}
