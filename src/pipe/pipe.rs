/*!
 * Pipe Implementation
 * Bounded byte stream with ringbuf-based circular buffer and blocking I/O
 */

use super::types::{PipeError, PipeListener};
use crate::core::config::WaitConfig;
use crate::core::types::Size;
use log::debug;
use parking_lot::{Condvar, Mutex, MutexGuard};
use ringbuf::{traits::*, HeapRb};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// State guarded by the pipe's single lock
struct PipeState {
    buffer: HeapRb<u8>,
    open: bool,
    eof: bool,
    /// Fill-threshold gate; reads are held back until it opens
    ready_for_read: bool,
    open_threshold: Size,
    listeners: Vec<Weak<dyn PipeListener>>,
}

impl PipeState {
    /// Prune dead listeners and snapshot the live ones for unlocked dispatch
    fn live_listeners(&mut self) -> Vec<Arc<dyn PipeListener>> {
        self.listeners.retain(|l| l.strong_count() > 0);
        self.listeners.iter().filter_map(Weak::upgrade).collect()
    }

    /// Opens the gate once occupancy reaches the threshold. One-shot: the
    /// gate never re-arms on its own, not even after a flush.
    fn check_threshold(&mut self) {
        if !self.ready_for_read && self.buffer.occupied_len() >= self.open_threshold {
            self.ready_for_read = true;
        }
    }
}

/// A single bounded byte stream connecting one writer to its readers
///
/// All flags, the ring buffer, and the listener set share one mutex; two
/// condvars signal "data available" and "space available". Blocking calls
/// wait in bounded slices (`WaitConfig::poll_interval`) so listeners are
/// re-notified periodically while a caller stays blocked, and so `close`
/// is observed promptly from any wait.
pub struct Pipe {
    name: String,
    capacity: Size,
    wait: WaitConfig,
    state: Mutex<PipeState>,
    data_avail: Condvar,
    space_avail: Condvar,
}

impl std::fmt::Debug for Pipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Pipe")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("buffered_bytes", &state.buffer.occupied_len())
            .field("open", &state.open)
            .field("eof", &state.eof)
            .field("ready_for_read", &state.ready_for_read)
            .finish()
    }
}

impl Pipe {
    pub fn new(name: String, capacity: Size, wait: WaitConfig) -> Self {
        Self {
            name,
            capacity,
            wait,
            state: Mutex::new(PipeState {
                buffer: HeapRb::<u8>::new(capacity),
                open: true,
                eof: false,
                ready_for_read: true,
                open_threshold: 0,
                listeners: Vec::new(),
            }),
            data_avail: Condvar::new(),
            space_avail: Condvar::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> Size {
        self.capacity
    }

    /// Bytes currently buffered (written but not yet read)
    pub fn available_read(&self) -> Size {
        self.state.lock().buffer.occupied_len()
    }

    /// Free space currently left in the buffer
    pub fn available_space(&self) -> Size {
        self.state.lock().buffer.vacant_len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().buffer.is_empty()
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    pub fn is_eof(&self) -> bool {
        self.state.lock().eof
    }

    /// Signals that no more bytes will ever be written. One-way latch; wakes
    /// both sides so a blocked reader can drain and observe end of stream.
    pub fn set_eof(&self) {
        let mut state = self.state.lock();
        if !state.eof {
            state.eof = true;
            self.data_avail.notify_all();
            self.space_avail.notify_all();
        }
    }

    /// Closes the pipe and wakes all blocked readers and writers. One-way
    /// latch; waiters observe the flag and return promptly.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.open {
            state.open = false;
            debug!("pipe {}: closed", self.name);
            self.data_avail.notify_all();
            self.space_avail.notify_all();
        }
    }

    /// Requires `threshold` buffered bytes before reads may proceed. The gate
    /// opens on the first write that reaches the threshold and then stays
    /// open for the pipe's lifetime.
    pub fn set_open_threshold(&self, threshold: Size) {
        let mut state = self.state.lock();
        state.open_threshold = threshold;
        state.ready_for_read = state.buffer.occupied_len() >= threshold;
        debug!(
            "pipe {}: open threshold set to {} (gate {})",
            self.name,
            threshold,
            if state.ready_for_read { "open" } else { "armed" }
        );
    }

    /// Discards all buffered bytes. No-op unless the pipe is open, not at
    /// end of stream, and past its fill threshold.
    pub fn flush(&self) {
        let mut state = self.state.lock();
        if state.open && !state.eof && state.ready_for_read {
            let dropped = state.buffer.clear();
            if dropped > 0 {
                debug!("pipe {}: flushed {} buffered bytes", self.name, dropped);
            }
            self.space_avail.notify_all();
        }
    }

    /// Registers a stall observer. Idempotent: adding an already-registered
    /// listener is a no-op. The pipe holds only a weak reference.
    pub fn add_listener(&self, listener: &Arc<dyn PipeListener>) {
        let candidate = Arc::downgrade(listener);
        let mut state = self.state.lock();
        state.listeners.retain(|l| l.strong_count() > 0);
        if !state.listeners.iter().any(|l| Weak::ptr_eq(l, &candidate)) {
            state.listeners.push(candidate);
        }
    }

    /// Removes a stall observer; unknown listeners are a no-op
    pub fn remove_listener(&self, listener: &Arc<dyn PipeListener>) {
        let target = Arc::downgrade(listener);
        let mut state = self.state.lock();
        state
            .listeners
            .retain(|l| l.strong_count() > 0 && !Weak::ptr_eq(l, &target));
    }

    /// Reads up to `buf.len()` bytes, blocking while the buffer is empty
    ///
    /// Returns `Ok(n)` with the bytes copied out, `Ok(0)` at end of stream or
    /// when the timeout elapses with no data, and `Err(PipeError::Closed)` if
    /// the pipe was closed at entry or while waiting. `timeout: None` waits
    /// "forever", bounded by `WaitConfig::max_wait`. Underflow listeners fire
    /// once per wait slice while the stall persists.
    pub fn read(&self, buf: &mut [u8], timeout: Option<Duration>) -> Result<Size, PipeError> {
        if buf.is_empty() {
            return Ok(0);
        }

        let deadline = Instant::now() + self.wait.effective_timeout(timeout);
        let mut state = self.state.lock();

        if !state.open {
            return Err(PipeError::Closed);
        }

        // Fill-threshold gate: hold the read back until enough is buffered.
        // End of stream bypasses the gate so the remainder can drain.
        while !state.ready_for_read && !state.eof {
            if !state.open {
                return Err(PipeError::Closed);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(0);
            }
            let slice = self.wait.poll_interval.min(deadline - now);
            self.data_avail.wait_for(&mut state, slice);
        }
        if !state.open {
            return Err(PipeError::Closed);
        }

        loop {
            if state.buffer.occupied_len() > 0 {
                let n = state.buffer.pop_slice(buf);
                // Consuming frees space for a blocked writer
                self.space_avail.notify_all();
                return Ok(n);
            }
            if state.eof {
                return Ok(0);
            }

            // Empty and not at end of stream: let listeners react to the
            // stall, then wait one slice for the writer. Listeners run
            // unlocked and may call back into the pipe.
            let listeners = state.live_listeners();
            MutexGuard::unlocked(&mut state, || {
                for listener in &listeners {
                    listener.on_underflow();
                }
            });
            if !state.open {
                return Err(PipeError::Closed);
            }
            if state.buffer.occupied_len() > 0 || state.eof {
                continue;
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(0);
            }
            let slice = self.wait.poll_interval.min(deadline - now);
            self.data_avail.wait_for(&mut state, slice);
            if !state.open {
                return Err(PipeError::Closed);
            }
        }
    }

    /// Writes all of `data`, blocking while the buffer lacks space
    ///
    /// Copies what fits immediately and waits in slices for the rest,
    /// firing overflow listeners once per slice while the buffer stays full.
    /// Fails with `PipeError::Timeout` when the budget elapses with bytes
    /// still unwritten (bytes already accepted stay buffered) and with
    /// `PipeError::Closed` if the pipe closes before or during the wait.
    pub fn write(&self, data: &[u8], timeout: Option<Duration>) -> Result<(), PipeError> {
        let start = Instant::now();
        let deadline = start + self.wait.effective_timeout(timeout);
        let timeout_ms = timeout.map(|t| t.as_millis() as u64);

        let mut state = self.state.lock();
        let mut written = 0;

        loop {
            if !state.open {
                return Err(PipeError::Closed);
            }

            if written < data.len() {
                let n = state.buffer.push_slice(&data[written..]);
                if n > 0 {
                    written += n;
                    state.check_threshold();
                    self.data_avail.notify_all();
                }
            }
            if written == data.len() {
                return Ok(());
            }

            // Full with bytes still pending: let listeners react, then wait
            // one slice for the reader.
            let listeners = state.live_listeners();
            MutexGuard::unlocked(&mut state, || {
                for listener in &listeners {
                    listener.on_overflow();
                }
            });
            if !state.open {
                return Err(PipeError::Closed);
            }
            if state.buffer.vacant_len() > 0 {
                continue;
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(PipeError::Timeout {
                    elapsed_ms: start.elapsed().as_millis() as u64,
                    timeout_ms,
                });
            }
            let slice = self.wait.poll_interval.min(deadline - now);
            self.space_avail.wait_for(&mut state, slice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipe(capacity: Size) -> Pipe {
        Pipe::new("pipe://test/".to_string(), capacity, WaitConfig::fast())
    }

    #[test]
    fn test_write_then_read_fifo() {
        let p = pipe(64);
        p.write(b"ABCDEFGHIJ", Some(Duration::ZERO)).unwrap();
        assert_eq!(p.available_read(), 10);

        let mut buf = [0u8; 4];
        let n = p.read(&mut buf, Some(Duration::ZERO)).unwrap();
        assert_eq!(n, 4);
        assert_eq!(&buf, b"ABCD");
        assert_eq!(p.available_read(), 6);

        let mut rest = [0u8; 16];
        let n = p.read(&mut rest, Some(Duration::ZERO)).unwrap();
        assert_eq!(&rest[..n], b"EFGHIJ");
    }

    #[test]
    fn test_eof_drains_then_terminates() {
        let p = pipe(64);
        p.write(b"tail!", Some(Duration::ZERO)).unwrap();
        p.set_eof();
        assert!(p.is_eof());

        let mut buf = [0u8; 16];
        let n = p.read(&mut buf, Some(Duration::from_secs(5))).unwrap();
        assert_eq!(&buf[..n], b"tail!");

        // Drained and at end of stream: returns 0 without blocking
        let start = Instant::now();
        assert_eq!(p.read(&mut buf, Some(Duration::from_secs(5))).unwrap(), 0);
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_read_after_close_is_error() {
        let p = pipe(64);
        p.close();
        let mut buf = [0u8; 4];
        assert!(matches!(
            p.read(&mut buf, Some(Duration::ZERO)),
            Err(PipeError::Closed)
        ));
        assert!(matches!(
            p.write(b"x", Some(Duration::ZERO)),
            Err(PipeError::Closed)
        ));
    }

    #[test]
    fn test_write_timeout_keeps_partial_bytes() {
        let p = pipe(16);
        let result = p.write(&[7u8; 20], Some(Duration::ZERO));
        assert!(matches!(result, Err(PipeError::Timeout { .. })));
        // What fit stays buffered
        assert_eq!(p.available_read(), 16);
    }

    #[test]
    fn test_flush_discards_buffered_bytes() {
        let p = pipe(64);
        p.write(b"stale data", Some(Duration::ZERO)).unwrap();
        p.flush();
        assert!(p.is_empty());

        // Flush past EOF is a no-op
        p.write(b"keep", Some(Duration::ZERO)).unwrap();
        p.set_eof();
        p.flush();
        assert_eq!(p.available_read(), 4);
    }

    #[test]
    fn test_open_threshold_gates_reads() {
        let p = pipe(64);
        p.set_open_threshold(8);

        p.write(b"1234", Some(Duration::ZERO)).unwrap();
        let mut buf = [0u8; 16];
        // Below threshold: the gate holds the read back until timeout
        assert_eq!(p.read(&mut buf, Some(Duration::from_millis(30))).unwrap(), 0);

        p.write(b"5678", Some(Duration::ZERO)).unwrap();
        let n = p.read(&mut buf, Some(Duration::from_secs(1))).unwrap();
        assert_eq!(&buf[..n], b"12345678");

        // One-shot: the gate stays open once reached
        p.write(b"x", Some(Duration::ZERO)).unwrap();
        assert_eq!(p.read(&mut buf, Some(Duration::ZERO)).unwrap(), 1);
    }

    #[test]
    fn test_eof_bypasses_armed_gate() {
        let p = pipe(64);
        p.set_open_threshold(1024);
        p.write(b"short", Some(Duration::ZERO)).unwrap();
        p.set_eof();

        let mut buf = [0u8; 16];
        let n = p.read(&mut buf, Some(Duration::from_secs(1))).unwrap();
        assert_eq!(&buf[..n], b"short");
        assert_eq!(p.read(&mut buf, Some(Duration::from_secs(1))).unwrap(), 0);
    }

    #[test]
    fn test_zero_sized_read() {
        let p = pipe(64);
        p.write(b"data", Some(Duration::ZERO)).unwrap();
        let mut empty = [0u8; 0];
        assert_eq!(p.read(&mut empty, Some(Duration::ZERO)).unwrap(), 0);
        assert_eq!(p.available_read(), 4);
    }
}
