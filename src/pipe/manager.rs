/*!
 * Pipes Manager
 * Process-wide registry owning pipe naming and lifetime
 */

use super::pipe::Pipe;
use super::types::{PipeError, PipeStats};
use crate::core::config::WaitConfig;
use crate::core::limits::{DEFAULT_PIPE_CAPACITY, MAX_PIPE_CAPACITY};
use crate::core::types::Size;
use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

static GLOBAL: OnceLock<Arc<PipesManager>> = OnceLock::new();

/// Pipes manager
///
/// Maps pipe names to live pipes and enforces at-most-one pipe per name.
/// The registry entry and every handle returned by `create`/`open` share one
/// `Arc<Pipe>`; `close` releases the caller's handle and destroys the pipe
/// exactly when the registry holds the last reference. The strong count is
/// checked inside `remove_if`, whose predicate runs under the map shard's
/// write lock, so no concurrent `open` can clone the handle mid-check.
pub struct PipesManager {
    pipes: DashMap<String, Arc<Pipe>, RandomState>,
    next_id: AtomicU64,
    wait: WaitConfig,
}

impl PipesManager {
    pub fn new() -> Self {
        Self::with_config(WaitConfig::default())
    }

    pub fn with_config(wait: WaitConfig) -> Self {
        Self {
            pipes: DashMap::with_hasher(RandomState::new()),
            next_id: AtomicU64::new(1),
            wait,
        }
    }

    /// The process-wide default instance, lazily constructed
    pub fn global() -> Arc<PipesManager> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new())))
    }

    /// Returns a fresh, never-reused pipe name
    pub fn unique_name(&self) -> String {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        format!("pipe://{}/", id)
    }

    /// Creates and registers a new pipe
    ///
    /// An empty name is replaced with `unique_name()`. The caller becomes the
    /// first holder and must eventually release the handle via `close`.
    /// Capacity defaults to `DEFAULT_PIPE_CAPACITY` and is clamped to
    /// `MAX_PIPE_CAPACITY`.
    pub fn create(&self, name: &str, capacity: Option<Size>) -> Result<Arc<Pipe>, PipeError> {
        let name = if name.is_empty() {
            self.unique_name()
        } else {
            name.to_owned()
        };
        let capacity = capacity
            .unwrap_or(DEFAULT_PIPE_CAPACITY)
            .min(MAX_PIPE_CAPACITY);
        if capacity == 0 {
            return Err(PipeError::InvalidOperation(
                "pipe capacity must be non-zero".to_string(),
            ));
        }

        match self.pipes.entry(name) {
            Entry::Occupied(entry) => Err(PipeError::AlreadyExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                let pipe = Arc::new(Pipe::new(entry.key().clone(), capacity, self.wait));
                entry.insert(Arc::clone(&pipe));
                info!(
                    "Created pipe {} (capacity: {} bytes)",
                    pipe.name(),
                    capacity
                );
                Ok(pipe)
            }
        }
    }

    /// Opens an existing pipe by name, adding a holder
    ///
    /// Absent names return `None`; that is expected and recoverable (a reader
    /// may race a writer that has not created the pipe yet).
    pub fn open(&self, name: &str) -> Option<Arc<Pipe>> {
        let pipe = self.pipes.get(name).map(|entry| Arc::clone(entry.value()));
        if pipe.is_none() {
            debug!("Open failed, no pipe named {}", name);
        }
        pipe
    }

    /// Releases one holder's handle
    ///
    /// When the registry is left holding the last reference, the entry is
    /// removed, the pipe is closed (waking any blocked readers and writers),
    /// and the pipe is destroyed.
    pub fn close(&self, pipe: Arc<Pipe>) {
        let name = pipe.name().to_owned();
        // Strong count 2 here means registry + the handle being released
        let removed = self.pipes.remove_if(&name, |_, registered| {
            Arc::ptr_eq(registered, &pipe) && Arc::strong_count(registered) == 2
        });
        drop(pipe);
        if let Some((_, last)) = removed {
            last.close();
            info!("Destroyed pipe {} (last holder released)", name);
        } else {
            debug!("Released one handle on pipe {}", name);
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.pipes.contains_key(name)
    }

    /// Snapshot of a registered pipe's state, or `None` if the name is unknown
    pub fn stats(&self, name: &str) -> Option<PipeStats> {
        self.pipes.get(name).map(|entry| {
            let pipe = entry.value();
            PipeStats {
                name: pipe.name().to_owned(),
                capacity: pipe.capacity(),
                buffered: pipe.available_read(),
                holders: Arc::strong_count(pipe).saturating_sub(1),
                closed: !pipe.is_open(),
                eof: pipe.is_eof(),
            }
        })
    }

    /// Number of currently registered pipes
    pub fn len(&self) -> Size {
        self.pipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty()
    }

    /// Names of all currently registered pipes, for diagnostics
    pub fn pipe_names(&self) -> Vec<String> {
        self.pipes.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl Default for PipesManager {
    fn default() -> Self {
        Self::new()
    }
}
