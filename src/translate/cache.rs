//! Persistent translation cache.
//! Key: the exact tagged string. No TTL, no eviction.
//! The in-memory map answers every lookup; a background writer task pushes
//! new entries to the durable backend without blocking the request path.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Durable storage behind the in-memory cache.
pub trait CacheBackend: Send + 'static {
    /// Read every stored entry. Called once, at startup.
    fn load(&mut self) -> Result<HashMap<String, String>, CacheError>;

    /// Persist a batch of new entries, in arrival order.
    fn store(&mut self, batch: &[(String, String)]) -> Result<(), CacheError>;
}

#[derive(Debug)]
pub enum CacheError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Sqlite(rusqlite::Error),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Io(e) => write!(f, "cache IO error: {e}"),
            CacheError::Parse(e) => write!(f, "cache parse error: {e}"),
            CacheError::Sqlite(e) => write!(f, "cache SQLite error: {e}"),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<std::io::Error> for CacheError {
    fn from(e: std::io::Error) -> Self {
        CacheError::Io(e)
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Parse(e)
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        CacheError::Sqlite(e)
    }
}

enum WriterMsg {
    Put(String, String),
    Flush(oneshot::Sender<()>),
}

pub struct TranslationCache {
    entries: RwLock<HashMap<String, String>>,
    tx: mpsc::UnboundedSender<WriterMsg>,
}

impl TranslationCache {
    /// Load existing entries from `backend` and start the writer task.
    /// A failed load is logged and the cache starts empty.
    /// Must be called from within a Tokio runtime.
    pub fn open(mut backend: Box<dyn CacheBackend>) -> Arc<Self> {
        let entries = match backend.load() {
            Ok(entries) => {
                info!(entries = entries.len(), "translation cache loaded");
                entries
            }
            Err(e) => {
                warn!(error = %e, "translation cache load failed, starting empty");
                HashMap::new()
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(writer_loop(rx, backend));

        Arc::new(Self {
            entries: RwLock::new(entries),
            tx,
        })
    }

    /// Look up the translation for an exact tagged string.
    pub fn get(&self, tagged: &str) -> Option<String> {
        self.entries.read().get(tagged).cloned()
    }

    /// Insert (or overwrite) an entry and queue it for persistence. Never blocks on I/O.
    /// The send happens under the write lock so the writer sees puts in map order.
    pub fn put(&self, tagged: String, text: String) {
        let mut entries = self.entries.write();
        entries.insert(tagged.clone(), text.clone());
        if let Err(e) = self.tx.send(WriterMsg::Put(tagged, text)) {
            warn!(error = %e, "cache writer channel closed, entry kept in memory only");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Wait until every entry queued before this call has been written (or failed).
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(WriterMsg::Flush(ack)).is_err() {
            return;
        }
        let _ = done.await;
    }
}

/// Background writer: drains queued entries, writes them as one batch on the
/// blocking pool, then acknowledges any pending flush requests.
async fn writer_loop(mut rx: mpsc::UnboundedReceiver<WriterMsg>, mut backend: Box<dyn CacheBackend>) {
    let mut batch: Vec<(String, String)> = Vec::new();
    let mut waiters: Vec<oneshot::Sender<()>> = Vec::new();

    while let Some(msg) = rx.recv().await {
        collect(msg, &mut batch, &mut waiters);
        while let Ok(msg) = rx.try_recv() {
            collect(msg, &mut batch, &mut waiters);
        }

        if !batch.is_empty() {
            let pending = std::mem::take(&mut batch);
            let count = pending.len();
            let joined = tokio::task::spawn_blocking(move || {
                let result = backend.store(&pending);
                (backend, result)
            })
            .await;

            match joined {
                Ok((returned, result)) => {
                    backend = returned;
                    match result {
                        Ok(()) => debug!(count, "cache batch persisted"),
                        Err(e) => warn!(error = %e, count, "cache persist failed"),
                    }
                }
                Err(e) => {
                    error!(error = %e, "cache writer panicked, persistence stopped");
                    return;
                }
            }
        }

        for ack in waiters.drain(..) {
            let _ = ack.send(());
        }
    }

    info!("cache writer exiting (channel closed)");
}

fn collect(msg: WriterMsg, batch: &mut Vec<(String, String)>, waiters: &mut Vec<oneshot::Sender<()>>) {
    match msg {
        WriterMsg::Put(tagged, text) => batch.push((tagged, text)),
        WriterMsg::Flush(ack) => waiters.push(ack),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::json_cache::JsonFileBackend;
    use parking_lot::Mutex;

    /// Backend that records stored batches in memory.
    #[derive(Clone, Default)]
    struct RecordingBackend {
        initial: HashMap<String, String>,
        fail_load: bool,
        fail_store: bool,
        stored: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl CacheBackend for RecordingBackend {
        fn load(&mut self) -> Result<HashMap<String, String>, CacheError> {
            if self.fail_load {
                return Err(CacheError::Io(std::io::Error::other("corrupt")));
            }
            Ok(self.initial.clone())
        }

        fn store(&mut self, batch: &[(String, String)]) -> Result<(), CacheError> {
            if self.fail_store {
                return Err(CacheError::Io(std::io::Error::other("disk full")));
            }
            self.stored.lock().extend_from_slice(batch);
            Ok(())
        }
    }

    #[tokio::test]
    async fn serves_loaded_entries() {
        let backend = RecordingBackend {
            initial: HashMap::from([("[greet]".to_string(), "Hello".to_string())]),
            ..Default::default()
        };
        let cache = TranslationCache::open(Box::new(backend));
        assert_eq!(cache.get("[greet]").as_deref(), Some("Hello"));
        assert_eq!(cache.get("[other]"), None);
    }

    #[tokio::test]
    async fn failed_load_starts_empty() {
        let backend = RecordingBackend {
            fail_load: true,
            ..Default::default()
        };
        let cache = TranslationCache::open(Box::new(backend));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn put_is_visible_immediately_and_persisted_after_flush() {
        let backend = RecordingBackend::default();
        let stored = Arc::clone(&backend.stored);
        let cache = TranslationCache::open(Box::new(backend));

        cache.put("[a]".into(), "A".into());
        cache.put("[b]".into(), "B".into());
        assert_eq!(cache.get("[a]").as_deref(), Some("A"));

        cache.flush().await;
        assert_eq!(
            *stored.lock(),
            vec![
                ("[a]".to_string(), "A".to_string()),
                ("[b]".to_string(), "B".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn same_key_last_writer_wins() {
        let backend = RecordingBackend::default();
        let cache = TranslationCache::open(Box::new(backend));
        cache.put("[a]".into(), "first".into());
        cache.put("[a]".into(), "second".into());
        assert_eq!(cache.get("[a]").as_deref(), Some("second"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn persist_failure_keeps_memory_authoritative() {
        let backend = RecordingBackend {
            fail_store: true,
            ..Default::default()
        };
        let cache = TranslationCache::open(Box::new(backend));
        cache.put("[a]".into(), "A".into());
        cache.flush().await;
        assert_eq!(cache.get("[a]").as_deref(), Some("A"));

        // Writer keeps running after a failed batch.
        cache.put("[b]".into(), "B".into());
        cache.flush().await;
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_puts_all_reach_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let cache = TranslationCache::open(Box::new(JsonFileBackend::new(&path)));

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    cache.put(format!("[k{i}]"), format!("v{i}"));
                    cache.put("[shared]".into(), format!("s{i}"));
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        cache.flush().await;

        assert_eq!(cache.len(), 33);
        let on_disk = JsonFileBackend::new(&path).load().unwrap();
        assert_eq!(on_disk.len(), 33);
        for i in 0..32 {
            assert_eq!(on_disk[&format!("[k{i}]")], format!("v{i}"));
        }
        assert_eq!(cache.get("[shared]").as_ref(), on_disk.get("[shared]"));
    }
}
