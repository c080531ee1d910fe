//! The registry handle: working state, committed snapshot, and the
//! process-wide shared instance.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use lanwatch_fusion::{Classifier, PatternClassifier};
use tokio::sync::{Mutex, MutexGuard, OnceCell, RwLock};

use crate::error::Result;
use crate::store::{self, RegistryDocument};

static SHARED: OnceCell<Arc<Registry>> = OnceCell::const_new();

/// Mutable state owned by the single writer.
pub(crate) struct WorkingState {
    pub(crate) doc: RegistryDocument,
    /// Mutations not yet on disk.
    pub(crate) dirty: bool,
}

/// Durable per-MAC device registry.
///
/// Writers serialize on one async mutex around read-mutate-persist. Readers
/// never take that mutex: they clone the `Arc` of the last document that
/// reached disk, so a failed persist is invisible to them.
pub struct Registry {
    path: PathBuf,
    state: Mutex<WorkingState>,
    committed: RwLock<Arc<RegistryDocument>>,
    pub(crate) classifier: Arc<dyn Classifier>,
}

impl Registry {
    /// Open (or create) the registry stored at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let doc = store::load(&path)?;
        Ok(Self {
            path,
            committed: RwLock::new(Arc::new(doc.clone())),
            state: Mutex::new(WorkingState { doc, dirty: false }),
            classifier: Arc::new(PatternClassifier::default()),
        })
    }

    /// Replace the device classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// The process-wide registry.
    ///
    /// Opened from `path` on the first call; later calls return the same
    /// instance and ignore their argument.
    pub async fn shared(path: impl AsRef<Path>) -> Result<Arc<Registry>> {
        SHARED
            .get_or_try_init(|| async { Registry::open(path.as_ref()).map(Arc::new) })
            .await
            .cloned()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The last successfully persisted document.
    pub async fn snapshot(&self) -> Arc<RegistryDocument> {
        self.committed.read().await.clone()
    }

    /// Whether in-memory mutations are waiting for a successful persist.
    pub async fn has_pending_writes(&self) -> bool {
        self.state.lock().await.dirty
    }

    /// Retry a failed persist, if one is pending.
    pub async fn flush(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.dirty {
            return Ok(());
        }
        self.persist_locked(&mut state).await
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, WorkingState> {
        self.state.lock().await
    }

    /// Persist the working document and publish it to readers. On failure
    /// the state stays dirty and readers keep the previous snapshot.
    pub(crate) async fn persist_locked(&self, state: &mut WorkingState) -> Result<()> {
        state.doc.last_updated = Utc::now();
        match store::save(&self.path, &state.doc) {
            Ok(()) => {
                state.dirty = false;
                *self.committed.write().await = Arc::new(state.doc.clone());
                Ok(())
            }
            Err(e) => {
                state.dirty = true;
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Registry persist failed, keeping changes in memory for retry"
                );
                Err(e)
            }
        }
    }
}
