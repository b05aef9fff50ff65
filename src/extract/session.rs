//! Process-wide session credential with a single-writer recovery path.

use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::info;

use crate::models::SessionCredential;

#[derive(Debug, Default)]
struct SessionState {
    /// Bumped on every commit; pages remember the generation they started with.
    generation: u64,
    credential: Option<SessionCredential>,
}

/// Holds the credential replayed into every new page.
///
/// Reads are concurrent. Writes only happen through [`RecoveryGuard::commit`],
/// and only one guard exists at a time, so concurrent login challenges are
/// serialized instead of racing.
#[derive(Debug, Default)]
pub struct SessionStore {
    state: RwLock<SessionState>,
    recovery: Mutex<()>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a credential provided by the environment.
    pub fn with_credential(credential: SessionCredential) -> Self {
        Self {
            state: RwLock::new(SessionState {
                generation: 1,
                credential: Some(credential),
            }),
            recovery: Mutex::new(()),
        }
    }

    /// Current generation and credential, read together.
    pub async fn snapshot(&self) -> (u64, Option<SessionCredential>) {
        let state = self.state.read().await;
        (state.generation, state.credential.clone())
    }

    pub async fn generation(&self) -> u64 {
        self.state.read().await.generation
    }

    /// Wait for exclusive access to the authentication transition.
    pub async fn begin_recovery(&self) -> RecoveryGuard<'_> {
        RecoveryGuard {
            store: self,
            _lock: self.recovery.lock().await,
        }
    }
}

/// Exclusive right to replace the session credential.
pub struct RecoveryGuard<'a> {
    store: &'a SessionStore,
    _lock: MutexGuard<'a, ()>,
}

impl RecoveryGuard<'_> {
    /// Whether another task committed a credential after `generation` was read.
    pub async fn refreshed_since(&self, generation: u64) -> bool {
        self.store.generation().await != generation
    }

    /// Store a freshly captured credential.
    pub async fn commit(self, credential: SessionCredential) -> u64 {
        let mut state = self.store.state.write().await;
        state.generation += 1;
        info!(
            "Stored session credential with {} cookie(s) (generation {})",
            credential.len(),
            state.generation
        );
        state.credential = Some(credential);
        state.generation
    }
}
