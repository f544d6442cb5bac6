//! One-time starter grants.
//!
//! The in-memory store lives as long as the process and is never evicted, so
//! a restart forgets every session that was already granted.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::ledger::Ledger;

pub const STARTER_GRANT_AMOUNT: u32 = 10;
const STARTER_GRANT_MEMO: &str = "welcome_bonus";

/// Remembers which sessions already received their grant
#[async_trait]
pub trait GrantStore: Send + Sync {
    async fn contains(&self, session_id: &str) -> bool;

    /// Atomically insert; `false` means the id was already present.
    async fn insert_if_absent(&self, session_id: &str) -> bool;
}

#[derive(Debug, Default)]
pub struct MemoryGrantStore {
    sessions: Mutex<HashSet<String>>,
}

#[async_trait]
impl GrantStore for MemoryGrantStore {
    async fn contains(&self, session_id: &str) -> bool {
        self.sessions
            .lock()
            .map(|s| s.contains(session_id))
            .unwrap_or_else(|poisoned| poisoned.into_inner().contains(session_id))
    }

    async fn insert_if_absent(&self, session_id: &str) -> bool {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.insert(session_id.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantOutcome {
    pub granted: bool,
    pub amount: u32,
}

impl GrantOutcome {
    fn denied() -> Self {
        Self {
            granted: false,
            amount: 0,
        }
    }
}

#[derive(Clone)]
pub struct StarterGrantLedger {
    store: Arc<dyn GrantStore>,
    ledger: Arc<dyn Ledger>,
}

impl StarterGrantLedger {
    pub fn new(store: Arc<dyn GrantStore>, ledger: Arc<dyn Ledger>) -> Self {
        Self { store, ledger }
    }

    /// Grant the starter bonus at most once per session.
    ///
    /// The session is recorded before the ledger is credited, so concurrent
    /// duplicates cannot both win. A failed credit still counts as granted.
    pub async fn grant(&self, session_id: &str) -> GrantOutcome {
        if self.store.contains(session_id).await {
            return GrantOutcome::denied();
        }
        if !self.store.insert_if_absent(session_id).await {
            return GrantOutcome::denied();
        }

        if let Err(e) = self.ledger.earn(STARTER_GRANT_AMOUNT, STARTER_GRANT_MEMO).await {
            tracing::debug!(reason = e.kind(), "Starter grant not credited: {}", e);
        }

        tracing::info!("Starter grant issued");
        GrantOutcome {
            granted: true,
            amount: STARTER_GRANT_AMOUNT,
        }
    }
}
