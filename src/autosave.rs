//! Debounced draft persistence.
//!
//! Each tracked change restarts the timer; once it expires the latest form
//! snapshot is written through [`ClientStore::save_draft`]. Dropping the
//! instance flushes whatever is still pending.

use crate::client_store::{ClientStore, DraftKind};
use crate::notices::Notices;
use chrono::{Local, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

struct Pending<T> {
    fields: BTreeSet<String>,
    snapshot: Option<T>,
    timer: Option<JoinHandle<()>>,
    /// Bumped every time the timer is re-armed; a timer only writes if it is still the latest.
    generation: u64,
}

struct Shared<T> {
    store: ClientStore,
    kind: DraftKind,
    notices: Notices,
    pending: Mutex<Pending<T>>,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Pending<T>> {
        // A poisoned lock only means a writer panicked mid-update; the data is still usable.
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T: Serialize> Shared<T> {
    /// Writes the pending snapshot. `generation` restricts the write to one armed timer.
    fn write_pending(&self, generation: Option<u64>) -> bool {
        let snapshot = {
            let mut pending = self.lock();
            if let Some(generation) = generation {
                if pending.generation != generation {
                    return false;
                }
            }
            if pending.fields.is_empty() {
                return false;
            }
            pending.fields.clear();
            pending.timer = None;
            pending.snapshot.take()
        };
        let Some(snapshot) = snapshot else {
            return false;
        };

        match self.store.save_draft(self.kind, &snapshot, Utc::now()) {
            Ok(()) => {
                let at = Local::now().format("%H:%M:%S");
                tracing::debug!("Draft {:?} saved at {}", self.kind, at);
                self.notices
                    .success("Rascunho salvo", format!("Salvo automaticamente às {}", at));
                true
            }
            Err(e) => {
                tracing::warn!("Failed to save {:?} draft: {}", self.kind, e);
                false
            }
        }
    }
}

pub struct AutoSave<T: Serialize + Send + 'static> {
    shared: Arc<Shared<T>>,
    debounce: Duration,
}

impl<T: Serialize + Send + 'static> AutoSave<T> {
    pub fn new(store: ClientStore, kind: DraftKind, debounce: Duration, notices: Notices) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                kind,
                notices,
                pending: Mutex::new(Pending {
                    fields: BTreeSet::new(),
                    snapshot: None,
                    timer: None,
                    generation: 0,
                }),
            }),
            debounce,
        }
    }

    pub fn kind(&self) -> DraftKind {
        self.shared.kind
    }

    /// Reads the stored draft, if any.
    pub fn load(&self) -> Option<T>
    where
        T: DeserializeOwned,
    {
        self.shared.store.load_draft(self.shared.kind)
    }

    /// Records a change to `field` and re-arms the debounce timer with `snapshot`.
    ///
    /// Outside a tokio runtime the snapshot is written immediately.
    pub fn track(&self, field: &str, snapshot: T) {
        let runtime = tokio::runtime::Handle::try_current();
        let mut pending = self.shared.lock();
        pending.fields.insert(field.to_string());
        pending.snapshot = Some(snapshot);
        pending.generation += 1;
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }

        let Ok(runtime) = runtime else {
            drop(pending);
            self.shared.write_pending(None);
            return;
        };

        let generation = pending.generation;
        let shared = Arc::clone(&self.shared);
        let debounce = self.debounce;
        pending.timer = Some(runtime.spawn(async move {
            tokio::time::sleep(debounce).await;
            shared.write_pending(Some(generation));
        }));
    }

    pub fn pending_fields(&self) -> Vec<String> {
        self.shared.lock().fields.iter().cloned().collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.shared.lock().fields.is_empty()
    }

    /// Writes pending changes now. Returns true if a draft was written.
    pub fn flush(&self) -> bool {
        if let Some(timer) = self.shared.lock().timer.take() {
            timer.abort();
        }
        self.shared.write_pending(None)
    }

    /// Drops pending changes, cancels the timer and removes the stored draft.
    pub fn discard(&self) {
        {
            let mut pending = self.shared.lock();
            pending.fields.clear();
            pending.snapshot = None;
            pending.generation += 1;
            if let Some(timer) = pending.timer.take() {
                timer.abort();
            }
        }
        if let Err(e) = self.shared.store.clear_draft(self.shared.kind) {
            tracing::warn!("Failed to clear {:?} draft: {}", self.shared.kind, e);
        }
    }
}

impl<T: Serialize + Send + 'static> Drop for AutoSave<T> {
    fn drop(&mut self) {
        if self.flush() {
            tracing::debug!("Flushed {:?} draft on teardown", self.shared.kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RegistrationForm;
    use crate::storage::MemoryStorage;

    fn form(nome: &str) -> RegistrationForm {
        RegistrationForm {
            nome: nome.to_string(),
            ..Default::default()
        }
    }

    fn autosave() -> (ClientStore, AutoSave<RegistrationForm>) {
        let store = ClientStore::open(Arc::new(MemoryStorage::new()));
        let autosave = AutoSave::new(
            store.clone(),
            DraftKind::AssistedUser,
            Duration::from_millis(2000),
            Notices::disabled(),
        );
        (store, autosave)
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_after_debounce() {
        let (store, autosave) = autosave();
        autosave.track("nome", form("Maria"));
        assert_eq!(autosave.pending_fields(), vec!["nome".to_string()]);

        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert!(store.draft_saved_at(DraftKind::AssistedUser).is_none());

        tokio::time::sleep(Duration::from_millis(2)).await;
        let draft: Option<RegistrationForm> = store.load_draft(DraftKind::AssistedUser);
        assert_eq!(draft, Some(form("Maria")));
        assert!(!autosave.has_pending());
    }

    #[test]
    fn test_flush_on_drop_without_runtime() {
        let (store, autosave) = autosave();
        autosave.track("nome", form("Ana"));
        drop(autosave);
        let draft: Option<RegistrationForm> = store.load_draft(DraftKind::AssistedUser);
        assert_eq!(draft, Some(form("Ana")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_discard_cancels_timer_and_removes_draft() {
        let (store, autosave) = autosave();
        autosave.track("nome", form("Maria"));
        assert!(autosave.flush());

        autosave.track("cpf", form("Maria"));
        autosave.discard();
        tokio::time::sleep(Duration::from_millis(3000)).await;

        let draft: Option<RegistrationForm> = store.load_draft(DraftKind::AssistedUser);
        assert_eq!(draft, None);
        assert!(!autosave.has_pending());
    }
}
