/// Debounced draft persistence tests
/// Runs on paused tokio time with a storage backend that counts writes
use maos_amigas_client::autosave::AutoSave;
use maos_amigas_client::client_store::{ClientStore, DraftKind};
use maos_amigas_client::config::Config;
use maos_amigas_client::context::AppContext;
use maos_amigas_client::errors::AppError;
use maos_amigas_client::models::{Field, RegistrationForm};
use maos_amigas_client::notices::{NoticeLevel, Notices};
use maos_amigas_client::registration::{RegistrationController, RegistrationKind};
use maos_amigas_client::storage::{KeyValueStore, MemoryStorage};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Memory storage that counts `set` calls per key and can be told to fail.
#[derive(Default)]
struct CountingStorage {
    inner: MemoryStorage,
    writes: Mutex<HashMap<String, usize>>,
    fail_writes: bool,
}

impl CountingStorage {
    fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Default::default()
        }
    }

    fn writes(&self, key: &str) -> usize {
        self.writes.lock().unwrap().get(key).copied().unwrap_or(0)
    }
}

impl KeyValueStore for CountingStorage {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        if self.fail_writes {
            return Err(AppError::StorageError("quota exceeded".to_string()));
        }
        *self.writes.lock().unwrap().entry(key.to_string()).or_default() += 1;
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        self.inner.remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, AppError> {
        self.inner.keys()
    }
}

fn form(nome: &str) -> RegistrationForm {
    RegistrationForm {
        nome: nome.to_string(),
        ..Default::default()
    }
}

const DRAFT_KEY: &str = "cadastro_usuario_assistido_form_data";

#[cfg(test)]
mod debounce_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_single_write_after_quiet_period() {
        let storage = Arc::new(CountingStorage::default());
        let store = ClientStore::open(storage.clone());
        let autosave = AutoSave::new(
            store.clone(),
            DraftKind::AssistedUser,
            Duration::from_millis(2000),
            Notices::disabled(),
        );

        autosave.track("nome", form("Maria"));
        tokio::time::sleep(Duration::from_millis(2100)).await;

        assert_eq!(storage.writes(DRAFT_KEY), 1);
        assert!(store.draft_saved_at(DraftKind::AssistedUser).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_changes_coalesce_into_one_write() {
        let storage = Arc::new(CountingStorage::default());
        let store = ClientStore::open(storage.clone());
        let autosave = AutoSave::new(
            store.clone(),
            DraftKind::AssistedUser,
            Duration::from_millis(2000),
            Notices::disabled(),
        );

        autosave.track("nome", form("Mar"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        autosave.track("nome", form("Maria"));
        autosave.track("cpf", form("Maria"));

        // Two seconds after the first change, but only 1.5 s after the last.
        tokio::time::sleep(Duration::from_millis(1600)).await;
        assert_eq!(storage.writes(DRAFT_KEY), 0);
        assert_eq!(
            autosave.pending_fields(),
            vec!["cpf".to_string(), "nome".to_string()]
        );

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(storage.writes(DRAFT_KEY), 1);
        let draft: Option<RegistrationForm> = store.load_draft(DraftKind::AssistedUser);
        assert_eq!(draft, Some(form("Maria")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_notice_on_save() {
        let storage = Arc::new(MemoryStorage::new());
        let (notices, mut rx) = Notices::channel();
        let autosave = AutoSave::new(
            ClientStore::open(storage),
            DraftKind::Volunteer,
            Duration::from_millis(2000),
            notices,
        );

        autosave.track("profissao", form("Ana"));
        tokio::time::sleep(Duration::from_millis(2001)).await;

        let notice = rx.try_recv().unwrap();
        assert_eq!(notice.level, NoticeLevel::Success);
        assert_eq!(notice.title, "Rascunho salvo");
        assert!(notice
            .description
            .unwrap()
            .starts_with("Salvo automaticamente às "));
    }

    #[tokio::test(start_paused = true)]
    async fn test_storage_failure_is_swallowed() {
        let storage = Arc::new(CountingStorage::failing());
        let (notices, mut rx) = Notices::channel();
        let autosave = AutoSave::new(
            ClientStore::open(storage),
            DraftKind::AssistedUser,
            Duration::from_millis(2000),
            notices,
        );

        autosave.track("nome", form("Maria"));
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert!(rx.try_recv().is_err());
        assert!(!autosave.flush());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_flushes_pending_change() {
        let storage = Arc::new(CountingStorage::default());
        let store = ClientStore::open(storage.clone());
        let autosave = AutoSave::new(
            store.clone(),
            DraftKind::AssistedUser,
            Duration::from_millis(2000),
            Notices::disabled(),
        );

        autosave.track("nome", form("Maria"));
        drop(autosave);

        assert_eq!(storage.writes(DRAFT_KEY), 1);
        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(storage.writes(DRAFT_KEY), 1);
    }
}

#[cfg(test)]
mod controller_draft_tests {
    use super::*;

    fn context(storage: Arc<dyn KeyValueStore>) -> AppContext {
        let config = Config {
            api_base_url: "http://127.0.0.1:9".to_string(),
            viacep_base_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        };
        AppContext::new(config, storage, Notices::disabled()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_is_saved_once_after_pause() {
        let storage = Arc::new(CountingStorage::default());
        let ctx = context(storage.clone());
        let ctl = RegistrationController::new(RegistrationKind::AssistedUser, &ctx);

        ctl.set_field(Field::Nome, "Maria").await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        ctl.set_field(Field::Telefone, "11987654321").await;
        assert_eq!(
            ctl.pending_autosave_fields(),
            vec!["nome".to_string(), "telefone".to_string()]
        );

        tokio::time::sleep(Duration::from_millis(2001)).await;

        assert_eq!(storage.writes(DRAFT_KEY), 1);
        let draft: RegistrationForm = ctx.store.load_draft(DraftKind::AssistedUser).unwrap();
        assert_eq!(draft.nome, "Maria");
        assert_eq!(draft.telefone, "(11) 98765-4321");
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_restores_saved_draft() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStorage::new());
        let ctx = context(storage);
        ctx.store
            .save_draft(
                DraftKind::AssistedUser,
                &RegistrationForm {
                    nome: "Maria Souza".to_string(),
                    cpf: "111.444.777-35".to_string(),
                    ..Default::default()
                },
                chrono::Utc::now(),
            )
            .unwrap();

        let ctl = RegistrationController::new(RegistrationKind::AssistedUser, &ctx);
        ctl.mount(None).await;

        assert_eq!(ctl.form().nome, "Maria Souza");
        assert_eq!(ctl.form().cpf, "111.444.777-35");
        assert!(!ctl.is_locked(Field::Cpf));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_draft() {
        let storage = Arc::new(CountingStorage::default());
        let ctx = context(storage.clone());
        let ctl = RegistrationController::new(RegistrationKind::AssistedUser, &ctx);

        ctl.set_field(Field::Nome, "Maria").await;
        tokio::time::sleep(Duration::from_millis(2001)).await;
        ctl.reset();

        assert!(ctx.store.draft_saved_at(DraftKind::AssistedUser).is_none());
        assert_eq!(ctl.form(), RegistrationForm::default());
    }
}
