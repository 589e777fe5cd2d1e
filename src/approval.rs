//! Social-worker approval panel.
//!
//! Holds the pending-application list and the three mutually exclusive
//! dialogs (details, approve, reject) over one selected application.
//! Decisions patch the local list instead of re-fetching it.

use crate::backend::BackendClient;
use crate::config::Config;
use crate::context::AppContext;
use crate::errors::AppError;
use crate::models::{ApplicationStatus, CandidateType, PendingApplication, RecordId};
use crate::navigation::Route;
use crate::notices::Notices;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::AbortHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialog {
    #[default]
    Closed,
    Details,
    Approve,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counters {
    pub total_users: usize,
    pub unclassified_users: usize,
}

/// What the shell should do after a successful approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Approved,
    /// Volunteer approvals continue in the volunteer registration form (hard redirect).
    Redirect(String),
}

#[derive(Debug, Default)]
struct PanelState {
    applications: Vec<PendingApplication>,
    counters: Counters,
    loading: bool,
    load_error: Option<String>,
    dialog: Dialog,
    selected: Option<RecordId>,
    candidate_type: Option<CandidateType>,
    reject_reason: String,
    in_flight: bool,
}

impl PanelState {
    fn close_dialog(&mut self) {
        self.dialog = Dialog::Closed;
        self.selected = None;
        self.candidate_type = None;
        self.reject_reason.clear();
    }

    fn find_mut(&mut self, id: &RecordId) -> Option<&mut PendingApplication> {
        self.applications.iter_mut().find(|a| &a.id == id)
    }
}

type SharedState = Arc<Mutex<PanelState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, PanelState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct ApprovalPanel {
    backend: Arc<BackendClient>,
    notices: Notices,
    config: Arc<Config>,
    state: SharedState,
    initial_load: Mutex<Option<AbortHandle>>,
}

impl ApprovalPanel {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            backend: Arc::clone(&ctx.backend),
            notices: ctx.notices.clone(),
            config: Arc::clone(&ctx.config),
            state: Arc::new(Mutex::new(PanelState::default())),
            initial_load: Mutex::new(None),
        }
    }

    fn state(&self) -> MutexGuard<'_, PanelState> {
        lock(&self.state)
    }

    /// Starts the dashboard load in the background. Dropping the panel aborts it.
    pub fn spawn_initial_load(&self) {
        let backend = Arc::clone(&self.backend);
        let state = Arc::clone(&self.state);
        let notices = self.notices.clone();
        let handle = tokio::spawn(async move {
            load_dashboard(&backend, &state, &notices).await;
        });

        let mut slot = self.initial_load.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.replace(handle.abort_handle()) {
            previous.abort();
        }
    }

    /// Loads applications and both counters, waiting for completion.
    pub async fn load(&self) {
        load_dashboard(&self.backend, &self.state, &self.notices).await;
    }

    /// Re-fetches the side counters only.
    pub async fn refresh_counters(&self) -> Result<Counters, AppError> {
        let (users, unclassified) = tokio::join!(
            self.backend.list_users(),
            self.backend.list_unclassified_users()
        );
        let counters = Counters {
            total_users: users?.len(),
            unclassified_users: unclassified?.len(),
        };
        self.state().counters = counters;
        Ok(counters)
    }

    // ---- queries ----

    pub fn applications(&self) -> Vec<PendingApplication> {
        self.state().applications.clone()
    }

    pub fn pending(&self) -> Vec<PendingApplication> {
        self.state()
            .applications
            .iter()
            .filter(|a| a.status == ApplicationStatus::Pendente)
            .cloned()
            .collect()
    }

    pub fn count_by_status(&self, status: ApplicationStatus) -> usize {
        self.state()
            .applications
            .iter()
            .filter(|a| a.status == status)
            .count()
    }

    pub fn counters(&self) -> Counters {
        self.state().counters
    }

    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    pub fn load_error(&self) -> Option<String> {
        self.state().load_error.clone()
    }

    pub fn dialog(&self) -> Dialog {
        self.state().dialog
    }

    pub fn selected(&self) -> Option<PendingApplication> {
        let state = self.state();
        let id = state.selected.as_ref()?;
        state.applications.iter().find(|a| &a.id == id).cloned()
    }

    pub fn candidate_type(&self) -> Option<CandidateType> {
        self.state().candidate_type
    }

    pub fn is_in_flight(&self) -> bool {
        self.state().in_flight
    }

    // ---- dialogs ----

    /// Opens `dialog` over application `id`. Switching dialogs keeps the selection.
    fn open(&self, dialog: Dialog, id: &RecordId) -> bool {
        let mut state = self.state();
        if !state.applications.iter().any(|a| &a.id == id) {
            tracing::warn!("Cannot open {:?} dialog: application {} not loaded", dialog, id);
            return false;
        }
        if state.selected.as_ref() != Some(id) {
            state.candidate_type = None;
            state.reject_reason.clear();
        }
        state.selected = Some(id.clone());
        state.dialog = dialog;
        true
    }

    pub fn open_details(&self, id: &RecordId) -> bool {
        self.open(Dialog::Details, id)
    }

    pub fn open_approve(&self, id: &RecordId) -> bool {
        self.open(Dialog::Approve, id)
    }

    pub fn open_reject(&self, id: &RecordId) -> bool {
        self.open(Dialog::Reject, id)
    }

    /// Closes whichever dialog is open and clears the selection.
    pub fn dismiss(&self) {
        self.state().close_dialog();
    }

    pub fn select_candidate_type(&self, candidate_type: CandidateType) {
        self.state().candidate_type = Some(candidate_type);
    }

    pub fn set_reject_reason(&self, reason: &str) {
        self.state().reject_reason = reason.to_string();
    }

    pub fn can_confirm_approve(&self) -> bool {
        let state = self.state();
        state.dialog == Dialog::Approve
            && state.selected.is_some()
            && state.candidate_type.is_some()
            && !state.in_flight
    }

    pub fn can_confirm_reject(&self) -> bool {
        let state = self.state();
        state.dialog == Dialog::Reject
            && state.selected.is_some()
            && !state.reject_reason.trim().is_empty()
            && !state.in_flight
    }

    // ---- decisions ----

    pub async fn confirm_approve(&self) -> Result<ApprovalOutcome, AppError> {
        let (id, candidate_type) = {
            let mut state = self.state();
            if state.in_flight {
                return Err(AppError::BadRequest("Aguarde a conclusão da operação".into()));
            }
            let (Dialog::Approve, Some(id), Some(candidate_type)) =
                (state.dialog, state.selected.clone(), state.candidate_type)
            else {
                return Err(AppError::BadRequest(
                    "Selecione o tipo de candidato".to_string(),
                ));
            };
            state.in_flight = true;
            (id, candidate_type)
        };

        let result = self
            .backend
            .approve_application(&id, candidate_type)
            .await;

        let mut state = self.state();
        state.in_flight = false;
        if let Err(e) = result {
            drop(state);
            tracing::error!("Failed to approve application {}: {}", id, e);
            self.notices
                .error("Erro ao aprovar candidato", e.user_message());
            return Err(e);
        }

        let volunteer_user = state.find_mut(&id).map(|app| {
            app.status = ApplicationStatus::Aprovado;
            app.tipo_candidato = Some(candidate_type);
            app.voluntario.then(|| app.user_id().clone())
        });
        state.close_dialog();
        drop(state);

        tracing::info!("Application {} approved as {}", id, candidate_type.as_str());
        match volunteer_user.flatten() {
            Some(user_id) => {
                let url = Route::CompletarCadastroVoluntario {
                    id_usuario: user_id,
                }
                .url(&self.config);
                tracing::info!("Redirecting to volunteer registration: {}", url);
                Ok(ApprovalOutcome::Redirect(url))
            }
            None => {
                self.notices.success(
                    "Candidato aprovado",
                    format!("Classificado como {}", candidate_type.as_str()),
                );
                Ok(ApprovalOutcome::Approved)
            }
        }
    }

    pub async fn confirm_reject(&self) -> Result<(), AppError> {
        let (id, reason) = {
            let mut state = self.state();
            if state.in_flight {
                return Err(AppError::BadRequest("Aguarde a conclusão da operação".into()));
            }
            let reason = state.reject_reason.trim().to_string();
            let (Dialog::Reject, Some(id)) = (state.dialog, state.selected.clone()) else {
                return Err(AppError::BadRequest("Nenhum candidato selecionado".into()));
            };
            if reason.is_empty() {
                return Err(AppError::BadRequest(
                    "Informe o motivo da reprovação".to_string(),
                ));
            }
            state.in_flight = true;
            (id, reason)
        };

        let result = self.backend.reject_application(&id, &reason).await;

        let mut state = self.state();
        state.in_flight = false;
        if let Err(e) = result {
            drop(state);
            tracing::error!("Failed to reject application {}: {}", id, e);
            self.notices
                .error("Erro ao reprovar candidato", e.user_message());
            return Err(e);
        }

        if let Some(app) = state.find_mut(&id) {
            app.status = ApplicationStatus::Reprovado;
            app.motivo_reprovacao = Some(reason);
        }
        state.close_dialog();
        drop(state);

        tracing::info!("Application {} rejected", id);
        self.notices
            .success("Candidato reprovado", "O solicitante será notificado.");
        Ok(())
    }
}

impl Drop for ApprovalPanel {
    fn drop(&mut self) {
        let slot = self.initial_load.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

async fn load_dashboard(backend: &BackendClient, state: &SharedState, notices: &Notices) {
    lock(state).loading = true;
    tracing::info!("Loading approval dashboard");

    let (applications, users, unclassified) = tokio::join!(
        backend.list_applications(),
        backend.list_users(),
        backend.list_unclassified_users()
    );

    let mut guard = lock(state);
    guard.loading = false;
    match applications {
        Ok(applications) => {
            tracing::info!("Loaded {} applications", applications.len());
            guard.applications = applications;
            guard.load_error = None;
        }
        Err(e) => {
            tracing::error!("Failed to load applications: {}", e);
            let message = e.user_message();
            guard.load_error = Some(message.clone());
            notices.error("Erro ao carregar solicitações", message);
        }
    }
    match (users, unclassified) {
        (Ok(users), Ok(unclassified)) => {
            guard.counters = Counters {
                total_users: users.len(),
                unclassified_users: unclassified.len(),
            };
        }
        (Err(e), _) | (_, Err(e)) => tracing::warn!("Failed to load user counters: {}", e),
    }
}
