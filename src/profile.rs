//! Professional profile editor.
//!
//! Each tab is saved by its own command against its own endpoint and keeps
//! its own dirty flag, so one failed save never touches the other tabs.

use crate::backend::BackendClient;
use crate::client_store::ClientStore;
use crate::context::AppContext;
use crate::errors::AppError;
use crate::formatters::{format_cep, format_cpf, format_phone};
use crate::models::{AddressData, PersonalData, PhotoData, ProfessionalData, ProfileData, RecordId};
use crate::notices::Notices;
use crate::sequencer::RequestSequencer;
use crate::validation::{
    validate_birth_date, validate_cep, validate_cpf, validate_email, validate_name,
    validate_phone, validate_required, PhoneRule, Validation,
};
use crate::viacep::{AddressLookup, AddressLookupClient};
use chrono::{Local, NaiveDate};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileTab {
    Personal,
    Professional,
    Address,
    Photo,
}

impl ProfileTab {
    pub const ALL: [ProfileTab; 4] = [
        ProfileTab::Personal,
        ProfileTab::Professional,
        ProfileTab::Address,
        ProfileTab::Photo,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ProfileTab::Personal => "Dados pessoais",
            ProfileTab::Professional => "Dados profissionais",
            ProfileTab::Address => "Endereço",
            ProfileTab::Photo => "Foto",
        }
    }
}

/// Snapshot of one tab, ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveCommand {
    Personal(PersonalData),
    Professional(ProfessionalData),
    Address(AddressData),
    Photo(PhotoData),
}

fn collect_errors(checks: Vec<(&'static str, Validation)>) -> Vec<(&'static str, String)> {
    checks
        .into_iter()
        .filter(|(_, v)| !v.valid)
        .map(|(field, v)| (field, v.message))
        .collect()
}

impl SaveCommand {
    pub fn for_tab(tab: ProfileTab, draft: &ProfileData) -> Self {
        match tab {
            ProfileTab::Personal => SaveCommand::Personal(draft.dados_pessoais.clone()),
            ProfileTab::Professional => {
                SaveCommand::Professional(draft.dados_profissionais.clone())
            }
            ProfileTab::Address => SaveCommand::Address(draft.endereco.clone()),
            ProfileTab::Photo => SaveCommand::Photo(draft.foto.clone()),
        }
    }

    pub fn tab(&self) -> ProfileTab {
        match self {
            SaveCommand::Personal(_) => ProfileTab::Personal,
            SaveCommand::Professional(_) => ProfileTab::Professional,
            SaveCommand::Address(_) => ProfileTab::Address,
            SaveCommand::Photo(_) => ProfileTab::Photo,
        }
    }

    /// Field-level errors as `(field key, message)`.
    pub fn validate(&self, today: NaiveDate) -> Vec<(&'static str, String)> {
        match self {
            SaveCommand::Personal(p) => collect_errors(vec![
                ("nome", validate_name(&p.nome)),
                ("email", validate_email(&p.email)),
                ("telefone", validate_phone(&p.telefone, PhoneRule::LandlineOrMobile)),
                ("cpf", validate_cpf(&p.cpf)),
                (
                    "dataNascimento",
                    validate_birth_date(&p.data_nascimento, today),
                ),
            ]),
            SaveCommand::Professional(p) => collect_errors(vec![
                ("profissao", validate_required(&p.profissao, "Profissão")),
                (
                    "registroConselho",
                    validate_required(&p.registro_conselho, "Registro no conselho"),
                ),
            ]),
            SaveCommand::Address(a) => collect_errors(vec![
                ("cep", validate_cep(&a.cep)),
                ("rua", validate_required(&a.rua, "Endereço")),
                ("numero", validate_required(&a.numero, "Número")),
                ("bairro", validate_required(&a.bairro, "Bairro")),
                ("cidade", validate_required(&a.cidade, "Cidade")),
                ("estado", validate_required(&a.estado, "Estado")),
            ]),
            SaveCommand::Photo(_) => Vec::new(),
        }
    }

    pub async fn execute(&self, backend: &BackendClient, id: &RecordId) -> Result<(), AppError> {
        match self {
            SaveCommand::Personal(data) => backend.update_personal(id, data).await,
            SaveCommand::Professional(data) => backend.update_professional(id, data).await,
            SaveCommand::Address(data) => backend.update_address(id, data).await,
            SaveCommand::Photo(data) => backend.update_photo(id, data).await,
        }
    }

    /// Copies this tab's section into `profile`.
    fn apply_to(self, profile: &mut ProfileData) {
        match self {
            SaveCommand::Personal(data) => profile.dados_pessoais = data,
            SaveCommand::Professional(data) => profile.dados_profissionais = data,
            SaveCommand::Address(data) => profile.endereco = data,
            SaveCommand::Photo(data) => profile.foto = data,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveError {
    Invalid(Vec<(&'static str, String)>),
    InFlight,
    Failed(String),
}

#[derive(Default)]
struct EditorState {
    saved: ProfileData,
    draft: ProfileData,
    dirty: HashSet<ProfileTab>,
    saving: HashSet<ProfileTab>,
    errors: HashMap<ProfileTab, String>,
}

pub struct ProfileEditor {
    professional_id: RecordId,
    backend: Arc<BackendClient>,
    address: Arc<AddressLookupClient>,
    store: ClientStore,
    notices: Notices,
    state: Mutex<EditorState>,
    cep_lookups: RequestSequencer,
    today: Option<NaiveDate>,
}

impl ProfileEditor {
    pub fn new(professional_id: RecordId, ctx: &AppContext) -> Self {
        Self {
            professional_id,
            backend: Arc::clone(&ctx.backend),
            address: Arc::clone(&ctx.address),
            store: ctx.store.clone(),
            notices: ctx.notices.clone(),
            state: Mutex::new(EditorState::default()),
            cep_lookups: RequestSequencer::new(),
            today: None,
        }
    }

    /// Pins "today" for birth-date checks.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    fn state(&self) -> MutexGuard<'_, EditorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fetches the profile. Falls back to the cached copy when the backend is unreachable.
    pub async fn load(&self) -> Result<ProfileData, AppError> {
        let profile = match self.backend.get_profile(&self.professional_id).await {
            Ok(profile) => {
                if let Err(e) = self.store.set_profile_data(&profile) {
                    tracing::warn!("Failed to cache profile: {}", e);
                }
                profile
            }
            Err(e) => match self.store.profile_data() {
                Some(cached) if !e.is_not_found() => {
                    tracing::warn!("Profile fetch failed, using cached copy: {}", e);
                    self.notices.info("Exibindo dados salvos localmente");
                    cached
                }
                _ => {
                    tracing::error!("Failed to load profile {}: {}", self.professional_id, e);
                    self.notices
                        .error("Erro ao carregar perfil", e.user_message());
                    return Err(e);
                }
            },
        };

        let mut state = self.state();
        state.saved = profile.clone();
        state.draft = profile.clone();
        state.dirty.clear();
        state.errors.clear();
        Ok(profile)
    }

    pub fn draft(&self) -> ProfileData {
        self.state().draft.clone()
    }

    pub fn saved(&self) -> ProfileData {
        self.state().saved.clone()
    }

    pub fn is_dirty(&self, tab: ProfileTab) -> bool {
        self.state().dirty.contains(&tab)
    }

    pub fn dirty_tabs(&self) -> Vec<ProfileTab> {
        let state = self.state();
        ProfileTab::ALL
            .into_iter()
            .filter(|t| state.dirty.contains(t))
            .collect()
    }

    pub fn error(&self, tab: ProfileTab) -> Option<String> {
        self.state().errors.get(&tab).cloned()
    }

    fn mark(state: &mut EditorState, tab: ProfileTab) {
        if SaveCommand::for_tab(tab, &state.draft) == SaveCommand::for_tab(tab, &state.saved) {
            state.dirty.remove(&tab);
        } else {
            state.dirty.insert(tab);
        }
    }

    pub fn edit_personal(&self, edit: impl FnOnce(&mut PersonalData)) {
        let mut state = self.state();
        edit(&mut state.draft.dados_pessoais);
        let p = &mut state.draft.dados_pessoais;
        p.cpf = format_cpf(&p.cpf);
        p.telefone = format_phone(&p.telefone);
        Self::mark(&mut state, ProfileTab::Personal);
    }

    pub fn edit_professional(&self, edit: impl FnOnce(&mut ProfessionalData)) {
        let mut state = self.state();
        edit(&mut state.draft.dados_profissionais);
        Self::mark(&mut state, ProfileTab::Professional);
    }

    pub fn edit_address(&self, edit: impl FnOnce(&mut AddressData)) {
        let mut state = self.state();
        edit(&mut state.draft.endereco);
        state.draft.endereco.cep = format_cep(&state.draft.endereco.cep);
        Self::mark(&mut state, ProfileTab::Address);
    }

    pub fn edit_photo(&self, edit: impl FnOnce(&mut PhotoData)) {
        let mut state = self.state();
        edit(&mut state.draft.foto);
        Self::mark(&mut state, ProfileTab::Photo);
    }

    /// Fills street, neighborhood, city and state of the address tab from the current CEP.
    pub async fn lookup_address(&self) -> Result<AddressLookup, AppError> {
        let cep = self.state().draft.endereco.cep.clone();
        let ticket = self.cep_lookups.issue();
        let result = self.address.lookup(&cep).await?;

        if !self.cep_lookups.is_current(ticket) {
            tracing::warn!("Discarding stale profile CEP lookup");
            return Ok(result);
        }
        if let AddressLookup::Found(address) = &result {
            let mut state = self.state();
            let endereco = &mut state.draft.endereco;
            endereco.rua = address.street.clone();
            endereco.bairro = address.neighborhood.clone();
            endereco.cidade = address.city.clone();
            endereco.estado = address.state.clone();
            Self::mark(&mut state, ProfileTab::Address);
        }
        Ok(result)
    }

    /// Validates and saves one tab.
    pub async fn save(&self, tab: ProfileTab) -> Result<(), SaveError> {
        let command = {
            let mut state = self.state();
            if state.saving.contains(&tab) {
                return Err(SaveError::InFlight);
            }
            let command = SaveCommand::for_tab(tab, &state.draft);
            let errors = command.validate(self.today());
            if !errors.is_empty() {
                let message = errors
                    .iter()
                    .map(|(_, m)| m.as_str())
                    .collect::<Vec<_>>()
                    .join("; ");
                state.errors.insert(tab, message);
                return Err(SaveError::Invalid(errors));
            }
            state.saving.insert(tab);
            state.errors.remove(&tab);
            command
        };

        let result = command.execute(&self.backend, &self.professional_id).await;

        let mut state = self.state();
        state.saving.remove(&tab);
        match result {
            Ok(()) => {
                command.clone().apply_to(&mut state.saved);
                Self::mark(&mut state, tab);
                let saved = state.saved.clone();
                drop(state);

                if let Err(e) = self.store.set_profile_data(&saved) {
                    tracing::warn!("Failed to refresh cached profile: {}", e);
                }
                tracing::info!("Saved profile tab {:?}", tab);
                self.notices
                    .success("Perfil atualizado", format!("{} salvos", tab.label()));
                Ok(())
            }
            Err(e) => {
                let message = e.user_message();
                state.errors.insert(tab, message.clone());
                drop(state);
                tracing::error!("Failed to save profile tab {:?}: {}", tab, e);
                self.notices
                    .error(format!("Erro ao salvar {}", tab.label()), message.clone());
                Err(SaveError::Failed(message))
            }
        }
    }

    /// Restores a tab to the last saved values.
    pub fn discard(&self, tab: ProfileTab) {
        let mut state = self.state();
        let saved = SaveCommand::for_tab(tab, &state.saved);
        saved.apply_to(&mut state.draft);
        state.dirty.remove(&tab);
        state.errors.remove(&tab);
    }
}
