//! Multi-step registration controller.
//!
//! Drives both second-phase forms (assisted user and volunteer): field
//! formatting and validation, identity resolution against the first phase,
//! postal-code lookups, auto-save and submission.

use crate::autosave::AutoSave;
use crate::backend::BackendClient;
use crate::client_store::DraftKind;
use crate::context::AppContext;
use crate::errors::AppError;
use crate::formatters::{format_cep, format_cpf, format_phone, only_digits, CEP_DIGITS};
use crate::models::{Field, FirstPhaseRecord, RecordId, RegistrationForm};
use crate::navigation::Route;
use crate::notices::Notices;
use crate::payload::{assisted_payload, generate_password, volunteer_payload};
use crate::sequencer::{RequestSequencer, Ticket};
use crate::validation::{parse_birth_date, FieldState, FieldStates, FieldValidator, PhoneRule};
use crate::viacep::{AddressLookup, AddressLookupClient};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const ADDRESS_FIELDS: [Field; 4] = [Field::Rua, Field::Bairro, Field::Cidade, Field::Estado];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationKind {
    AssistedUser,
    Volunteer,
}

impl RegistrationKind {
    pub fn draft_kind(self) -> DraftKind {
        match self {
            RegistrationKind::AssistedUser => DraftKind::AssistedUser,
            RegistrationKind::Volunteer => DraftKind::Volunteer,
        }
    }

    pub fn phone_rule(self) -> PhoneRule {
        match self {
            RegistrationKind::AssistedUser => PhoneRule::LandlineOrMobile,
            RegistrationKind::Volunteer => PhoneRule::MobileOnly,
        }
    }

    pub fn sections(self) -> [Section; 3] {
        match self {
            RegistrationKind::AssistedUser => {
                [Section::Personal, Section::Address, Section::Orientation]
            }
            RegistrationKind::Volunteer => {
                [Section::Personal, Section::Address, Section::Professional]
            }
        }
    }

    pub fn required_fields(self) -> Vec<Field> {
        self.sections()
            .iter()
            .flat_map(|s| s.required_fields(self).iter().copied())
            .collect()
    }

    /// Every rendered field, required first.
    pub fn fields(self) -> Vec<Field> {
        let mut fields = self.required_fields();
        for section in self.sections() {
            fields.extend_from_slice(section.optional_fields());
        }
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Personal,
    Address,
    Orientation,
    Professional,
}

impl Section {
    pub fn title(self) -> &'static str {
        match self {
            Section::Personal => "Dados pessoais",
            Section::Address => "Endereço",
            Section::Orientation => "Orientação",
            Section::Professional => "Dados profissionais",
        }
    }

    pub fn required_fields(self, kind: RegistrationKind) -> &'static [Field] {
        match (self, kind) {
            (Section::Personal, RegistrationKind::AssistedUser) => &[
                Field::Nome,
                Field::Telefone,
                Field::DataNascimento,
                Field::Cpf,
                Field::Renda,
                Field::Email,
            ],
            (Section::Personal, RegistrationKind::Volunteer) => &[
                Field::Nome,
                Field::Telefone,
                Field::DataNascimento,
                Field::Cpf,
                Field::Email,
            ],
            (Section::Address, _) => &[
                Field::Cep,
                Field::Rua,
                Field::Numero,
                Field::Bairro,
                Field::Cidade,
                Field::Estado,
            ],
            (Section::Orientation, _) => &[Field::AreaOrientacao, Field::ComoSoube],
            (Section::Professional, _) => &[Field::Profissao],
        }
    }

    pub fn optional_fields(self) -> &'static [Field] {
        match self {
            Section::Address => &[Field::Complemento],
            Section::Professional => &[Field::RegistroProfissional, Field::Motivacao],
            Section::Personal | Section::Orientation => &[],
        }
    }
}

/// Who is registering, as far as the first phase knows.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Identity {
    #[default]
    Unresolved,
    /// No first-phase record exists; a password will be generated.
    NewUser,
    Existing {
        id: Option<RecordId>,
        record: FirstPhaseRecord,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PostSubmit {
    /// Existing users are sent back to login after `delay`.
    RedirectAfter { delay: Duration, to: Route },
    /// New users must read their password first; dismissing redirects.
    RedirectOnDismiss { to: Route },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    /// Shown once to brand-new users.
    pub generated_password: Option<String>,
    pub next: PostSubmit,
}

impl SubmitOutcome {
    /// Waits out the automatic redirect, if this outcome has one.
    pub async fn auto_redirect(&self) -> Option<Route> {
        match &self.next {
            PostSubmit::RedirectAfter { delay, to } => {
                tokio::time::sleep(*delay).await;
                Some(to.clone())
            }
            PostSubmit::RedirectOnDismiss { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitError {
    /// Client-side validation failed on these fields.
    Invalid(Vec<Field>),
    /// A submission is already running.
    InFlight,
    /// The backend (or payload preparation) failed; the message is shown inline.
    Failed(String),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Invalid(fields) => {
                let keys: Vec<&str> = fields.iter().map(|f| f.key()).collect();
                write!(f, "Invalid fields: {}", keys.join(", "))
            }
            SubmitError::InFlight => write!(f, "Submission already in progress"),
            SubmitError::Failed(msg) => write!(f, "Submission failed: {}", msg),
        }
    }
}

impl std::error::Error for SubmitError {}

#[derive(Default)]
struct FormState {
    form: RegistrationForm,
    fields: FieldStates,
    locked: HashSet<Field>,
    identity: Identity,
    url_user_id: Option<RecordId>,
    /// Digits of the last CEP sent to ViaCEP.
    last_cep: Option<String>,
    submitting: bool,
    submit_error: Option<String>,
    success: Option<SubmitOutcome>,
}

enum FollowUp {
    Cep(String, Ticket),
    Email(String, Ticket),
}

struct SubmitPlan {
    form: RegistrationForm,
    new_user: bool,
    user_id: Option<RecordId>,
}

const UNRESOLVED_LINK_MESSAGE: &str =
    "Não foi possível confirmar seu cadastro inicial. Verifique sua conexão e tente novamente.";

/// Applies the input mask of `field`.
fn format_value(field: Field, raw: &str) -> String {
    match field {
        Field::Cpf => format_cpf(raw),
        Field::Telefone => format_phone(raw),
        Field::Cep => format_cep(raw),
        Field::DataNascimento => parse_birth_date(raw)
            .or_else(|| raw.get(..10).and_then(parse_birth_date))
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| raw.to_string()),
        _ => raw.to_string(),
    }
}

pub struct RegistrationController {
    kind: RegistrationKind,
    validator: FieldValidator,
    backend: Arc<BackendClient>,
    address: Arc<AddressLookupClient>,
    notices: Notices,
    redirect_delay: Duration,
    autosave: AutoSave<RegistrationForm>,
    state: Mutex<FormState>,
    cep_lookups: RequestSequencer,
    email_lookups: RequestSequencer,
}

impl RegistrationController {
    pub fn new(kind: RegistrationKind, ctx: &AppContext) -> Self {
        Self {
            kind,
            validator: FieldValidator::new(kind.phone_rule()),
            backend: Arc::clone(&ctx.backend),
            address: Arc::clone(&ctx.address),
            notices: ctx.notices.clone(),
            redirect_delay: ctx.config.redirect_delay(),
            autosave: AutoSave::new(
                ctx.store.clone(),
                kind.draft_kind(),
                ctx.config.autosave_debounce(),
                ctx.notices.clone(),
            ),
            state: Mutex::new(FormState::default()),
            cep_lookups: RequestSequencer::new(),
            email_lookups: RequestSequencer::new(),
        }
    }

    /// Pins "today" for birth-date checks.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.validator = self.validator.with_today(today);
        self
    }

    fn state(&self) -> MutexGuard<'_, FormState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn kind(&self) -> RegistrationKind {
        self.kind
    }

    /// Restores the draft, then resolves the identity carried in the URL (if any).
    pub async fn mount(&self, user_id: Option<RecordId>) {
        if let Some(draft) = self.autosave.load() {
            let mut state = self.state();
            state.form.merge_from(&draft);
            for field in self.kind.fields() {
                let value = state.form.get(field).to_string();
                if !value.trim().is_empty() {
                    let result = self.validator.validate(field, &value);
                    state.fields.record(field, &result);
                }
            }
            tracing::info!("Restored {:?} draft", self.kind);
        }

        if let Some(id) = user_id {
            self.resolve_by_id(id).await;
        }
    }

    /// Looks up the first-phase record for `id`. A 404 marks the user as new.
    pub async fn resolve_by_id(&self, id: RecordId) -> Identity {
        self.state().url_user_id = Some(id.clone());
        self.email_lookups.invalidate();

        match self.backend.first_phase_by_id(&id).await {
            Ok(Some(record)) => {
                let mut state = self.state();
                self.apply_first_phase(&mut state, record, Some(id));
            }
            Ok(None) => {
                tracing::info!("No first-phase record for {}; treating as new user", id);
                self.state().identity = Identity::NewUser;
            }
            Err(e) => {
                tracing::error!("Failed to resolve first-phase record {}: {}", id, e);
                self.notices
                    .error("Erro ao carregar seus dados", e.user_message());
            }
        }
        self.identity()
    }

    /// Pre-fills and locks every field the first-phase record provides.
    fn apply_first_phase(
        &self,
        state: &mut FormState,
        record: FirstPhaseRecord,
        fallback_id: Option<RecordId>,
    ) {
        let provided = record.provided_fields();
        for (field, raw) in &provided {
            let value = format_value(*field, raw);
            let result = self.validator.validate(*field, &value);
            state.form.set(*field, value);
            state.fields.record(*field, &result);
            state.locked.insert(*field);
        }
        let id = record.id.clone().or(fallback_id);
        tracing::info!(
            "Pre-filled {} fields from first-phase record {:?}",
            provided.len(),
            id
        );
        state.identity = Identity::Existing { id, record };
    }

    /// Formats, stores and validates one field, then runs any lookup it triggers.
    ///
    /// Locked fields are left untouched.
    pub async fn set_field(&self, field: Field, raw: &str) {
        let value = format_value(field, raw);
        let (snapshot, follow_up) = {
            let mut state = self.state();
            if state.locked.contains(&field) {
                tracing::warn!("Ignoring edit of read-only field {}", field);
                return;
            }
            let result = self.validator.validate(field, &value);
            state.form.set(field, value.clone());
            state.fields.record(field, &result);

            let follow_up = match field {
                Field::Cep => self.plan_cep_lookup(&mut state, &value),
                Field::Email if !result.valid => {
                    self.email_lookups.invalidate();
                    None
                }
                Field::Email
                    if state.identity == Identity::Unresolved && state.url_user_id.is_none() =>
                {
                    Some(FollowUp::Email(
                        value.trim().to_string(),
                        self.email_lookups.issue(),
                    ))
                }
                _ => None,
            };
            (state.form.clone(), follow_up)
        };

        self.autosave.track(field.key(), snapshot);

        match follow_up {
            Some(FollowUp::Cep(digits, ticket)) => self.lookup_cep(digits, ticket).await,
            Some(FollowUp::Email(email, ticket)) => self.lookup_email(email, ticket).await,
            None => {}
        }
    }

    fn plan_cep_lookup(&self, state: &mut FormState, value: &str) -> Option<FollowUp> {
        let digits = only_digits(value);
        if digits.len() != CEP_DIGITS {
            state.last_cep = None;
            self.cep_lookups.invalidate();
            return None;
        }
        if state.last_cep.as_deref() == Some(digits.as_str()) {
            return None;
        }
        state.last_cep = Some(digits.clone());
        Some(FollowUp::Cep(digits, self.cep_lookups.issue()))
    }

    async fn lookup_cep(&self, digits: String, ticket: Ticket) {
        let result = self.address.lookup(&digits).await;

        let snapshot = {
            let mut state = self.state();
            if !self.cep_lookups.is_current(ticket) {
                tracing::warn!("Discarding stale CEP lookup for {}", digits);
                return;
            }
            match result {
                Ok(AddressLookup::Found(address)) => {
                    let values = [
                        address.street,
                        address.neighborhood,
                        address.city,
                        address.state,
                    ];
                    // City-wide CEPs come back without street or neighborhood.
                    for (field, value) in ADDRESS_FIELDS.into_iter().zip(values) {
                        if value.trim().is_empty() {
                            state.fields.reset(field);
                        } else {
                            state.fields.mark_valid(field);
                        }
                        state.form.set(field, value);
                    }
                    Some(state.form.clone())
                }
                Ok(AddressLookup::NotFound) => {
                    state.fields.set_error(Field::Cep, "CEP não encontrado");
                    for field in ADDRESS_FIELDS {
                        state.fields.reset(field);
                    }
                    None
                }
                Err(e) => {
                    tracing::error!("CEP lookup failed for {}: {}", digits, e);
                    state
                        .fields
                        .set_error(Field::Cep, "Erro ao buscar CEP. Tente novamente.");
                    None
                }
            }
        };

        if let Some(snapshot) = snapshot {
            self.autosave.track(Field::Rua.key(), snapshot);
        }
    }

    /// Fallback identity resolution when no id came in the URL.
    async fn lookup_email(&self, email: String, ticket: Ticket) {
        let result = self.backend.first_phase_by_email(&email).await;

        let mut state = self.state();
        if !self.email_lookups.is_current(ticket) || state.identity != Identity::Unresolved {
            tracing::debug!("Discarding stale email lookup");
            return;
        }
        match result {
            Ok(Some(record)) => self.apply_first_phase(&mut state, record, None),
            Ok(None) => tracing::debug!("No first-phase record for this email"),
            Err(e) => tracing::warn!("Email lookup failed: {}", e),
        }
    }

    pub fn set_volunteer_flag(&self, value: bool) {
        let snapshot = {
            let mut state = self.state();
            state.form.quer_ser_voluntario = value;
            state.form.clone()
        };
        self.autosave.track("querSerVoluntario", snapshot);
    }

    // ---- queries ----

    pub fn form(&self) -> RegistrationForm {
        self.state().form.clone()
    }

    pub fn field_state(&self, field: Field) -> FieldState {
        self.state().fields.get(field)
    }

    pub fn is_locked(&self, field: Field) -> bool {
        self.state().locked.contains(&field)
    }

    pub fn identity(&self) -> Identity {
        self.state().identity.clone()
    }

    pub fn is_submitting(&self) -> bool {
        self.state().submitting
    }

    pub fn submit_error(&self) -> Option<String> {
        self.state().submit_error.clone()
    }

    pub fn success(&self) -> Option<SubmitOutcome> {
        self.state().success.clone()
    }

    pub fn pending_autosave_fields(&self) -> Vec<String> {
        self.autosave.pending_fields()
    }

    fn field_done(state: &FormState, field: Field) -> bool {
        !state.form.get(field).trim().is_empty() && !state.fields.has_error(field)
    }

    /// All required fields of `section` are filled and error-free.
    pub fn section_complete(&self, section: Section) -> bool {
        let state = self.state();
        section
            .required_fields(self.kind)
            .iter()
            .all(|&f| Self::field_done(&state, f))
    }

    pub fn sections(&self) -> Vec<(Section, bool)> {
        self.kind
            .sections()
            .into_iter()
            .map(|s| (s, self.section_complete(s)))
            .collect()
    }

    /// Share of required fields done, rounded down.
    pub fn progress(&self) -> u8 {
        let required = self.kind.required_fields();
        let state = self.state();
        let done = required
            .iter()
            .filter(|&&f| Self::field_done(&state, f))
            .count();
        ((done * 100) / required.len().max(1)) as u8
    }

    // ---- submission ----

    pub async fn submit(&self) -> Result<SubmitOutcome, SubmitError> {
        // The link id must resolve (record or 404) before anything is sent.
        let unresolved_link = {
            let state = self.state();
            if state.submitting {
                return Err(SubmitError::InFlight);
            }
            match (&state.identity, &state.url_user_id) {
                (Identity::Unresolved, Some(id)) => Some(id.clone()),
                _ => None,
            }
        };
        if let Some(id) = unresolved_link {
            tracing::info!("Retrying first-phase resolution for {} before submit", id);
            self.resolve_by_id(id).await;
        }

        let plan = {
            let mut state = self.state();
            if state.submitting {
                return Err(SubmitError::InFlight);
            }
            if state.identity == Identity::Unresolved && state.url_user_id.is_some() {
                let message = UNRESOLVED_LINK_MESSAGE.to_string();
                state.submit_error = Some(message.clone());
                drop(state);
                tracing::warn!("Submission blocked: first-phase record still unresolved");
                return Err(SubmitError::Failed(message));
            }

            let form = state.form.clone();
            let failed = self
                .validator
                .validate_all(&form, &self.kind.fields(), &mut state.fields);
            if !failed.is_empty() {
                drop(state);
                tracing::warn!("Submission blocked by {} invalid fields", failed.len());
                self.notices.error(
                    "Formulário incompleto",
                    "Corrija os campos destacados antes de enviar.",
                );
                return Err(SubmitError::Invalid(failed));
            }

            state.submitting = true;
            state.submit_error = None;
            let (new_user, user_id) = match &state.identity {
                Identity::Existing { id, .. } => {
                    (false, id.clone().or_else(|| state.url_user_id.clone()))
                }
                Identity::NewUser => (true, state.url_user_id.clone()),
                Identity::Unresolved => (true, None),
            };
            SubmitPlan {
                form,
                new_user,
                user_id,
            }
        };

        match self.send(&plan).await {
            Ok(password) => {
                self.autosave.discard();
                let outcome = match password {
                    Some(password) => SubmitOutcome {
                        generated_password: Some(password),
                        next: PostSubmit::RedirectOnDismiss { to: Route::Login },
                    },
                    None => SubmitOutcome {
                        generated_password: None,
                        next: PostSubmit::RedirectAfter {
                            delay: self.redirect_delay,
                            to: Route::Login,
                        },
                    },
                };
                {
                    let mut state = self.state();
                    state.submitting = false;
                    state.success = Some(outcome.clone());
                }
                tracing::info!("Registration submitted (new user: {})", plan.new_user);
                self.notices.success(
                    "Cadastro enviado com sucesso!",
                    "Sua solicitação será analisada pela nossa equipe.",
                );
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!("Registration submission failed: {}", e);
                let message = e.user_message();
                {
                    let mut state = self.state();
                    state.submitting = false;
                    state.submit_error = Some(message.clone());
                }
                self.notices
                    .error("Erro ao enviar cadastro", message.clone());
                Err(SubmitError::Failed(message))
            }
        }
    }

    /// Posts the payload. Returns the generated password for new users.
    async fn send(&self, plan: &SubmitPlan) -> Result<Option<String>, AppError> {
        match self.kind {
            RegistrationKind::AssistedUser => {
                let password = plan
                    .new_user
                    .then(|| generate_password(&plan.form.cpf, &plan.form.data_nascimento));
                if plan.new_user {
                    self.ensure_not_registered(&plan.form.email).await?;
                }
                let payload = assisted_payload(&plan.form, password.clone())?;
                self.backend
                    .submit_second_phase(&payload, plan.user_id.as_ref())
                    .await?;
                Ok(password)
            }
            RegistrationKind::Volunteer => {
                let id = plan.user_id.as_ref().ok_or_else(|| {
                    AppError::BadRequest(
                        "Não encontramos seu cadastro inicial. Use o link recebido por email para continuar."
                            .to_string(),
                    )
                })?;
                let payload = volunteer_payload(&plan.form)?;
                self.backend
                    .submit_volunteer_second_phase(&payload, id)
                    .await?;
                Ok(None)
            }
        }
    }

    /// Rejects emails that already have an account. An unavailable check does not block.
    async fn ensure_not_registered(&self, email: &str) -> Result<(), AppError> {
        match self.backend.check_registration(email).await {
            Ok(check) if check.cadastrado => Err(AppError::BadRequest(
                "Este email já possui cadastro. Faça login para continuar.".to_string(),
            )),
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!("Registration check unavailable, continuing: {}", e);
                Ok(())
            }
        }
    }

    /// Closes the success modal and returns where to go.
    ///
    /// New users also get a full reset since they leave with a fresh password.
    pub fn dismiss_success(&self) -> Option<Route> {
        let outcome = self.state().success.take()?;
        match outcome.next {
            PostSubmit::RedirectOnDismiss { to } => {
                self.reset();
                Some(to)
            }
            PostSubmit::RedirectAfter { to, .. } => Some(to),
        }
    }

    /// Clears the form, identity and stored draft.
    pub fn reset(&self) {
        self.cep_lookups.invalidate();
        self.email_lookups.invalidate();
        *self.state() = FormState::default();
        self.autosave.discard();
        tracing::info!("{:?} form reset", self.kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::MemoryStorage;
    use crate::validation::FieldStatus;

    fn controller(kind: RegistrationKind) -> RegistrationController {
        let config = Config {
            api_base_url: "http://127.0.0.1:9".to_string(),
            viacep_base_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        };
        let ctx = AppContext::new(config, Arc::new(MemoryStorage::new()), Notices::disabled())
            .unwrap();
        RegistrationController::new(kind, &ctx)
            .with_today(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap())
    }

    #[test]
    fn test_sections_per_kind() {
        assert_eq!(
            RegistrationKind::AssistedUser.sections()[2],
            Section::Orientation
        );
        assert_eq!(
            RegistrationKind::Volunteer.sections()[2],
            Section::Professional
        );
        assert!(RegistrationKind::AssistedUser
            .required_fields()
            .contains(&Field::Renda));
        assert!(!RegistrationKind::Volunteer
            .required_fields()
            .contains(&Field::Renda));
    }

    #[test]
    fn test_format_value_normalizes_backend_dates() {
        assert_eq!(
            format_value(Field::DataNascimento, "1990-05-15T00:00:00"),
            "1990-05-15"
        );
        assert_eq!(format_value(Field::DataNascimento, "15/05/1990"), "1990-05-15");
        assert_eq!(format_value(Field::Cpf, "11144477735"), "111.444.777-35");
    }

    #[tokio::test]
    async fn test_set_field_formats_and_validates() {
        let ctl = controller(RegistrationKind::AssistedUser);
        ctl.set_field(Field::Cpf, "11144477735").await;
        assert_eq!(ctl.form().cpf, "111.444.777-35");
        assert_eq!(ctl.field_state(Field::Cpf).status, FieldStatus::Valid);

        ctl.set_field(Field::Telefone, "119876").await;
        assert_eq!(ctl.field_state(Field::Telefone).status, FieldStatus::Invalid);
        assert_eq!(ctl.pending_autosave_fields(), vec!["cpf", "telefone"]);
    }

    #[tokio::test]
    async fn test_progress_counts_valid_required_fields() {
        let ctl = controller(RegistrationKind::AssistedUser);
        assert_eq!(ctl.progress(), 0);

        ctl.set_field(Field::Nome, "Maria Souza").await;
        ctl.set_field(Field::Renda, "sem-renda").await;
        ctl.set_field(Field::Nome, "Jo").await;
        // 14 required fields, 1 done.
        assert_eq!(ctl.progress(), 7);
        assert!(!ctl.section_complete(Section::Orientation));

        ctl.set_field(Field::AreaOrientacao, "juridica").await;
        ctl.set_field(Field::ComoSoube, "indicacao").await;
        assert!(ctl.section_complete(Section::Orientation));
    }

    #[tokio::test]
    async fn test_blanking_required_field_reopens_section() {
        let ctl = controller(RegistrationKind::AssistedUser);
        ctl.set_field(Field::AreaOrientacao, "juridica").await;
        ctl.set_field(Field::ComoSoube, "indicacao").await;
        assert!(ctl.section_complete(Section::Orientation));

        ctl.set_field(Field::ComoSoube, "   ").await;
        assert!(!ctl.section_complete(Section::Orientation));
        assert_eq!(ctl.field_state(Field::ComoSoube).status, FieldStatus::Invalid);
    }

    #[tokio::test]
    async fn test_submit_blocked_by_validation() {
        let ctl = controller(RegistrationKind::Volunteer);
        ctl.set_field(Field::Nome, "Ana Lima").await;

        let err = ctl.submit().await.unwrap_err();
        match err {
            SubmitError::Invalid(fields) => {
                assert!(fields.contains(&Field::Cpf));
                assert!(!fields.contains(&Field::Nome));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!ctl.is_submitting());
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let ctl = controller(RegistrationKind::AssistedUser);
        ctl.set_field(Field::Nome, "Maria Souza").await;
        ctl.reset();
        assert_eq!(ctl.form(), RegistrationForm::default());
        assert!(ctl.pending_autosave_fields().is_empty());
        assert_eq!(ctl.identity(), Identity::Unresolved);
    }
}
