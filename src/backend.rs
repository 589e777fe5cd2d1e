use crate::client_store::ClientStore;
use crate::config::Config;
use crate::errors::AppError;
use crate::models::{
    AddressData, CandidateType, FirstPhaseRecord, PendingApplication, PersonalData, PhotoData,
    ProfessionalData, ProfileData, RecordId, RegistrationCheck,
};
use crate::payload::SecondPhasePayload;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

/// Client for the Mãos Amigas REST backend.
///
/// Every request carries the bearer token currently held in the client store,
/// so a login or logout in another component takes effect on the next call.
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: Url,
    store: ClientStore,
}

impl BackendClient {
    /// Creates a new `BackendClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Absolute backend base URL (e.g. `http://localhost:5173/api`).
    /// * `store` - Client store the bearer token is read from.
    pub fn new(base_url: &str, store: ClientStore) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create backend client: {}", e))
            })?;

        let base_url = Url::parse(base_url).map_err(|e| {
            AppError::BadRequest(format!("Invalid backend base URL '{}': {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::BadRequest(format!(
                "Backend base URL '{}' cannot carry paths",
                base_url
            )));
        }

        Ok(Self {
            client,
            base_url,
            store,
        })
    }

    pub fn from_config(config: &Config, store: ClientStore) -> Result<Self, AppError> {
        Self::new(&config.api_base_url, store)
    }

    /// Joins percent-encoded path segments and query pairs onto the base URL.
    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, AppError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::InternalError("Backend base URL cannot carry paths".into()))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.store.bearer_token() {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Sends a request and maps non-success statuses onto `AppError`.
    async fn execute(&self, request: RequestBuilder, what: &str) -> Result<Response, AppError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("{} request failed: {}", what, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = backend_message(&error_text)
            .unwrap_or_else(|| format!("{} returned {}", what, status));

        tracing::warn!("{} returned {}: {}", what, status, error_text);
        Err(match status {
            StatusCode::NOT_FOUND => AppError::NotFound(message),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Unauthorized(message),
            StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                AppError::BadRequest(message)
            }
            _ => AppError::ExternalApiError(format!("{} returned {}: {}", what, status, error_text)),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T, AppError> {
        tracing::debug!("GET {}", url);
        let response = self.execute(self.client.get(url), what).await?;
        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse {} response: {}", what, e))
        })
    }

    /// Sends a JSON body; the response body is returned as loose JSON (empty bodies read as `null`).
    async fn send_json<B: Serialize + ?Sized>(
        &self,
        request: RequestBuilder,
        body: &B,
        what: &str,
    ) -> Result<Value, AppError> {
        let response = self.execute(request.json(body), what).await?;
        let text = response.text().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to read {} response: {}", what, e))
        })?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    // ---- users ----

    pub async fn list_users(&self) -> Result<Vec<Value>, AppError> {
        let url = self.endpoint(&["usuarios"], &[])?;
        self.get_json(url, "List users").await
    }

    pub async fn list_unclassified_users(&self) -> Result<Vec<Value>, AppError> {
        let url = self.endpoint(&["usuarios", "nao-classificados"], &[])?;
        self.get_json(url, "List unclassified users").await
    }

    /// Fetches a first-phase record by id. A 404 means "new user" and reads as `None`.
    pub async fn first_phase_by_id(
        &self,
        id: &RecordId,
    ) -> Result<Option<FirstPhaseRecord>, AppError> {
        let id = id.to_string();
        let url = self.endpoint(&["usuarios", "primeira-fase", &id], &[])?;
        tracing::info!("Resolving first-phase record {}", id);
        match self.get_json(url, "First-phase lookup").await {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetches a first-phase record by email. A 404 reads as `None`.
    pub async fn first_phase_by_email(
        &self,
        email: &str,
    ) -> Result<Option<FirstPhaseRecord>, AppError> {
        let url = self.endpoint(&["usuarios", "primeira-fase", "email", email.trim()], &[])?;
        match self.get_json(url, "First-phase email lookup").await {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn check_registration(&self, email: &str) -> Result<RegistrationCheck, AppError> {
        let url = self.endpoint(
            &["usuarios", "verificar-cadastro"],
            &[("email", email.trim())],
        )?;
        self.get_json(url, "Registration check").await
    }

    /// Submits the assisted-user second phase, linking to the first-phase record when known.
    pub async fn submit_second_phase(
        &self,
        payload: &SecondPhasePayload,
        user_id: Option<&RecordId>,
    ) -> Result<Value, AppError> {
        let id = user_id.map(|id| id.to_string());
        let query: Vec<(&str, &str)> = id.iter().map(|id| ("idUsuario", id.as_str())).collect();
        let url = self.endpoint(&["usuarios", "segunda-fase"], &query)?;

        tracing::info!("Submitting second phase (linked: {})", id.is_some());
        tracing::debug!("Second-phase payload tipo={} cpf_len={}", payload.tipo, payload.cpf.len());
        self.send_json(self.client.post(url), payload, "Second-phase submission")
            .await
    }

    pub async fn submit_volunteer_second_phase(
        &self,
        payload: &SecondPhasePayload,
        user_id: &RecordId,
    ) -> Result<Value, AppError> {
        let id = user_id.to_string();
        let url = self.endpoint(
            &["usuarios", "voluntario", "segunda-fase"],
            &[("idUsuario", id.as_str())],
        )?;

        tracing::info!("Submitting volunteer second phase for {}", id);
        tracing::debug!("Volunteer payload tipo={} profissao={:?}", payload.tipo, payload.profissao);
        self.send_json(self.client.post(url), payload, "Volunteer submission")
            .await
    }

    // ---- approval workflow ----

    pub async fn list_applications(&self) -> Result<Vec<PendingApplication>, AppError> {
        let url = self.endpoint(&["formularios"], &[])?;
        self.get_json(url, "List applications").await
    }

    pub async fn approve_application(
        &self,
        id: &RecordId,
        candidate_type: CandidateType,
    ) -> Result<(), AppError> {
        let id = id.to_string();
        let url = self.endpoint(&["formularios", &id, "aprovar"], &[])?;
        tracing::info!("Approving application {} as {}", id, candidate_type.as_str());
        self.send_json(
            self.client.put(url),
            &json!({ "tipoCandidato": candidate_type }),
            "Approve application",
        )
        .await?;
        Ok(())
    }

    pub async fn reject_application(&self, id: &RecordId, reason: &str) -> Result<(), AppError> {
        let id = id.to_string();
        let url = self.endpoint(&["formularios", &id, "reprovar"], &[])?;
        tracing::info!("Rejecting application {}", id);
        self.send_json(
            self.client.put(url),
            &json!({ "motivo": reason }),
            "Reject application",
        )
        .await?;
        Ok(())
    }

    // ---- professional profile ----

    pub async fn get_profile(&self, id: &RecordId) -> Result<ProfileData, AppError> {
        let id = id.to_string();
        let url = self.endpoint(&["profissionais", &id], &[])?;
        self.get_json(url, "Profile fetch").await
    }

    async fn put_profile_section<B: Serialize>(
        &self,
        id: &RecordId,
        section: &str,
        body: &B,
    ) -> Result<(), AppError> {
        let id = id.to_string();
        let url = self.endpoint(&["profissionais", &id, section], &[])?;
        tracing::info!("Saving profile section '{}' for {}", section, id);
        self.send_json(self.client.put(url), body, "Profile update")
            .await?;
        Ok(())
    }

    pub async fn update_personal(&self, id: &RecordId, data: &PersonalData) -> Result<(), AppError> {
        self.put_profile_section(id, "dados-pessoais", data).await
    }

    pub async fn update_professional(
        &self,
        id: &RecordId,
        data: &ProfessionalData,
    ) -> Result<(), AppError> {
        self.put_profile_section(id, "dados-profissionais", data)
            .await
    }

    pub async fn update_address(&self, id: &RecordId, data: &AddressData) -> Result<(), AppError> {
        self.put_profile_section(id, "endereco", data).await
    }

    pub async fn update_photo(&self, id: &RecordId, data: &PhotoData) -> Result<(), AppError> {
        self.put_profile_section(id, "foto", data).await
    }
}

/// Pulls a human message out of an error body (`message`, `mensagem`, `erro` or `error`).
fn backend_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "mensagem", "erro", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .map(str::to_string)
        .filter(|m| !m.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::sync::Arc;

    fn client(base: &str) -> BackendClient {
        let store = ClientStore::open(Arc::new(MemoryStorage::new()));
        BackendClient::new(base, store).unwrap()
    }

    #[test]
    fn test_endpoint_keeps_base_path_and_encodes_segments() {
        let backend = client("http://localhost:5173/api");
        let url = backend
            .endpoint(&["usuarios", "primeira-fase", "email", "ana maria@x.com"], &[])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:5173/api/usuarios/primeira-fase/email/ana%20maria@x.com"
        );
    }

    #[test]
    fn test_endpoint_on_bare_origin() {
        let backend = client("http://localhost:8080");
        let url = backend
            .endpoint(&["usuarios", "segunda-fase"], &[("idUsuario", "42")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/usuarios/segunda-fase?idUsuario=42"
        );
    }

    #[test]
    fn test_backend_message_extraction() {
        assert_eq!(
            backend_message(r#"{"message":"Email já cadastrado"}"#).as_deref(),
            Some("Email já cadastrado")
        );
        assert_eq!(backend_message("plain text"), None);
    }
}
