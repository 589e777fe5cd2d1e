//! Typed owner of every local-storage key.
//!
//! Components never touch raw keys; they go through the accessors here, and
//! the store stamps a schema version so incompatible layouts are detected on
//! startup instead of being misread.

use crate::draft_validator::ValidatedDraft;
use crate::errors::AppError;
use crate::models::{ProfileData, UserData};
use crate::storage::KeyValueStore;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

pub const SCHEMA_VERSION: u32 = 1;

pub mod keys {
    pub const SCHEMA_VERSION: &str = "schemaVersion";
    pub const AUTH_TOKEN: &str = "auth_token";
    pub const AUTH_USER: &str = "auth_user";
    pub const USER_DATA: &str = "userData";
    pub const SAVED_PROFILE: &str = "savedProfile";
    pub const PROFILE_DATA: &str = "profileData";
    pub const USER_PROFILE_DATA: &str = "userProfileData";
    pub const VOLUNTARIO_PROFILE_DATA: &str = "voluntarioProfileData";
    pub const SELECTED_DATES: &str = "selectedDates";
    pub const SELECTED_SERVICES: &str = "selectedServices";
    pub const LAST_PAYMENT: &str = "lastPayment";
    pub const AVAILABILITY_VOLUNTARIO_PREFIX: &str = "availabilityVoluntario:";
    pub const AVAILABILITY_IDS_PREFIX: &str = "availabilityIds:";
}

/// Which registration form a draft belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftKind {
    AssistedUser,
    Volunteer,
}

impl DraftKind {
    pub fn data_key(self) -> &'static str {
        match self {
            DraftKind::AssistedUser => "cadastro_usuario_assistido_form_data",
            DraftKind::Volunteer => "voluntario_form_data",
        }
    }

    pub fn timestamp_key(self) -> &'static str {
        match self {
            DraftKind::AssistedUser => "cadastro_usuario_assistido_form_timestamp",
            DraftKind::Volunteer => "voluntario_form_timestamp",
        }
    }
}

#[derive(Clone)]
pub struct ClientStore {
    backend: Arc<dyn KeyValueStore>,
}

impl ClientStore {
    /// Wraps a storage backend, stamping or checking the schema version.
    pub fn open(backend: Arc<dyn KeyValueStore>) -> Self {
        let store = Self { backend };
        store.check_schema();
        store
    }

    fn check_schema(&self) {
        match self.read::<u32>(keys::SCHEMA_VERSION) {
            None => {
                // Keys written before versioning share the v1 layout.
                if let Err(e) = self.write(keys::SCHEMA_VERSION, &SCHEMA_VERSION) {
                    tracing::warn!("Failed to stamp storage schema version: {}", e);
                }
            }
            Some(v) if v == SCHEMA_VERSION => {}
            Some(v) if v > SCHEMA_VERSION => {
                tracing::warn!(
                    "Storage schema v{} is newer than supported v{}; reads may fail",
                    v,
                    SCHEMA_VERSION
                );
            }
            Some(v) => {
                tracing::info!("Upgrading storage schema v{} -> v{}", v, SCHEMA_VERSION);
                if let Err(e) = self.write(keys::SCHEMA_VERSION, &SCHEMA_VERSION) {
                    tracing::warn!("Failed to stamp storage schema version: {}", e);
                }
            }
        }
    }

    pub fn backend(&self) -> &Arc<dyn KeyValueStore> {
        &self.backend
    }

    /// Reads and decodes a JSON value. Missing, unreadable or malformed entries read as `None`.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Storage read failed for '{}': {}", key, e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring malformed value under '{}': {}", key, e);
                None
            }
        }
    }

    pub fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), AppError> {
        let raw = serde_json::to_string(value)?;
        self.backend.set(key, &raw)
    }

    pub fn remove(&self, key: &str) -> Result<(), AppError> {
        self.backend.remove(key)
    }

    // ---- session ----

    pub fn user_data(&self) -> Option<UserData> {
        self.read(keys::USER_DATA)
    }

    pub fn set_user_data(&self, data: &UserData) -> Result<(), AppError> {
        self.write(keys::USER_DATA, data)
    }

    /// Bearer token from the `userData` blob, falling back to `auth_token`.
    pub fn bearer_token(&self) -> Option<String> {
        self.user_data()
            .and_then(|d| d.token)
            .filter(|t| !t.trim().is_empty())
            .or_else(|| {
                self.read::<String>(keys::AUTH_TOKEN)
                    .filter(|t| !t.trim().is_empty())
            })
    }

    /// Removes every authentication key.
    pub fn clear_session(&self) -> Result<(), AppError> {
        for key in [keys::AUTH_TOKEN, keys::AUTH_USER, keys::USER_DATA] {
            self.remove(key)?;
        }
        Ok(())
    }

    // ---- drafts ----

    pub fn load_draft<T: DeserializeOwned>(&self, kind: DraftKind) -> Option<T> {
        let raw = match self.backend.get(kind.data_key()) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Draft read failed for {:?}: {}", kind, e);
                return None;
            }
        };
        let data = ValidatedDraft::deserialize_and_validate(&raw)?;
        match serde_json::from_str(&data) {
            Ok(form) => Some(form),
            Err(e) => {
                tracing::warn!("Ignoring incompatible {:?} draft: {}", kind, e);
                None
            }
        }
    }

    pub fn save_draft<T: Serialize>(
        &self,
        kind: DraftKind,
        form: &T,
        saved_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let data = serde_json::to_string(form)?;
        let envelope = ValidatedDraft::new(data).serialize()?;
        self.backend.set(kind.data_key(), &envelope)?;
        self.write(kind.timestamp_key(), &saved_at.to_rfc3339())
    }

    pub fn draft_saved_at(&self, kind: DraftKind) -> Option<DateTime<Utc>> {
        let raw: String = self.read(kind.timestamp_key())?;
        DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn clear_draft(&self, kind: DraftKind) -> Result<(), AppError> {
        self.remove(kind.data_key())?;
        self.remove(kind.timestamp_key())
    }

    // ---- checkout ----

    pub fn selected_services(&self) -> Vec<String> {
        self.read(keys::SELECTED_SERVICES).unwrap_or_default()
    }

    pub fn set_selected_services(&self, ids: &[String]) -> Result<(), AppError> {
        self.write(keys::SELECTED_SERVICES, ids)
    }

    pub fn clear_selected_services(&self) -> Result<(), AppError> {
        self.remove(keys::SELECTED_SERVICES)
    }

    // ---- profile ----

    pub fn profile_data(&self) -> Option<ProfileData> {
        self.read(keys::PROFILE_DATA)
    }

    pub fn set_profile_data(&self, profile: &ProfileData) -> Result<(), AppError> {
        self.write(keys::PROFILE_DATA, profile)
    }
}
