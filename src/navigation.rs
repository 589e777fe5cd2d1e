use crate::client_store::ClientStore;
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::models::RecordId;
use crate::notices::Notices;
use std::fmt;

/// Screens a controller can send the user to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
    CadastroUsuarioAssistido { id_usuario: Option<RecordId> },
    CompletarCadastroVoluntario { id_usuario: RecordId },
    Perfil,
    Pagamento,
}

impl Route {
    /// Path relative to the app base, including any query string.
    pub fn path(&self) -> String {
        match self {
            Route::Login => "login".to_string(),
            Route::Dashboard => "dashboard".to_string(),
            Route::CadastroUsuarioAssistido { id_usuario: None } => {
                "cadastro-usuario-assistido".to_string()
            }
            Route::CadastroUsuarioAssistido {
                id_usuario: Some(id),
            } => format!("cadastro-usuario-assistido?idUsuario={}", id),
            Route::CompletarCadastroVoluntario { id_usuario } => {
                format!("cadastro-voluntario?idUsuario={}", id_usuario)
            }
            Route::Perfil => "perfil".to_string(),
            Route::Pagamento => "pagamento".to_string(),
        }
    }

    /// Absolute URL for a hard browser redirect.
    pub fn url(&self, config: &Config) -> String {
        let origin = config.app_origin.trim_end_matches('/');
        let base = config.app_base_path.trim_matches('/');
        if base.is_empty() {
            format!("{}/{}", origin, self.path())
        } else {
            format!("{}/{}/{}", origin, base, self.path())
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.path())
    }
}

/// Clears the session and returns where to go next.
pub fn logout(store: &ClientStore, notices: &Notices) -> Result<Route, AppError> {
    store
        .clear_session()
        .context("Failed to clear session on logout")?;
    tracing::info!("User logged out");
    notices.info("Você saiu da sua conta");
    Ok(Route::Login)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_store::keys;
    use crate::storage::{KeyValueStore, MemoryStorage};
    use std::sync::Arc;

    #[test]
    fn test_volunteer_completion_url() {
        let config = Config {
            app_origin: "https://maosamigas.org".to_string(),
            app_base_path: "/app/".to_string(),
            ..Default::default()
        };
        let route = Route::CompletarCadastroVoluntario {
            id_usuario: RecordId::Number(42),
        };
        assert_eq!(
            route.url(&config),
            "https://maosamigas.org/app/cadastro-voluntario?idUsuario=42"
        );
        assert_eq!(Route::Login.url(&Config::default()), "http://localhost:5173/login");
    }

    #[test]
    fn test_logout_clears_auth_keys() {
        let backend = Arc::new(MemoryStorage::new());
        let store = ClientStore::open(backend.clone());
        backend.set(keys::AUTH_TOKEN, "\"t\"").unwrap();
        backend.set(keys::USER_DATA, "{\"token\":\"t\"}").unwrap();

        let route = logout(&store, &Notices::disabled()).unwrap();

        assert_eq!(route, Route::Login);
        assert!(backend.get(keys::AUTH_TOKEN).unwrap().is_none());
        assert!(backend.get(keys::USER_DATA).unwrap().is_none());
    }
}
