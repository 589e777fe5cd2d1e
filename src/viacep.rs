use crate::config::Config;
use crate::errors::AppError;
use crate::formatters::{only_digits, CEP_DIGITS};
use moka::future::Cache;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Address fields returned for a CEP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub street: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub complement: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressLookup {
    Found(Address),
    NotFound,
}

#[derive(Debug, Deserialize)]
struct ViaCepResponse {
    #[serde(default)]
    erro: Option<Value>,
    #[serde(default)]
    logradouro: String,
    #[serde(default)]
    bairro: String,
    #[serde(default)]
    localidade: String,
    #[serde(default)]
    uf: String,
    #[serde(default)]
    complemento: String,
}

impl ViaCepResponse {
    /// ViaCEP signals unknown CEPs with `"erro": true` (older) or `"erro": "true"` (newer).
    fn is_not_found(&self) -> bool {
        match &self.erro {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            Some(_) => true,
            None => false,
        }
    }
}

/// Returns the 8 digits of a CEP, or `None` if the input does not reduce to exactly 8.
pub fn normalize_cep(raw: &str) -> Option<String> {
    let digits = only_digits(raw);
    (digits.len() == CEP_DIGITS).then_some(digits)
}

/// Client for the public ViaCEP postal-code API.
#[derive(Clone)]
pub struct AddressLookupClient {
    client: reqwest::Client,
    base_url: String,
    /// CEP -> lookup result (1 hour TTL).
    cache: Cache<String, AddressLookup>,
}

impl AddressLookupClient {
    pub fn new(base_url: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create ViaCEP client: {}", e))
            })?;

        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(3600))
            .max_capacity(1_000)
            .build();

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(config.viacep_base_url.clone())
    }

    /// Looks up a CEP.
    ///
    /// Inputs that do not reduce to 8 digits are rejected without a network call.
    pub async fn lookup(&self, cep: &str) -> Result<AddressLookup, AppError> {
        let digits = normalize_cep(cep).ok_or_else(|| {
            AppError::BadRequest(format!("CEP deve ter {} dígitos", CEP_DIGITS))
        })?;

        if let Some(cached) = self.cache.get(&digits).await {
            tracing::debug!("ViaCEP cache hit for {}", digits);
            return Ok(cached);
        }

        let url = format!("{}/{}/json/", self.base_url, digits);
        tracing::info!("Looking up CEP {} on ViaCEP", digits);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("ViaCEP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!("ViaCEP returned {} for {}: {}", status, digits, error_text);
            return Err(AppError::ExternalApiError(format!(
                "ViaCEP returned {}: {}",
                status, error_text
            )));
        }

        let body: ViaCepResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse ViaCEP response: {}", e))
        })?;

        let result = if body.is_not_found() {
            tracing::info!("CEP {} not found", digits);
            AddressLookup::NotFound
        } else {
            AddressLookup::Found(Address {
                street: body.logradouro,
                neighborhood: body.bairro,
                city: body.localidade,
                state: body.uf,
                complement: body.complemento,
            })
        };

        self.cache.insert(digits, result.clone()).await;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_cep() {
        assert_eq!(normalize_cep("01310-100").as_deref(), Some("01310100"));
        assert_eq!(normalize_cep("0131010"), None);
        assert_eq!(normalize_cep("013101001"), None);
    }

    #[test]
    fn test_not_found_flag_variants() {
        let parse = |v: Value| serde_json::from_value::<ViaCepResponse>(v).unwrap();
        assert!(parse(serde_json::json!({"erro": true})).is_not_found());
        assert!(parse(serde_json::json!({"erro": "true"})).is_not_found());
        assert!(!parse(serde_json::json!({"logradouro": "Avenida Paulista"})).is_not_found());
    }

    #[tokio::test]
    async fn test_short_cep_is_rejected_without_request() {
        // Unroutable base: a network call would fail with ExternalApiError instead.
        let client = AddressLookupClient::new("http://127.0.0.1:9".to_string()).unwrap();
        let err = client.lookup("0131").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
