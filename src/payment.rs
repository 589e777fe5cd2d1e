//! Checkout simulator.
//!
//! No payment processor is involved: the flow walks through delayed stages,
//! validates the chosen method locally and records a synthesized payment.

use crate::client_store::{keys, ClientStore};
use crate::context::AppContext;
use crate::errors::AppError;
use crate::formatters::{format_brl, format_card_expiry, format_card_number, only_digits, CARD_DIGITS};
use crate::models::UserData;
use crate::notices::Notices;
use crate::validation::{validate_name, Validation};
use bigdecimal::num_bigint::BigInt;
use bigdecimal::{BigDecimal, RoundingMode};
use chrono::{DateTime, Datelike, Duration as ChronoDuration, Local, NaiveDate, Utc};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;
use uuid::Uuid;

pub const FALLBACK_PIX_KEY: &str = "pagamentos@maosamigas.org.br";
pub const BOLETO_DUE_DAYS: i64 = 3;

const LOAD_STAGES: [&str; 3] = [
    "Carregando serviços selecionados...",
    "Calculando valores...",
    "Preparando ambiente seguro...",
];
const VALIDATING_CAPTION: &str = "Validando dados do pagamento...";
const PROCESSING_CAPTIONS: [&str; 2] = ["Processando pagamento...", "Confirmando transação..."];

static CARD_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4} [0-9]{4} [0-9]{4} [0-9]{4}$").expect("card regex"));
static EXPIRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(0[1-9]|1[0-2])/[0-9]{2}$").expect("expiry regex"));
static CVV_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{3,4}$").expect("cvv regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogService {
    pub id: &'static str,
    pub name: &'static str,
    pub price_cents: i64,
}

impl CatalogService {
    pub fn price(&self) -> BigDecimal {
        BigDecimal::new(BigInt::from(self.price_cents), 2)
    }
}

pub const CATALOG: &[CatalogService] = &[
    CatalogService {
        id: "consulta-psicologica",
        name: "Consulta psicológica",
        price_cents: 8000,
    },
    CatalogService {
        id: "consulta-medica",
        name: "Consulta médica",
        price_cents: 12000,
    },
    CatalogService {
        id: "orientacao-juridica",
        name: "Orientação jurídica",
        price_cents: 6000,
    },
    CatalogService {
        id: "atendimento-social",
        name: "Atendimento social",
        price_cents: 4000,
    },
    CatalogService {
        id: "terapia-ocupacional",
        name: "Terapia ocupacional",
        price_cents: 9000,
    },
];

pub fn find_service(id: &str) -> Option<&'static CatalogService> {
    CATALOG.iter().find(|s| s.id == id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "cartao")]
    Card,
    #[serde(rename = "pix")]
    Pix,
    #[serde(rename = "boleto")]
    Boleto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutState {
    Loading,
    Idle,
    MethodChosen,
    Validating,
    Processing,
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardField {
    Number,
    Holder,
    Expiry,
    Cvv,
}

impl CardField {
    pub const ALL: [CardField; 4] = [
        CardField::Number,
        CardField::Holder,
        CardField::Expiry,
        CardField::Cvv,
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardForm {
    pub number: String,
    pub holder: String,
    pub expiry: String,
    pub cvv: String,
}

impl CardForm {
    fn get(&self, field: CardField) -> &str {
        match field {
            CardField::Number => &self.number,
            CardField::Holder => &self.holder,
            CardField::Expiry => &self.expiry,
            CardField::Cvv => &self.cvv,
        }
    }
}

pub fn validate_card_field(field: CardField, value: &str, today: NaiveDate) -> Validation {
    let value = value.trim();
    match field {
        CardField::Number if CARD_NUMBER_RE.is_match(value) => Validation::ok(),
        CardField::Number => {
            Validation::fail(format!("Número do cartão deve ter {} dígitos", CARD_DIGITS))
        }
        CardField::Holder => validate_name(value),
        CardField::Expiry => {
            if !EXPIRY_RE.is_match(value) {
                return Validation::fail("Validade deve estar no formato MM/AA");
            }
            let digits = only_digits(value);
            let month: u32 = digits[..2].parse().unwrap_or(0);
            let year: i32 = 2000 + digits[2..].parse::<i32>().unwrap_or(0);
            if (year, month) < (today.year(), today.month()) {
                Validation::fail("Cartão vencido")
            } else {
                Validation::ok()
            }
        }
        CardField::Cvv if CVV_RE.is_match(value) => Validation::ok(),
        CardField::Cvv => Validation::fail("CVV deve ter 3 ou 4 dígitos"),
    }
}

/// Picks the PIX key shown to the user among their email, their phone and a fixed key.
pub fn choose_pix_key<R: Rng + ?Sized>(user: Option<&UserData>, rng: &mut R) -> String {
    let candidates = [
        user.and_then(|u| u.email.clone()),
        user.and_then(|u| u.telefone.clone()),
        None,
    ];
    let pick = rng.gen_range(0..candidates.len());
    candidates[pick]
        .clone()
        .filter(|key| !key.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_PIX_KEY.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLine {
    pub id: String,
    pub name: String,
    pub price: String,
}

/// Stored under `lastPayment` once a checkout settles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: Uuid,
    pub services: Vec<PaymentLine>,
    pub total: String,
    pub method: PaymentMethod,
    pub paid_at: DateTime<Utc>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_last_digits: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pix_key: Option<String>,
}

fn decimal_string(amount: &BigDecimal) -> String {
    amount
        .with_scale_round(2, RoundingMode::HalfUp)
        .to_plain_string()
}

pub struct Checkout {
    store: ClientStore,
    notices: Notices,
    stage_delay: Duration,
    today: Option<NaiveDate>,
    state: CheckoutState,
    caption: Option<&'static str>,
    cart: Vec<&'static CatalogService>,
    user: Option<UserData>,
    method: Option<PaymentMethod>,
    card: CardForm,
    card_errors: HashMap<CardField, String>,
    pix_key: Option<String>,
    record: Option<PaymentRecord>,
}

impl Checkout {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            store: ctx.store.clone(),
            notices: ctx.notices.clone(),
            stage_delay: ctx.config.payment_stage_delay(),
            today: None,
            state: CheckoutState::Loading,
            caption: None,
            cart: Vec::new(),
            user: None,
            method: None,
            card: CardForm::default(),
            card_errors: HashMap::new(),
            pix_key: None,
            record: None,
        }
    }

    /// Pins "today" for card expiry checks.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    async fn stage(&mut self, caption: &'static str) {
        self.caption = Some(caption);
        tracing::debug!("Checkout stage: {}", caption);
        tokio::time::sleep(self.stage_delay).await;
    }

    /// Walks the loading stages, then reads the cart and the session user.
    pub async fn load(&mut self) {
        self.state = CheckoutState::Loading;
        for caption in LOAD_STAGES {
            self.stage(caption).await;
        }

        let ids = self.store.selected_services();
        self.cart = ids
            .iter()
            .filter_map(|id| {
                let service = find_service(id);
                if service.is_none() {
                    tracing::warn!("Ignoring unknown service '{}' in cart", id);
                }
                service
            })
            .collect();
        self.user = self.store.user_data();
        self.caption = None;
        self.state = CheckoutState::Idle;
        tracing::info!("Checkout loaded with {} services", self.cart.len());
    }

    // ---- queries ----

    pub fn state(&self) -> CheckoutState {
        self.state
    }

    pub fn caption(&self) -> Option<&'static str> {
        self.caption
    }

    pub fn cart(&self) -> &[&'static CatalogService] {
        &self.cart
    }

    pub fn total(&self) -> BigDecimal {
        self.cart.iter().map(|s| s.price()).sum()
    }

    pub fn total_display(&self) -> String {
        format_brl(&self.total())
    }

    pub fn method(&self) -> Option<PaymentMethod> {
        self.method
    }

    pub fn card(&self) -> &CardForm {
        &self.card
    }

    pub fn card_error(&self, field: CardField) -> Option<&str> {
        self.card_errors.get(&field).map(String::as_str)
    }

    pub fn pix_key(&self) -> Option<&str> {
        self.pix_key.as_deref()
    }

    pub fn boleto_advisory(&self) -> String {
        let due = self.today() + ChronoDuration::days(BOLETO_DUE_DAYS);
        format!(
            "O boleto vence em {}. A compensação pode levar até 3 dias úteis.",
            due.format("%d/%m/%Y")
        )
    }

    pub fn record(&self) -> Option<&PaymentRecord> {
        self.record.as_ref()
    }

    fn interactive(&self) -> bool {
        matches!(self.state, CheckoutState::Idle | CheckoutState::MethodChosen)
    }

    // ---- edits ----

    pub fn choose_method(&mut self, method: PaymentMethod) {
        self.choose_method_with_rng(method, &mut rand::thread_rng());
    }

    pub fn choose_method_with_rng<R: Rng + ?Sized>(&mut self, method: PaymentMethod, rng: &mut R) {
        if !self.interactive() {
            tracing::warn!("Ignoring method change while checkout is {:?}", self.state);
            return;
        }
        self.method = Some(method);
        self.state = CheckoutState::MethodChosen;
        self.pix_key = match method {
            PaymentMethod::Pix => Some(choose_pix_key(self.user.as_ref(), rng)),
            PaymentMethod::Card | PaymentMethod::Boleto => None,
        };
    }

    /// Masks and validates one card field.
    pub fn set_card_field(&mut self, field: CardField, raw: &str) {
        if !self.interactive() {
            return;
        }
        let value = match field {
            CardField::Number => format_card_number(raw),
            CardField::Expiry => format_card_expiry(raw),
            CardField::Cvv => only_digits(raw).chars().take(4).collect(),
            CardField::Holder => raw.to_string(),
        };
        let result = validate_card_field(field, &value, self.today());
        match field {
            CardField::Number => self.card.number = value,
            CardField::Holder => self.card.holder = value,
            CardField::Expiry => self.card.expiry = value,
            CardField::Cvv => self.card.cvv = value,
        }
        if result.valid {
            self.card_errors.remove(&field);
        } else {
            self.card_errors.insert(field, result.message);
        }
    }

    fn validate_card(&mut self) -> bool {
        let today = self.today();
        for field in CardField::ALL {
            let result = validate_card_field(field, self.card.get(field), today);
            if result.valid {
                self.card_errors.remove(&field);
            } else {
                self.card_errors.insert(field, result.message);
            }
        }
        self.card_errors.is_empty()
    }

    /// Back to the interactive form with an error notice.
    fn fail(&mut self, message: &str) -> AppError {
        self.state = if self.method.is_some() {
            CheckoutState::MethodChosen
        } else {
            CheckoutState::Idle
        };
        self.caption = None;
        tracing::warn!("Checkout failed: {}", message);
        self.notices.error("Erro no pagamento", message);
        AppError::BadRequest(message.to_string())
    }

    pub async fn submit(&mut self) -> Result<PaymentRecord, AppError> {
        if !self.interactive() {
            return Err(AppError::BadRequest(format!(
                "Checkout is not accepting submissions ({:?})",
                self.state
            )));
        }
        if self.cart.is_empty() {
            return Err(self.fail("Nenhum serviço selecionado"));
        }
        let Some(method) = self.method else {
            return Err(self.fail("Selecione uma forma de pagamento"));
        };

        self.state = CheckoutState::Validating;
        self.stage(VALIDATING_CAPTION).await;
        if method == PaymentMethod::Card && !self.validate_card() {
            return Err(self.fail("Verifique os dados do cartão"));
        }

        self.state = CheckoutState::Processing;
        for caption in PROCESSING_CAPTIONS {
            self.stage(caption).await;
        }

        let record = PaymentRecord {
            id: Uuid::new_v4(),
            services: self
                .cart
                .iter()
                .map(|s| PaymentLine {
                    id: s.id.to_string(),
                    name: s.name.to_string(),
                    price: decimal_string(&s.price()),
                })
                .collect(),
            total: decimal_string(&self.total()),
            method,
            paid_at: Utc::now(),
            status: "aprovado".to_string(),
            card_last_digits: (method == PaymentMethod::Card).then(|| {
                let digits = only_digits(&self.card.number);
                digits[digits.len().saturating_sub(4)..].to_string()
            }),
            pix_key: self.pix_key.clone(),
        };

        if let Err(e) = self.store.write(keys::LAST_PAYMENT, &record) {
            tracing::error!("Failed to store payment record: {}", e);
            return Err(self.fail(&e.user_message()));
        }
        if let Err(e) = self.store.clear_selected_services() {
            tracing::warn!("Failed to clear selected services: {}", e);
        }

        self.caption = None;
        self.state = CheckoutState::Settled;
        tracing::info!("Payment {} settled: {} via {:?}", record.id, record.total, method);
        self.notices.success(
            "Pagamento confirmado!",
            format!("Total pago: {}", self.total_display()),
        );
        self.record = Some(record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_catalog_prices() {
        let service = find_service("consulta-psicologica").unwrap();
        assert_eq!(format_brl(&service.price()), "R$ 80,00");
        assert!(find_service("massagem").is_none());
    }

    #[test]
    fn test_card_expiry_rules() {
        let today = day(2026, 10, 19);
        assert!(validate_card_field(CardField::Expiry, "10/26", today).valid);
        assert!(!validate_card_field(CardField::Expiry, "09/26", today).valid);
        assert!(!validate_card_field(CardField::Expiry, "13/30", today).valid);
        assert!(validate_card_field(CardField::Expiry, "01/31", today).valid);
    }

    #[test]
    fn test_card_number_and_cvv() {
        let today = day(2026, 10, 19);
        assert!(validate_card_field(CardField::Number, "4111 1111 1111 1111", today).valid);
        assert!(!validate_card_field(CardField::Number, "4111 1111 1111", today).valid);
        assert!(validate_card_field(CardField::Cvv, "123", today).valid);
        assert!(!validate_card_field(CardField::Cvv, "12", today).valid);
    }

    #[test]
    fn test_pix_key_comes_from_candidates() {
        let user = UserData {
            email: Some("maria@example.com".to_string()),
            telefone: Some("(11) 98765-4321".to_string()),
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let key = choose_pix_key(Some(&user), &mut rng);
            assert!(
                ["maria@example.com", "(11) 98765-4321", FALLBACK_PIX_KEY].contains(&key.as_str())
            );
        }
        assert_eq!(choose_pix_key(None, &mut rng), FALLBACK_PIX_KEY);
    }
}
