//! Field validation shared by every form.
//!
//! Each field maps to a fixed rule. Validators never fail: they return a
//! [`Validation`] and the caller records it in its [`FieldStates`].

use crate::formatters::only_digits;
use crate::models::{Field, RegistrationForm};
use chrono::{Datelike, Local, NaiveDate};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

pub const MIN_AGE: i32 = 16;
pub const MAX_AGE: i32 = 120;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\s]+$").expect("name regex"));
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));
static PHONE_MASKED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\([0-9]{2}\) [0-9]{4,5}-[0-9]{4}$").expect("phone regex"));
static PHONE_BARE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{10,11}$").expect("phone regex"));
static CPF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{3}\.[0-9]{3}\.[0-9]{3}-[0-9]{2}$").expect("cpf regex")
});
static CEP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{5}-[0-9]{3}$").expect("cep regex"));

/// Known-invalid CPFs that pass the checksum, such as repeated digits.
const CPF_DENYLIST: [&str; 16] = [
    "00000000000",
    "11111111111",
    "22222222222",
    "33333333333",
    "44444444444",
    "55555555555",
    "66666666666",
    "77777777777",
    "88888888888",
    "99999999999",
    "12345678909",
    "01234567890",
    "12345678900",
    "98765432100",
    "10987654321",
    "12312312312",
];

/// Outcome of validating one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub message: String,
}

impl Validation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            message: String::new(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
        }
    }
}

/// Visual state of an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldStatus {
    Valid,
    Invalid,
    #[default]
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldState {
    pub status: FieldStatus,
    pub message: String,
}

/// Per-field error and visual-state maps, derived from the form and never persisted.
#[derive(Debug, Clone, Default)]
pub struct FieldStates {
    states: HashMap<Field, FieldState>,
}

impl FieldStates {
    pub fn record(&mut self, field: Field, result: &Validation) {
        let state = if result.valid {
            FieldState {
                status: FieldStatus::Valid,
                message: String::new(),
            }
        } else {
            FieldState {
                status: FieldStatus::Invalid,
                message: result.message.clone(),
            }
        };
        self.states.insert(field, state);
    }

    pub fn set_error(&mut self, field: Field, message: impl Into<String>) {
        self.states.insert(
            field,
            FieldState {
                status: FieldStatus::Invalid,
                message: message.into(),
            },
        );
    }

    pub fn mark_valid(&mut self, field: Field) {
        self.record(field, &Validation::ok());
    }

    /// Back to the untouched state.
    pub fn reset(&mut self, field: Field) {
        self.states.remove(&field);
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }

    pub fn get(&self, field: Field) -> FieldState {
        self.states.get(&field).cloned().unwrap_or_default()
    }

    pub fn status(&self, field: Field) -> FieldStatus {
        self.states
            .get(&field)
            .map(|s| s.status)
            .unwrap_or_default()
    }

    pub fn error(&self, field: Field) -> Option<&str> {
        self.states
            .get(&field)
            .filter(|s| s.status == FieldStatus::Invalid)
            .map(|s| s.message.as_str())
    }

    pub fn has_error(&self, field: Field) -> bool {
        self.error(field).is_some()
    }

    /// Fields currently flagged invalid, in declaration order.
    pub fn invalid_fields(&self) -> Vec<Field> {
        let mut fields: Vec<Field> = self
            .states
            .iter()
            .filter(|(_, s)| s.status == FieldStatus::Invalid)
            .map(|(f, _)| *f)
            .collect();
        fields.sort();
        fields
    }
}

/// Which phone numbers a call site accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneRule {
    /// 10 (landline) or 11 (mobile) digits.
    LandlineOrMobile,
    /// Exactly 11 digits.
    MobileOnly,
}

/// Rule set for one form.
#[derive(Debug, Clone)]
pub struct FieldValidator {
    phone_rule: PhoneRule,
    today: Option<NaiveDate>,
}

impl FieldValidator {
    pub fn new(phone_rule: PhoneRule) -> Self {
        Self {
            phone_rule,
            today: None,
        }
    }

    /// Pins "today" for age checks.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn validate(&self, field: Field, value: &str) -> Validation {
        match field {
            Field::Nome => validate_name(value),
            Field::Email => validate_email(value),
            Field::Telefone => validate_phone(value, self.phone_rule),
            Field::Cpf => validate_cpf(value),
            Field::Cep => validate_cep(value),
            Field::DataNascimento => validate_birth_date(value, self.today()),
            Field::Complemento | Field::RegistroProfissional | Field::Motivacao => {
                Validation::ok()
            }
            Field::Renda
            | Field::Rua
            | Field::Numero
            | Field::Bairro
            | Field::Cidade
            | Field::Estado
            | Field::AreaOrientacao
            | Field::ComoSoube
            | Field::Profissao => validate_required(value, field.label()),
        }
    }

    /// Re-runs the rule of every listed field; returns the failures.
    pub fn validate_all(
        &self,
        form: &RegistrationForm,
        fields: &[Field],
        states: &mut FieldStates,
    ) -> Vec<Field> {
        let mut failed = Vec::new();
        for &field in fields {
            let result = self.validate(field, form.get(field));
            states.record(field, &result);
            if !result.valid {
                failed.push(field);
            }
        }
        failed
    }
}

pub fn validate_required(value: &str, label: &str) -> Validation {
    if value.trim().is_empty() {
        Validation::fail(format!("{} é obrigatório", label))
    } else {
        Validation::ok()
    }
}

pub fn validate_name(value: &str) -> Validation {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Validation::fail("Nome é obrigatório");
    }
    if trimmed.chars().count() < 3 {
        return Validation::fail("Nome deve ter pelo menos 3 caracteres");
    }
    if !NAME_RE.is_match(trimmed) {
        return Validation::fail("Nome deve conter apenas letras e espaços");
    }
    Validation::ok()
}

pub fn validate_email(value: &str) -> Validation {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Validation::fail("Email é obrigatório");
    }
    if !EMAIL_RE.is_match(trimmed) {
        return Validation::fail("Email inválido");
    }
    Validation::ok()
}

pub fn validate_phone(value: &str, rule: PhoneRule) -> Validation {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Validation::fail("Telefone é obrigatório");
    }
    if !PHONE_MASKED_RE.is_match(trimmed) && !PHONE_BARE_RE.is_match(trimmed) {
        return Validation::fail("Telefone deve estar no formato (00) 00000-0000");
    }

    let digits = only_digits(trimmed).len();
    match rule {
        PhoneRule::LandlineOrMobile if digits == 10 || digits == 11 => Validation::ok(),
        PhoneRule::MobileOnly if digits == 11 => Validation::ok(),
        PhoneRule::MobileOnly => Validation::fail("Informe um celular com DDD (11 dígitos)"),
        PhoneRule::LandlineOrMobile => Validation::fail("Telefone deve ter 10 ou 11 dígitos"),
    }
}

/// True for the fixed list of known-invalid sequences.
pub fn is_denylisted_cpf(digits: &str) -> bool {
    CPF_DENYLIST.contains(&digits)
}

fn cpf_check_digit(digits: &[u32], first_weight: u32) -> u32 {
    let sum: u32 = digits
        .iter()
        .zip((2..=first_weight).rev())
        .map(|(d, w)| d * w)
        .sum();
    let remainder = (sum * 10) % 11;
    if remainder >= 10 {
        0
    } else {
        remainder
    }
}

/// Two-pass mod-11 check over an 11-digit string.
pub fn cpf_checksum_ok(digits: &str) -> bool {
    if digits.len() != 11 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let nums: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();

    let first = cpf_check_digit(&nums[..9], 10);
    if first != nums[9] {
        return false;
    }
    let second = cpf_check_digit(&nums[..10], 11);
    second == nums[10]
}

pub fn validate_cpf(value: &str) -> Validation {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Validation::fail("CPF é obrigatório");
    }
    if !CPF_RE.is_match(trimmed) {
        return Validation::fail("CPF deve estar no formato 000.000.000-00");
    }

    let digits = only_digits(trimmed);
    if is_denylisted_cpf(&digits) {
        tracing::debug!("Rejected denylisted CPF sequence");
        return Validation::fail("CPF inválido");
    }
    if !cpf_checksum_ok(&digits) {
        return Validation::fail("CPF inválido");
    }
    Validation::ok()
}

pub fn validate_cep(value: &str) -> Validation {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Validation::fail("CEP é obrigatório");
    }
    if !CEP_RE.is_match(trimmed) {
        return Validation::fail("CEP deve estar no formato 00000-000");
    }
    Validation::ok()
}

/// Parses `YYYY-MM-DD` (date input) or `DD/MM/YYYY`.
pub fn parse_birth_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d/%m/%Y"))
        .ok()
}

/// Whole years between `birth` and `today`, by calendar difference.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

pub fn validate_birth_date(value: &str, today: NaiveDate) -> Validation {
    if value.trim().is_empty() {
        return Validation::fail("Data de nascimento é obrigatória");
    }
    let Some(birth) = parse_birth_date(value) else {
        return Validation::fail("Data de nascimento inválida");
    };
    if birth > today {
        return Validation::fail("Data de nascimento não pode ser no futuro");
    }

    let age = age_on(birth, today);
    if !(MIN_AGE..=MAX_AGE).contains(&age) {
        return Validation::fail(format!(
            "Idade deve estar entre {} e {} anos",
            MIN_AGE, MAX_AGE
        ));
    }
    Validation::ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_cpf_known_valid() {
        assert!(validate_cpf("111.444.777-35").valid);
        assert!(cpf_checksum_ok("52998224725"));
    }

    #[test]
    fn test_cpf_wrong_check_digits() {
        let result = validate_cpf("111.444.777-36");
        assert!(!result.valid);
        assert_eq!(result.message, "CPF inválido");
    }

    #[test]
    fn test_cpf_requires_mask() {
        let result = validate_cpf("11144477735");
        assert!(!result.valid);
        assert!(result.message.contains("formato"));
    }

    #[test]
    fn test_cpf_denylist_overrides_checksum() {
        // Same-digit sequences satisfy the checksum but must still be rejected.
        assert!(cpf_checksum_ok("11111111111"));
        assert!(!validate_cpf("111.111.111-11").valid);
        assert!(!validate_cpf("123.456.789-09").valid);
    }

    #[test]
    fn test_name_rules() {
        assert!(validate_name("José da Conceição").valid);
        assert!(!validate_name("  ").valid);
        assert!(!validate_name("Jo").valid);
        assert!(!validate_name("Ana 2").valid);
    }

    #[test]
    fn test_phone_rules() {
        assert!(validate_phone("(11) 98765-4321", PhoneRule::LandlineOrMobile).valid);
        assert!(validate_phone("(11) 3333-4444", PhoneRule::LandlineOrMobile).valid);
        assert!(validate_phone("1133334444", PhoneRule::LandlineOrMobile).valid);
        assert!(!validate_phone("(11) 3333-4444", PhoneRule::MobileOnly).valid);
        assert!(validate_phone("(11) 98765-4321", PhoneRule::MobileOnly).valid);
        assert!(!validate_phone("(11) 9876", PhoneRule::LandlineOrMobile).valid);
    }

    #[test]
    fn test_birth_date_bounds() {
        let today = day(2026, 10, 19);
        assert!(validate_birth_date("2010-10-19", today).valid); // exactly 16
        assert!(!validate_birth_date("2010-10-20", today).valid); // one day short of 16
        assert!(!validate_birth_date("2027-01-01", today).valid);
        assert!(!validate_birth_date("1900-01-01", today).valid);
        assert!(validate_birth_date("19/10/1990", today).valid);
        assert!(!validate_birth_date("1990-13-40", today).valid);
    }

    #[test]
    fn test_age_uses_calendar_difference() {
        assert_eq!(age_on(day(2000, 2, 29), day(2016, 2, 28)), 15);
        assert_eq!(age_on(day(2000, 2, 29), day(2016, 2, 29)), 16);
    }

    #[test]
    fn test_field_states_track_errors() {
        let validator = FieldValidator::new(PhoneRule::LandlineOrMobile);
        let mut states = FieldStates::default();
        states.record(Field::Cep, &validator.validate(Field::Cep, "0131"));
        assert_eq!(states.status(Field::Cep), FieldStatus::Invalid);
        assert!(states.has_error(Field::Cep));

        states.record(Field::Cep, &validator.validate(Field::Cep, "01310-100"));
        assert_eq!(states.status(Field::Cep), FieldStatus::Valid);
        assert_eq!(states.error(Field::Cep), None);

        states.reset(Field::Cep);
        assert_eq!(states.status(Field::Cep), FieldStatus::Default);
    }
}
