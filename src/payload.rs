//! Second-phase submission payloads.
//!
//! The form keeps user-facing masks; the backend wants digits, split phone
//! parts and a numeric income range.

use crate::errors::AppError;
use crate::formatters::only_digits;
use crate::models::RegistrationForm;
use crate::validation::parse_birth_date;
use bigdecimal::num_bigint::BigInt;
use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use serde::Serialize;

/// Statutory minimum wage, in centavos, used to turn income brackets into ranges.
pub const MIN_WAGE_CENTS: i64 = 151_800;

/// `count` minimum wages in reais.
pub fn wages(count: i64) -> BigDecimal {
    BigDecimal::new(BigInt::from(MIN_WAGE_CENTS * count), 2)
}

pub const TIPO_NAO_CLASSIFICADO: &str = "NAO_CLASSIFICADO";
pub const TIPO_VOLUNTARIO: &str = "VOLUNTARIO";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhoneParts {
    pub ddd: String,
    pub prefixo: String,
    pub sufixo: String,
    pub whatsapp: bool,
}

/// Splits a phone by digit count: 11 digits is a mobile (`ddd` + 5 + 4,
/// WhatsApp assumed), 10 digits a landline (`ddd` + 4 + 4).
pub fn split_phone(raw: &str) -> Option<PhoneParts> {
    let digits = only_digits(raw);
    let prefix_len = match digits.len() {
        11 => 5,
        10 => 4,
        _ => return None,
    };
    Some(PhoneParts {
        ddd: digits[..2].to_string(),
        prefixo: digits[2..2 + prefix_len].to_string(),
        sufixo: digits[2 + prefix_len..].to_string(),
        whatsapp: digits.len() == 11,
    })
}

/// Income bracket value -> (minimum, maximum). `None` maximum means unbounded.
pub fn income_range(bracket: &str) -> Option<(BigDecimal, Option<BigDecimal>)> {
    let range = match bracket {
        "sem-renda" => (BigDecimal::zero(), Some(BigDecimal::zero())),
        "ate-1-salario" => (BigDecimal::zero(), Some(wages(1))),
        "1-a-2-salarios" => (wages(1), Some(wages(2))),
        "2-a-3-salarios" => (wages(2), Some(wages(3))),
        "3-a-5-salarios" => (wages(3), Some(wages(5))),
        "acima-5-salarios" => (wages(5), None),
        _ => return None,
    };
    Some(range)
}

/// The backend takes income as a JSON number.
fn income_number(amount: &BigDecimal) -> Result<f64, AppError> {
    amount
        .to_f64()
        .ok_or_else(|| AppError::InternalError(format!("Renda fora do intervalo: {}", amount)))
}

/// Initial password for users created by the second phase:
/// first three CPF digits followed by the birth-date digits.
///
/// Predictable from data the user just typed. Kept because the login flow
/// tells new users to expect this format.
pub fn generate_password(cpf: &str, birth_date: &str) -> String {
    let cpf_digits = only_digits(cpf);
    let prefix: String = cpf_digits.chars().take(3).collect();
    format!("{}{}", prefix, only_digits(birth_date))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressPayload {
    pub cep: String,
    pub rua: String,
    pub numero: String,
    pub complemento: String,
    pub bairro: String,
    pub cidade: String,
    pub estado: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondPhasePayload {
    pub nome: String,
    pub email: String,
    pub cpf: String,
    pub data_nascimento: String,
    pub telefone: PhoneParts,
    pub endereco: AddressPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renda_minima: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renda_maxima: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_orientacao: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub como_soube: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quer_ser_voluntario: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profissao: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registro_profissional: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motivacao: Option<String>,
    pub tipo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub senha: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn common_payload(form: &RegistrationForm, tipo: &str) -> Result<SecondPhasePayload, AppError> {
    let telefone = split_phone(&form.telefone)
        .ok_or_else(|| AppError::BadRequest("Telefone deve ter 10 ou 11 dígitos".to_string()))?;
    let data_nascimento = parse_birth_date(&form.data_nascimento)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .ok_or_else(|| AppError::BadRequest("Data de nascimento inválida".to_string()))?;

    Ok(SecondPhasePayload {
        nome: form.nome.trim().to_string(),
        email: form.email.trim().to_string(),
        cpf: only_digits(&form.cpf),
        data_nascimento,
        telefone,
        endereco: AddressPayload {
            cep: only_digits(&form.cep),
            rua: form.rua.trim().to_string(),
            numero: form.numero.trim().to_string(),
            complemento: form.complemento.trim().to_string(),
            bairro: form.bairro.trim().to_string(),
            cidade: form.cidade.trim().to_string(),
            estado: form.estado.trim().to_string(),
        },
        renda_minima: None,
        renda_maxima: None,
        area_orientacao: None,
        como_soube: None,
        quer_ser_voluntario: None,
        profissao: None,
        registro_profissional: None,
        motivacao: None,
        tipo: tipo.to_string(),
        senha: None,
    })
}

/// Builds the assisted-user payload. `senha` is set only for brand-new users.
pub fn assisted_payload(
    form: &RegistrationForm,
    senha: Option<String>,
) -> Result<SecondPhasePayload, AppError> {
    let (min, max) = income_range(form.renda.trim())
        .ok_or_else(|| AppError::BadRequest(format!("Faixa de renda desconhecida: {}", form.renda)))?;

    let mut payload = common_payload(form, TIPO_NAO_CLASSIFICADO)?;
    payload.renda_minima = Some(income_number(&min)?);
    payload.renda_maxima = max.as_ref().map(income_number).transpose()?;
    payload.area_orientacao = non_empty(&form.area_orientacao);
    payload.como_soube = non_empty(&form.como_soube);
    payload.quer_ser_voluntario = Some(form.quer_ser_voluntario);
    payload.senha = senha;
    Ok(payload)
}

pub fn volunteer_payload(form: &RegistrationForm) -> Result<SecondPhasePayload, AppError> {
    let mut payload = common_payload(form, TIPO_VOLUNTARIO)?;
    payload.profissao = non_empty(&form.profissao);
    payload.registro_profissional = non_empty(&form.registro_profissional);
    payload.motivacao = non_empty(&form.motivacao);
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_form() -> RegistrationForm {
        RegistrationForm {
            nome: "Maria Souza".to_string(),
            telefone: "(11) 98765-4321".to_string(),
            data_nascimento: "1990-05-15".to_string(),
            cpf: "111.444.777-35".to_string(),
            renda: "1-a-2-salarios".to_string(),
            email: "maria@example.com".to_string(),
            cep: "01310-100".to_string(),
            rua: "Avenida Paulista".to_string(),
            numero: "1000".to_string(),
            bairro: "Bela Vista".to_string(),
            cidade: "São Paulo".to_string(),
            estado: "SP".to_string(),
            area_orientacao: "juridica".to_string(),
            como_soube: "indicacao".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_split_mobile_and_landline() {
        let mobile = split_phone("(11) 98765-4321").unwrap();
        assert_eq!(
            (mobile.ddd.as_str(), mobile.prefixo.as_str(), mobile.sufixo.as_str()),
            ("11", "98765", "4321")
        );
        assert!(mobile.whatsapp);

        let landline = split_phone("(11) 3333-4444").unwrap();
        assert_eq!(landline.prefixo, "3333");
        assert!(!landline.whatsapp);

        assert_eq!(split_phone("9876"), None);
    }

    #[test]
    fn test_income_table() {
        let reais = |s: &str| s.parse::<BigDecimal>().unwrap();
        assert_eq!(
            income_range("sem-renda"),
            Some((reais("0"), Some(reais("0"))))
        );
        assert_eq!(
            income_range("1-a-2-salarios"),
            Some((reais("1518"), Some(reais("3036"))))
        );
        assert_eq!(
            income_range("3-a-5-salarios"),
            Some((reais("4554.00"), Some(reais("7590"))))
        );
        assert_eq!(income_range("acima-5-salarios"), Some((reais("7590"), None)));
        assert_eq!(income_range("muito"), None);
    }

    #[test]
    fn test_generated_password() {
        assert_eq!(generate_password("111.444.777-35", "1990-05-15"), "11119900515");
    }

    #[test]
    fn test_assisted_payload_shape() {
        let payload = assisted_payload(&filled_form(), Some("11119900515".to_string())).unwrap();
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["cpf"], "11144477735");
        assert_eq!(json["endereco"]["cep"], "01310100");
        assert_eq!(json["telefone"]["ddd"], "11");
        assert_eq!(json["rendaMinima"], 1518.0);
        assert_eq!(json["rendaMaxima"], 3036.0);
        assert_eq!(json["tipo"], "NAO_CLASSIFICADO");
        assert_eq!(json["senha"], "11119900515");
        assert!(json.get("profissao").is_none());
    }

    #[test]
    fn test_unknown_income_bracket_rejected() {
        let mut form = filled_form();
        form.renda = "muito".to_string();
        assert!(matches!(
            assisted_payload(&form, None),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_volunteer_payload_has_no_income() {
        let mut form = filled_form();
        form.profissao = "Psicóloga".to_string();
        let json = serde_json::to_value(volunteer_payload(&form).unwrap()).unwrap();
        assert_eq!(json["tipo"], "VOLUNTARIO");
        assert_eq!(json["profissao"], "Psicóloga");
        assert!(json.get("rendaMinima").is_none());
        assert!(json.get("senha").is_none());
    }
}
