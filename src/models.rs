use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============ Registration Form ============

/// Text fields of the registration forms, keyed by their draft/JSON names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Nome,
    Telefone,
    DataNascimento,
    Cpf,
    Renda,
    Email,
    Cep,
    Rua,
    Numero,
    Complemento,
    Bairro,
    Cidade,
    Estado,
    AreaOrientacao,
    ComoSoube,
    Profissao,
    RegistroProfissional,
    Motivacao,
}

impl Field {
    pub const ALL: [Field; 18] = [
        Field::Nome,
        Field::Telefone,
        Field::DataNascimento,
        Field::Cpf,
        Field::Renda,
        Field::Email,
        Field::Cep,
        Field::Rua,
        Field::Numero,
        Field::Complemento,
        Field::Bairro,
        Field::Cidade,
        Field::Estado,
        Field::AreaOrientacao,
        Field::ComoSoube,
        Field::Profissao,
        Field::RegistroProfissional,
        Field::Motivacao,
    ];

    /// Key used in drafts and in the first-phase payload.
    pub fn key(self) -> &'static str {
        match self {
            Field::Nome => "nome",
            Field::Telefone => "telefone",
            Field::DataNascimento => "dataNascimento",
            Field::Cpf => "cpf",
            Field::Renda => "renda",
            Field::Email => "email",
            Field::Cep => "cep",
            Field::Rua => "rua",
            Field::Numero => "numero",
            Field::Complemento => "complemento",
            Field::Bairro => "bairro",
            Field::Cidade => "cidade",
            Field::Estado => "estado",
            Field::AreaOrientacao => "areaOrientacao",
            Field::ComoSoube => "comoSoube",
            Field::Profissao => "profissao",
            Field::RegistroProfissional => "registroProfissional",
            Field::Motivacao => "motivacao",
        }
    }

    pub fn from_key(key: &str) -> Option<Field> {
        Field::ALL.iter().copied().find(|f| f.key() == key)
    }

    /// Human label used in "é obrigatório" messages.
    pub fn label(self) -> &'static str {
        match self {
            Field::Nome => "Nome",
            Field::Telefone => "Telefone",
            Field::DataNascimento => "Data de nascimento",
            Field::Cpf => "CPF",
            Field::Renda => "Renda familiar",
            Field::Email => "Email",
            Field::Cep => "CEP",
            Field::Rua => "Endereço",
            Field::Numero => "Número",
            Field::Complemento => "Complemento",
            Field::Bairro => "Bairro",
            Field::Cidade => "Cidade",
            Field::Estado => "Estado",
            Field::AreaOrientacao => "Área de orientação",
            Field::ComoSoube => "Como soube",
            Field::Profissao => "Profissão",
            Field::RegistroProfissional => "Registro profissional",
            Field::Motivacao => "Motivação",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Flat registration form shared by the assisted-user and volunteer variants.
///
/// Serialized as-is into the auto-save draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationForm {
    pub nome: String,
    pub telefone: String,
    pub data_nascimento: String,
    pub cpf: String,
    pub renda: String,
    pub email: String,
    pub cep: String,
    pub rua: String,
    pub numero: String,
    pub complemento: String,
    pub bairro: String,
    pub cidade: String,
    pub estado: String,
    pub area_orientacao: String,
    pub como_soube: String,
    pub quer_ser_voluntario: bool,
    pub profissao: String,
    pub registro_profissional: String,
    pub motivacao: String,
}

impl RegistrationForm {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Nome => &self.nome,
            Field::Telefone => &self.telefone,
            Field::DataNascimento => &self.data_nascimento,
            Field::Cpf => &self.cpf,
            Field::Renda => &self.renda,
            Field::Email => &self.email,
            Field::Cep => &self.cep,
            Field::Rua => &self.rua,
            Field::Numero => &self.numero,
            Field::Complemento => &self.complemento,
            Field::Bairro => &self.bairro,
            Field::Cidade => &self.cidade,
            Field::Estado => &self.estado,
            Field::AreaOrientacao => &self.area_orientacao,
            Field::ComoSoube => &self.como_soube,
            Field::Profissao => &self.profissao,
            Field::RegistroProfissional => &self.registro_profissional,
            Field::Motivacao => &self.motivacao,
        }
    }

    pub fn set(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::Nome => &mut self.nome,
            Field::Telefone => &mut self.telefone,
            Field::DataNascimento => &mut self.data_nascimento,
            Field::Cpf => &mut self.cpf,
            Field::Renda => &mut self.renda,
            Field::Email => &mut self.email,
            Field::Cep => &mut self.cep,
            Field::Rua => &mut self.rua,
            Field::Numero => &mut self.numero,
            Field::Complemento => &mut self.complemento,
            Field::Bairro => &mut self.bairro,
            Field::Cidade => &mut self.cidade,
            Field::Estado => &mut self.estado,
            Field::AreaOrientacao => &mut self.area_orientacao,
            Field::ComoSoube => &mut self.como_soube,
            Field::Profissao => &mut self.profissao,
            Field::RegistroProfissional => &mut self.registro_profissional,
            Field::Motivacao => &mut self.motivacao,
        };
        *slot = value;
    }

    /// Copies every non-empty value of `draft` over this form.
    pub fn merge_from(&mut self, draft: &RegistrationForm) {
        for field in Field::ALL {
            let value = draft.get(field);
            if !value.trim().is_empty() {
                self.set(field, value.to_string());
            }
        }
        if draft.quer_ser_voluntario {
            self.quer_ser_voluntario = true;
        }
    }
}

// ============ Backend Resources ============

/// Backend identifiers arrive as numbers or strings depending on the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Number(n)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        s.parse::<i64>()
            .map(RecordId::Number)
            .unwrap_or_else(|_| RecordId::Text(s.to_string()))
    }
}

/// Record created by the first registration phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FirstPhaseRecord {
    pub id: Option<RecordId>,
    pub nome: Option<String>,
    pub email: Option<String>,
    pub cpf: Option<String>,
    pub telefone: Option<String>,
    pub data_nascimento: Option<String>,
}

impl FirstPhaseRecord {
    /// Non-empty values this record provides, keyed by form field.
    pub fn provided_fields(&self) -> Vec<(Field, String)> {
        [
            (Field::Nome, &self.nome),
            (Field::Email, &self.email),
            (Field::Cpf, &self.cpf),
            (Field::Telefone, &self.telefone),
            (Field::DataNascimento, &self.data_nascimento),
        ]
        .into_iter()
        .filter_map(|(field, value)| {
            value
                .as_ref()
                .filter(|v| !v.trim().is_empty())
                .map(|v| (field, v.clone()))
        })
        .collect()
    }
}

/// Response of `GET /usuarios/verificar-cadastro`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationCheck {
    pub cadastrado: bool,
    pub id: Option<RecordId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pendente,
    Aprovado,
    Reprovado,
}

/// Classification assigned by the social worker on approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateType {
    #[serde(rename = "multidisciplinar")]
    Multidisciplinar,
    #[serde(rename = "valor_social")]
    ValorSocial,
}

impl CandidateType {
    pub fn as_str(self) -> &'static str {
        match self {
            CandidateType::Multidisciplinar => "multidisciplinar",
            CandidateType::ValorSocial => "valor_social",
        }
    }
}

/// A submitted registration awaiting a social-worker decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingApplication {
    pub id: RecordId,
    #[serde(default)]
    pub id_usuario: Option<RecordId>,
    pub nome: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub cpf: Option<String>,
    #[serde(default)]
    pub telefone: Option<String>,
    pub status: ApplicationStatus,
    #[serde(default)]
    pub data_envio: Option<String>,
    #[serde(default)]
    pub voluntario: bool,
    #[serde(default)]
    pub tipo_candidato: Option<CandidateType>,
    #[serde(default)]
    pub motivo_reprovacao: Option<String>,
}

impl PendingApplication {
    /// Parses `dataEnvio`, accepting RFC 3339 and the backend's naive timestamps.
    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.data_envio.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
            })
            .or_else(|_| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                    .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
            })
            .ok()
    }

    /// User id to continue registration with; falls back to the form id.
    pub fn user_id(&self) -> &RecordId {
        self.id_usuario.as_ref().unwrap_or(&self.id)
    }
}

// ============ Local Session ============

/// JSON blob stored under the `userData` key after login.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserData {
    pub token: Option<String>,
    pub id: Option<RecordId>,
    pub nome: Option<String>,
    pub email: Option<String>,
    pub telefone: Option<String>,
    pub tipo: Option<String>,
}

// ============ Professional Profile ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalData {
    pub nome: String,
    pub email: String,
    pub telefone: String,
    pub data_nascimento: String,
    pub cpf: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfessionalData {
    pub profissao: String,
    /// CRP/CRM council registration number.
    pub registro_conselho: String,
    pub especialidades: Vec<String>,
    pub biografia: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressData {
    pub cep: String,
    pub rua: String,
    pub numero: String,
    pub complemento: String,
    pub bairro: String,
    pub cidade: String,
    pub estado: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhotoData {
    pub foto_url: Option<String>,
}

/// A professional's editable record, one section per editor tab.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileData {
    pub dados_pessoais: PersonalData,
    pub dados_profissionais: ProfessionalData,
    pub endereco: AddressData,
    pub foto: PhotoData,
}
