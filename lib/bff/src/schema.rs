//! Inbound payload schemas.
//!
//! Each route that accepts a body declares a [`Schema`]. The body is checked
//! before anything is sent to the backend; on success the original JSON is
//! forwarded untouched, so fields the console does not know about survive.

use campus_console_core::InstitutionId;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::FieldErrors;

/// A payload shape with field-level checks.
pub trait Schema: DeserializeOwned {
    /// Returns every rejected field, or `Ok` when the payload is acceptable.
    fn validate(&self) -> Result<(), FieldErrors>;
}

/// Decodes and validates `value` as `T`.
///
/// A body that does not even have the right shape is reported on the
/// `body` field.
pub fn parse<T: Schema>(value: &serde_json::Value) -> Result<T, FieldErrors> {
    let payload = T::deserialize(value).map_err(|e| {
        tracing::debug!(error = %e, "Inbound body does not match schema");
        FieldErrors::single("body", "Le corps de la requête est invalide")
    })?;
    payload.validate()?;
    Ok(payload)
}

/// Whether `target` is a local path safe to redirect to after login.
#[must_use]
pub fn is_local_path(target: &str) -> bool {
    target.starts_with('/') && !target.starts_with("//") && !target.contains('\\')
}

/// Accumulates field errors; the first failure per field is kept.
#[derive(Debug, Default)]
pub struct Rules {
    errors: FieldErrors,
}

impl Rules {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects blank values.
    #[must_use]
    pub fn required(mut self, field: &str, value: &str, message: &str) -> Self {
        if value.trim().is_empty() {
            self.errors.insert(field, message);
        }
        self
    }

    /// Rejects values shorter than `min` characters once trimmed.
    #[must_use]
    pub fn min_chars(mut self, field: &str, value: &str, min: usize, message: &str) -> Self {
        if value.trim().chars().count() < min {
            self.errors.insert(field, message);
        }
        self
    }

    /// Rejects values without a local part and a dotted domain.
    #[must_use]
    pub fn email(mut self, field: &str, value: &str, message: &str) -> Self {
        let valid = value
            .trim()
            .split_once('@')
            .is_some_and(|(local, domain)| {
                !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
            });
        if !valid {
            self.errors.insert(field, message);
        }
        self
    }

    /// Rejects the field when `failed` holds.
    #[must_use]
    pub fn check(mut self, field: &str, failed: bool, message: &str) -> Self {
        if failed {
            self.errors.insert(field, message);
        }
        self
    }

    pub fn finish(self) -> Result<(), FieldErrors> {
        self.errors.into_result()
    }
}

/// Credentials submitted on login.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
    /// Where to go once logged in; local paths only.
    pub redirect: Option<String>,
}

impl Schema for LoginPayload {
    fn validate(&self) -> Result<(), FieldErrors> {
        Rules::new()
            .required("email", &self.email, "L'adresse e-mail est obligatoire")
            .email("email", &self.email, "L'adresse e-mail est invalide")
            .required("password", &self.password, "Le mot de passe est obligatoire")
            .min_chars(
                "password",
                &self.password,
                6,
                "Le mot de passe doit contenir au moins 6 caractères",
            )
            .check(
                "redirect",
                self.redirect.as_deref().is_some_and(|r| !is_local_path(r)),
                "La redirection doit être un chemin local",
            )
            .finish()
    }
}

/// A token submitted for verification.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenPayload {
    pub token: String,
}

impl Schema for TokenPayload {
    fn validate(&self) -> Result<(), FieldErrors> {
        Rules::new()
            .required("token", &self.token, "Le jeton est obligatoire")
            .finish()
    }
}

/// Request to make another institution the active tenant.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SwitchInstitutionPayload {
    pub institution_id: String,
}

impl SwitchInstitutionPayload {
    /// The requested institution, once validated.
    pub fn id(&self) -> Result<InstitutionId, FieldErrors> {
        self.institution_id
            .parse()
            .map_err(|_| FieldErrors::single("institutionId", "Identifiant d'établissement invalide"))
    }
}

impl Schema for SwitchInstitutionPayload {
    fn validate(&self) -> Result<(), FieldErrors> {
        self.id().map(|_| ())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BranchPayload {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
}

impl Schema for BranchPayload {
    fn validate(&self) -> Result<(), FieldErrors> {
        Rules::new()
            .required("name", &self.name, "Le nom est obligatoire")
            .min_chars("name", &self.name, 3, "Le nom doit contenir au moins 3 caractères")
            .required("code", &self.code, "Le code est obligatoire")
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClassroomPayload {
    pub name: String,
    pub capacity: Option<u32>,
    pub building: Option<String>,
}

impl Schema for ClassroomPayload {
    fn validate(&self) -> Result<(), FieldErrors> {
        Rules::new()
            .required("name", &self.name, "Le nom est obligatoire")
            .check(
                "capacity",
                self.capacity == Some(0),
                "La capacité doit être supérieure à zéro",
            )
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InstitutePayload {
    pub name: String,
    pub code: String,
    pub university_id: Option<String>,
}

impl Schema for InstitutePayload {
    fn validate(&self) -> Result<(), FieldErrors> {
        Rules::new()
            .required("name", &self.name, "Le nom est obligatoire")
            .min_chars("name", &self.name, 3, "Le nom doit contenir au moins 3 caractères")
            .required("code", &self.code, "Le code est obligatoire")
            .check(
                "universityId",
                self.university_id.as_deref().is_some_and(|id| id.trim().is_empty()),
                "L'université de rattachement est invalide",
            )
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UniversityPayload {
    pub name: String,
    pub code: String,
    pub acronym: Option<String>,
}

impl Schema for UniversityPayload {
    fn validate(&self) -> Result<(), FieldErrors> {
        Rules::new()
            .required("name", &self.name, "Le nom est obligatoire")
            .min_chars("name", &self.name, 3, "Le nom doit contenir au moins 3 caractères")
            .required("code", &self.code, "Le code est obligatoire")
            .finish()
    }
}

/// A permission profile: a named bundle of capability strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfilePayload {
    pub name: String,
    pub description: Option<String>,
    pub authorizations: Vec<String>,
}

impl Schema for ProfilePayload {
    fn validate(&self) -> Result<(), FieldErrors> {
        Rules::new()
            .required("name", &self.name, "Le nom est obligatoire")
            .check(
                "authorizations",
                self.authorizations.iter().any(|a| a.trim().is_empty()),
                "Les autorisations ne peuvent pas être vides",
            )
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RolePayload {
    pub name: String,
    pub profile_id: String,
}

impl Schema for RolePayload {
    fn validate(&self) -> Result<(), FieldErrors> {
        Rules::new()
            .required("name", &self.name, "Le nom est obligatoire")
            .required("profileId", &self.profile_id, "Le profil est obligatoire")
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserPayload {
    pub name: String,
    pub email: String,
    pub role_id: String,
    pub institution_id: Option<String>,
}

impl Schema for UserPayload {
    fn validate(&self) -> Result<(), FieldErrors> {
        Rules::new()
            .required("name", &self.name, "Le nom est obligatoire")
            .required("email", &self.email, "L'adresse e-mail est obligatoire")
            .email("email", &self.email, "L'adresse e-mail est invalide")
            .required("roleId", &self.role_id, "Le rôle est obligatoire")
            .finish()
    }
}

/// Two programs to compare. The comparison itself is computed upstream.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComparisonPayload {
    pub source_program_id: String,
    pub target_program_id: String,
}

impl Schema for ComparisonPayload {
    fn validate(&self) -> Result<(), FieldErrors> {
        Rules::new()
            .required("sourceProgramId", &self.source_program_id, "Le programme source est obligatoire")
            .required("targetProgramId", &self.target_program_id, "Le programme cible est obligatoire")
            .check(
                "targetProgramId",
                !self.source_program_id.trim().is_empty()
                    && self.source_program_id.trim() == self.target_program_id.trim(),
                "Les deux programmes doivent être différents",
            )
            .finish()
    }
}
