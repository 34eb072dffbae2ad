//! Client-side field validation
//!
//! Every validator is a pure function of its input. Failures carry the
//! Spanish message shown next to the offending field; nothing here touches
//! the network.

use std::collections::BTreeMap;
use std::fmt;

pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const INCIDENT_DESCRIPTION_MAX_LENGTH: usize = 500;

/// Result of a single field check
pub type FieldResult = Result<(), &'static str>;

/// Phone numbers are 9 digits and start with `9`.
pub fn validate_phone(phone: &str) -> FieldResult {
    if phone.len() != 9 || !phone.bytes().all(|b| b.is_ascii_digit()) {
        return Err("El teléfono debe tener 9 dígitos");
    }
    if !phone.starts_with('9') {
        return Err("El teléfono debe comenzar con 9");
    }
    Ok(())
}

/// Passwords need an uppercase letter, a lowercase letter, a digit and a symbol.
pub fn validate_password(password: &str) -> FieldResult {
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        return Err("La contraseña debe tener al menos 8 caracteres");
    }
    if !password.chars().any(char::is_uppercase) {
        return Err("La contraseña debe contener una letra mayúscula");
    }
    if !password.chars().any(char::is_lowercase) {
        return Err("La contraseña debe contener una letra minúscula");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("La contraseña debe contener un número");
    }
    if !password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
    {
        return Err("La contraseña debe contener un símbolo");
    }
    Ok(())
}

/// Confirmation must match the password exactly.
pub fn validate_password_confirmation(password: &str, confirmation: &str) -> FieldResult {
    if password == confirmation {
        Ok(())
    } else {
        Err("Las contraseñas no coinciden")
    }
}

pub fn validate_email(email: &str) -> FieldResult {
    const INVALID: &str = "Ingresa un correo electrónico válido";

    if email.chars().any(char::is_whitespace) {
        return Err(INVALID);
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(INVALID);
    };
    if local.is_empty() || domain.contains('@') {
        return Err(INVALID);
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(INVALID);
    }
    Ok(())
}

/// DNI: exactly 8 digits.
pub fn validate_document(document: &str) -> FieldResult {
    if document.len() == 8 && document.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err("El DNI debe tener 8 dígitos")
    }
}

/// License plates are six alphanumerics, written either `ABC123` or `ABC-123`.
pub fn validate_license_plate(plate: &str) -> FieldResult {
    const INVALID: &str = "Ingresa una placa válida (ej. ABC-123)";

    let compact: String = match plate.split_once('-') {
        Some((head, tail)) if head.len() == 3 => format!("{head}{tail}"),
        Some(_) => return Err(INVALID),
        None => plate.to_string(),
    };
    if compact.len() == 6 && compact.bytes().all(|b| b.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(INVALID)
    }
}

/// Canonical upper-case form without the hyphen, as the backend stores it.
pub fn normalize_license_plate(plate: &str) -> String {
    plate.replace('-', "").to_ascii_uppercase()
}

/// Verification codes sent by SMS or email are 6 digits.
pub fn validate_verification_code(code: &str) -> FieldResult {
    if code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err("El código debe tener 6 dígitos")
    }
}

pub fn validate_rating_score(score: u8) -> FieldResult {
    if (1..=5).contains(&score) {
        Ok(())
    } else {
        Err("La calificación debe estar entre 1 y 5")
    }
}

pub fn validate_incident_description(description: &str) -> FieldResult {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Err("Describe el incidente");
    }
    if trimmed.chars().count() > INCIDENT_DESCRIPTION_MAX_LENGTH {
        return Err("La descripción no puede superar los 500 caracteres");
    }
    Ok(())
}

/// Field-level validation messages, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ValidationErrors {
    fields: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a field check, keeping the first failure per field
    pub fn check(&mut self, field: &str, result: FieldResult) -> &mut Self {
        if let Err(message) = result {
            self.fields
                .entry(field.to_string())
                .or_insert_with(|| message.to_string());
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `Ok(())` when no field failed, otherwise the collected errors
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.fields.values().map(String::as_str).collect();
        write!(f, "{}", messages.join("\n"))
    }
}
