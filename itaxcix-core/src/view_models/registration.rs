//! Sign-up flow for citizens and drivers
//!
//! Steps run in order: document, biometric, vehicle (drivers only),
//! registration, contact verification. Each step checks its fields before
//! any request is sent and refuses to run before its predecessor succeeded.

use base64::Engine;

use crate::error::AppError;
use crate::models::{
    BiometricValidationRequest, ContactType, ContactVerificationRequest,
    DocumentValidationRequest, DocumentType, RegistrationRequest, VehicleValidationRequest,
};
use crate::state::SharedState;
use crate::ui_state::{StateCell, UiState};
use crate::validation::{self, ValidationErrors};

use super::{reject_invalid, track};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationRole {
    Citizen,
    Driver,
}

/// Identifiers collected so far
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationProgress {
    pub person_id: Option<i64>,
    pub biometric_validated: bool,
    pub vehicle_id: Option<i64>,
    pub user_id: Option<i64>,
    pub contact_verified: bool,
}

#[derive(Debug)]
pub struct RegistrationViewModel {
    state: SharedState,
    role: RegistrationRole,
    pub progress: StateCell<RegistrationProgress>,
    /// Outcome of the most recent step
    pub step: StateCell<UiState<RegistrationProgress>>,
    pub field_errors: StateCell<ValidationErrors>,
}

impl RegistrationViewModel {
    pub fn new(state: SharedState, role: RegistrationRole) -> Self {
        Self {
            state,
            role,
            progress: StateCell::default(),
            step: StateCell::default(),
            field_errors: StateCell::default(),
        }
    }

    pub fn role(&self) -> RegistrationRole {
        self.role
    }

    pub async fn validate_document(&self, document: &str) -> UiState<RegistrationProgress> {
        let mut errors = ValidationErrors::new();
        errors.check("document", validation::validate_document(document));
        if let Some(rejected) = reject_invalid(errors, &self.field_errors, &self.step) {
            return rejected;
        }

        let request = DocumentValidationRequest {
            document_type_id: DocumentType::Dni.id(),
            document_value: document.to_string(),
        };
        let state = &self.state;
        track(state, &self.step, async {
            let response = state.api.validate_document(&request).await?;
            // A new document restarts the flow
            let progress = RegistrationProgress {
                person_id: Some(response.person_id),
                ..RegistrationProgress::default()
            };
            self.progress.set(progress.clone());
            Ok::<_, AppError>(progress)
        })
        .await
    }

    /// Match a face photo (raw JPEG bytes) against the validated document
    pub async fn validate_biometric(&self, photo: &[u8]) -> UiState<RegistrationProgress> {
        let Some(person_id) = self.progress.get().person_id else {
            return self.fail("Primero valida tu documento de identidad");
        };
        if photo.is_empty() {
            return self.fail("Toma una foto de tu rostro");
        }

        let request = BiometricValidationRequest {
            person_id,
            base64_image: base64::engine::general_purpose::STANDARD.encode(photo),
        };
        let state = &self.state;
        track(state, &self.step, async {
            let response = state.api.validate_biometric(&request).await?;
            if !response.validated {
                return Err(AppError::Api {
                    status: 422,
                    message: "No pudimos verificar tu identidad. Inténtalo nuevamente.".to_string(),
                });
            }
            self.progress.update(|p| p.biometric_validated = true);
            Ok::<_, AppError>(self.progress.get())
        })
        .await
    }

    /// Drivers only: register the vehicle by plate
    pub async fn validate_vehicle(&self, plate: &str) -> UiState<RegistrationProgress> {
        if self.role != RegistrationRole::Driver {
            return self.fail("Solo los conductores registran un vehículo");
        }
        let progress = self.progress.get();
        let Some(person_id) = progress.person_id else {
            return self.fail("Primero valida tu documento de identidad");
        };
        if !progress.biometric_validated {
            return self.fail("Primero completa la validación biométrica");
        }

        let mut errors = ValidationErrors::new();
        errors.check("plate", validation::validate_license_plate(plate));
        if let Some(rejected) = reject_invalid(errors, &self.field_errors, &self.step) {
            return rejected;
        }

        let request = VehicleValidationRequest {
            person_id,
            plate_value: validation::normalize_license_plate(plate),
        };
        let state = &self.state;
        track(state, &self.step, async {
            let response = state.api.validate_vehicle(&request).await?;
            self.progress
                .update(|p| p.vehicle_id = Some(response.vehicle_id));
            Ok::<_, AppError>(self.progress.get())
        })
        .await
    }

    /// Create the account once every validation has passed
    pub async fn register(
        &self,
        password: &str,
        repeat_password: &str,
        contact_type: ContactType,
        contact: &str,
    ) -> UiState<RegistrationProgress> {
        let progress = self.progress.get();
        let Some(person_id) = progress.person_id else {
            return self.fail("Primero valida tu documento de identidad");
        };
        if !progress.biometric_validated {
            return self.fail("Primero completa la validación biométrica");
        }
        if self.role == RegistrationRole::Driver && progress.vehicle_id.is_none() {
            return self.fail("Primero valida tu vehículo");
        }

        let mut errors = ValidationErrors::new();
        errors
            .check("password", validation::validate_password(password))
            .check(
                "repeat_password",
                validation::validate_password_confirmation(password, repeat_password),
            );
        match contact_type {
            ContactType::Email => errors.check("contact", validation::validate_email(contact)),
            ContactType::Phone => errors.check("contact", validation::validate_phone(contact)),
        };
        if let Some(rejected) = reject_invalid(errors, &self.field_errors, &self.step) {
            return rejected;
        }

        let request = RegistrationRequest {
            password: password.to_string(),
            contact_type_id: contact_type.id(),
            contact_value: contact.to_string(),
            person_id,
            vehicle_id: progress.vehicle_id,
        };
        let state = &self.state;
        track(state, &self.step, async {
            let response = state.api.register(&request).await?;
            tracing::info!("Registered user: {}", response.user_id);
            self.progress
                .update(|p| p.user_id = Some(response.user_id));
            Ok::<_, AppError>(self.progress.get())
        })
        .await
    }

    /// Confirm the contact with the code sent after registration
    pub async fn verify_contact(&self, code: &str) -> UiState<RegistrationProgress> {
        let Some(user_id) = self.progress.get().user_id else {
            return self.fail("Primero completa tu registro");
        };

        let mut errors = ValidationErrors::new();
        errors.check("code", validation::validate_verification_code(code));
        if let Some(rejected) = reject_invalid(errors, &self.field_errors, &self.step) {
            return rejected;
        }

        let request = ContactVerificationRequest {
            user_id,
            code: code.to_string(),
        };
        let state = &self.state;
        track(state, &self.step, async {
            state.api.verify_contact(&request).await?;
            self.progress.update(|p| p.contact_verified = true);
            Ok::<_, AppError>(self.progress.get())
        })
        .await
    }

    fn fail(&self, message: &str) -> UiState<RegistrationProgress> {
        let outcome = UiState::Error(message.to_string());
        self.step.set(outcome.clone());
        outcome
    }
}
