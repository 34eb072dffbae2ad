//! Login, logout and password recovery

use crate::error::{AppError, AppResult};
use crate::models::{
    ContactType, PasswordReset, RecoveryCodeVerification, RecoveryRequest, User,
};
use crate::state::{Session, SharedState};
use crate::ui_state::{StateCell, UiState};
use crate::validation::{self, ValidationErrors};

use super::{reject_invalid, track};

/// Where a password recovery currently stands
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryStep {
    CodeSent { user_id: i64 },
    CodeVerified { user_id: i64, temp_token: String },
    PasswordChanged,
}

#[derive(Debug)]
pub struct AuthViewModel {
    state: SharedState,
    pub login: StateCell<UiState<User>>,
    pub recovery: StateCell<UiState<RecoveryStep>>,
    pub field_errors: StateCell<ValidationErrors>,
    /// Last completed recovery step; survives failed attempts at the next one
    recovery_progress: StateCell<Option<RecoveryStep>>,
}

impl AuthViewModel {
    pub fn new(state: SharedState) -> Self {
        Self {
            state,
            login: StateCell::default(),
            recovery: StateCell::default(),
            field_errors: StateCell::default(),
            recovery_progress: StateCell::new(None),
        }
    }

    /// Sign in, persist the session and open the push channel
    pub async fn login(&self, document: &str, password: &str) -> UiState<User> {
        let mut errors = ValidationErrors::new();
        errors.check("document", validation::validate_document(document));
        if password.is_empty() {
            errors.check("password", Err("Ingresa tu contraseña"));
        }
        if let Some(rejected) = reject_invalid(errors, &self.field_errors, &self.login) {
            return rejected;
        }

        let state = &self.state;
        let outcome = track(state, &self.login, async {
            let result = state.api.login(document, password).await?;
            let session = Session::from(result);
            let user = session.user.clone();
            state.set_session(session).await?;
            tracing::info!("User logged in: {}", user.id);
            Ok::<_, AppError>(user)
        })
        .await;

        if outcome.success().is_some() {
            // Signed in either way; pushes resume on the next connect
            if let Err(e) = state.connect_push().await {
                tracing::warn!("Push channel unavailable: {}", e);
            }
        }
        outcome
    }

    /// Sign out: clear stored preferences and close the push channel
    pub async fn logout(&self) -> AppResult<()> {
        self.state.clear_session().await?;
        self.login.set(UiState::Initial);
        tracing::info!("User logged out");
        Ok(())
    }

    /// Restore the stored session on app startup, refreshing the user
    /// record when the backend is reachable.
    pub async fn restore_session(&self) -> AppResult<Option<User>> {
        let Some(session) = self.state.restore_session().await? else {
            return Ok(None);
        };

        match self
            .state
            .api
            .get_user(session.user.id, &session.token)
            .await
        {
            Ok(user) => {
                self.state.update_user(user.clone()).await?;
                Ok(Some(user))
            }
            Err(AppError::SessionExpired) => {
                self.state.clear_session().await?;
                Ok(None)
            }
            Err(e) => {
                // Keep the cached record for offline use
                tracing::warn!("Failed to refresh user: {}", e);
                Ok(Some(session.user))
            }
        }
    }

    // ========================================================================
    // Password Recovery
    // ========================================================================

    /// Ask for a recovery code on email or phone
    pub async fn request_recovery_code(
        &self,
        contact_type: ContactType,
        contact: &str,
    ) -> UiState<RecoveryStep> {
        let mut errors = ValidationErrors::new();
        match contact_type {
            ContactType::Email => errors.check("contact", validation::validate_email(contact)),
            ContactType::Phone => errors.check("contact", validation::validate_phone(contact)),
        };
        if let Some(rejected) = reject_invalid(errors, &self.field_errors, &self.recovery) {
            return rejected;
        }

        let request = RecoveryRequest {
            contact_type_id: contact_type.id(),
            contact: contact.to_string(),
        };
        let state = &self.state;
        let outcome = track(state, &self.recovery, async {
            let response = state.api.start_recovery(&request).await?;
            Ok::<_, AppError>(RecoveryStep::CodeSent {
                user_id: response.user_id,
            })
        })
        .await;
        self.record_progress(outcome)
    }

    pub async fn verify_recovery_code(&self, code: &str) -> UiState<RecoveryStep> {
        let Some(RecoveryStep::CodeSent { user_id }) = self.recovery_progress.get()
        else {
            return self.out_of_order();
        };

        let mut errors = ValidationErrors::new();
        errors.check("code", validation::validate_verification_code(code));
        if let Some(rejected) = reject_invalid(errors, &self.field_errors, &self.recovery) {
            return rejected;
        }

        let request = RecoveryCodeVerification {
            user_id,
            code: code.to_string(),
        };
        let state = &self.state;
        let outcome = track(state, &self.recovery, async {
            let token = state.api.verify_recovery_code(&request).await?;
            Ok::<_, AppError>(RecoveryStep::CodeVerified {
                user_id,
                temp_token: token.temp_token,
            })
        })
        .await;
        self.record_progress(outcome)
    }

    pub async fn reset_password(&self, new_password: &str, repeat: &str) -> UiState<RecoveryStep> {
        let Some(RecoveryStep::CodeVerified {
            user_id,
            temp_token,
        }) = self.recovery_progress.get()
        else {
            return self.out_of_order();
        };

        let mut errors = ValidationErrors::new();
        errors
            .check("password", validation::validate_password(new_password))
            .check(
                "repeat_password",
                validation::validate_password_confirmation(new_password, repeat),
            );
        if let Some(rejected) = reject_invalid(errors, &self.field_errors, &self.recovery) {
            return rejected;
        }

        let request = PasswordReset {
            user_id,
            new_password: new_password.to_string(),
            repeat_password: repeat.to_string(),
        };
        let state = &self.state;
        let outcome = track(state, &self.recovery, async {
            state.api.reset_password(&request, &temp_token).await?;
            Ok::<_, AppError>(RecoveryStep::PasswordChanged)
        })
        .await;
        self.record_progress(outcome)
    }

    fn record_progress(&self, outcome: UiState<RecoveryStep>) -> UiState<RecoveryStep> {
        if let Some(step) = outcome.success() {
            let finished = *step == RecoveryStep::PasswordChanged;
            self.recovery_progress
                .set((!finished).then(|| step.clone()));
        }
        outcome
    }

    fn out_of_order(&self) -> UiState<RecoveryStep> {
        let outcome = UiState::Error("Solicita un nuevo código de recuperación".to_string());
        self.recovery.set(outcome.clone());
        outcome
    }
}
