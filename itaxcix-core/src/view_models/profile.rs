//! Profile screen: view and edit contact data and photo

use base64::Engine;

use crate::error::AppError;
use crate::models::{Ack, Profile, ProfilePhoto, ProfilePhotoUpload};
use crate::state::SharedState;
use crate::ui_state::{StateCell, UiState};
use crate::validation::{self, ValidationErrors};

use super::{reject_invalid, track};

#[derive(Debug)]
pub struct ProfileViewModel {
    state: SharedState,
    pub profile: StateCell<UiState<Profile>>,
    pub update: StateCell<UiState<Ack>>,
    pub photo: StateCell<UiState<ProfilePhoto>>,
    pub field_errors: StateCell<ValidationErrors>,
}

impl ProfileViewModel {
    pub fn new(state: SharedState) -> Self {
        Self {
            state,
            profile: StateCell::default(),
            update: StateCell::default(),
            photo: StateCell::default(),
            field_errors: StateCell::default(),
        }
    }

    /// Load the citizen or driver profile of the signed-in user
    pub async fn load_profile(&self) -> UiState<Profile> {
        let state = &self.state;
        track(state, &self.profile, async {
            let session = state.require_auth()?;
            let profile = if session.user.is_driver() {
                Profile::Driver(
                    state
                        .api
                        .get_driver_profile(session.user.id, &session.token)
                        .await?,
                )
            } else {
                Profile::Citizen(
                    state
                        .api
                        .get_citizen_profile(session.user.id, &session.token)
                        .await?,
                )
            };
            Ok::<_, AppError>(profile)
        })
        .await
    }

    pub async fn update_email(&self, email: &str) -> UiState<Ack> {
        let mut errors = ValidationErrors::new();
        errors.check("email", validation::validate_email(email));
        if let Some(rejected) = reject_invalid(errors, &self.field_errors, &self.update) {
            return rejected;
        }

        let state = &self.state;
        track(state, &self.update, async {
            let session = state.require_auth()?;
            let ack = state
                .api
                .update_email(session.user.id, email, &session.token)
                .await?;

            let mut user = session.user;
            user.email = Some(email.to_string());
            state.update_user(user).await?;
            Ok::<_, AppError>(ack)
        })
        .await
    }

    pub async fn update_phone(&self, phone: &str) -> UiState<Ack> {
        let mut errors = ValidationErrors::new();
        errors.check("phone", validation::validate_phone(phone));
        if let Some(rejected) = reject_invalid(errors, &self.field_errors, &self.update) {
            return rejected;
        }

        let state = &self.state;
        track(state, &self.update, async {
            let session = state.require_auth()?;
            let ack = state
                .api
                .update_phone(session.user.id, phone, &session.token)
                .await?;

            let mut user = session.user;
            user.phone = Some(phone.to_string());
            state.update_user(user).await?;
            Ok::<_, AppError>(ack)
        })
        .await
    }

    /// Upload an already-compressed JPEG as the profile photo
    pub async fn upload_photo(&self, jpeg: &[u8]) -> UiState<ProfilePhoto> {
        if jpeg.is_empty() {
            let outcome = UiState::Error("Selecciona una imagen".to_string());
            self.photo.set(outcome.clone());
            return outcome;
        }

        let upload = ProfilePhotoUpload {
            base64_image: base64::engine::general_purpose::STANDARD.encode(jpeg),
        };
        let state = &self.state;
        track(state, &self.photo, async {
            let session = state.require_auth()?;
            let photo = state
                .api
                .upload_profile_photo(session.user.id, &upload, &session.token)
                .await?;
            Ok::<_, AppError>(photo)
        })
        .await
    }
}
