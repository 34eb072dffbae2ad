//! Presentation state holders, one per screen
//!
//! Each view model owns [`StateCell`]s that a UI shell observes. One-shot
//! requests move their cell through `Loading` to exactly one of `Success` or
//! `Error`; errors are caught here and never escape to the screen.

pub mod auth;
pub mod citizen;
pub mod driver;
pub mod history;
pub mod incident;
pub mod profile;
pub mod rating;
pub mod registration;

pub use auth::{AuthViewModel, RecoveryStep};
pub use citizen::CitizenTripViewModel;
pub use driver::DriverViewModel;
pub use history::TravelHistoryViewModel;
pub use incident::IncidentViewModel;
pub use profile::ProfileViewModel;
pub use rating::RatingViewModel;
pub use registration::{RegistrationProgress, RegistrationRole, RegistrationViewModel};

use std::future::Future;

use crate::error::AppResult;
use crate::models::TravelStatus;
use crate::state::AppState;
use crate::ui_state::{StateCell, UiState};
use crate::validation::ValidationErrors;

/// Latest known status of one trip, from either REST or the push channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripStatus {
    pub travel_id: i64,
    pub status: TravelStatus,
}

/// Run one request against `cell`: Loading, then Success or Error.
pub(crate) async fn track<T, F>(state: &AppState, cell: &StateCell<UiState<T>>, request: F) -> UiState<T>
where
    T: Clone,
    F: Future<Output = AppResult<T>>,
{
    cell.set(UiState::Loading);

    let result = request.await;
    if let Err(e) = &result {
        tracing::warn!("Request failed: {}", e);
        state.handle_error(e).await;
    }

    let outcome = UiState::from(result);
    cell.set(outcome.clone());
    outcome
}

/// Publish field errors; on failure the request cell goes straight to Error
pub(crate) fn reject_invalid<T: Clone>(
    errors: ValidationErrors,
    field_errors: &StateCell<ValidationErrors>,
    cell: &StateCell<UiState<T>>,
) -> Option<UiState<T>> {
    field_errors.set(errors.clone());
    if errors.is_empty() {
        return None;
    }
    let outcome = UiState::Error(errors.to_string());
    cell.set(outcome.clone());
    Some(outcome)
}
