//! Incident reports on a trip

use crate::error::AppError;
use crate::models::{IncidentReport, IncidentResponse};
use crate::state::SharedState;
use crate::ui_state::{StateCell, UiState};
use crate::validation::{self, ValidationErrors};

use super::{reject_invalid, track};

#[derive(Debug)]
pub struct IncidentViewModel {
    state: SharedState,
    pub report: StateCell<UiState<IncidentResponse>>,
    pub field_errors: StateCell<ValidationErrors>,
}

impl IncidentViewModel {
    pub fn new(state: SharedState) -> Self {
        Self {
            state,
            report: StateCell::default(),
            field_errors: StateCell::default(),
        }
    }

    pub async fn report(
        &self,
        travel_id: i64,
        type_name: &str,
        description: &str,
    ) -> UiState<IncidentResponse> {
        let mut errors = ValidationErrors::new();
        if type_name.trim().is_empty() {
            errors.check("type", Err("Selecciona el tipo de incidente"));
        }
        errors.check(
            "description",
            validation::validate_incident_description(description),
        );
        if let Some(rejected) = reject_invalid(errors, &self.field_errors, &self.report) {
            return rejected;
        }

        let state = &self.state;
        track(state, &self.report, async {
            let session = state.require_auth()?;
            let report = IncidentReport {
                user_id: session.user.id,
                travel_id,
                type_name: type_name.trim().to_string(),
                description: description.trim().to_string(),
            };
            let response = state.api.report_incident(&report, &session.token).await?;
            tracing::info!("Reported incident {} on trip {}", response.incident_id, travel_id);
            Ok::<_, AppError>(response)
        })
        .await
    }
}
