//! Citizen map screen: available drivers and the trip in progress

use std::sync::Arc;

use crate::error::AppError;
use crate::models::{Coordinates, DriverAvailableResponse, TravelRequest, TravelResponse, TravelStatus};
use crate::realtime::{MessageKind, RealtimeMessage, Subscription};
use crate::state::SharedState;
use crate::ui_state::{StateCell, UiState};
use crate::validation::ValidationErrors;

use super::{reject_invalid, track, TripStatus};

const INVALID_POINT: &str = "Selecciona un punto válido en el mapa";

#[derive(Debug)]
pub struct CitizenTripViewModel {
    state: SharedState,
    /// Drivers currently shown on the map
    pub drivers: Arc<StateCell<Vec<DriverAvailableResponse>>>,
    pub request: StateCell<UiState<TravelResponse>>,
    pub cancel: StateCell<UiState<TravelResponse>>,
    pub trip_status: Arc<StateCell<Option<TripStatus>>>,
    pub field_errors: StateCell<ValidationErrors>,
    _subscriptions: Vec<Subscription>,
}

/// Apply a driver-list push to the map state
fn apply_driver_message(drivers: &mut Vec<DriverAvailableResponse>, message: &RealtimeMessage) {
    match message {
        RealtimeMessage::InitialDrivers(snapshot) => {
            *drivers = snapshot.drivers.clone();
        }
        RealtimeMessage::DriverAvailable(driver) => {
            match drivers.iter_mut().find(|d| d.id == driver.id) {
                Some(existing) => *existing = driver.clone(),
                None => drivers.push(driver.clone()),
            }
        }
        RealtimeMessage::DriverOffline(offline) => {
            drivers.retain(|d| d.id != offline.driver_id);
        }
        RealtimeMessage::DriverLocationUpdate(update) => {
            // Updates for drivers not on the map are ignored
            if let Some(driver) = drivers.iter_mut().find(|d| d.id == update.driver_id) {
                driver.location = update.location;
            }
        }
        _ => {}
    }
}

impl CitizenTripViewModel {
    /// Build the screen state and take over the citizen push handlers
    pub fn new(state: SharedState) -> Self {
        let drivers = Arc::new(StateCell::new(Vec::new()));
        let trip_status = Arc::new(StateCell::new(None));

        let mut subscriptions = Vec::new();
        for kind in [
            MessageKind::InitialDrivers,
            MessageKind::DriverAvailable,
            MessageKind::DriverOffline,
            MessageKind::DriverLocationUpdate,
        ] {
            let drivers = Arc::clone(&drivers);
            subscriptions.push(state.router.subscribe(kind, move |message| {
                drivers.update(|list| apply_driver_message(list, message));
            }));
        }

        for kind in [MessageKind::TripResponse, MessageKind::TripStatusUpdate] {
            let status = Arc::clone(&trip_status);
            subscriptions.push(state.router.subscribe(kind, move |message| {
                let update = match message {
                    RealtimeMessage::TripResponse(m) => TripStatus {
                        travel_id: m.travel_id,
                        status: m.status,
                    },
                    RealtimeMessage::TripStatusUpdate(m) => TripStatus {
                        travel_id: m.travel_id,
                        status: m.status,
                    },
                    _ => return,
                };
                tracing::info!("Trip {} is now {}", update.travel_id, update.status);
                status.set(Some(update));
            }));
        }

        Self {
            state,
            drivers,
            request: StateCell::default(),
            cancel: StateCell::default(),
            trip_status,
            field_errors: StateCell::default(),
            _subscriptions: subscriptions,
        }
    }

    /// Ask `driver_id` for a ride between two points
    pub async fn request_trip(
        &self,
        driver_id: i64,
        origin: Coordinates,
        destination: Coordinates,
    ) -> UiState<TravelResponse> {
        let mut errors = ValidationErrors::new();
        if !origin.is_valid() {
            errors.check("origin", Err(INVALID_POINT));
        }
        if !destination.is_valid() {
            errors.check("destination", Err(INVALID_POINT));
        }
        if let Some(rejected) = reject_invalid(errors, &self.field_errors, &self.request) {
            return rejected;
        }

        let state = &self.state;
        let outcome = track(state, &self.request, async {
            let session = state.require_auth()?;
            let request = TravelRequest {
                citizen_id: session.user.id,
                driver_id,
                origin,
                destination,
            };
            Ok::<_, AppError>(state.api.request_travel(&request, &session.token).await?)
        })
        .await;

        if let Some(response) = outcome.success() {
            self.trip_status.set(Some(TripStatus {
                travel_id: response.travel_id,
                status: TravelStatus::Requested,
            }));
        }
        outcome
    }

    pub async fn cancel_trip(&self, travel_id: i64) -> UiState<TravelResponse> {
        let state = &self.state;
        let outcome = track(state, &self.cancel, async {
            let session = state.require_auth()?;
            Ok::<_, AppError>(state.api.cancel_travel(travel_id, &session.token).await?)
        })
        .await;

        if let Some(response) = outcome.success() {
            self.trip_status.set(Some(TripStatus {
                travel_id: response.travel_id,
                status: response.status,
            }));
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DriverLocationUpdate, DriverOfflineMessage, InitialDriversMessage};

    fn driver(id: i64, lat: f64) -> DriverAvailableResponse {
        DriverAvailableResponse {
            id,
            full_name: format!("Conductor {id}"),
            location: Coordinates::new(lat, -79.84),
            rating: None,
            license_plate: None,
        }
    }

    #[test]
    fn test_driver_list_updates() {
        let mut list = Vec::new();
        apply_driver_message(
            &mut list,
            &RealtimeMessage::InitialDrivers(InitialDriversMessage {
                drivers: vec![driver(1, -6.0), driver(2, -6.1)],
            }),
        );
        assert_eq!(list.len(), 2);

        apply_driver_message(&mut list, &RealtimeMessage::DriverAvailable(driver(3, -6.2)));
        apply_driver_message(&mut list, &RealtimeMessage::DriverAvailable(driver(1, -6.5)));
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].location.latitude, -6.5);

        apply_driver_message(
            &mut list,
            &RealtimeMessage::DriverLocationUpdate(DriverLocationUpdate {
                driver_id: 2,
                location: Coordinates::new(-6.9, -79.9),
            }),
        );
        assert_eq!(list[1].location, Coordinates::new(-6.9, -79.9));

        apply_driver_message(
            &mut list,
            &RealtimeMessage::DriverOffline(DriverOfflineMessage { driver_id: 1 }),
        );
        let ids: Vec<i64> = list.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_location_update_for_unknown_driver_is_ignored() {
        let mut list = vec![driver(1, -6.0)];
        apply_driver_message(
            &mut list,
            &RealtimeMessage::DriverLocationUpdate(DriverLocationUpdate {
                driver_id: 99,
                location: Coordinates::new(0.0, 0.0),
            }),
        );
        assert_eq!(list, vec![driver(1, -6.0)]);
    }
}
