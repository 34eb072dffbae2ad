//! Driver home screen: availability, incoming requests, trip control
//!
//! Trip status is written by REST outcomes and by `trip_status_update`
//! pushes alike. There is no reconciliation: the last write wins.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::error::AppError;
use crate::models::{Coordinates, DriverStatus, TravelResponse, TripRequestMessage};
use crate::realtime::{MessageKind, RealtimeMessage, Subscription};
use crate::state::SharedState;
use crate::ui_state::{ScreenScope, StateCell, UiState};

use super::{track, TripStatus};

#[derive(Debug)]
pub struct DriverViewModel {
    state: SharedState,
    /// Whether this driver is receiving trip requests
    pub available: Arc<StateCell<bool>>,
    pub availability: StateCell<UiState<DriverStatus>>,
    /// Pending request waiting for accept or reject
    pub incoming_request: Arc<StateCell<Option<TripRequestMessage>>>,
    pub trip: StateCell<UiState<TravelResponse>>,
    pub trip_status: Arc<StateCell<Option<TripStatus>>>,
    /// Set when the server asks for a fresh position
    pub location_requested: Arc<StateCell<bool>>,
    /// Location sharing; aborted with the screen
    scope: Mutex<ScreenScope>,
    _subscriptions: Vec<Subscription>,
}

impl DriverViewModel {
    /// Build the screen state and take over the driver push handlers
    pub async fn new(state: SharedState) -> Self {
        let available = match state.driver_available().await {
            Ok(flag) => flag,
            Err(e) => {
                tracing::warn!("Failed to read availability flag: {}", e);
                false
            }
        };

        let available = Arc::new(StateCell::new(available));
        let incoming_request = Arc::new(StateCell::new(None));
        let trip_status = Arc::new(StateCell::new(None));
        let location_requested = Arc::new(StateCell::new(false));

        let subscriptions = vec![
            {
                let incoming = Arc::clone(&incoming_request);
                state
                    .router
                    .subscribe(MessageKind::TripRequest, move |message| {
                        if let RealtimeMessage::TripRequest(request) = message {
                            tracing::info!("Incoming trip request: {}", request.travel_id);
                            incoming.set(Some(request.clone()));
                        }
                    })
            },
            {
                let status = Arc::clone(&trip_status);
                let incoming = Arc::clone(&incoming_request);
                state
                    .router
                    .subscribe(MessageKind::TripStatusUpdate, move |message| {
                        if let RealtimeMessage::TripStatusUpdate(update) = message {
                            // A passenger cancelling withdraws the pending request
                            incoming.update(|pending| {
                                if pending.as_ref().is_some_and(|p| p.travel_id == update.travel_id) {
                                    *pending = None;
                                }
                            });
                            status.set(Some(TripStatus {
                                travel_id: update.travel_id,
                                status: update.status,
                            }));
                        }
                    })
            },
            {
                let requested = Arc::clone(&location_requested);
                state
                    .router
                    .subscribe(MessageKind::LocationUpdateRequest, move |_| {
                        requested.set(true);
                    })
            },
        ];

        Self {
            state,
            available,
            availability: StateCell::default(),
            incoming_request,
            trip: StateCell::default(),
            trip_status,
            location_requested,
            scope: Mutex::new(ScreenScope::new()),
            _subscriptions: subscriptions,
        }
    }

    /// Go online or offline for trip requests
    pub async fn set_availability(&self, available: bool) -> UiState<DriverStatus> {
        let state = &self.state;
        let outcome = track(state, &self.availability, async {
            let session = state.require_auth()?;
            let status = state
                .api
                .set_driver_availability(session.user.id, available, &session.token)
                .await?;
            state.set_driver_available(status.available).await?;
            Ok::<_, AppError>(status)
        })
        .await;

        if let Some(status) = outcome.success() {
            self.available.set(status.available);
        }
        outcome
    }

    /// Re-read availability from the backend, e.g. after another device
    /// changed it
    pub async fn refresh_availability(&self) -> UiState<DriverStatus> {
        let state = &self.state;
        let outcome = track(state, &self.availability, async {
            let session = state.require_auth()?;
            let status = state
                .api
                .get_driver_status(session.user.id, &session.token)
                .await?;
            state.set_driver_available(status.available).await?;
            Ok::<_, AppError>(status)
        })
        .await;

        if let Some(status) = outcome.success() {
            self.available.set(status.available);
        }
        outcome
    }

    pub async fn accept_trip(&self, travel_id: i64) -> UiState<TravelResponse> {
        self.respond(travel_id, true).await
    }

    pub async fn reject_trip(&self, travel_id: i64) -> UiState<TravelResponse> {
        self.respond(travel_id, false).await
    }

    async fn respond(&self, travel_id: i64, accept: bool) -> UiState<TravelResponse> {
        let state = &self.state;
        let outcome = track(state, &self.trip, async {
            let session = state.require_auth()?;
            let response = state
                .api
                .respond_travel(travel_id, accept, &session.token)
                .await?;
            Ok::<_, AppError>(response)
        })
        .await;

        if outcome.is_terminal() {
            // Answered or no longer answerable; either way it is no longer pending
            self.incoming_request.set(None);
        }
        self.record_status(&outcome);
        outcome
    }

    pub async fn start_trip(&self, travel_id: i64) -> UiState<TravelResponse> {
        let state = &self.state;
        let outcome = track(state, &self.trip, async {
            let session = state.require_auth()?;
            Ok::<_, AppError>(state.api.start_travel(travel_id, &session.token).await?)
        })
        .await;
        self.record_status(&outcome);
        outcome
    }

    pub async fn complete_trip(&self, travel_id: i64) -> UiState<TravelResponse> {
        let state = &self.state;
        let outcome = track(state, &self.trip, async {
            let session = state.require_auth()?;
            Ok::<_, AppError>(state.api.complete_travel(travel_id, &session.token).await?)
        })
        .await;
        self.record_status(&outcome);
        outcome
    }

    pub async fn cancel_trip(&self, travel_id: i64) -> UiState<TravelResponse> {
        let state = &self.state;
        let outcome = track(state, &self.trip, async {
            let session = state.require_auth()?;
            Ok::<_, AppError>(state.api.cancel_travel(travel_id, &session.token).await?)
        })
        .await;
        self.record_status(&outcome);
        outcome
    }

    /// Push the current position to the server
    pub async fn send_location(&self, location: Coordinates) -> Result<(), AppError> {
        if !location.is_valid() {
            return Err(AppError::Internal(format!(
                "coordinates out of range: {}, {}",
                location.latitude, location.longitude
            )));
        }
        self.state.send_location(location).await?;
        self.location_requested.set(false);
        Ok(())
    }

    /// Forward every new position from `positions` over the push channel
    /// until the screen is dropped or [`Self::stop_sharing_location`] runs.
    pub fn share_location(&self, mut positions: watch::Receiver<Coordinates>) {
        let state = Arc::clone(&self.state);
        let requested = Arc::clone(&self.location_requested);

        self.scope().launch(async move {
            while positions.changed().await.is_ok() {
                let location = *positions.borrow_and_update();
                if !location.is_valid() {
                    tracing::warn!(
                        "Skipping invalid position: {}, {}",
                        location.latitude,
                        location.longitude
                    );
                    continue;
                }
                match state.send_location(location).await {
                    Ok(()) => requested.set(false),
                    Err(e) => tracing::warn!("Failed to share location: {}", e),
                }
            }
            tracing::debug!("Position source closed; location sharing stopped");
        });
    }

    pub fn stop_sharing_location(&self) {
        self.scope().cancel_all();
    }

    fn scope(&self) -> std::sync::MutexGuard<'_, ScreenScope> {
        self.scope.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_status(&self, outcome: &UiState<TravelResponse>) {
        if let Some(response) = outcome.success() {
            self.trip_status.set(Some(TripStatus {
                travel_id: response.travel_id,
                status: response.status,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::config::ClientConfig;
    use crate::db;
    use crate::models::{LocationUpdateRequest, TravelStatus, TripStatusUpdateMessage};
    use crate::state::AppState;

    async fn shared_state() -> SharedState {
        let pool = db::connect_in_memory().await.unwrap();
        Arc::new(AppState::with_pool(ClientConfig::default(), pool).unwrap())
    }

    fn trip_request(travel_id: i64) -> RealtimeMessage {
        RealtimeMessage::TripRequest(TripRequestMessage {
            travel_id,
            passenger_id: 5,
            passenger_name: "Lucía Quispe".to_string(),
            passenger_rating: Some(4.8),
            origin: Coordinates::new(-6.77, -79.84),
            destination: Coordinates::new(-6.78, -79.85),
        })
    }

    fn status_update(travel_id: i64, status: TravelStatus) -> RealtimeMessage {
        RealtimeMessage::TripStatusUpdate(TripStatusUpdateMessage {
            travel_id,
            status,
            message: None,
        })
    }

    async fn wait_until_closed(tx: &watch::Sender<Coordinates>) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while !tx.is_closed() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_trip_request_push_sets_incoming_request() {
        let state = shared_state().await;
        let vm = DriverViewModel::new(state.clone()).await;

        assert!(state.router.dispatch(&trip_request(9)));
        let pending = vm.incoming_request.get().unwrap();
        assert_eq!(pending.travel_id, 9);
        assert_eq!(pending.passenger_name, "Lucía Quispe");
    }

    #[tokio::test]
    async fn test_status_update_withdraws_matching_request_only() {
        let state = shared_state().await;
        let vm = DriverViewModel::new(state.clone()).await;
        state.router.dispatch(&trip_request(9));

        state
            .router
            .dispatch(&status_update(8, TravelStatus::Cancelled));
        assert_eq!(vm.incoming_request.get().map(|r| r.travel_id), Some(9));

        state
            .router
            .dispatch(&status_update(9, TravelStatus::Cancelled));
        assert_eq!(vm.incoming_request.get(), None);
        assert_eq!(
            vm.trip_status.get(),
            Some(TripStatus {
                travel_id: 9,
                status: TravelStatus::Cancelled,
            })
        );
    }

    #[tokio::test]
    async fn test_location_request_push_raises_flag() {
        let state = shared_state().await;
        let vm = DriverViewModel::new(state.clone()).await;
        assert!(!vm.location_requested.get());

        state
            .router
            .dispatch(&RealtimeMessage::LocationUpdateRequest(LocationUpdateRequest {
                latitude: -6.77,
                longitude: -79.84,
            }));
        assert!(vm.location_requested.get());
    }

    #[tokio::test]
    async fn test_handlers_released_with_screen() {
        let state = shared_state().await;
        let vm = DriverViewModel::new(state.clone()).await;
        assert!(state.router.has_handler(MessageKind::TripRequest));

        drop(vm);
        assert!(!state.router.has_handler(MessageKind::TripRequest));
        assert!(!state.router.dispatch(&trip_request(9)));
    }

    #[tokio::test]
    async fn test_location_sharing_stops_on_request() {
        let state = shared_state().await;
        let vm = DriverViewModel::new(state).await;
        let (tx, rx) = watch::channel(Coordinates::new(-6.77, -79.84));

        vm.share_location(rx);
        assert!(!tx.is_closed());

        vm.stop_sharing_location();
        wait_until_closed(&tx).await;
    }

    #[tokio::test]
    async fn test_location_sharing_stops_with_screen() {
        let state = shared_state().await;
        let vm = DriverViewModel::new(state).await;
        let (tx, rx) = watch::channel(Coordinates::new(-6.77, -79.84));

        vm.share_location(rx);
        drop(vm);
        wait_until_closed(&tx).await;
    }
}
