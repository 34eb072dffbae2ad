//! Trip ratings

use crate::error::AppError;
use crate::models::{Ack, RatingRequest, RatingsComments};
use crate::state::SharedState;
use crate::ui_state::{StateCell, UiState};
use crate::validation::{self, ValidationErrors};

use super::{reject_invalid, track};

const MAX_COMMENT_LEN: usize = 500;

#[derive(Debug)]
pub struct RatingViewModel {
    state: SharedState,
    pub submit: StateCell<UiState<Ack>>,
    pub ratings: StateCell<UiState<RatingsComments>>,
    pub field_errors: StateCell<ValidationErrors>,
}

impl RatingViewModel {
    pub fn new(state: SharedState) -> Self {
        Self {
            state,
            submit: StateCell::default(),
            ratings: StateCell::default(),
            field_errors: StateCell::default(),
        }
    }

    /// Rate the other party of a completed trip
    pub async fn rate_trip(&self, travel_id: i64, score: u8, comment: Option<&str>) -> UiState<Ack> {
        let comment = comment.map(str::trim).filter(|c| !c.is_empty());

        let mut errors = ValidationErrors::new();
        errors.check("score", validation::validate_rating_score(score));
        if comment.is_some_and(|c| c.chars().count() > MAX_COMMENT_LEN) {
            errors.check("comment", Err("El comentario no puede superar los 500 caracteres"));
        }
        if let Some(rejected) = reject_invalid(errors, &self.field_errors, &self.submit) {
            return rejected;
        }

        let request = RatingRequest {
            score,
            comment: comment.map(str::to_string),
        };
        let state = &self.state;
        track(state, &self.submit, async {
            let session = state.require_auth()?;
            let ack = state
                .api
                .rate_travel(travel_id, &request, &session.token)
                .await?;
            tracing::info!("Rated trip {} with {}", travel_id, score);
            Ok::<_, AppError>(ack)
        })
        .await
    }

    /// Ratings received by `user_id`, or by the signed-in user when `None`
    pub async fn load_ratings(&self, user_id: Option<i64>) -> UiState<RatingsComments> {
        let state = &self.state;
        track(state, &self.ratings, async {
            let session = state.require_auth()?;
            let user_id = user_id.unwrap_or(session.user.id);
            Ok::<_, AppError>(state.api.get_ratings(user_id, &session.token).await?)
        })
        .await
    }
}
