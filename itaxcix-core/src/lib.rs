//! iTaxCix client core
//!
//! Headless core for the citizen and driver apps. Business logic, the REST
//! client, the real-time push channel and the local preference store all
//! live here; a UI shell observes the [`view_models`] and renders them.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod realtime;
pub mod state;
pub mod ui_state;
pub mod validation;
pub mod view_models;

pub use config::ClientConfig;
pub use error::{AppError, AppResult};
pub use state::{AppState, Session, SharedState};
pub use ui_state::{ScreenScope, StateCell, UiState};

/// Install the global tracing subscriber.
///
/// Filter comes from `RUST_LOG`, defaulting to `itaxcix_core=info`. Calling
/// this more than once is harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "itaxcix_core=info".into()),
        )
        .try_init();
}

/// Open the local store, restore any saved session and, when signed in,
/// connect the push channel.
pub async fn start(config: ClientConfig) -> AppResult<SharedState> {
    tracing::info!("Starting iTaxCix core");

    let state = state::create_shared_state(config).await?;
    if let Some(session) = state.restore_session().await? {
        tracing::info!("Restored session for user {}", session.user.id);
        // Offline startup is fine; the shell can reconnect later
        if let Err(e) = state.connect_push().await {
            tracing::warn!("Push channel unavailable: {}", e);
        }
    }

    Ok(state)
}
