//! Application state management
//!
//! `AppState` is shared behind an `Arc` and is the only writer of the
//! session record. Screens read the session through a `watch` subscription;
//! every write replaces the record wholesale.

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::{Coordinates, LoginResult, User};
use crate::realtime::{DispatchRouter, PushChannel};
use crate::ui_state::StateCell;

/// Authenticated session: bearer token plus the cached user record
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: User,
}

impl From<LoginResult> for Session {
    fn from(result: LoginResult) -> Self {
        Self {
            token: result.token,
            user: result.user,
        }
    }
}

/// Push connection plus the task routing its messages
#[derive(Debug)]
struct PushLink {
    channel: PushChannel,
    pump: JoinHandle<()>,
}

/// Global application state
pub struct AppState {
    pub config: ClientConfig,

    pub api: ApiClient,

    /// Preference store connection pool
    pub db: SqlitePool,

    /// Routes push messages to whichever screen is subscribed
    pub router: DispatchRouter,

    /// Current session (None if not authenticated)
    session: StateCell<Option<Session>>,

    /// Push channel, owned at session scope
    push: Mutex<Option<PushLink>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("api_url", &self.config.api_url)
            .field("ws_url", &self.config.ws_url)
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl AppState {
    /// Open the on-disk preference store named in `config`
    pub async fn new(config: ClientConfig) -> AppResult<Self> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let pool = db::connect(&config.db_path).await?;
        Self::with_pool(config, pool)
    }

    /// Build state around an already-open pool
    pub fn with_pool(config: ClientConfig, db: SqlitePool) -> AppResult<Self> {
        let api = ApiClient::new(&config.api_url, config.http_timeout)?;

        Ok(Self {
            config,
            api,
            db,
            router: DispatchRouter::new(),
            session: StateCell::new(None),
            push: Mutex::new(None),
        })
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// Check if user is authenticated
    pub fn is_authenticated(&self) -> bool {
        self.session.get().is_some()
    }

    pub fn session(&self) -> Option<Session> {
        self.session.get()
    }

    /// Read-only view of the session record
    pub fn subscribe_session(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    /// Require authentication, returning error if not authenticated
    pub fn require_auth(&self) -> AppResult<Session> {
        self.session.get().ok_or(AppError::NotAuthenticated)
    }

    /// Persist and publish a new session after login
    pub async fn set_session(&self, session: Session) -> AppResult<()> {
        db::save_session(&self.db, &session.token, &session.user).await?;
        if let Some(available) = session.user.driver_available {
            db::set_driver_available(&self.db, available).await?;
        }
        tracing::info!("Session stored for user: {}", session.user.id);
        self.session.set(Some(session));
        Ok(())
    }

    /// Replace the cached user record, keeping the current token
    pub async fn update_user(&self, user: User) -> AppResult<()> {
        let session = self.require_auth()?;
        db::save_user(&self.db, &user).await?;
        self.session.set(Some(Session {
            token: session.token,
            user,
        }));
        Ok(())
    }

    /// Clear stored preferences, drop the push channel and the session
    pub async fn clear_session(&self) -> AppResult<()> {
        self.disconnect_push().await;
        db::clear_preferences(&self.db).await?;
        self.session.set(None);
        tracing::info!("Session cleared");
        Ok(())
    }

    /// Load a previously stored session at startup
    pub async fn restore_session(&self) -> AppResult<Option<Session>> {
        let restored = db::load_session(&self.db)
            .await?
            .map(|(token, user)| Session { token, user });

        if let Some(session) = &restored {
            tracing::info!("Session restored for user: {}", session.user.id);
        }
        self.session.set(restored.clone());
        Ok(restored)
    }

    /// Drop the session when the backend rejects the token
    pub async fn handle_error(&self, error: &AppError) {
        if matches!(error, AppError::SessionExpired) {
            tracing::warn!("Token rejected by backend; clearing session");
            if let Err(e) = self.clear_session().await {
                tracing::error!("Failed to clear expired session: {}", e);
            }
        }
    }

    // ========================================================================
    // Driver Availability
    // ========================================================================

    pub async fn driver_available(&self) -> AppResult<bool> {
        db::driver_available(&self.db).await
    }

    /// Persist and publish the availability flag of the signed-in driver
    pub async fn set_driver_available(&self, available: bool) -> AppResult<()> {
        let session = self.require_auth()?;
        db::set_driver_available(&self.db, available).await?;

        let mut user = session.user;
        user.driver_available = Some(available);
        self.update_user(user).await
    }

    // ========================================================================
    // Push Channel
    // ========================================================================

    /// Connect the push channel for the current session and start routing.
    ///
    /// A no-op when a live connection already exists.
    pub async fn connect_push(&self) -> AppResult<()> {
        let session = self.require_auth()?;
        let mut push = self.push.lock().await;

        if let Some(link) = push.as_ref() {
            if link.channel.is_open() {
                return Ok(());
            }
        }

        let (channel, rx) = PushChannel::connect(&self.config.ws_url, Some(&session.token)).await?;
        let router = self.router.clone();
        let pump = tokio::spawn(async move { router.pump(rx).await });

        if let Some(stale) = push.replace(PushLink { channel, pump }) {
            stale.pump.abort();
        }
        Ok(())
    }

    pub async fn is_push_connected(&self) -> bool {
        self.push
            .lock()
            .await
            .as_ref()
            .is_some_and(|link| link.channel.is_open())
    }

    pub async fn disconnect_push(&self) {
        if let Some(link) = self.push.lock().await.take() {
            if let Err(e) = link.channel.close().await {
                tracing::warn!("Failed to close push channel cleanly: {}", e);
            }
            link.pump.abort();
        }
    }

    /// Report a driver position over the push channel
    pub async fn send_location(&self, location: Coordinates) -> AppResult<()> {
        let push = self.push.lock().await;
        let link = push
            .as_ref()
            .ok_or_else(|| AppError::Channel("push channel is not connected".to_string()))?;
        link.channel.send_location(location.into()).await
    }
}

/// Thread-safe shared state type
pub type SharedState = Arc<AppState>;

/// Create a new shared state instance
pub async fn create_shared_state(config: ClientConfig) -> AppResult<SharedState> {
    let state = AppState::new(config).await?;
    Ok(Arc::new(state))
}
