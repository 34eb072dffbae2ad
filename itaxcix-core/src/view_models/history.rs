//! Paginated trip history

use crate::error::AppError;
use crate::models::{Page, PageMeta, TravelHistoryItem};
use crate::state::SharedState;
use crate::ui_state::{StateCell, UiState};

use super::track;

pub const DEFAULT_PER_PAGE: u32 = 10;

#[derive(Debug)]
pub struct TravelHistoryViewModel {
    state: SharedState,
    per_page: u32,
    pub page: StateCell<UiState<Page<TravelHistoryItem>>>,
    /// Paging info from the last successful load
    pub meta: StateCell<Option<PageMeta>>,
}

impl TravelHistoryViewModel {
    pub fn new(state: SharedState) -> Self {
        Self::with_page_size(state, DEFAULT_PER_PAGE)
    }

    pub fn with_page_size(state: SharedState, per_page: u32) -> Self {
        Self {
            state,
            per_page: per_page.max(1),
            page: StateCell::default(),
            meta: StateCell::new(None),
        }
    }

    /// Whether `page` can be requested given what is known so far.
    /// Before the first load only page 1 is.
    pub fn is_in_range(&self, page: u32) -> bool {
        let last_page = self.meta.get().map_or(1, |meta| meta.last_page.max(1));
        (1..=last_page).contains(&page)
    }

    pub async fn load_first(&self) -> UiState<Page<TravelHistoryItem>> {
        // Page 1 is always in range
        self.fetch(1).await
    }

    /// Load `page`; returns `None` without touching any state when the page
    /// is outside `1..=last_page`.
    pub async fn load_page(&self, page: u32) -> Option<UiState<Page<TravelHistoryItem>>> {
        if !self.is_in_range(page) {
            tracing::debug!("Ignoring out-of-range history page {}", page);
            return None;
        }
        Some(self.fetch(page).await)
    }

    pub async fn next_page(&self) -> Option<UiState<Page<TravelHistoryItem>>> {
        let current = self.meta.get().map_or(0, |meta| meta.current_page);
        let Some(next) = current.checked_add(1) else {
            return None;
        };
        self.load_page(next).await
    }

    pub async fn previous_page(&self) -> Option<UiState<Page<TravelHistoryItem>>> {
        let current = self.meta.get().map_or(1, |meta| meta.current_page);
        self.load_page(current.saturating_sub(1)).await
    }

    async fn fetch(&self, page: u32) -> UiState<Page<TravelHistoryItem>> {
        let state = &self.state;
        let per_page = self.per_page;
        let outcome = track(state, &self.page, async {
            let session = state.require_auth()?;
            let page = state
                .api
                .travel_history(session.user.id, page, per_page, &session.token)
                .await?;
            Ok::<_, AppError>(page)
        })
        .await;

        if let Some(loaded) = outcome.success() {
            self.meta.set(Some(loaded.meta));
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::ClientConfig;
    use crate::db;
    use crate::state::AppState;

    async fn view_model() -> TravelHistoryViewModel {
        let pool = db::connect_in_memory().await.unwrap();
        let state = AppState::with_pool(ClientConfig::default(), pool).unwrap();
        TravelHistoryViewModel::with_page_size(Arc::new(state), 0)
    }

    #[tokio::test]
    async fn test_range_follows_last_loaded_meta() {
        let vm = view_model().await;
        assert!(vm.is_in_range(1));
        assert!(!vm.is_in_range(0));
        assert!(!vm.is_in_range(2));

        vm.meta.set(Some(PageMeta {
            current_page: 1,
            last_page: 3,
            per_page: 10,
            total: 25,
        }));
        assert!(vm.is_in_range(3));
        assert!(!vm.is_in_range(4));
    }

    #[tokio::test]
    async fn test_next_page_after_last_representable_page_is_noop() {
        let vm = view_model().await;
        vm.meta.set(Some(PageMeta {
            current_page: u32::MAX,
            last_page: u32::MAX,
            per_page: 10,
            total: 1,
        }));
        let rx = vm.page.subscribe();

        assert!(vm.next_page().await.is_none());
        assert!(!rx.has_changed().unwrap());
        assert_eq!(vm.page.get(), UiState::Initial);
    }

    #[tokio::test]
    async fn test_out_of_range_page_leaves_state_untouched() {
        let vm = view_model().await;
        let rx = vm.page.subscribe();

        assert!(vm.load_page(5).await.is_none());
        assert!(!rx.has_changed().unwrap());
        assert_eq!(vm.page.get(), UiState::Initial);
        assert_eq!(vm.per_page, 1);
    }
}
