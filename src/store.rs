//! Shared UI state with explicit change notification.
//!
//! The store is an ordinary value handed to whoever needs it (usually behind
//! an `Arc`). Every mutation publishes a [`StoreEvent`] on a broadcast
//! channel; consumers call [`Store::subscribe`] and re-read what changed.

use crate::api::{ApiClient, ListingSource};
use crate::error::ApiError;
use crate::filter::{self, SearchFilters};
use crate::models::{Listing, ModerationDecision, Notification, ReviewStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

pub const MAX_COMPARE: usize = 3;
pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_secs(5);
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Transient message shown to the user
#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: u64,
    pub level: ToastLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub duration: Duration,
}

impl Toast {
    pub fn expired_at(&self, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(self.duration) {
            Ok(duration) => self.created_at + duration <= now,
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    ListingsChanged,
    FiltersChanged,
    FavoritesChanged,
    ToastsChanged,
    NotificationsChanged,
    CompareChanged,
    ReviewModerated { review_id: String, synced: bool },
}

/// Whether a moderation decision reached the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationOutcome {
    Persisted,
    /// Server refused the session; the decision only exists in this store
    LocalOnly,
}

#[derive(Default)]
struct StoreState {
    listings: Vec<Listing>,
    favorites: Vec<String>,
    filters: SearchFilters,
    toasts: Vec<Toast>,
    next_toast_id: u64,
    notifications: Vec<Notification>,
    compare: Vec<String>,
    unsynced_reviews: HashMap<String, ReviewStatus>,
}

pub struct Store {
    state: RwLock<StoreState>,
    events: broadcast::Sender<StoreEvent>,
    toast_duration: Duration,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(DEFAULT_TOAST_DURATION)
    }
}

impl Store {
    pub fn new(toast_duration: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            state: RwLock::new(StoreState::default()),
            events,
            toast_duration,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|p| p.into_inner())
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    // Listings

    pub fn set_listings(&self, listings: Vec<Listing>) {
        {
            let mut state = self.write();
            let ids: Vec<&str> = listings.iter().map(|l| l.id.as_str()).collect();
            state.compare.retain(|id| ids.contains(&id.as_str()));
            state.listings = listings;
        }
        self.emit(StoreEvent::ListingsChanged);
    }

    /// Replace listings from `source`. On failure the previous listings stay.
    pub async fn load_listings(&self, source: &dyn ListingSource) -> Result<usize, ApiError> {
        match source.fetch_listings().await {
            Ok(listings) => {
                let count = listings.len();
                info!("Loaded {} listings from {}", count, source.source_name());
                self.set_listings(listings);
                Ok(count)
            }
            Err(e) => {
                warn!("Loading listings from {} failed: {}", source.source_name(), e);
                self.notify(ToastLevel::Error, e.user_message());
                Err(e)
            }
        }
    }

    pub fn listings(&self) -> Vec<Listing> {
        self.read().listings.clone()
    }

    pub fn listing(&self, id: &str) -> Option<Listing> {
        self.read().listings.iter().find(|l| l.id == id).cloned()
    }

    /// Listings passing the current filters.
    pub fn filtered_listings(&self) -> Vec<Listing> {
        let state = self.read();
        filter::apply_filters(&state.listings, &state.filters)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn search(&self, query: &str) -> Vec<Listing> {
        let state = self.read();
        filter::text_search(&state.listings, query)
            .into_iter()
            .cloned()
            .collect()
    }

    // Filters

    pub fn filters(&self) -> SearchFilters {
        self.read().filters.clone()
    }

    pub fn set_filters(&self, filters: SearchFilters) {
        self.write().filters = filters;
        self.emit(StoreEvent::FiltersChanged);
    }

    pub fn update_filters(&self, edit: impl FnOnce(&mut SearchFilters)) {
        edit(&mut self.write().filters);
        self.emit(StoreEvent::FiltersChanged);
    }

    pub fn reset_filters(&self) {
        self.set_filters(SearchFilters::default());
    }

    // Favorites

    pub fn favorites(&self) -> Vec<String> {
        self.read().favorites.clone()
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.read().favorites.iter().any(|f| f == id)
    }

    /// Add or remove `house_id` on the server, then locally.
    pub async fn toggle_favorite(&self, client: &ApiClient, house_id: &str) -> Result<bool, ApiError> {
        let adding = !self.is_favorite(house_id);
        let result = if adding {
            client.add_favorite(house_id).await
        } else {
            client.remove_favorite(house_id).await
        };
        self.finish_favorite_toggle(house_id, adding, result)
    }

    fn finish_favorite_toggle(
        &self,
        house_id: &str,
        adding: bool,
        result: Result<(), ApiError>,
    ) -> Result<bool, ApiError> {
        if let Err(e) = result {
            self.notify(ToastLevel::Error, e.user_message());
            return Err(e);
        }
        {
            let mut state = self.write();
            state.favorites.retain(|f| f != house_id);
            if adding {
                state.favorites.push(house_id.to_string());
            }
        }
        self.emit(StoreEvent::FavoritesChanged);
        let message = if adding { "Added to favorites" } else { "Removed from favorites" };
        self.notify(ToastLevel::Success, message);
        Ok(adding)
    }

    // Toasts

    pub fn notify(&self, level: ToastLevel, message: impl Into<String>) -> u64 {
        let id = {
            let mut state = self.write();
            state.next_toast_id += 1;
            let id = state.next_toast_id;
            state.toasts.push(Toast {
                id,
                level,
                message: message.into(),
                created_at: Utc::now(),
                duration: self.toast_duration,
            });
            id
        };
        self.emit(StoreEvent::ToastsChanged);
        id
    }

    /// Toasts still on screen. Expired ones are dropped on the way.
    pub fn toasts(&self) -> Vec<Toast> {
        self.expire_toasts(Utc::now());
        self.read().toasts.clone()
    }

    pub fn dismiss(&self, id: u64) {
        let removed = {
            let mut state = self.write();
            let before = state.toasts.len();
            state.toasts.retain(|t| t.id != id);
            before != state.toasts.len()
        };
        if removed {
            self.emit(StoreEvent::ToastsChanged);
        }
    }

    /// Drop toasts whose display time has passed; returns how many went.
    pub fn expire_toasts(&self, now: DateTime<Utc>) -> usize {
        let expired = {
            let mut state = self.write();
            let before = state.toasts.len();
            state.toasts.retain(|t| !t.expired_at(now));
            before - state.toasts.len()
        };
        if expired > 0 {
            self.emit(StoreEvent::ToastsChanged);
        }
        expired
    }

    // Server notifications

    pub async fn load_notifications(&self, client: &ApiClient) -> Result<usize, ApiError> {
        match client.notifications().await {
            Ok(notifications) => {
                let count = notifications.len();
                self.write().notifications = notifications;
                self.emit(StoreEvent::NotificationsChanged);
                Ok(count)
            }
            Err(e) => {
                warn!("Loading notifications failed: {}", e);
                Err(e)
            }
        }
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.read().notifications.clone()
    }

    pub fn unread_count(&self) -> usize {
        self.read().notifications.iter().filter(|n| !n.read).count()
    }

    pub async fn mark_notification_read(&self, client: &ApiClient, id: &str) -> Result<(), ApiError> {
        if let Err(e) = client.mark_notification_read(id).await {
            self.notify(ToastLevel::Error, e.user_message());
            return Err(e);
        }
        self.mark_read_locally(id);
        Ok(())
    }

    fn mark_read_locally(&self, id: &str) {
        let changed = {
            let mut state = self.write();
            match state.notifications.iter_mut().find(|n| n.id == id && !n.read) {
                Some(notification) => {
                    notification.read = true;
                    true
                }
                None => false,
            }
        };
        if changed {
            self.emit(StoreEvent::NotificationsChanged);
        }
    }

    // Compare list

    /// Returns false when the list is full or the listing is already there.
    pub fn add_to_compare(&self, house_id: &str) -> bool {
        let added = {
            let mut state = self.write();
            if state.compare.iter().any(|id| id == house_id) {
                false
            } else if state.compare.len() >= MAX_COMPARE {
                drop(state);
                self.notify(
                    ToastLevel::Warning,
                    format!("You can compare at most {MAX_COMPARE} houses"),
                );
                return false;
            } else {
                state.compare.push(house_id.to_string());
                true
            }
        };
        if added {
            self.emit(StoreEvent::CompareChanged);
        }
        added
    }

    pub fn remove_from_compare(&self, house_id: &str) {
        self.write().compare.retain(|id| id != house_id);
        self.emit(StoreEvent::CompareChanged);
    }

    pub fn clear_compare(&self) {
        self.write().compare.clear();
        self.emit(StoreEvent::CompareChanged);
    }

    pub fn compare_ids(&self) -> Vec<String> {
        self.read().compare.clone()
    }

    /// Listings in the compare list, in the order they were added.
    pub fn compare_listings(&self) -> Vec<Listing> {
        let state = self.read();
        state
            .compare
            .iter()
            .filter_map(|id| state.listings.iter().find(|l| &l.id == id).cloned())
            .collect()
    }

    // Review moderation

    pub async fn moderate_review(
        &self,
        client: &ApiClient,
        review_id: &str,
        decision: ModerationDecision,
    ) -> Result<ModerationOutcome, ApiError> {
        let result = client.moderate_review(review_id, decision).await;
        self.finish_moderation(review_id, decision, result)
    }

    fn finish_moderation(
        &self,
        review_id: &str,
        decision: ModerationDecision,
        result: Result<(), ApiError>,
    ) -> Result<ModerationOutcome, ApiError> {
        let outcome = match result {
            Ok(()) => ModerationOutcome::Persisted,
            Err(ApiError::Unauthorized) => ModerationOutcome::LocalOnly,
            Err(e) => {
                self.notify(ToastLevel::Error, e.user_message());
                return Err(e);
            }
        };

        let status = decision.status();
        {
            let mut state = self.write();
            for listing in state.listings.iter_mut() {
                if let Some(review) = listing.reviews.iter_mut().find(|r| r.id == review_id) {
                    review.status = status;
                }
            }
            match outcome {
                ModerationOutcome::LocalOnly => {
                    state.unsynced_reviews.insert(review_id.to_string(), status);
                }
                ModerationOutcome::Persisted => {
                    state.unsynced_reviews.remove(review_id);
                }
            }
        }

        let synced = outcome == ModerationOutcome::Persisted;
        self.emit(StoreEvent::ReviewModerated {
            review_id: review_id.to_string(),
            synced,
        });
        if synced {
            self.notify(ToastLevel::Success, "Review updated");
        } else {
            warn!("Review {} moderated locally only: server rejected the session", review_id);
            self.notify(
                ToastLevel::Error,
                "Not saved on the server: your session expired. The change is only visible here until you log in again.",
            );
        }
        Ok(outcome)
    }

    /// Moderation decisions that never reached the server.
    pub fn unsynced_reviews(&self) -> HashMap<String, ReviewStatus> {
        self.read().unsynced_reviews.clone()
    }
}
