//! Client for a student-housing rental platform: typed access to the REST
//! backend, client-side listing filters, a silently refreshed local cache,
//! and an observable store for UI state.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod models;
pub mod store;

pub use error::ApiError;
