pub mod client;
pub mod dto;
pub mod insights;
pub mod traits;
pub mod types;

pub use client::ApiClient;
pub use traits::ListingSource;
pub use types::{DraftAmenity, DraftLocation, ListingDraft, ListingQuery};
