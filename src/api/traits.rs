use crate::error::ApiError;
use crate::models::Listing;
use async_trait::async_trait;

/// Anything that can hand back the current set of listings.
///
/// The store and the CLI only depend on this, so tests can swap the
/// backend for an in-memory source.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch every listing the source knows about
    async fn fetch_listings(&self) -> Result<Vec<Listing>, ApiError>;

    /// Name of the source, for logs
    fn source_name(&self) -> &'static str;
}

#[async_trait]
impl ListingSource for Vec<Listing> {
    async fn fetch_listings(&self) -> Result<Vec<Listing>, ApiError> {
        Ok(self.clone())
    }

    fn source_name(&self) -> &'static str {
        "memory"
    }
}
