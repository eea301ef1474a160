use crate::error::ApiError;
use crate::models::{HouseType, ListingStatus, TravelTimes};
use serde::{Deserialize, Serialize};

/// Query parameters for server-side listing search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingQuery {
    /// Free-text search term
    pub q: Option<String>,
    /// Estate name
    pub estate: Option<String>,
    /// House type tag
    pub house_type: Option<HouseType>,
    /// Minimum price (KES)
    pub min_price: Option<u64>,
    /// Maximum price (KES)
    pub max_price: Option<u64>,
    /// Only vacant units
    pub vacant_only: bool,
}

impl ListingQuery {
    pub fn is_empty(&self) -> bool {
        self.to_pairs().is_empty()
    }

    /// Query-string pairs in the names the backend expects.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            pairs.push(("search", q.to_string()));
        }
        if let Some(estate) = self.estate.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            pairs.push(("estate", estate.to_string()));
        }
        if let Some(kind) = &self.house_type {
            pairs.push(("type", kind.to_string()));
        }
        if let Some(min) = self.min_price {
            pairs.push(("minPrice", min.to_string()));
        }
        if let Some(max) = self.max_price {
            pairs.push(("maxPrice", max.to_string()));
        }
        if self.vacant_only {
            pairs.push(("status", "vacant".to_string()));
        }
        pairs
    }
}

/// Body for creating or updating a listing from the admin console
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDraft {
    pub title: String,
    pub description: String,
    pub price: u64,
    #[serde(rename = "type")]
    pub house_type: HouseType,
    pub location: DraftLocation,
    pub amenities: Vec<DraftAmenity>,
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landlord: Option<String>,
    pub status: ListingStatus,
    pub safety_rating: u8,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftLocation {
    pub estate: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_from_university: Option<TravelTimes>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DraftAmenity {
    pub name: String,
    pub available: bool,
}

impl ListingDraft {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.title.trim().is_empty() {
            return Err(ApiError::Validation("title is required".into()));
        }
        if self.location.estate.trim().is_empty() {
            return Err(ApiError::Validation("estate is required".into()));
        }
        if self.safety_rating > 5 {
            return Err(ApiError::Validation("safety rating must be between 0 and 5".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_requires_title_and_estate() {
        let mut draft = ListingDraft {
            title: "Maraba 1BR".into(),
            description: String::new(),
            price: 12_000,
            house_type: HouseType::OneBedroom,
            location: DraftLocation::default(),
            amenities: vec![],
            images: vec![],
            landlord: None,
            status: ListingStatus::Vacant,
            safety_rating: 3,
        };
        assert!(draft.validate().is_err());
        draft.location.estate = "Maraba".into();
        assert!(draft.validate().is_ok());

        let body = serde_json::to_value(&draft).unwrap();
        assert_eq!(body["type"], "1BR");
        assert_eq!(body["safetyRating"], 3);
        assert_eq!(body["status"], "vacant");
    }

    #[test]
    fn default_query_is_empty() {
        assert!(ListingQuery::default().is_empty());
    }

    #[test]
    fn pairs_skip_blank_terms() {
        let query = ListingQuery {
            q: Some("  ".into()),
            estate: Some("Maraba".into()),
            house_type: Some(HouseType::OneBedroom),
            max_price: Some(12_000),
            ..Default::default()
        };
        assert_eq!(
            query.to_pairs(),
            vec![
                ("estate", "Maraba".to_string()),
                ("type", "1BR".to_string()),
                ("maxPrice", "12000".to_string()),
            ]
        );
    }
}
