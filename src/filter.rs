//! Client-side listing filters.
//!
//! Every predicate is only applied when its field differs from the default,
//! and a listing has to pass all applied predicates. Filtering never
//! reorders and never fails: a listing missing the data a predicate needs
//! simply does not match that predicate.

use crate::models::{HouseType, Listing};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PRICE_RANGE: (u64, u64) = (0, 100_000);
pub const DEFAULT_MAX_WALKING_MINUTES: u32 = 30;

/// Filters held by the store and edited from the search panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Inclusive `(min, max)` price
    pub price_range: (u64, u64),
    pub house_types: Vec<HouseType>,
    pub max_walking_minutes: u32,
    /// Amenity names that must all be available
    pub amenities: Vec<String>,
    pub min_rating: f32,
    pub min_safety_rating: u8,
    pub verified_only: bool,
    pub estates: Vec<String>,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            price_range: DEFAULT_PRICE_RANGE,
            house_types: Vec::new(),
            max_walking_minutes: DEFAULT_MAX_WALKING_MINUTES,
            amenities: Vec::new(),
            min_rating: 0.0,
            min_safety_rating: 0,
            verified_only: false,
            estates: Vec::new(),
        }
    }
}

impl SearchFilters {
    fn price_active(&self) -> bool {
        self.price_range != DEFAULT_PRICE_RANGE
    }

    fn walking_active(&self) -> bool {
        self.max_walking_minutes != DEFAULT_MAX_WALKING_MINUTES
    }

    /// Number of predicates that will actually be applied.
    pub fn active_count(&self) -> usize {
        [
            self.price_active(),
            !self.house_types.is_empty(),
            self.walking_active(),
            !self.amenities.is_empty(),
            self.min_rating > 0.0,
            self.min_safety_rating > 0,
            self.verified_only,
            !self.estates.is_empty(),
        ]
        .into_iter()
        .filter(|active| *active)
        .count()
    }

    pub fn is_default(&self) -> bool {
        self.active_count() == 0
    }

    pub fn matches(&self, listing: &Listing) -> bool {
        if self.price_active() {
            let (min, max) = self.price_range;
            if listing.price < min || listing.price > max {
                return false;
            }
        }

        if !self.house_types.is_empty() && !self.house_types.contains(&listing.house_type) {
            return false;
        }

        if !self.estates.is_empty() {
            let estate = listing.location.estate.trim();
            if estate.is_empty() || !self.estates.iter().any(|e| e.trim().eq_ignore_ascii_case(estate)) {
                return false;
            }
        }

        if !self.amenities.iter().all(|name| listing.has_amenity(name)) {
            return false;
        }

        if self.min_rating > 0.0 && listing.rating < self.min_rating {
            return false;
        }

        if self.min_safety_rating > 0 && listing.safety_rating < self.min_safety_rating {
            return false;
        }

        if self.verified_only && !listing.verification.verified {
            return false;
        }

        if self.walking_active() {
            match listing.location.distance_from_university.walking {
                Some(minutes) if minutes <= self.max_walking_minutes => {}
                _ => return false,
            }
        }

        true
    }
}

/// Listings passing every active filter, in input order.
pub fn apply_filters<'a>(listings: &'a [Listing], filters: &SearchFilters) -> Vec<&'a Listing> {
    listings.iter().filter(|l| filters.matches(l)).collect()
}

/// Case-insensitive match against title, estate, or any amenity name.
pub fn matches_query(listing: &Listing, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    listing.title.to_lowercase().contains(&needle)
        || listing.location.estate.to_lowercase().contains(&needle)
        || listing
            .amenities
            .iter()
            .any(|a| a.name.to_lowercase().contains(&needle))
}

/// Global search box.
pub fn text_search<'a>(listings: &'a [Listing], query: &str) -> Vec<&'a Listing> {
    listings.iter().filter(|l| matches_query(l, query)).collect()
}

/// Equality filters used by the standalone filter panels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimpleFilter {
    pub price: Option<u64>,
    pub estate: Option<String>,
    pub house_type: Option<HouseType>,
}

impl SimpleFilter {
    pub fn matches(&self, listing: &Listing) -> bool {
        if let Some(price) = self.price {
            if listing.price != price {
                return false;
            }
        }
        if let Some(estate) = self.estate.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            if !listing.location.estate.trim().eq_ignore_ascii_case(estate) {
                return false;
            }
        }
        if let Some(kind) = &self.house_type {
            if &listing.house_type != kind {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, listings: &'a [Listing]) -> Vec<&'a Listing> {
        listings.iter().filter(|l| self.matches(l)).collect()
    }
}
