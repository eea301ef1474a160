pub mod community;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use community::{
    ForumPost, ForumReply, ModerationDecision, NewForumPost, NewLandlord, NewReview,
    Notification, PopularEstate, PriceTrend, Review, ReviewStatus, TrendingSearch,
};

/// Kind of rentable unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HouseType {
    Bedsitter,
    Single,
    OneBedroom,
    TwoBedroom,
    ThreeBedroom,
    Hostel,
    /// Tag the backend sent that we do not know about
    Other(String),
}

impl HouseType {
    pub fn as_str(&self) -> &str {
        match self {
            HouseType::Bedsitter => "bedsitter",
            HouseType::Single => "single",
            HouseType::OneBedroom => "1BR",
            HouseType::TwoBedroom => "2BR",
            HouseType::ThreeBedroom => "3BR",
            HouseType::Hostel => "hostel",
            HouseType::Other(tag) => tag,
        }
    }
}

impl From<&str> for HouseType {
    fn from(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "bedsitter" => HouseType::Bedsitter,
            "single" => HouseType::Single,
            "1br" | "one-bedroom" | "1 bedroom" => HouseType::OneBedroom,
            "2br" | "two-bedroom" | "2 bedroom" => HouseType::TwoBedroom,
            "3br" | "three-bedroom" | "3 bedroom" => HouseType::ThreeBedroom,
            "hostel" => HouseType::Hostel,
            _ => HouseType::Other(tag.trim().to_string()),
        }
    }
}

impl From<String> for HouseType {
    fn from(tag: String) -> Self {
        HouseType::from(tag.as_str())
    }
}

impl From<HouseType> for String {
    fn from(kind: HouseType) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for HouseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Occupancy of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    #[default]
    Vacant,
    Occupied,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Travel time in minutes from the university gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TravelTimes {
    pub walking: Option<u32>,
    pub boda: Option<u32>,
    pub matatu: Option<u32>,
}

/// Point of interest close to a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Essential {
    pub kind: String,
    pub name: String,
    pub distance_m: u32,
}

/// Location information for a listing
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub estate: String,
    pub address: String,
    pub coordinates: Coordinates,
    pub distance_from_university: TravelTimes,
    pub nearby_essentials: Vec<Essential>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amenity {
    pub name: String,
    pub available: bool,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Landlord {
    pub id: Option<String>,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub verified: bool,
    pub rating: f32,
}

/// Trust badge set by an administrator
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Verification {
    pub verified: bool,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub badges: Vec<String>,
}

/// Core listing data model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: u64,
    pub house_type: HouseType,
    pub location: Location,
    pub images: Vec<String>,
    pub amenities: Vec<Amenity>,
    pub landlord: Landlord,
    pub status: ListingStatus,
    pub rating: f32,
    pub verification: Verification,
    pub reviews: Vec<Review>,
    pub review_count: usize,
    pub safety_rating: u8,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Listing {
    /// Bare listing with every optional part defaulted.
    pub fn new(id: impl Into<String>, title: impl Into<String>, price: u64, house_type: HouseType) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            price,
            house_type,
            location: Location::default(),
            images: Vec::new(),
            amenities: Vec::new(),
            landlord: Landlord::default(),
            status: ListingStatus::Vacant,
            rating: 0.0,
            verification: Verification::default(),
            reviews: Vec::new(),
            review_count: 0,
            safety_rating: 0,
            created_at: None,
            updated_at: None,
        }
    }

    /// Recompute `rating` and `review_count` from the attached reviews.
    ///
    /// A listing without reviews keeps whatever rating the backend sent.
    pub fn with_review_stats(mut self) -> Self {
        self.review_count = self.reviews.len();
        if !self.reviews.is_empty() {
            let total: f32 = self.reviews.iter().map(|r| r.rating).sum();
            self.rating = clamp_rating(total / self.reviews.len() as f32);
        }
        self
    }

    pub fn has_amenity(&self, name: &str) -> bool {
        self.amenities
            .iter()
            .any(|a| a.available && a.name.eq_ignore_ascii_case(name))
    }

    pub fn is_vacant(&self) -> bool {
        self.status == ListingStatus::Vacant
    }
}

/// Clamp a rating into the 0..=5 scale, treating NaN as unrated.
pub fn clamp_rating(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 5.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(rating: f32) -> Review {
        Review {
            id: format!("r{rating}"),
            house_id: "h1".to_string(),
            author: "Wanjiru".to_string(),
            rating,
            comment: "ok".to_string(),
            created_at: None,
            helpful: 0,
            status: ReviewStatus::Approved,
        }
    }

    #[test]
    fn house_type_tags_parse_loosely() {
        assert_eq!(HouseType::from("1BR"), HouseType::OneBedroom);
        assert_eq!(HouseType::from(" Bedsitter "), HouseType::Bedsitter);
        assert_eq!(HouseType::from("mansion"), HouseType::Other("mansion".to_string()));
        assert_eq!(String::from(HouseType::TwoBedroom), "2BR");
    }

    #[test]
    fn review_stats_average_the_reviews() {
        let mut listing = Listing::new("h1", "Cozy", 8000, HouseType::Single);
        listing.rating = 1.0;
        listing.reviews = vec![review(4.0), review(5.0)];

        let listing = listing.with_review_stats();
        assert_eq!(listing.review_count, 2);
        assert!((listing.rating - 4.5).abs() < f32::EPSILON);
    }

    #[test]
    fn review_stats_keep_backend_rating_without_reviews() {
        let mut listing = Listing::new("h1", "Cozy", 8000, HouseType::Single);
        listing.rating = 3.7;

        let listing = listing.with_review_stats();
        assert_eq!(listing.review_count, 0);
        assert!((listing.rating - 3.7).abs() < f32::EPSILON);
    }

    #[test]
    fn ratings_are_clamped() {
        assert_eq!(clamp_rating(7.2), 5.0);
        assert_eq!(clamp_rating(-1.0), 0.0);
        assert_eq!(clamp_rating(f32::NAN), 0.0);
    }

    #[test]
    fn new_listings_start_vacant() {
        let mut listing = Listing::new("h1", "Cozy", 8000, HouseType::Single);
        assert!(listing.is_vacant());
        listing.status = ListingStatus::Occupied;
        assert!(!listing.is_vacant());
    }
}
