//! Wire shapes returned by the backend and their mapping into domain types.
//!
//! The backend omits fields freely, so every DTO field defaults and the
//! mapping fills in the rest. A partially populated record never fails to map.

use crate::models::{
    clamp_rating, Amenity, Coordinates, Essential, ForumPost, ForumReply, HouseType, Landlord,
    Listing, ListingStatus, Location, Notification, PopularEstate, PriceTrend, Review,
    ReviewStatus, TravelTimes, TrendingSearch, Verification,
};
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Url;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListingDto {
    #[serde(rename = "_id")]
    pub mongo_id: Option<String>,
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub price: Option<f64>,
    #[serde(rename = "type", alias = "houseType")]
    pub house_type: Option<String>,
    pub location: Option<LocationDto>,
    #[serde(deserialize_with = "null_as_default")]
    pub images: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub amenities: Vec<AmenityDto>,
    pub landlord: Option<LandlordRef>,
    pub status: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub rating: Option<f64>,
    pub verification: Option<VerificationDto>,
    #[serde(deserialize_with = "null_as_default")]
    pub reviews: Vec<Value>,
    #[serde(deserialize_with = "lenient_f64")]
    pub safety_rating: Option<f64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocationDto {
    pub estate: Option<String>,
    pub address: Option<String>,
    pub coordinates: Option<CoordinatesDto>,
    pub distance_from_university: Option<TravelTimesDto>,
    #[serde(deserialize_with = "null_as_default")]
    pub nearby_essentials: Vec<EssentialDto>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CoordinatesDto {
    #[serde(deserialize_with = "lenient_f64")]
    pub lat: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub lng: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TravelTimesDto {
    #[serde(deserialize_with = "lenient_f64")]
    pub walking: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub boda: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub matatu: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EssentialDto {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub distance: Option<f64>,
}

/// Older records store amenities as bare names.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AmenityDto {
    Named(String),
    Full {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        available: Option<bool>,
        #[serde(default)]
        icon: Option<String>,
    },
}

/// Unpopulated references arrive as the bare landlord id.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum LandlordRef {
    Id(String),
    Full(LandlordDto),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LandlordDto {
    #[serde(rename = "_id")]
    pub mongo_id: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub verified: Option<bool>,
    #[serde(deserialize_with = "lenient_f64")]
    pub rating: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VerificationDto {
    #[serde(alias = "isVerified")]
    pub verified: Option<bool>,
    pub verified_by: Option<String>,
    #[serde(alias = "verificationDate")]
    pub verified_date: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub badges: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReviewDto {
    #[serde(rename = "_id")]
    pub mongo_id: Option<String>,
    pub id: Option<String>,
    #[serde(alias = "house")]
    pub house_id: Option<Value>,
    #[serde(alias = "author")]
    pub user_name: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub rating: Option<f64>,
    pub comment: Option<String>,
    pub created_at: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub helpful: Option<f64>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationDto {
    #[serde(rename = "_id")]
    pub mongo_id: Option<String>,
    pub id: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(alias = "isRead")]
    pub read: Option<bool>,
    pub created_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForumReplyDto {
    #[serde(rename = "_id")]
    pub mongo_id: Option<String>,
    pub id: Option<String>,
    pub author: Option<Value>,
    pub content: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForumPostDto {
    #[serde(rename = "_id")]
    pub mongo_id: Option<String>,
    pub id: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub author: Option<Value>,
    pub category: Option<String>,
    /// Either a counter or the list of users who liked the post
    pub likes: Option<Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub replies: Vec<ForumReplyDto>,
    pub created_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InsightRowDto {
    /// Aggregation key; a string or a `{field: value}` group document
    #[serde(rename = "_id")]
    pub group_id: Option<Value>,
    #[serde(alias = "type", alias = "houseType", alias = "estate", alias = "term")]
    pub label: Option<String>,
    #[serde(alias = "avgPrice", deserialize_with = "lenient_f64")]
    pub average_price: Option<f64>,
    #[serde(alias = "listings", alias = "searches", deserialize_with = "lenient_f64")]
    pub count: Option<f64>,
}

/// Accepts numbers, numeric strings, or null.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
    .filter(|v: &f64| v.is_finite()))
}

/// `null` where a list is expected reads as an empty list.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Dates arrive as RFC 3339 timestamps or plain `YYYY-MM-DD` strings.
pub fn parse_date(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Rewrite a relative image path against the backend origin.
pub fn absolutize(base: &Url, raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("http://") || raw.starts_with("https://") || raw.starts_with("data:") {
        return raw.to_string();
    }
    base.join(raw).map(|u| u.to_string()).unwrap_or_else(|_| raw.to_string())
}

/// Pull the list out of `[...]`, `{data: [...]}`, `{houses: [...]}` and friends.
pub fn unwrap_list(value: Value, keys: &[&str]) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            for key in keys.iter().chain(["data"].iter()) {
                match map.remove(*key) {
                    Some(Value::Array(items)) => return items,
                    Some(nested @ Value::Object(_)) => return unwrap_list(nested, keys),
                    _ => {}
                }
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}

/// Pull a single record out of `{...}` or `{data: {...}}`.
pub fn unwrap_record(value: Value, keys: &[&str]) -> Value {
    if let Value::Object(map) = &value {
        for key in keys.iter().chain(["data"].iter()) {
            if let Some(inner @ Value::Object(_)) = map.get(*key) {
                return inner.clone();
            }
        }
    }
    value
}

/// Decode each element on its own so one broken record does not drop the rest.
pub fn decode_each<T, D>(items: Vec<Value>, map: impl Fn(D) -> Option<T>) -> Vec<T>
where
    D: for<'de> Deserialize<'de>,
{
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<D>(item) {
            Ok(dto) => map(dto),
            Err(e) => {
                warn!("Skipping malformed record: {}", e);
                None
            }
        })
        .collect()
}

fn text(value: Option<String>) -> String {
    value.map(|s| s.trim().to_string()).unwrap_or_default()
}

fn minutes(value: Option<f64>) -> Option<u32> {
    value.filter(|v| *v >= 0.0).map(|v| v.round() as u32)
}

/// `author` is sometimes a populated user document.
fn person_name(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s,
        Some(Value::Object(map)) => map
            .get("name")
            .or_else(|| map.get("username"))
            .and_then(Value::as_str)
            .unwrap_or("Anonymous")
            .to_string(),
        _ => "Anonymous".to_string(),
    }
}

fn reference_id(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s,
        Some(Value::Object(map)) => map
            .get("_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

impl ListingDto {
    /// Map into the domain shape. Records without an id are dropped.
    pub fn into_listing(self, base: &Url) -> Option<Listing> {
        let id = self.mongo_id.or(self.id).filter(|id| !id.trim().is_empty())?;
        let location = self.location.unwrap_or_default();
        let coordinates = location.coordinates.unwrap_or_default();
        let times = location.distance_from_university.unwrap_or_default();
        let landlord = match self.landlord {
            Some(LandlordRef::Full(landlord)) => landlord,
            Some(LandlordRef::Id(id)) => LandlordDto {
                id: Some(id).filter(|id| !id.trim().is_empty()),
                ..Default::default()
            },
            None => LandlordDto::default(),
        };
        let verification = self.verification.unwrap_or_default();

        let reviews = decode_each(self.reviews, |dto: ReviewDto| {
            let mut review = dto.into_review()?;
            if review.house_id.is_empty() {
                review.house_id = id.clone();
            }
            Some(review)
        });

        let listing = Listing {
            id: id.clone(),
            title: text(self.title),
            description: text(self.description),
            price: self.price.map(|p| p.max(0.0).round() as u64).unwrap_or(0),
            house_type: HouseType::from(self.house_type.as_deref().unwrap_or("")),
            location: Location {
                estate: text(location.estate),
                address: text(location.address),
                coordinates: Coordinates {
                    lat: coordinates.lat.unwrap_or(0.0),
                    lng: coordinates.lng.unwrap_or(0.0),
                },
                distance_from_university: TravelTimes {
                    walking: minutes(times.walking),
                    boda: minutes(times.boda),
                    matatu: minutes(times.matatu),
                },
                nearby_essentials: location
                    .nearby_essentials
                    .into_iter()
                    .map(|e| Essential {
                        kind: text(e.kind),
                        name: text(e.name),
                        distance_m: e.distance.map(|d| d.max(0.0).round() as u32).unwrap_or(0),
                    })
                    .collect(),
            },
            images: self
                .images
                .iter()
                .filter(|i| !i.trim().is_empty())
                .map(|i| absolutize(base, i))
                .collect(),
            amenities: self
                .amenities
                .into_iter()
                .filter_map(AmenityDto::into_amenity)
                .collect(),
            landlord: Landlord {
                id: landlord.mongo_id.or(landlord.id),
                name: text(landlord.name),
                phone: text(landlord.phone),
                email: landlord.email.filter(|e| !e.trim().is_empty()),
                verified: landlord.verified.unwrap_or(false),
                rating: clamp_rating(landlord.rating.unwrap_or(0.0) as f32),
            },
            status: match self.status.as_deref().map(str::to_lowercase).as_deref() {
                Some("occupied") => ListingStatus::Occupied,
                _ => ListingStatus::Vacant,
            },
            rating: clamp_rating(self.rating.unwrap_or(0.0) as f32),
            verification: Verification {
                verified: verification.verified.unwrap_or(false),
                verified_by: verification.verified_by,
                verified_at: parse_date(verification.verified_date.as_deref()),
                badges: verification.badges,
            },
            reviews,
            review_count: 0,
            safety_rating: self.safety_rating.unwrap_or(0.0).clamp(0.0, 5.0).round() as u8,
            created_at: parse_date(self.created_at.as_deref()),
            updated_at: parse_date(self.updated_at.as_deref()),
        };

        Some(listing.with_review_stats())
    }
}

impl AmenityDto {
    fn into_amenity(self) -> Option<Amenity> {
        let (name, available, icon) = match self {
            AmenityDto::Named(name) => (name, true, None),
            AmenityDto::Full { name, available, icon } => (name?, available.unwrap_or(false), icon),
        };
        let name = name.trim().to_string();
        if name.is_empty() {
            return None;
        }
        Some(Amenity {
            icon: icon.unwrap_or_else(|| name.to_lowercase()),
            name,
            available,
        })
    }
}

impl ReviewDto {
    pub fn into_review(self) -> Option<Review> {
        Some(Review {
            id: self.mongo_id.or(self.id)?,
            house_id: reference_id(self.house_id),
            author: self.user_name.unwrap_or_else(|| "Anonymous".to_string()),
            rating: clamp_rating(self.rating.unwrap_or(0.0) as f32),
            comment: text(self.comment),
            created_at: parse_date(self.created_at.as_deref()),
            helpful: self.helpful.map(|h| h.max(0.0) as u32).unwrap_or(0),
            status: match self.status.as_deref() {
                Some("approved") => ReviewStatus::Approved,
                Some("rejected") => ReviewStatus::Rejected,
                Some("pending") => ReviewStatus::Pending,
                // Public endpoints only return published reviews
                _ => ReviewStatus::Approved,
            },
        })
    }
}

impl NotificationDto {
    pub fn into_notification(self) -> Option<Notification> {
        Some(Notification {
            id: self.mongo_id.or(self.id)?,
            title: text(self.title),
            message: text(self.message),
            kind: self.kind.unwrap_or_else(|| "info".to_string()),
            read: self.read.unwrap_or(false),
            created_at: parse_date(self.created_at.as_deref()),
        })
    }
}

impl ForumPostDto {
    pub fn into_post(self) -> Option<ForumPost> {
        Some(ForumPost {
            id: self.mongo_id.or(self.id)?,
            title: text(self.title),
            content: text(self.content),
            author: person_name(self.author),
            category: self.category.unwrap_or_else(|| "general".to_string()),
            likes: match self.likes {
                Some(Value::Number(n)) => n.as_u64().unwrap_or(0) as u32,
                Some(Value::Array(users)) => users.len() as u32,
                _ => 0,
            },
            replies: self
                .replies
                .into_iter()
                .filter_map(|r| {
                    Some(ForumReply {
                        id: r.mongo_id.or(r.id)?,
                        author: person_name(r.author),
                        content: text(r.content),
                        created_at: parse_date(r.created_at.as_deref()),
                    })
                })
                .collect(),
            created_at: parse_date(self.created_at.as_deref()),
        })
    }
}

impl InsightRowDto {
    fn label(&mut self) -> Option<String> {
        let group = match self.group_id.take() {
            Some(Value::String(s)) => Some(s),
            Some(Value::Object(map)) => map.values().find_map(|v| v.as_str().map(str::to_string)),
            _ => None,
        };
        self.label.take().or(group).filter(|l| !l.trim().is_empty())
    }

    pub fn into_price_trend(mut self) -> Option<PriceTrend> {
        Some(PriceTrend {
            house_type: self.label()?,
            average_price: self.average_price.unwrap_or(0.0).max(0.0).round() as u64,
            listings: self.count.unwrap_or(0.0).max(0.0) as usize,
        })
    }

    pub fn into_popular_estate(mut self) -> Option<PopularEstate> {
        Some(PopularEstate {
            estate: self.label()?,
            listings: self.count.unwrap_or(0.0).max(0.0) as usize,
            average_price: self.average_price.unwrap_or(0.0).max(0.0).round() as u64,
        })
    }

    pub fn into_trending_search(mut self) -> Option<TrendingSearch> {
        Some(TrendingSearch {
            term: self.label()?,
            count: self.count.unwrap_or(0.0).max(0.0) as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> Url {
        Url::parse("https://api.rentals.test/").unwrap()
    }

    fn map(value: Value) -> Option<Listing> {
        serde_json::from_value::<ListingDto>(value)
            .unwrap()
            .into_listing(&base())
    }

    #[test]
    fn full_record_maps_every_section() {
        let listing = map(json!({
            "_id": "abc",
            "title": "Amalemba bedsitter",
            "price": 8000,
            "type": "bedsitter",
            "location": {
                "estate": "Amalemba",
                "address": "Off Kakamega-Webuye road",
                "coordinates": {"lat": 0.29, "lng": 34.76},
                "distanceFromUniversity": {"walking": 12, "boda": 4, "matatu": 6},
                "nearbyEssentials": [{"type": "shop", "name": "Mama Mboga", "distance": 120}]
            },
            "images": ["/uploads/a.jpg", "https://cdn.test/b.jpg"],
            "amenities": [{"name": "WiFi", "available": true, "icon": "wifi"}, "Water"],
            "landlord": {"name": "Mr. Were", "phone": "0712", "verified": true, "rating": 4.5},
            "status": "occupied",
            "rating": 4.2,
            "verification": {"isVerified": true, "verifiedBy": "admin", "verifiedDate": "2024-03-01", "badges": ["safe"]},
            "safetyRating": 4,
            "createdAt": "2024-01-02T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(listing.id, "abc");
        assert_eq!(listing.house_type, HouseType::Bedsitter);
        assert_eq!(listing.location.distance_from_university.walking, Some(12));
        assert_eq!(listing.location.nearby_essentials[0].distance_m, 120);
        assert_eq!(listing.images[0], "https://api.rentals.test/uploads/a.jpg");
        assert_eq!(listing.images[1], "https://cdn.test/b.jpg");
        assert_eq!(listing.amenities.len(), 2);
        assert!(listing.has_amenity("water"));
        assert_eq!(listing.status, ListingStatus::Occupied);
        assert!(listing.verification.verified);
        assert!(listing.verification.verified_at.is_some());
        assert_eq!(listing.safety_rating, 4);
        assert!(listing.created_at.is_some());
    }

    #[test]
    fn sparse_record_gets_defaults() {
        let listing = map(json!({"_id": "x", "price": "12,500"})).unwrap();
        assert_eq!(listing.price, 12_500);
        assert_eq!(listing.location.coordinates, Coordinates { lat: 0.0, lng: 0.0 });
        assert_eq!(listing.location.distance_from_university.walking, None);
        assert!(listing.amenities.is_empty());
        assert_eq!(listing.status, ListingStatus::Vacant);
        assert_eq!(listing.rating, 0.0);
    }

    #[test]
    fn record_without_id_is_dropped() {
        assert!(map(json!({"title": "ghost"})).is_none());
    }

    #[test]
    fn embedded_reviews_drive_the_rating() {
        let listing = map(json!({
            "_id": "h1",
            "rating": 1.0,
            "reviews": [
                {"_id": "r1", "userName": "A", "rating": 5, "comment": "great"},
                {"_id": "r2", "userName": "B", "rating": 3, "comment": "fine"},
                {"rating": 1}
            ]
        }))
        .unwrap();
        assert_eq!(listing.review_count, 2);
        assert_eq!(listing.rating, 4.0);
        assert_eq!(listing.reviews[0].house_id, "h1");
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let listing = map(json!({"_id": "x", "price": -5, "rating": 9, "safetyRating": 12})).unwrap();
        assert_eq!(listing.price, 0);
        assert_eq!(listing.rating, 5.0);
        assert_eq!(listing.safety_rating, 5);
    }

    #[test]
    fn list_envelopes_are_unwrapped() {
        assert_eq!(unwrap_list(json!([1, 2]), &["houses"]).len(), 2);
        assert_eq!(unwrap_list(json!({"houses": [1]}), &["houses"]).len(), 1);
        assert_eq!(unwrap_list(json!({"data": {"houses": [1, 2, 3]}}), &["houses"]).len(), 3);
        assert!(unwrap_list(json!({"message": "ok"}), &["houses"]).is_empty());
    }

    #[test]
    fn decode_each_skips_broken_items() {
        let items = vec![json!({"_id": "ok"}), json!("nonsense"), json!({"_id": "ok2"})];
        let listings = decode_each(items, |dto: ListingDto| dto.into_listing(&base()));
        assert_eq!(listings.len(), 2);
    }

    #[test]
    fn forum_likes_accept_counter_or_user_list() {
        let post: ForumPostDto =
            serde_json::from_value(json!({"_id": "p", "likes": ["u1", "u2"], "author": {"name": "Kevo"}}))
                .unwrap();
        let post = post.into_post().unwrap();
        assert_eq!(post.likes, 2);
        assert_eq!(post.author, "Kevo");
    }

    #[test]
    fn plain_dates_parse_at_midnight() {
        let date = parse_date(Some("2024-05-06")).unwrap();
        assert_eq!(date.to_rfc3339(), "2024-05-06T00:00:00+00:00");
        assert!(parse_date(Some("yesterday")).is_none());
    }

    #[test]
    fn null_lists_read_as_empty() {
        let listing = map(json!({
            "_id": "x",
            "images": null,
            "amenities": null,
            "reviews": null,
            "location": {"estate": "Lurambi", "nearbyEssentials": null},
            "verification": {"isVerified": true, "badges": null}
        }))
        .unwrap();
        assert!(listing.images.is_empty());
        assert!(listing.amenities.is_empty());
        assert!(listing.reviews.is_empty());
        assert!(listing.location.nearby_essentials.is_empty());
        assert!(listing.verification.badges.is_empty());
        assert!(listing.verification.verified);

        let post: ForumPostDto =
            serde_json::from_value(json!({"_id": "p", "replies": null})).unwrap();
        assert!(post.into_post().unwrap().replies.is_empty());
    }

    #[test]
    fn unpopulated_landlord_keeps_the_reference() {
        let listings = decode_each(
            vec![json!({"_id": "x", "landlord": "64ab12cd"})],
            |dto: ListingDto| dto.into_listing(&base()),
        );
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].landlord.id.as_deref(), Some("64ab12cd"));
        assert!(listings[0].landlord.name.is_empty());

        let listing = map(json!({"_id": "y", "landlord": {"_id": "l1", "name": "Mr. Were"}})).unwrap();
        assert_eq!(listing.landlord.id.as_deref(), Some("l1"));
        assert_eq!(listing.landlord.name, "Mr. Were");
    }

    #[test]
    fn insight_rows_prefer_named_label_over_group_key() {
        let row: InsightRowDto = serde_json::from_value(
            json!({"_id": "Amalemba", "estate": "Amalemba Estate", "count": 4}),
        )
        .unwrap();
        let estate = row.into_popular_estate().unwrap();
        assert_eq!(estate.estate, "Amalemba Estate");
        assert_eq!(estate.listings, 4);

        let row: InsightRowDto =
            serde_json::from_value(json!({"_id": {"type": "bedsitter"}, "avgPrice": "7500"})).unwrap();
        let trend = row.into_price_trend().unwrap();
        assert_eq!(trend.house_type, "bedsitter");
        assert_eq!(trend.average_price, 7_500);
    }
}
