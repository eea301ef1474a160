use crate::api::dto::{
    decode_each, unwrap_list, unwrap_record, ForumPostDto, InsightRowDto, ListingDto,
    NotificationDto, ReviewDto,
};
use crate::api::insights;
use crate::api::traits::ListingSource;
use crate::api::types::{ListingDraft, ListingQuery};
use crate::error::ApiError;
use crate::models::{
    ForumPost, Landlord, Listing, ModerationDecision, NewForumPost, NewLandlord, NewReview,
    Notification, PopularEstate, PriceTrend, Review, TrendingSearch,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

const API_PREFIX: [&str; 2] = ["api", "v1"];

/// REST client for the rentals backend
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client for `base_url` with a per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url).with_context(|| format!("Invalid API url: {base_url}"))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            anyhow::bail!("API url must be an http(s) origin: {base_url}");
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("estate-scout/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, base, token: None })
    }

    /// Attach a bearer token for authenticated calls
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// `{base}/api/v1/{segments...}` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(API_PREFIX.iter()).extend(segments);
        }
        url
    }

    fn with_optional_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn with_required_auth(&self, request: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        let token = self.token.as_ref().ok_or(ApiError::MissingToken)?;
        Ok(request.bearer_auth(token))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let url = response.url().clone();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("{} returned status: {}", url.path(), status);
            return Err(ApiError::from_status(status, body));
        }

        debug!("{} returned {} bytes", url.path(), body.len());
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn get(&self, segments: &[&str]) -> Result<Value, ApiError> {
        let request = self.client.get(self.endpoint(segments));
        self.send(self.with_optional_auth(request)).await
    }

    fn map_listings(&self, value: Value) -> Vec<Listing> {
        decode_each(unwrap_list(value, &["houses"]), |dto: ListingDto| {
            dto.into_listing(&self.base)
        })
    }

    fn map_listing(&self, value: Value) -> Result<Listing, ApiError> {
        let record = unwrap_record(value, &["house"]);
        let dto = ListingDto::deserialize(record)?;
        dto.into_listing(&self.base).ok_or(ApiError::NotFound)
    }

    // Listings

    pub async fn list_houses(&self) -> Result<Vec<Listing>, ApiError> {
        let value = self.get(&["houses", "getAll"]).await?;
        let listings = self.map_listings(value);
        info!("Fetched {} listings", listings.len());
        Ok(listings)
    }

    pub async fn get_house(&self, id: &str) -> Result<Listing, ApiError> {
        let value = self.get(&["houses", "house", id]).await?;
        self.map_listing(value)
    }

    /// Server-side search; the same endpoint as `list_houses` with query parameters.
    pub async fn search_houses(&self, query: &ListingQuery) -> Result<Vec<Listing>, ApiError> {
        let request = self
            .client
            .get(self.endpoint(&["houses", "getAll"]))
            .query(&query.to_pairs());
        let value = self.send(self.with_optional_auth(request)).await?;
        Ok(self.map_listings(value))
    }

    pub async fn create_house(&self, draft: &ListingDraft) -> Result<Listing, ApiError> {
        draft.validate()?;
        let request = self.client.post(self.endpoint(&["houses", "create"])).json(draft);
        let value = self.send(self.with_required_auth(request)?).await?;
        info!("Created listing {}", draft.title);
        self.map_listing(value)
    }

    pub async fn update_house(&self, id: &str, draft: &ListingDraft) -> Result<Listing, ApiError> {
        draft.validate()?;
        let request = self.client.put(self.endpoint(&["houses", "update", id])).json(draft);
        let value = self.send(self.with_required_auth(request)?).await?;
        self.map_listing(value)
    }

    pub async fn delete_house(&self, id: &str) -> Result<(), ApiError> {
        let request = self.client.delete(self.endpoint(&["houses", "delete", id]));
        self.send(self.with_required_auth(request)?).await?;
        info!("Deleted listing {}", id);
        Ok(())
    }

    // Reviews

    fn map_reviews(value: Value) -> Vec<Review> {
        decode_each(unwrap_list(value, &["reviews"]), ReviewDto::into_review)
    }

    pub async fn reviews_for_house(&self, house_id: &str) -> Result<Vec<Review>, ApiError> {
        let value = self.get(&["reviews", "house", house_id]).await?;
        Ok(Self::map_reviews(value))
    }

    pub async fn recent_reviews(&self) -> Result<Vec<Review>, ApiError> {
        Ok(Self::map_reviews(self.get(&["reviews", "recent"]).await?))
    }

    pub async fn top_reviews(&self) -> Result<Vec<Review>, ApiError> {
        Ok(Self::map_reviews(self.get(&["reviews", "top"]).await?))
    }

    pub async fn create_review(&self, review: &NewReview) -> Result<Option<Review>, ApiError> {
        review.validate()?;
        let request = self.client.post(self.endpoint(&["reviews", "create"])).json(review);
        let value = self.send(self.with_optional_auth(request)).await?;
        let record = unwrap_record(value, &["review"]);
        Ok(ReviewDto::deserialize(record).ok().and_then(ReviewDto::into_review))
    }

    pub async fn moderate_review(
        &self,
        review_id: &str,
        decision: ModerationDecision,
    ) -> Result<(), ApiError> {
        let request = self
            .client
            .put(self.endpoint(&["reviews", decision.route(), review_id]));
        self.send(self.with_required_auth(request)?).await?;
        Ok(())
    }

    pub async fn approve_review(&self, review_id: &str) -> Result<(), ApiError> {
        self.moderate_review(review_id, ModerationDecision::Approve).await
    }

    pub async fn reject_review(&self, review_id: &str) -> Result<(), ApiError> {
        self.moderate_review(review_id, ModerationDecision::Reject).await
    }

    // Favorites

    pub async fn add_favorite(&self, house_id: &str) -> Result<(), ApiError> {
        let request = self.client.post(self.endpoint(&["users", "favorites", house_id]));
        self.send(self.with_required_auth(request)?).await?;
        Ok(())
    }

    pub async fn remove_favorite(&self, house_id: &str) -> Result<(), ApiError> {
        let request = self.client.delete(self.endpoint(&["users", "favorites", house_id]));
        self.send(self.with_required_auth(request)?).await?;
        Ok(())
    }

    // Notifications

    pub async fn notifications(&self) -> Result<Vec<Notification>, ApiError> {
        let value = self.get(&["notifications", "getAll"]).await?;
        Ok(decode_each(
            unwrap_list(value, &["notifications"]),
            NotificationDto::into_notification,
        ))
    }

    pub async fn mark_notification_read(&self, id: &str) -> Result<(), ApiError> {
        let request = self
            .client
            .put(self.endpoint(&["notifications", "updateNotification", id]))
            .json(&json!({ "read": true }));
        self.send(self.with_optional_auth(request)).await?;
        Ok(())
    }

    // Forum

    pub async fn forum_posts(&self) -> Result<Vec<ForumPost>, ApiError> {
        let value = self.get(&["forums", "getAll"]).await?;
        Ok(decode_each(unwrap_list(value, &["posts", "forums"]), ForumPostDto::into_post))
    }

    pub async fn create_forum_post(&self, post: &NewForumPost) -> Result<Option<ForumPost>, ApiError> {
        post.validate()?;
        let request = self.client.post(self.endpoint(&["forums", "create"])).json(post);
        let value = self.send(self.with_optional_auth(request)).await?;
        let record = unwrap_record(value, &["post", "forum"]);
        Ok(ForumPostDto::deserialize(record).ok().and_then(ForumPostDto::into_post))
    }

    pub async fn reply_to_post(&self, post_id: &str, author: &str, content: &str) -> Result<(), ApiError> {
        if content.trim().is_empty() {
            return Err(ApiError::Validation("reply cannot be empty".into()));
        }
        let request = self
            .client
            .post(self.endpoint(&["forums", post_id, "reply"]))
            .json(&json!({ "author": author, "content": content }));
        self.send(self.with_optional_auth(request)).await?;
        Ok(())
    }

    pub async fn like_post(&self, post_id: &str) -> Result<(), ApiError> {
        let request = self.client.post(self.endpoint(&["forums", post_id, "like"]));
        self.send(self.with_optional_auth(request)).await?;
        Ok(())
    }

    // Landlords (admin)

    pub async fn landlords(&self) -> Result<Vec<Landlord>, ApiError> {
        let value = self.get(&["landlords", "getAll"]).await?;
        Ok(decode_each(unwrap_list(value, &["landlords"]), |dto: LandlordRow| {
            Some(dto.into())
        }))
    }

    pub async fn create_landlord(&self, landlord: &NewLandlord) -> Result<(), ApiError> {
        landlord.validate()?;
        let request = self.client.post(self.endpoint(&["landlords", "create"])).json(landlord);
        self.send(self.with_required_auth(request)?).await?;
        info!("Created landlord {}", landlord.name);
        Ok(())
    }

    pub async fn update_landlord(&self, id: &str, landlord: &NewLandlord) -> Result<(), ApiError> {
        landlord.validate()?;
        let request = self
            .client
            .put(self.endpoint(&["landlords", "update", id]))
            .json(landlord);
        self.send(self.with_required_auth(request)?).await?;
        Ok(())
    }

    pub async fn delete_landlord(&self, id: &str) -> Result<(), ApiError> {
        let request = self.client.delete(self.endpoint(&["landlords", "delete", id]));
        self.send(self.with_required_auth(request)?).await?;
        Ok(())
    }

    // Insights: a missing endpoint falls back to numbers computed from `listings`

    async fn insight_rows(&self, route: &str) -> Result<Option<Vec<InsightRowDto>>, ApiError> {
        match self.get(&["insights", route]).await {
            Ok(value) => Ok(Some(decode_each(
                unwrap_list(value, &["trends", "estates", "searches"]),
                Some,
            ))),
            Err(e) if e.is_not_found() => {
                info!("Insights endpoint {} missing, computing locally", route);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn price_trends(&self, listings: &[Listing]) -> Result<Vec<PriceTrend>, ApiError> {
        Ok(match self.insight_rows("price-trends").await? {
            Some(rows) => rows.into_iter().filter_map(InsightRowDto::into_price_trend).collect(),
            None => insights::price_trends(listings),
        })
    }

    pub async fn popular_estates(&self, listings: &[Listing]) -> Result<Vec<PopularEstate>, ApiError> {
        Ok(match self.insight_rows("popular-estates").await? {
            Some(rows) => rows.into_iter().filter_map(InsightRowDto::into_popular_estate).collect(),
            None => insights::popular_estates(listings),
        })
    }

    pub async fn trending_searches(&self, listings: &[Listing]) -> Result<Vec<TrendingSearch>, ApiError> {
        Ok(match self.insight_rows("trending-searches").await? {
            Some(rows) => rows.into_iter().filter_map(InsightRowDto::into_trending_search).collect(),
            None => insights::trending_searches(listings),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LandlordRow {
    #[serde(rename = "_id")]
    mongo_id: Option<String>,
    id: Option<String>,
    name: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    verified: Option<bool>,
    rating: Option<f32>,
}

impl From<LandlordRow> for Landlord {
    fn from(row: LandlordRow) -> Self {
        Landlord {
            id: row.mongo_id.or(row.id),
            name: row.name.unwrap_or_default(),
            phone: row.phone.unwrap_or_default(),
            email: row.email,
            verified: row.verified.unwrap_or(false),
            rating: crate::models::clamp_rating(row.rating.unwrap_or(0.0)),
        }
    }
}

#[async_trait]
impl ListingSource for ApiClient {
    async fn fetch_listings(&self) -> Result<Vec<Listing>, ApiError> {
        self.list_houses().await
    }

    fn source_name(&self) -> &'static str {
        "rentals-api"
    }
}
