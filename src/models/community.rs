use crate::error::ApiError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub house_id: String,
    pub author: String,
    pub rating: f32,
    pub comment: String,
    pub created_at: Option<DateTime<Utc>>,
    pub helpful: u32,
    pub status: ReviewStatus,
}

/// Admin verdict on a pending review
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationDecision {
    Approve,
    Reject,
}

impl ModerationDecision {
    pub fn status(self) -> ReviewStatus {
        match self {
            ModerationDecision::Approve => ReviewStatus::Approved,
            ModerationDecision::Reject => ReviewStatus::Rejected,
        }
    }

    pub(crate) fn route(self) -> &'static str {
        match self {
            ModerationDecision::Approve => "approve",
            ModerationDecision::Reject => "reject",
        }
    }
}

/// Body of `POST /reviews/create`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub house_id: String,
    pub user_name: String,
    pub rating: u8,
    pub comment: String,
}

impl NewReview {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.house_id.trim().is_empty() {
            return Err(ApiError::Validation("house id is required".into()));
        }
        if self.user_name.trim().is_empty() {
            return Err(ApiError::Validation("name is required".into()));
        }
        if !(1..=5).contains(&self.rating) {
            return Err(ApiError::Validation("rating must be between 1 and 5".into()));
        }
        if self.comment.trim().is_empty() {
            return Err(ApiError::Validation("comment is required".into()));
        }
        Ok(())
    }
}

/// Server-side notification shown in the bell menu
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub read: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForumReply {
    pub id: String,
    pub author: String,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForumPost {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author: String,
    pub category: String,
    pub likes: u32,
    pub replies: Vec<ForumReply>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewForumPost {
    pub title: String,
    pub content: String,
    pub author: String,
    pub category: String,
}

impl NewForumPost {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.title.trim().is_empty() {
            return Err(ApiError::Validation("title is required".into()));
        }
        if self.content.trim().is_empty() {
            return Err(ApiError::Validation("content is required".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewLandlord {
    pub name: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub verified: bool,
}

impl NewLandlord {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::Validation("landlord name is required".into()));
        }
        if self.phone.trim().is_empty() {
            return Err(ApiError::Validation("landlord phone is required".into()));
        }
        Ok(())
    }
}

/// Average asking price for one house type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTrend {
    pub house_type: String,
    pub average_price: u64,
    pub listings: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularEstate {
    pub estate: String,
    pub listings: usize,
    pub average_price: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingSearch {
    pub term: String,
    pub count: usize,
}
