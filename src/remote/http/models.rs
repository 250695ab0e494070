use serde::{Deserialize, Serialize};

use crate::engine::EngagementState;

/// Envelope wrapping every payload returned by the API.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub data: T,
}

/// Body of the post and reply like endpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LikeToggleResponse {
    #[serde(alias = "likeCount")]
    pub like_count: i64,
    #[serde(alias = "isLiked")]
    pub is_liked: bool,
}

impl From<LikeToggleResponse> for EngagementState {
    fn from(value: LikeToggleResponse) -> Self {
        Self {
            count: u64::try_from(value.like_count).unwrap_or(0),
            engaged: value.is_liked,
        }
    }
}

/// Body of the post and reply `like/check` endpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LikeStatusResponse {
    #[serde(alias = "isLiked")]
    pub is_liked: bool,
}

/// Body of `POST /lists/{list_id}/places`.
#[derive(Debug, Serialize)]
pub struct AddPlaceRequest<'a> {
    pub place_id: &'a str,
}
