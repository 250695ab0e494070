use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of content an engagement points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    /// Like on a forum post.
    Post,
    /// Like on a reply to a forum post.
    Reply,
    /// Membership of a place in one of the caller's saved lists.
    ListPlace,
}

/// Identifies one toggleable relationship between the caller and a piece of content.
///
/// At most one [`EngagementState`](super::EngagementState) and at most one pending
/// operation exist per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngagementKey {
    /// Like on a forum post.
    Post {
        /// Identifier of the post.
        post_id: String,
    },
    /// Like on a reply. The parent post is kept because the remote endpoint is nested under it.
    Reply {
        /// Identifier of the parent post.
        post_id: String,
        /// Identifier of the reply.
        reply_id: String,
    },
    /// Presence of a place in a saved list.
    ListPlace {
        /// Identifier of the saved list.
        list_id: String,
        /// Identifier of the place.
        place_id: String,
    },
}

impl EngagementKey {
    /// Key for a like on a post.
    pub fn post(post_id: impl Into<String>) -> Self {
        Self::Post {
            post_id: post_id.into(),
        }
    }

    /// Key for a like on a reply.
    pub fn reply(post_id: impl Into<String>, reply_id: impl Into<String>) -> Self {
        Self::Reply {
            post_id: post_id.into(),
            reply_id: reply_id.into(),
        }
    }

    /// Key for the membership of a place in a list.
    pub fn list_place(list_id: impl Into<String>, place_id: impl Into<String>) -> Self {
        Self::ListPlace {
            list_id: list_id.into(),
            place_id: place_id.into(),
        }
    }

    /// Domain of the key, used to pick the debounce window.
    pub fn target_type(&self) -> TargetType {
        match self {
            Self::Post { .. } => TargetType::Post,
            Self::Reply { .. } => TargetType::Reply,
            Self::ListPlace { .. } => TargetType::ListPlace,
        }
    }

    /// Identifier of the entity the engagement targets (post, reply or place).
    pub fn target_id(&self) -> &str {
        match self {
            Self::Post { post_id } => post_id,
            Self::Reply { reply_id, .. } => reply_id,
            Self::ListPlace { place_id, .. } => place_id,
        }
    }
}

impl fmt::Display for EngagementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Post { post_id } => write!(f, "post:{post_id}"),
            Self::Reply { post_id, reply_id } => write!(f, "reply:{post_id}/{reply_id}"),
            Self::ListPlace { list_id, place_id } => write!(f, "list:{list_id}/{place_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_keys_are_scoped_by_reply_id() {
        let a = EngagementKey::reply("p1", "r1");
        let b = EngagementKey::reply("p1", "r2");

        assert_ne!(a, b);
        assert_eq!(a.target_type(), TargetType::Reply);
        assert_eq!(a.target_id(), "r1");
        assert_eq!(a.to_string(), "reply:p1/r1");
    }

    #[test]
    fn deserializes_tagged_representation() {
        let key: EngagementKey =
            serde_json::from_str(r#"{"type":"list_place","list_id":"l1","place_id":"x"}"#)
                .unwrap();
        assert_eq!(key, EngagementKey::list_place("l1", "x"));
    }
}
