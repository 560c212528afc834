use std::fmt;

use serde::{Deserialize, Serialize};

use crate::allergens::AllergenTags;

// -- Errors --

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// A required request field was absent or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingField(pub &'static str);

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "missing required field: {}", self.0)
    }
}

impl std::error::Error for MissingField {}

// -- Users --

#[derive(Debug, Default, Deserialize)]
pub struct CreateUserRequest {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub posts: Vec<PostSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserList {
    pub users: Vec<UserResponse>,
}

// -- Posts --

/// Body of both create and update. Every field is optional on the wire so
/// that absence can be reported as a bad request instead of a parse error.
#[derive(Debug, Default, Deserialize)]
pub struct PostRequest {
    pub user_id: Option<i64>,
    pub building: Option<String>,
    pub room: Option<String>,
    pub description: Option<String>,
    pub vegan: Option<bool>,
    pub vegetarian: Option<bool>,
    pub gluten_free: Option<bool>,
    pub dairy_free: Option<bool>,
    pub nut_free: Option<bool>,
    pub fish_free: Option<bool>,
    pub shell_free: Option<bool>,
    pub wheat_free: Option<bool>,
    pub soy_free: Option<bool>,
    /// `data:image/<type>;base64,<payload>`
    pub image_data: Option<String>,
}

/// A post request with every required field present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub user_id: i64,
    pub building: String,
    pub room: String,
    pub description: String,
    pub allergens: AllergenTags,
}

fn required<T>(value: Option<T>, name: &'static str) -> Result<T, MissingField> {
    value.ok_or(MissingField(name))
}

impl PostRequest {
    pub fn validate(&self) -> Result<NewPost, MissingField> {
        Ok(NewPost {
            user_id: required(self.user_id, "user_id")?,
            building: required(self.building.clone(), "building")?,
            room: required(self.room.clone(), "room")?,
            description: required(self.description.clone(), "description")?,
            allergens: AllergenTags {
                vegan: required(self.vegan, "vegan")?,
                vegetarian: required(self.vegetarian, "vegetarian")?,
                gluten_free: required(self.gluten_free, "gluten_free")?,
                dairy_free: required(self.dairy_free, "dairy_free")?,
                nut_free: required(self.nut_free, "nut_free")?,
                fish_free: required(self.fish_free, "fish_free")?,
                shell_free: required(self.shell_free, "shell_free")?,
                wheat_free: required(self.wheat_free, "wheat_free")?,
                soy_free: required(self.soy_free, "soy_free")?,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: i64,
    pub user_id: i64,
    pub user: UserSummary,
    pub building: String,
    pub room: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub allergens: Vec<AllergenTags>,
}

/// Post without its owner or description, used inside users and filter groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: i64,
    pub user_id: i64,
    pub building: String,
    pub room: String,
    pub allergens: Vec<AllergenTags>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostList {
    pub posts: Vec<PostResponse>,
}

// -- Filter --

#[derive(Debug, Deserialize)]
pub struct FilterQuery {
    pub filter: Option<String>,
}

/// One inner list per matching tag set.
#[derive(Debug, Serialize, Deserialize)]
pub struct FilterResponse {
    pub posts: Vec<Vec<PostSummary>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_request() -> PostRequest {
        serde_json::from_value(serde_json::json!({
            "user_id": 1,
            "building": "Low",
            "room": "101",
            "description": "pizza",
            "vegan": false,
            "vegetarian": true,
            "gluten_free": false,
            "dairy_free": false,
            "nut_free": true,
            "fish_free": true,
            "shell_free": true,
            "wheat_free": false,
            "soy_free": true,
        }))
        .unwrap()
    }

    #[test]
    fn validate_accepts_complete_request() {
        let post = full_request().validate().unwrap();
        assert_eq!(post.user_id, 1);
        assert_eq!(post.room, "101");
        assert!(post.allergens.vegetarian && post.allergens.soy_free);
        assert!(!post.allergens.vegan);
    }

    #[test]
    fn validate_reports_first_missing_field() {
        let mut req = full_request();
        req.room = None;
        assert_eq!(req.validate(), Err(MissingField("room")));

        let mut req = full_request();
        req.wheat_free = None;
        assert_eq!(req.validate(), Err(MissingField("wheat_free")));
    }

    #[test]
    fn explicit_null_counts_as_missing() {
        let req: PostRequest =
            serde_json::from_str(r#"{"user_id": null, "building": "Low"}"#).unwrap();
        assert_eq!(req.validate(), Err(MissingField("user_id")));
    }

    #[test]
    fn image_url_omitted_when_unset() {
        let post = PostResponse {
            id: 1,
            user_id: 1,
            user: UserSummary { id: 1, name: "Alice".into() },
            building: "Low".into(),
            room: "101".into(),
            description: "pizza".into(),
            image_url: None,
            allergens: vec![AllergenTags::default()],
        };
        let json = serde_json::to_value(&post).unwrap();
        assert!(json.get("image_url").is_none());
        assert_eq!(json["allergens"][0]["soy_free"], false);
    }
}
