//! Database row types. These map directly to SQLite rows and are
//! distinct from the wire types in freefood-types.

use freefood_types::AllergenTags;

#[derive(Debug, Clone, PartialEq)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostRow {
    pub id: i64,
    pub user_id: i64,
    pub building: String,
    pub room: String,
    pub description: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllergenRow {
    pub id: i64,
    pub tags: AllergenTags,
}

/// A post with the tag sets linked to it, in link order.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedPost {
    pub post: PostRow,
    pub allergens: Vec<AllergenTags>,
}

/// A post with its owner and tag sets.
#[derive(Debug, Clone, PartialEq)]
pub struct PostRecord {
    pub post: PostRow,
    pub owner: UserRow,
    pub allergens: Vec<AllergenTags>,
}

/// A user with every post they own.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub user: UserRow,
    pub posts: Vec<TaggedPost>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetRow {
    pub id: i64,
    pub base_url: Option<String>,
    pub salt: String,
    pub extension: String,
    pub width: u32,
    pub height: u32,
    pub created_at: String,
}
