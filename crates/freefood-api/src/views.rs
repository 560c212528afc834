//! Conversions from store records to the two response shapes: full
//! (with nested owner and description) and simplified.

use freefood_db::models::{PostRecord, TaggedPost, UserRecord};
use freefood_types::api::{PostResponse, PostSummary, UserResponse, UserSummary};

pub fn post_full(record: PostRecord) -> PostResponse {
    PostResponse {
        id: record.post.id,
        user_id: record.post.user_id,
        user: UserSummary {
            id: record.owner.id,
            name: record.owner.name,
        },
        building: record.post.building,
        room: record.post.room,
        description: record.post.description,
        image_url: record.post.image_url,
        allergens: record.allergens,
    }
}

pub fn post_simple(tagged: TaggedPost) -> PostSummary {
    PostSummary {
        id: tagged.post.id,
        user_id: tagged.post.user_id,
        building: tagged.post.building,
        room: tagged.post.room,
        allergens: tagged.allergens,
    }
}

pub fn user_full(record: UserRecord) -> UserResponse {
    UserResponse {
        id: record.user.id,
        name: record.user.name,
        posts: record.posts.into_iter().map(post_simple).collect(),
    }
}
