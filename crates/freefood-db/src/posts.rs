use std::collections::HashMap;
use std::str::FromStr;

use freefood_types::AllergenTags;
use freefood_types::api::NewPost;
use rusqlite::{Connection, Params, Row, params};
use tracing::info;

use crate::assets::{NewAsset, insert_asset};
use crate::error::OptionalExt;
use crate::models::{PostRecord, PostRow, TaggedPost, UserRow};
use crate::users::query_user;
use crate::{Database, DbError, Result};

/// How `update_post` maps request fields onto the stored post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdateMapping {
    /// Historical behavior: `room` receives the request's `description`.
    #[default]
    Legacy,
    /// Each column receives the request field of the same name.
    Direct,
}

impl FromStr for UpdateMapping {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "direct" => Ok(Self::Direct),
            other => Err(format!("unknown update mapping '{}'", other)),
        }
    }
}

pub(crate) const ALLERGEN_COLUMNS: &str = "vegan, vegetarian, gluten_free, dairy_free, nut_free, \
     fish_free, shell_free, wheat_free, soy_free";

const POST_COLUMNS: &str = "p.id, p.user_id, p.building, p.room, p.description, p.image_url";

impl Database {
    // -- Posts --

    /// Create a post owned by `new.user_id` with one fresh tag set linked to it.
    pub fn create_post(&self, new: &NewPost, image: Option<&NewAsset>) -> Result<PostRecord> {
        let record = self.with_tx(|conn| {
            let owner = query_user(conn, new.user_id)?.ok_or(DbError::UserNotFound(new.user_id))?;

            let image_url = match image {
                Some(asset) => {
                    insert_asset(conn, asset)?;
                    Some(asset.url.clone())
                }
                None => None,
            };

            conn.execute(
                "INSERT INTO posts (user_id, building, room, description, image_url)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![new.user_id, new.building, new.room, new.description, image_url],
            )?;
            let post_id = conn.last_insert_rowid();

            link_new_tags(conn, post_id, &new.allergens)?;

            Ok(PostRecord {
                post: PostRow {
                    id: post_id,
                    user_id: new.user_id,
                    building: new.building.clone(),
                    room: new.room.clone(),
                    description: new.description.clone(),
                    image_url,
                },
                owner,
                allergens: vec![new.allergens],
            })
        })?;

        info!("Created post {} for user {}", record.post.id, record.owner.id);
        Ok(record)
    }

    pub fn get_post(&self, id: i64) -> Result<PostRecord> {
        self.with_conn(|conn| query_post_record(conn, id)?.ok_or(DbError::PostNotFound(id)))
    }

    pub fn list_posts(&self) -> Result<Vec<PostRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {POST_COLUMNS}, u.id, u.name
                 FROM posts p
                 JOIN users u ON p.user_id = u.id
                 ORDER BY p.id"
            ))?;

            let rows = stmt
                .query_map([], |row| Ok((post_from_row(row)?, owner_from_row(row)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let ids: Vec<i64> = rows.iter().map(|(post, _)| post.id).collect();
            let mut tags = query_tags_for_posts(conn, &ids)?;

            Ok(rows
                .into_iter()
                .map(|(post, owner)| PostRecord {
                    allergens: tags.remove(&post.id).unwrap_or_default(),
                    post,
                    owner,
                })
                .collect())
        })
    }

    /// Overwrite a post's text fields and replace its first tag link with a
    /// newly created tag set. The unlinked tag set is deleted unless another
    /// link still points at it.
    pub fn update_post(
        &self,
        id: i64,
        new: &NewPost,
        mapping: UpdateMapping,
    ) -> Result<PostRecord> {
        let record = self.with_tx(|conn| {
            if query_post_row(conn, id)?.is_none() {
                return Err(DbError::PostNotFound(id));
            }

            let room = match mapping {
                UpdateMapping::Legacy => &new.description,
                UpdateMapping::Direct => &new.room,
            };
            conn.execute(
                "UPDATE posts SET building = ?1, room = ?2, description = ?3 WHERE id = ?4",
                params![new.building, room, new.description, id],
            )?;

            let first_link: Option<(i64, i64)> = conn
                .query_row(
                    "SELECT rowid, allergen_id FROM association
                     WHERE post_id = ?1 ORDER BY rowid LIMIT 1",
                    [id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            if let Some((rowid, allergen_id)) = first_link {
                conn.execute("DELETE FROM association WHERE rowid = ?1", [rowid])?;
                conn.execute(
                    "DELETE FROM allergens WHERE id = ?1
                     AND NOT EXISTS (SELECT 1 FROM association WHERE allergen_id = ?1)",
                    [allergen_id],
                )?;
            }

            link_new_tags(conn, id, &new.allergens)?;

            query_post_record(conn, id)?.ok_or(DbError::PostNotFound(id))
        })?;

        info!("Updated post {}", id);
        Ok(record)
    }

    /// Delete a post and its tag links, returning the record as it was.
    pub fn delete_post(&self, id: i64) -> Result<PostRecord> {
        let record = self.with_tx(|conn| {
            let record = query_post_record(conn, id)?.ok_or(DbError::PostNotFound(id))?;
            conn.execute("DELETE FROM association WHERE post_id = ?1", [id])?;
            conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            Ok(record)
        })?;

        info!("Deleted post {}", id);
        Ok(record)
    }
}

fn link_new_tags(conn: &Connection, post_id: i64, tags: &AllergenTags) -> Result<i64> {
    conn.execute(
        &format!(
            "INSERT INTO allergens ({ALLERGEN_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ),
        params![
            tags.vegan,
            tags.vegetarian,
            tags.gluten_free,
            tags.dairy_free,
            tags.nut_free,
            tags.fish_free,
            tags.shell_free,
            tags.wheat_free,
            tags.soy_free,
        ],
    )?;
    let allergen_id = conn.last_insert_rowid();

    conn.execute(
        "INSERT INTO association (post_id, allergen_id) VALUES (?1, ?2)",
        params![post_id, allergen_id],
    )?;
    Ok(allergen_id)
}

/// Read the nine flag columns starting at column `start`.
pub(crate) fn tags_from_row(row: &Row<'_>, start: usize) -> rusqlite::Result<AllergenTags> {
    Ok(AllergenTags {
        vegan: row.get(start)?,
        vegetarian: row.get(start + 1)?,
        gluten_free: row.get(start + 2)?,
        dairy_free: row.get(start + 3)?,
        nut_free: row.get(start + 4)?,
        fish_free: row.get(start + 5)?,
        shell_free: row.get(start + 6)?,
        wheat_free: row.get(start + 7)?,
        soy_free: row.get(start + 8)?,
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    post_at(row, 0)
}

/// Read the post columns starting at column `start`.
fn post_at(row: &Row<'_>, start: usize) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(start)?,
        user_id: row.get(start + 1)?,
        building: row.get(start + 2)?,
        room: row.get(start + 3)?,
        description: row.get(start + 4)?,
        image_url: row.get(start + 5)?,
    })
}

fn owner_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(6)?,
        name: row.get(7)?,
    })
}

fn query_post_row(conn: &Connection, id: i64) -> Result<Option<PostRow>> {
    conn.query_row(
        &format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = ?1"),
        [id],
        post_from_row,
    )
    .optional()
}

fn query_post_record(conn: &Connection, id: i64) -> Result<Option<PostRecord>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {POST_COLUMNS}, u.id, u.name
                 FROM posts p
                 JOIN users u ON p.user_id = u.id
                 WHERE p.id = ?1"
            ),
            [id],
            |row| Ok((post_from_row(row)?, owner_from_row(row)?)),
        )
        .optional()?;

    let Some((post, owner)) = row else {
        return Ok(None);
    };

    let allergens = query_tags_for_posts(conn, &[id])?
        .remove(&id)
        .unwrap_or_default();

    Ok(Some(PostRecord {
        post,
        owner,
        allergens,
    }))
}

/// Posts selected by `tail` (joins, filter, ordering), each paired with the
/// value of the `key` expression and carrying its tag sets. One query for the
/// posts and one for all of their tags, however many keys are involved.
pub(crate) fn query_keyed_posts<P: Params>(
    conn: &Connection,
    key: &str,
    tail: &str,
    params: P,
) -> Result<Vec<(i64, TaggedPost)>> {
    let mut stmt = conn.prepare(&format!("SELECT {key}, {POST_COLUMNS} FROM posts p {tail}"))?;
    let rows = stmt
        .query_map(params, |row| Ok((row.get::<_, i64>(0)?, post_at(row, 1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut ids: Vec<i64> = rows.iter().map(|(_, p)| p.id).collect();
    ids.sort_unstable();
    ids.dedup();
    let tags = query_tags_for_posts(conn, &ids)?;

    // A post can sit under several keys, so tags are cloned, not moved.
    Ok(rows
        .into_iter()
        .map(|(key, post)| {
            let allergens = tags.get(&post.id).cloned().unwrap_or_default();
            (key, TaggedPost { post, allergens })
        })
        .collect())
}

/// `?1, ?2, ... ?n` for an `IN (...)` list.
pub(crate) fn placeholders(n: usize) -> String {
    (1..=n)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Batch-fetch tag sets for a set of post IDs, keyed by post, in link order.
pub(crate) fn query_tags_for_posts(
    conn: &Connection,
    post_ids: &[i64],
) -> Result<HashMap<i64, Vec<AllergenTags>>> {
    let mut out: HashMap<i64, Vec<AllergenTags>> = HashMap::new();
    if post_ids.is_empty() {
        return Ok(out);
    }

    let sql = format!(
        "SELECT a.post_id, {}
         FROM association a
         JOIN allergens t ON a.allergen_id = t.id
         WHERE a.post_id IN ({})
         ORDER BY a.rowid",
        ALLERGEN_COLUMNS
            .split(", ")
            .map(|c| format!("t.{}", c))
            .collect::<Vec<_>>()
            .join(", "),
        placeholders(post_ids.len())
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(post_ids), |row| {
        Ok((row.get::<_, i64>(0)?, tags_from_row(row, 1)?))
    })?;

    for row in rows {
        let (post_id, tags) = row?;
        out.entry(post_id).or_default().push(tags);
    }
    Ok(out)
}
