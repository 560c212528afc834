use std::collections::HashMap;

use rusqlite::{Connection, params};
use tracing::info;

use crate::error::OptionalExt;
use crate::models::{TaggedPost, UserRecord, UserRow};
use crate::posts::query_keyed_posts;
use crate::{Database, DbError, Result};

pub const DEFAULT_USER_NAME: &str = "anonymous";

impl Database {
    // -- Users --

    pub fn create_user(&self, name: Option<&str>) -> Result<UserRecord> {
        let name = name.unwrap_or(DEFAULT_USER_NAME);
        let user = self.with_tx(|conn| {
            conn.execute("INSERT INTO users (name) VALUES (?1)", [name])?;
            Ok(UserRow {
                id: conn.last_insert_rowid(),
                name: name.to_string(),
            })
        })?;

        info!("Created user {}", user.id);
        Ok(UserRecord {
            user,
            posts: vec![],
        })
    }

    pub fn get_user(&self, id: i64) -> Result<UserRecord> {
        self.with_conn(|conn| query_user_record(conn, id)?.ok_or(DbError::UserNotFound(id)))
    }

    pub fn list_users(&self) -> Result<Vec<UserRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name FROM users ORDER BY id")?;
            let users = stmt
                .query_map([], |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut owned: HashMap<i64, Vec<TaggedPost>> = HashMap::new();
            let posts = query_keyed_posts(conn, "p.user_id", "ORDER BY p.id", params![])?;
            for (user_id, post) in posts {
                owned.entry(user_id).or_default().push(post);
            }

            Ok(users
                .into_iter()
                .map(|user| UserRecord {
                    posts: owned.remove(&user.id).unwrap_or_default(),
                    user,
                })
                .collect())
        })
    }

    pub fn update_user(&self, id: i64, name: &str) -> Result<UserRecord> {
        let record = self.with_tx(|conn| {
            let changed = conn.execute(
                "UPDATE users SET name = ?1 WHERE id = ?2",
                params![name, id],
            )?;
            if changed == 0 {
                return Err(DbError::UserNotFound(id));
            }
            query_user_record(conn, id)?.ok_or(DbError::UserNotFound(id))
        })?;

        info!("Updated user {}", id);
        Ok(record)
    }

    /// Delete a user together with all of their posts and those posts' tag
    /// links. Returns the user as it was before deletion.
    pub fn delete_user(&self, id: i64) -> Result<UserRecord> {
        let record = self.with_tx(|conn| {
            let record = query_user_record(conn, id)?.ok_or(DbError::UserNotFound(id))?;

            conn.execute(
                "DELETE FROM association
                 WHERE post_id IN (SELECT id FROM posts WHERE user_id = ?1)",
                [id],
            )?;
            conn.execute("DELETE FROM posts WHERE user_id = ?1", [id])?;
            conn.execute("DELETE FROM users WHERE id = ?1", [id])?;

            Ok(record)
        })?;

        info!("Deleted user {} and {} posts", id, record.posts.len());
        Ok(record)
    }
}

pub(crate) fn query_user(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    conn.query_row("SELECT id, name FROM users WHERE id = ?1", [id], |row| {
        Ok(UserRow {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })
    .optional()
}

fn query_user_record(conn: &Connection, id: i64) -> Result<Option<UserRecord>> {
    let Some(user) = query_user(conn, id)? else {
        return Ok(None);
    };
    let posts = query_keyed_posts(conn, "p.user_id", "WHERE p.user_id = ?1 ORDER BY p.id", [id])?
        .into_iter()
        .map(|(_, post)| post)
        .collect();
    Ok(Some(UserRecord { user, posts }))
}

#[cfg(test)]
mod tests {
    use freefood_types::AllergenTags;
    use freefood_types::api::NewPost;

    use super::*;

    fn post_for(user_id: i64, room: &str) -> NewPost {
        NewPost {
            user_id,
            building: "Low".into(),
            room: room.into(),
            description: "leftover sandwiches".into(),
            allergens: AllergenTags {
                nut_free: true,
                ..Default::default()
            },
        }
    }

    fn count(db: &Database, table: &str) -> i64 {
        db.with_conn(|conn| {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?)
        })
        .unwrap()
    }

    #[test]
    fn name_defaults_to_anonymous() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user(None).unwrap();
        assert_eq!(user.user.name, DEFAULT_USER_NAME);
        assert!(user.posts.is_empty());
    }

    #[test]
    fn ids_increase_monotonically() {
        let db = Database::open_in_memory().unwrap();
        let a = db.create_user(Some("Alice")).unwrap().user.id;
        let b = db.create_user(Some("Bob")).unwrap().user.id;
        assert_eq!(a, 1);
        assert!(b > a);
        assert_eq!(db.list_users().unwrap().len(), 2);
    }

    #[test]
    fn get_includes_owned_posts() {
        let db = Database::open_in_memory().unwrap();
        let uid = db.create_user(Some("Alice")).unwrap().user.id;
        db.create_post(&post_for(uid, "101"), None).unwrap();

        let user = db.get_user(uid).unwrap();
        assert_eq!(user.posts.len(), 1);
        assert_eq!(user.posts[0].post.room, "101");
        assert!(user.posts[0].allergens[0].nut_free);

        assert!(matches!(db.get_user(uid + 1), Err(DbError::UserNotFound(_))));
    }

    #[test]
    fn list_groups_posts_by_owner() {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_user(Some("Alice")).unwrap().user.id;
        let bob = db.create_user(Some("Bob")).unwrap().user.id;
        let carol = db.create_user(Some("Carol")).unwrap().user.id;

        db.create_post(&post_for(alice, "101"), None).unwrap();
        db.create_post(&post_for(bob, "201"), None).unwrap();
        db.create_post(&post_for(alice, "102"), None).unwrap();

        let users = db.list_users().unwrap();
        let rooms: Vec<(i64, Vec<&str>)> = users
            .iter()
            .map(|u| {
                let rooms = u.posts.iter().map(|p| p.post.room.as_str()).collect();
                (u.user.id, rooms)
            })
            .collect();
        assert_eq!(
            rooms,
            vec![(alice, vec!["101", "102"]), (bob, vec!["201"]), (carol, vec![])]
        );
        assert!(users[0].posts.iter().all(|p| p.allergens.len() == 1));
    }

    #[test]
    fn update_overwrites_name() {
        let db = Database::open_in_memory().unwrap();
        let uid = db.create_user(Some("Alice")).unwrap().user.id;

        let updated = db.update_user(uid, "Alicia").unwrap();
        assert_eq!(updated.user.name, "Alicia");
        assert_eq!(db.get_user(uid).unwrap().user.name, "Alicia");
        assert!(matches!(db.update_user(99, "x"), Err(DbError::UserNotFound(99))));
    }

    #[test]
    fn delete_cascades_to_posts_and_links() {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_user(Some("Alice")).unwrap().user.id;
        let bob = db.create_user(Some("Bob")).unwrap().user.id;

        let mut alice_posts = Vec::new();
        for room in ["101", "102", "103"] {
            alice_posts.push(db.create_post(&post_for(alice, room), None).unwrap().post.id);
        }
        let bob_post = db.create_post(&post_for(bob, "201"), None).unwrap().post.id;

        let removed = db.delete_user(alice).unwrap();
        assert_eq!(removed.posts.len(), 3);

        for id in alice_posts {
            assert!(matches!(db.get_post(id), Err(DbError::PostNotFound(_))));
        }
        assert!(db.get_post(bob_post).is_ok());
        assert_eq!(count(&db, "posts"), 1);
        assert_eq!(count(&db, "association"), 1);
        assert!(matches!(db.get_user(alice), Err(DbError::UserNotFound(_))));
    }
}
