use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id      INTEGER PRIMARY KEY AUTOINCREMENT,
                name    TEXT NOT NULL
            );

            CREATE TABLE posts (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                building    TEXT NOT NULL,
                room        TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                image_url   TEXT
            );

            CREATE INDEX idx_posts_user ON posts(user_id);

            -- Declared for schema compatibility; posts do not reference it yet.
            CREATE TABLE locations (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL,
                latitude    INTEGER NOT NULL,
                longitude   INTEGER NOT NULL
            );

            CREATE TABLE assets (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                base_url    TEXT,
                salt        TEXT NOT NULL,
                extension   TEXT NOT NULL,
                width       INTEGER NOT NULL,
                height      INTEGER NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE allergens (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                vegan       INTEGER NOT NULL DEFAULT 0,
                vegetarian  INTEGER NOT NULL DEFAULT 0,
                gluten_free INTEGER NOT NULL DEFAULT 0,
                dairy_free  INTEGER NOT NULL DEFAULT 0,
                nut_free    INTEGER NOT NULL DEFAULT 0,
                fish_free   INTEGER NOT NULL DEFAULT 0,
                shell_free  INTEGER NOT NULL DEFAULT 0,
                wheat_free  INTEGER NOT NULL DEFAULT 0,
                soy_free    INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE association (
                post_id     INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                allergen_id INTEGER NOT NULL REFERENCES allergens(id)
            );

            CREATE INDEX idx_association_post ON association(post_id);
            CREATE INDEX idx_association_allergen ON association(allergen_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
