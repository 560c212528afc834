use rusqlite::{Connection, params};

use crate::error::OptionalExt;
use crate::models::AssetRow;
use crate::{Database, Result};

/// Metadata of an image that has already been written to an asset store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAsset {
    pub base_url: Option<String>,
    pub salt: String,
    pub extension: String,
    pub width: u32,
    pub height: u32,
    pub created_at: String,
    /// Public URL the post will reference.
    pub url: String,
}

impl Database {
    pub fn get_asset_by_salt(&self, salt: &str) -> Result<Option<AssetRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, base_url, salt, extension, width, height, created_at
                 FROM assets WHERE salt = ?1",
                [salt],
                |row| {
                    Ok(AssetRow {
                        id: row.get(0)?,
                        base_url: row.get(1)?,
                        salt: row.get(2)?,
                        extension: row.get(3)?,
                        width: row.get(4)?,
                        height: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                },
            )
            .optional()
        })
    }
}

pub(crate) fn insert_asset(conn: &Connection, asset: &NewAsset) -> Result<i64> {
    conn.execute(
        "INSERT INTO assets (base_url, salt, extension, width, height, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            asset.base_url,
            asset.salt,
            asset.extension,
            asset.width,
            asset.height,
            asset.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}
