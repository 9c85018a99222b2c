//! SQLite reader for the embedding store file
//!
//! Expected layout: one row per card in `table` with columns
//! `nid INTEGER`, `content TEXT`, `embedding BLOB` (packed little-endian f32).
//! The file is opened read-only; this crate never writes it.

use std::path::Path;

use rusqlite::{Connection, OpenFlags};

use super::{bytes_to_vec_f32, Card};
use crate::error::{Error, Result};

/// Table read when none is configured
pub const DEFAULT_TABLE: &str = "cards";

const REQUIRED_COLUMNS: [&str; 3] = ["nid", "content", "embedding"];

/// Read every card from the store file, eagerly
pub(super) fn read_cards(path: &Path, table: &str) -> Result<Vec<Card>> {
    if !path.is_file() {
        return Err(Error::StoreNotFound {
            path: path.to_path_buf(),
        });
    }
    if !is_valid_identifier(table) {
        return Err(Error::store_format(
            path,
            format!("invalid table name '{}'", table),
        ));
    }

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| Error::store_format(path, format!("cannot open as SQLite: {}", e)))?;

    check_columns(&conn, path, table)?;

    let sql = format!(
        "SELECT nid, content, embedding FROM {} ORDER BY nid",
        table
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| Error::store_format(path, e.to_string()))?;

    let rows = stmt
        .query_map([], |row| {
            let nid: i64 = row.get(0)?;
            let content: Option<String> = row.get(1)?;
            let embedding: Option<Vec<u8>> = row.get(2)?;
            Ok((nid, content, embedding))
        })
        .map_err(|e| Error::store_format(path, e.to_string()))?;

    let mut cards = Vec::new();
    for row in rows {
        let (nid, content, blob) = row.map_err(|e| Error::store_format(path, e.to_string()))?;

        let content = content
            .ok_or_else(|| Error::store_format(path, format!("card {} has no content", nid)))?;
        let blob = blob
            .ok_or_else(|| Error::store_format(path, format!("card {} has no embedding", nid)))?;
        let embedding = bytes_to_vec_f32(&blob).ok_or_else(|| {
            Error::store_format(
                path,
                format!(
                    "card {} embedding blob is {} bytes, not a whole number of f32 values",
                    nid,
                    blob.len()
                ),
            )
        })?;

        cards.push(Card {
            id: nid,
            content,
            embedding,
        });
    }

    Ok(cards)
}

/// Verify the table exists and carries the required columns
fn check_columns(conn: &Connection, path: &Path, table: &str) -> Result<()> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", table))
        .map_err(|e| Error::store_format(path, format!("cannot inspect schema: {}", e)))?;

    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .and_then(|rows| rows.collect::<std::result::Result<Vec<_>, _>>())
        .map_err(|e| Error::store_format(path, format!("cannot inspect schema: {}", e)))?;

    if columns.is_empty() {
        return Err(Error::store_format(
            path,
            format!("table '{}' does not exist", table),
        ));
    }

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|required| !columns.iter().any(|c| c.eq_ignore_ascii_case(required)))
        .collect();

    if !missing.is_empty() {
        return Err(Error::store_format(
            path,
            format!(
                "table '{}' is missing column(s): {}",
                table,
                missing.join(", ")
            ),
        ));
    }

    Ok(())
}

fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
