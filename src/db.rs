//! Database schema and operations

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::StoreError;
use crate::models::{Recipe, StoredRecipe};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        -- One row per recipe; the whole recipe is kept as a JSON document
        CREATE TABLE IF NOT EXISTS recipes (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            document TEXT NOT NULL,
            updated_at_ms INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_recipes_updated ON recipes(updated_at_ms DESC);
        "#,
    )?;
    Ok(())
}

/// Insert or replace a recipe document.
///
/// REPLACE deletes and re-inserts, so the rowid also grows with every write
/// and breaks ties between writes in the same millisecond.
pub fn upsert_recipe(conn: &Connection, recipe: &Recipe, updated_at: DateTime<Utc>) -> Result<(), StoreError> {
    let document = serde_json::to_string(recipe)?;
    conn.execute(
        "INSERT OR REPLACE INTO recipes (id, name, document, updated_at_ms)
         VALUES (?1, ?2, ?3, ?4)",
        params![&recipe.id, &recipe.name, document, updated_at.timestamp_millis()],
    )?;
    Ok(())
}

/// Delete a recipe, returning whether a row was removed
pub fn delete_recipe(conn: &Connection, id: &str) -> Result<bool, StoreError> {
    let removed = conn.execute("DELETE FROM recipes WHERE id = ?1", [id])?;
    Ok(removed > 0)
}

/// Get a single recipe by id
pub fn get_recipe(conn: &Connection, id: &str) -> Result<Option<StoredRecipe>, StoreError> {
    let row = conn
        .query_row(
            "SELECT document, updated_at_ms FROM recipes WHERE id = ?1",
            [id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()?;

    row.map(|(document, updated_at_ms)| decode_row(&document, updated_at_ms))
        .transpose()
}

/// List all recipes, most recently updated first
pub fn list_recipes(conn: &Connection) -> Result<Vec<StoredRecipe>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT document, updated_at_ms FROM recipes ORDER BY updated_at_ms DESC, rowid DESC",
    )?;

    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;

    let mut results = Vec::new();
    for row in rows {
        let (document, updated_at_ms) = row?;
        results.push(decode_row(&document, updated_at_ms)?);
    }
    Ok(results)
}

fn decode_row(document: &str, updated_at_ms: i64) -> Result<StoredRecipe, StoreError> {
    let recipe: Recipe = serde_json::from_str(document)?;
    let updated_at = Utc
        .timestamp_millis_opt(updated_at_ms)
        .single()
        .unwrap_or_default();
    Ok(StoredRecipe { recipe, updated_at })
}
