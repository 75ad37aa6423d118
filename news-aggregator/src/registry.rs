use crate::db::Database;
use crate::types::{Result, Source, SourceType};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Configured sources, persisted in the `sources` table.
///
/// Every operation is a single SQLite statement, so a reader sees the list
/// either before or after a mutation, never in between.
pub struct SourceRegistry {
    db: SqlitePool,
}

impl SourceRegistry {
    pub fn new(db: &Database) -> Self {
        Self {
            db: db.pool().clone(),
        }
    }

    /// All sources in the order they were added.
    pub async fn list(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query(
            "SELECT id, name, url, source_type, enabled FROM sources ORDER BY position",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.iter().filter_map(source_from_row).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Source>> {
        let row = sqlx::query("SELECT id, name, url, source_type, enabled FROM sources WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.db)
            .await?;

        Ok(row.as_ref().and_then(source_from_row))
    }

    /// Register a new, enabled source. The URL is not contacted here.
    pub async fn add(&self, name: String, url: String, source_type: SourceType) -> Result<Source> {
        let source = Source::new(name, url, source_type);

        sqlx::query("INSERT INTO sources (id, name, url, source_type, enabled) VALUES (?, ?, ?, ?, ?)")
            .bind(source.id.to_string())
            .bind(&source.name)
            .bind(&source.url)
            .bind(source.source_type.as_str())
            .bind(source.enabled)
            .execute(&self.db)
            .await?;

        info!("Added source '{}' ({}) with ID: {}", source.name, source.url, source.id);
        Ok(source)
    }

    /// Delete a source. Returns whether anything was removed; an unknown id is
    /// not an error. Articles already ingested from it are kept.
    pub async fn remove(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sources WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.db)
            .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!("Removed source {}", id);
        } else {
            debug!("Source {} not present, nothing to remove", id);
        }
        Ok(removed)
    }

    pub async fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<Option<Source>> {
        let result = sqlx::query("UPDATE sources SET enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(id.to_string())
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        info!("Source {} {}", id, if enabled { "enabled" } else { "disabled" });
        self.get(id).await
    }
}

fn source_from_row(row: &SqliteRow) -> Option<Source> {
    match decode_source(row) {
        Ok(source) => Some(source),
        Err(e) => {
            warn!("Skipping unreadable source row: {}", e);
            None
        }
    }
}

fn decode_source(row: &SqliteRow) -> std::result::Result<Source, String> {
    let id: String = row.try_get("id").map_err(|e| e.to_string())?;
    let source_type: String = row.try_get("source_type").map_err(|e| e.to_string())?;
    Ok(Source {
        id: Uuid::parse_str(&id).map_err(|e| format!("bad id '{}': {}", id, e))?,
        name: row.try_get("name").map_err(|e| e.to_string())?,
        url: row.try_get("url").map_err(|e| e.to_string())?,
        source_type: source_type.parse::<SourceType>().map_err(|e| e.to_string())?,
        enabled: row.try_get("enabled").map_err(|e| e.to_string())?,
    })
}
