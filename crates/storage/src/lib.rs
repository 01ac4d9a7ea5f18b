use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::{
    domain::{AssetSource, MapId, SongId},
    protocol::{MapPatch, NewMap, NewSong},
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredMap {
    pub map_id: MapId,
    pub name: String,
    pub group_name: Option<String>,
    pub source: Option<AssetSource>,
    pub zoom: f64,
    pub rotation: i32,
    pub pan_x: f64,
    pub pan_y: f64,
    pub song_id: Option<SongId>,
}

#[derive(Debug, Clone)]
pub struct StoredSong {
    pub song_id: SongId,
    pub name: String,
    pub group_name: Option<String>,
    pub file_path: String,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_map(&self, map: &NewMap) -> Result<MapId> {
        let source_json = encode_source(&map.source)?;
        let rec = sqlx::query(
            "INSERT INTO maps (name, group_name, source, song_id) VALUES (?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&map.name)
        .bind(&map.group_name)
        .bind(source_json)
        .bind(map.song_id.map(|id| id.0))
        .fetch_one(&self.pool)
        .await?;
        Ok(MapId(rec.get::<i64, _>(0)))
    }

    pub async fn list_maps(&self) -> Result<Vec<StoredMap>> {
        let rows = sqlx::query(
            "SELECT id, name, group_name, source, zoom, rotation, pan_x, pan_y, song_id
             FROM maps ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(map_from_row).collect()
    }

    pub async fn get_map(&self, map_id: MapId) -> Result<Option<StoredMap>> {
        let row = sqlx::query(
            "SELECT id, name, group_name, source, zoom, rotation, pan_x, pan_y, song_id
             FROM maps WHERE id = ?",
        )
        .bind(map_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(map_from_row).transpose()
    }

    pub async fn update_map(&self, map_id: MapId, patch: &MapPatch) -> Result<bool> {
        let Some(existing) = self.get_map(map_id).await? else {
            return Ok(false);
        };

        let name = patch.name.clone().unwrap_or(existing.name);
        let group_name = patch.group_name.clone().or(existing.group_name);
        let source = patch.source.clone().or(existing.source);
        let song_id = patch.song_id.or(existing.song_id);

        sqlx::query("UPDATE maps SET name = ?, group_name = ?, source = ?, song_id = ? WHERE id = ?")
            .bind(name)
            .bind(group_name)
            .bind(encode_source(&source)?)
            .bind(song_id.map(|id| id.0))
            .bind(map_id.0)
            .execute(&self.pool)
            .await?;
        Ok(true)
    }

    /// Persists settled presenter geometry onto the catalog record, so
    /// re-selecting the map later restores its framing.
    pub async fn update_map_transform(
        &self,
        map_id: MapId,
        zoom: f64,
        rotation: i32,
        pan_x: f64,
        pan_y: f64,
    ) -> Result<bool> {
        let result =
            sqlx::query("UPDATE maps SET zoom = ?, rotation = ?, pan_x = ?, pan_y = ? WHERE id = ?")
                .bind(zoom)
                .bind(rotation)
                .bind(pan_x)
                .bind(pan_y)
                .bind(map_id.0)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_map(&self, map_id: MapId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM maps WHERE id = ?")
            .bind(map_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn create_song(&self, song: &NewSong) -> Result<SongId> {
        let rec = sqlx::query(
            "INSERT INTO songs (name, group_name, file_path) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(&song.name)
        .bind(&song.group_name)
        .bind(&song.file_path)
        .fetch_one(&self.pool)
        .await?;
        Ok(SongId(rec.get::<i64, _>(0)))
    }

    pub async fn list_songs(&self) -> Result<Vec<StoredSong>> {
        let rows = sqlx::query("SELECT id, name, group_name, file_path FROM songs ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| StoredSong {
                song_id: SongId(row.get::<i64, _>("id")),
                name: row.get::<String, _>("name"),
                group_name: row.get::<Option<String>, _>("group_name"),
                file_path: row.get::<String, _>("file_path"),
            })
            .collect())
    }

    pub async fn get_song(&self, song_id: SongId) -> Result<Option<StoredSong>> {
        let row = sqlx::query("SELECT id, name, group_name, file_path FROM songs WHERE id = ?")
            .bind(song_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| StoredSong {
            song_id: SongId(row.get::<i64, _>("id")),
            name: row.get::<String, _>("name"),
            group_name: row.get::<Option<String>, _>("group_name"),
            file_path: row.get::<String, _>("file_path"),
        }))
    }

    /// Maps keep a soft reference to their song; deleting the song clears it.
    pub async fn delete_song(&self, song_id: SongId) -> Result<bool> {
        sqlx::query("UPDATE maps SET song_id = NULL WHERE song_id = ?")
            .bind(song_id.0)
            .execute(&self.pool)
            .await?;
        let result = sqlx::query("DELETE FROM songs WHERE id = ?")
            .bind(song_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Overwrites the single presentation-state record wholesale. Concurrent
    /// saves are last-write-wins; there is no merge.
    pub async fn save_presentation_state(&self, snapshot_json: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO presentation_state (id, snapshot, updated_at)
             VALUES (1, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(id) DO UPDATE SET
                 snapshot = excluded.snapshot,
                 updated_at = excluded.updated_at",
        )
        .bind(snapshot_json)
        .execute(&self.pool)
        .await
        .context("failed to persist presentation state")?;
        Ok(())
    }

    pub async fn load_presentation_state(&self) -> Result<Option<String>> {
        let row = sqlx::query("SELECT snapshot FROM presentation_state WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| row.get::<String, _>("snapshot")))
    }
}

fn map_from_row(row: sqlx::sqlite::SqliteRow) -> Result<StoredMap> {
    let source = match row.get::<Option<String>, _>("source") {
        Some(json) => Some(
            serde_json::from_str::<AssetSource>(&json)
                .context("stored map has unparseable source column")?,
        ),
        None => None,
    };
    Ok(StoredMap {
        map_id: MapId(row.get::<i64, _>("id")),
        name: row.get::<String, _>("name"),
        group_name: row.get::<Option<String>, _>("group_name"),
        source,
        zoom: row.get::<f64, _>("zoom"),
        rotation: row.get::<i64, _>("rotation") as i32,
        pan_x: row.get::<f64, _>("pan_x"),
        pan_y: row.get::<f64, _>("pan_y"),
        song_id: row.get::<Option<i64>, _>("song_id").map(SongId),
    })
}

fn encode_source(source: &Option<AssetSource>) -> Result<Option<String>> {
    source
        .as_ref()
        .map(|s| serde_json::to_string(s).context("failed to encode asset source"))
        .transpose()
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;
    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
