//! HTTP client for the asset catalog. The engine only consumes resolved
//! values: image sources and audio cues come from here, storage details
//! stay on the server side.

use anyhow::Result;
use reqwest::Client;
use shared::{
    domain::{AssetSource, MapId, SongId},
    protocol::{MapSummary, SongSummary, TransformUpdate},
};

pub struct CatalogClient {
    http: Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    pub async fn list_maps(&self) -> Result<Vec<MapSummary>> {
        let maps = self
            .http
            .get(format!("{}/maps", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(maps)
    }

    pub async fn get_map(&self, map_id: MapId) -> Result<MapSummary> {
        let map = self
            .http
            .get(format!("{}/maps/{}", self.base_url, map_id.0))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(map)
    }

    pub async fn resolve_source(&self, map_id: MapId) -> Result<Option<AssetSource>> {
        Ok(self.get_map(map_id).await?.source)
    }

    pub async fn audio_cue_for(&self, map_id: MapId) -> Result<Option<SongId>> {
        Ok(self.get_map(map_id).await?.song_id)
    }

    /// Writes settled presenter geometry back onto the catalog record, so a
    /// later selection of the same map restores its framing.
    pub async fn update_map_transform(
        &self,
        map_id: MapId,
        update: &TransformUpdate,
    ) -> Result<()> {
        self.http
            .put(format!("{}/maps/{}/transform", self.base_url, map_id.0))
            .json(update)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn list_songs(&self) -> Result<Vec<SongSummary>> {
        let songs = self
            .http
            .get(format!("{}/songs", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(songs)
    }
}
