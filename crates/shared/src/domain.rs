use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(MapId);
id_newtype!(SongId);

/// Resolved byte source or reference for a map image. Opaque to the sync
/// engine; the catalog supplies it and renderers consume it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum AssetSource {
    Inline { mime: String, data_b64: String },
    File { path: String },
    Url { url: String },
}

impl AssetSource {
    pub fn inline_from_bytes(mime: impl Into<String>, bytes: &[u8]) -> Self {
        Self::Inline {
            mime: mime.into(),
            data_b64: STANDARD.encode(bytes),
        }
    }

    /// Renderable URL for this source: inline payloads become `data:` URLs,
    /// file paths become `file://` URLs.
    pub fn as_render_url(&self) -> String {
        match self {
            Self::Inline { mime, data_b64 } => format!("data:{mime};base64,{data_b64}"),
            Self::File { path } => format!("file://{path}"),
            Self::Url { url } => url.clone(),
        }
    }
}
