use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a bound reference is handed to the media service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Track,
    Album,
    Playlist,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Album => "album",
            Self::Playlist => "playlist",
        }
    }

    /// True for kinds played as a context (album or playlist) rather than a
    /// single item.
    pub fn is_context(&self) -> bool {
        matches!(self, Self::Album | Self::Playlist)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "track" => Ok(Self::Track),
            "album" => Ok(Self::Album),
            "playlist" => Ok(Self::Playlist),
            other => Err(other.to_string()),
        }
    }
}

/// One tag bound to one playable reference. There is exactly one per tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub token_id: String,
    /// Canonical `spotify:<kind>:<id>` reference.
    pub media_ref: String,
    pub kind: MediaKind,
    pub updated_at: DateTime<Utc>,
}

/// Result of writing a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

impl UpsertOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Created => "New mapping created successfully!",
            Self::Updated => "Mapping updated successfully!",
        }
    }
}
