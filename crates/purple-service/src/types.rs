//! Types exchanged with the Purple Music backend.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }
    };
}

string_id! {
    /// Identifies a playlist.
    PlaylistId
}

string_id! {
    /// Identifies a signed-in user.
    UserId
}

/// Public engagement numbers of a playlist.
///
/// Playlists that the backend refuses to report on count as having no engagement at all, which is
/// also what [`Default`] returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistStats {
    #[serde(alias = "likeCount", alias = "likes_count")]
    pub likes: u64,
    #[serde(alias = "viewCount", alias = "views_count")]
    pub views: u64,
}

/// An artist as known to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistProfile {
    pub id: String,
    pub name: String,
    /// The YouTube channel that hosts the artist's music.
    #[serde(default, alias = "channelId", alias = "youtube_channel_id")]
    pub channel_id: Option<String>,
    #[serde(default, alias = "thumbnailUrl")]
    pub thumbnail_url: Option<String>,
    /// ISO 3166-1 alpha-2 code of the artist's country of origin.
    #[serde(default)]
    pub country: Option<String>,
}

/// The body of a playlist view tracking request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackViewRequest {
    pub user_id: UserId,
    pub playlist_id: PlaylistId,
}

/// What happened to a playlist view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewOutcome {
    /// The view was sent to the backend.
    Recorded,
    /// The view was already recorded recently and has been dropped.
    Skipped,
}
