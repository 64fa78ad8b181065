use serde::{Deserialize, Serialize};

/// Coarse availability status of the subject.
///
/// Anything the upstream sends that is not one of the four known labels
/// deserializes to `Offline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Presence {
    #[serde(rename = "online")]
    Online,
    #[serde(rename = "idle")]
    Idle,
    #[serde(rename = "dnd")]
    DoNotDisturb,
    #[default]
    #[serde(rename = "offline")]
    #[serde(other)]
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: String,
    pub username: String,
}

/// Currently playing track. Only ever built complete, see [`Playback::from_parts`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Playback {
    pub title: String,
    pub artists: Vec<String>,
    pub track_id: String,
    pub artwork_url: String,
}

impl Playback {
    /// Upstream joins artist names with `"; "`.
    pub const ARTIST_SEPARATOR: &'static str = "; ";

    pub fn from_parts(
        title: Option<String>,
        artist: Option<String>,
        track_id: Option<String>,
        artwork_url: Option<String>,
    ) -> Option<Self> {
        let non_empty = |s: Option<String>| s.filter(|s| !s.trim().is_empty());

        let title = non_empty(title)?;
        let artist = non_empty(artist)?;
        let track_id = non_empty(track_id)?;
        let artwork_url = non_empty(artwork_url)?;

        let artists = artist
            .split(Self::ARTIST_SEPARATOR)
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_owned)
            .collect::<Vec<_>>();
        if artists.is_empty() {
            return None;
        }

        Some(Self {
            title,
            artists,
            track_id,
            artwork_url,
        })
    }
}

/// One reading of presence and playback. Never mutated after construction;
/// newer readings replace it whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub presence: Presence,
    pub identity: Identity,
    pub playback: Option<Playback>,
    pub location: String,
}
