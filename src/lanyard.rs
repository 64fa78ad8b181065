//! Client for the Lanyard presence aggregation service.
//!
//! Lanyard is treated as best-effort: transport problems and a bad envelope
//! are errors, but every field inside `data` is read leniently and falls
//! back to a default when missing or mistyped.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use thiserror::Error;
use tracing::debug;

use crate::snapshot::{Identity, Playback, Presence, StatusSnapshot};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream responded with status {0}")]
    Status(u16),

    #[error("upstream reported no data for user {0}")]
    Rejected(String),

    #[error("malformed upstream envelope: {0}")]
    Decode(String),
}

/// Anything able to produce a fresh [`StatusSnapshot`] for a user id.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self, id: &str) -> Result<StatusSnapshot, FetchError>;
}

pub struct LanyardClient {
    client: reqwest::Client,
    base_url: String,
    default_location: String,
}

impl LanyardClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        default_location: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            default_location: default_location.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl StatusSource for LanyardClient {
    async fn fetch(&self, id: &str) -> Result<StatusSnapshot, FetchError> {
        let url = format!("{}/v1/users/{}", self.base_url, id);
        debug!("fetching presence from {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let body = response.bytes().await?;
        parse_envelope(&body, id, &self.default_location)
    }
}

/// Decode a raw `/v1/users/{id}` response body.
pub fn parse_envelope(
    body: &[u8],
    id: &str,
    default_location: &str,
) -> Result<StatusSnapshot, FetchError> {
    let envelope: Envelope =
        serde_json::from_slice(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    if !envelope.success {
        return Err(FetchError::Rejected(id.to_string()));
    }

    let data = envelope
        .data
        .filter(|d| !d.is_null())
        .ok_or_else(|| FetchError::Decode("missing data".to_string()))?;
    let data: LanyardData =
        serde_json::from_value(data).map_err(|e| FetchError::Decode(e.to_string()))?;

    Ok(data.into_snapshot(id, default_location))
}

/// Deserialize a field, substituting its default when the value has the
/// wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct LanyardData {
    #[serde(default, deserialize_with = "lenient")]
    discord_status: Presence,
    #[serde(default, deserialize_with = "lenient")]
    discord_user: LanyardUser,
    #[serde(default, deserialize_with = "lenient")]
    spotify: Option<LanyardSpotify>,
    #[serde(default, deserialize_with = "lenient")]
    kv: LanyardKv,
}

#[derive(Debug, Default, Deserialize)]
struct LanyardUser {
    #[serde(default, deserialize_with = "lenient")]
    username: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LanyardSpotify {
    #[serde(default, deserialize_with = "lenient")]
    song: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    artist: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    track_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    album_art_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LanyardKv {
    #[serde(default, deserialize_with = "lenient")]
    location: Option<String>,
}

impl LanyardData {
    fn into_snapshot(self, id: &str, default_location: &str) -> StatusSnapshot {
        let username = self
            .discord_user
            .username
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| id.to_string());

        let playback = self.spotify.and_then(|s| {
            Playback::from_parts(s.song, s.artist, s.track_id, s.album_art_url)
        });

        let location = self
            .kv
            .location
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| default_location.to_string());

        StatusSnapshot {
            presence: self.discord_status,
            identity: Identity {
                id: id.to_string(),
                username,
            },
            playback,
            location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::{extract::Path, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;

    const ID: &str = "121672207800860677";

    fn parse(body: serde_json::Value) -> Result<StatusSnapshot, FetchError> {
        parse_envelope(body.to_string().as_bytes(), ID, "Canterbury, UK")
    }

    #[test]
    fn full_payload() {
        let snapshot = parse(json!({
            "success": true,
            "data": {
                "discord_status": "dnd",
                "discord_user": { "id": ID, "username": "charlie" },
                "spotify": {
                    "song": "Teardrop",
                    "artist": "Massive Attack; Elizabeth Fraser",
                    "track_id": "67Hna13dNDkZvBpTXRIaOJ",
                    "album_art_url": "https://i.scdn.co/image/xyz"
                },
                "kv": { "location": "London, UK" }
            }
        }))
        .unwrap();

        assert_eq!(snapshot.presence, Presence::DoNotDisturb);
        assert_eq!(snapshot.identity.username, "charlie");
        assert_eq!(snapshot.location, "London, UK");
        let playback = snapshot.playback.unwrap();
        assert_eq!(playback.title, "Teardrop");
        assert_eq!(playback.artists, vec!["Massive Attack", "Elizabeth Fraser"]);
    }

    #[test]
    fn missing_location_uses_default() {
        let snapshot = parse(json!({
            "success": true,
            "data": {
                "discord_status": "online",
                "discord_user": { "username": "charlie" },
                "kv": {}
            }
        }))
        .unwrap();

        assert_eq!(snapshot.identity.id, ID);
        assert_eq!(snapshot.location, "Canterbury, UK");
        assert!(snapshot.playback.is_none());
    }

    #[test]
    fn malformed_fields_fall_back_per_field() {
        let snapshot = parse(json!({
            "success": true,
            "data": {
                "discord_status": 42,
                "discord_user": "not an object",
                "spotify": { "song": "Song", "artist": ["A"], "track_id": "t", "album_art_url": "u" },
                "kv": { "location": 7 }
            }
        }))
        .unwrap();

        assert_eq!(snapshot.presence, Presence::Offline);
        assert_eq!(snapshot.identity.username, ID);
        assert!(snapshot.playback.is_none());
        assert_eq!(snapshot.location, "Canterbury, UK");
    }

    #[test]
    fn spotify_without_artwork_is_not_listening() {
        let snapshot = parse(json!({
            "success": true,
            "data": {
                "spotify": { "song": "Song", "artist": "A", "track_id": "t", "album_art_url": null }
            }
        }))
        .unwrap();
        assert!(snapshot.playback.is_none());
    }

    #[test]
    fn unsuccessful_envelope_is_rejected() {
        let err = parse(json!({ "success": false, "error": { "code": "user_not_monitored" } }))
            .unwrap_err();
        assert!(matches!(err, FetchError::Rejected(id) if id == ID));
    }

    #[test]
    fn garbage_body_is_decode_error() {
        let err = parse_envelope(b"<html>oops</html>", ID, "x").unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));

        let err = parse(json!({ "success": true, "data": null })).unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn trailing_slash_removal() {
        let client =
            LanyardClient::new("https://api.lanyard.rest/", Duration::from_secs(5), "x").unwrap();
        assert_eq!(client.base_url(), "https://api.lanyard.rest");
    }

    #[tokio::test]
    async fn fetches_over_http() {
        let router = Router::new().route(
            "/v1/users/{id}",
            get(|Path(id): Path<String>| async move {
                Json(json!({
                    "success": true,
                    "data": { "discord_status": "idle", "discord_user": { "username": id } }
                }))
            }),
        );
        let base = serve(router).await;

        let client = LanyardClient::new(&base, Duration::from_secs(5), "Canterbury, UK").unwrap();
        let snapshot = client.fetch(ID).await.unwrap();

        assert_eq!(snapshot.presence, Presence::Idle);
        assert_eq!(snapshot.identity.username, ID);
        assert_eq!(snapshot.location, "Canterbury, UK");
    }

    #[tokio::test]
    async fn non_success_status_is_error() {
        let router = Router::new().route(
            "/v1/users/{id}",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let base = serve(router).await;

        let client = LanyardClient::new(&base, Duration::from_secs(5), "x").unwrap();
        let err = client.fetch(ID).await.unwrap_err();
        assert!(matches!(err, FetchError::Status(503)));
    }
}
