use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::page::{render_card, RenderedCard};
use crate::present::{listening_card, uk_time, BadgeTone, ListeningCard};
use crate::snapshot::StatusSnapshot;

/// Frames sent to a live view over its WebSocket.
#[derive(Serialize)]
#[serde(tag = "t")]
pub enum LiveEvent<'a> {
    /// First frame, carrying the snapshot the view was seeded with.
    Ready(LiveStatus<'a>),
    StatusUpdate(LiveStatus<'a>),
}

/// A snapshot together with what the page derives from it, so the browser
/// only has to swap text, classes and the listening card's markup.
#[derive(Serialize)]
pub struct LiveStatus<'a> {
    snapshot: &'a StatusSnapshot,
    badge: BadgeTone,
    badge_class: &'static str,
    presence_label: &'static str,
    listening: ListeningCard,
    card: RenderedCard,
    uk_time: String,
}

impl<'a> LiveStatus<'a> {
    pub fn new(snapshot: &'a StatusSnapshot, now: DateTime<Utc>) -> Self {
        let badge = snapshot.presence.badge();
        let listening = listening_card(snapshot);
        Self {
            snapshot,
            badge,
            badge_class: badge.css_class(),
            presence_label: snapshot.presence.label(),
            card: render_card(&listening),
            listening,
            uk_time: uk_time(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{Playback, Presence};
    use crate::test_support::snapshot;
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn ready_frame_shape() {
        let s = snapshot(Presence::Idle, "charlie");
        let frame = serde_json::to_value(LiveEvent::Ready(LiveStatus::new(&s, noon()))).unwrap();

        assert_eq!(frame["t"], "Ready");
        assert_eq!(frame["snapshot"]["presence"], "idle");
        assert_eq!(frame["snapshot"]["identity"]["username"], "charlie");
        assert_eq!(frame["badge_class"], "badge-orange");
        assert_eq!(frame["listening"]["kind"], "playlist");
        assert_eq!(frame["uk_time"], "13:00");
    }

    #[test]
    fn update_frame_tag() {
        let s = snapshot(Presence::Online, "charlie");
        let frame = serde_json::to_value(LiveEvent::StatusUpdate(LiveStatus::new(&s, noon()))).unwrap();
        assert_eq!(frame["t"], "StatusUpdate");
        assert_eq!(frame["badge"], "green");
    }

    #[test]
    fn track_then_playlist_swaps_the_whole_card() {
        let mut playing = snapshot(Presence::Online, "charlie");
        playing.playback = Playback::from_parts(
            Some("Song".into()),
            Some("A; B".into()),
            Some("abc".into()),
            Some("https://i.scdn.co/image/x".into()),
        );
        let stopped = snapshot(Presence::Online, "charlie");

        let first =
            serde_json::to_value(LiveEvent::StatusUpdate(LiveStatus::new(&playing, noon())))
                .unwrap();
        let second =
            serde_json::to_value(LiveEvent::StatusUpdate(LiveStatus::new(&stopped, noon())))
                .unwrap();

        let html = first["card"]["inner_html"].as_str().unwrap();
        assert!(html.contains(r#"<span class="pulse"></span>"#));
        assert!(html.contains("Listening to Song by A and B"));
        assert_eq!(first["card"]["href"], "https://open.spotify.com/track/abc");
        assert_eq!(
            first["card"]["style"],
            "background-image:url('https://i.scdn.co/image/x')"
        );

        let html = second["card"]["inner_html"].as_str().unwrap();
        assert!(!html.contains("Listening to"));
        assert!(!html.contains("pulse"));
        assert!(html.contains("<b>playlist:</b> Choons"));
        assert!(html.contains("<small>"));
        assert_eq!(second["card"]["href"], second["listening"]["url"]);

        // and back again
        let third =
            serde_json::to_value(LiveEvent::StatusUpdate(LiveStatus::new(&playing, noon())))
                .unwrap();
        assert!(!third["card"]["inner_html"].as_str().unwrap().contains("<small>"));
    }
}
