//! Pure display derivations: nothing here does I/O or reads the clock.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Europe::London;
use serde::Serialize;

use crate::snapshot::{Presence, StatusSnapshot};

pub const DEFAULT_PLAYLIST_URL: &str =
    "https://open.spotify.com/playlist/2Ith94Euza0LXuwEMpFbNS?si=0cbe4a822d7c4170";
pub const DEFAULT_PLAYLIST_ARTWORK_URL: &str =
    "https://i.scdn.co/image/ab67706c0000da847b219f6303deafc7138840dd";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTone {
    Green,
    Orange,
    Red,
    Blurple,
}

impl BadgeTone {
    pub fn css_class(self) -> &'static str {
        match self {
            BadgeTone::Green => "badge-green",
            BadgeTone::Orange => "badge-orange",
            BadgeTone::Red => "badge-red",
            BadgeTone::Blurple => "badge-blurple",
        }
    }
}

impl Presence {
    pub fn badge(self) -> BadgeTone {
        match self {
            Presence::Online => BadgeTone::Green,
            Presence::Idle => BadgeTone::Orange,
            Presence::DoNotDisturb => BadgeTone::Red,
            Presence::Offline => BadgeTone::Blurple,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Presence::Online => "online",
            Presence::Idle => "idle",
            Presence::DoNotDisturb => "dnd",
            Presence::Offline => "offline",
        }
    }
}

/// What the music card shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ListeningCard {
    Track {
        text: String,
        url: String,
        artwork_url: String,
    },
    Playlist {
        url: &'static str,
        artwork_url: &'static str,
    },
}

pub fn listening_card(snapshot: &StatusSnapshot) -> ListeningCard {
    match &snapshot.playback {
        Some(playback) => ListeningCard::Track {
            text: format!(
                "Listening to {} by {}",
                playback.title,
                format_list(&playback.artists)
            ),
            url: format!("https://open.spotify.com/track/{}", playback.track_id),
            artwork_url: playback.artwork_url.clone(),
        },
        None => ListeningCard::Playlist {
            url: DEFAULT_PLAYLIST_URL,
            artwork_url: DEFAULT_PLAYLIST_ARTWORK_URL,
        },
    }
}

/// English conjunction list: "A", "A and B", "A, B, and C".
pub fn format_list<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [first, second] => format!("{} and {}", first.as_ref(), second.as_ref()),
        [init @ .., last] => {
            let head = init.iter().map(|s| s.as_ref()).collect::<Vec<&str>>().join(", ");
            format!("{}, and {}", head, last.as_ref())
        }
    }
}

/// Wall-clock time in the UK as `HH:MM`, following BST/GMT.
pub fn uk_time(now: DateTime<Utc>) -> String {
    now.with_timezone(&London).format("%H:%M").to_string()
}

/// Calendar date in the UK at `now`.
pub fn uk_date(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&London).date_naive()
}

pub fn date_of_birth() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 29).unwrap_or(NaiveDate::MIN)
}

/// Full years between `dob` and `today`.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> u32 {
    today.years_since(dob).unwrap_or(0)
}

/// The birthday as observed in `year`; 29 February falls on 1 March in
/// non-leap years.
fn birthday_in(dob: NaiveDate, year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, dob.month(), dob.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, 3, 1))
}

/// Whole days until the next birthday, 0 on the day itself.
pub fn days_until_birthday(dob: NaiveDate, today: NaiveDate) -> i64 {
    let next = match birthday_in(dob, today.year()) {
        Some(this_year) if this_year >= today => Some(this_year),
        _ => birthday_in(dob, today.year() + 1),
    };

    next.map(|d| (d - today).num_days()).unwrap_or(0)
}
