use chrono::{DateTime, Utc};
use rspotify::model::{PlaylistId, TrackId};
use serde::{Deserialize, Serialize};

/// One spin from the station's feed, normalized for storage.
///
/// `played_at` is the UTC instant of the spin; `time_of_day` keeps the
/// wall-clock string exactly as the feed sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayRecord {
    pub title: String,
    pub artist: String,
    pub time_of_day: String,
    pub release_year: Option<i32>,
    pub played_at: DateTime<Utc>,
    pub track_id: Option<TrackId<'static>>,
}

/// A candidate the catalog search returned for a play.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMatch {
    pub id: TrackId<'static>,
    pub title: String,
    pub artists: String,
}

/// A playlist the daily compilation produced or refilled.
#[derive(Debug, Clone)]
pub struct Playlist {
    pub id: PlaylistId<'static>,
    pub title: String,
    pub public: bool,
    pub tracks: Vec<TrackId<'static>>,
}
