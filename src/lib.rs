//! Captures a radio station's playlog and compiles it into streaming
//! playlists: an hourly feed ingest and a daily playlist build.

pub mod config;
pub mod feed;
pub mod jobs;
pub mod models;
pub mod pacer;
pub mod playlist;
pub mod resolver;
pub mod spotify;
pub mod spotify_auth;
pub mod store;

pub use config::Config;
pub use models::{PlayRecord, Playlist, TrackMatch};
pub use spotify_auth::SpotifySession;
pub use store::PlayStore;
