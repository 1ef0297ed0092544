//! Environment-backed configuration. `main` loads the `.env` file
//! before any of this runs.

use std::env;
use std::path::PathBuf;

use chrono_tz::Tz;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Application identity for the streaming service. This is all the
/// interactive `login` flow needs; the jobs additionally carry the
/// refresh token it mints.
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl SpotifyConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            client_id: require("SPOTIFY_CLIENT_ID")?,
            client_secret: require("SPOTIFY_CLIENT_SECRET")?,
            redirect_uri: var_or("SPOTIFY_REDIRECT_URI", "http://localhost:8888/callback"),
        })
    }
}

/// Everything the scheduled jobs read from the environment.
pub struct Config {
    pub feed_url: String,
    pub station_label: String,
    pub station_zone: Tz,
    pub data_dir: PathBuf,
    pub play_id_secret: String,
    pub rolling_playlist: String,
    pub playlists_public: bool,
    pub spotify: SpotifyConfig,
    pub spotify_refresh_token: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let zone_name = var_or("STATION_TIMEZONE", "America/Los_Angeles");
        let station_zone = zone_name.parse::<Tz>().map_err(|_| ConfigError::Invalid {
            name: "STATION_TIMEZONE",
            value: zone_name.clone(),
        })?;

        let public_raw = var_or("PLAYLIST_PUBLIC", "false");
        let playlists_public = public_raw.parse::<bool>().map_err(|_| ConfigError::Invalid {
            name: "PLAYLIST_PUBLIC",
            value: public_raw.clone(),
        })?;

        Ok(Self {
            feed_url: var_or("FEED_URL", "http://kzsu.rocks/songs"),
            station_label: var_or("STATION_NAME", "KZSU Zootopia"),
            station_zone,
            data_dir: PathBuf::from(var_or("DATA_DIR", "./plays")),
            play_id_secret: require("PLAY_ID_SECRET")?,
            rolling_playlist: require("ROLLING_PLAYLIST_NAME")?,
            playlists_public,
            spotify: SpotifyConfig::from_env()?,
            spotify_refresh_token: require("SPOTIFY_REFRESH_TOKEN")?,
        })
    }
}
