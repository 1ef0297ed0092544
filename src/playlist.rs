//! Compiling a day's plays into playlists.

use async_trait::async_trait;
use chrono::NaiveDate;
use rspotify::model::{PlaylistId, TrackId};
use thiserror::Error;

use crate::models::Playlist;
use crate::pacer::Pacer;

/// Most tracks the playlist endpoints accept per call.
pub const PLAYLIST_PAGE_SIZE: usize = 50;

#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("Playlist '{0}' not found")]
    NotFound(String),
    #[error("playlist api error: {0}")]
    Api(#[from] rspotify::ClientError),
}

/// Playlist operations the build needs from the streaming service.
#[async_trait]
pub trait PlaylistApi: Send {
    async fn create_playlist(
        &mut self,
        title: &str,
        public: bool,
    ) -> Result<PlaylistId<'static>, PlaylistError>;

    async fn find_playlist_by_name(
        &mut self,
        name: &str,
    ) -> Result<Option<PlaylistId<'static>>, PlaylistError>;

    async fn replace_tracks(
        &mut self,
        playlist: &PlaylistId<'static>,
        tracks: &[TrackId<'static>],
    ) -> Result<(), PlaylistError>;

    async fn append_tracks(
        &mut self,
        playlist: &PlaylistId<'static>,
        tracks: &[TrackId<'static>],
    ) -> Result<(), PlaylistError>;
}

/// Which playlist a compiled day lands in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BuildMode {
    /// Create a fresh playlist titled after the given day.
    Dated(NaiveDate),
    /// Refill the long-running playlist found by its configured name.
    Rolling,
}

/// Fills playlists page by page. Page zero replaces whatever the
/// playlist held; later pages append. Every page call waits on the
/// pacer first.
pub struct PlaylistBuilder<P> {
    station_label: String,
    rolling_name: String,
    public: bool,
    pacer: P,
}

impl<P: Pacer> PlaylistBuilder<P> {
    pub fn new(
        station_label: impl Into<String>,
        rolling_name: impl Into<String>,
        public: bool,
        pacer: P,
    ) -> Self {
        Self {
            station_label: station_label.into(),
            rolling_name: rolling_name.into(),
            public,
            pacer,
        }
    }

    pub async fn build<A: PlaylistApi>(
        &mut self,
        tracks: &[TrackId<'static>],
        api: &mut A,
        mode: BuildMode,
    ) -> Result<Playlist, PlaylistError> {
        let (id, title) = match mode {
            BuildMode::Dated(day) => {
                let title = format!("{}: {}", self.station_label, day.format("%B %-d, %Y"));
                let id = api.create_playlist(&title, self.public).await?;
                tracing::info!("created playlist {:?}", title);
                (id, title)
            }
            BuildMode::Rolling => {
                let id = api
                    .find_playlist_by_name(&self.rolling_name)
                    .await?
                    .ok_or_else(|| PlaylistError::NotFound(self.rolling_name.clone()))?;
                (id, self.rolling_name.clone())
            }
        };

        for (index, page) in tracks.chunks(PLAYLIST_PAGE_SIZE).enumerate() {
            self.pacer.pace().await;
            if index == 0 {
                api.replace_tracks(&id, page).await?;
            } else {
                api.append_tracks(&id, page).await?;
            }
        }
        tracing::info!("filled playlist {:?} with {} tracks", title, tracks.len());

        Ok(Playlist {
            id,
            title,
            public: self.public,
            tracks: tracks.to_vec(),
        })
    }
}
