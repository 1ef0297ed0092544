//! rspotify-backed implementations of the catalog capabilities.

use std::collections::HashMap;

use async_trait::async_trait;
use rspotify::clients::BaseClient;
use rspotify::model::{PlayableId, PlaylistId, SearchResult, SearchType, TrackId};
use rspotify::prelude::OAuthClient;
use url::Url;

use crate::models::TrackMatch;
use crate::playlist::{PlaylistApi, PlaylistError};
use crate::resolver::{ResolutionError, TrackSearch};
use crate::spotify_auth::SpotifySession;

#[async_trait]
impl TrackSearch for SpotifySession {
    async fn search_tracks(
        &mut self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<TrackMatch>, ResolutionError> {
        self.ensure_fresh().await?;
        let result = self
            .api()
            .search(query, SearchType::Track, None, None, Some(limit), None)
            .await?;
        let page = match result {
            SearchResult::Tracks(page) => page,
            _ => return Ok(Vec::new()),
        };
        Ok(page
            .items
            .into_iter()
            .filter_map(|track| {
                let id = track.id?;
                Some(TrackMatch {
                    id,
                    title: track.name,
                    artists: track
                        .artists
                        .iter()
                        .map(|artist| artist.name.clone())
                        .collect::<Vec<_>>()
                        .join(", "),
                })
            })
            .collect())
    }
}

#[async_trait]
impl PlaylistApi for SpotifySession {
    async fn create_playlist(
        &mut self,
        title: &str,
        public: bool,
    ) -> Result<PlaylistId<'static>, PlaylistError> {
        self.ensure_fresh().await?;
        let user = self.api().me().await?;
        let playlist = self
            .api()
            .user_playlist_create(user.id, title, Some(public), None, None)
            .await?;
        Ok(playlist.id)
    }

    async fn find_playlist_by_name(
        &mut self,
        name: &str,
    ) -> Result<Option<PlaylistId<'static>>, PlaylistError> {
        self.ensure_fresh().await?;
        let limit = 50;
        let mut offset = 0;
        loop {
            let page = self
                .api()
                .current_user_playlists_manual(Some(limit), Some(offset))
                .await?;

            for playlist in page.items {
                if playlist.name == name {
                    return Ok(Some(playlist.id));
                }
            }

            match page.next {
                Some(next_url) => {
                    let query_pairs = match Url::parse(&next_url) {
                        Ok(url) => url
                            .query_pairs()
                            .into_owned()
                            .collect::<HashMap<String, String>>(),
                        Err(_) => break,
                    };
                    match query_pairs.get("offset").and_then(|raw| raw.parse::<u32>().ok()) {
                        Some(next_offset) => offset = next_offset,
                        None => break,
                    }
                }
                None => break,
            }
        }
        Ok(None)
    }

    async fn replace_tracks(
        &mut self,
        playlist: &PlaylistId<'static>,
        tracks: &[TrackId<'static>],
    ) -> Result<(), PlaylistError> {
        self.ensure_fresh().await?;
        let playable_ids: Vec<PlayableId> =
            tracks.iter().map(|id| PlayableId::from(id.clone())).collect();
        self.api()
            .playlist_replace_items(playlist.clone(), playable_ids)
            .await?;
        Ok(())
    }

    async fn append_tracks(
        &mut self,
        playlist: &PlaylistId<'static>,
        tracks: &[TrackId<'static>],
    ) -> Result<(), PlaylistError> {
        self.ensure_fresh().await?;
        let playable_ids: Vec<PlayableId> =
            tracks.iter().map(|id| PlayableId::from(id.clone())).collect();
        self.api()
            .playlist_add_items(playlist.clone(), playable_ids, None)
            .await?;
        Ok(())
    }
}
