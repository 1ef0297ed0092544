//! Matching plays against the streaming catalog.

use async_trait::async_trait;
use rspotify::model::TrackId;
use thiserror::Error;

use crate::models::{PlayRecord, TrackMatch};
use crate::pacer::Pacer;

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("catalog search failed: {0}")]
    Search(#[from] rspotify::ClientError),
}

/// Outbound track search, page-limited.
#[async_trait]
pub trait TrackSearch: Send {
    async fn search_tracks(
        &mut self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<TrackMatch>, ResolutionError>;
}

/// Picks the winning candidate for a play, if any.
pub trait MatchStrategy: Send + Sync {
    /// How many candidates to request per search.
    fn candidate_limit(&self) -> u32 {
        5
    }

    fn choose<'a>(&self, record: &PlayRecord, candidates: &'a [TrackMatch]) -> Option<&'a TrackMatch>;
}

/// The station feed carries no catalog hints, so the best match is
/// whatever the search ranks first.
pub struct FirstResult;

impl MatchStrategy for FirstResult {
    fn choose<'a>(&self, _record: &PlayRecord, candidates: &'a [TrackMatch]) -> Option<&'a TrackMatch> {
        candidates.first()
    }
}

/// Resolves plays against the catalog, one paced search per play.
pub struct CatalogResolver<M, P> {
    strategy: M,
    pacer: P,
}

impl<M: MatchStrategy, P: Pacer> CatalogResolver<M, P> {
    pub fn new(strategy: M, pacer: P) -> Self {
        Self { strategy, pacer }
    }

    pub async fn resolve<S: TrackSearch>(
        &mut self,
        session: &mut S,
        record: &PlayRecord,
    ) -> Result<Option<TrackId<'static>>, ResolutionError> {
        self.pacer.pace().await;
        let query = search_query(record);
        let candidates = session
            .search_tracks(&query, self.strategy.candidate_limit())
            .await?;
        Ok(self
            .strategy
            .choose(record, &candidates)
            .map(|found| found.id.clone()))
    }
}

// '&' in artist credits is replaced with a space before searching.
fn search_query(record: &PlayRecord) -> String {
    format!("track:{} artist:{}", record.title, record.artist.replace('&', " "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubSearch {
        candidates: Vec<TrackMatch>,
        fail: bool,
        queries: Vec<String>,
    }

    impl StubSearch {
        fn with_candidates(candidates: Vec<TrackMatch>) -> Self {
            Self {
                candidates,
                fail: false,
                queries: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl TrackSearch for StubSearch {
        async fn search_tracks(
            &mut self,
            query: &str,
            _limit: u32,
        ) -> Result<Vec<TrackMatch>, ResolutionError> {
            self.queries.push(query.to_string());
            if self.fail {
                return Err(ResolutionError::Search(client_error()));
            }
            Ok(self.candidates.clone())
        }
    }

    struct CountingPacer(Arc<AtomicUsize>);

    #[async_trait]
    impl Pacer for CountingPacer {
        async fn pace(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn client_error() -> rspotify::ClientError {
        serde_json::from_str::<serde_json::Value>("not json")
            .unwrap_err()
            .into()
    }

    fn candidate(id: &'static str, title: &str) -> TrackMatch {
        TrackMatch {
            id: TrackId::from_id(id).unwrap(),
            title: title.to_string(),
            artists: "Someone".to_string(),
        }
    }

    fn play(title: &str, artist: &str) -> PlayRecord {
        PlayRecord {
            title: title.to_string(),
            artist: artist.to_string(),
            time_of_day: "14:05".to_string(),
            release_year: None,
            played_at: Utc.with_ymd_and_hms(2024, 6, 7, 21, 5, 0).unwrap(),
            track_id: None,
        }
    }

    fn resolver() -> CatalogResolver<FirstResult, CountingPacer> {
        CatalogResolver::new(FirstResult, CountingPacer(Arc::default()))
    }

    #[tokio::test]
    async fn no_candidates_is_not_an_error() {
        let mut search = StubSearch::with_candidates(vec![]);
        let found = resolver().resolve(&mut search, &play("Song A", "X")).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn first_candidate_wins() {
        let mut search = StubSearch::with_candidates(vec![
            candidate("4uLU6hMCjMI75M1A2tKUQC", "right"),
            candidate("1301WleyT98MSxVHPZCA6M", "wrong"),
        ]);
        let found = resolver().resolve(&mut search, &play("Song A", "X")).await.unwrap();
        assert_eq!(found, Some(TrackId::from_id("4uLU6hMCjMI75M1A2tKUQC").unwrap()));
    }

    #[tokio::test]
    async fn query_flattens_ampersands() {
        let mut search = StubSearch::with_candidates(vec![]);
        resolver().resolve(&mut search, &play("Song A", "X & Y")).await.unwrap();
        assert_eq!(search.queries, ["track:Song A artist:X   Y"]);
    }

    #[tokio::test]
    async fn search_errors_propagate() {
        let mut search = StubSearch::with_candidates(vec![]);
        search.fail = true;
        let result = resolver().resolve(&mut search, &play("Song A", "X")).await;
        assert!(matches!(result, Err(ResolutionError::Search(_))));
    }

    #[tokio::test]
    async fn every_resolve_is_paced() {
        let paces = Arc::new(AtomicUsize::new(0));
        let mut search = StubSearch::with_candidates(vec![]);
        let mut resolver = CatalogResolver::new(FirstResult, CountingPacer(paces.clone()));
        for _ in 0..3 {
            resolver.resolve(&mut search, &play("Song A", "X")).await.unwrap();
        }
        assert_eq!(paces.load(Ordering::SeqCst), 3);
    }
}
