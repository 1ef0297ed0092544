//! Local document store for plays, one JSON file per spin.

use std::io;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::models::PlayRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] io::Error),
    #[error("could not encode play document: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("corrupt play document {path:?}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Collection of play documents keyed by a secret-derived digest of the
/// play instant.
pub struct PlayStore {
    root: PathBuf,
    secret: String,
}

impl PlayStore {
    pub fn new(root: impl Into<PathBuf>, secret: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            secret: secret.into(),
        }
    }

    /// Writes one play document, overwriting any document with the same
    /// key. Re-ingesting a spin therefore updates it in place.
    pub async fn save(&self, record: &PlayRecord) -> Result<String, StoreError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let key = doc_key(&self.secret, record.played_at);
        let body = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(self.doc_path(&key), body).await?;
        Ok(key)
    }

    pub async fn get(&self, key: &str) -> Result<Option<PlayRecord>, StoreError> {
        let path = self.doc_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let record =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt { path, source })?;
        Ok(Some(record))
    }

    /// All plays with `start <= played_at <= end`, ascending by instant.
    pub async fn query_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PlayRecord>, StoreError> {
        let mut plays = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            // Nothing ingested yet.
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(plays),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            let record: PlayRecord = serde_json::from_slice(&bytes)
                .map_err(|source| StoreError::Corrupt { path, source })?;
            if record.played_at >= start && record.played_at <= end {
                plays.push(record);
            }
        }
        plays.sort_by_key(|record| record.played_at);
        Ok(plays)
    }

    fn doc_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

/// Document key for a play: HMAC-SHA256 of the millisecond ISO-8601
/// form of the instant, keyed by the deployment secret, base64 with `/`
/// swapped for `-` so the key can double as a file name.
pub fn doc_key(secret: &str, played_at: DateTime<Utc>) -> String {
    let stamp = played_at.to_rfc3339_opts(SecondsFormat::Millis, true);
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("hmac accepts keys of any length");
    mac.update(stamp.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes()).replace('/', "-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rspotify::model::TrackId;

    fn record_at(played_at: DateTime<Utc>, title: &str) -> PlayRecord {
        PlayRecord {
            title: title.to_string(),
            artist: "Some Artist".to_string(),
            time_of_day: "14:05".to_string(),
            release_year: Some(1999),
            played_at,
            track_id: None,
        }
    }

    fn instant(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 7, hour, minute, 0).unwrap()
    }

    #[test]
    fn keys_are_deterministic_and_secret_bound() {
        let at = instant(21, 5);
        assert_eq!(doc_key("s3cret", at), doc_key("s3cret", at));
        assert_ne!(doc_key("s3cret", at), doc_key("other", at));
        assert_ne!(doc_key("s3cret", at), doc_key("s3cret", instant(21, 6)));
    }

    #[test]
    fn keys_are_path_safe() {
        for minute in 0..60 {
            let key = doc_key("s3cret", instant(12, minute));
            assert!(!key.contains('/'), "key {key} contains a path separator");
        }
    }

    #[tokio::test]
    async fn saving_the_same_instant_twice_keeps_one_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlayStore::new(dir.path(), "s3cret");
        let at = instant(21, 5);

        let first_key = store.save(&record_at(at, "First Title")).await.unwrap();
        let second_key = store.save(&record_at(at, "Second Title")).await.unwrap();
        assert_eq!(first_key, second_key);

        let plays = store.query_range(instant(0, 0), instant(23, 59)).await.unwrap();
        assert_eq!(plays.len(), 1);
        assert_eq!(plays[0].title, "Second Title");
    }

    #[tokio::test]
    async fn range_query_is_inclusive_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlayStore::new(dir.path(), "s3cret");
        for (hour, title) in [(14, "later"), (10, "first"), (12, "middle")] {
            store.save(&record_at(instant(hour, 0), title)).await.unwrap();
        }

        let plays = store.query_range(instant(10, 0), instant(14, 0)).await.unwrap();
        let titles: Vec<_> = plays.iter().map(|play| play.title.as_str()).collect();
        assert_eq!(titles, ["first", "middle", "later"]);

        let inner = store.query_range(instant(10, 1), instant(13, 59)).await.unwrap();
        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0].title, "middle");
    }

    #[tokio::test]
    async fn get_round_trips_a_saved_play() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlayStore::new(dir.path(), "s3cret");
        let mut record = record_at(instant(21, 5), "Song A");
        record.track_id = Some(TrackId::from_id("4uLU6hMCjMI75M1A2tKUQC").unwrap());

        let key = store.save(&record).await.unwrap();
        let loaded = store.get(&key).await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_store_queries_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlayStore::new(dir.path().join("never-written"), "s3cret");
        let plays = store.query_range(instant(0, 0), instant(23, 59)).await.unwrap();
        assert!(plays.is_empty());
    }
}
