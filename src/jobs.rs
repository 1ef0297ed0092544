//! The two scheduled invocations: hourly ingest and daily compilation.

use anyhow::{Context, Result};
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::feed::{self, FeedSource};
use crate::pacer::Pacer;
use crate::playlist::{BuildMode, PlaylistApi, PlaylistBuilder};
use crate::resolver::{CatalogResolver, MatchStrategy, TrackSearch};
use crate::store::PlayStore;

/// What the hourly run did, for logs and assertions.
#[derive(Debug, Default, Clone, Copy)]
pub struct IngestSummary {
    pub fetched: usize,
    pub resolved: usize,
    pub saved: usize,
    pub save_failures: usize,
}

/// Hourly job: polls the feed and stores every play it can normalize,
/// attaching catalog track ids where the search finds one. Save
/// failures are counted and logged without stopping the batch.
pub async fn ingest<F, S, M, P>(
    feed: &F,
    session: &mut S,
    resolver: &mut CatalogResolver<M, P>,
    store: &PlayStore,
    zone: Tz,
    now: DateTime<Utc>,
) -> Result<IngestSummary>
where
    F: FeedSource,
    S: TrackSearch,
    M: MatchStrategy,
    P: Pacer,
{
    let entries = feed.fetch().await.context("station feed fetch failed")?;
    match entries.first() {
        Some(latest) => tracing::info!(
            "feed returned {} entries, most recent at {}",
            entries.len(),
            latest.time
        ),
        None => tracing::info!("feed returned no entries"),
    }

    let mut records = Vec::with_capacity(entries.len());
    for entry in &entries {
        records.push(feed::normalize(entry, now, zone).context("station feed entry failed to normalize")?);
    }

    let mut summary = IngestSummary {
        fetched: records.len(),
        ..Default::default()
    };
    for mut record in records {
        match resolver.resolve(session, &record).await {
            Ok(Some(id)) => {
                record.track_id = Some(id);
                summary.resolved += 1;
            }
            Ok(None) => {
                tracing::debug!("no catalog match for {:?} by {:?}", record.title, record.artist);
            }
            Err(err) => {
                tracing::warn!(
                    "resolution failed for {:?} by {:?}: {}",
                    record.title,
                    record.artist,
                    err
                );
            }
        }
        match store.save(&record).await {
            Ok(key) => {
                summary.saved += 1;
                tracing::debug!("saved play {} at {}", key, record.played_at);
            }
            Err(err) => {
                summary.save_failures += 1;
                tracing::warn!("failed to save play at {}: {}", record.played_at, err);
            }
        }
    }

    if summary.save_failures > 0 {
        tracing::warn!(
            "{} of {} plays failed to save",
            summary.save_failures,
            summary.fetched
        );
    }
    tracing::info!(
        "ingest done: {} plays, {} resolved, {} saved",
        summary.fetched,
        summary.resolved,
        summary.saved
    );
    Ok(summary)
}

/// Daily job: compiles yesterday's stored plays into the dated and the
/// rolling playlist, resolving any play that still lacks a track id.
/// The two builds are independent; either failing is logged without
/// failing the other.
pub async fn compile_playlists<S, M, P, Q>(
    session: &mut S,
    resolver: &mut CatalogResolver<M, P>,
    builder: &mut PlaylistBuilder<Q>,
    store: &PlayStore,
    zone: Tz,
    now: DateTime<Utc>,
) -> Result<()>
where
    S: TrackSearch + PlaylistApi,
    M: MatchStrategy,
    P: Pacer,
    Q: Pacer,
{
    let (start, end, day) = prior_day_bounds(now, zone);
    let records = store
        .query_range(start, end)
        .await
        .context("play query for the prior day failed")?;
    if records.is_empty() {
        tracing::info!("no plays stored for {}", day);
        return Ok(());
    }
    tracing::info!("got {} plays from the store for {}", records.len(), day);

    let mut track_ids = Vec::new();
    for record in &records {
        let id = match &record.track_id {
            Some(id) => Some(id.clone()),
            None => match resolver.resolve(session, record).await {
                Ok(found) => found,
                Err(err) => {
                    tracing::warn!(
                        "resolution failed for {:?} by {:?}: {}",
                        record.title,
                        record.artist,
                        err
                    );
                    None
                }
            },
        };
        match id {
            Some(id) => track_ids.push(id),
            None => tracing::debug!(
                "leaving {:?} by {:?} out of the playlists",
                record.title,
                record.artist
            ),
        }
    }
    tracing::info!("{} of {} plays carry a track id", track_ids.len(), records.len());

    match builder.build(&track_ids, session, BuildMode::Dated(day)).await {
        Ok(playlist) => tracing::info!("dated playlist {:?} is ready", playlist.title),
        Err(err) => tracing::error!("dated playlist build failed: {}", err),
    }
    match builder.build(&track_ids, session, BuildMode::Rolling).await {
        Ok(playlist) => tracing::info!("rolling playlist {:?} is ready", playlist.title),
        Err(err) => tracing::error!("rolling playlist build failed: {}", err),
    }

    Ok(())
}

/// The station-local day before `now`, as an inclusive UTC range plus
/// the day itself for titling.
fn prior_day_bounds(now: DateTime<Utc>, zone: Tz) -> (DateTime<Utc>, DateTime<Utc>, NaiveDate) {
    let day = now.with_timezone(&zone).date_naive() - Days::new(1);
    let start = feed::resolve_local(zone, day.and_time(NaiveTime::MIN));
    let end_time = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).expect("valid wall clock time");
    let end = feed::resolve_local(zone, day.and_time(end_time));
    (start.with_timezone(&Utc), end.with_timezone(&Utc), day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::Los_Angeles;

    #[test]
    fn prior_day_runs_midnight_to_midnight_station_time() {
        // 03:00 on June 8 in Los Angeles.
        let now = Utc.with_ymd_and_hms(2024, 6, 8, 10, 0, 0).unwrap();
        let (start, end, day) = prior_day_bounds(now, Los_Angeles);

        assert_eq!(day, NaiveDate::from_ymd_opt(2024, 6, 7).unwrap());
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 6, 7, 7, 0, 0).unwrap());
        assert_eq!(
            end,
            Utc.with_ymd_and_hms(2024, 6, 8, 6, 59, 59).unwrap()
                + chrono::Duration::milliseconds(999)
        );
    }

    #[test]
    fn prior_day_crossing_a_month_boundary() {
        // 03:00 on March 1 in Los Angeles points back at February 29.
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap();
        let (_, _, day) = prior_day_bounds(now, Los_Angeles);
        assert_eq!(day, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }
}
