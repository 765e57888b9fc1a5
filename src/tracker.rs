use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

use crate::chart;
use crate::database::{self, Database, Show, ShowSummary, SyncEvent};
use crate::error::{TrackerError, TrackerResult};
use crate::export;
use crate::metadata::TvdbClient;
use crate::stats::{self, ChartPoint, Progress};

/// Watch tracking operations over the database and TheTVDB
pub struct Tracker {
    db: Arc<Database>,
    tvdb: TvdbClient,
}

impl Tracker {
    pub fn new(db: Arc<Database>, tvdb: TvdbClient) -> Self {
        Self { db, tvdb }
    }

    /// Run a database call on the blocking pool
    async fn with_db<T, F>(&self, f: F) -> TrackerResult<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        let result = tokio::task::spawn_blocking(move || f(&db))
            .await
            .context("database task panicked")?;
        Ok(result?)
    }

    /// Record watch events; returns the number of episodes not seen before
    pub fn sync(&self, events: &[SyncEvent]) -> TrackerResult<usize> {
        if let Some(event) = database::first_unstorable(events) {
            return Err(TrackerError::InvalidEvent(format!(
                "timestamp {} of {}/{} is outside years 0000-9999",
                event.timestamp, event.folder_name, event.file_name
            )));
        }

        let added = self.db.sync_episodes(events)?;
        info!("Sync: {} events, {} episodes added", events.len(), added);
        Ok(added)
    }

    pub fn progress(&self) -> TrackerResult<Progress> {
        let counts = self.db.show_counts()?;
        Ok(Progress::from_counts(&counts))
    }

    pub fn chart_series(&self) -> TrackerResult<Vec<ChartPoint>> {
        let daily = self.db.daily_counts()?;
        Ok(stats::cumulative_series(stats::anchor_date(), &daily))
    }

    pub fn chart_png(&self) -> TrackerResult<Vec<u8>> {
        let series = self.chart_series()?;
        Ok(chart::render_chart(&series)?)
    }

    pub fn export_csv(&self) -> TrackerResult<String> {
        let rows = self.db.episode_rows()?;
        Ok(export::to_csv_string(&rows)?)
    }

    pub fn shows(&self) -> TrackerResult<Vec<ShowSummary>> {
        Ok(self.db.shows()?)
    }

    /// Look up `tvdb_id` on TheTVDB and store its name and image on the show.
    ///
    /// Nothing is written unless both the login and the series lookup succeed.
    pub async fn attach_metadata(&self, show_id: i64, tvdb_id: i64) -> TrackerResult<Show> {
        if self.with_db(move |db| db.show(show_id)).await?.is_none() {
            return Err(TrackerError::ShowNotFound(show_id));
        }

        let token = self.tvdb.login().await.map_err(|e| {
            warn!("TVDB login failed: {:#}", e);
            TrackerError::Upstream(format!("login failed: {}", e))
        })?;

        let series = self.tvdb.series(&token, tvdb_id).await.map_err(|e| {
            warn!("TVDB series {} lookup failed: {:#}", tvdb_id, e);
            TrackerError::Upstream(format!("series lookup failed: {}", e))
        })?;

        let updated = self
            .with_db(move |db| {
                db.update_show_metadata(
                    show_id,
                    tvdb_id,
                    series.name.as_deref(),
                    series.image.as_deref(),
                )
            })
            .await?;
        if !updated {
            return Err(TrackerError::ShowNotFound(show_id));
        }

        info!("Attached TVDB {} to show {}", tvdb_id, show_id);
        self.with_db(move |db| db.show(show_id))
            .await?
            .ok_or(TrackerError::ShowNotFound(show_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn tracker_with_db() -> (Tracker, Arc<Database>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        // nothing listens on port 9, and no key is set anyway
        let tvdb = TvdbClient::new("http://127.0.0.1:9", None, None).unwrap();
        (Tracker::new(db.clone(), tvdb), db)
    }

    fn tracker() -> Tracker {
        tracker_with_db().0
    }

    fn event(folder: &str, file: &str, ts: &str) -> SyncEvent {
        SyncEvent {
            folder_name: folder.to_string(),
            file_name: file.to_string(),
            timestamp: NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").unwrap(),
        }
    }

    #[test]
    fn test_progress_after_sync() {
        let tracker = tracker();
        tracker
            .sync(&[
                event("a", "f1", "2023-05-10 10:00:00"),
                event("a", "f2", "2023-05-10 11:00:00"),
                event("b", "f1", "2023-05-12 10:00:00"),
            ])
            .unwrap();

        let progress = tracker.progress().unwrap();
        assert_eq!(progress.total_episodes_watched, 3);
        assert_eq!(progress.total_hours_watched, 1);
        assert_eq!(progress.shows[0].name, "a");
        assert_eq!(progress.shows[0].episodes_watched, 2);
    }

    #[test]
    fn test_chart_series_matches_daily_buckets() {
        let tracker = tracker();
        tracker
            .sync(&[
                event("a", "f1", "2023-05-10 10:00:00"),
                event("a", "f2", "2023-05-10 11:00:00"),
                event("b", "f1", "2023-05-12 10:00:00"),
            ])
            .unwrap();

        let totals: Vec<_> = tracker
            .chart_series()
            .unwrap()
            .iter()
            .map(|p| (p.date.to_string(), p.total))
            .collect();
        assert_eq!(
            totals,
            vec![
                ("2023-05-07".to_string(), 0),
                ("2023-05-10".to_string(), 2),
                ("2023-05-12".to_string(), 3),
            ]
        );
    }

    #[tokio::test]
    async fn test_attach_metadata_unknown_show() {
        let tracker = tracker();
        let err = tracker.attach_metadata(42, 81189).await.unwrap_err();
        assert!(matches!(err, TrackerError::ShowNotFound(42)));
    }

    #[tokio::test]
    async fn test_attach_metadata_login_failure_leaves_show() {
        let (tracker, db) = tracker_with_db();
        tracker
            .sync(&[event("a", "f1", "2023-05-10 10:00:00")])
            .unwrap();
        let before = db.show(1).unwrap().unwrap();

        let err = tracker.attach_metadata(1, 81189).await.unwrap_err();
        assert!(matches!(err, TrackerError::Upstream(_)));
        assert_eq!(db.show(1).unwrap().unwrap(), before);
    }

    #[test]
    fn test_sync_rejects_unstorable_year_as_invalid() {
        let (tracker, db) = tracker_with_db();
        let mut far_future = event("a", "f2", "2023-05-10 10:00:00");
        far_future.timestamp = chrono::NaiveDate::from_ymd_opt(10000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        let err = tracker
            .sync(&[event("a", "f1", "2023-05-10 10:00:00"), far_future])
            .unwrap_err();
        assert!(matches!(err, TrackerError::InvalidEvent(_)));
        assert_eq!(db.episode_count().unwrap(), 0);
        assert_eq!(tracker.chart_series().unwrap().len(), 1);
    }
}
