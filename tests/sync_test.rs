use chrono::{Duration, NaiveDate};
use immersion_tracker::database::{Database, SyncEvent};
use immersion_tracker::stats::{hours_watched, Progress};
use std::collections::HashSet;

fn generated_events() -> Vec<SyncEvent> {
    let start = NaiveDate::from_ymd_opt(2023, 5, 8)
        .unwrap()
        .and_hms_opt(19, 0, 0)
        .unwrap();

    // overlapping folders and files so that some pairs repeat
    (0..60)
        .map(|i| SyncEvent {
            folder_name: format!("show-{}", i % 4),
            file_name: format!("ep{:02}.mkv", (i * 7) % 9),
            timestamp: start + Duration::hours(i),
        })
        .collect()
}

#[test]
fn test_row_counts_match_distinct_keys() {
    let db = Database::open_in_memory().unwrap();
    let events = generated_events();

    let folders: HashSet<_> = events.iter().map(|e| e.folder_name.clone()).collect();
    let pairs: HashSet<_> = events
        .iter()
        .map(|e| (e.folder_name.clone(), e.file_name.clone()))
        .collect();

    let added = db.sync_episodes(&events).unwrap();
    assert_eq!(added, pairs.len());
    assert_eq!(db.show_count().unwrap(), folders.len() as i64);
    assert_eq!(db.episode_count().unwrap(), pairs.len() as i64);
}

#[test]
fn test_split_batches_match_single_batch() {
    let events = generated_events();

    let single = Database::open_in_memory().unwrap();
    single.sync_episodes(&events).unwrap();

    let split = Database::open_in_memory().unwrap();
    let mut added = 0;
    for chunk in events.chunks(7) {
        added += split.sync_episodes(chunk).unwrap();
    }

    assert_eq!(added as i64, single.episode_count().unwrap());
    assert_eq!(split.episode_count().unwrap(), single.episode_count().unwrap());
    assert_eq!(split.show_count().unwrap(), single.show_count().unwrap());
}

#[test]
fn test_progress_totals_match_episode_table() {
    let db = Database::open_in_memory().unwrap();
    db.sync_episodes(&generated_events()).unwrap();

    let progress = Progress::from_counts(&db.show_counts().unwrap());
    assert_eq!(progress.total_episodes_watched, db.episode_count().unwrap());
    assert_eq!(
        progress.total_hours_watched,
        hours_watched(progress.total_episodes_watched)
    );

    let counts: Vec<_> = progress.shows.iter().map(|s| s.episodes_watched).collect();
    let mut sorted = counts.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(counts, sorted);
}

#[test]
fn test_csv_rows_sorted_by_timestamp_then_id() {
    let db = Database::open_in_memory().unwrap();
    let mut events = generated_events();
    events.reverse();
    db.sync_episodes(&events).unwrap();

    let rows = db.episode_rows().unwrap();
    for pair in rows.windows(2) {
        assert!((pair[0].timestamp, pair[0].id) <= (pair[1].timestamp, pair[1].id));
    }
}
