//! Watch statistics derived from the per-show and per-day counts.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::database::ShowSummary;

/// Every episode is assumed to take this long to watch.
pub const MINUTES_PER_EPISODE: i64 = 20;

/// Day tracking started; the cumulative series starts here.
pub fn anchor_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 5, 7).expect("anchor date is a valid calendar date")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowProgress {
    pub name: String,
    pub episodes_watched: i64,
}

/// Summary returned by `GET /progress`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub total_episodes_watched: i64,
    pub total_hours_watched: i64,
    pub shows: Vec<ShowProgress>,
}

impl Progress {
    /// Build the summary from counts already sorted most-watched first.
    pub fn from_counts(counts: &[ShowSummary]) -> Self {
        let total_episodes_watched: i64 = counts.iter().map(|c| c.episodes_watched).sum();

        let shows = counts
            .iter()
            .map(|c| ShowProgress {
                name: c
                    .show
                    .tvdb_name
                    .clone()
                    .unwrap_or_else(|| c.show.folder_name.clone()),
                episodes_watched: c.episodes_watched,
            })
            .collect();

        Progress {
            total_episodes_watched,
            total_hours_watched: hours_watched(total_episodes_watched),
            shows,
        }
    }
}

/// Whole hours spent on `episodes`, rounded down
pub fn hours_watched(episodes: i64) -> i64 {
    episodes * MINUTES_PER_EPISODE / 60
}

/// One point of the cumulative watch chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub total: i64,
}

/// Running total of episodes per day, seeded at `anchor`.
///
/// The seed counts whatever was watched on or before the anchor, which is
/// zero unless a client reports older events. Dates are strictly increasing.
pub fn cumulative_series(anchor: NaiveDate, daily: &[(NaiveDate, i64)]) -> Vec<ChartPoint> {
    let mut days = daily.to_vec();
    days.sort_by_key(|(date, _)| *date);

    let mut total: i64 = days
        .iter()
        .take_while(|(date, _)| *date <= anchor)
        .map(|(_, count)| count)
        .sum();

    let mut series = vec![ChartPoint {
        date: anchor,
        total,
    }];

    for (date, count) in days.into_iter().filter(|(date, _)| *date > anchor) {
        total += count;
        series.push(ChartPoint { date, total });
    }

    series
}
