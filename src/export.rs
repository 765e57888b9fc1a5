use anyhow::{Context, Result};
use std::io::Write;

use crate::database::EpisodeRow;

/// Write episodes as CSV with a header row.
///
/// Fields containing commas, quotes or newlines are quoted per RFC 4180, so
/// arbitrary file names survive a round trip.
pub fn write_csv<W: Write>(rows: &[EpisodeRow], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row).context("write csv row")?;
    }
    if rows.is_empty() {
        csv_writer
            .write_record(HEADER)
            .context("write csv header")?;
    }
    csv_writer.flush().context("flush csv")?;
    Ok(())
}

pub const HEADER: [&str; 7] = [
    "id",
    "folder_name",
    "file_name",
    "timestamp",
    "tvdb_id",
    "tvdb_name",
    "tvdb_image",
];

pub fn to_csv_string(rows: &[EpisodeRow]) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(rows, &mut buf)?;
    String::from_utf8(buf).context("csv output is not utf-8")
}
