use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    model::{NowPlaying, Status},
    one_liner::join_parts,
};

const RERUN_MARKERS: &[&str] = &[
    "rotazione notte",
    "night moves",
    "night files",
    "repeats",
    "(r)",
    "re-run",
    "re-wav",
    "restream",
    "playlist",
    "replays",
    "stayfmix",
    "picks from the archive",
    "archivo",
    "subtle selects",
];

/// Stations that only ever broadcast recorded material.
const ALWAYS_RERUN: &[&str] = &["Monotonic Radio"];

static SLASH_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]{2}/[0-9]{2}/[0-9]{4}").expect("valid slash date regex"));
static DOT_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]{2}\.[0-9]{2}\.[0-9]{2}").expect("valid dot date regex"));

/// Refines an adapter's on-air/offline verdict into Live, Re-Run or Offline
/// from the joined display fields, before the one-liner is cut.
pub fn classify(record: &NowPlaying, station_name: &str, today: NaiveDate) -> Status {
    if record.status.is_offline() {
        return Status::Offline;
    }

    let line = join_parts(record);
    let lower = line.to_lowercase();
    if RERUN_MARKERS.iter().any(|marker| lower.contains(marker))
        || ALWAYS_RERUN.contains(&station_name)
    {
        return Status::ReRun;
    }

    match broadcast_date(&line) {
        Some(date) if date < today => Status::ReRun,
        _ => Status::Live,
    }
}

/// The first date mentioned in a title, if it parses.
fn broadcast_date(line: &str) -> Option<NaiveDate> {
    if let Some(found) = SLASH_DATE_RE.find(line) {
        return NaiveDate::parse_from_str(found.as_str(), "%d/%m/%Y").ok();
    }
    let found = DOT_DATE_RE.find(line)?;
    NaiveDate::parse_from_str(found.as_str(), "%m.%d.%y")
        .or_else(|_| NaiveDate::parse_from_str(found.as_str(), "%d.%m.%y"))
        .ok()
}
