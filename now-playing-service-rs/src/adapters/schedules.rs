//! Stations that only publish a day schedule; the programme on air is the
//! latest one that has already started.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::America::Los_Angeles;
use serde_json::Value;

use super::{info_link, Adapter, AdapterError, FetchContext};
use crate::{
    extract::{descriptions, extract},
    model::NowPlaying,
    path,
    registry::StationConfig,
};

const DUBLAB_FALLBACK_ARTIST: &str = "Dublab";

pub struct Dublab;

/// KQED's schedule is keyed by the Pacific calendar date.
pub struct Kqed;

#[async_trait]
impl Adapter for Dublab {
    async fn fetch(
        &self,
        ctx: &FetchContext,
        station: &StationConfig,
        previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError> {
        let doc = ctx.get_json(info_link(station)?).await?;
        parse_dublab(station, &doc, ctx.now(), previous)
    }
}

#[async_trait]
impl Adapter for Kqed {
    async fn fetch(
        &self,
        ctx: &FetchContext,
        station: &StationConfig,
        _previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError> {
        let url = kqed_url(info_link(station)?, ctx.now());
        let doc = ctx.get_json(&url).await?;
        parse_kqed(station, &doc, ctx.now())
    }
}

pub(crate) fn kqed_url(base: &str, now: DateTime<Utc>) -> String {
    let day = now.with_timezone(&Los_Angeles).format("%Y-%m-%d");
    format!("{base}{day}?cachebust={}", now.timestamp() % 10_000)
}

fn started_at(program: &Value) -> Option<DateTime<Utc>> {
    let raw = extract(program, path!["startTime"]).raw_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|time| time.with_timezone(&Utc))
}

pub(crate) fn parse_dublab(
    station: &StationConfig,
    doc: &Value,
    now: DateTime<Utc>,
    previous: Option<&NowPlaying>,
) -> Result<NowPlaying, AdapterError> {
    let programs = doc
        .as_array()
        .ok_or_else(|| AdapterError::shape("schedule is not a list"))?;
    let mut record = NowPlaying::for_station(station);

    let current = programs
        .iter()
        .filter_map(|program| started_at(program).map(|start| (start, program)))
        .filter(|(start, _)| *start < now)
        .max_by_key(|(start, _)| *start)
        .map(|(_, program)| program);

    let Some(program) = current else {
        if let Some(previous) = previous {
            record.title = previous.title.clone();
            record.artist = previous.artist.clone();
            record.show_logo_url = previous.show_logo_url.clone();
            record.long_description = previous.long_description.clone();
            record.short_description = previous.short_description.clone();
        }
        return Ok(record);
    };

    record.title = extract(program, path!["eventTitleMeta", "eventName"]).text();
    record.artist = Some(
        extract(program, path!["eventTitleMeta", "artist"])
            .text()
            .unwrap_or_else(|| DUBLAB_FALLBACK_ARTIST.to_string()),
    );
    record.show_logo_url = extract(program, path!["attachments"])
        .text()
        .or_else(|| extract(program, path!["attachments", 0]).text())
        .or_else(|| previous.and_then(|previous| previous.show_logo_url.clone()));
    record.set_descriptions(descriptions(
        extract(program, path!["description"]).raw_str(),
    ));
    Ok(record)
}

pub(crate) fn parse_kqed(
    station: &StationConfig,
    doc: &Value,
    now: DateTime<Utc>,
) -> Result<NowPlaying, AdapterError> {
    let programs = extract(doc, path!["data", "attributes", "schedule"])
        .value()
        .and_then(Value::as_array)
        .ok_or_else(|| AdapterError::shape("schedule has no programs"))?;
    let now_epoch = now.timestamp();
    let mut record = NowPlaying::for_station(station);

    let current = programs
        .iter()
        .filter_map(|program| {
            extract(program, path!["startTime"])
                .as_i64()
                .map(|start| (start, program))
        })
        .filter(|(start, _)| *start < now_epoch)
        .max_by_key(|(start, _)| *start)
        .map(|(_, program)| program);

    if let Some(program) = current {
        record.title = extract(program, path!["programTitle"]).text();
        record.subtitle = extract(program, path!["episodeTitle"]).text();
        record.additional_info = extract(program, path!["programSource"]).text();
        record.set_descriptions(descriptions(
            extract(program, path!["programDescription"]).raw_str(),
        ));
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn station(name: &str) -> StationConfig {
        serde_json::from_value(json!({"name": name, "logo": "x.png", "genres": ["Talk"]})).unwrap()
    }

    #[test]
    fn dublab_takes_latest_started_program() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 20, 0, 0).unwrap();
        let doc = json!([
            {"startTime": "2024-06-15T10:00:00-07:00", "eventTitleMeta": {"eventName": "Current", "artist": ""},
             "attachments": "https://dublab.com/current.jpg", "description": "<p>Deep cuts</p>"},
            {"startTime": "2024-06-15T08:00:00-07:00", "eventTitleMeta": {"eventName": "Earlier", "artist": "Someone"}},
            {"startTime": "2024-06-15T14:00:00-07:00", "eventTitleMeta": {"eventName": "Later", "artist": "Other"}}
        ]);
        let record = parse_dublab(&station("Dublab"), &doc, now, None).unwrap();
        assert_eq!(record.title.as_deref(), Some("Current"));
        assert_eq!(record.artist.as_deref(), Some("Dublab"));
        assert_eq!(record.show_logo_url.as_deref(), Some("https://dublab.com/current.jpg"));
        assert_eq!(record.long_description.as_deref(), Some("Deep cuts"));
    }

    #[test]
    fn dublab_keeps_previous_before_first_program() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 6, 0, 0).unwrap();
        let doc = json!([{"startTime": "2024-06-15T10:00:00-07:00", "eventTitleMeta": {"eventName": "Later"}}]);
        let mut previous = NowPlaying::for_station(&station("Dublab"));
        previous.title = Some("Overnight".into());
        let record = parse_dublab(&station("Dublab"), &doc, now, Some(&previous)).unwrap();
        assert_eq!(record.title.as_deref(), Some("Overnight"));
    }

    #[test]
    fn kqed_url_uses_pacific_date() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 3, 0, 0).unwrap();
        let url = kqed_url("https://media-api.kqed.org/radio-schedules/", now);
        assert!(url.starts_with("https://media-api.kqed.org/radio-schedules/2024-06-14?cachebust="));
    }

    #[test]
    fn kqed_picks_latest_started_program() {
        let now = Utc.timestamp_opt(1_000_000, 0).unwrap();
        let doc = json!({"data": {"attributes": {"schedule": [
            {"startTime": 990_000, "programTitle": "Morning Edition", "programSource": "NPR"},
            {"startTime": "999000", "programTitle": "Forum", "episodeTitle": "Housing",
             "programDescription": "Conversation about the Bay Area and the people who live in it"},
            {"startTime": 1_100_000, "programTitle": "Later"}
        ]}}});
        let record = parse_kqed(&station("KQED"), &doc, now).unwrap();
        assert_eq!(record.title.as_deref(), Some("Forum"));
        assert_eq!(record.subtitle.as_deref(), Some("Housing"));
        assert_eq!(record.additional_info, None);
        assert_eq!(
            record.short_description.as_deref(),
            Some("Conversation about the Bay Area and the peop...")
        );
        assert_eq!(record.genres, Some(vec!["Talk".to_string()]));
    }
}
