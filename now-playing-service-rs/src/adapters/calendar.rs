//! Stations that publish their schedule as a public Google Calendar. The
//! registry's `infoLink` holds the calendar id.

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::Value;

use super::{info_link, Adapter, AdapterError, FetchContext};
use crate::{
    extract::{abridge, extract},
    model::{NowPlaying, SocialLinks, Status},
    path,
    registry::StationConfig,
    text::normalize,
};

const MAX_RESULTS: &str = "3";

#[derive(Debug, Clone, Copy)]
pub enum Calendar {
    /// Summary plus a description carrying blurb, links and genres.
    Described,
    /// Off air whenever no event is running.
    OfflineBetweenEvents,
    SummaryOnly,
}

#[async_trait]
impl Adapter for Calendar {
    async fn fetch(
        &self,
        ctx: &FetchContext,
        station: &StationConfig,
        _previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError> {
        let calendar_id = info_link(station)?;
        let upstream = ctx.upstream();
        let api_key = upstream
            .calendar_api_key
            .clone()
            .ok_or(AdapterError::Config("GOOGLE_CALENDAR_API_KEY"))?;
        let url = format!(
            "{}/calendars/{}/events",
            upstream.calendar_base_url.trim_end_matches('/'),
            urlencoding::encode(calendar_id)
        );
        let time_min = (ctx.now() - Duration::hours(1)).to_rfc3339_opts(SecondsFormat::Secs, true);
        let query = [
            ("key", api_key),
            ("maxResults", MAX_RESULTS.to_string()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("timeMin", time_min),
        ];
        let doc = ctx.get_json_with_query(&url, &query).await?;
        Ok(parse(*self, station, &doc, ctx.now()))
    }
}

fn event_time(event: &Value, edge: &str) -> Option<DateTime<Utc>> {
    let raw = extract(event, path![edge, "dateTime"]).raw_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|time| time.with_timezone(&Utc))
}

/// The first listed event running at `now`. All-day events have no
/// `dateTime` and never match.
pub(crate) fn current_event(doc: &Value, now: DateTime<Utc>) -> Option<&Value> {
    doc.get("items")?.as_array()?.iter().find(|event| {
        match (event_time(event, "start"), event_time(event, "end")) {
            (Some(start), Some(end)) => start < now && now < end,
            _ => false,
        }
    })
}

pub(crate) fn parse(
    flavor: Calendar,
    station: &StationConfig,
    doc: &Value,
    now: DateTime<Utc>,
) -> NowPlaying {
    let mut record = NowPlaying::for_station(station);
    let event = current_event(doc, now);

    if matches!(flavor, Calendar::OfflineBetweenEvents) {
        record.status = Status::from_on_air(event.is_some());
    }
    let Some(event) = event else {
        return record;
    };
    record.title = extract(event, path!["summary"]).text();

    if matches!(flavor, Calendar::Described) {
        if let Some(description) = extract(event, path!["description"]).raw_str() {
            apply_description(&mut record, description);
        }
    }
    record
}

/// Line one is the blurb, the last line a genre list when it has no full
/// stop, and any line may be a social link.
fn apply_description(record: &mut NowPlaying, description: &str) {
    let lines: Vec<String> = description
        .replace("&nbsp;", "<br>")
        .replace('\n', "<br>")
        .split("<br>")
        .map(normalize)
        .collect();

    if let Some(first) = lines.first().filter(|line| !line.is_empty()) {
        record.long_description = Some(first.clone());
        record.short_description = Some(abridge(first));
    }
    if let Some(last) = lines.last().filter(|line| !line.is_empty()) {
        if !last.contains('.') {
            record.additional_info = Some(last.clone());
        }
    }
    record.social_links = Some(SocialLinks::from_mentions(&lines));
}
