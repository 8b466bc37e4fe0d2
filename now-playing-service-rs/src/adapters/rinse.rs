use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::Value;

use super::{info_link, Adapter, AdapterError, FetchContext};
use crate::{
    extract::{descriptions, extract},
    model::NowPlaying,
    path,
    registry::StationConfig,
};

const DEFAULT_EPISODE_MINUTES: i64 = 120;
const IMAGE_CDN: &str = "https://img.imageboss.me/rinse-fm/cover:smart/600x600";

/// One channel of the shared Rinse schedule feed.
pub struct Rinse {
    pub channel: &'static str,
}

#[async_trait]
impl Adapter for Rinse {
    async fn fetch(
        &self,
        ctx: &FetchContext,
        station: &StationConfig,
        _previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError> {
        let doc = ctx.get_json(info_link(station)?).await?;
        parse(self.channel, station, &doc, ctx.now())
    }
}

fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return Some(time.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|time| time.and_utc())
}

fn is_current(episode: &Value, now: DateTime<Utc>) -> bool {
    let start = extract(episode, path!["episodeTime"])
        .raw_str()
        .and_then(parse_instant);
    let date = extract(episode, path!["episodeDate"])
        .raw_str()
        .and_then(parse_instant);
    let (Some(start), Some(date)) = (start, date) else {
        return false;
    };
    let minutes = extract(episode, path!["episodeLength"])
        .truthy()
        .and_then(Value::as_i64)
        .unwrap_or(DEFAULT_EPISODE_MINUTES);
    // An absurd length is treated as "not running".
    let Some(end) =
        Duration::try_minutes(minutes).and_then(|length| start.checked_add_signed(length))
    else {
        return false;
    };
    let airs_today = (date + Duration::minutes(60)).date_naive() == now.date_naive();
    start <= now && now <= end && airs_today
}

pub(crate) fn parse(
    channel: &str,
    station: &StationConfig,
    doc: &Value,
    now: DateTime<Utc>,
) -> Result<NowPlaying, AdapterError> {
    let episodes = doc
        .get("episodes")
        .and_then(Value::as_array)
        .ok_or_else(|| AdapterError::shape("schedule has no episodes list"))?;

    let mut record = NowPlaying::for_station(station);
    // Overlapping entries: the later one in the feed wins.
    let current = episodes
        .iter()
        .filter(|episode| {
            extract(episode, path!["channel", 0, "slug"]).raw_str() == Some(channel)
                && is_current(episode, now)
        })
        .last();
    let Some(episode) = current else {
        return Ok(record);
    };

    record.title = extract(episode, path!["title"]).text();
    record.subtitle = extract(episode, path!["subtitle"]).text();
    record.genres = extract(episode, path!["parentShow", 0, "genreTag"]).collect(path!["title"]);
    record.set_descriptions(descriptions(
        extract(episode, path!["parentShow", 0, "extract"]).raw_str(),
    ));
    record.show_logo_url = extract(episode, path!["featuredImage", 0, "filename"])
        .text()
        .map(|filename| format!("{IMAGE_CDN}/{filename}"));
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn station() -> StationConfig {
        serde_json::from_str(r#"{"name": "Rinse UK", "logo": "x.png"}"#).unwrap()
    }

    fn episode(slug: &str, title: &str, time: &str, length: Value) -> Value {
        json!({
            "channel": [{"slug": slug}],
            "title": title,
            "subtitle": "with guests",
            "episodeTime": time,
            "episodeDate": "2024-06-15T00:00:00+01:00",
            "episodeLength": length,
            "parentShow": [{
                "genreTag": [{"title": "Grime"}, {"title": "Garage"}],
                "extract": "<p>Two hours of pirate-radio heritage from the east of the city</p>"
            }],
            "featuredImage": [{"filename": "show.jpg"}]
        })
    }

    #[test]
    fn picks_running_episode_on_channel() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 13, 0, 0).unwrap();
        let doc = json!({"episodes": [
            episode("france", "Other Channel", "2024-06-15T12:00:00Z", json!(120)),
            episode("uk", "Finished", "2024-06-15T09:00:00Z", json!(60)),
            episode("uk", "Lunch", "2024-06-15T12:00:00Z", json!(null)),
        ]});
        let record = parse("uk", &station(), &doc, now).unwrap();
        assert_eq!(record.title.as_deref(), Some("Lunch"));
        assert_eq!(record.subtitle.as_deref(), Some("with guests"));
        assert_eq!(
            record.genres,
            Some(vec!["Grime".to_string(), "Garage".to_string()])
        );
        assert_eq!(
            record.short_description.as_deref(),
            Some("Two hours of pirate-radio heritage from the ...")
        );
        assert_eq!(
            record.show_logo_url.as_deref(),
            Some("https://img.imageboss.me/rinse-fm/cover:smart/600x600/show.jpg")
        );
    }

    #[test]
    fn nothing_running_leaves_fields_empty() {
        let now = Utc.with_ymd_and_hms(2024, 6, 16, 13, 0, 0).unwrap();
        let yesterday = episode("uk", "Yesterday", "2024-06-15T12:00:00Z", json!(120));
        let doc = json!({ "episodes": [yesterday] });
        let record = parse("uk", &station(), &doc, now).unwrap();
        assert_eq!(record.title, None);
    }

    #[test]
    fn later_overlapping_episode_wins() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 13, 0, 0).unwrap();
        let doc = json!({"episodes": [
            episode("uk", "Early Overrun", "2024-06-15T11:00:00Z", json!(180)),
            episode("uk", "Lunch", "2024-06-15T12:00:00Z", json!(120)),
        ]});
        let record = parse("uk", &station(), &doc, now).unwrap();
        assert_eq!(record.title.as_deref(), Some("Lunch"));
    }

    #[test]
    fn out_of_range_length_is_not_running() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 13, 0, 0).unwrap();
        let doc = json!({"episodes": [
            episode("uk", "Forever", "2024-06-15T12:00:00Z", json!(100_000_000_000_000_000_i64)),
            episode("uk", "Backwards", "2024-06-15T12:00:00Z", json!(i64::MIN)),
        ]});
        let record = parse("uk", &station(), &doc, now).unwrap();
        assert_eq!(record.title, None);
    }

    #[test]
    fn missing_episode_list_is_a_shape_error() {
        let now = Utc::now();
        assert!(matches!(
            parse("uk", &station(), &json!({"channels": []}), now),
            Err(AdapterError::Shape(_))
        ));
    }
}
