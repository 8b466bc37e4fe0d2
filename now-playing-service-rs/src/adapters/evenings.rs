use async_trait::async_trait;
use serde_json::Value;

use super::{info_link, Adapter, AdapterError, FetchContext};
use crate::{
    extract::extract,
    model::{NowPlaying, Status},
    path,
    registry::StationConfig,
};

const SECOND_CHANNEL_SUFFIX: &str = "-channel-2";

/// `api.evenings.co` public stream endpoint.
pub struct Evenings;

/// Two evenings.co channels; the talk channel wins when it is live.
pub struct DesirePath;

#[async_trait]
impl Adapter for Evenings {
    async fn fetch(
        &self,
        ctx: &FetchContext,
        station: &StationConfig,
        _previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError> {
        let doc = ctx.get_json(info_link(station)?).await?;
        Ok(parse_stream(station, &doc))
    }
}

#[async_trait]
impl Adapter for DesirePath {
    async fn fetch(
        &self,
        ctx: &FetchContext,
        station: &StationConfig,
        _previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError> {
        let link = info_link(station)?;
        let talk = ctx.get_json(link).await?;
        if is_online(&talk) {
            return Ok(parse_desire_path(station, &talk, None));
        }
        let main = ctx.get_json(&link.replace(SECOND_CHANNEL_SUFFIX, "")).await?;
        Ok(parse_desire_path(station, &talk, Some(&main)))
    }
}

fn is_online(doc: &Value) -> bool {
    extract(doc, path!["online"]).as_bool() == Some(true)
}

pub(crate) fn parse_stream(station: &StationConfig, doc: &Value) -> NowPlaying {
    let mut record = NowPlaying::for_station(station);
    record.status = Status::from_on_air(is_online(doc));
    record.title = extract(doc, path!["name"]).text();
    record.listener_count = extract(doc, path!["listeners"]).listeners();
    record.show_logo_url = extract(doc, path!["image"]).text();
    record.long_description = extract(doc, path!["description"]).text();
    record.short_description = extract(doc, path!["description"]).shorten();
    record
}

/// `main` is only fetched when the talk channel is off air.
pub(crate) fn parse_desire_path(
    station: &StationConfig,
    talk: &Value,
    main: Option<&Value>,
) -> NowPlaying {
    let mut record = NowPlaying::for_station(station);
    let doc = match main {
        None if is_online(talk) => {
            record.genres = Some(vec!["Talk".to_string()]);
            talk
        }
        Some(main) => {
            record.genres = None;
            main
        }
        None => talk,
    };

    record.status = Status::from_on_air(is_online(doc));
    record.stream_url_override = extract(doc, path!["streamUrl"]).text();
    record.listener_count = extract(doc, path!["listeners"]).listeners();
    if record.status.is_offline() {
        return record;
    }
    record.title = extract(doc, path!["name"]).text();
    record.artist = extract(doc, path!["host"]).text();
    record.long_description = extract(doc, path!["description"]).text();
    record.short_description = extract(doc, path!["description"]).shorten();
    record
}
