use async_trait::async_trait;
use serde_json::Value;

use super::{info_link, Adapter, AdapterError, FetchContext};
use crate::{
    extract::extract,
    model::{NowPlaying, Status},
    path,
    registry::StationConfig,
};

/// AzuraCast `nowplaying/<station>` endpoint. Stations disagree on whether the
/// show lives in `song.title` or `song.text`.
pub struct AzuraCast {
    pub title_field: &'static str,
}

/// AzuraCast's all-stations `nowplaying` listing; the first entry is ours.
pub struct ParticleFm;

#[async_trait]
impl Adapter for AzuraCast {
    async fn fetch(
        &self,
        ctx: &FetchContext,
        station: &StationConfig,
        _previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError> {
        let doc = ctx.get_json(info_link(station)?).await?;
        Ok(parse_now_playing(station, &doc, self.title_field))
    }
}

#[async_trait]
impl Adapter for ParticleFm {
    async fn fetch(
        &self,
        ctx: &FetchContext,
        station: &StationConfig,
        _previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError> {
        let doc = ctx.get_json(info_link(station)?).await?;
        parse_particle(station, &doc)
    }
}

pub(crate) fn parse_now_playing(
    station: &StationConfig,
    doc: &Value,
    title_field: &str,
) -> NowPlaying {
    let mut record = NowPlaying::for_station(station);
    record.status = Status::from_on_air(extract(doc, path!["is_online"]).as_bool() == Some(true));
    record.listener_count = extract(doc, path!["listeners", "current"]).listeners();
    record.title = extract(doc, path!["now_playing", "song", title_field]).text();
    record
}

pub(crate) fn parse_particle(
    station: &StationConfig,
    doc: &Value,
) -> Result<NowPlaying, AdapterError> {
    let entry = doc
        .as_array()
        .and_then(|entries| entries.first())
        .ok_or_else(|| AdapterError::shape("expected a non-empty station list"))?;

    let mut record = NowPlaying::for_station(station);
    record.listener_count = extract(entry, path!["listeners", "current"]).listeners();
    let is_live = extract(entry, path!["live", "is_live"]).as_bool() == Some(true);
    record.title = extract(entry, path!["now_playing", "song", "title"])
        .text()
        .map(|title| if is_live { title } else { format!("{title} (R)") });
    Ok(record)
}
