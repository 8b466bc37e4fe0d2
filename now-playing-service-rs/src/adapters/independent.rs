//! Stations with a one-off endpoint of their own.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::{json, Value};

use super::{info_link, Adapter, AdapterError, FetchContext};
use crate::{
    extract::extract,
    model::{NowPlaying, Status},
    path,
    registry::StationConfig,
    text::normalize_non_empty,
};

const BLOOP_FALLBACK_TITLE: &str = "Re-Run";
const LYL_OFF_AIR_MARKER: &str = "WE'LL BE BACK";
const LYL_QUERY: &str = "{\n  onair {\n    title\n    hls\n    __typename\n  }\n}\n";
const MONOTONIC_LIVE_STREAM: &str = "http://monotonicradio.com:8000/stream.m3u";
const MONOTONIC_ARCHIVE_STREAM: &str = "https://monotonicradio.com/stream";
const RELATIVA_LIVE_PREFIX: &str = "Live Now - ";
const VILNIUS_SERVER: &str = "Radio Vilnius";

static KJAZZ_HOST_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.noDec").expect("valid host link selector"));

macro_rules! json_adapter {
    ($name:ident, $parse:ident) => {
        #[async_trait]
        impl Adapter for $name {
            async fn fetch(
                &self,
                ctx: &FetchContext,
                station: &StationConfig,
                _previous: Option<&NowPlaying>,
            ) -> Result<NowPlaying, AdapterError> {
                let doc = ctx.get_json(info_link(station)?).await?;
                $parse(station, &doc)
            }
        }
    };
}

pub struct Bloop;
pub struct InternetPublicRadio;
pub struct KJazz;
pub struct SomaFm;
pub struct Lyl;
pub struct Bff;
pub struct RadioAlhara;
/// Any endpoint whose payload carries a top-level `title`.
pub struct TitleOnly;
pub struct Rukh;
pub struct Monotonic;
pub struct Punctum;
pub struct Stayfm;
pub struct RadioRelativa;
pub struct RadioVilnius;
pub struct Refuge;
/// Stations with nothing to poll; always on air with the registry's details.
pub struct StaticOnAir;

json_adapter!(InternetPublicRadio, parse_internet_public_radio);
json_adapter!(SomaFm, parse_soma);
json_adapter!(Bff, parse_bff);
json_adapter!(RadioAlhara, parse_alhara);
json_adapter!(TitleOnly, parse_title_only);
json_adapter!(Monotonic, parse_monotonic);
json_adapter!(Punctum, parse_punctum);
json_adapter!(Stayfm, parse_stayfm);
json_adapter!(RadioRelativa, parse_relativa);
json_adapter!(RadioVilnius, parse_vilnius);
json_adapter!(Refuge, parse_refuge);

#[async_trait]
impl Adapter for Bloop {
    async fn fetch(
        &self,
        ctx: &FetchContext,
        station: &StationConfig,
        _previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError> {
        let form = [
            ("action", "show-time-curd"),
            ("crud-action", "read"),
            ("read-type", "current"),
        ];
        let doc = ctx.post_form(info_link(station)?, &form).await?;
        parse_bloop(station, &doc)
    }
}

#[async_trait]
impl Adapter for KJazz {
    async fn fetch(
        &self,
        ctx: &FetchContext,
        station: &StationConfig,
        _previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError> {
        let main_link = station
            .main_link
            .as_deref()
            .ok_or(AdapterError::MissingLink("mainLink"))?;
        let page = ctx.get_text(main_link).await?;
        parse_kjazz(station, &page)
    }
}

#[async_trait]
impl Adapter for Lyl {
    async fn fetch(
        &self,
        ctx: &FetchContext,
        station: &StationConfig,
        _previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError> {
        let body = json!({"variables": {}, "query": LYL_QUERY});
        let doc = ctx.post_json(info_link(station)?, &body).await?;
        Ok(parse_lyl(station, &doc))
    }
}

#[async_trait]
impl Adapter for Rukh {
    async fn fetch(
        &self,
        ctx: &FetchContext,
        station: &StationConfig,
        _previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError> {
        let body = ctx.get_text(info_link(station)?).await?;
        Ok(NowPlaying::for_station(station).with_title(normalize_non_empty(&body)))
    }
}

#[async_trait]
impl Adapter for StaticOnAir {
    async fn fetch(
        &self,
        _ctx: &FetchContext,
        station: &StationConfig,
        _previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError> {
        Ok(NowPlaying::for_station(station))
    }
}

pub(crate) fn parse_bloop(station: &StationConfig, doc: &Value) -> Result<NowPlaying, AdapterError> {
    let title = extract(doc, path!["current-show", "showName"])
        .text()
        .unwrap_or_else(|| BLOOP_FALLBACK_TITLE.to_string());
    Ok(NowPlaying::for_station(station).with_title(Some(title)))
}

pub(crate) fn parse_internet_public_radio(
    station: &StationConfig,
    doc: &Value,
) -> Result<NowPlaying, AdapterError> {
    Ok(NowPlaying::for_station(station).with_title(extract(doc, path!["nowplaying"]).text()))
}

pub(crate) fn parse_kjazz(station: &StationConfig, page: &str) -> Result<NowPlaying, AdapterError> {
    let document = Html::parse_document(page);
    let host = document
        .select(&KJAZZ_HOST_LINK)
        .nth(1)
        .ok_or_else(|| AdapterError::shape("homepage has no host link"))?;
    let title = normalize_non_empty(&host.text().collect::<String>());
    Ok(NowPlaying::for_station(station).with_title(title))
}

pub(crate) fn parse_soma(station: &StationConfig, doc: &Value) -> Result<NowPlaying, AdapterError> {
    let song = extract(doc, path!["songs", 0])
        .value()
        .ok_or_else(|| AdapterError::shape("no songs listed"))?;
    let mut record = NowPlaying::for_station(station);
    record.title = extract(song, path!["title"]).text();
    record.artist = extract(song, path!["artist"]).text();
    record.subtitle = extract(song, path!["album"]).text();
    Ok(record)
}

pub(crate) fn parse_lyl(station: &StationConfig, doc: &Value) -> NowPlaying {
    let title = extract(doc, path!["data", "onair", "title"]).text();
    let on_air = title
        .as_deref()
        .is_some_and(|title| !title.contains(LYL_OFF_AIR_MARKER));
    let mut record = NowPlaying::for_station(station).with_title(title);
    record.status = Status::from_on_air(on_air);
    record
}

pub(crate) fn parse_bff(station: &StationConfig, doc: &Value) -> Result<NowPlaying, AdapterError> {
    let mut record = NowPlaying::for_station(station);
    record.title = extract(doc, path!["program"]).text();
    record.artist = extract(doc, path!["presenter"]).text();
    let track = extract(doc, path!["title"]).text();
    record.subtitle = match (track, extract(doc, path!["artist"]).text()) {
        (Some(track), Some(artist)) => Some(format!("{track} by {artist}")),
        (track, _) => track,
    };
    record.show_logo_url = extract(doc, path!["program_image"])
        .raw_str()
        .map(|logo| logo.replace("\\/", "/"))
        .filter(|logo| !logo.is_empty());
    Ok(record)
}

pub(crate) fn parse_alhara(station: &StationConfig, doc: &Value) -> Result<NowPlaying, AdapterError> {
    let mut record = NowPlaying::for_station(station).with_title(extract(doc, path!["title"]).text());
    record.artist = extract(doc, path!["artist"]).text();
    Ok(record)
}

pub(crate) fn parse_title_only(
    station: &StationConfig,
    doc: &Value,
) -> Result<NowPlaying, AdapterError> {
    Ok(NowPlaying::for_station(station).with_title(extract(doc, path!["title"]).text()))
}

pub(crate) fn parse_monotonic(
    station: &StationConfig,
    doc: &Value,
) -> Result<NowPlaying, AdapterError> {
    let mut record = NowPlaying::for_station(station)
        .with_title(extract(doc, path!["now_playing"]).text())
        .on_air_if_titled();
    if !record.status.is_offline() {
        let stream = if extract(doc, path!["source"]).raw_str() == Some("live") {
            MONOTONIC_LIVE_STREAM
        } else {
            MONOTONIC_ARCHIVE_STREAM
        };
        record.stream_url_override = Some(stream.to_string());
    }
    record.short_description = extract(doc, path!["video_description"]).text();
    if let Some(genres) = extract(doc, path!["genres"]).collect(&[]) {
        record.genres = Some(genres);
    }
    Ok(record)
}

pub(crate) fn parse_punctum(station: &StationConfig, doc: &Value) -> Result<NowPlaying, AdapterError> {
    let mut record =
        NowPlaying::for_station(station).with_title(extract(doc, path!["data", "title"]).text());
    record.artist = extract(doc, path!["data", "artists"]).join(path!["name"]);
    Ok(record)
}

pub(crate) fn parse_stayfm(station: &StationConfig, doc: &Value) -> Result<NowPlaying, AdapterError> {
    let mut record = NowPlaying::for_station(station);
    record.title = extract(doc, path!["showQueued", "title"]).text();
    record.artist = extract(doc, path!["showQueued", "host"]).text();
    let stream_field = if extract(doc, path!["onair"]).raw_str() == Some("archive") {
        "streamArchive"
    } else {
        "streamLive"
    };
    record.stream_url_override = extract(doc, path![stream_field]).text();
    Ok(record)
}

pub(crate) fn parse_relativa(
    station: &StationConfig,
    doc: &Value,
) -> Result<NowPlaying, AdapterError> {
    let mut record = NowPlaying::for_station(station);
    record.status = Status::from_on_air(extract(doc, path!["status"]).raw_str() == Some("online"));
    record.title = extract(doc, path!["current_track", "title"])
        .text()
        .and_then(|title| normalize_non_empty(&title.replace(RELATIVA_LIVE_PREFIX, "")));
    Ok(record)
}

pub(crate) fn parse_vilnius(station: &StationConfig, doc: &Value) -> Result<NowPlaying, AdapterError> {
    let servers = extract(doc, path!["allStats"])
        .value()
        .and_then(Value::as_array)
        .ok_or_else(|| AdapterError::shape("no allStats list"))?;
    let server = servers
        .iter()
        .find(|server| extract(server, path!["server_name"]).raw_str() == Some(VILNIUS_SERVER));

    let Some(server) = server else {
        return Ok(NowPlaying::offline(station));
    };
    let mut record = NowPlaying::for_station(station);
    record.title = extract(server, path!["title"]).text();
    record.artist = extract(server, path!["artist"]).text();
    record.listener_count = extract(server, path!["listener_peak"]).listeners();
    Ok(record)
}

pub(crate) fn parse_refuge(station: &StationConfig, doc: &Value) -> Result<NowPlaying, AdapterError> {
    let mut record = NowPlaying::for_station(station);
    record.status = Status::from_on_air(extract(doc, path!["status"]).raw_str() == Some("online"));
    record.show_logo_url = extract(doc, path!["liveNow", "artwork"]).text();
    if let Some(line) = extract(doc, path!["liveNow", "title"]).text() {
        let mut parts = line.split(" - ");
        record.title = parts.next().and_then(normalize_non_empty);
        record.artist = parts.next().and_then(normalize_non_empty);
    }
    Ok(record)
}
