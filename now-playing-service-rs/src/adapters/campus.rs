use async_trait::async_trait;
use serde_json::Value;

use super::{info_link, Adapter, AdapterError, FetchContext};
use crate::{
    extract::{descriptions, extract},
    model::NowPlaying,
    path,
    registry::StationConfig,
};

const STUDENT: &str = "Student";

pub struct Wnyu;

pub struct Ckut;

pub struct Kusf;

/// KEXP needs two requests: the latest play, then the show it belongs to.
pub struct Kexp;

fn student_genres() -> Option<Vec<String>> {
    Some(vec![STUDENT.to_string()])
}

#[async_trait]
impl Adapter for Wnyu {
    async fn fetch(
        &self,
        ctx: &FetchContext,
        station: &StationConfig,
        _previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError> {
        let doc = ctx.get_json(info_link(station)?).await?;
        Ok(parse_wnyu(station, &doc))
    }
}

#[async_trait]
impl Adapter for Ckut {
    async fn fetch(
        &self,
        ctx: &FetchContext,
        station: &StationConfig,
        _previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError> {
        let doc = ctx.get_json(info_link(station)?).await?;
        Ok(parse_ckut(station, &doc))
    }
}

#[async_trait]
impl Adapter for Kusf {
    async fn fetch(
        &self,
        ctx: &FetchContext,
        station: &StationConfig,
        _previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError> {
        let doc = ctx.get_json(info_link(station)?).await?;
        Ok(parse_kusf(station, &doc))
    }
}

#[async_trait]
impl Adapter for Kexp {
    async fn fetch(
        &self,
        ctx: &FetchContext,
        station: &StationConfig,
        _previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError> {
        let plays = ctx.get_json(info_link(station)?).await?;
        let play = extract(&plays, path!["results", 0])
            .value()
            .ok_or_else(|| AdapterError::shape("no recent plays"))?;
        let show_uri = extract(play, path!["show_uri"])
            .raw_str()
            .ok_or_else(|| AdapterError::shape("latest play has no show_uri"))?;
        let show = ctx.get_json(show_uri).await?;
        Ok(parse_kexp(station, play, &show))
    }
}

pub(crate) fn parse_wnyu(station: &StationConfig, doc: &Value) -> NowPlaying {
    let mut record = NowPlaying::for_station(station);
    record.genres = student_genres();

    if extract(doc, path!["metadata"]).truthy().is_some() {
        record.title = extract(doc, path!["metadata", "playlist_title"]).text();
        record.artist = extract(doc, path!["metadata", "dj"]).text();
        record.additional_info = extract(doc, path!["metadata", "release_title"])
            .text()
            .map(|mut line| {
                if let Some(artist) = extract(doc, path!["metadata", "artist_name"]).text() {
                    line.push_str(&format!(" by {artist}"));
                }
                if let Some(year) = extract(doc, path!["metadata", "release_year"]).text() {
                    line.push_str(&format!(" ({year})"));
                }
                line
            });
    } else {
        record.title = extract(doc, path!["playlist", "title"]).text();
    }

    record.show_logo_url = extract(doc, path!["playlist", "image"]).text();
    record.long_description = extract(doc, path!["playlist", "description"]).text();
    record.short_description = extract(doc, path!["playlist", "description"]).shorten();
    record
}

pub(crate) fn parse_ckut(station: &StationConfig, doc: &Value) -> NowPlaying {
    let mut record = NowPlaying::for_station(station);
    record.genres = student_genres();
    record.title = extract(doc, path!["program", "title_html"]).text();
    record.set_descriptions(descriptions(
        extract(doc, path!["program", "description_html"]).raw_str(),
    ));
    record
}

pub(crate) fn parse_kusf(station: &StationConfig, doc: &Value) -> NowPlaying {
    let mut record = NowPlaying::for_station(station);
    record.title = extract(doc, path!["now", "title"]).text();
    record.subtitle = extract(doc, path!["Track", "title"]).text();
    record.short_description = extract(doc, path!["now", "short_description"]).text();
    record.long_description = extract(doc, path!["now", "full_description"]).text();
    record.artist = extract(doc, path!["now", "hosts", 0, "display_name"]).text();

    let mut genres = vec![STUDENT.to_string()];
    if let Some(categories) = extract(doc, path!["now", "categories"]).collect(path!["title"]) {
        genres.extend(categories);
    }
    record.genres = Some(genres);
    record
}

pub(crate) fn parse_kexp(station: &StationConfig, play: &Value, show: &Value) -> NowPlaying {
    let mut record = NowPlaying::for_station(station);
    record.artist = extract(show, path!["host_names"]).join(&[]);
    record.title = extract(show, path!["program_name"]).text();
    record.genres = extract(show, path!["program_tags"]).raw_str().and_then(|tags| {
        let tags: Vec<String> = tags
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect();
        (!tags.is_empty()).then_some(tags)
    });
    record.show_logo_url = extract(show, path!["program_image_uri"]).text();

    if extract(play, path!["play_type"]).raw_str() == Some("trackplay") {
        let song = extract(play, path!["song"]).text();
        let artist = extract(play, path!["artist"]).text();
        record.subtitle = match (song, artist) {
            (Some(song), Some(artist)) => Some(format!("{song} by {artist}")),
            (Some(song), None) => Some(song),
            _ => None,
        };
    }
    record
}
