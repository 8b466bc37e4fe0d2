//! Stations running Airtime/LibreTime expose `live-info` (v1, `currentShow`
//! array) or `live-info-v2` (`shows.current` object). The payloads are the
//! same everywhere; what each station puts in them is not.

use async_trait::async_trait;
use serde_json::Value;

use super::{info_link, Adapter, AdapterError, FetchContext};
use crate::{
    extract::extract,
    model::NowPlaying,
    path,
    registry::StationConfig,
    text::normalize_non_empty,
};

#[derive(Debug, Clone, Copy)]
pub enum V2Flavor {
    /// Show name as title; offline without one.
    TitledOnly,
    /// `"<show> w/ <host>"` names split into title and artist. The host is
    /// whatever follows `artist_at`; the title is whatever precedes
    /// `title_at`. Without `artist_at` the whole name is the title.
    HostSplit {
        title_at: &'static str,
        artist_at: &'static str,
    },
    /// Show name plus current track as subtitle.
    WithTrack,
    /// Offline when no show is scheduled.
    CurrentShow,
    /// Upper-cased show name with the archive code spelled out.
    Uppercase,
    ShowAndTrack,
    TrackMetadata { require_title: bool },
    CurrentTrack,
}

#[derive(Debug, Clone, Copy)]
pub enum V1Flavor {
    Show,
    TitledOnly,
    AutoDjMarked,
    WithTrackAndArtwork,
    WithNext,
}

pub struct LiveInfoV2(pub V2Flavor);

pub struct LiveInfo(pub V1Flavor);

#[async_trait]
impl Adapter for LiveInfoV2 {
    async fn fetch(
        &self,
        ctx: &FetchContext,
        station: &StationConfig,
        _previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError> {
        let doc = ctx.get_json(info_link(station)?).await?;
        Ok(parse_v2(self.0, station, &doc))
    }
}

#[async_trait]
impl Adapter for LiveInfo {
    async fn fetch(
        &self,
        ctx: &FetchContext,
        station: &StationConfig,
        _previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError> {
        let doc = ctx.get_json(info_link(station)?).await?;
        Ok(parse_v1(self.0, station, &doc))
    }
}

fn strip_mp3(name: &str) -> String {
    name.replace(".mp3", "")
}

pub(crate) fn parse_v2(flavor: V2Flavor, station: &StationConfig, doc: &Value) -> NowPlaying {
    let show = extract(doc, path!["shows", "current"]);
    let show_name = extract(doc, path!["shows", "current", "name"]);
    let mut record = NowPlaying::for_station(station);

    match flavor {
        V2Flavor::TitledOnly => {
            record = record.with_title(show_name.text()).on_air_if_titled();
        }
        V2Flavor::HostSplit {
            title_at,
            artist_at,
        } => {
            if show.truthy().is_none() {
                return NowPlaying::offline(station);
            }
            if let Some(raw) = show_name.raw_str() {
                let cleaned = strip_mp3(&raw.replace(" - ", " "));
                match cleaned.split(artist_at).nth(1) {
                    Some(artist) => {
                        let title = cleaned.split(title_at).next().unwrap_or_default();
                        record.title = normalize_non_empty(title);
                        record.artist = normalize_non_empty(artist);
                    }
                    None => record.title = normalize_non_empty(&cleaned),
                }
            }
        }
        V2Flavor::WithTrack => {
            let Some(title) = show_name.text() else {
                return NowPlaying::offline(station);
            };
            record.title = Some(title);
            record.subtitle = extract(doc, path!["tracks", "current", "name"]).text();
        }
        V2Flavor::CurrentShow => {
            if show.truthy().is_none() {
                return NowPlaying::offline(station);
            }
            record.title = show_name.text();
        }
        V2Flavor::Uppercase => {
            let Some(name) = show_name.text() else {
                return NowPlaying::offline(station);
            };
            let upper = name.to_uppercase();
            record.title = Some(if upper == "TA" {
                "Picks from the archive".to_string()
            } else {
                upper
            });
        }
        V2Flavor::ShowAndTrack => {
            let Some(title) = show_name.text() else {
                return NowPlaying::offline(station);
            };
            record.title = Some(title);
            record.short_description =
                extract(doc, path!["shows", "current", "description"]).text();
            record.additional_info = extract(doc, path!["tracks", "current", "name"])
                .raw_str()
                .and_then(|track| {
                    normalize_non_empty(&strip_mp3(track.trim_start_matches([' ', '-'])))
                });
        }
        V2Flavor::TrackMetadata { require_title } => {
            record.title = extract(doc, path!["current", "metadata", "track_title"])
                .raw_str()
                .and_then(|title| normalize_non_empty(&strip_mp3(title)));
            record.artist = extract(doc, path!["current", "metadata", "artist_name"]).text();
            if require_title {
                record = record.on_air_if_titled();
            }
        }
        V2Flavor::CurrentTrack => {
            let title = extract(doc, path!["tracks", "current", "metadata", "track_title"]).text();
            record = record.with_title(title).on_air_if_titled();
        }
    }
    record
}

pub(crate) fn parse_v1(flavor: V1Flavor, station: &StationConfig, doc: &Value) -> NowPlaying {
    let title = extract(doc, path!["currentShow", 0, "name"]).text();
    let mut record = NowPlaying::for_station(station).with_title(title);

    match flavor {
        V1Flavor::Show => {}
        V1Flavor::TitledOnly => record = record.on_air_if_titled(),
        V1Flavor::AutoDjMarked => {
            if extract(doc, path!["currentShow", 0, "auto_dj"]).as_bool() == Some(true) {
                record.title = record.title.map(|title| format!("{title} (R)"));
            }
        }
        V1Flavor::WithTrackAndArtwork => {
            let track = extract(doc, path!["current", "track_title"]).text();
            let artist = extract(doc, path!["current", "artist_name"]).text();
            if let (Some(track), Some(artist)) = (track, artist) {
                record.additional_info = Some(format!("{track} by {artist}"));
            }
            record.show_logo_url = extract(doc, path!["metadata", "artwork_url"]).text();
            record = record.on_air_if_titled();
        }
        V1Flavor::WithNext => {
            record.additional_info = extract(doc, path!["nextShow", 0, "name"])
                .text()
                .map(|next| format!("Next: {next}"));
        }
    }
    record
}
