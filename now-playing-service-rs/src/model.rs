use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::registry::StationConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(alias = "Online")]
    Live,
    #[serde(rename = "Re-Run")]
    ReRun,
    Offline,
}

impl Status {
    pub fn from_on_air(on_air: bool) -> Self {
        if on_air {
            Status::Live
        } else {
            Status::Offline
        }
    }

    pub fn is_offline(self) -> bool {
        self == Status::Offline
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLinks {
    pub instagram: Option<String>,
    pub bandcamp: Option<String>,
    pub soundcloud: Option<String>,
}

impl SocialLinks {
    /// Picks profile links out of free-form lines; later mentions win.
    pub fn from_mentions<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut links = SocialLinks::default();
        for line in lines {
            let line = line.as_ref().trim();
            let lower = line.to_lowercase();
            if lower.contains("instagram.") {
                links.instagram = Some(line.to_string());
            } else if lower.contains("bandcamp.") {
                links.bandcamp = Some(line.to_string());
            } else if lower.contains("soundcloud.") {
                links.soundcloud = Some(line.to_string());
            }
        }
        links
    }
}

/// What an adapter reports for one station in one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub status: Status,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub subtitle: Option<String>,
    pub short_description: Option<String>,
    pub long_description: Option<String>,
    pub additional_info: Option<String>,
    pub show_logo_url: Option<String>,
    pub genres: Option<Vec<String>>,
    pub listener_count: Option<String>,
    pub social_links: Option<SocialLinks>,
    pub stream_url_override: Option<String>,
    pub location_override: Option<String>,
    pub one_liner: Option<String>,
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl NowPlaying {
    /// A blank on-air record carrying the station's fixed genres.
    pub fn for_station(station: &StationConfig) -> Self {
        Self {
            status: Status::Live,
            title: None,
            artist: None,
            subtitle: None,
            short_description: None,
            long_description: None,
            additional_info: None,
            show_logo_url: None,
            genres: station.genres.clone(),
            listener_count: None,
            social_links: None,
            stream_url_override: None,
            location_override: None,
            one_liner: None,
            last_updated_at: None,
        }
    }

    pub fn offline(station: &StationConfig) -> Self {
        Self {
            status: Status::Offline,
            ..Self::for_station(station)
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    /// Sets `status` from the title: on-air only when there is one.
    pub fn on_air_if_titled(mut self) -> Self {
        self.status = Status::from_on_air(self.title.is_some());
        self
    }

    pub fn set_descriptions(&mut self, (long, short): (Option<String>, Option<String>)) {
        self.long_description = long;
        self.short_description = short;
    }
}

/// A station as persisted in the snapshot and served over HTTP. Field order is
/// the serialized key order and must stay alphabetical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationRecord {
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub bandcamp_link: Option<String>,
    #[serde(default)]
    pub genres: Option<Vec<String>>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub hidden: bool,
    #[serde(default)]
    pub info_link: Option<String>,
    #[serde(default)]
    pub insta_link: Option<String>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub listeners: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub main_link: Option<String>,
    pub name: String,
    #[serde(default)]
    pub now_playing: Option<String>,
    #[serde(default)]
    pub now_playing_additional_info: Option<String>,
    #[serde(default)]
    pub now_playing_artist: Option<String>,
    #[serde(default)]
    pub now_playing_description: Option<String>,
    #[serde(default)]
    pub now_playing_description_long: Option<String>,
    #[serde(default)]
    pub now_playing_subtitle: Option<String>,
    #[serde(default)]
    pub one_liner: Option<String>,
    #[serde(default)]
    pub show_logo: Option<String>,
    #[serde(default)]
    pub soundcloud_link: Option<String>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub stream_link: Option<String>,
    #[serde(default)]
    pub support_link: Option<String>,
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

impl StationRecord {
    /// The record of a station that has never been polled successfully.
    pub fn initial(station: &StationConfig) -> Self {
        Self {
            about: station.about.clone(),
            bandcamp_link: station.bandcamp_link.clone(),
            genres: station.genres.clone(),
            hidden: station.hidden,
            info_link: station.info_link.clone(),
            insta_link: station.insta_link.clone(),
            last_updated: None,
            listeners: None,
            location: station.location.clone(),
            logo: Some(station.logo.clone()),
            main_link: station.main_link.clone(),
            name: station.name.clone(),
            now_playing: None,
            now_playing_additional_info: None,
            now_playing_artist: None,
            now_playing_description: None,
            now_playing_description_long: None,
            now_playing_subtitle: None,
            one_liner: None,
            show_logo: None,
            soundcloud_link: station.soundcloud_link.clone(),
            status: None,
            stream_link: station.stream_link.clone(),
            support_link: station.support_link.clone(),
        }
    }

    pub fn from_now_playing(station: &StationConfig, now: &NowPlaying) -> Self {
        let social = now.social_links.clone().unwrap_or_else(|| station.social_links());
        Self {
            bandcamp_link: social.bandcamp,
            genres: now.genres.clone(),
            insta_link: social.instagram,
            last_updated: now.last_updated_at,
            listeners: now.listener_count.clone(),
            location: now
                .location_override
                .clone()
                .or_else(|| station.location.clone()),
            now_playing: now.title.clone(),
            now_playing_additional_info: now.additional_info.clone(),
            now_playing_artist: now.artist.clone(),
            now_playing_description: now.short_description.clone(),
            now_playing_description_long: now.long_description.clone(),
            now_playing_subtitle: now.subtitle.clone(),
            one_liner: now.one_liner.clone(),
            show_logo: now.show_logo_url.clone(),
            soundcloud_link: social.soundcloud,
            status: Some(now.status),
            stream_link: now
                .stream_url_override
                .clone()
                .or_else(|| station.stream_link.clone()),
            ..Self::initial(station)
        }
    }

    /// Reads the dynamic part back. Values equal to the station defaults are
    /// reported as "no override".
    pub fn to_now_playing(&self, station: &StationConfig) -> NowPlaying {
        let social = SocialLinks {
            instagram: self.insta_link.clone(),
            bandcamp: self.bandcamp_link.clone(),
            soundcloud: self.soundcloud_link.clone(),
        };
        NowPlaying {
            status: self.status.unwrap_or(Status::Offline),
            title: self.now_playing.clone(),
            artist: self.now_playing_artist.clone(),
            subtitle: self.now_playing_subtitle.clone(),
            short_description: self.now_playing_description.clone(),
            long_description: self.now_playing_description_long.clone(),
            additional_info: self.now_playing_additional_info.clone(),
            show_logo_url: self.show_logo.clone(),
            genres: self.genres.clone(),
            listener_count: self.listeners.clone(),
            social_links: (social != station.social_links()).then_some(social),
            stream_url_override: self
                .stream_link
                .clone()
                .filter(|link| Some(link) != station.stream_link.as_ref()),
            location_override: self
                .location
                .clone()
                .filter(|location| Some(location) != station.location.as_ref()),
            one_liner: self.one_liner.clone(),
            last_updated_at: self.last_updated,
        }
    }
}
