use std::{collections::HashSet, path::Path, sync::Arc};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::model::SocialLinks;

const BUILTIN_STATIONS: &str = include_str!("../stations.json");
const PUBLIC_SITE_HOST: &str = "internetradioprotocol.org";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read station registry {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse station registry: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate station name `{0}`")]
    Duplicate(String),
    #[error("station name cannot be blank")]
    BlankName,
}

/// Static description of one station, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationConfig {
    pub name: String,
    pub logo: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub info_link: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub stream_link: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub main_link: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub about: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub support_link: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub insta_link: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub bandcamp_link: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub soundcloud_link: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub genres: Option<Vec<String>>,
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|text| !text.trim().is_empty()))
}

impl StationConfig {
    pub fn social_links(&self) -> SocialLinks {
        SocialLinks {
            instagram: self.insta_link.clone(),
            bandcamp: self.bandcamp_link.clone(),
            soundcloud: self.soundcloud_link.clone(),
        }
    }
}

/// The ordered, validated station list.
#[derive(Debug, Clone)]
pub struct Registry {
    stations: Arc<[StationConfig]>,
}

impl Registry {
    pub fn builtin(logo_base_url: &str) -> Result<Self, RegistryError> {
        Self::from_json(BUILTIN_STATIONS, logo_base_url)
    }

    pub fn load(path: Option<&Path>, logo_base_url: &str) -> Result<Self, RegistryError> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_json(&raw, logo_base_url)
            }
            None => Self::builtin(logo_base_url),
        }
    }

    pub fn from_json(raw: &str, logo_base_url: &str) -> Result<Self, RegistryError> {
        let stations: Vec<StationConfig> = serde_json::from_str(raw)?;
        Self::new(stations, logo_base_url)
    }

    pub fn new(mut stations: Vec<StationConfig>, logo_base_url: &str) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for station in &mut stations {
            station.name = station.name.trim().to_string();
            if station.name.is_empty() {
                return Err(RegistryError::BlankName);
            }
            if !seen.insert(station.name.clone()) {
                return Err(RegistryError::Duplicate(station.name.clone()));
            }
            if !station.logo.contains(PUBLIC_SITE_HOST) {
                station.logo = join_logo(logo_base_url, &station.logo);
            }
        }
        Ok(Self {
            stations: stations.into(),
        })
    }

    pub fn stations(&self) -> &[StationConfig] {
        &self.stations
    }

    pub fn get(&self, name: &str) -> Option<&StationConfig> {
        self.stations.iter().find(|station| station.name == name)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

fn join_logo(base: &str, logo: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        logo.trim_start_matches('/')
    )
}
