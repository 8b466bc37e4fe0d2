//! Per-station adapters. Every station in the registry maps to one
//! [`Adapter`] implementation through [`adapter_for`]; an adapter turns the
//! station's upstream payload into a [`NowPlaying`] record or fails as a whole.

mod airtime;
mod azuracast;
mod calendar;
mod campus;
mod evenings;
mod independent;
mod nts;
mod ocr;
mod radiocult;
mod rinse;
mod schedules;

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::{config::UpstreamConfig, model::NowPlaying, registry::StationConfig};

pub use airtime::{LiveInfo, LiveInfoV2};
pub use azuracast::{AzuraCast, ParticleFm};
pub use calendar::Calendar;
pub use campus::{Ckut, Kexp, Kusf, Wnyu};
pub use evenings::{DesirePath, Evenings};
pub use independent::{
    Bff, Bloop, InternetPublicRadio, KJazz, Lyl, Monotonic, Punctum, RadioAlhara, RadioRelativa,
    RadioVilnius, Refuge, Rukh, SomaFm, StaticOnAir, Stayfm, TitleOnly,
};
pub use nts::Nts;
pub use ocr::CaptionOcr;
pub use radiocult::RadioCult;
pub use rinse::Rinse;
pub use schedules::{Dublab, Kqed};

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("adapter did not finish within {0:?}")]
    Timeout(Duration),
    #[error("upstream request failed")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned {status}")]
    Status { status: StatusCode, url: String },
    #[error("upstream payload is not valid JSON")]
    Decode(#[from] serde_json::Error),
    #[error("unexpected payload shape: {0}")]
    Shape(String),
    #[error("station has no {0} configured")]
    MissingLink(&'static str),
    #[error("{0} is not configured")]
    Config(&'static str),
    #[error("{0}")]
    Process(String),
    #[error("i/o failure")]
    Io(#[from] std::io::Error),
    #[error("no adapter registered for this station")]
    Unsupported,
    #[error("adapter panicked: {0}")]
    Panicked(String),
}

/// How a failure is reported: only `Other` warrants a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    Timeout,
    Decode,
    Other,
}

impl AdapterError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AdapterError::Timeout(_) => ErrorClass::Timeout,
            AdapterError::Http(err) => {
                if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
                    ErrorClass::Timeout
                } else if err.is_decode() || err.is_status() {
                    ErrorClass::Decode
                } else {
                    ErrorClass::Other
                }
            }
            AdapterError::Status { .. } | AdapterError::Decode(_) => ErrorClass::Decode,
            AdapterError::Shape(_)
            | AdapterError::MissingLink(_)
            | AdapterError::Config(_)
            | AdapterError::Process(_)
            | AdapterError::Io(_)
            | AdapterError::Unsupported
            | AdapterError::Panicked(_) => ErrorClass::Other,
        }
    }

    pub(crate) fn shape(message: impl Into<String>) -> Self {
        AdapterError::Shape(message.into())
    }
}

#[async_trait]
pub trait Adapter: Send + Sync {
    /// Fetches and maps one station. `previous` is the last successful
    /// record, if any; most adapters ignore it.
    async fn fetch(
        &self,
        ctx: &FetchContext,
        station: &StationConfig,
        previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError>;
}

/// Everything an adapter may touch during one cycle.
#[derive(Clone)]
pub struct FetchContext {
    client: Client,
    upstream: Arc<UpstreamConfig>,
    now: DateTime<Utc>,
}

pub fn build_client(upstream: &UpstreamConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(upstream.user_agent.clone())
        .timeout(upstream.fetch_timeout())
        .connect_timeout(upstream.fetch_timeout())
        .build()
}

impl FetchContext {
    pub fn new(client: Client, upstream: Arc<UpstreamConfig>, now: DateTime<Utc>) -> Self {
        Self {
            client,
            upstream,
            now,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn upstream(&self) -> &UpstreamConfig {
        &self.upstream
    }

    pub async fn get_json(&self, url: &str) -> Result<Value, AdapterError> {
        let response = self.client.get(url).send().await?;
        decode_json(response).await
    }

    pub async fn get_json_with_query(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Value, AdapterError> {
        let response = self.client.get(url).query(query).send().await?;
        decode_json(response).await
    }

    pub async fn get_text(&self, url: &str) -> Result<String, AdapterError> {
        let response = self.client.get(url).send().await?;
        read_body(response).await
    }

    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<Value, AdapterError> {
        let response = self.client.post(url).form(form).send().await?;
        decode_json(response).await
    }

    pub async fn post_json(&self, url: &str, body: &Value) -> Result<Value, AdapterError> {
        let response = self.client.post(url).json(body).send().await?;
        decode_json(response).await
    }
}

async fn read_body(response: Response) -> Result<String, AdapterError> {
    let status = response.status();
    if !status.is_success() {
        return Err(AdapterError::Status {
            status,
            url: response.url().to_string(),
        });
    }
    Ok(response.text().await?)
}

async fn decode_json(response: Response) -> Result<Value, AdapterError> {
    let body = read_body(response).await?;
    Ok(serde_json::from_str(&body)?)
}

pub(crate) fn info_link(station: &StationConfig) -> Result<&str, AdapterError> {
    station
        .info_link
        .as_deref()
        .ok_or(AdapterError::MissingLink("infoLink"))
}

static ADAPTERS: Lazy<HashMap<&'static str, Arc<dyn Adapter>>> = Lazy::new(|| {
    use airtime::{V1Flavor, V2Flavor};

    fn entry<A: Adapter + 'static>(
        name: &'static str,
        adapter: A,
    ) -> (&'static str, Arc<dyn Adapter>) {
        (name, Arc::new(adapter))
    }

    let table = vec![
        entry("HydeFM", LiveInfoV2(V2Flavor::TitledOnly)),
        entry(
            "Voices Radio",
            LiveInfoV2(V2Flavor::HostSplit {
                title_at: " w/ ",
                artist_at: " w/ ",
            }),
        ),
        entry(
            "Do!!You!!! World",
            LiveInfoV2(V2Flavor::HostSplit {
                title_at: "w/",
                artist_at: " w/ ",
            }),
        ),
        entry("Kiosk Radio", LiveInfoV2(V2Flavor::WithTrack)),
        entry("Radio Raheem", LiveInfoV2(V2Flavor::CurrentShow)),
        entry("Stegi Radio", LiveInfoV2(V2Flavor::CurrentShow)),
        entry("Clyde Built Radio", LiveInfoV2(V2Flavor::CurrentShow)),
        entry("Radio Banda Larga", LiveInfoV2(V2Flavor::Uppercase)),
        entry("Subtle Radio", LiveInfoV2(V2Flavor::ShowAndTrack)),
        entry(
            "Shared Frequencies",
            LiveInfoV2(V2Flavor::TrackMetadata { require_title: true }),
        ),
        entry(
            "Pan African Space Station",
            LiveInfoV2(V2Flavor::TrackMetadata { require_title: false }),
        ),
        entry("Radio Sygma", LiveInfoV2(V2Flavor::CurrentTrack)),
        entry("Radio Quantica", LiveInfo(V1Flavor::Show)),
        entry("Radio 80000", LiveInfo(V1Flavor::TitledOnly)),
        entry("Veneno", LiveInfo(V1Flavor::AutoDjMarked)),
        entry("Skylab Radio", LiveInfo(V1Flavor::WithTrackAndArtwork)),
        entry("n10.as", LiveInfo(V1Flavor::WithNext)),
        entry("SutroFM", Evenings),
        entry("Lower Grand Radio", Evenings),
        entry("Vestiges", Evenings),
        entry("Desire Path Radio", DesirePath),
        entry("We Are Various", AzuraCast { title_field: "title" }),
        entry("KWSX", AzuraCast { title_field: "text" }),
        entry("Particle FM", ParticleFm),
        entry("Noods Radio", RadioCult::ContentTitle),
        entry("Oroko Radio", RadioCult::Metadata),
        entry("The Lot Radio", Calendar::Described),
        entry("Fault Radio", Calendar::OfflineBetweenEvents),
        entry("Radio Nopal", Calendar::SummaryOnly),
        entry("Rinse UK", Rinse { channel: "uk" }),
        entry("Rinse FR", Rinse { channel: "france" }),
        entry("SWU FM", Rinse { channel: "swu" }),
        entry("Kool FM", Rinse { channel: "kool" }),
        entry("NTS 1", Nts { channel: 0 }),
        entry("NTS 2", Nts { channel: 1 }),
        entry("Dublab", Dublab),
        entry("KQED", Kqed),
        entry("WNYU", Wnyu),
        entry("CKUT", Ckut),
        entry("KUSF", Kusf),
        entry("KEXP", Kexp),
        entry("Bloop Radio", Bloop),
        entry("Internet Public Radio", InternetPublicRadio),
        entry("KJazz", KJazz),
        entry("SomaFM Live", SomaFm),
        entry("SF 10-33", SomaFm),
        entry("LYL Radio", Lyl),
        entry("BFF.fm", Bff),
        entry("Radio Alhara", RadioAlhara),
        entry("Mutant Radio", TitleOnly),
        entry("Rukh Radio", Rukh),
        entry("Monotonic Radio", Monotonic),
        entry("Radio Punctum", Punctum),
        entry("stayfm", Stayfm),
        entry("Radio Relativa", RadioRelativa),
        entry("Radio Vilnius", RadioVilnius),
        entry("Refuge Worldwide", Refuge),
        entry("HKCR", CaptionOcr),
        entry("Radio Plato", StaticOnAir),
    ];
    table.into_iter().collect()
});

/// The adapter registered for a station name.
pub fn adapter_for(station_name: &str) -> Option<Arc<dyn Adapter>> {
    ADAPTERS.get(station_name).cloned()
}
