use async_trait::async_trait;
use serde_json::Value;

use super::{info_link, Adapter, AdapterError, FetchContext};
use crate::{
    extract::extract,
    model::{NowPlaying, SocialLinks},
    path,
    registry::StationConfig,
};

const HOME_CITY: &str = "London";

/// NTS `api/v2/live`, one entry in `results` per channel.
pub struct Nts {
    pub channel: usize,
}

#[async_trait]
impl Adapter for Nts {
    async fn fetch(
        &self,
        ctx: &FetchContext,
        station: &StationConfig,
        _previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError> {
        let doc = ctx.get_json(info_link(station)?).await?;
        parse(self.channel, station, &doc)
    }
}

pub(crate) fn parse(
    channel: usize,
    station: &StationConfig,
    doc: &Value,
) -> Result<NowPlaying, AdapterError> {
    let now = extract(doc, path!["results", channel, "now"])
        .value()
        .ok_or_else(|| {
            AdapterError::shape(format!("no live entry for channel {}", channel + 1))
        })?;
    let details = |field: &'static str| extract(now, path!["embeds", "details", field]);

    let mut record = NowPlaying::for_station(station);
    record.title = extract(now, path!["broadcast_title"]).text();
    record.location_override = Some(
        details("location_long")
            .text()
            .unwrap_or_else(|| HOME_CITY.to_string()),
    );
    record.show_logo_url =
        extract(now, path!["embeds", "details", "media", "background_large"]).text();
    record.long_description = details("description").text();
    record.short_description = details("description").shorten();
    record.subtitle = details("moods").join(path!["value"]);
    record.genres = details("genres").collect(path!["value"]);

    let links = details("external_links").collect(&[]).unwrap_or_default();
    record.social_links = Some(SocialLinks::from_mentions(links));
    Ok(record)
}
