//! Reads the show caption burned into a video stream: grab one frame with
//! ffmpeg, crop to the caption band, and run tesseract over it.

use std::{path::Path, process::Stdio};

use async_trait::async_trait;
use tokio::process::Command;

use super::{Adapter, AdapterError, FetchContext};
use crate::{model::NowPlaying, registry::StationConfig, text::normalize_non_empty};

const CAPTION_FILTER: &str =
    "crop=in_w*0.45:in_h*0.038:in_w*0.037:in_h*0.035,eq=contrast=3.0,format=gray";
const CAPTION_PREFIXES: [&str; 2] = ["Live - ", "? - "];

pub struct CaptionOcr;

#[async_trait]
impl Adapter for CaptionOcr {
    async fn fetch(
        &self,
        ctx: &FetchContext,
        station: &StationConfig,
        _previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError> {
        let upstream = ctx.upstream();
        let stream = station
            .stream_link
            .as_deref()
            .ok_or(AdapterError::MissingLink("streamLink"))?;
        let frame = tempfile::Builder::new()
            .prefix("caption-")
            .suffix(".jpg")
            .tempfile()?;

        grab_frame(&upstream.ffmpeg_bin, stream, frame.path()).await?;
        let caption = read_text(&upstream.tesseract_bin, frame.path()).await?;

        Ok(NowPlaying::for_station(station).with_title(clean_caption(&caption)))
    }
}

async fn grab_frame(ffmpeg: &str, stream: &str, target: &Path) -> Result<(), AdapterError> {
    let status = Command::new(ffmpeg)
        .args(["-hide_banner", "-y", "-i", stream, "-frames:v", "1", "-vf", CAPTION_FILTER])
        .arg(target)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .map_err(|err| AdapterError::Process(format!("failed to start {ffmpeg}: {err}")))?;
    if !status.success() {
        return Err(AdapterError::Process(format!(
            "{ffmpeg} exited with {status}"
        )));
    }
    Ok(())
}

async fn read_text(tesseract: &str, image: &Path) -> Result<String, AdapterError> {
    let output = Command::new(tesseract)
        .arg(image)
        .arg("stdout")
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|err| AdapterError::Process(format!("failed to start {tesseract}: {err}")))?;
    if !output.status.success() {
        return Err(AdapterError::Process(format!(
            "{tesseract} exited with {}",
            output.status
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// OCR output framed by stray dashes, quotes and colons, sometimes led by a
/// `Live - ` badge.
pub(crate) fn clean_caption(raw: &str) -> Option<String> {
    let mut caption = raw
        .trim()
        .trim_matches('-')
        .trim_matches('\'')
        .trim_matches(':')
        .trim();
    for prefix in CAPTION_PREFIXES {
        if let Some(rest) = caption.strip_prefix(prefix) {
            caption = rest;
        }
    }
    normalize_non_empty(caption)
}
