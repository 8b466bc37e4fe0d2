use std::{io, path::Path};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::snapshot::Snapshot;

const DATA_START: &str = "<!-- STATION_DATA_START -->";
const DATA_END: &str = "<!-- STATION_DATA_END -->";
const HEAD_CLOSE: &str = "</head>";

static INJECTED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<!-- STATION_DATA_START -->.*?<!-- STATION_DATA_END -->")
        .expect("valid station data regex")
});

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to access page {path}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode station data")]
    Encode(#[from] serde_json::Error),
    #[error("page {0} has no </head>")]
    NoHead(String),
}

/// Swaps the station data block in `html` for a fresh one placed right
/// before `</head>`.
pub fn inject(html: &str, snapshot: &Snapshot) -> Result<Option<String>, serde_json::Error> {
    let stripped = INJECTED_BLOCK.replace_all(html, "");
    let Some(head) = stripped.find(HEAD_CLOSE) else {
        return Ok(None);
    };
    // `</` inside a script body would end it early.
    let data = serde_json::to_string(snapshot)?.replace("</", "<\\/");
    let mut page = String::with_capacity(stripped.len() + data.len() + 128);
    page.push_str(&stripped[..head]);
    page.push_str(DATA_START);
    page.push_str("<script>window.STATION_DATA = ");
    page.push_str(&data);
    page.push_str(";</script>");
    page.push_str(DATA_END);
    page.push_str(&stripped[head..]);
    Ok(Some(page))
}

/// Rewrites the page at `path` in place.
pub async fn render_page(path: &Path, snapshot: &Snapshot) -> Result<(), RenderError> {
    let io_error = |source| RenderError::Io {
        path: path.display().to_string(),
        source,
    };
    let html = tokio::fs::read_to_string(path).await.map_err(io_error)?;
    let page =
        inject(&html, snapshot)?.ok_or_else(|| RenderError::NoHead(path.display().to_string()))?;
    tokio::fs::write(path, page).await.map_err(io_error)
}
