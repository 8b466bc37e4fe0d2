use crate::model::NowPlaying;

const SEPARATOR: &str = " - ";
const MAX_CHARS: usize = 100;

/// Title, artist, subtitle and additional info joined with `" - "`, uncut.
pub fn join_parts(record: &NowPlaying) -> String {
    let parts = [
        record.title.as_deref(),
        record.artist.as_deref(),
        record.subtitle.as_deref(),
        record.additional_info.as_deref(),
    ];
    let mut line = parts
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(SEPARATOR);

    while line.contains(" - - ") {
        line = line.replace(" - - ", SEPARATOR);
    }
    line
}

/// [`join_parts`], cut past 100 chars.
pub fn compose(record: &NowPlaying) -> String {
    let line = join_parts(record);
    if line.chars().count() > MAX_CHARS {
        let cut: String = line.chars().take(MAX_CHARS).collect();
        format!("{cut}...")
    } else {
        line
    }
}
