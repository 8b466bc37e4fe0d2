use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));
static SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").expect("valid spaces regex"));

const REPLACEMENTS: &[(&str, &str)] = &[
    ("\u{a0}", " "),
    ("\n", " "),
    ("&#039;", "'"),
    ("\u{2019}", "'"),
    ("\u{2013}", "-"),
    ("\u{201c}", "'"),
    ("\u{201d}", "'"),
    ("\"", "'"),
];

/// Strips markup and folds the punctuation upstream CMSes like to emit into
/// plain ASCII-ish text. `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(raw: &str) -> String {
    let mut text = TAG_RE.replace_all(raw, "").replace('\r', "");
    while text.contains("&amp;") {
        text = text.replace("&amp;", "&");
    }
    for (from, to) in REPLACEMENTS {
        if text.contains(from) {
            text = text.replace(from, to);
        }
    }
    let collapsed = SPACES_RE.replace_all(&text, " ");
    collapsed.trim().to_string()
}

/// Normalizes and drops the value when nothing is left.
pub fn normalize_non_empty(raw: &str) -> Option<String> {
    let text = normalize(raw);
    (!text.is_empty()).then_some(text)
}
