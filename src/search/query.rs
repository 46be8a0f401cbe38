use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static VIDEO_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]{11}$").expect("valid video id regex"));

/// What a user-supplied search string refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    /// A single video, already resolved to its id
    VideoId(String),
    /// Free text for the search endpoint
    Keyword(String),
}

/// Whether `s` has the shape of a YouTube video id.
pub fn is_video_id(s: &str) -> bool {
    VIDEO_ID_RE.is_match(s)
}

/// Classifies a query as a direct video reference or a keyword search.
///
/// Accepts a bare 11-character id, any URL with a non-empty `v` query
/// parameter, and `youtu.be/<id>` short links. Everything else is a keyword.
///
/// # Example
///
/// ```
/// use tubefetch::search::query::{classify_query, QueryKind};
///
/// assert_eq!(
///     classify_query("https://youtu.be/dQw4w9WgXcQ"),
///     QueryKind::VideoId("dQw4w9WgXcQ".to_string())
/// );
/// assert_eq!(classify_query("lofi beats"), QueryKind::Keyword("lofi beats".to_string()));
/// ```
pub fn classify_query(query: &str) -> QueryKind {
    if is_video_id(query) {
        return QueryKind::VideoId(query.to_string());
    }

    if let Ok(url) = Url::parse(query) {
        if let Some((_, v)) = url.query_pairs().find(|(name, value)| name == "v" && !value.is_empty()) {
            return QueryKind::VideoId(v.into_owned());
        }

        if url.host_str().is_some_and(|host| host.contains("youtu.be")) {
            if let Some(id) = url.path_segments().and_then(|mut segments| segments.next()) {
                if !id.is_empty() {
                    return QueryKind::VideoId(id.to_string());
                }
            }
        }
    }

    QueryKind::Keyword(query.to_string())
}
