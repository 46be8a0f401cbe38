/// Longest file stem we hand to yt-dlp; keeps `<stem>.<ext>` well under
/// the 255-byte limit of common filesystems.
const MAX_STEM_LEN: usize = 150;

/// Turns a video title into a deterministic, filesystem-safe file stem.
///
/// Keeps ASCII letters, digits, `_`, `-` and spaces; every other character
/// becomes `_`. The result is trimmed and capped in length. The same title
/// always yields the same stem, which is what lets the download coordinator
/// reuse a previous download.
///
/// # Example
///
/// ```
/// use tubefetch::core::utils::sanitize_title;
///
/// assert_eq!(sanitize_title("AC/DC: Thunderstruck!"), "AC_DC_ Thunderstruck_");
/// ```
pub fn sanitize_title(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STEM_LEN)
        .collect();

    let trimmed = replaced.trim();
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Filename offered to HTTP clients in `Content-Disposition`.
///
/// Only `[A-Za-z0-9.-]` survive, everything else becomes `_`.
pub fn attachment_filename(file_name: &str) -> String {
    file_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}
