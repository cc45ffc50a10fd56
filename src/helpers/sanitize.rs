/// Characters stripped from names before they touch the filesystem.
///
/// Note that `.` is in the set, so sanitizing a full filename also removes
/// the extension separator. Callers that need an extension split it off
/// first and re-attach it afterwards.
const ILLEGAL: &[char] = &[':', '<', '>', '*', '"', '|', '/', '?', '.'];

/// Strips filesystem-illegal characters from a name. Idempotent.
pub fn sanitize(name: &str) -> String {
    name.chars().filter(|c| !ILLEGAL.contains(c)).collect()
}

/// Sanitizes a filename while preserving its extension.
///
/// The stem is sanitized, then the (lowercased, alphanumeric) extension is
/// re-attached. A name without a recognizable extension is sanitized whole.
pub fn sanitize_filename(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty() && !ext.is_empty() && ext.chars().all(char::is_alphanumeric) =>
        {
            format!("{}.{}", sanitize(stem), ext)
        }
        _ => sanitize(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_exactly_the_illegal_set() {
        assert_eq!(sanitize(r#"a:b<c>d*e"f|g/h?i.j"#), "abcdefghij");
    }

    #[test]
    fn keeps_everything_else() {
        assert_eq!(sanitize("Never Gonna Give You Up (2009) [MSC]"), "Never Gonna Give You Up (2009) [MSC]");
        assert_eq!(sanitize("ÿéàl chäos"), "ÿéàl chäos");
    }

    #[test]
    fn idempotent() {
        let once = sanitize("What: The? Song.");
        assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn filename_keeps_extension() {
        assert_eq!(sanitize_filename("x.zip"), "x.zip");
        assert_eq!(sanitize_filename("Song: Name?.rar"), "Song Name.rar");
    }

    #[test]
    fn filename_without_extension_is_sanitized_whole() {
        assert_eq!(sanitize_filename("notes/readme"), "notesreadme");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
    }
}
