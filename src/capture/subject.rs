//! Subject header lookup

use std::sync::LazyLock;

use regex::Regex;

static SUBJECT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Subject: (.*)$").expect("subject pattern is valid")
});

/// Return the value of the first line that is exactly `Subject: <value>`.
///
/// Lines end at LF, CRLF or a lone CR. The header name is matched
/// case-sensitively and the value is returned verbatim, without decoding
/// encoded words. Returns an empty string when no line matches.
pub fn extract(text: &str) -> String {
    text.split(['\n', '\r'])
        .find_map(|line| SUBJECT_PATTERN.captures(line))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
        .unwrap_or_default()
}
