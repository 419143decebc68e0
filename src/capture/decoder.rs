//! Conversion of raw message streams into text

use std::io::{BufRead, BufReader, Read};

use encoding_rs::Encoding;
use tracing::{debug, error};

/// Number of trace lines the protocol engine writes ahead of the message.
pub const PREAMBLE_LINES: usize = 4;

/// Separator appended after every decoded line.
#[cfg(windows)]
pub const LINE_SEPARATOR: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_SEPARATOR: &str = "\n";

/// Streams bytes line by line, drops the preamble and decodes the rest.
#[derive(Debug, Clone, Copy)]
pub struct StreamDecoder {
    encoding: &'static Encoding,
    skip_lines: usize,
}

impl StreamDecoder {
    /// Create a decoder that skips [`PREAMBLE_LINES`] lines
    pub fn new(encoding: &'static Encoding) -> Self {
        Self {
            encoding,
            skip_lines: PREAMBLE_LINES,
        }
    }

    /// Override the number of leading lines to discard
    pub fn with_skip_lines(mut self, skip_lines: usize) -> Self {
        self.skip_lines = skip_lines;
        self
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn skip_lines(&self) -> usize {
        self.skip_lines
    }

    /// Decode `reader` into text.
    ///
    /// A line ends at LF, CRLF or a lone CR, and each kept line is followed by
    /// [`LINE_SEPARATOR`]. A read error stops decoding; whatever was decoded
    /// before the error is returned and the error is logged.
    pub fn decode<R: Read>(&self, reader: R) -> String {
        let mut reader = BufReader::new(reader);
        let mut text = String::new();
        let mut chunk = Vec::new();
        let mut line_no = 0usize;

        loop {
            chunk.clear();
            match reader.read_until(b'\n', &mut chunk) {
                Ok(0) => break,
                Ok(_) => {
                    for line in split_lines(&chunk) {
                        line_no += 1;
                        if line_no <= self.skip_lines {
                            continue;
                        }
                        self.push_line(&mut text, line, line_no);
                    }
                }
                Err(e) => {
                    error!(error = %e, lines_read = line_no, "could not convert the stream");
                    break;
                }
            }
        }

        text
    }

    fn push_line(&self, text: &mut String, line: &[u8], line_no: usize) {
        let (decoded, had_errors) = self.encoding.decode_without_bom_handling(line);
        if had_errors {
            debug!(
                line = line_no,
                charset = self.encoding.name(),
                "malformed sequence replaced while decoding"
            );
        }
        text.push_str(&decoded);
        text.push_str(LINE_SEPARATOR);
    }
}

/// Split one LF-terminated chunk into lines, treating every lone CR inside it
/// as a line break too
fn split_lines(chunk: &[u8]) -> impl Iterator<Item = &[u8]> {
    strip_line_ending(chunk).split(|&b| b == b'\r')
}

/// Drop a trailing LF, CRLF or CR
pub(crate) fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{SHIFT_JIS, UTF_8, WINDOWS_1252};
    use std::io::{self, Cursor};

    fn utf8() -> StreamDecoder {
        StreamDecoder::new(UTF_8)
    }

    fn joined(lines: &[&str]) -> String {
        lines.iter().map(|l| format!("{l}{LINE_SEPARATOR}")).collect()
    }

    /// Yields its data, then fails every subsequent read
    struct FailingReader {
        data: Cursor<Vec<u8>>,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.data.read(buf)?;
            if n == 0 {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
            }
            Ok(n)
        }
    }

    #[test]
    fn test_skips_preamble() {
        let raw = "r1\nr2\nr3\nr4\nSubject: Hi\n\nBody line\n";
        let text = utf8().decode(raw.as_bytes());
        assert_eq!(text, joined(&["Subject: Hi", "", "Body line"]));
    }

    #[test]
    fn test_crlf_is_normalized() {
        let raw = "r1\r\nr2\r\nr3\r\nr4\r\nFrom: a@b.com\r\nHello\r\n";
        let text = utf8().decode(raw.as_bytes());
        assert_eq!(text, joined(&["From: a@b.com", "Hello"]));
    }

    #[test]
    fn test_last_line_without_newline() {
        let raw = "r1\nr2\nr3\nr4\nonly line";
        assert_eq!(utf8().decode(raw.as_bytes()), joined(&["only line"]));
    }

    #[test]
    fn test_short_stream_is_empty() {
        assert_eq!(utf8().decode("r1\nr2\nr3\n".as_bytes()), "");
        assert_eq!(utf8().decode("r1\nr2\nr3\nr4\n".as_bytes()), "");
        assert_eq!(utf8().decode(io::empty()), "");
    }

    #[test]
    fn test_custom_skip_lines() {
        let decoder = utf8().with_skip_lines(0);
        assert_eq!(decoder.skip_lines(), 0);
        assert_eq!(decoder.decode("a\nb\n".as_bytes()), joined(&["a", "b"]));
    }

    #[test]
    fn test_configured_charset_is_used() {
        let (encoded, _, _) = SHIFT_JIS.encode("件名: テスト");
        let mut raw = b"r1\nr2\nr3\nr4\n".to_vec();
        raw.extend_from_slice(&encoded);
        raw.push(b'\n');

        let text = StreamDecoder::new(SHIFT_JIS).decode(raw.as_slice());
        assert_eq!(text, joined(&["件名: テスト"]));
    }

    #[test]
    fn test_latin1_bytes() {
        let raw = b"r1\nr2\nr3\nr4\ncaf\xe9\n";
        let text = StreamDecoder::new(WINDOWS_1252).decode(&raw[..]);
        assert_eq!(text, joined(&["café"]));
    }

    #[test]
    fn test_malformed_utf8_is_replaced() {
        let raw = b"r1\nr2\nr3\nr4\nbad \xff byte\n";
        let text = utf8().decode(&raw[..]);
        assert_eq!(text, joined(&["bad \u{FFFD} byte"]));
    }

    #[test]
    fn test_read_error_keeps_partial_content() {
        let reader = FailingReader {
            data: Cursor::new(b"r1\nr2\nr3\nr4\nfirst\nsecond\n".to_vec()),
        };
        let text = utf8().decode(reader);
        assert_eq!(text, joined(&["first", "second"]));
    }

    #[test]
    fn test_lone_cr_ends_a_line() {
        let raw = "r1\rr2\nr3\r\nr4\rSubject: Hello\rX-Other: y\r\r\nlast\r";
        let text = utf8().decode(raw.as_bytes());
        assert_eq!(text, joined(&["Subject: Hello", "X-Other: y", "", "last"]));
    }
}
