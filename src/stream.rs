//! Incremental line splitting for streaming response bodies.
//!
//! Both wire formats this crate speaks (the `data: `-prefixed SSE lines of
//! the DeepSeek API and Ollama's newline-delimited JSON) are line protocols,
//! but network chunks land with arbitrary boundaries. `LineBuffer` turns a
//! sequence of byte chunks into a sequence of complete lines, carrying the
//! trailing partial line across chunks so a line split mid-way is never
//! dropped.

/// Accumulates raw bytes and yields complete newline-terminated lines.
///
/// Lines are returned without the trailing `\n` (a `\r` before it is also
/// stripped). Bytes after the last newline stay buffered until the next
/// `push` or the final `finish`.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk; returns every line completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(pos) = memchr(b'\n', &self.buf) {
            let mut line = self.buf.drain(..=pos).collect::<Vec<u8>>();
            line.pop();
            if line.ends_with(b"\r") {
                line.pop();
            }
            out.push(String::from_utf8_lossy(&line).into_owned());
        }

        out
    }

    /// Flush the trailing unterminated line, if any, at end of stream.
    pub fn finish(self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        Some(String::from_utf8_lossy(&self.buf).into_owned())
    }
}

fn memchr(needle: u8, haystack: &[u8]) -> Option<usize> {
    haystack.iter().position(|&b| b == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(chunks: &[&str]) -> Vec<String> {
        let mut buf = LineBuffer::new();
        let mut lines = Vec::new();
        for c in chunks {
            lines.extend(buf.push(c.as_bytes()));
        }
        lines.extend(buf.finish());
        lines
    }

    #[test]
    fn whole_body_in_one_chunk() {
        assert_eq!(collect(&["a\nb\nc\n"]), vec!["a", "b", "c"]);
    }

    #[test]
    fn byte_by_byte_delivery() {
        let body = "alpha\nbeta\n";
        let chunks: Vec<String> = body.chars().map(|c| c.to_string()).collect();
        let refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
        assert_eq!(collect(&refs), vec!["alpha", "beta"]);
    }

    #[test]
    fn split_exactly_at_newline_boundary() {
        assert_eq!(collect(&["first\n", "second\n"]), vec!["first", "second"]);
    }

    #[test]
    fn split_mid_line_is_not_dropped() {
        assert_eq!(collect(&["hel", "lo\nwor", "ld\n"]), vec!["hello", "world"]);
    }

    #[test]
    fn crlf_is_stripped() {
        assert_eq!(collect(&["one\r\ntwo\r\n"]), vec!["one", "two"]);
    }

    #[test]
    fn trailing_line_without_newline_is_flushed() {
        assert_eq!(collect(&["a\nb"]), vec!["a", "b"]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(collect(&[""]).is_empty());
        assert!(LineBuffer::new().finish().is_none());
    }

    #[test]
    fn blank_lines_are_preserved_for_the_caller_to_skip() {
        assert_eq!(collect(&["a\n\nb\n"]), vec!["a", "", "b"]);
    }

    #[test]
    fn multibyte_utf8_split_across_chunks() {
        let body = "héllo\n".as_bytes();
        let mut buf = LineBuffer::new();
        let mut lines = Vec::new();
        for b in body {
            lines.extend(buf.push(&[*b]));
        }
        assert_eq!(lines, vec!["héllo"]);
    }
}
