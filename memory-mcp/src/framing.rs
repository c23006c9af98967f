//! stdio message framing for the MCP server binary.
//!
//! Supports both line-delimited JSON and LSP-style `Content-Length` framing,
//! replying in whichever framing the caller used, matching the dual-framing
//! dispatch loop MCP clients in the wild actually speak.

use std::io::{self, BufRead, Read, Write};

/// Read the next JSON message from `reader`. Returns `(body, was_content_length_framed)`,
/// or `None` on EOF. Blank lines and non-JSON, non-header lines (e.g. stray log
/// output on stdout) are skipped rather than treated as errors.
pub fn read_next_message<R: BufRead + Read>(reader: &mut R) -> io::Result<Option<(String, bool)>> {
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            return Ok(None);
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed.starts_with('{') {
            return Ok(Some((trimmed.to_string(), false)));
        }

        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("content-length:") {
            let len: usize = trimmed
                .splitn(2, ':')
                .nth(1)
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(0);

            loop {
                let mut header_line = String::new();
                let header_n = reader.read_line(&mut header_line)?;
                if header_n == 0 || header_line.trim().is_empty() {
                    break;
                }
            }

            if len == 0 {
                continue;
            }
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf)?;
            return Ok(Some((String::from_utf8_lossy(&buf).to_string(), true)));
        }

        continue;
    }
}

/// Write `body` framed with a `Content-Length` header, LSP-style.
pub fn write_content_length<W: Write>(writer: &mut W, body: &str) -> io::Result<()> {
    let bytes = body.as_bytes();
    write!(writer, "Content-Length: {}\r\n\r\n", bytes.len())?;
    writer.write_all(bytes)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Write `body` as a single line of JSON.
pub fn write_line<W: Write>(writer: &mut W, body: &str) -> io::Result<()> {
    writeln!(writer, "{body}")?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_bare_json_line() {
        let mut cursor = Cursor::new(b"{\"method\":\"list_projects\"}\n".to_vec());
        let (msg, is_lsp) = read_next_message(&mut cursor).unwrap().unwrap();
        assert_eq!(msg, "{\"method\":\"list_projects\"}");
        assert!(!is_lsp);
    }

    #[test]
    fn reads_content_length_framed_message() {
        let body = "{\"method\":\"list_projects\"}";
        let mut input = format!("Content-Length: {}\r\n\r\n{}", body.len(), body).into_bytes();
        input.push(b'\n');
        let mut cursor = Cursor::new(input);
        let (msg, is_lsp) = read_next_message(&mut cursor).unwrap().unwrap();
        assert_eq!(msg, body);
        assert!(is_lsp);
    }

    #[test]
    fn skips_blank_and_garbage_lines_before_json() {
        let mut cursor = Cursor::new(b"\nnot json\n{\"method\":\"list_projects\"}\n".to_vec());
        let (msg, _) = read_next_message(&mut cursor).unwrap().unwrap();
        assert_eq!(msg, "{\"method\":\"list_projects\"}");
    }

    #[test]
    fn returns_none_at_eof() {
        let mut cursor = Cursor::new(Vec::new());
        assert!(read_next_message(&mut cursor).unwrap().is_none());
    }
}
