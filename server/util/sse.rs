use std::io::{self, Write};

use serde::Serialize;

/// Raw HTTP head for an SSE stream, written straight to the socket after
/// `into_writer()`.
pub const SSE_HEAD: &str = "HTTP/1.1 200 OK\r\n\
                            Content-Type: text/event-stream\r\n\
                            Cache-Control: no-cache\r\n\
                            Connection: keep-alive\r\n\
                            X-Accel-Buffering: no\r\n\
                            \r\n";

/// Comment frame sent while no event is ready; clients ignore it.
pub const KEEP_ALIVE: &str = ": ping\n\n";

/// Formats an unnamed SSE message with a JSON data payload:
/// ```text
/// data: <json>\n
/// \n
/// ```
pub fn format_data<T: Serialize>(payload: &T) -> io::Result<String> {
    let json = serde_json::to_string(payload)?;
    Ok(format!("data: {}\n\n", json))
}

/// Writes all bytes to the writer and flushes, so each frame reaches the
/// client as soon as it is produced.
pub fn write_all<W: Write + ?Sized>(w: &mut W, data: &[u8]) -> io::Result<()> {
    w.write_all(data)?;
    w.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn frames_are_data_lines() {
        let frame = format_data(&json!({"status": "completed"})).unwrap();
        assert_eq!(frame, "data: {\"status\":\"completed\"}\n\n");
    }

    #[test]
    fn keep_alive_is_a_comment_frame() {
        assert!(KEEP_ALIVE.starts_with(':'));
        assert!(KEEP_ALIVE.ends_with("\n\n"));
    }

    #[test]
    fn head_ends_with_blank_line() {
        assert!(SSE_HEAD.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(SSE_HEAD.contains("Content-Type: text/event-stream\r\n"));
        assert!(SSE_HEAD.ends_with("\r\n\r\n"));
    }
}
