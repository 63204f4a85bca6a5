//! POP3 status lines and multi-line framing.

use std::fmt;

/// End of a multi-line response.
pub const TERMINATOR: &[u8] = b".\r\n";

/// A single-line status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `+OK`
    Ok(String),
    /// `-ERR`
    Err(String),
}

impl Response {
    /// Creates a positive response.
    #[must_use]
    pub fn ok(text: impl Into<String>) -> Self {
        Self::Ok(text.into())
    }

    /// Creates a negative response.
    #[must_use]
    pub fn err(text: impl Into<String>) -> Self {
        Self::Err(text.into())
    }

    /// Returns true for `+OK`.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Returns the text after the status indicator.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Ok(text) | Self::Err(text) => text,
        }
    }

    /// Serializes the response, CRLF included.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_ok() { "+OK" } else { "-ERR" };
        let text = self.text();
        if text.is_empty() {
            write!(f, "{status}\r\n")
        } else {
            write!(f, "{status} {text}\r\n")
        }
    }
}

/// Appends one line of a multi-line body to `out`.
///
/// The line's own terminator is replaced by CRLF and a leading `.` is
/// doubled so the client cannot mistake it for the terminator.
pub fn push_body_line(out: &mut Vec<u8>, line: &[u8]) {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    if line.first() == Some(&b'.') {
        out.push(b'.');
    }
    out.extend_from_slice(line);
    out.extend_from_slice(b"\r\n");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Response::ok("2 320").to_string(), "+OK 2 320\r\n");
        assert_eq!(Response::err("no such message").to_string(), "-ERR no such message\r\n");
        assert_eq!(Response::ok("").to_string(), "+OK\r\n");
    }

    #[test]
    fn test_push_body_line_normalizes_terminator() {
        let mut out = Vec::new();
        push_body_line(&mut out, b"unix\n");
        push_body_line(&mut out, b"dos\r\n");
        push_body_line(&mut out, b"tail");
        assert_eq!(out, b"unix\r\ndos\r\ntail\r\n");
    }

    #[test]
    fn test_push_body_line_stuffs_dots() {
        let mut out = Vec::new();
        push_body_line(&mut out, b".\n");
        push_body_line(&mut out, b"..hidden\r\n");
        push_body_line(&mut out, b"not.leading\n");
        assert_eq!(out, b"..\r\n...hidden\r\nnot.leading\r\n");
    }
}
