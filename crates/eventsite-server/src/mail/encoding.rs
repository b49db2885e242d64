//! Wire encodings for outgoing mail

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// SASL PLAIN initial response: `\0user\0password`, base64 encoded
pub fn sasl_plain(user: &str, password: &str) -> String {
    let mut raw = Vec::with_capacity(user.len() + password.len() + 2);
    raw.push(0);
    raw.extend_from_slice(user.as_bytes());
    raw.push(0);
    raw.extend_from_slice(password.as_bytes());
    STANDARD.encode(raw)
}

/// Header value safe for the wire
///
/// Printable ASCII passes through; anything else becomes an RFC 2047
/// encoded word. Line breaks are never passed through.
pub fn header_value(value: &str) -> String {
    let value: String = value.chars().map(|c| if c.is_control() { ' ' } else { c }).collect();
    if value.is_ascii() {
        value
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

/// Normalize line endings to CRLF and dot-stuff lines for the DATA phase
pub fn dot_stuff(body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 16);
    for (i, line) in body.split('\n').enumerate() {
        if i > 0 {
            out.push_str("\r\n");
        }
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.starts_with('.') {
            out.push('.');
        }
        out.push_str(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sasl_plain() {
        assert_eq!(sasl_plain("user", "pass"), "AHVzZXIAcGFzcw==");
    }

    #[test]
    fn test_header_value() {
        assert_eq!(header_value("New Contact Form Submission from Ada"), "New Contact Form Submission from Ada");
        assert_eq!(header_value("Jürgen"), "=?UTF-8?B?SsO8cmdlbg==?=");
        assert_eq!(header_value("a\r\nBcc: x@example.org"), "a  Bcc: x@example.org");
    }

    #[test]
    fn test_dot_stuff() {
        assert_eq!(dot_stuff("a\n.b\r\n..c\nd"), "a\r\n..b\r\n...c\r\nd");
        assert_eq!(dot_stuff(".\n"), "..\r\n");
    }
}
