//! Contact form notifications

use crate::mail::EmailService;
use crate::store::ContactRequest;
use std::fmt::Write;
use std::sync::Arc;

const ACCENT: &str = "#00d3f3";

/// `&`, `<`, `>` and `"` as entities
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

pub fn subject(request: &ContactRequest) -> String {
    format!("New Contact Form Submission from {}", request.name)
}

/// HTML body of the notification mail
pub fn render(request: &ContactRequest) -> String {
    let name = escape(&request.name);
    let email = escape(&request.email);
    let message = escape(&request.message).replace("\r\n", "\n").replace('\n', "<br>");
    let submitted = request.created_at.format("%B %-d, %Y at %-I:%M %p UTC");

    let phone = present(&request.phone)
        .map(|phone| {
            let phone = escape(phone);
            format!(
                r#"<p style="margin: 10px 0;"><strong>Phone:</strong> <a href="tel:{phone}" style="color: {ACCENT}; text-decoration: none;">{phone}</a></p>"#
            )
        })
        .unwrap_or_default();

    let mut origin = String::new();
    if let Some(ip) = present(&request.ip_address) {
        let _ = write!(origin, "<p><strong>IP Address:</strong> {}</p>", escape(ip));
    }
    if let Some(agent) = present(&request.user_agent) {
        let _ = write!(origin, "<p><strong>User Agent:</strong> {}</p>", escape(agent));
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; margin: 0; padding: 20px; background-color: #f9f9f9;">
  <div style="max-width: 600px; margin: 0 auto; background-color: #ffffff; padding: 30px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1);">
    <h2 style="color: {ACCENT}; margin-top: 0; margin-bottom: 20px; font-size: 24px;">New Contact Form Submission</h2>
    <div style="background-color: #f5f5f5; padding: 20px; border-radius: 5px; margin: 20px 0;">
      <p style="margin: 10px 0;"><strong>Name:</strong> {name}</p>
      <p style="margin: 10px 0;"><strong>Email:</strong> <a href="mailto:{email}" style="color: {ACCENT}; text-decoration: none;">{email}</a></p>
      {phone}
      <p style="margin: 10px 0;"><strong>Message:</strong></p>
      <div style="background-color: white; padding: 15px; border-left: 3px solid {ACCENT}; margin: 10px 0; border-radius: 3px;">
        {message}
      </div>
    </div>
    <div style="margin-top: 20px; padding-top: 20px; border-top: 1px solid #ddd; font-size: 12px; color: #666;">
      <p style="margin: 5px 0;"><strong>Submitted:</strong> {submitted}</p>
      {origin}
    </div>
  </div>
</body>
</html>"#
    )
}

/// Send the notification for a stored request in the background
///
/// Returns immediately. Delivery failures are logged; an unconfigured
/// relay skips quietly.
pub fn spawn_notification(email: Arc<EmailService>, request: ContactRequest) {
    if !email.is_configured() {
        tracing::debug!(id = request.id, "smtp not configured, skipping notification");
        return;
    }

    tokio::spawn(async move {
        let subject = subject(&request);
        let html = render(&request);
        if let Err(e) = email.send_notification(&subject, &html).await {
            tracing::error!(id = request.id, error = %e, "failed to send notification email");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn request() -> ContactRequest {
        ContactRequest {
            id: 7,
            name: "Ada <Lovelace>".to_string(),
            email: "ada@example.org".to_string(),
            phone: Some("+49 2941 123".to_string()),
            message: "Hallo & willkommen\nZeile <zwei>".to_string(),
            ip_address: Some("203.0.113.7".to_string()),
            user_agent: None,
            metadata: Default::default(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 9, 15, 4, 0).unwrap(),
        }
    }

    #[test]
    fn test_subject() {
        assert_eq!(subject(&request()), "New Contact Form Submission from Ada <Lovelace>");
    }

    #[test]
    fn test_render_escapes_and_breaks_lines() {
        let html = render(&request());
        assert!(html.contains("Hallo &amp; willkommen<br>Zeile &lt;zwei&gt;"));
        assert!(html.contains("<strong>Name:</strong> Ada &lt;Lovelace&gt;"));
        assert!(html.contains(r#"href="mailto:ada@example.org""#));
    }

    #[test]
    fn test_render_optional_fields() {
        let html = render(&request());
        assert!(html.contains(r#"href="tel:+49 2941 123""#));
        assert!(html.contains("<strong>IP Address:</strong> 203.0.113.7"));
        assert!(!html.contains("User Agent"));

        let mut bare = request();
        bare.phone = Some(String::new());
        bare.ip_address = None;
        let html = render(&bare);
        assert!(!html.contains("tel:"));
        assert!(!html.contains("IP Address"));
    }

    #[test]
    fn test_render_time_format() {
        let html = render(&request());
        assert!(html.contains("<strong>Submitted:</strong> March 9, 2025 at 3:04 PM UTC"));
    }
}
