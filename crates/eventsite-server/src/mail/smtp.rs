//! Minimal SMTP submission client
//!
//! One message per connection: EHLO, optional STARTTLS, optional
//! AUTH PLAIN, MAIL/RCPT/DATA, QUIT.

use super::encoding::{dot_stuff, sasl_plain};
use super::MailError;
use rustls::pki_types::ServerName;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

const CLIENT_NAME: &str = "localhost";
const TIMEOUT: Duration = Duration::from_secs(30);

/// Where and how to deliver
#[derive(Debug, Clone)]
pub struct Relay {
    pub host: String,
    pub port: u16,
    /// User and password for AUTH PLAIN
    pub credentials: Option<(String, String)>,
}

impl Relay {
    /// MailHog and similar local catchers speak plain SMTP without auth
    pub fn is_local_catcher(&self) -> bool {
        self.port == 1025 || self.host == "mailhog"
    }

    fn is_localhost(&self) -> bool {
        matches!(self.host.as_str(), "localhost" | "127.0.0.1" | "::1")
    }
}

/// A message ready for the DATA phase
#[derive(Debug, Clone)]
pub struct Envelope {
    pub from: String,
    pub recipients: Vec<String>,
    /// Headers and body, LF or CRLF line endings
    pub content: String,
}

#[derive(Debug)]
struct Reply {
    code: u16,
    lines: Vec<String>,
}

impl Reply {
    fn text(&self) -> String {
        self.lines.join(" ")
    }

    fn has_extension(&self, name: &str) -> bool {
        self.lines
            .iter()
            .skip(1)
            .any(|l| l.split_whitespace().next().is_some_and(|kw| kw.eq_ignore_ascii_case(name)))
    }
}

async fn read_reply<S>(stream: &mut BufStream<S>) -> Result<Reply, MailError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut lines = Vec::new();
    loop {
        let mut line = String::new();
        if stream.read_line(&mut line).await? == 0 {
            return Err(MailError::Protocol("connection closed by server".to_string()));
        }
        let line = line.trim_end_matches(['\r', '\n']);
        let code = line
            .get(..3)
            .and_then(|c| c.parse::<u16>().ok())
            .ok_or_else(|| MailError::Protocol(format!("malformed reply: {line:?}")))?;
        let last = line.as_bytes().get(3) != Some(&b'-');
        lines.push(line.get(4..).unwrap_or("").to_string());
        if last {
            return Ok(Reply { code, lines });
        }
    }
}

async fn expect<S>(stream: &mut BufStream<S>, step: &'static str, accept: &[u16]) -> Result<Reply, MailError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let reply = read_reply(stream).await?;
    if accept.contains(&reply.code) {
        Ok(reply)
    } else {
        Err(MailError::Rejected {
            step,
            code: reply.code,
            message: reply.text(),
        })
    }
}

async fn command<S>(
    stream: &mut BufStream<S>,
    line: &str,
    step: &'static str,
    accept: &[u16],
) -> Result<Reply, MailError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(line.as_bytes()).await?;
    stream.write_all(b"\r\n").await?;
    stream.flush().await?;
    expect(stream, step, accept).await
}

fn tls_connector() -> Result<TlsConnector, MailError> {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| MailError::Tls(e.to_string()))?
    .with_root_certificates(roots)
    .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Deliver one message
pub async fn send(relay: &Relay, envelope: &Envelope) -> Result<(), MailError> {
    tokio::time::timeout(TIMEOUT, deliver(relay, envelope))
        .await
        .map_err(|_| MailError::Timeout)?
}

async fn deliver(relay: &Relay, envelope: &Envelope) -> Result<(), MailError> {
    let tcp = TcpStream::connect((relay.host.as_str(), relay.port)).await?;
    let mut plain = BufStream::new(tcp);

    expect(&mut plain, "greeting", &[220]).await?;
    let ehlo = command(&mut plain, &format!("EHLO {CLIENT_NAME}"), "EHLO", &[250]).await?;

    if relay.is_local_catcher() || !ehlo.has_extension("STARTTLS") {
        return transact(&mut plain, relay, envelope, false).await;
    }

    command(&mut plain, "STARTTLS", "STARTTLS", &[220]).await?;
    let server_name = ServerName::try_from(relay.host.clone())
        .map_err(|e| MailError::Tls(format!("invalid server name {}: {e}", relay.host)))?;
    let tls = tls_connector()?
        .connect(server_name, plain.into_inner())
        .await
        .map_err(|e| MailError::Tls(e.to_string()))?;

    let mut secure = BufStream::new(tls);
    command(&mut secure, &format!("EHLO {CLIENT_NAME}"), "EHLO", &[250]).await?;
    transact(&mut secure, relay, envelope, true).await
}

async fn transact<S>(
    stream: &mut BufStream<S>,
    relay: &Relay,
    envelope: &Envelope,
    encrypted: bool,
) -> Result<(), MailError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Some((user, password)) = &relay.credentials {
        if !relay.is_local_catcher() {
            // Never send a password in the clear to a remote host
            if !encrypted && !relay.is_localhost() {
                return Err(MailError::InsecureAuth);
            }
            let auth = format!("AUTH PLAIN {}", sasl_plain(user, password));
            command(stream, &auth, "AUTH", &[235]).await?;
        }
    }

    command(stream, &format!("MAIL FROM:<{}>", envelope.from), "MAIL FROM", &[250]).await?;
    for recipient in &envelope.recipients {
        command(stream, &format!("RCPT TO:<{recipient}>"), "RCPT TO", &[250, 251]).await?;
    }

    command(stream, "DATA", "DATA", &[354]).await?;
    stream.write_all(dot_stuff(&envelope.content).as_bytes()).await?;
    command(stream, "\r\n.", "message", &[250]).await?;

    // The message is accepted at this point
    if let Err(e) = command(stream, "QUIT", "QUIT", &[221]).await {
        tracing::debug!(error = %e, "smtp QUIT failed");
    }
    Ok(())
}
