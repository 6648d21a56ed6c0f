//! IMAP mail source — raw IMAP over TLS, one short session per fetch.
//!
//! Session: greeting → LOGIN → SELECT → SEARCH (sender, subject, date
//! window) → FETCH RFC822 per id → LOGOUT. LOGOUT is sent whatever happened
//! after the greeting, so the server side is always released.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use mail_parser::{HeaderName, MessageParser};
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use crate::channels::{DateRange, MailSource, RawMail};
use crate::config::ImapConfig;
use crate::error::ChannelError;

const CHANNEL: &str = "imap";

const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Mail source backed by an IMAP mailbox.
pub struct ImapMailSource {
    config: ImapConfig,
}

impl ImapMailSource {
    pub fn new(config: ImapConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MailSource for ImapMailSource {
    fn name(&self) -> &str {
        CHANNEL
    }

    async fn fetch(&self, range: &DateRange) -> Result<Vec<RawMail>, ChannelError> {
        let config = self.config.clone();
        let range = *range;
        tokio::task::spawn_blocking(move || fetch_blocking(&config, &range))
            .await
            .map_err(|e| ChannelError::Task(e.to_string()))?
    }
}

// ── Connection ──────────────────────────────────────────────────────

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

fn connect_failed(reason: impl ToString) -> ChannelError {
    ChannelError::ConnectFailed {
        name: CHANNEL.into(),
        reason: reason.to_string(),
    }
}

fn disconnected(reason: impl ToString) -> ChannelError {
    ChannelError::Disconnected {
        name: CHANNEL.into(),
        reason: reason.to_string(),
    }
}

/// Open a TLS connection to the configured server.
fn connect(config: &ImapConfig) -> Result<TlsStream, ChannelError> {
    let tcp = TcpStream::connect((config.host.as_str(), config.port)).map_err(connect_failed)?;
    tcp.set_read_timeout(Some(READ_TIMEOUT))
        .map_err(connect_failed)?;

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name = rustls_pki_types::ServerName::try_from(config.host.clone())
        .map_err(connect_failed)?;
    let conn = rustls::ClientConnection::new(tls_config, server_name).map_err(connect_failed)?;

    debug!(host = %config.host, port = config.port, "Created IMAP connection");
    Ok(rustls::StreamOwned::new(conn, tcp))
}

/// Blocking fetch — run inside `spawn_blocking`.
fn fetch_blocking(config: &ImapConfig, range: &DateRange) -> Result<Vec<RawMail>, ChannelError> {
    let stream = connect(config)?;
    run_session(stream, config, range)
}

/// Drive one session over an established stream.
fn run_session<S: Read + Write>(
    stream: S,
    config: &ImapConfig,
    range: &DateRange,
) -> Result<Vec<RawMail>, ChannelError> {
    let mut session = ImapSession::new(stream);
    session.read_greeting()?;
    let result = fetch_messages(&mut session, config, range);
    session.logout();
    result
}

fn fetch_messages<S: Read + Write>(
    session: &mut ImapSession<S>,
    config: &ImapConfig,
    range: &DateRange,
) -> Result<Vec<RawMail>, ChannelError> {
    session.login(&config.username, config.password.expose_secret())?;
    info!(user = %config.username, "Logged in to IMAP server");

    session.select(&config.mailbox)?;

    let ids = session.search(&search_criteria(config, range))?;
    debug!(count = ids.len(), "IMAP search complete");

    let mut mails = Vec::with_capacity(ids.len());
    for id in &ids {
        let Some(raw) = session.fetch_rfc822(id)? else {
            warn!(id = %id, "Failed to fetch mail");
            continue;
        };
        match raw_mail_from_bytes(&raw) {
            Some(mail) => mails.push(mail),
            None => warn!(id = %id, "Fetched mail is not a parseable message"),
        }
    }
    Ok(mails)
}

// ── Protocol ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    No,
    Bad,
}

/// One piece of a command line.
///
/// Literals are announced as `{n}` and only sent once the server answers
/// with a `+` continuation, so 8-bit text never travels as a quoted string.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Chunk {
    Text(String),
    Literal(Vec<u8>),
}

/// Everything the server sent for one tagged command.
#[derive(Debug)]
struct Response {
    status: Status,
    text: String,
    untagged: Vec<String>,
    literals: Vec<Vec<u8>>,
}

struct ImapSession<S> {
    stream: S,
    next_tag: u32,
}

impl<S: Read + Write> ImapSession<S> {
    fn new(stream: S) -> Self {
        Self {
            stream,
            next_tag: 1,
        }
    }

    fn read_line(&mut self) -> Result<String, ChannelError> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match self.stream.read(&mut byte) {
                Ok(0) => return Err(disconnected("connection closed")),
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).into_owned());
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(disconnected(e)),
            }
        }
    }

    fn read_literal(&mut self, len: usize) -> Result<Vec<u8>, ChannelError> {
        let mut buf = vec![0u8; len];
        self.stream.read_exact(&mut buf).map_err(disconnected)?;
        Ok(buf)
    }

    fn read_greeting(&mut self) -> Result<(), ChannelError> {
        let greeting = self.read_line()?;
        if greeting.starts_with("* OK") || greeting.starts_with("* PREAUTH") {
            Ok(())
        } else {
            Err(connect_failed(format!(
                "unexpected greeting: {}",
                greeting.trim_end()
            )))
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        self.stream.write_all(bytes).map_err(disconnected)?;
        self.stream.flush().map_err(disconnected)
    }

    /// Send a single-line command and collect its response.
    fn command(&mut self, command: &str) -> Result<Response, ChannelError> {
        self.command_chunks(&[Chunk::Text(command.to_string())])
    }

    /// Send a command made of text and literals, then collect the response
    /// up to the tagged status line.
    fn command_chunks(&mut self, chunks: &[Chunk]) -> Result<Response, ChannelError> {
        let tag = format!("A{}", self.next_tag);
        self.next_tag += 1;

        let mut untagged = Vec::new();
        let mut pending = format!("{tag} ").into_bytes();
        for chunk in chunks {
            match chunk {
                Chunk::Text(text) => pending.extend_from_slice(text.as_bytes()),
                Chunk::Literal(bytes) => {
                    pending.extend_from_slice(format!("{{{}}}\r\n", bytes.len()).as_bytes());
                    self.send(&pending)?;
                    pending.clear();
                    loop {
                        let line = self.read_line()?;
                        if line.starts_with('+') {
                            break;
                        }
                        if let Some(rest) = tagged(&line, &tag) {
                            // Server refused the literal; the command is over.
                            let (status, text) = parse_status(rest);
                            return Ok(Response {
                                status,
                                text,
                                untagged,
                                literals: Vec::new(),
                            });
                        }
                        untagged.push(line);
                    }
                    pending.extend_from_slice(bytes);
                }
            }
        }
        pending.extend_from_slice(b"\r\n");
        self.send(&pending)?;

        let mut literals = Vec::new();
        loop {
            let line = self.read_line()?;
            if let Some(rest) = tagged(&line, &tag) {
                let (status, text) = parse_status(rest);
                return Ok(Response {
                    status,
                    text,
                    untagged,
                    literals,
                });
            }
            if let Some(len) = literal_len(&line) {
                literals.push(self.read_literal(len)?);
            }
            untagged.push(line);
        }
    }

    fn login(&mut self, user: &str, password: &str) -> Result<(), ChannelError> {
        let response = self.command(&format!("LOGIN {} {}", quote(user), quote(password)))?;
        if response.status != Status::Ok {
            return Err(ChannelError::AuthFailed {
                name: CHANNEL.into(),
                reason: response.text,
            });
        }
        Ok(())
    }

    fn select(&mut self, mailbox: &str) -> Result<(), ChannelError> {
        let response = self.command(&format!("SELECT {}", quote(mailbox)))?;
        if response.status != Status::Ok {
            return Err(ChannelError::SearchFailed {
                name: CHANNEL.into(),
                reason: format!("SELECT {mailbox}: {}", response.text),
            });
        }
        Ok(())
    }

    /// Message sequence numbers matching `criteria`, ascending.
    fn search(&mut self, criteria: &[Chunk]) -> Result<Vec<String>, ChannelError> {
        let response = self.command_chunks(criteria)?;
        if response.status != Status::Ok {
            return Err(ChannelError::SearchFailed {
                name: CHANNEL.into(),
                reason: response.text,
            });
        }
        Ok(response
            .untagged
            .iter()
            .filter_map(|line| line.strip_prefix("* SEARCH"))
            .flat_map(|ids| ids.split_whitespace())
            .map(str::to_string)
            .collect())
    }

    /// Full RFC 822 source of one message; `None` when the server refused.
    fn fetch_rfc822(&mut self, id: &str) -> Result<Option<Vec<u8>>, ChannelError> {
        let response = self.command(&format!("FETCH {id} RFC822"))?;
        if response.status != Status::Ok {
            debug!(id = %id, reason = %response.text, "FETCH refused");
            return Ok(None);
        }
        Ok(response.literals.into_iter().next())
    }

    fn logout(&mut self) {
        match self.command("LOGOUT") {
            Ok(response) => info!(status = ?response.status, "Logged out from IMAP"),
            Err(e) => debug!(error = %e, "IMAP logout failed"),
        }
    }
}

/// Status text of `line` if it is the tagged completion for `tag`.
fn tagged<'a>(line: &'a str, tag: &str) -> Option<&'a str> {
    line.strip_prefix(tag)
        .and_then(|r| r.strip_prefix(' '))
        .map(str::trim_end)
}

fn parse_status(rest: &str) -> (Status, String) {
    let (word, text) = rest.split_once(' ').unwrap_or((rest, ""));
    let status = if word.eq_ignore_ascii_case("OK") {
        Status::Ok
    } else if word.eq_ignore_ascii_case("NO") {
        Status::No
    } else {
        Status::Bad
    };
    (status, text.to_string())
}

/// Size of a `{N}` literal announced at the end of a line.
fn literal_len(line: &str) -> Option<usize> {
    let line = line.trim_end();
    let inner = line.strip_suffix('}')?;
    let open = inner.rfind('{')?;
    inner[open + 1..].parse().ok()
}

/// IMAP quoted string.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// IMAP `date` syntax, e.g. `12-Nov-2025`.
fn imap_date(date: NaiveDate) -> String {
    date.format("%d-%b-%Y").to_string()
}

/// SEARCH command for the configured filters and window.
///
/// ASCII filter values go out as quoted strings; anything else is sent as
/// a UTF-8 literal under `CHARSET UTF-8`.
fn search_criteria(config: &ImapConfig, range: &DateRange) -> Vec<Chunk> {
    let filters = [
        ("FROM", config.search_from.as_deref()),
        ("SUBJECT", config.search_subject.as_deref()),
    ];

    let mut chunks = Vec::new();
    let mut text = String::from("SEARCH");
    if filters.iter().any(|(_, v)| v.is_some_and(|v| !v.is_ascii())) {
        text.push_str(" CHARSET UTF-8");
    }
    for (key, value) in filters {
        let Some(value) = value else { continue };
        text.push(' ');
        text.push_str(key);
        text.push(' ');
        if value.is_ascii() {
            text.push_str(&quote(value));
        } else {
            chunks.push(Chunk::Text(std::mem::take(&mut text)));
            chunks.push(Chunk::Literal(value.as_bytes().to_vec()));
        }
    }
    text.push_str(&format!(
        " SINCE {} BEFORE {}",
        imap_date(range.since()),
        imap_date(range.before())
    ));
    chunks.push(Chunk::Text(text));
    chunks
}

// ── Message decoding ────────────────────────────────────────────────

/// Decode a raw message into its `Date` header and plain-text body.
///
/// All text bodies are joined; an HTML-only message is reduced to text.
pub fn raw_mail_from_bytes(raw: &[u8]) -> Option<RawMail> {
    let message = MessageParser::default().parse(raw)?;

    let date_header = message
        .header_raw(HeaderName::Date)
        .map(|v| v.trim().to_string())
        .unwrap_or_default();

    let texts: Vec<String> = (0..)
        .map_while(|i| message.body_text(i))
        .map(|t| t.into_owned())
        .collect();

    let body = if !texts.is_empty() {
        texts.join("\n")
    } else if let Some(html) = message.body_html(0) {
        strip_html(html.as_ref())
    } else {
        String::new()
    };

    Some(RawMail { date_header, body })
}

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}
