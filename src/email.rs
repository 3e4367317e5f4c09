use anyhow::{anyhow, Context, Result};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, Message, SmtpTransport, Transport};
use mailparse::{parse_mail, MailHeaderMap, ParsedMail};
use scraper::Html;
use std::collections::HashSet;
use std::net::TcpStream;
use std::time::Duration;

use crate::error::{FetchError, ReplyError};
use crate::models::InboundMessage;
use crate::reply::OutgoingReply;

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

pub type FetchOutcome = std::result::Result<InboundMessage, FetchError>;

/// Source of unread mail. A failure for the whole batch (connect, login)
/// is the outer error; a single unreadable message is an inner one.
pub trait MailboxTransport {
    fn fetch_unread(&mut self, max: usize) -> Result<Vec<FetchOutcome>>;
}

pub trait ReplySender {
    fn send(&mut self, reply: &OutgoingReply) -> std::result::Result<(), ReplyError>;
}

#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

pub struct ImapMailbox {
    config: ImapConfig,
}

impl ImapMailbox {
    pub fn new(config: ImapConfig) -> Self {
        Self { config }
    }
}

impl MailboxTransport for ImapMailbox {
    fn fetch_unread(&mut self, max: usize) -> Result<Vec<FetchOutcome>> {
        tracing::info!(server = %self.config.server, "Connecting to IMAP");
        let tls = native_tls::TlsConnector::builder().build()?;

        let addr = (self.config.server.as_str(), self.config.port);
        let tcp = TcpStream::connect(addr).context("Failed to connect to IMAP server")?;
        tcp.set_read_timeout(Some(Duration::from_secs(30)))?;
        tcp.set_write_timeout(Some(Duration::from_secs(30)))?;
        let tls_stream = tls.connect(&self.config.server, tcp)?;

        let client = imap::Client::new(tls_stream);
        let mut session = client
            .login(&self.config.username, &self.config.password)
            .map_err(|e| anyhow!("Login failed: {}", e.0))?;

        let mailbox = session.select("INBOX")?;
        let uid_validity = mailbox.uid_validity.unwrap_or(0);

        let unseen = session.uid_search("UNSEEN")?;
        tracing::info!(unread = unseen.len(), "Found unread emails");

        let batch = select_batch(unseen, max);
        let mut outcomes = Vec::with_capacity(batch.len());

        for uid in &batch {
            let fallback_id = format!("imap-uid:{}:{}", uid_validity, uid);
            let outcome = match session.uid_fetch(uid.to_string(), "RFC822") {
                Ok(fetches) => match fetches.iter().find_map(|f| f.body()) {
                    Some(raw) => parse_message(raw, &fallback_id).map_err(|e| FetchError {
                        reference: fallback_id.clone(),
                        reason: e.to_string(),
                    }),
                    None => Err(FetchError {
                        reference: fallback_id.clone(),
                        reason: "server returned no body".to_string(),
                    }),
                },
                Err(e) => Err(FetchError {
                    reference: fallback_id.clone(),
                    reason: e.to_string(),
                }),
            };
            outcomes.push(outcome);
        }

        if let Err(e) = session.logout() {
            tracing::warn!(error = %e, "IMAP logout failed");
        }
        Ok(outcomes)
    }
}

/// The newest `max` UIDs, oldest first.
pub fn select_batch(uids: HashSet<u32>, max: usize) -> Vec<u32> {
    let mut uids: Vec<u32> = uids.into_iter().collect();
    uids.sort_unstable();
    let start = uids.len().saturating_sub(max);
    uids.split_off(start)
}

/// Parses a raw RFC 822 message. `fallback_id` is used when the message has
/// no Message-ID header.
pub fn parse_message(raw: &[u8], fallback_id: &str) -> Result<InboundMessage> {
    let parsed = parse_mail(raw)?;

    let message_id = parsed
        .headers
        .get_first_value("Message-ID")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let subject = parsed
        .headers
        .get_first_value("Subject")
        .unwrap_or_default();
    let sender = parsed.headers.get_first_value("From").unwrap_or_default();
    let reply_to = parsed.headers.get_first_value("Reply-To");

    let body = get_email_body(&parsed)?;
    let external_id = message_id
        .clone()
        .unwrap_or_else(|| fallback_id.to_string());

    Ok(InboundMessage::new(external_id, subject.trim(), sender.trim(), &body)
        .with_reply_to(reply_to)
        .with_thread_ref(message_id))
}

fn get_email_body(parsed: &ParsedMail) -> Result<String> {
    if let Some(text) = find_part(parsed, "text/plain") {
        return Ok(text.get_body()?);
    }
    if let Some(html) = find_part(parsed, "text/html") {
        return Ok(html_to_text(&html.get_body()?));
    }
    Ok(String::new())
}

// depth-first, first match wins
fn find_part<'a>(part: &'a ParsedMail<'a>, mimetype: &str) -> Option<&'a ParsedMail<'a>> {
    if part.subparts.is_empty() {
        return (part.ctype.mimetype.eq_ignore_ascii_case(mimetype)).then_some(part);
    }
    part.subparts.iter().find_map(|sub| find_part(sub, mimetype))
}

fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let text = document.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_name: String,
}

pub struct SmtpSender {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpSender {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let creds = Credentials::new(config.username.clone(), config.password.trim().to_string());
        let transport = SmtpTransport::relay(&config.server)
            .with_context(|| format!("SMTP relay error for {}", config.server))?
            .port(config.port)
            .credentials(creds)
            .build();

        let address: Address = config
            .username
            .parse()
            .with_context(|| format!("Invalid sender address: {}", config.username))?;
        let from = Mailbox::new(Some(config.from_name.clone()), address);

        Ok(Self { transport, from })
    }
}

impl ReplySender for SmtpSender {
    fn send(&mut self, reply: &OutgoingReply) -> std::result::Result<(), ReplyError> {
        let email = build_message(self.from.clone(), reply)?;
        self.transport
            .send(&email)
            .map_err(|e| ReplyError::Send(format!("SMTP send failed: {e}")))?;

        tracing::info!(to = %reply.to, "Reply sent");
        if let Some(cc) = &reply.cc {
            tracing::info!(cc = %cc, "CC'd");
        }
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> std::result::Result<Mailbox, ReplyError> {
    address.parse().map_err(|e: lettre::address::AddressError| ReplyError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

pub fn build_message(from: Mailbox, reply: &OutgoingReply) -> std::result::Result<Message, ReplyError> {
    let mut builder = Message::builder()
        .from(from)
        .to(parse_mailbox(&reply.to)?)
        .subject(reply.subject.clone());

    if let Some(cc) = &reply.cc {
        builder = builder.cc(parse_mailbox(cc)?);
    }
    if let Some(thread_ref) = &reply.thread_ref {
        builder = builder
            .in_reply_to(thread_ref.clone())
            .references(thread_ref.clone());
    }

    let content_type =
        ContentType::parse(DOCX_MIME).map_err(|e| ReplyError::Build(e.to_string()))?;
    let attachment = Attachment::new(reply.attachment_filename.clone())
        .body(reply.attachment.clone(), content_type);

    builder
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(reply.body.clone()))
                .singlepart(attachment),
        )
        .map_err(|e| ReplyError::Build(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTIPART: &str = "From: Priya <priya@acme.com>\r\n\
Reply-To: careers@acme.com\r\n\
Subject: Urgent requirement for DevOps Engineer\r\n\
Message-ID: <abc123@acme.com>\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>HTML version</p>\r\n\
--XYZ\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Plain version with notice period details.\r\n\
--XYZ--\r\n";

    const HTML_ONLY: &str = "From: jobs@bigcorp.io\r\n\
Subject: Opening\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<html><body><h1>We are  hiring</h1><p>Cloud   Engineer</p></body></html>\r\n";

    #[test]
    fn test_parse_prefers_plain_text() {
        let msg = parse_message(MULTIPART.as_bytes(), "imap-uid:1:7").unwrap();
        assert_eq!(msg.external_id, "<abc123@acme.com>");
        assert_eq!(msg.thread_ref.as_deref(), Some("<abc123@acme.com>"));
        assert_eq!(msg.subject, "Urgent requirement for DevOps Engineer");
        assert_eq!(msg.sender, "Priya <priya@acme.com>");
        assert_eq!(msg.reply_to.as_deref(), Some("careers@acme.com"));
        assert!(msg.body_text.contains("Plain version"));
        assert!(!msg.body_text.contains("HTML version"));
    }

    #[test]
    fn test_parse_html_only_and_fallback_id() {
        let msg = parse_message(HTML_ONLY.as_bytes(), "imap-uid:9:42").unwrap();
        assert_eq!(msg.external_id, "imap-uid:9:42");
        assert!(msg.thread_ref.is_none());
        assert!(msg.reply_to.is_none());
        assert_eq!(msg.body_text, "We are hiring Cloud Engineer");
    }

    #[test]
    fn test_parse_truncates_body() {
        let raw = format!(
            "From: a@b.com\r\nSubject: x\r\nContent-Type: text/plain\r\n\r\n{}",
            "a".repeat(10_000)
        );
        let msg = parse_message(raw.as_bytes(), "id").unwrap();
        assert_eq!(msg.body_text.len(), crate::models::MAX_BODY_CHARS);
    }

    #[test]
    fn test_select_batch_keeps_newest_oldest_first() {
        let uids: HashSet<u32> = [12, 3, 40, 7, 25].into_iter().collect();
        assert_eq!(select_batch(uids, 3), vec![12, 25, 40]);
    }

    #[test]
    fn test_select_batch_under_limit_keeps_all() {
        let uids: HashSet<u32> = [9, 2, 5].into_iter().collect();
        assert_eq!(select_batch(uids, 100), vec![2, 5, 9]);
    }

    #[test]
    fn test_select_batch_empty() {
        let uids: HashSet<u32> = [1, 2].into_iter().collect();
        assert!(select_batch(uids, 0).is_empty());
        assert!(select_batch(HashSet::new(), 100).is_empty());
    }

    fn reply(cc: Option<&str>) -> OutgoingReply {
        OutgoingReply {
            to: "talent@acme.com".to_string(),
            cc: cc.map(String::from),
            subject: "Re: DevOps Opening".to_string(),
            body: "Hello".to_string(),
            attachment: b"PK\x03\x04".to_vec(),
            attachment_filename: "Resume_Jane_Doe.docx".to_string(),
            thread_ref: Some("<abc123@acme.com>".to_string()),
        }
    }

    fn me() -> Mailbox {
        "Jane Doe <jane@example.com>".parse().unwrap()
    }

    #[test]
    fn test_build_message_headers() {
        let message = build_message(me(), &reply(Some("lead@example.com"))).unwrap();
        let text = String::from_utf8(message.formatted()).unwrap();
        assert!(text.contains("To: talent@acme.com"));
        assert!(text.contains("Cc: lead@example.com"));
        assert!(text.contains("Subject: Re: DevOps Opening"));
        assert!(text.contains("In-Reply-To: <abc123@acme.com>"));
        assert!(text.contains("filename=\"Resume_Jane_Doe.docx\""));
        assert!(text.contains(DOCX_MIME));
    }

    #[test]
    fn test_build_message_rejects_bad_cc() {
        let err = build_message(me(), &reply(Some("not an address"))).unwrap_err();
        assert!(matches!(err, ReplyError::Address { .. }));
    }
}
