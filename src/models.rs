use serde::{Deserialize, Serialize};

/// Bodies longer than this are cut before classification.
pub const MAX_BODY_CHARS: usize = 4000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>, // lowercase phrases
    pub resume_ref: String,
    pub cc_ref: String,
    pub reply_template: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub external_id: String,
    pub subject: String,
    pub sender: String, // raw "Display Name <addr>"
    pub reply_to: Option<String>,
    pub body_text: String,
    pub thread_ref: Option<String>,
}

impl InboundMessage {
    pub fn new(
        external_id: impl Into<String>,
        subject: impl Into<String>,
        sender: impl Into<String>,
        body: &str,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            subject: subject.into(),
            sender: sender.into(),
            reply_to: None,
            body_text: truncate_chars(body, MAX_BODY_CHARS),
            thread_ref: None,
        }
    }

    pub fn with_reply_to(mut self, reply_to: Option<String>) -> Self {
        self.reply_to = reply_to.filter(|r| !r.trim().is_empty());
        self
    }

    pub fn with_thread_ref(mut self, thread_ref: Option<String>) -> Self {
        self.thread_ref = thread_ref;
        self
    }

    /// Lowercased subject and body, the text every keyword is matched against.
    pub fn normalized_text(&self) -> String {
        format!("{} {}", self.subject, self.body_text).to_lowercase()
    }

    /// Where the reply goes: Reply-To if present, otherwise the sender.
    pub fn reply_target(&self) -> &str {
        self.reply_to.as_deref().unwrap_or(&self.sender)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision<'a> {
    pub role: &'a RoleDefinition,
    pub company_name: String,
    pub role_title: String,
}

pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
