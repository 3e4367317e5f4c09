//! Best-effort helpers that pull a company name, a job title and reply
//! addresses out of a message. None of these fail; they fall back to a
//! placeholder instead.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::{InboundMessage, truncate_chars};

pub const COMPANY_PLACEHOLDER: &str = "your organization";
pub const TITLE_PLACEHOLDER: &str = "this position";

/// Webmail and job-board domains that say nothing about the employer.
const GENERIC_DOMAINS: &[&str] = &["gmail", "yahoo", "hotmail", "outlook", "rediffmail", "naukri"];

const TITLE_SCAN_BODY_CHARS: usize = 500;

static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(.+?)>").expect("address regex"));

// Tried in order; the first capture of the first match wins.
static TITLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    const TRIGGER: &str = r"(?i:\b(?:for|hiring|position|role|opening)\b)(?:\s+(?i:of|for|a|an|the|as)\b)*\s*[:-]?\s*";
    const WORD: &str = r"[A-Z][A-Za-z0-9+#/.&-]*";
    const NOUN: &str = r"(?:Engineer|Developer|Consultant|Analyst|Administrator|Lead|Manager)\b";

    [
        // "hiring for Senior DevOps Engineer"
        format!(r"{TRIGGER}((?:{WORD}[ \t]+){{0,4}}{NOUN})"),
        // "Senior Cloud Engineer" anywhere
        format!(r"\b((?:{WORD}[ \t]+){{1,4}}{NOUN})"),
        // "Opening: Java Backend"
        format!(r"{TRIGGER}({WORD}(?:[ \t]+{WORD}){{0,4}})"),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("title regex"))
    .collect()
});

/// "Jane Doe <jane@acme.com>" -> "jane@acme.com"; anything without angle
/// brackets is returned trimmed.
pub fn extract_address(raw: &str) -> String {
    ADDRESS_RE
        .captures(raw)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| raw.trim().to_string())
}

pub fn extract_company(message: &InboundMessage) -> String {
    let address = extract_address(&message.sender);
    let label = match address.rsplit_once('@') {
        Some((_, domain)) => domain.split('.').next().unwrap_or("").trim(),
        None => "",
    };

    if label.is_empty() || GENERIC_DOMAINS.contains(&label.to_lowercase().as_str()) {
        return COMPANY_PLACEHOLDER.to_string();
    }
    capitalize(label)
}

pub fn extract_role_title(message: &InboundMessage) -> String {
    let text = format!(
        "{} {}",
        message.subject,
        truncate_chars(&message.body_text, TITLE_SCAN_BODY_CHARS)
    );

    TITLE_PATTERNS
        .iter()
        .find_map(|re| re.captures(&text).and_then(|cap| cap.get(1)))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| TITLE_PLACEHOLDER.to_string())
}

pub fn reply_subject(original: &str) -> String {
    let already_reply = original
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("re:"));
    if already_reply {
        original.to_string()
    } else {
        format!("Re: {}", original)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}
