use crate::error::{ReplyError, TemplateError};
use crate::extract::{extract_address, reply_subject};
use crate::models::{InboundMessage, RoutingDecision};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingReply {
    pub to: String,
    pub cc: Option<String>,
    pub subject: String,
    pub body: String,
    pub attachment: Vec<u8>,
    pub attachment_filename: String,
    pub thread_ref: Option<String>,
}

/// Fills `{role}` and `{company}`. `{{` and `}}` produce literal braces;
/// anything else in braces is an error.
pub fn render_template(template: &str, role: &str, company: &str) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len() + role.len() + company.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
            offset += pos + 2;
            continue;
        }
        if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
            offset += pos + 2;
            continue;
        }
        if tail.starts_with('}') {
            return Err(TemplateError::UnbalancedBrace(offset + pos));
        }

        let close = tail
            .find('}')
            .ok_or(TemplateError::UnbalancedBrace(offset + pos))?;
        let name = &tail[1..close];
        match name {
            "role" => out.push_str(role),
            "company" => out.push_str(company),
            _ if name.contains('{') => return Err(TemplateError::UnbalancedBrace(offset + pos)),
            _ => return Err(TemplateError::UnknownPlaceholder(name.to_string())),
        }
        rest = &tail[close + 1..];
        offset += pos + close + 1;
    }

    out.push_str(rest);
    Ok(out)
}

pub fn attachment_filename(your_name: &str) -> String {
    format!("Resume_{}.docx", your_name.trim().replace(' ', "_"))
}

pub fn compose_reply(
    message: &InboundMessage,
    decision: &RoutingDecision<'_>,
    your_name: &str,
    resume: Vec<u8>,
    cc: Option<String>,
) -> Result<OutgoingReply, ReplyError> {
    let to = extract_address(message.reply_target());
    if to.is_empty() || !to.contains('@') {
        return Err(ReplyError::Address {
            address: message.reply_target().to_string(),
            reason: "no usable reply address".to_string(),
        });
    }

    let mut body = render_template(
        &decision.role.reply_template,
        &decision.role_title,
        &decision.company_name,
    )?;
    body.push_str(&format!("\n\nBest regards,\n{}", your_name));

    Ok(OutgoingReply {
        to,
        cc,
        subject: reply_subject(&message.subject),
        body,
        attachment: resume,
        attachment_filename: attachment_filename(your_name),
        thread_ref: message.thread_ref.clone(),
    })
}
