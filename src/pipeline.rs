//! One polling run: fetch, dedup, classify, reply, record, persist.
//!
//! Messages are handled one at a time in fetch order. A failure while
//! answering one message is logged and counted; it never stops the batch.
//! Only loading/saving the dedup store and fetching the batch itself can
//! fail a run.

use anyhow::{Context, Result};
use chrono::Local;

use crate::classify::{Classification, Classifier};
use crate::email::{MailboxTransport, ReplySender};
use crate::error::ReplyError;
use crate::extract::{extract_company, extract_role_title};
use crate::models::{InboundMessage, RoleDefinition, RoutingDecision};
use crate::reply::compose_reply;
use crate::resume::{ResumeResolver, SecretSource};
use crate::roles::RoleRegistry;
use crate::sent_log::{LogSink, SentRecord};
use crate::store::DedupStore;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub max_messages: usize,
    /// Classify and route but send nothing, record nothing, save nothing.
    pub dry_run: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub fetched: usize,
    pub unreadable: usize,
    pub skipped: usize,
    pub matched: usize,
    pub replied: usize,
    /// Replies that went out but could not be written to the sent log.
    pub unrecorded: usize,
    /// Replies composed in a dry run and not sent.
    pub would_reply: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Sent,
    SentUnrecorded,
    Previewed,
}

pub struct Collaborators<'a> {
    pub mailbox: &'a mut dyn MailboxTransport,
    pub sender: &'a mut dyn ReplySender,
    pub sink: &'a mut dyn LogSink,
    pub store: &'a dyn DedupStore,
}

pub struct Pipeline<'a, S> {
    registry: &'a RoleRegistry,
    resumes: &'a ResumeResolver<S>,
    your_name: &'a str,
    io: Collaborators<'a>,
}

impl<'a, S: SecretSource> Pipeline<'a, S> {
    pub fn new(
        registry: &'a RoleRegistry,
        resumes: &'a ResumeResolver<S>,
        your_name: &'a str,
        io: Collaborators<'a>,
    ) -> Self {
        Self {
            registry,
            resumes,
            your_name,
            io,
        }
    }

    pub fn run(&mut self, options: &RunOptions) -> Result<RunStats> {
        let mut processed = self
            .io
            .store
            .load()
            .context("Failed to load dedup store")?;

        let outcomes = self
            .io
            .mailbox
            .fetch_unread(options.max_messages)
            .context("Failed to fetch unread messages")?;

        let classifier = Classifier::new(self.registry);
        let mut stats = RunStats {
            fetched: outcomes.len(),
            ..Default::default()
        };

        for outcome in outcomes {
            let message = match outcome {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable message");
                    stats.unreadable += 1;
                    continue;
                }
            };

            if processed.contains(&message.external_id) {
                stats.skipped += 1;
                continue;
            }
            // Marked before classification: non-job mail is never rescanned.
            processed.insert(message.external_id.clone());

            let role = match classifier.classify(&message) {
                Classification::NotJob => continue,
                Classification::Job { role, .. } => role,
            };
            stats.matched += 1;

            let span = tracing::info_span!("job_email", id = %message.external_id);
            let _guard = span.enter();
            tracing::info!(subject = %message.subject, from = %message.sender, "Job email");

            match self.answer(&message, role, options.dry_run) {
                Ok(Delivery::Sent) => stats.replied += 1,
                Ok(Delivery::SentUnrecorded) => {
                    stats.replied += 1;
                    stats.unrecorded += 1;
                }
                Ok(Delivery::Previewed) => stats.would_reply += 1,
                Err(e) => {
                    stats.failed += 1;
                    tracing::error!(
                        error = %e,
                        role = %role.name,
                        subject = %message.subject,
                        from = %message.sender,
                        "Failed to reply"
                    );
                }
            }
        }

        if options.dry_run {
            tracing::info!("Dry run, dedup store not saved");
        } else {
            self.io
                .store
                .save(&processed)
                .context("Failed to persist dedup store")?;
        }

        tracing::info!(
            fetched = stats.fetched,
            matched = stats.matched,
            replied = stats.replied,
            would_reply = stats.would_reply,
            unrecorded = stats.unrecorded,
            failed = stats.failed,
            skipped = stats.skipped,
            "Run complete"
        );
        Ok(stats)
    }

    fn answer(
        &mut self,
        message: &InboundMessage,
        role: &RoleDefinition,
        dry_run: bool,
    ) -> std::result::Result<Delivery, ReplyError> {
        let decision = RoutingDecision {
            role,
            company_name: extract_company(message),
            role_title: extract_role_title(message),
        };

        let resume = self.resumes.resolve(&role.resume_ref)?;
        if resume.source.is_fallback() {
            tracing::warn!(role = %role.name, source = %resume.source, "Using default resume");
        }
        let cc = self.resumes.resolve_cc(&role.cc_ref);
        let reply = compose_reply(message, &decision, self.your_name, resume.bytes, cc)?;

        if dry_run {
            tracing::info!(
                to = %reply.to,
                cc = reply.cc.as_deref().unwrap_or("none"),
                title = %decision.role_title,
                company = %decision.company_name,
                resume = %resume.source,
                "Would reply"
            );
            return Ok(Delivery::Previewed);
        }

        self.io.sender.send(&reply)?;

        // The reply is out; a sent-log failure must not count it as failed.
        let record = SentRecord {
            timestamp: Local::now(),
            role: role.name.clone(),
            sender: message.sender.clone(),
            subject: message.subject.clone(),
            cc: reply.cc.clone(),
        };
        match self.io.sink.record(&record) {
            Ok(()) => Ok(Delivery::Sent),
            Err(e) => {
                tracing::warn!(error = %e, to = %reply.to, "Reply sent but not written to sent log");
                Ok(Delivery::SentUnrecorded)
            }
        }
    }
}
