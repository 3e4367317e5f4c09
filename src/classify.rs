use crate::models::{InboundMessage, RoleDefinition};
use crate::roles::RoleRegistry;

/// Broad recruiter phrases. These catch job mails that don't name a role we
/// have a keyword for; "position" and "opening" will also catch some noise.
pub const JOB_SIGNALS: &[&str] = &[
    "hiring",
    "job opportunity",
    "urgent requirement",
    "requirement",
    "opening",
    "position",
    "vacancy",
    "recruitment",
    "looking for",
    "immediate requirement",
    "greetings from",
    "we have an opening",
    "kindly share",
    "please share your resume",
    "relevant profile",
    "years of experience",
    "notice period",
    "current ctc",
    "expected ctc",
    "job description",
    "jd ",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification<'a> {
    NotJob,
    Job {
        role: &'a RoleDefinition,
        /// false when the message only hit a generic signal and fell back to
        /// the default role
        matched: bool,
    },
}

pub struct Classifier<'a> {
    registry: &'a RoleRegistry,
}

impl<'a> Classifier<'a> {
    pub fn new(registry: &'a RoleRegistry) -> Self {
        Self { registry }
    }

    pub fn is_job_email(&self, text: &str) -> bool {
        if self.registry.lookup(text).is_some() {
            return true;
        }
        let text = text.to_lowercase();
        JOB_SIGNALS.iter().any(|signal| text.contains(signal))
    }

    pub fn detect_role(&self, text: &str) -> &'a RoleDefinition {
        match self.registry.lookup(text) {
            Some(role) => {
                tracing::info!(role = %role.name, "Matched role");
                role
            }
            None => {
                tracing::info!("No specific role, using default");
                self.registry.default_role()
            }
        }
    }

    pub fn classify(&self, message: &InboundMessage) -> Classification<'a> {
        let text = message.normalized_text();
        if !self.is_job_email(&text) {
            return Classification::NotJob;
        }
        let role = self.detect_role(&text);
        Classification::Job {
            role,
            matched: !std::ptr::eq(role, self.registry.default_role()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(subject: &str, body: &str) -> InboundMessage {
        InboundMessage::new("<id@x>", subject, "Recruiter <r@acme.com>", body)
    }

    #[test]
    fn test_role_keyword_is_job_email() {
        let registry = RoleRegistry::builtin();
        let classifier = Classifier::new(&registry);
        assert!(classifier.is_job_email("we need a kubernetes engineer"));
    }

    #[test]
    fn test_generic_signal_falls_back_to_default() {
        let registry = RoleRegistry::builtin();
        let classifier = Classifier::new(&registry);
        let m = msg("Urgent requirement", "Please call me back today.");
        let text = m.normalized_text();

        assert!(classifier.is_job_email(&text));
        assert_eq!(classifier.detect_role(&text).name, "Default");
        match classifier.classify(&m) {
            Classification::Job { role, matched } => {
                assert_eq!(role.name, "Default");
                assert!(!matched);
            }
            other => panic!("expected job, got {:?}", other),
        }
    }

    #[test]
    fn test_first_registered_role_wins() {
        let registry = RoleRegistry::builtin();
        let classifier = Classifier::new(&registry);
        let m = msg(
            "Platform Engineer / Site Reliability Engineer",
            "Role mixes platform engineer and sre duties.",
        );
        match classifier.classify(&m) {
            Classification::Job { role, matched } => {
                assert_eq!(role.name, "Site Reliability Engineer");
                assert!(matched);
            }
            other => panic!("expected job, got {:?}", other),
        }
    }

    #[test]
    fn test_non_job_email() {
        let registry = RoleRegistry::builtin();
        let classifier = Classifier::new(&registry);
        let m = msg("Dinner on Saturday", "Are you free at 7?");
        assert_eq!(classifier.classify(&m), Classification::NotJob);
    }

    #[test]
    fn test_jd_signal_needs_trailing_space() {
        let registry = RoleRegistry::builtin();
        let classifier = Classifier::new(&registry);
        assert!(classifier.is_job_email("attached jd for your review"));
        assert!(!classifier.is_job_email("jdk upgrade notes"));
    }
}
