//! The ordered role table.
//!
//! Order matters: when a message mentions keywords from several roles, the
//! role listed first wins. Keep the list a `Vec`.

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{ConfigError, RolesError};
use crate::models::RoleDefinition;

const DEVOPS_REPLY: &str = "Dear Hiring Team,

Thank you for reaching out regarding the {role} opportunity at {company}.

I am very interested in this position. I have hands-on experience in DevOps practices including CI/CD pipeline setup, infrastructure automation using Terraform and Ansible, container orchestration with Kubernetes and Docker, and cloud platforms (AWS/GCP/Azure).

Please find my resume attached for your review. I would love to discuss this opportunity further.

Looking forward to hearing from you.";

const CLOUD_REPLY: &str = "Dear Hiring Team,

Thank you for reaching out regarding the {role} opportunity at {company}.

I am very interested in this position. I have strong hands-on experience in cloud platforms including AWS, Azure, and GCP. My expertise includes cloud infrastructure design, cost optimization, security best practices, and cloud-native services.

Please find my resume attached for your review. I look forward to discussing how I can contribute to your team.

Looking forward to hearing from you.";

const SRE_REPLY: &str = "Dear Hiring Team,

Thank you for reaching out regarding the {role} opportunity at {company}.

I am very interested in this position. I have strong experience in SRE practices including SLO/SLI/SLA management, incident response, chaos engineering, and building reliable distributed systems using Prometheus, Grafana, and ELK stack.

Please find my resume attached for your review.

Looking forward to hearing from you.";

const SAP_REPLY: &str = "Dear Hiring Team,

Thank you for reaching out regarding the {role} opportunity at {company}.

I am very interested in this position. I have extensive SAP consulting experience including implementation, configuration, and support across multiple SAP modules with end-to-end project lifecycle experience.

Please find my resume attached for your review.

Looking forward to hearing from you.";

const PLATFORM_REPLY: &str = "Dear Hiring Team,

Thank you for reaching out regarding the {role} opportunity at {company}.

I am very interested in this position. I have solid experience in platform engineering including Kubernetes, Linux administration, networking, and infrastructure as code using Terraform and Ansible.

Please find my resume attached for your review.

Looking forward to hearing from you.";

const DEFAULT_REPLY: &str = "Dear Hiring Team,

Thank you for reaching out regarding the {role} opportunity at {company}.

I am very interested in this position and believe my experience aligns well with your requirements.

Please find my resume attached for your review. I look forward to discussing this opportunity.

Looking forward to hearing from you.";

#[derive(Debug, Clone)]
pub struct RoleRegistry {
    roles: Vec<RoleDefinition>,
    default: RoleDefinition,
}

#[derive(Debug, Deserialize)]
struct RolesFile {
    #[serde(default)]
    roles: Vec<RoleDefinition>,
    default: RoleDefinition,
}

fn role(name: &str, keywords: &[&str], resume_ref: &str, cc_ref: &str, reply: &str) -> RoleDefinition {
    RoleDefinition {
        name: name.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        resume_ref: resume_ref.to_string(),
        cc_ref: cc_ref.to_string(),
        reply_template: reply.to_string(),
    }
}

impl RoleRegistry {
    pub fn new(roles: Vec<RoleDefinition>, default: RoleDefinition) -> Result<Self, RolesError> {
        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(roles.len());

        for mut role in roles {
            if role.name.trim().is_empty() {
                return Err(RolesError::EmptyName);
            }
            if !seen.insert(role.name.clone()) {
                return Err(RolesError::DuplicateName(role.name));
            }
            role.keywords = role
                .keywords
                .iter()
                .map(|k| k.to_lowercase())
                .filter(|k| !k.trim().is_empty())
                .collect();
            if role.keywords.is_empty() {
                return Err(RolesError::NoKeywords(role.name));
            }
            normalized.push(role);
        }

        // The default role is never matched on, so keywords there are a mistake.
        if default.name.trim().is_empty() {
            return Err(RolesError::EmptyName);
        }
        if !default.keywords.is_empty() {
            return Err(RolesError::DefaultKeywords(default.name));
        }

        Ok(Self {
            roles: normalized,
            default,
        })
    }

    pub fn builtin() -> Self {
        let roles = vec![
            role(
                "DevOps Engineer",
                &[
                    "devops engineer",
                    "devops lead",
                    "devops",
                    "ci/cd engineer",
                    "build and release",
                    "devsecops",
                    "release engineer",
                ],
                "RESUME_DEVOPS_B64",
                "CC_DEVOPS",
                DEVOPS_REPLY,
            ),
            role(
                "Cloud Engineer",
                &[
                    "cloud engineer",
                    "aws engineer",
                    "azure engineer",
                    "gcp engineer",
                    "cloud architect",
                    "cloud infrastructure",
                ],
                "RESUME_CLOUD_B64",
                "CC_CLOUD",
                CLOUD_REPLY,
            ),
            role(
                "Site Reliability Engineer",
                &[
                    "site reliability engineer",
                    "sre",
                    "reliability engineer",
                    "production engineer",
                ],
                "RESUME_SRE_B64",
                "CC_SRE",
                SRE_REPLY,
            ),
            role(
                "SAP Consultant",
                &[
                    "sap pp", "sap mm", "sap sd", "sap fico", "sap fi", "sap co", "sap basis",
                    "sap abap", "sap hana", "sap ewm", "sap wm", "sap consultant", "sap analyst",
                ],
                "RESUME_SAP_B64",
                "CC_SAP",
                SAP_REPLY,
            ),
            role(
                "Platform Engineer",
                &[
                    "platform engineer",
                    "infrastructure engineer",
                    "kubernetes engineer",
                    "linux administrator",
                    "systems engineer",
                    "systems administrator",
                ],
                "RESUME_PLATFORM_B64",
                "CC_PLATFORM",
                PLATFORM_REPLY,
            ),
        ];
        let default = role("Default", &[], "RESUME_DEFAULT_B64", "CC_DEFAULT", DEFAULT_REPLY);

        Self { roles, default }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, RolesError> {
        let file: RolesFile = toml::from_str(text)?;
        Self::new(file.roles, file.default)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let load = || -> Result<Self, RolesError> { Self::from_toml_str(&fs::read_to_string(path)?) };
        let registry = load().map_err(|source| ConfigError::Roles {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), roles = registry.roles.len(), "Loaded roles file");
        Ok(registry)
    }

    pub fn roles(&self) -> &[RoleDefinition] {
        &self.roles
    }

    pub fn default_role(&self) -> &RoleDefinition {
        &self.default
    }

    /// First role (in registry order) with any keyword contained in `text`.
    pub fn lookup(&self, text: &str) -> Option<&RoleDefinition> {
        let text = text.to_lowercase();
        self.roles
            .iter()
            .find(|role| role.keywords.iter().any(|kw| text.contains(kw.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_order() {
        let registry = RoleRegistry::builtin();
        let names: Vec<_> = registry.roles().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "DevOps Engineer",
                "Cloud Engineer",
                "Site Reliability Engineer",
                "SAP Consultant",
                "Platform Engineer"
            ]
        );
        assert_eq!(registry.default_role().resume_ref, "RESUME_DEFAULT_B64");
    }

    #[test]
    fn test_lookup_first_match_wins() {
        let registry = RoleRegistry::builtin();
        // "cloud engineer" (Cloud) and "devops" (DevOps) both present; DevOps is listed first
        let role = registry
            .lookup("looking for a cloud engineer with devops skills")
            .unwrap();
        assert_eq!(role.name, "DevOps Engineer");
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = RoleRegistry::builtin();
        let role = registry.lookup("Urgent: SAP FICO Consultant").unwrap();
        assert_eq!(role.name, "SAP Consultant");
    }

    #[test]
    fn test_lookup_no_match() {
        let registry = RoleRegistry::builtin();
        assert!(registry.lookup("lunch on friday?").is_none());
    }

    #[test]
    fn test_from_toml_preserves_order_and_lowercases() {
        let text = r#"
            [[roles]]
            name = "Backend"
            keywords = ["Rust Developer", "backend"]
            resume_ref = "RESUME_BACKEND_B64"
            cc_ref = "CC_BACKEND"
            reply_template = "Hi {company}, re {role}."

            [[roles]]
            name = "Data"
            keywords = ["data engineer"]
            resume_ref = "RESUME_DATA_B64"
            cc_ref = "CC_DATA"
            reply_template = "Thanks."

            [default]
            name = "Default"
            resume_ref = "RESUME_DEFAULT_B64"
            cc_ref = "CC_DEFAULT"
            reply_template = "Thanks for reaching out."
        "#;
        let registry = RoleRegistry::from_toml_str(text).unwrap();
        assert_eq!(registry.roles().len(), 2);
        assert_eq!(registry.roles()[0].keywords[0], "rust developer");
        assert_eq!(
            registry.lookup("backend data engineer").unwrap().name,
            "Backend"
        );
        assert!(registry.default_role().keywords.is_empty());
    }

    #[test]
    fn test_example_roles_file_parses() {
        let registry = RoleRegistry::from_toml_str(include_str!("../roles.example.toml")).unwrap();
        assert_eq!(registry.roles()[1].name, "Java Developer");
        assert_eq!(registry.lookup("Spring Boot role").unwrap().name, "Java Developer");
    }

    #[test]
    fn test_duplicate_role_names_rejected() {
        let a = role("A", &["x"], "R", "C", "t");
        let default = role("Default", &[], "R", "C", "t");
        let err = RoleRegistry::new(vec![a.clone(), a], default).unwrap_err();
        assert!(matches!(err, RolesError::DuplicateName(ref name) if name == "A"));
    }

    #[test]
    fn test_role_without_keywords_rejected() {
        let a = role("A", &[], "R", "C", "t");
        let err = RoleRegistry::new(vec![a.clone()], a).unwrap_err();
        assert!(matches!(err, RolesError::NoKeywords(_)));
    }

    #[test]
    fn test_default_table_is_validated() {
        let a = role("A", &["x"], "R", "C", "t");
        let unnamed = role(" ", &[], "R", "C", "t");
        let err = RoleRegistry::new(vec![a], unnamed).unwrap_err();
        assert!(matches!(err, RolesError::EmptyName));

        let text = r#"
            [default]
            name = "Default"
            keywords = ["anything"]
            resume_ref = "RESUME_DEFAULT_B64"
            cc_ref = "CC_DEFAULT"
            reply_template = "Thanks."
        "#;
        let err = RoleRegistry::from_toml_str(text).unwrap_err();
        assert!(matches!(err, RolesError::DefaultKeywords(ref name) if name == "Default"));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = RoleRegistry::from_toml_str("[[roles]]\nname = ").unwrap_err();
        assert!(matches!(err, RolesError::Parse(_)));
    }

    #[test]
    fn test_roles_file_missing_is_config_error() {
        let err = RoleRegistry::from_toml_file(Path::new("/nonexistent/roles.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Roles { source: RolesError::Io(_), .. }));
    }
}
