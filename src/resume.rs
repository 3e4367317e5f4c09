use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use crate::error::ReplyError;

/// Named secrets, normally the process environment.
pub trait SecretSource {
    fn get(&self, name: &str) -> Option<String>;
}

pub struct EnvSecrets;

impl SecretSource for EnvSecrets {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl SecretSource for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeSource {
    RoleSecret,
    DefaultSecret,
    RoleFile,
    DefaultFile,
}

impl ResumeSource {
    pub fn is_fallback(self) -> bool {
        matches!(self, Self::DefaultSecret | Self::DefaultFile)
    }
}

impl fmt::Display for ResumeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RoleSecret => "role secret",
            Self::DefaultSecret => "default secret",
            Self::RoleFile => "role file",
            Self::DefaultFile => "default file",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedResume {
    pub bytes: Vec<u8>,
    pub source: ResumeSource,
}

pub struct ResumeResolver<S> {
    secrets: S,
    resume_dir: PathBuf,
    default_ref: String,
}

impl<S: SecretSource> ResumeResolver<S> {
    pub fn new(secrets: S, resume_dir: impl Into<PathBuf>, default_ref: impl Into<String>) -> Self {
        Self {
            secrets,
            resume_dir: resume_dir.into(),
            default_ref: default_ref.into(),
        }
    }

    /// Order: role secret, default secret, role file, default file.
    pub fn resolve(&self, resume_ref: &str) -> Result<ResolvedResume, ReplyError> {
        let same = resume_ref == self.default_ref;

        let found = self
            .from_secret(resume_ref)
            .map(|b| (b, ResumeSource::RoleSecret))
            .or_else(|| {
                if !same {
                    tracing::warn!(resume_ref, "Resume secret not set, trying default");
                }
                self.from_secret(&self.default_ref)
                    .map(|b| (b, ResumeSource::DefaultSecret))
            })
            .or_else(|| self.from_file(resume_ref).map(|b| (b, ResumeSource::RoleFile)))
            .or_else(|| {
                self.from_file(&self.default_ref)
                    .map(|b| (b, ResumeSource::DefaultFile))
            });

        match found {
            Some((bytes, mut source)) => {
                // with a single ref there is no fallback to report
                if same {
                    source = match source {
                        ResumeSource::DefaultSecret => ResumeSource::RoleSecret,
                        ResumeSource::DefaultFile => ResumeSource::RoleFile,
                        other => other,
                    };
                }
                tracing::info!(resume_ref, source = %source, bytes = bytes.len(), "Resume resolved");
                Ok(ResolvedResume { bytes, source })
            }
            None => Err(ReplyError::NoResume {
                resume_ref: resume_ref.to_string(),
            }),
        }
    }

    pub fn resolve_cc(&self, cc_ref: &str) -> Option<String> {
        self.secrets
            .get(cc_ref)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn from_secret(&self, name: &str) -> Option<Vec<u8>> {
        let value = self.secrets.get(name)?;
        decode_blob(name, &value)
    }

    fn from_file(&self, name: &str) -> Option<Vec<u8>> {
        let path = self.resume_dir.join(name);
        let text = fs::read_to_string(&path).ok()?;
        decode_blob(&path.display().to_string(), &text)
    }
}

/// Decodes base64 text, ignoring embedded whitespace. Empty or undecodable
/// input counts as absent.
fn decode_blob(label: &str, text: &str) -> Option<Vec<u8>> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }
    match BASE64_STANDARD.decode(cleaned.as_bytes()) {
        Ok(bytes) if !bytes.is_empty() => Some(bytes),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(source = label, error = %e, "Resume data is not valid base64");
            None
        }
    }
}

pub fn encode_resume(bytes: &[u8]) -> String {
    BASE64_STANDARD.encode(bytes)
}
