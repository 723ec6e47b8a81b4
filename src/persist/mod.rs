//! Persisted-session restoration. The provider asks a [`SessionRestorer`] once
//! on mount; successful logins and logouts are written back through the same
//! trait so the next mount can skip the redirect.

use crate::session::{Identity, Session};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::{io::ErrorKind, path::PathBuf};
use tracing::{debug, instrument};

#[async_trait]
pub trait SessionRestorer: Send + Sync {
    /// Returns the previously persisted session, if any.
    async fn restore(&self) -> Result<Option<Session>>;

    async fn persist(&self, _session: &Session) -> Result<()> {
        Ok(())
    }

    async fn forget(&self) -> Result<()> {
        Ok(())
    }
}

/// Restorer for scopes without persistence; every mount starts unauthenticated.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopRestorer;

#[async_trait]
impl SessionRestorer for NoopRestorer {
    async fn restore(&self) -> Result<Option<Session>> {
        Ok(None)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
    token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

impl From<&Session> for SessionRecord {
    fn from(session: &Session) -> Self {
        let identity = session.identity();
        Self {
            token: session.token().expose_secret().to_string(),
            expires_at: session.expires_at(),
            subject: identity.subject.clone(),
            display_name: identity.display_name.clone(),
            email: identity.email.clone(),
        }
    }
}

impl From<SessionRecord> for Session {
    fn from(record: SessionRecord) -> Self {
        let session = Session::new(record.token).with_identity(Identity {
            subject: record.subject,
            display_name: record.display_name,
            email: record.email,
        });
        match record.expires_at {
            Some(expires_at) => session.with_expiry(expires_at),
            None => session,
        }
    }
}

/// Stores the session as JSON in a single file, readable only by the owner.
#[derive(Clone, Debug)]
pub struct FileSessionRestorer {
    path: PathBuf,
}

impl FileSessionRestorer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl SessionRestorer for FileSessionRestorer {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn restore(&self) -> Result<Option<Session>> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no persisted session");
                return Ok(None);
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", self.path.display()))
            }
        };

        let record: SessionRecord = serde_json::from_slice(&contents)
            .with_context(|| format!("invalid session file {}", self.path.display()))?;
        Ok(Some(record.into()))
    }

    #[instrument(skip(self, session), fields(path = %self.path.display()))]
    async fn persist(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let body = serde_json::to_vec_pretty(&SessionRecord::from(session))?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }

        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        debug!("session persisted");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn forget(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!("persisted session removed");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("failed to remove {}", self.path.display()))
            }
        }
    }
}
