use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::actor::{Actor, UserId};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("request is missing identity headers")]
    MissingIdentity,
    #[error("unrecognised role '{0}'")]
    UnknownRole(String),
    #[error("branch managers must be scoped to a branch")]
    MissingBranch,
    #[error("session for {0} expired")]
    Expired(String),
}

/// Owned "who is logged in" context. Created on sign-in and consumed on sign-out.
#[derive(Debug, Clone)]
pub struct SessionContext {
    actor: Actor,
    started_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn begin(actor: Actor, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            actor,
            started_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn require_active(&self, now: DateTime<Utc>) -> Result<&Actor, SessionError> {
        if self.is_active(now) {
            Ok(&self.actor)
        } else {
            Err(SessionError::Expired(self.actor.user_id.0.clone()))
        }
    }

    /// Extends an active session; expired sessions must sign in again.
    pub fn refresh(&mut self, now: DateTime<Utc>, ttl: Duration) -> Result<(), SessionError> {
        self.require_active(now)?;
        self.expires_at = now + ttl;
        Ok(())
    }

    pub fn end(self, now: DateTime<Utc>) -> SessionSummary {
        let ended_at = now.min(self.expires_at).max(self.started_at);
        SessionSummary {
            user_id: self.actor.user_id,
            started_at: self.started_at,
            ended_at,
            duration_secs: (ended_at - self.started_at).num_seconds(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub user_id: UserId,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: i64,
}
