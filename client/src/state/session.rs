//! Authenticated dashboard session.
//!
//! SYSTEM CONTEXT
//! ==============
//! The event channel stays inert until a session carries both a token and an
//! organization context.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Bearer session token; also scopes the event stream.
    pub token: Option<String>,
    pub organization_id: Option<String>,
    pub user_id: Option<String>,
}

impl Session {
    #[must_use]
    pub fn new(token: impl Into<String>, organization_id: impl Into<String>) -> Self {
        Self { token: Some(token.into()), organization_id: Some(organization_id.into()), user_id: None }
    }

    /// Token and organization are both present and non-blank.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some() && self.organization_id().is_some()
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        non_blank(self.token.as_deref())
    }

    #[must_use]
    pub fn organization_id(&self) -> Option<&str> {
        non_blank(self.organization_id.as_deref())
    }
}

// Keep the token out of logs.
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("organization_id", &self.organization_id)
            .field("user_id", &self.user_id)
            .finish()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
