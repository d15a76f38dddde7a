use crate::storage::Config;

/// Supplies the user the timer records sessions for.
pub trait IdentityProvider: Send + Sync {
    /// `None` when nobody is signed in; the timer will not start.
    fn user_id(&self) -> Option<String>;
}

/// A fixed identity, typically read from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user_id: Option<String>,
}

impl StaticIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            user_id: config
                .identity
                .user_id
                .clone()
                .filter(|id| !id.trim().is_empty()),
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}
