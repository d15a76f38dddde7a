pub mod config;
pub mod history;
pub mod log;
pub mod timer;

use studytimer_core::{Config, CoreError, ValidationError};

/// Signed-in user from config, or a clear error for commands that need one.
pub(crate) fn require_user(config: &Config) -> Result<String, CoreError> {
    config
        .identity
        .user_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| {
            ValidationError::InvalidValue {
                field: "identity.user_id".into(),
                message: "not set; run `studytimer-cli config set identity.user_id <id>`".into(),
            }
            .into()
        })
}
