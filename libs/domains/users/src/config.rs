use core_config::{env_parse, ConfigError, FromEnv};

pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// Behaviour switches for [`crate::UserService`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsersConfig {
    /// Page size used when `list_users` is called with a limit of zero
    pub default_page_size: u64,
    /// Write an `"updated"` outbox record on every update
    pub emit_update_events: bool,
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            emit_update_events: false,
        }
    }
}

impl UsersConfig {
    pub fn with_default_page_size(mut self, size: u64) -> Self {
        self.default_page_size = size;
        self
    }

    pub fn with_update_events(mut self, enabled: bool) -> Self {
        self.emit_update_events = enabled;
        self
    }
}

impl FromEnv for UsersConfig {
    /// Reads:
    /// - `USERS_DEFAULT_PAGE_SIZE` (default 50, must be positive)
    /// - `USERS_EMIT_UPDATE_EVENTS` (default false)
    fn from_env() -> Result<Self, ConfigError> {
        let default_page_size: u64 = env_parse("USERS_DEFAULT_PAGE_SIZE", "50")?;
        if default_page_size == 0 {
            return Err(ConfigError::ParseError {
                key: "USERS_DEFAULT_PAGE_SIZE".to_string(),
                details: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            default_page_size,
            emit_update_events: env_parse("USERS_EMIT_UPDATE_EVENTS", "false")?,
        })
    }
}
