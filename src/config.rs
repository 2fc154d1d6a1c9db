use compact_str::CompactString;

pub const TELEGRAM_TOKEN: &str = "TELEGRAM_TOKEN";
pub const TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
pub const CLUB_USER: &str = "USUARIO_CLUB";
pub const CLUB_PASSWORD: &str = "PASSWORD_CLUB";

/// Everything a run needs from the environment, resolved once by the
/// outermost caller and passed down. Read-only for the lifetime of the run.
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_token: CompactString,
    pub telegram_chat_id: CompactString,
    pub club_user: CompactString,
    pub club_password: CompactString,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Missing or blank variables are collected so the error names all of
    /// them at once instead of failing one at a time.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut missing = Vec::new();
        let mut grab = |name: &'static str| match lookup(name) {
            Some(value) if !value.trim().is_empty() => CompactString::from(value),
            _ => {
                missing.push(name);
                CompactString::default()
            }
        };

        let config = Self {
            telegram_token: grab(TELEGRAM_TOKEN),
            telegram_chat_id: grab(TELEGRAM_CHAT_ID),
            club_user: grab(CLUB_USER),
            club_password: grab(CLUB_PASSWORD),
        };

        if missing.is_empty() {
            Ok(config)
        } else {
            anyhow::bail!("missing configuration: {}", missing.join(", "))
        }
    }
}
