use anyhow::Context;

/// Where we store secrets in the OS keyring.
const SERVICE: &str = "niawase";

/// Checked before the keyring, so CI and containers work without one.
pub const API_KEY_ENV: &str = "NIAWASE_API_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKey {
    /// Web API key sent with anonymous sign-up.
    ApiKey,
    /// Keeps the anonymous account across runs.
    RefreshToken,
}

impl SecretKey {
    fn user(self) -> &'static str {
        match self {
            SecretKey::ApiKey => "web_api_key",
            SecretKey::RefreshToken => "refresh_token",
        }
    }
}

pub fn set_secret(key: SecretKey, value: &str) -> anyhow::Result<()> {
    let entry = keyring::Entry::new(SERVICE, key.user()).context("create keyring entry")?;
    entry.set_password(value).context("set secret")
}

pub fn get_secret(key: SecretKey) -> anyhow::Result<Option<String>> {
    let entry = keyring::Entry::new(SERVICE, key.user()).context("create keyring entry")?;

    match entry.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(anyhow::Error::new(e)).context("get secret"),
    }
}

pub fn delete_secret(key: SecretKey) -> anyhow::Result<()> {
    let entry = keyring::Entry::new(SERVICE, key.user()).context("create keyring entry")?;
    match entry.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(anyhow::Error::new(e)).context("delete secret"),
    }
}

/// Environment first, then the keyring.
pub fn resolve_api_key() -> anyhow::Result<Option<String>> {
    resolve_with(std::env::var(API_KEY_ENV).ok(), || get_secret(SecretKey::ApiKey))
}

fn resolve_with(
    env_value: Option<String>,
    keyring: impl FnOnce() -> anyhow::Result<Option<String>>,
) -> anyhow::Result<Option<String>> {
    match env_value.filter(|v| !v.trim().is_empty()) {
        Some(v) => Ok(Some(v.trim().to_string())),
        None => keyring(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names_are_stable() {
        // Renaming this would orphan keys stored by earlier versions.
        assert_eq!(SecretKey::ApiKey.user(), "web_api_key");
        assert_eq!(SecretKey::RefreshToken.user(), "refresh_token");
    }

    #[test]
    fn environment_wins_over_keyring() {
        let v = resolve_with(Some(" env-key ".into()), || panic!("keyring consulted")).unwrap();
        assert_eq!(v.as_deref(), Some("env-key"));

        let v = resolve_with(Some("".into()), || Ok(Some("stored".into()))).unwrap();
        assert_eq!(v.as_deref(), Some("stored"));

        let v = resolve_with(None, || Ok(None)).unwrap();
        assert_eq!(v, None);
    }
}
