use crate::secrets::{SecretKey, delete_secret, get_secret, set_secret};
use std::sync::Mutex;

/// Holds the refresh token of the anonymous account between runs.
pub trait SessionCache: Send + Sync {
    fn load(&self) -> anyhow::Result<Option<String>>;
    fn save(&self, refresh_token: &str) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;
}

/// OS keyring, next to the API key.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyringSessionCache;

impl SessionCache for KeyringSessionCache {
    fn load(&self) -> anyhow::Result<Option<String>> {
        get_secret(SecretKey::RefreshToken)
    }

    fn save(&self, refresh_token: &str) -> anyhow::Result<()> {
        set_secret(SecretKey::RefreshToken, refresh_token)
    }

    fn clear(&self) -> anyhow::Result<()> {
        delete_secret(SecretKey::RefreshToken)
    }
}

/// Process-local cache for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemorySessionCache {
    token: Mutex<Option<String>>,
}

impl MemorySessionCache {
    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionCache for MemorySessionCache {
    fn load(&self) -> anyhow::Result<Option<String>> {
        Ok(self.slot().clone())
    }

    fn save(&self, refresh_token: &str) -> anyhow::Result<()> {
        *self.slot() = Some(refresh_token.to_string());
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        *self.slot() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_cache_keeps_the_latest_token() {
        let cache = MemorySessionCache::default();
        assert_eq!(cache.load().unwrap(), None);
        cache.save("r1").unwrap();
        cache.save("r2").unwrap();
        assert_eq!(cache.load().unwrap().as_deref(), Some("r2"));
        cache.clear().unwrap();
        assert_eq!(cache.load().unwrap(), None);
    }
}
