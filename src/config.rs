//! Config
//!
//! Typed, layered configuration: built-in defaults, optionally overlaid by
//! environment variables. Plain structs with `Default` plus an `from_env`
//! overlay, matching this codebase's configuration loading shape rather
//! than introducing a new config-file format.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxLanguage {
    TypeScript,
    JavaScript,
}

impl Default for SandboxLanguage {
    fn default() -> Self {
        SandboxLanguage::TypeScript
    }
}

impl SandboxLanguage {
    pub fn ext(&self) -> &'static str {
        match self {
            SandboxLanguage::TypeScript => "ts",
            SandboxLanguage::JavaScript => "js",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Maximum number of tool-call sentinels a single execution may emit.
    pub max_recursion_limit: u32,
    /// Host-side wall-clock deadline for one `execute` call.
    pub timeout_ms: u64,
    /// In-sandbox per-tool-call poll budget, passed through so the emitted
    /// runtime and the host agree on the same ceiling.
    pub in_sandbox_poll_timeout_ms: u64,
    pub language: SandboxLanguage,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_recursion_limit: 100,
            timeout_ms: 30_000,
            in_sandbox_poll_timeout_ms: 60_000,
            language: SandboxLanguage::TypeScript,
        }
    }
}

impl ClientConfig {
    /// Overlay `PTC_MAX_RECURSION_LIMIT` and `PTC_TIMEOUT_MS` on top of
    /// `ClientConfig::default()`. Malformed values are logged and ignored --
    /// configuration loading never fails or panics.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("PTC_MAX_RECURSION_LIMIT") {
            match raw.parse() {
                Ok(value) => config.max_recursion_limit = value,
                Err(_) => tracing::warn!(value = %raw, "invalid PTC_MAX_RECURSION_LIMIT, keeping default"),
            }
        }

        if let Ok(raw) = std::env::var("PTC_TIMEOUT_MS") {
            match raw.parse() {
                Ok(value) => config.timeout_ms = value,
                Err(_) => tracing::warn!(value = %raw, "invalid PTC_TIMEOUT_MS, keeping default"),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize the from_env
    // tests against each other.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_have_expected_values() {
        let config = ClientConfig::default();
        assert_eq!(config.max_recursion_limit, 100);
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.in_sandbox_poll_timeout_ms, 60_000);
        assert_eq!(config.language, SandboxLanguage::TypeScript);
    }

    #[test]
    fn from_env_overlays_valid_values() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("PTC_MAX_RECURSION_LIMIT", "7");
        std::env::set_var("PTC_TIMEOUT_MS", "500");
        let config = ClientConfig::from_env();
        assert_eq!(config.max_recursion_limit, 7);
        assert_eq!(config.timeout_ms, 500);
        std::env::remove_var("PTC_MAX_RECURSION_LIMIT");
        std::env::remove_var("PTC_TIMEOUT_MS");
    }

    #[test]
    fn from_env_falls_back_on_malformed_value() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("PTC_MAX_RECURSION_LIMIT", "not-a-number");
        let config = ClientConfig::from_env();
        assert_eq!(config.max_recursion_limit, 100);
        std::env::remove_var("PTC_MAX_RECURSION_LIMIT");
    }
}
