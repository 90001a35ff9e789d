//! Registry configuration.
//!
//! Configuration is small: the default threading policy. It can be built in
//! code, deserialized with serde from whatever format the host uses, or read
//! from the `DEPENDENCY_REGISTRY_POLICY` environment variable.

use serde::{Deserialize, Serialize};

use crate::policy::{ParsePolicyError, ThreadingPolicy};

/// Environment variable consulted by [`RegistryConfig::from_env`].
pub const POLICY_ENV_VAR: &str = "DEPENDENCY_REGISTRY_POLICY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Policy used whenever an operation asks for [`ThreadingPolicy::Default`].
    pub default_policy: ThreadingPolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_policy: ThreadingPolicy::ThreadLocal,
        }
    }
}

impl RegistryConfig {
    #[must_use]
    pub fn with_default_policy(mut self, policy: ThreadingPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// Reads the default policy from [`POLICY_ENV_VAR`].
    ///
    /// An unset or empty variable yields the default configuration.
    pub fn from_env() -> Result<Self, ParsePolicyError> {
        match std::env::var(POLICY_ENV_VAR) {
            Ok(raw) if !raw.trim().is_empty() => {
                let policy: ThreadingPolicy = raw.parse()?;
                Ok(Self::default().with_default_policy(policy))
            }
            _ => Ok(Self::default()),
        }
    }

    /// Like [`from_env`][Self::from_env], but logs and ignores a bad value.
    #[must_use]
    pub fn from_env_or_default() -> Self {
        Self::from_env().unwrap_or_else(|err| {
            tracing::warn!(
                variable = POLICY_ENV_VAR,
                error = %err,
                "ignoring invalid registry configuration"
            );
            Self::default()
        })
    }

    /// The default policy with `Default` itself mapped to a concrete policy.
    #[must_use]
    pub fn effective_default_policy(&self) -> ThreadingPolicy {
        self.default_policy.or(Self::default().default_policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_is_thread_local() {
        assert_eq!(
            RegistryConfig::default().default_policy,
            ThreadingPolicy::ThreadLocal
        );
    }

    #[test]
    fn test_effective_default_never_default() {
        let config = RegistryConfig::default().with_default_policy(ThreadingPolicy::Default);
        assert_eq!(
            config.effective_default_policy(),
            ThreadingPolicy::ThreadLocal
        );

        let config = config.with_default_policy(ThreadingPolicy::SingleThread);
        assert_eq!(
            config.effective_default_policy(),
            ThreadingPolicy::SingleThread
        );
    }

    #[test]
    fn test_deserialize() {
        let config: RegistryConfig =
            serde_json::from_str(r#"{ "default_policy": "application_global" }"#).unwrap();
        assert_eq!(config.default_policy, ThreadingPolicy::ApplicationGlobal);

        let config: RegistryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RegistryConfig::default());
    }

    #[test]
    fn test_deserialize_rejects_unknown() {
        assert!(serde_json::from_str::<RegistryConfig>(r#"{ "policy": "single_thread" }"#).is_err());
        assert!(
            serde_json::from_str::<RegistryConfig>(r#"{ "default_policy": "per_process" }"#)
                .is_err()
        );
    }

    #[test]
    fn test_serialize() {
        let config = RegistryConfig::default().with_default_policy(ThreadingPolicy::SingleThread);
        assert_eq!(
            serde_json::to_string(&config).unwrap(),
            r#"{"default_policy":"single_thread"}"#
        );
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var(POLICY_ENV_VAR, "application_global");
        assert_eq!(
            RegistryConfig::from_env().unwrap().default_policy,
            ThreadingPolicy::ApplicationGlobal
        );

        std::env::set_var(POLICY_ENV_VAR, "");
        assert_eq!(RegistryConfig::from_env().unwrap(), RegistryConfig::default());

        std::env::remove_var(POLICY_ENV_VAR);
        assert_eq!(RegistryConfig::from_env().unwrap(), RegistryConfig::default());
    }

    #[test]
    #[serial]
    fn test_from_env_invalid() {
        std::env::set_var(POLICY_ENV_VAR, "sometimes");
        assert!(RegistryConfig::from_env().is_err());
        assert_eq!(RegistryConfig::from_env_or_default(), RegistryConfig::default());
        std::env::remove_var(POLICY_ENV_VAR);
    }
}
