use crate::error::{Error, ErrorKind};
use serde::Deserialize;
use std::str::FromStr;

/// Environment variable selecting the [DuplicatePolicy].
pub const DUPLICATE_POLICY_ENV: &str = "CQRS_DUPLICATE_POLICY";

/// Environment variable selecting the default handler [Lifetime].
pub const HANDLER_LIFETIME_ENV: &str = "CQRS_HANDLER_LIFETIME";

/// How long a handler instance lives.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifetime {
    /// A new instance for every dispatch.
    #[default]
    Transient,
    /// One instance per mediator scope.
    Scoped,
    /// One instance shared by every dispatch.
    ///
    /// The instance is locked while it handles a request, so concurrent
    /// dispatches wait for each other. A singleton that sends its own request
    /// type through the mediator waits on itself and never completes.
    Singleton,
}

impl Lifetime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifetime::Transient => "transient",
            Lifetime::Scoped => "scoped",
            Lifetime::Singleton => "singleton",
        }
    }
}

impl FromStr for Lifetime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transient" => Ok(Lifetime::Transient),
            "scoped" => Ok(Lifetime::Scoped),
            "singleton" => Ok(Lifetime::Singleton),
            other => Err(Error::new(
                ErrorKind::Config,
                format!("unknown handler lifetime `{}`", other),
            )),
        }
    }
}

/// What happens when a second handler is registered for the same request.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Fail the registration.
    #[default]
    #[serde(alias = "strict")]
    Reject,
    /// The last registration wins.
    #[serde(alias = "relaxed")]
    Replace,
}

impl FromStr for DuplicatePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" | "reject" => Ok(DuplicatePolicy::Reject),
            "relaxed" | "replace" => Ok(DuplicatePolicy::Replace),
            other => Err(Error::new(
                ErrorKind::Config,
                format!("unknown duplicate policy `{}`", other),
            )),
        }
    }
}

/// Mediator settings, usually embedded in the host configuration.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MediatorConfig {
    /// Policy applied to duplicate handler registrations.
    pub duplicate_policy: DuplicatePolicy,
    /// Lifetime of handlers registered without an explicit one.
    pub default_lifetime: Lifetime,
}

impl MediatorConfig {
    /// Reads the configuration from the process environment.
    ///
    /// Unset variables keep their defaults, unknown values are an error.
    pub fn from_env() -> crate::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = MediatorConfig::default();

        if let Some(policy) = lookup(DUPLICATE_POLICY_ENV) {
            config.duplicate_policy = policy.parse()?;
        }

        if let Some(lifetime) = lookup(HANDLER_LIFETIME_ENV) {
            config.default_lifetime = lifetime.parse()?;
        }

        Ok(config)
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn with_default_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.default_lifetime = lifetime;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn from_lookup_test() {
        let vars: HashMap<&str, &str> = [
            (DUPLICATE_POLICY_ENV, "Relaxed"),
            (HANDLER_LIFETIME_ENV, " scoped "),
        ]
        .into_iter()
        .collect();

        let config = MediatorConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Replace);
        assert_eq!(config.default_lifetime, Lifetime::Scoped);

        let config = MediatorConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, MediatorConfig::default());
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
    }

    #[test]
    fn unknown_value_test() {
        let err = MediatorConfig::from_lookup(|k| {
            (k == HANDLER_LIFETIME_ENV).then(|| "forever".to_owned())
        })
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(
            err.to_string(),
            "invalid configuration: unknown handler lifetime `forever`"
        );
    }

    #[test]
    fn deserialize_test() {
        let json = r#"{ "duplicate_policy": "strict", "default_lifetime": "singleton" }"#;
        let config: MediatorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
        assert_eq!(config.default_lifetime, Lifetime::Singleton);

        let config: MediatorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, MediatorConfig::default());
    }
}
