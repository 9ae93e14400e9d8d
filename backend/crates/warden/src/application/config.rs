//! Application Configuration
//!
//! Explicit, typed configuration for every component of the core. Values
//! are parsed from `WARDEN_*` keys and validated once, at startup.

use std::str::FromStr;
use std::time::Duration;

use crate::error::{WardenError, WardenResult};

/// Re-export SameSite from platform
pub use platform::cookie::SameSite;
use platform::cookie::CookieConfig;

/// Smallest accepted global session timeout
pub const MIN_GLOBAL_TIMEOUT: Duration = Duration::from_secs(30);
/// Fallback for a global timeout below [`MIN_GLOBAL_TIMEOUT`]
pub const DEFAULT_GLOBAL_TIMEOUT: Duration = Duration::from_secs(3600);
/// Fallback sweep initial delay
pub const DEFAULT_SWEEP_INITIAL_DELAY: Duration = Duration::from_secs(600);
/// Fallback sweep period
pub const DEFAULT_SWEEP_PERIOD: Duration = Duration::from_secs(300);

const MIN_RATIO: f64 = 0.1;
const MAX_RATIO: f64 = 0.9;

/// Session lifecycle configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Idle timeout applied to new sessions and to the shared-store TTL
    pub global_timeout: Duration,
    /// Key prefix of primary session records
    pub session_prefix: String,
    /// Sorted set of session ids scored by creation time (distributed only)
    pub active_session_key: String,
    /// Hash of principal -> session id (distributed only)
    pub active_user_key: String,
    /// Header / query parameter carrying the session token
    pub session_name: String,
    /// Extend the shared-store TTL on access
    pub renew: bool,
    /// Remaining-time fraction below which the TTL is extended
    pub ratio: f64,
    /// When true a second login for a live principal is rejected;
    /// when false the previous session is kicked out
    pub concurrent_login: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            global_timeout: DEFAULT_GLOBAL_TIMEOUT,
            session_prefix: "warden:sessions:".to_string(),
            active_session_key: "warden:active-sessions".to_string(),
            active_user_key: "warden:active-users".to_string(),
            session_name: "WSessionId".to_string(),
            renew: true,
            ratio: 0.5,
            concurrent_login: false,
        }
    }
}

impl SessionConfig {
    /// Renewal ratio clamped to [0.1, 0.9]
    pub fn effective_ratio(&self) -> f64 {
        self.ratio.clamp(MIN_RATIO, MAX_RATIO)
    }

    pub fn global_timeout_secs(&self) -> u64 {
        self.global_timeout.as_secs()
    }
}

/// Session cookie configuration
#[derive(Debug, Clone)]
pub struct CookieSettings {
    /// Read the token from a cookie before the header
    pub enabled: bool,
    pub name: String,
    /// Negative for a browser-session cookie
    pub max_age: i64,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            name: "WSessionId".to_string(),
            max_age: -1,
            path: "/".to_string(),
            secure: false,
            http_only: true,
            same_site: SameSite::Lax,
        }
    }
}

impl CookieSettings {
    pub fn to_cookie_config(&self) -> CookieConfig {
        CookieConfig {
            name: self.name.clone(),
            secure: self.secure,
            http_only: self.http_only,
            same_site: self.same_site,
            path: self.path.clone(),
            max_age_secs: Some(self.max_age),
        }
    }
}

/// Expiry sweep schedule
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub initial_delay: Duration,
    pub period: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_SWEEP_INITIAL_DELAY,
            period: DEFAULT_SWEEP_PERIOD,
        }
    }
}

/// Authority caching configuration
#[derive(Debug, Clone)]
pub struct AuthorityConfig {
    /// Cache the rule catalog
    pub sys_cached_enabled: bool,
    pub sys_cached_key: String,
    pub sys_expire: Duration,
    /// Cache each session's authorities
    pub user_cached_enabled: bool,
    pub user_cached_key: String,
    pub user_expire: Duration,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            sys_cached_enabled: true,
            sys_cached_key: "warden:sys-authorities".to_string(),
            sys_expire: Duration::from_secs(24 * 3600),
            user_cached_enabled: true,
            user_cached_key: "warden:user-authorities".to_string(),
            user_expire: Duration::from_secs(24 * 3600),
        }
    }
}

/// Login retry limiter configuration
#[derive(Debug, Clone)]
pub struct RetryLimitConfig {
    pub enabled: bool,
    pub attempt_limit: u32,
    pub prefix: String,
    pub locked_duration: Duration,
}

impl Default for RetryLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            attempt_limit: 3,
            prefix: "warden:retry-limit:".to_string(),
            locked_duration: Duration::from_secs(120),
        }
    }
}

/// Complete core configuration
#[derive(Debug, Clone, Default)]
pub struct WardenConfig {
    pub session: SessionConfig,
    pub cookie: CookieSettings,
    pub scheduler: SchedulerConfig,
    pub authority: AuthorityConfig,
    pub retry: RetryLimitConfig,
}

impl WardenConfig {
    /// Create config for development (cookie tokens, short sweep interval)
    pub fn development() -> Self {
        Self {
            cookie: CookieSettings {
                enabled: true,
                secure: false,
                ..CookieSettings::default()
            },
            scheduler: SchedulerConfig {
                initial_delay: Duration::from_secs(30),
                period: Duration::from_secs(60),
            },
            ..Self::default()
        }
    }

    /// Defaults overridden by `WARDEN_*` environment variables
    pub fn from_env() -> WardenResult<Self> {
        Self::default().merge_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns
    pub fn from_lookup<F>(lookup: F) -> WardenResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().merge_lookup(lookup)
    }

    /// Override `self` with values from `lookup`, then validate
    pub fn merge_lookup<F>(mut self, lookup: F) -> WardenResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let session = &mut self.session;
        if let Some(secs) = parse::<u64>(&get, "WARDEN_SESSION_TIMEOUT")? {
            session.global_timeout = Duration::from_secs(secs);
        }
        assign(&get, "WARDEN_SESSION_PREFIX", &mut session.session_prefix);
        assign(&get, "WARDEN_SESSION_ACTIVE_SESSION_KEY", &mut session.active_session_key);
        assign(&get, "WARDEN_SESSION_ACTIVE_USER_KEY", &mut session.active_user_key);
        assign(&get, "WARDEN_SESSION_NAME", &mut session.session_name);
        if let Some(renew) = parse_bool(&get, "WARDEN_SESSION_RENEW")? {
            session.renew = renew;
        }
        if let Some(ratio) = parse::<f64>(&get, "WARDEN_SESSION_RENEW_RATIO")? {
            session.ratio = ratio;
        }
        if let Some(concurrent) = parse_bool(&get, "WARDEN_SESSION_CONCURRENT_LOGIN")? {
            session.concurrent_login = concurrent;
        }

        let cookie = &mut self.cookie;
        if let Some(enabled) = parse_bool(&get, "WARDEN_COOKIE_ENABLED")? {
            cookie.enabled = enabled;
        }
        assign(&get, "WARDEN_COOKIE_NAME", &mut cookie.name);
        if let Some(max_age) = parse::<i64>(&get, "WARDEN_COOKIE_MAX_AGE")? {
            cookie.max_age = max_age;
        }
        assign(&get, "WARDEN_COOKIE_PATH", &mut cookie.path);
        if let Some(secure) = parse_bool(&get, "WARDEN_COOKIE_SECURE")? {
            cookie.secure = secure;
        }
        if let Some(http_only) = parse_bool(&get, "WARDEN_COOKIE_HTTP_ONLY")? {
            cookie.http_only = http_only;
        }

        if let Some(secs) = parse::<u64>(&get, "WARDEN_SCHEDULER_INITIAL_DELAY")? {
            self.scheduler.initial_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(&get, "WARDEN_SCHEDULER_PERIOD")? {
            self.scheduler.period = Duration::from_secs(secs);
        }

        let authority = &mut self.authority;
        if let Some(cached) = parse_bool(&get, "WARDEN_AUTHORITY_SYS_CACHED")? {
            authority.sys_cached_enabled = cached;
        }
        assign(&get, "WARDEN_AUTHORITY_SYS_KEY", &mut authority.sys_cached_key);
        if let Some(hours) = parse::<u64>(&get, "WARDEN_AUTHORITY_SYS_EXPIRE_HOURS")? {
            authority.sys_expire = Duration::from_secs(hours * 3600);
        }
        if let Some(cached) = parse_bool(&get, "WARDEN_AUTHORITY_USER_CACHED")? {
            authority.user_cached_enabled = cached;
        }
        assign(&get, "WARDEN_AUTHORITY_USER_KEY", &mut authority.user_cached_key);
        if let Some(hours) = parse::<u64>(&get, "WARDEN_AUTHORITY_USER_EXPIRE_HOURS")? {
            authority.user_expire = Duration::from_secs(hours * 3600);
        }

        let retry = &mut self.retry;
        if let Some(enabled) = parse_bool(&get, "WARDEN_RETRY_ENABLED")? {
            retry.enabled = enabled;
        }
        if let Some(limit) = parse::<u32>(&get, "WARDEN_RETRY_ATTEMPT_LIMIT")? {
            retry.attempt_limit = limit;
        }
        assign(&get, "WARDEN_RETRY_PREFIX", &mut retry.prefix);
        if let Some(secs) = parse::<u64>(&get, "WARDEN_RETRY_LOCKED_SECS")? {
            retry.locked_duration = Duration::from_secs(secs);
        }

        self.validate()
    }

    /// Normalize out-of-range values and reject unusable ones
    pub fn validate(mut self) -> WardenResult<Self> {
        if self.session.global_timeout < MIN_GLOBAL_TIMEOUT {
            tracing::warn!(
                configured_secs = self.session.global_timeout.as_secs(),
                fallback_secs = DEFAULT_GLOBAL_TIMEOUT.as_secs(),
                "Global session timeout below minimum, using fallback"
            );
            self.session.global_timeout = DEFAULT_GLOBAL_TIMEOUT;
        }
        if self.scheduler.initial_delay < Duration::from_secs(1) {
            self.scheduler.initial_delay = DEFAULT_SWEEP_INITIAL_DELAY;
        }
        if self.scheduler.period < Duration::from_secs(1) {
            self.scheduler.period = DEFAULT_SWEEP_PERIOD;
        }
        if !self.session.ratio.is_finite() {
            return Err(invalid("session renew ratio must be a finite number"));
        }

        let required = [
            ("session prefix", &self.session.session_prefix),
            ("active session key", &self.session.active_session_key),
            ("active user key", &self.session.active_user_key),
            ("session name", &self.session.session_name),
            ("cookie name", &self.cookie.name),
            ("catalog cache key", &self.authority.sys_cached_key),
            ("authority cache key", &self.authority.user_cached_key),
            ("retry prefix", &self.retry.prefix),
        ];
        if let Some((name, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(invalid(format!("{name} must not be blank")));
        }
        if self.session.active_session_key == self.session.active_user_key {
            return Err(invalid("active session key and active user key must differ"));
        }
        if self.retry.attempt_limit == 0 {
            return Err(invalid("retry attempt limit must be at least 1"));
        }

        Ok(self)
    }
}

fn invalid(message: impl Into<String>) -> WardenError {
    WardenError::ConfigurationInvalid(message.into())
}

fn assign(get: &impl Fn(&str) -> Option<String>, key: &str, target: &mut String) {
    if let Some(value) = get(key) {
        *target = value;
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> WardenResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| invalid(format!("{key}={raw}: {e}")))
        })
        .transpose()
}

fn parse_bool(get: &impl Fn(&str) -> Option<String>, key: &str) -> WardenResult<Option<bool>> {
    get(key)
        .map(|raw| match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(invalid(format!("{key}={raw}: expected a boolean"))),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = WardenConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.session.global_timeout_secs(), 3600);
        assert_eq!(config.session.session_name, "WSessionId");
        assert!(config.session.renew);
        assert!(!config.session.concurrent_login);
        assert!(!config.cookie.enabled);
        assert_eq!(config.retry.attempt_limit, 3);
        assert_eq!(config.retry.locked_duration, Duration::from_secs(120));
        assert_eq!(config.scheduler.period, Duration::from_secs(300));
    }

    #[test]
    fn test_overrides() {
        let config = WardenConfig::from_lookup(lookup(&[
            ("WARDEN_SESSION_TIMEOUT", "900"),
            ("WARDEN_SESSION_CONCURRENT_LOGIN", "yes"),
            ("WARDEN_SESSION_RENEW_RATIO", "0.25"),
            ("WARDEN_COOKIE_ENABLED", "true"),
            ("WARDEN_RETRY_ATTEMPT_LIMIT", "5"),
            ("WARDEN_AUTHORITY_USER_EXPIRE_HOURS", "2"),
            ("WARDEN_SESSION_PREFIX", "  app:sessions:  "),
        ]))
        .unwrap();

        assert_eq!(config.session.global_timeout_secs(), 900);
        assert!(config.session.concurrent_login);
        assert_eq!(config.session.ratio, 0.25);
        assert!(config.cookie.enabled);
        assert_eq!(config.retry.attempt_limit, 5);
        assert_eq!(config.authority.user_expire, Duration::from_secs(7200));
        assert_eq!(config.session.session_prefix, "app:sessions:");
    }

    #[test]
    fn test_below_minimum_falls_back() {
        let config = WardenConfig::from_lookup(lookup(&[
            ("WARDEN_SESSION_TIMEOUT", "10"),
            ("WARDEN_SCHEDULER_INITIAL_DELAY", "0"),
            ("WARDEN_SCHEDULER_PERIOD", "0"),
        ]))
        .unwrap();

        assert_eq!(config.session.global_timeout, DEFAULT_GLOBAL_TIMEOUT);
        assert_eq!(config.scheduler.initial_delay, DEFAULT_SWEEP_INITIAL_DELAY);
        assert_eq!(config.scheduler.period, DEFAULT_SWEEP_PERIOD);
    }

    #[test]
    fn test_ratio_is_clamped() {
        let mut session = SessionConfig::default();
        session.ratio = 0.95;
        assert_eq!(session.effective_ratio(), 0.9);
        session.ratio = 0.0;
        assert_eq!(session.effective_ratio(), 0.1);
        session.ratio = 0.3;
        assert_eq!(session.effective_ratio(), 0.3);
    }

    #[test]
    fn test_invalid_values_fail_fast() {
        let err = WardenConfig::from_lookup(lookup(&[("WARDEN_SESSION_TIMEOUT", "soon")]))
            .unwrap_err();
        assert!(matches!(err, WardenError::ConfigurationInvalid(_)));

        let err = WardenConfig::from_lookup(lookup(&[("WARDEN_RETRY_ATTEMPT_LIMIT", "0")]))
            .unwrap_err();
        assert!(matches!(err, WardenError::ConfigurationInvalid(_)));

        let err = WardenConfig::from_lookup(lookup(&[("WARDEN_COOKIE_SECURE", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, WardenError::ConfigurationInvalid(_)));

        let mut config = WardenConfig::default();
        config.session.active_user_key = config.session.active_session_key.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cookie_config_conversion() {
        let cookie = WardenConfig::development().cookie.to_cookie_config();
        assert_eq!(cookie.name, "WSessionId");
        assert!(!cookie.secure);
        assert!(!cookie.build_set_cookie("abc").contains("Max-Age"));
    }
}
