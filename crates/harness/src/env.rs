//! Environment overlay for spawned service instances.
//!
//! Each spawn gets a fresh map: the harness's own environment with
//! credentials blanked, then safe defaults, then `HOST`/`PORT`, then the
//! scenario's overrides. The harness process environment is never mutated.
//!
//! | Variable                      | Baseline  |
//! |-------------------------------|-----------|
//! | `ALLOW_UNAUTHENTICATED_API`   | `true`    |
//! | `STRICT_EXTERNAL_DATA`        | `false`   |
//! | `ROUTING_PROVIDER`            | `fixture` |
//! | `ENABLE_DIAGNOSTICS`          | `false`   |
//! | `PLAN_PERSISTENCE_ENABLED`    | `false`   |
//! | `ENABLE_TOOL_FAULT_INJECTION` | `false`   |

use std::collections::BTreeMap;

/// Ordered variable map passed to a spawned instance.
pub type EnvOverlay = BTreeMap<String, String>;

pub const ENV_HOST: &str = "HOST";
pub const ENV_PORT: &str = "PORT";
pub const ENV_ALLOW_UNAUTHENTICATED_API: &str = "ALLOW_UNAUTHENTICATED_API";
pub const ENV_STRICT_EXTERNAL_DATA: &str = "STRICT_EXTERNAL_DATA";
pub const ENV_ROUTING_PROVIDER: &str = "ROUTING_PROVIDER";
pub const ENV_PLAN_PERSISTENCE_ENABLED: &str = "PLAN_PERSISTENCE_ENABLED";
pub const ENV_ENABLE_DIAGNOSTICS: &str = "ENABLE_DIAGNOSTICS";
pub const ENV_ENABLE_TOOL_FAULT_INJECTION: &str = "ENABLE_TOOL_FAULT_INJECTION";
pub const ENV_TOOL_FAULT_INJECTION: &str = "TOOL_FAULT_INJECTION";
pub const ENV_TOOL_FAULT_RATE: &str = "TOOL_FAULT_RATE";
pub const ENV_RATE_LIMIT_MAX: &str = "RATE_LIMIT_MAX";
pub const ENV_RATE_LIMIT_WINDOW: &str = "RATE_LIMIT_WINDOW";

/// Offline routing provider that needs no credentials.
pub const PROVIDER_FIXTURE: &str = "fixture";

/// Routing provider backed by live external data.
pub const PROVIDER_LIVE: &str = "live";

/// Suffixes marking a variable as a provider credential.
pub const CREDENTIAL_SUFFIXES: &[&str] = &["_API_KEY", "_API_TOKEN", "_API_SECRET"];

pub fn is_credential_key(key: &str) -> bool {
    let upper = key.to_ascii_uppercase();
    CREDENTIAL_SUFFIXES
        .iter()
        .any(|suffix| upper.ends_with(suffix))
}

/// Safe defaults every scenario starts from.
pub fn baseline_defaults() -> EnvOverlay {
    [
        (ENV_ALLOW_UNAUTHENTICATED_API, "true"),
        (ENV_STRICT_EXTERNAL_DATA, "false"),
        (ENV_ROUTING_PROVIDER, PROVIDER_FIXTURE),
        (ENV_ENABLE_DIAGNOSTICS, "false"),
        (ENV_PLAN_PERSISTENCE_ENABLED, "false"),
        (ENV_ENABLE_TOOL_FAULT_INJECTION, "false"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Build the complete environment for one spawn.
///
/// `inherited` is normally `std::env::vars()`; tests pass a fixed list.
/// Credential keys stay present with an empty value so the service's own
/// dotenv loading cannot restore them.
pub fn build_environment<I>(inherited: I, host: &str, port: u16, overrides: &EnvOverlay) -> EnvOverlay
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut env: EnvOverlay = inherited
        .into_iter()
        .map(|(key, value)| {
            if is_credential_key(&key) {
                (key, String::new())
            } else {
                (key, value)
            }
        })
        .collect();

    env.extend(baseline_defaults());
    env.insert(ENV_HOST.to_string(), host.to_string());
    env.insert(ENV_PORT.to_string(), port.to_string());
    env.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    env
}

/// Convenience constructor for overlay literals.
pub fn overlay<const N: usize>(pairs: [(&str, &str); N]) -> EnvOverlay {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
