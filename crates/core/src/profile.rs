//! Profile selection: explicit name, legacy flat list, or auto-inference.
//!
//! Auto-inference looks at the share of full-quality (`L0`) traffic in the
//! snapshot. When it reaches `auto.realtime_l0_ratio_min` and a `realtime`
//! profile exists, that profile is used; otherwise `auto.default_profile`.

use crate::error::CoreError;
use crate::metrics::{DerivedMetrics, MetricsSnapshot};
use crate::objectives::{Objective, ObjectivesConfig, ProfileSet};

/// Request value that triggers auto-inference.
pub const PROFILE_AUTO: &str = "auto";

/// Name reported for the legacy flat-list shape.
pub const PROFILE_CUSTOM: &str = "custom";

/// Profile selected when traffic is predominantly full quality.
pub const PROFILE_REALTIME: &str = "realtime";

/// Fallback profile name when the config does not set one.
pub const PROFILE_DEGRADED: &str = "degraded";

/// The outcome of profile resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProfile {
    pub name: String,
    pub objectives: Vec<Objective>,
}

/// Pick the objective list to evaluate.
///
/// A flat-list config ignores `requested` entirely and resolves as
/// [`PROFILE_CUSTOM`].
pub fn resolve(
    snapshot: &MetricsSnapshot,
    config: &ObjectivesConfig,
    requested: &str,
) -> Result<ResolvedProfile, CoreError> {
    let set = match config {
        ObjectivesConfig::Flat(objectives) => {
            return Ok(ResolvedProfile {
                name: PROFILE_CUSTOM.to_string(),
                objectives: objectives.clone(),
            })
        }
        ObjectivesConfig::Profiles(set) => set,
    };

    if set.profiles.is_empty() {
        return Err(CoreError::MalformedObjectivesConfig(
            "'profiles' must not be empty".to_string(),
        ));
    }

    let name = if requested == PROFILE_AUTO {
        infer_profile(snapshot, set).to_string()
    } else {
        requested.to_string()
    };

    match set.profiles.get(&name) {
        Some(objectives) => Ok(ResolvedProfile {
            name,
            objectives: objectives.clone(),
        }),
        None => Err(CoreError::UnknownProfile {
            requested: name,
            available: set.names(),
        }),
    }
}

/// Choose a profile name from traffic mix. The returned name may still be
/// absent from `set`, in which case [`resolve`] reports it as unknown.
fn infer_profile<'a>(snapshot: &MetricsSnapshot, set: &'a ProfileSet) -> &'a str {
    let (threshold, default_profile) = match &set.auto {
        Some(auto) => (auto.realtime_l0_ratio_min, auto.default_profile.as_str()),
        None => (
            crate::objectives::DEFAULT_REALTIME_L0_RATIO_MIN,
            PROFILE_DEGRADED,
        ),
    };

    let derived = DerivedMetrics::derive(snapshot);
    if derived.l0_ratio >= threshold && set.profiles.contains_key(PROFILE_REALTIME) {
        PROFILE_REALTIME
    } else {
        default_profile
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
