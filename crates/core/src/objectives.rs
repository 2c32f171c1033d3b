//! Objectives file model, parsing, and validation.
//!
//! Two JSON shapes are accepted:
//!
//! - a flat array of [`Objective`]s (the legacy "custom" profile), or
//! - an object with a `profiles` map and an optional `auto` block.
//!
//! ```json
//! {
//!   "profiles": {
//!     "realtime": [{"name": "p95", "metric": "p95_latency_ms", "op": "<=", "target": 3000}],
//!     "degraded": [{"name": "p95", "metric": "p95_latency_ms", "op": "<=", "target": 8000}]
//!   },
//!   "auto": {"realtime_l0_ratio_min": 0.3, "default_profile": "degraded"}
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::metric_names::{
    METRIC_L0_RATIO, METRIC_L3_RATIO, METRIC_P95_LATENCY_MS, METRIC_SUCCESS_RATE,
    METRIC_TOOL_ERROR_RATE,
};

/// Tolerance used by [`Operator::Eq`].
pub const EQ_EPSILON: f64 = 1e-9;

/// Default `auto.realtime_l0_ratio_min`.
pub const DEFAULT_REALTIME_L0_RATIO_MIN: f64 = 0.3;

/// Default `auto.default_profile`.
pub const DEFAULT_AUTO_PROFILE: &str = "degraded";

// ---------------------------------------------------------------------------
// Operator
// ---------------------------------------------------------------------------

/// Scalar comparison applied as `actual <op> target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "==")]
    Eq,
}

impl Operator {
    pub fn apply(self, actual: f64, target: f64) -> bool {
        match self {
            Self::Gte => actual >= target,
            Self::Lte => actual <= target,
            Self::Gt => actual > target,
            Self::Lt => actual < target,
            Self::Eq => (actual - target).abs() <= EQ_EPSILON,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Eq => "==",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Objective
// ---------------------------------------------------------------------------

/// One `metric <op> target` threshold check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub name: String,
    /// Derived metric key. Unknown keys evaluate as `0.0`.
    pub metric: String,
    #[serde(alias = "operator")]
    pub op: Operator,
    pub target: f64,
}

impl Objective {
    pub fn new(name: impl Into<String>, metric: impl Into<String>, op: Operator, target: f64) -> Self {
        Self {
            name: name.into(),
            metric: metric.into(),
            op,
            target,
        }
    }
}

// ---------------------------------------------------------------------------
// ObjectivesConfig
// ---------------------------------------------------------------------------

/// Auto-inference settings for the `profiles` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoProfileConfig {
    #[serde(default = "default_realtime_l0_ratio_min")]
    pub realtime_l0_ratio_min: f64,
    #[serde(default = "default_auto_profile")]
    pub default_profile: String,
}

impl Default for AutoProfileConfig {
    fn default() -> Self {
        Self {
            realtime_l0_ratio_min: DEFAULT_REALTIME_L0_RATIO_MIN,
            default_profile: DEFAULT_AUTO_PROFILE.to_string(),
        }
    }
}

fn default_realtime_l0_ratio_min() -> f64 {
    DEFAULT_REALTIME_L0_RATIO_MIN
}

fn default_auto_profile() -> String {
    DEFAULT_AUTO_PROFILE.to_string()
}

/// Named objective lists plus optional auto-inference settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSet {
    pub profiles: BTreeMap<String, Vec<Objective>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto: Option<AutoProfileConfig>,
}

impl ProfileSet {
    /// Profile names in sorted order, for error messages.
    pub fn names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }
}

/// Either shape of the objectives file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ObjectivesConfig {
    /// Legacy flat list, always resolved as the `custom` profile.
    Flat(Vec<Objective>),
    Profiles(ProfileSet),
}

impl ObjectivesConfig {
    /// Parse and validate an objectives file body.
    pub fn from_json_str(raw: &str) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| CoreError::MalformedObjectivesConfig(format!("invalid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Validate an already-parsed JSON document.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        let config = if value.is_array() {
            let objectives: Vec<Objective> = serde_json::from_value(value).map_err(|e| {
                CoreError::MalformedObjectivesConfig(format!("invalid objective list: {e}"))
            })?;
            Self::Flat(objectives)
        } else if value.is_object() {
            if value.get("profiles").is_none() {
                return Err(CoreError::MalformedObjectivesConfig(
                    "object form requires a 'profiles' map".to_string(),
                ));
            }
            let set: ProfileSet = serde_json::from_value(value).map_err(|e| {
                CoreError::MalformedObjectivesConfig(format!("invalid profiles config: {e}"))
            })?;
            Self::Profiles(set)
        } else {
            return Err(CoreError::MalformedObjectivesConfig(
                "expected an array of objectives or an object with 'profiles'".to_string(),
            ));
        };

        config.validate()?;
        Ok(config)
    }

    /// Check structural invariants not expressible in the serde model.
    pub fn validate(&self) -> Result<(), CoreError> {
        let lists: Vec<(&str, &[Objective])> = match self {
            Self::Flat(list) => vec![("custom", list.as_slice())],
            Self::Profiles(set) => {
                if set.profiles.is_empty() {
                    return Err(CoreError::MalformedObjectivesConfig(
                        "'profiles' must not be empty".to_string(),
                    ));
                }
                if let Some(auto) = &set.auto {
                    if auto.default_profile.trim().is_empty() {
                        return Err(CoreError::MalformedObjectivesConfig(
                            "'auto.default_profile' must not be empty".to_string(),
                        ));
                    }
                    if !auto.realtime_l0_ratio_min.is_finite() {
                        return Err(CoreError::MalformedObjectivesConfig(
                            "'auto.realtime_l0_ratio_min' must be a finite number".to_string(),
                        ));
                    }
                }
                set.profiles
                    .iter()
                    .map(|(name, list)| (name.as_str(), list.as_slice()))
                    .collect()
            }
        };

        for (profile, objectives) in lists {
            for objective in objectives {
                if objective.name.trim().is_empty() || objective.metric.trim().is_empty() {
                    return Err(CoreError::MalformedObjectivesConfig(format!(
                        "profile '{profile}' has an objective with an empty name or metric"
                    )));
                }
                if !objective.target.is_finite() {
                    return Err(CoreError::MalformedObjectivesConfig(format!(
                        "objective '{}' in profile '{profile}' has a non-finite target",
                        objective.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Built-in profiles used when no objectives file is supplied.
    pub fn builtin() -> Self {
        let realtime = vec![
            Objective::new("success_rate", METRIC_SUCCESS_RATE, Operator::Gte, 0.99),
            Objective::new("p95_latency", METRIC_P95_LATENCY_MS, Operator::Lte, 3000.0),
            Objective::new("tool_error_rate", METRIC_TOOL_ERROR_RATE, Operator::Lte, 0.05),
            Objective::new("realtime_share", METRIC_L0_RATIO, Operator::Gte, 0.3),
        ];
        let degraded = vec![
            Objective::new("success_rate", METRIC_SUCCESS_RATE, Operator::Gte, 0.95),
            Objective::new("p95_latency", METRIC_P95_LATENCY_MS, Operator::Lte, 8000.0),
            Objective::new("tool_error_rate", METRIC_TOOL_ERROR_RATE, Operator::Lte, 0.2),
            Objective::new("fallback_share", METRIC_L3_RATIO, Operator::Lte, 0.5),
        ];

        Self::Profiles(ProfileSet {
            profiles: BTreeMap::from([
                ("realtime".to_string(), realtime),
                ("degraded".to_string(), degraded),
            ]),
            auto: Some(AutoProfileConfig::default()),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
