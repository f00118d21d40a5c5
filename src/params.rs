//! Evaluation parameters.

use crate::error::{ObbEvalError, Result};
use crate::threshold::validate_iou_thresholds;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a precision-recall curve is integrated into Average Precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ApMode {
    /// Area under the monotonic precision envelope.
    #[default]
    Area,
    /// Mean of the best precision at recall levels 0.0, 0.1, ..., 1.0.
    ElevenPoints,
}

impl FromStr for ApMode {
    type Err = ObbEvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "area" => Ok(ApMode::Area),
            "11points" | "11-point" => Ok(ApMode::ElevenPoints),
            other => Err(ObbEvalError::InvalidConfiguration(format!(
                "Unrecognized AP mode '{}', only \"area\" and \"11points\" are supported",
                other
            ))),
        }
    }
}

impl TryFrom<String> for ApMode {
    type Error = ObbEvalError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ApMode> for String {
    fn from(mode: ApMode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for ApMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApMode::Area => write!(f, "area"),
            ApMode::ElevenPoints => write!(f, "11points"),
        }
    }
}

/// Parameters of a metrics computation.
///
/// Defaults: IoU thresholds `[0.5, 0.55]`, aggregate (not classwise) metrics,
/// averaged over thresholds, area AP, parallel matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalParams {
    /// IoU thresholds a matched detection must reach to count as a true positive.
    pub iou_thresholds: Vec<f64>,
    /// Report one scope per category instead of one overall scope.
    pub classwise: bool,
    /// Collapse the per-threshold metrics of each scope into their mean.
    pub average_thresholds: bool,
    /// AP integration mode.
    pub ap_mode: ApMode,
    /// Match images on the rayon thread pool.
    pub parallel: bool,
}

impl Default for EvalParams {
    fn default() -> Self {
        Self {
            iou_thresholds: vec![0.5, 0.55],
            classwise: false,
            average_thresholds: true,
            ap_mode: ApMode::Area,
            parallel: true,
        }
    }
}

impl EvalParams {
    /// Read parameters from JSON; missing fields take their defaults.
    ///
    /// ```
    /// use obb_eval::params::{ApMode, EvalParams};
    ///
    /// let params = EvalParams::from_json_str(r#"{"classwise": true, "ap_mode": "11points"}"#).unwrap();
    /// assert!(params.classwise);
    /// assert_eq!(params.ap_mode, ApMode::ElevenPoints);
    /// assert_eq!(params.iou_thresholds, vec![0.5, 0.55]);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        let params: EvalParams = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Check that the thresholds are usable.
    pub fn validate(&self) -> Result<()> {
        validate_iou_thresholds(&self.iou_thresholds)
    }

    pub fn with_iou_thresholds(mut self, iou_thresholds: Vec<f64>) -> Self {
        self.iou_thresholds = iou_thresholds;
        self
    }

    pub fn with_classwise(mut self, classwise: bool) -> Self {
        self.classwise = classwise;
        self
    }

    pub fn with_average_thresholds(mut self, average_thresholds: bool) -> Self {
        self.average_thresholds = average_thresholds;
        self
    }

    pub fn with_ap_mode(mut self, ap_mode: ApMode) -> Self {
        self.ap_mode = ap_mode;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}
