//! Pace levels and per-task pace inclusion.
//!
//! A template task says which paces it belongs to. Older templates stored this
//! as a `low_safe` / `flow_extra` pair; [`PaceFlags::resolve`] turns either
//! encoding into a [`PaceInclusion`] once, at load time. Filtering only ever
//! looks at the resolved value.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::TemplateTask;

/// Coarse energy level chosen when a run is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pace {
    Low,
    #[default]
    Steady,
    Flow,
}

impl Pace {
    pub const ALL: [Pace; 3] = [Pace::Low, Pace::Steady, Pace::Flow];

    pub fn as_str(&self) -> &'static str {
        match self {
            Pace::Low => "low",
            Pace::Steady => "steady",
            Pace::Flow => "flow",
        }
    }
}

impl fmt::Display for Pace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Pace::Low),
            "steady" => Ok(Pace::Steady),
            "flow" => Ok(Pace::Flow),
            other => Err(format!("unknown pace '{other}' (expected low, steady or flow)")),
        }
    }
}

/// Which paces a template task is shown for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaceInclusion {
    pub low: bool,
    pub steady: bool,
    pub flow: bool,
}

impl PaceInclusion {
    pub const ALL: PaceInclusion = PaceInclusion {
        low: true,
        steady: true,
        flow: true,
    };

    pub const STEADY_ONLY: PaceInclusion = PaceInclusion {
        low: false,
        steady: true,
        flow: false,
    };

    pub const FLOW_ONLY: PaceInclusion = PaceInclusion {
        low: false,
        steady: false,
        flow: true,
    };

    pub fn includes(&self, pace: Pace) -> bool {
        match pace {
            Pace::Low => self.low,
            Pace::Steady => self.steady,
            Pace::Flow => self.flow,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.low || self.steady || self.flow)
    }

    /// Map the legacy two-flag encoding.
    ///
    /// A low-safe task is promoted to every pace, not just low and steady.
    pub fn from_legacy(low_safe: bool, flow_extra: bool) -> Self {
        match (low_safe, flow_extra) {
            (true, _) => Self::ALL,
            (false, true) => Self::FLOW_ONLY,
            (false, false) => Self::STEADY_ONLY,
        }
    }
}

impl Default for PaceInclusion {
    fn default() -> Self {
        Self::STEADY_ONLY
    }
}

/// Pace flags as found on disk, before resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaceFlags {
    /// Current per-pace flags. Missing entries count as `false`.
    Current {
        low: Option<bool>,
        steady: Option<bool>,
        flow: Option<bool>,
    },
    /// Pre-pace-mode encoding.
    Legacy { low_safe: bool, flow_extra: bool },
    /// Neither encoding present.
    Unset,
}

impl PaceFlags {
    /// Pick the encoding present in a raw record. Current flags win when any
    /// of them is set.
    pub fn detect(
        low: Option<bool>,
        steady: Option<bool>,
        flow: Option<bool>,
        low_safe: Option<bool>,
        flow_extra: Option<bool>,
    ) -> Self {
        if low.is_some() || steady.is_some() || flow.is_some() {
            PaceFlags::Current { low, steady, flow }
        } else if low_safe.is_some() || flow_extra.is_some() {
            PaceFlags::Legacy {
                low_safe: low_safe.unwrap_or(false),
                flow_extra: flow_extra.unwrap_or(false),
            }
        } else {
            PaceFlags::Unset
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, PaceFlags::Legacy { .. })
    }

    /// Resolve to an inclusion set. A task that ends up in no pace at all is
    /// treated as steady-only.
    pub fn resolve(self) -> PaceInclusion {
        let inclusion = match self {
            PaceFlags::Current { low, steady, flow } => PaceInclusion {
                low: low.unwrap_or(false),
                steady: steady.unwrap_or(false),
                flow: flow.unwrap_or(false),
            },
            PaceFlags::Legacy {
                low_safe,
                flow_extra,
            } => PaceInclusion::from_legacy(low_safe, flow_extra),
            PaceFlags::Unset => PaceInclusion::STEADY_ONLY,
        };
        if inclusion.is_empty() {
            PaceInclusion::STEADY_ONLY
        } else {
            inclusion
        }
    }
}

/// Tasks visible at `pace`, in their original order.
pub fn visible_tasks(tasks: &[TemplateTask], pace: Pace) -> Vec<&TemplateTask> {
    tasks.iter().filter(|t| t.paces.includes(pace)).collect()
}
