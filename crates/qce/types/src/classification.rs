use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Policy area classification used for context-aware calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyArea {
    Fiscal,
    Social,
    Infrastructure,
    Environmental,
    Governance,
    Economic,
    Health,
    Education,
    Security,
    Culture,
}

impl PolicyArea {
    pub const ALL: [PolicyArea; 10] = [
        PolicyArea::Fiscal,
        PolicyArea::Social,
        PolicyArea::Infrastructure,
        PolicyArea::Environmental,
        PolicyArea::Governance,
        PolicyArea::Economic,
        PolicyArea::Health,
        PolicyArea::Education,
        PolicyArea::Security,
        PolicyArea::Culture,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fiscal => "fiscal",
            Self::Social => "social",
            Self::Infrastructure => "infrastructure",
            Self::Environmental => "environmental",
            Self::Governance => "governance",
            Self::Economic => "economic",
            Self::Health => "health",
            Self::Education => "education",
            Self::Security => "security",
            Self::Culture => "culture",
        }
    }
}

impl fmt::Display for PolicyArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyArea {
    type Err = UnknownClassification;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|area| area.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownClassification(s.to_string()))
    }
}

/// Unit of analysis a question targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitOfAnalysis {
    BaselineGap,
    Intervention,
    Outcome,
    Mechanism,
    Context,
    Timeframe,
    Stakeholder,
    Resource,
    Risk,
    Assumption,
}

impl UnitOfAnalysis {
    pub const ALL: [UnitOfAnalysis; 10] = [
        UnitOfAnalysis::BaselineGap,
        UnitOfAnalysis::Intervention,
        UnitOfAnalysis::Outcome,
        UnitOfAnalysis::Mechanism,
        UnitOfAnalysis::Context,
        UnitOfAnalysis::Timeframe,
        UnitOfAnalysis::Stakeholder,
        UnitOfAnalysis::Resource,
        UnitOfAnalysis::Risk,
        UnitOfAnalysis::Assumption,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BaselineGap => "baseline_gap",
            Self::Intervention => "intervention",
            Self::Outcome => "outcome",
            Self::Mechanism => "mechanism",
            Self::Context => "context",
            Self::Timeframe => "timeframe",
            Self::Stakeholder => "stakeholder",
            Self::Resource => "resource",
            Self::Risk => "risk",
            Self::Assumption => "assumption",
        }
    }
}

impl fmt::Display for UnitOfAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitOfAnalysis {
    type Err = UnknownClassification;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|unit| unit.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownClassification(s.to_string()))
    }
}

/// A classification label that matches no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown classification: {0}")]
pub struct UnknownClassification(pub String);
