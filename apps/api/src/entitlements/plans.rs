//! Subscription plans, metered actions, and the fixed limit table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cap sentinel meaning "no limit". Comparison logic must short-circuit on
/// this value instead of treating it as a numeric ceiling.
pub const UNLIMITED: i64 = -1;

/// The three subscription tiers. Anything unrecognized in the datastore
/// resolves to `Free`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Basic,
    Unlimited,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Unlimited => "unlimited",
        }
    }

    /// Maps a stored plan name onto a tier, defaulting unknown names to
    /// `Free` so a bad row can never grant paid limits.
    pub fn from_db(name: &str) -> Self {
        match name {
            "basic" => Self::Basic,
            "unlimited" => Self::Unlimited,
            _ => Self::Free,
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of actions the gate meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeteredAction {
    ResumeAnalysis,
    ResumeCreation,
    ResumeDownload,
    CoverLetterAnalysis,
    ResumeTailoring,
    AiSectionTailoring,
}

#[derive(Debug, Error)]
#[error("unknown action type")]
pub struct UnknownAction;

impl MeteredAction {
    pub const ALL: [MeteredAction; 6] = [
        Self::ResumeAnalysis,
        Self::ResumeCreation,
        Self::ResumeDownload,
        Self::CoverLetterAnalysis,
        Self::ResumeTailoring,
        Self::AiSectionTailoring,
    ];

    /// Wire and storage identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResumeAnalysis => "resume_analysis",
            Self::ResumeCreation => "resume_creation",
            Self::ResumeDownload => "resume_download",
            Self::CoverLetterAnalysis => "cover_letter_analysis",
            Self::ResumeTailoring => "resume_tailoring",
            Self::AiSectionTailoring => "ai_section_tailoring",
        }
    }

    /// Human-readable label for denial messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ResumeAnalysis => "resume analysis",
            Self::ResumeCreation => "resume creation",
            Self::ResumeDownload => "resume download",
            Self::CoverLetterAnalysis => "cover letter analysis",
            Self::ResumeTailoring => "resume tailoring",
            Self::AiSectionTailoring => "AI section tailoring",
        }
    }
}

impl FromStr for MeteredAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or(UnknownAction)
    }
}

impl fmt::Display for MeteredAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-plan numeric caps, one per metered action. `UNLIMITED` means no cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub resume_analyses: i64,
    pub resume_creations: i64,
    pub resume_downloads: i64,
    pub cover_letter_analyses: i64,
    pub resume_tailoring: i64,
    pub ai_section_tailoring: i64,
}

impl PlanLimits {
    pub fn cap_for(&self, action: MeteredAction) -> i64 {
        match action {
            MeteredAction::ResumeAnalysis => self.resume_analyses,
            MeteredAction::ResumeCreation => self.resume_creations,
            MeteredAction::ResumeDownload => self.resume_downloads,
            MeteredAction::CoverLetterAnalysis => self.cover_letter_analyses,
            MeteredAction::ResumeTailoring => self.resume_tailoring,
            MeteredAction::AiSectionTailoring => self.ai_section_tailoring,
        }
    }
}

/// The limit table, versioned in code and injected into the gate at
/// construction. Not runtime-configurable.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    pub free: PlanLimits,
    pub basic: PlanLimits,
    pub unlimited: PlanLimits,
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self {
            free: PlanLimits {
                resume_analyses: 3,
                resume_creations: 3,
                resume_downloads: 0,
                cover_letter_analyses: 0,
                resume_tailoring: 3,
                ai_section_tailoring: 2,
            },
            basic: PlanLimits {
                resume_analyses: 25,
                resume_creations: 25,
                resume_downloads: 10,
                cover_letter_analyses: 0,
                resume_tailoring: 25,
                ai_section_tailoring: 12,
            },
            unlimited: PlanLimits {
                resume_analyses: UNLIMITED,
                resume_creations: UNLIMITED,
                resume_downloads: UNLIMITED,
                cover_letter_analyses: UNLIMITED,
                resume_tailoring: UNLIMITED,
                ai_section_tailoring: UNLIMITED,
            },
        }
    }
}

impl PlanCatalog {
    pub fn limits_for(&self, plan: Plan) -> PlanLimits {
        match plan {
            Plan::Free => self.free,
            Plan::Basic => self.basic,
            Plan::Unlimited => self.unlimited,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_plan_caps() {
        let limits = PlanCatalog::default().limits_for(Plan::Free);
        assert_eq!(limits.resume_analyses, 3);
        assert_eq!(limits.resume_creations, 3);
        assert_eq!(limits.resume_downloads, 0);
        assert_eq!(limits.cover_letter_analyses, 0);
        assert_eq!(limits.resume_tailoring, 3);
        assert_eq!(limits.ai_section_tailoring, 2);
    }

    #[test]
    fn test_basic_plan_caps() {
        let limits = PlanCatalog::default().limits_for(Plan::Basic);
        assert_eq!(limits.resume_analyses, 25);
        assert_eq!(limits.resume_downloads, 10);
        assert_eq!(limits.cover_letter_analyses, 0);
        assert_eq!(limits.ai_section_tailoring, 12);
    }

    #[test]
    fn test_unlimited_plan_is_all_sentinel() {
        let limits = PlanCatalog::default().limits_for(Plan::Unlimited);
        for action in MeteredAction::ALL {
            assert_eq!(limits.cap_for(action), UNLIMITED);
        }
    }

    #[test]
    fn test_action_wire_names_round_trip() {
        for action in MeteredAction::ALL {
            assert_eq!(action.as_str().parse::<MeteredAction>().unwrap(), action);
        }
    }

    #[test]
    fn test_unknown_action_name_fails_to_parse() {
        assert!("cover_letter_generation".parse::<MeteredAction>().is_err());
        assert!("".parse::<MeteredAction>().is_err());
    }

    #[test]
    fn test_unknown_plan_name_maps_to_free() {
        assert_eq!(Plan::from_db("enterprise"), Plan::Free);
        assert_eq!(Plan::from_db("unlimited"), Plan::Unlimited);
        assert_eq!(Plan::from_db("basic"), Plan::Basic);
    }
}
