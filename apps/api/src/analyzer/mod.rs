//! Resume analysis, behind a pluggable trait.
//!
//! `LlmAnalyzer` is the production backend (Claude via the Messages API).
//! `HeuristicAnalyzer` is a pure-Rust keyword backend used when no API key
//! is configured, and in tests: fast, deterministic, no network.
//!
//! `AppState` holds an `Arc<dyn ResumeAnalyzer>`, selected at startup.

pub mod client;
pub mod handlers;
pub mod prompts;

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::analyzer::client::LlmClient;
use crate::analyzer::prompts::{build_analysis_prompt, ANALYSIS_SYSTEM};
use crate::errors::AppError;

/// One scored dimension of an analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension: String,
    pub score: u32, // 0 - 100
    pub commentary: String,
}

/// Full analysis returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub overall_score: u32, // 0 - 100
    pub dimension_scores: Vec<DimensionScore>,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub summary: String,
}

/// The analysis capability. Handlers depend on this trait only; swapping
/// backends never touches endpoint or gate code.
#[async_trait]
pub trait ResumeAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        resume_text: &str,
        target_role: &str,
        job_description: Option<&str>,
    ) -> Result<AnalysisReport, AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// LlmAnalyzer
// ────────────────────────────────────────────────────────────────────────────

/// Production analyzer backed by the Messages API.
pub struct LlmAnalyzer {
    client: LlmClient,
}

impl LlmAnalyzer {
    pub fn new(api_key: String) -> Self {
        Self {
            client: LlmClient::new(api_key),
        }
    }
}

#[async_trait]
impl ResumeAnalyzer for LlmAnalyzer {
    async fn analyze(
        &self,
        resume_text: &str,
        target_role: &str,
        job_description: Option<&str>,
    ) -> Result<AnalysisReport, AppError> {
        let prompt = build_analysis_prompt(resume_text, target_role, job_description);
        let mut report: AnalysisReport = self
            .client
            .call_json(&prompt, ANALYSIS_SYSTEM)
            .await
            .map_err(|e| AppError::Llm(format!("resume analysis failed: {e}")))?;

        report.overall_score = report.overall_score.min(100);
        for dim in &mut report.dimension_scores {
            dim.score = dim.score.min(100);
        }
        Ok(report)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// HeuristicAnalyzer
// ────────────────────────────────────────────────────────────────────────────

/// Keyword-coverage analyzer. Scores how much of the role and job
/// description vocabulary the resume covers. No model call involved.
pub struct HeuristicAnalyzer;

#[async_trait]
impl ResumeAnalyzer for HeuristicAnalyzer {
    async fn analyze(
        &self,
        resume_text: &str,
        target_role: &str,
        job_description: Option<&str>,
    ) -> Result<AnalysisReport, AppError> {
        Ok(heuristic_report(resume_text, target_role, job_description))
    }
}

fn heuristic_report(
    resume_text: &str,
    target_role: &str,
    job_description: Option<&str>,
) -> AnalysisReport {
    let resume_words = keywords(resume_text);
    let mut wanted = keywords(target_role);
    if let Some(jd) = job_description {
        wanted.extend(keywords(jd));
    }

    let (matched, missing): (Vec<_>, Vec<_>) = wanted
        .iter()
        .partition(|kw| resume_words.contains(kw.as_str()));

    let coverage = if wanted.is_empty() {
        0.0
    } else {
        matched.len() as f64 / wanted.len() as f64
    };
    let relevance = (coverage * 100.0).round() as u32;

    // Quantified bullets are the strongest single signal a reviewer scans
    // for, so impact is scored on digit density.
    let quantified_lines = resume_text
        .lines()
        .filter(|l| l.chars().any(|c| c.is_ascii_digit()))
        .count();
    let impact = ((quantified_lines as f64 / resume_text.lines().count().max(1) as f64)
        * 100.0)
        .round()
        .min(100.0) as u32;

    let word_total = resume_text.split_whitespace().count();
    let clarity: u32 = if (150..=900).contains(&word_total) {
        85
    } else if word_total < 150 {
        55
    } else {
        65
    };

    let overall_score = ((relevance * 2 + impact + clarity) / 4).min(100);

    let strengths: Vec<String> = matched
        .iter()
        .take(5)
        .map(|kw| format!("Covers '{kw}' from the role requirements"))
        .collect();
    let improvements: Vec<String> = missing
        .iter()
        .take(5)
        .map(|kw| format!("No mention of '{kw}'; add evidence if you have it"))
        .collect();

    AnalysisReport {
        overall_score,
        dimension_scores: vec![
            DimensionScore {
                dimension: "relevance".to_string(),
                score: relevance,
                commentary: format!(
                    "Matches {} of {} role keywords",
                    matched.len(),
                    wanted.len()
                ),
            },
            DimensionScore {
                dimension: "impact".to_string(),
                score: impact,
                commentary: format!("{quantified_lines} line(s) carry quantified results"),
            },
            DimensionScore {
                dimension: "clarity".to_string(),
                score: clarity,
                commentary: format!("{word_total} words total"),
            },
        ],
        strengths,
        improvements,
        summary: format!(
            "Keyword coverage is {:.0}% for the target role. \
             Strengthen the gaps listed under improvements.",
            coverage * 100.0
        ),
    }
}

/// Lowercased, deduplicated tokens worth matching on. Short words are
/// connective tissue, not skills.
fn keywords(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '+' && c != '#')
        .filter(|w| w.chars().count() > 3)
        .map(|w| w.to_lowercase())
        .collect()
}
