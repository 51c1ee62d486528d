//! Prompt templates for resume analysis.

pub const ANALYSIS_SYSTEM: &str = "You are an experienced technical recruiter and resume reviewer. \
You respond with valid JSON only, no prose and no markdown fences.";

/// Placeholders: {resume_text}, {target_role}, {job_description}.
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"Analyze the resume below for the target role.

Target role: {target_role}

Job description (may be empty):
{job_description}

Resume:
{resume_text}

Return a JSON object with exactly this shape:
{
  "overall_score": <integer 0-100>,
  "dimension_scores": [
    {"dimension": "<name>", "score": <integer 0-100>, "commentary": "<one sentence>"}
  ],
  "strengths": ["<specific strength>", ...],
  "improvements": ["<specific, actionable improvement>", ...],
  "summary": "<two or three sentences on overall fit>"
}

Score the dimensions "relevance", "impact", and "clarity". Be concrete:
reference actual lines from the resume in strengths and improvements."#;

/// Fills the analysis template.
pub fn build_analysis_prompt(
    resume_text: &str,
    target_role: &str,
    job_description: Option<&str>,
) -> String {
    ANALYSIS_PROMPT_TEMPLATE
        .replace("{resume_text}", resume_text)
        .replace("{target_role}", target_role)
        .replace("{job_description}", job_description.unwrap_or("(not provided)"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_substitutes_all_placeholders() {
        let prompt = build_analysis_prompt("my resume body", "Platform Engineer", Some("build things"));
        assert!(prompt.contains("my resume body"));
        assert!(prompt.contains("Platform Engineer"));
        assert!(prompt.contains("build things"));
        assert!(!prompt.contains("{resume_text}"));
        assert!(!prompt.contains("{target_role}"));
    }

    #[test]
    fn test_prompt_handles_missing_job_description() {
        let prompt = build_analysis_prompt("resume", "Engineer", None);
        assert!(prompt.contains("(not provided)"));
    }
}
