// Prompt template for compatibility analysis.
// Reuses the cross-cutting JSON-only fragment from llm_client::prompts.

use crate::llm_client::prompts::{JSON_ONLY_INSTRUCTION, MISSING_FIELD};
use crate::models::candidate::Candidate;
use crate::models::job::Job;

/// Output schema the model must follow. Parsing in `analyzer` assumes this shape.
pub const ANALYSIS_OUTPUT_SCHEMA: &str = r#"{
  "compatibility_score": <integer from 0 to 100>,
  "compatibility_level": "<High|Medium|Low>",
  "summary": "<2-3 line executive summary>",
  "matching_skills": ["skill1", "skill2"],
  "missing_skills": ["skill1", "skill2"],
  "strengths": ["strength 1", "strength 2", "strength 3"],
  "areas_for_improvement": ["area 1", "area 2"],
  "recommendations": ["recommendation 1", "recommendation 2"],
  "next_steps": "<next step for the candidate>",
  "experience_match": {
    "candidate_years": <integer>,
    "assessment": "<Below|Meets|Exceeds>",
    "details": "<one line>"
  },
  "salary_expectation": {
    "job_salary": "<salary as given>",
    "alignment": "<Below|Aligned|Above|Unknown>",
    "details": "<one line>"
  }
}"#;

/// Replace: {job_title}, {company}, {required_skills}, {salary},
///          {candidate_name}, {candidate_title}, {experience_years},
///          {candidate_skills}, {output_schema}, {json_only}
pub const COMPATIBILITY_PROMPT_TEMPLATE: &str = r#"You are a Human Resources and Technical Recruiting specialist with 15 years of experience.

CONTEXT:
WorkTree platform: candidate-to-job compatibility analysis.

JOB DATA:
Title: {job_title}
Company: {company}
Required Skills: {required_skills}
Salary: {salary}

CANDIDATE DATA:
Name: {candidate_name}
Current Title: {candidate_title}
Experience: {experience_years} years
Skills: {candidate_skills}

IMPORTANT: Return ONLY a valid JSON object in the following format:

{output_schema}

"experience_match" and "salary_expectation" may be omitted when there is not enough information.

{json_only}"#;

/// Builds the analysis prompt for a candidate/job pair. Pure and total:
/// missing fields render as `N/A`.
pub fn build_prompt(candidate: &Candidate, job: &Job) -> String {
    let required_skills = join_labels(&job.required_skills);
    let candidate_skills = join_labels(&candidate.skills);
    let experience_years = candidate.experience_years.to_string();

    fill_template(COMPATIBILITY_PROMPT_TEMPLATE, |key| match key {
        "job_title" => Some(or_missing(job.title.as_deref())),
        "company" => Some(or_missing(job.company.as_deref())),
        "required_skills" => Some(required_skills.as_str()),
        "salary" => Some(or_missing(job.salary.as_deref())),
        "candidate_name" => Some(or_missing(candidate.name.as_deref())),
        "candidate_title" => Some(or_missing(candidate.title.as_deref())),
        "experience_years" => Some(experience_years.as_str()),
        "candidate_skills" => Some(candidate_skills.as_str()),
        "output_schema" => Some(ANALYSIS_OUTPUT_SCHEMA),
        "json_only" => Some(JSON_ONLY_INSTRUCTION),
        _ => None,
    })
}

/// Single pass over `template`. Inserted values are copied as-is and never
/// scanned for placeholders; unknown `{...}` spans are kept literally.
fn fill_template<'a>(template: &str, value_for: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(template.len() * 2);
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let filled = after
            .find('}')
            .and_then(|end| value_for(&after[..end]).map(|value| (end, value)));

        match filled {
            Some((end, value)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

fn or_missing(value: Option<&str>) -> &str {
    value.unwrap_or(MISSING_FIELD)
}

fn join_labels(labels: &[String]) -> String {
    if labels.is_empty() {
        MISSING_FIELD.to_string()
    } else {
        labels.join(", ")
    }
}
