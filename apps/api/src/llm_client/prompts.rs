// Shared prompt fragments. The analysis module defines its own prompts.rs
// alongside it; this file holds the cross-cutting pieces.

/// Appended to every prompt that expects a structured reply.
pub const JSON_ONLY_INSTRUCTION: &str = "Respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Placeholder rendered for any missing candidate or job field.
pub const MISSING_FIELD: &str = "N/A";
