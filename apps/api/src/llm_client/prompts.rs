// Shared prompt constants and prompt-building utilities.
// Each pipeline that needs LLM calls defines its own prompts alongside it.
// This file contains cross-cutting prompt fragments.

/// Closing instruction that forbids prose around the JSON payload.
pub const JSON_ONLY_INSTRUCTION: &str = "\
    Return ONLY the JSON array in the exact format shown above. \
    Do NOT add commentary, markdown, code fences, or explanations before or after it.";

/// Renders the user-supplied override as a delimited block.
/// Returns an empty string when there is nothing to override.
pub fn priority_override_block(instruction: Option<&str>) -> String {
    match instruction.map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => format!(
            "\nADDITIONAL INSTRUCTION (PRIORITY OVERRIDE):\n{text}\n\n\
             Note: The above additional instruction should modify your approach, output format, \
             or analysis method as specified. Integrate this instruction with the base requirements below.\n"
        ),
        None => String::new(),
    }
}
