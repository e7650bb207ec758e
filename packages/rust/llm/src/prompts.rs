// Cross-cutting prompt fragments. Task-specific prompts live next to the
// code that issues them.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Appended to every prompt whose output describes a real person.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Every claim you write must be traceable to one of the numbered facts \
    provided in the context (F1, F2, ...). Do NOT infer, interpolate, or invent \
    details about either party. If the facts do not support a claim, omit it. \
    List the ids of every fact you relied on in the `fact_ids` field.";

/// Build a system prompt from a role description plus the JSON rule.
pub fn system_prompt(role: &str) -> String {
    format!("{role}\n\n{JSON_ONLY_SYSTEM}")
}
