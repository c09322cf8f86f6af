// Shared prompt fragments for every generative call.
// Each stage that calls the service keeps its own templates next to it; this file holds
// the cross-cutting pieces.

/// System instruction that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant for resume writing. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT include explanations or apologies.";

/// Appended to every enhancer prompt. Identifiers are owned by the document store.
pub const IDENTIFIER_INSTRUCTION: &str = "\
    CRITICAL: Every object you return must carry the exact `id` value it was given. \
    NEVER invent, renumber, or omit ids. NEVER add entries that were not in the input.";

/// Formatting rules shared by all rewritten text.
pub const STYLE_INSTRUCTION: &str = "\
    STYLE: Start statements with strong action verbs. Quantify impact with numbers, \
    percentages, or scale wherever the input supports it. \
    Do NOT use bullet characters (•, -, *, ▪) anywhere in the text.";
