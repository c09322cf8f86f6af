// Prompt templates for intent classification and the three section enhancers.
// Each template opens with a `TASK:` line that is unique per stage.

/// Intent classification prompt. Replace `{history}` and `{user_input}`.
pub const INTENT_PROMPT_TEMPLATE: &str = r#"TASK: CLASSIFY RESUME ASSISTANT INTENT

You are the front desk of a resume enhancement assistant. The assistant supports exactly two modes:
1. Tailoring the resume to a specific job description the user pastes in.
2. Enhancing the whole resume for a target profession or industry the user names.

Classify the user's latest message into exactly one intent:
- "CONVERSATION": greetings, small talk, questions about what the assistant can do.
- "JOB_DESCRIPTION_REQUEST": the user wants the resume tailored to a job. If the message (or the conversation) contains the job description text itself, copy the COMPLETE text into "jobDescription".
- "OVERALL_ENHANCE_REQUEST": the user wants a general improvement but has not named a profession or industry.
- "PROVIDE_PROFESSION": the user names a target profession, role, or industry (possibly answering an earlier question). Put it in "profession".
- "INVALID": anything unrelated to improving this resume.

Return a JSON object:
{
  "intent": "PROVIDE_PROFESSION",
  "jobDescription": null,
  "profession": "Backend Engineer"
}

CONVERSATION SO FAR:
{history}

LATEST USER MESSAGE:
{user_input}"#;

/// Summary and skills prompt. Replace `{target}`, `{max_words}`, `{style_instruction}`,
/// `{identifier_instruction}` and `{input_json}`.
pub const SUMMARY_SKILLS_PROMPT_TEMPLATE: &str = r#"TASK: ENHANCE SUMMARY AND SKILLS

{target}

{identifier_instruction}

{style_instruction}

RULES:
1. Rewrite the professional summary in at most {max_words} words. One paragraph, no line breaks.
2. Normalize every skill name to its canonical industry name (e.g. "JS" -> "JavaScript", "k8s" -> "Kubernetes", "ML" -> "Machine Learning").
3. When a skill has no level, infer one of "Beginner", "Intermediate", "Advanced", "Expert" from the rest of the input. Keep existing levels unless clearly wrong.
4. Return every skill you keep inside the category it came from. Drop nothing you were not asked to drop; add nothing.

INPUT:
{input_json}

Return a JSON object:
{
  "personalInfo": {"summary": "..."},
  "skillCategories": [
    {"id": "<category id>", "skills": [{"id": "<skill id>", "name": "JavaScript", "level": "Advanced"}]}
  ]
}"#;

/// Projects prompt. Replace `{target}`, `{max_words}`, `{style_instruction}`,
/// `{identifier_instruction}` and `{input_json}`.
pub const PROJECTS_PROMPT_TEMPLATE: &str = r#"TASK: ENHANCE PROJECT DESCRIPTIONS

{target}

{identifier_instruction}

{style_instruction}

RULES:
1. Rewrite ONLY the "description" of each project, in at most {max_words} words.
2. Structure: one short overview sentence on the first line, then 2 to 4 achievement statements, one per line, separated by newline characters.
3. Each achievement is a single line that names what was built and its measurable effect.
4. Use only facts present in the input description; do not invent technologies or employers.

INPUT:
{input_json}

Return a JSON object:
{
  "projects": [{"id": "<project id>", "description": "Overview sentence.\nAchievement one.\nAchievement two."}]
}"#;

/// Experiences prompt. Replace `{target}`, `{max_words}`, `{style_instruction}`,
/// `{identifier_instruction}` and `{input_json}`.
pub const EXPERIENCES_PROMPT_TEMPLATE: &str = r#"TASK: ENHANCE EXPERIENCE DESCRIPTIONS

{target}

{identifier_instruction}

{style_instruction}

RULES:
1. Rewrite ONLY the "description" of each experience, in at most {max_words} words.
2. Produce 3 to 5 achievement statements separated by newline characters. No overview line.
3. Each statement is one line: action verb, what was done, quantified outcome.
4. Use only facts present in the input description; estimates must stay plausible for the role.

INPUT:
{input_json}

Return a JSON object:
{
  "experiences": [{"id": "<experience id>", "description": "Achievement one.\nAchievement two.\nAchievement three."}]
}"#;

/// Fills `{name}` placeholders in one left-to-right pass. Substituted values are never
/// rescanned, so user text containing `{user_input}` or `{input_json}` stays literal.
/// Braces that do not name a known placeholder (the JSON examples) are kept as-is.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let candidate = &rest[open + 1..];
        let matched = vars.iter().find(|(name, _)| {
            candidate.starts_with(name) && candidate[name.len()..].starts_with('}')
        });
        match matched {
            Some((name, value)) => {
                out.push_str(value);
                rest = &candidate[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = candidate;
            }
        }
    }

    out.push_str(rest);
    out
}
