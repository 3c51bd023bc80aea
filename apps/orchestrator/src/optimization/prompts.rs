// All LLM prompt constants for the optimization pipeline.
// The JSON-only fragment and schema are appended by the backend.

/// System prompt for entity extraction.
pub const EXTRACTION_SYSTEM: &str = "You are a resume parser. Extract structured information from the resume.

Return JSON with ALL of these fields (use empty list [] if not found):
- skills: list of technical and soft skills (required, use [] if none)
- tools: list of tools/technologies mentioned (required, use [] if none)
- education: list of degrees/certifications (required, use [] if none)
- experience: list of {role, company, duration, highlights} (required, use [] if none)
- contact: {email, phone, linkedin} or null if not found

IMPORTANT: Always include all fields in your response, even if empty. Be thorough but concise.";

/// System prompt for resume/JD alignment analysis.
pub const ALIGNMENT_SYSTEM: &str = "You are a resume-job matcher. Analyze alignment between resume and job description.

Return JSON with ALL of these fields (use empty list [] if none):
- matched: skills/requirements that both resume and job have (required, use [] if none)
- missing: requirements in job that resume lacks (required, use [] if none)
- weak: areas where resume partially matches but needs improvement (required, use [] if none)
- evidence: list of {source: \"resume\"|\"job\", snippet: \"...\", note: \"explanation\"} (required, use [] if none)

IMPORTANT: Always include all fields in your response. Focus on concrete, actionable insights.";

/// Alignment user prompt. Replace: {skills}, {job_description}
pub const ALIGNMENT_PROMPT_TEMPLATE: &str = "Resume Skills: {skills}

Job Description:
{job_description}";

/// Rewrite system prompt. Replace: {language_instructions}
pub const REWRITE_SYSTEM_TEMPLATE: &str = "You are an expert resume optimization assistant.
Analyze the resume against the job description and provide ALL of the following:
1. score: A match score from 0-100 (integer, required)
2. missing_keywords: Keywords from JD missing in resume (list of strings, required - use [] if none)
3. covered_keywords: Keywords from JD already in resume (list of strings, required - use [] if none)
4. change_log: Specific changes to make (list of strings, required - use [] if none)
5. preview_text: An improved resume in Markdown format (string, required)

IMPORTANT: Always include ALL 5 fields in your response. Respond in valid JSON format.

{language_instructions}";

/// Rewrite user prompt. Replace: {resume_text}, {job_description}, {instructions}
pub const REWRITE_PROMPT_TEMPLATE: &str = "Resume:
{resume_text}

Job Description:
{job_description}

Additional Instructions:
{instructions}";

/// Translation system prompt. Replace: {target_language}
pub const TRANSLATION_SYSTEM_TEMPLATE: &str = "You are a professional translator.
Translate the resume into {target_language}.

Rules:
- Preserve Markdown formatting and headings.
- Keep names, emails, URLs, and proper nouns as-is.
- Output ONLY the translated Markdown.";

/// Change-log entry recorded when the rewrite never produced a valid result.
pub const REWRITE_FAILED_CHANGE: &str = "Error: Failed to parse LLM response after retries";

/// Fills `{name}` placeholders in one pass, so substituted text is never re-scanned.
/// Unknown placeholders are left as-is.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let hit = vars
            .iter()
            .find(|(key, _)| tail.starts_with(key) && tail[key.len()..].starts_with('}'));
        match hit {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }

    out.push_str(rest);
    out
}
