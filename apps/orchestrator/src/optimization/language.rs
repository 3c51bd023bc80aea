//! Output-language handling: the language directive for the rewrite prompt and
//! the Arabic-script heuristic that decides whether a translation pass is needed.

/// Share of Arabic-script letters that separates "Arabic" from "not Arabic" text.
pub const ARABIC_RATIO_THRESHOLD: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Arabic,
}

impl Language {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "en" => Some(Language::English),
            "ar" => Some(Language::Arabic),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Arabic => "ar",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Arabic => "Arabic",
        }
    }
}

/// Unknown or missing codes render as English.
fn label_for(code: Option<&str>) -> &'static str {
    code.and_then(Language::from_code)
        .unwrap_or(Language::English)
        .label()
}

/// Output language: the desired one, else the resume's, else English.
pub fn target_language(resume_lang: Option<&str>, desired_output_lang: Option<&str>) -> Language {
    desired_output_lang
        .and_then(Language::from_code)
        .or_else(|| resume_lang.and_then(Language::from_code))
        .unwrap_or(Language::English)
}

/// Instruction block naming the three languages, appended to the rewrite system prompt.
pub fn build_language_instructions(
    resume_lang: Option<&str>,
    jd_lang: Option<&str>,
    desired_output_lang: Option<&str>,
) -> String {
    let target_label = target_language(resume_lang, desired_output_lang).label();
    let resume_label = label_for(resume_lang);
    let jd_label = label_for(jd_lang);

    format!(
        "Language context:
- Resume language: {resume_label}
- Job description language: {jd_label}
- Desired output language: {target_label}

Rules:
- preview_text MUST be written in {target_label}.
- If the resume or job description is in a different language, translate the content into {target_label}.
- Keep proper nouns (company names, product names, certifications) in their original language.
- If preserving ATS keywords helps, you may keep the original keyword in parentheses."
    )
}

fn is_arabic_script(ch: char) -> bool {
    matches!(
        ch,
        '\u{0600}'..='\u{06FF}'
            | '\u{0750}'..='\u{077F}'
            | '\u{08A0}'..='\u{08FF}'
            | '\u{FB50}'..='\u{FDFF}'
            | '\u{FE70}'..='\u{FEFF}'
    )
}

/// Arabic-script letters divided by all alphabetic characters. 0.0 for text without letters.
pub fn arabic_ratio(text: &str) -> f64 {
    let (letters, arabic) = text
        .chars()
        .filter(|c| c.is_alphabetic())
        .fold((0usize, 0usize), |(letters, arabic), c| {
            (letters + 1, arabic + usize::from(is_arabic_script(c)))
        });

    if letters == 0 {
        return 0.0;
    }
    arabic as f64 / letters as f64
}

/// True when `text` is in the wrong script for `target`.
pub fn needs_translation(text: &str, target: Language) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    let ratio = arabic_ratio(text);
    match target {
        Language::Arabic => ratio < ARABIC_RATIO_THRESHOLD,
        Language::English => ratio > ARABIC_RATIO_THRESHOLD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARABIC: &str = "مهندس برمجيات خبرة في لغة رست";
    const ENGLISH: &str = "Software engineer with Rust experience";

    #[test]
    fn test_target_language_fallbacks() {
        assert_eq!(target_language(Some("en"), Some("ar")), Language::Arabic);
        assert_eq!(target_language(Some("ar"), None), Language::Arabic);
        assert_eq!(target_language(Some("ar"), Some("")), Language::Arabic);
        assert_eq!(target_language(None, None), Language::English);
        assert_eq!(target_language(Some("fr"), None), Language::English);
    }

    #[test]
    fn test_language_instructions_name_all_three_languages() {
        let block = build_language_instructions(Some("ar"), Some("en"), Some("en"));
        assert!(block.contains("Resume language: Arabic"));
        assert!(block.contains("Job description language: English"));
        assert!(block.contains("Desired output language: English"));
        assert!(block.contains("preview_text MUST be written in English"));
        assert!(block.contains("proper nouns"));
    }

    #[test]
    fn test_language_instructions_default_to_resume_language() {
        let block = build_language_instructions(Some("ar"), Some("en"), None);
        assert!(block.contains("Desired output language: Arabic"));
    }

    #[test]
    fn test_arabic_ratio_extremes() {
        assert_eq!(arabic_ratio(ENGLISH), 0.0);
        assert_eq!(arabic_ratio(ARABIC), 1.0);
        assert_eq!(arabic_ratio("2020 - 2023 !!"), 0.0);
    }

    #[test]
    fn test_arabic_ratio_ignores_non_letters() {
        // Arabic-Indic digits are in the Arabic block but are not letters.
        assert_eq!(arabic_ratio("Rust ١٢٣"), 0.0);
    }

    #[test]
    fn test_mixed_text_ratio() {
        // 4 Arabic letters, 4 Latin letters
        assert_eq!(arabic_ratio("رستا Rust"), 0.5);
    }

    #[test]
    fn test_needs_translation() {
        assert!(needs_translation(ENGLISH, Language::Arabic));
        assert!(!needs_translation(ARABIC, Language::Arabic));
        assert!(needs_translation(ARABIC, Language::English));
        assert!(!needs_translation(ENGLISH, Language::English));
        assert!(!needs_translation("   ", Language::Arabic));
    }

    #[test]
    fn test_codes_round_trip_labels() {
        assert_eq!(Language::from_code("AR"), Some(Language::Arabic));
        assert_eq!(Language::Arabic.code(), "ar");
        assert_eq!(Language::English.label(), "English");
    }
}
