//! Resume Optimizer: turns resume text + JD + instructions into an `OptimizationResult`.
//!
//! Flow: extract entities → analyze alignment → rewrite (language-directed) →
//!       translate if the rewrite came back in the wrong script →
//!       optional embedding score.
//!
//! Every structured call gets `MAX_ATTEMPTS` tries. Extraction and alignment
//! fall back to empty structures; an exhausted rewrite produces a zero-score
//! result that preserves the original resume text. `optimize` itself never fails.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::llm_client::{generate_structured, GenerationBackend, LlmError, StructuredOutput};
use crate::matching::matcher::{MatchScore, ResumeMatcher};
use crate::models::task::OptimizePayload;
use crate::optimization::language::{
    arabic_ratio, build_language_instructions, needs_translation, target_language, Language,
};
use crate::optimization::prompts::{
    render, ALIGNMENT_PROMPT_TEMPLATE, ALIGNMENT_SYSTEM, EXTRACTION_SYSTEM,
    REWRITE_FAILED_CHANGE, REWRITE_PROMPT_TEMPLATE, REWRITE_SYSTEM_TEMPLATE,
    TRANSLATION_SYSTEM_TEMPLATE,
};
use crate::optimization::schemas::{
    AlignmentInsights, CoreResult, ExtractedEntities, OptimizationResult, ReliabilityMetrics,
};

/// Attempts per structured stage, first try included.
pub const MAX_ATTEMPTS: u32 = 3;

const EXTRACTION_TEMPERATURE: f32 = 0.3;
const ALIGNMENT_TEMPERATURE: f32 = 0.3;
const REWRITE_TEMPERATURE: f32 = 0.5;
const TRANSLATION_TEMPERATURE: f32 = 0.2;

#[derive(Clone)]
pub struct ResumeOptimizer {
    backend: Arc<dyn GenerationBackend>,
    matcher: Option<ResumeMatcher>,
}

impl ResumeOptimizer {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            matcher: None,
        }
    }

    /// Also attach an embedding-based `MatchScore` to every result.
    pub fn with_similarity_scoring(mut self) -> Self {
        self.matcher = Some(ResumeMatcher::new(self.backend.clone()));
        self
    }

    /// Runs the full pipeline. Metrics start from zero on every call.
    pub async fn optimize(
        &self,
        payload: &OptimizePayload,
    ) -> (OptimizationResult, ReliabilityMetrics) {
        let started = Instant::now();
        let mut metrics = ReliabilityMetrics::default();

        let resume_lang = payload.resume_lang.as_deref();
        let desired_lang = payload.desired_output_lang.as_deref();
        let target = target_language(resume_lang, desired_lang);

        // Step 1: Extract entities
        let entities = self
            .extract_entities(&payload.resume_text, &mut metrics)
            .await;
        if entities.is_empty() {
            warn!(job_id = %payload.job_id, "No entities extracted, continuing with empty set");
        }

        // Step 2: Analyze alignment
        let alignment = self
            .analyze_alignment(&payload.job_description, &entities, &mut metrics)
            .await;

        // Step 3: Rewrite
        let core = self.rewrite(payload, &mut metrics).await;
        metrics.last_run_valid = core.is_some();

        // Step 4: Translate the rewrite if it is in the wrong script
        let core = match core {
            Some(core) => {
                let preview_text = self.localize(core.preview_text, target).await;
                Some(CoreResult {
                    preview_text,
                    ..core
                })
            }
            None => None,
        };

        // Step 5: Optional embedding score
        let similarity = match &self.matcher {
            Some(matcher) => Some(
                self.similarity(matcher, &entities, &payload.job_description)
                    .await,
            ),
            None => None,
        };

        let result = match core {
            Some(core) => OptimizationResult {
                score: u32::try_from(core.score).unwrap_or(0),
                missing_keywords: core.missing_keywords,
                covered_keywords: core.covered_keywords,
                change_log: core.change_log,
                preview_text: core.preview_text,
                extracted_entities: entities,
                alignment_insights: alignment,
                is_refinement: payload.is_refinement,
                similarity,
            },
            None => OptimizationResult {
                score: 0,
                missing_keywords: Vec::new(),
                covered_keywords: Vec::new(),
                change_log: vec![REWRITE_FAILED_CHANGE.to_string()],
                preview_text: payload.resume_text.clone(),
                extracted_entities: entities,
                alignment_insights: alignment,
                is_refinement: payload.is_refinement,
                similarity,
            },
        };

        metrics.latency_seconds = round2(started.elapsed().as_secs_f64());

        info!(
            job_id = %payload.job_id,
            score = result.score,
            latency_seconds = metrics.latency_seconds,
            invalid_json_attempts = metrics.invalid_json_attempts,
            total_attempts = metrics.total_attempts,
            valid = metrics.last_run_valid,
            "Optimization complete"
        );

        (result, metrics)
    }

    /// Extracts structured entities from the resume; empty on exhaustion.
    pub async fn extract_entities(
        &self,
        resume_text: &str,
        metrics: &mut ReliabilityMetrics,
    ) -> ExtractedEntities {
        self.generate_with_retry::<ExtractedEntities>(
            "extraction",
            EXTRACTION_SYSTEM,
            resume_text,
            EXTRACTION_TEMPERATURE,
            metrics,
        )
        .await
        .unwrap_or_default()
    }

    /// Compares the extracted skills/tools against the JD; empty on exhaustion.
    pub async fn analyze_alignment(
        &self,
        job_description: &str,
        entities: &ExtractedEntities,
        metrics: &mut ReliabilityMetrics,
    ) -> AlignmentInsights {
        let skills = entities
            .skills
            .iter()
            .chain(entities.tools.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        let user_prompt = render(
            ALIGNMENT_PROMPT_TEMPLATE,
            &[("skills", &skills), ("job_description", job_description)],
        );

        self.generate_with_retry::<AlignmentInsights>(
            "alignment",
            ALIGNMENT_SYSTEM,
            &user_prompt,
            ALIGNMENT_TEMPERATURE,
            metrics,
        )
        .await
        .unwrap_or_default()
    }

    /// The rewrite call. `None` means every attempt failed validation.
    async fn rewrite(
        &self,
        payload: &OptimizePayload,
        metrics: &mut ReliabilityMetrics,
    ) -> Option<CoreResult> {
        let language_instructions = build_language_instructions(
            payload.resume_lang.as_deref(),
            payload.jd_lang.as_deref(),
            payload.desired_output_lang.as_deref(),
        );
        let system_prompt = render(
            REWRITE_SYSTEM_TEMPLATE,
            &[("language_instructions", &language_instructions)],
        );

        let instructions = payload
            .instructions
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("None");
        let user_prompt = render(
            REWRITE_PROMPT_TEMPLATE,
            &[
                ("resume_text", &payload.resume_text),
                ("job_description", &payload.job_description),
                ("instructions", instructions),
            ],
        );

        self.generate_with_retry::<CoreResult>(
            "rewrite",
            &system_prompt,
            &user_prompt,
            REWRITE_TEMPERATURE,
            metrics,
        )
        .await
    }

    /// Free-text translation preserving Markdown structure.
    pub async fn translate(&self, text: &str, target: Language) -> Result<String, LlmError> {
        let system_prompt = render(
            TRANSLATION_SYSTEM_TEMPLATE,
            &[("target_language", target.label())],
        );

        let translated = self
            .backend
            .generate(&system_prompt, text, None, TRANSLATION_TEMPERATURE)
            .await?;

        let translated = translated.trim();
        if translated.is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(translated.to_string())
    }

    /// Returns `preview` in `target`'s script, translating once if needed.
    /// A failed translation keeps the original text.
    async fn localize(&self, preview: String, target: Language) -> String {
        if !needs_translation(&preview, target) {
            return preview;
        }

        info!(
            target_lang = target.code(),
            arabic_ratio = arabic_ratio(&preview),
            "Translating preview text"
        );

        match self.translate(&preview, target).await {
            Ok(translated) => translated,
            Err(e) => {
                warn!(error = %e, "Translation failed, keeping untranslated preview");
                preview
            }
        }
    }

    async fn similarity(
        &self,
        matcher: &ResumeMatcher,
        entities: &ExtractedEntities,
        job_description: &str,
    ) -> MatchScore {
        let skills: Vec<String> = entities
            .skills
            .iter()
            .chain(entities.tools.iter())
            .cloned()
            .collect();
        let experience: Vec<String> = entities.experience.iter().map(|e| e.summary()).collect();

        matcher
            .score(&skills, &experience, &entities.education, job_description)
            .await
    }

    /// Calls the backend for `T` up to `MAX_ATTEMPTS` times.
    /// Every try counts toward `total_attempts`; every failure toward `invalid_json_attempts`.
    async fn generate_with_retry<T: StructuredOutput>(
        &self,
        stage: &'static str,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        metrics: &mut ReliabilityMetrics,
    ) -> Option<T> {
        for attempt in 1..=MAX_ATTEMPTS {
            metrics.total_attempts += 1;

            match generate_structured::<T>(
                self.backend.as_ref(),
                system_prompt,
                user_prompt,
                temperature,
            )
            .await
            {
                Ok(value) => return Some(value),
                Err(e) => {
                    metrics.invalid_json_attempts += 1;
                    warn!(
                        stage,
                        attempt,
                        max_attempts = MAX_ATTEMPTS,
                        validation = e.is_validation_failure(),
                        error = %e,
                        "Generation attempt failed"
                    );
                }
            }
        }

        warn!(stage, "All {} attempts failed", MAX_ATTEMPTS);
        None
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
