//! Similarity Scorer: embeds the JD and each resume section, then aggregates
//! per-section cosine similarities into a weighted 0–100 match score.
//!
//! Embedding failures never propagate: a missing section embedding scores 0,
//! and a missing JD embedding yields a zeroed score with `error` set.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::llm_client::GenerationBackend;
use crate::matching::similarity::{
    cosine_similarity, section_score, weighted_overall, EDUCATION_WEIGHT, EXPERIENCE_WEIGHT,
    SKILLS_WEIGHT,
};

const LIST_DELIMITER: &str = ", ";
const EXPERIENCE_DELIMITER: &str = " | ";
const EMBEDDING_ERROR: &str = "Failed to compute embeddings";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightBreakdown {
    pub skills_weight: f64,
    pub experience_weight: f64,
    pub education_weight: f64,
}

impl Default for WeightBreakdown {
    fn default() -> Self {
        Self {
            skills_weight: SKILLS_WEIGHT,
            experience_weight: EXPERIENCE_WEIGHT,
            education_weight: EDUCATION_WEIGHT,
        }
    }
}

/// Match score of one resume against one JD. All scores are on the 0–100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchScore {
    pub overall: f64,
    pub skills: f64,
    pub experience: f64,
    pub education: f64,
    pub breakdown: WeightBreakdown,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MatchScore {
    fn unavailable() -> Self {
        Self {
            overall: 0.0,
            skills: 0.0,
            experience: 0.0,
            education: 0.0,
            breakdown: WeightBreakdown::default(),
            error: Some(EMBEDDING_ERROR.to_string()),
        }
    }
}

/// One resume in a ranking batch.
#[allow(dead_code)] // batch ranking has no in-process caller; the worker scores one resume per task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience: Vec<String>,
    #[serde(default)]
    pub education: Vec<String>,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Serialize)]
pub struct RankedCandidate {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub score: MatchScore,
}

#[derive(Clone)]
pub struct ResumeMatcher {
    backend: Arc<dyn GenerationBackend>,
}

impl ResumeMatcher {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    /// Embedding for `text`; empty on blank input or backend failure.
    async fn embedding(&self, text: &str) -> Vec<f32> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        match self.backend.embed(text).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(error = %e, "Failed to get embedding");
                Vec::new()
            }
        }
    }

    async fn section_similarity(&self, job_embedding: &[f32], section_text: &str) -> f64 {
        if section_text.is_empty() {
            return 0.0;
        }
        let section_embedding = self.embedding(section_text).await;
        cosine_similarity(job_embedding, &section_embedding)
    }

    /// Scores one resume's sections against a job description.
    pub async fn score(
        &self,
        resume_skills: &[String],
        resume_experience: &[String],
        resume_education: &[String],
        job_description: &str,
    ) -> MatchScore {
        let job_embedding = self.embedding(job_description).await;
        if job_embedding.is_empty() {
            warn!("Could not get job description embedding");
            return MatchScore::unavailable();
        }

        let skills = self
            .section_similarity(&job_embedding, &resume_skills.join(LIST_DELIMITER))
            .await;
        let experience = self
            .section_similarity(&job_embedding, &resume_experience.join(EXPERIENCE_DELIMITER))
            .await;
        let education = self
            .section_similarity(&job_embedding, &resume_education.join(LIST_DELIMITER))
            .await;

        info!(
            "Match similarities - skills: {:.2}, experience: {:.2}, education: {:.2}",
            skills, experience, education
        );

        MatchScore {
            overall: weighted_overall(skills, experience, education),
            skills: section_score(skills),
            experience: section_score(experience),
            education: section_score(education),
            breakdown: WeightBreakdown::default(),
            error: None,
        }
    }

    /// Scores every candidate and returns them best first. Equal scores keep input order.
    #[allow(dead_code)]
    pub async fn rank(
        &self,
        candidates: Vec<Candidate>,
        job_description: &str,
    ) -> Vec<RankedCandidate> {
        let mut ranked = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let score = self
                .score(
                    &candidate.skills,
                    &candidate.experience,
                    &candidate.education,
                    job_description,
                )
                .await;
            ranked.push(RankedCandidate {
                id: candidate.id,
                name: candidate.name.unwrap_or_else(|| "Unknown".to_string()),
                score,
            });
        }

        // sort_by is stable
        ranked.sort_by(|a, b| {
            b.score
                .overall
                .partial_cmp(&a.score.overall)
                .unwrap_or(Ordering::Equal)
        });
        ranked
    }
}
