//! Relevance Scoring Engine.
//!
//! One [`RelevanceEngine::score`] call compares a requester profile with one
//! enriched record: the [`MatchAnalyzer`] finds annotations, [`aggregate`]
//! turns their weights into the overall score, and the [`ContentGenerator`]
//! writes the message and cover letter from [`GroundingFacts`].
//!
//! Failures never propagate. Any analyzer or generator error yields the
//! neutral result: no annotations, score 0.0, and template content built
//! from literal profile and record fields.

pub mod analyzer;
pub mod content;
pub mod grounding;

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use outreach_llm::ChatModel;
use outreach_shared::{
    AppConfig, EnrichedRecord, GenerationMeta, MatchAnnotation, OutreachError, RankedOutput,
    RequesterProfile, Result,
};

pub use analyzer::{KeywordMatchAnalyzer, LlmMatchAnalyzer, MatchAnalyzer, MatchPools};
pub use content::{
    ContentGenerator, GeneratedContent, LlmContentGenerator, TemplateContentGenerator,
};
pub use grounding::{Fact, FactKind, GroundingFacts};

/// Default cap on annotations per output.
pub const DEFAULT_MAX_ANNOTATIONS: usize = 12;

/// Noisy-OR of the weights: `1 − Π(1 − wᵢ)`, each weight clamped to
/// `[0, 1]`. Empty input scores 0.0.
pub fn aggregate(weights: impl IntoIterator<Item = f32>) -> f32 {
    let miss: f32 = weights
        .into_iter()
        .map(|w| if w.is_nan() { 0.0 } else { w.clamp(0.0, 1.0) })
        .map(|w| 1.0 - w)
        .product();
    (1.0 - miss).clamp(0.0, 1.0)
}

/// Result of scoring one record.
#[derive(Debug)]
pub struct Scored {
    pub output: RankedOutput,
    /// The failure that forced the neutral result, if any.
    pub failure: Option<OutreachError>,
}

#[derive(Clone)]
pub struct RelevanceEngine {
    analyzer: Arc<dyn MatchAnalyzer>,
    generator: Arc<dyn ContentGenerator>,
    max_annotations: usize,
}

impl std::fmt::Debug for RelevanceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelevanceEngine")
            .field("analyzer", &self.analyzer.name())
            .field("generator", &self.generator.name())
            .field("max_annotations", &self.max_annotations)
            .finish()
    }
}

impl Default for RelevanceEngine {
    /// Keyword analysis with template content.
    fn default() -> Self {
        Self::new(
            Arc::new(KeywordMatchAnalyzer::new()),
            Arc::new(TemplateContentGenerator::new()),
        )
    }
}

impl RelevanceEngine {
    pub fn new(analyzer: Arc<dyn MatchAnalyzer>, generator: Arc<dyn ContentGenerator>) -> Self {
        Self {
            analyzer,
            generator,
            max_annotations: DEFAULT_MAX_ANNOTATIONS,
        }
    }

    pub fn with_max_annotations(mut self, max: usize) -> Self {
        self.max_annotations = max.max(1);
        self
    }

    /// Build from the `[scoring]` config section. The `llm` backends need a
    /// chat model.
    pub fn from_config(config: &AppConfig, model: Option<Arc<dyn ChatModel>>) -> Result<Self> {
        let scoring = &config.scoring;
        let need_model = |what: &str| {
            model.clone().ok_or_else(|| {
                OutreachError::config(format!(
                    "scoring.{what} = \"llm\" requires an OpenRouter API key"
                ))
            })
        };

        let analyzer: Arc<dyn MatchAnalyzer> = match scoring.backend.as_str() {
            "keyword" => Arc::new(KeywordMatchAnalyzer::new()),
            "llm" => Arc::new(LlmMatchAnalyzer::new(need_model("backend")?)),
            other => {
                return Err(OutreachError::config(format!(
                    "unknown scoring backend '{other}' (expected keyword or llm)"
                )));
            }
        };
        let generator: Arc<dyn ContentGenerator> = match scoring.content.as_str() {
            "template" => Arc::new(TemplateContentGenerator::new()),
            "llm" => Arc::new(LlmContentGenerator::new(need_model("content")?)),
            other => {
                return Err(OutreachError::config(format!(
                    "unknown content generator '{other}' (expected template or llm)"
                )));
            }
        };

        Ok(Self::new(analyzer, generator).with_max_annotations(scoring.max_annotations))
    }

    /// Score one record. Always returns an output.
    pub async fn score(&self, profile: &RequesterProfile, record: &EnrichedRecord) -> Scored {
        match self.try_score(profile, record).await {
            Ok(output) => Scored {
                output,
                failure: None,
            },
            Err(e) => {
                warn!(candidate = %record.name(), error = %e, "scoring failed, using neutral result");
                Scored {
                    output: self.neutral(profile, record),
                    failure: Some(e),
                }
            }
        }
    }

    async fn try_score(
        &self,
        profile: &RequesterProfile,
        record: &EnrichedRecord,
    ) -> Result<RankedOutput> {
        let pools = MatchPools::build(profile, record);
        let annotations = analyzer::finalize(self.analyzer.analyze(&pools).await?, self.max_annotations);
        let overall_score = aggregate(annotations.iter().map(|a| a.weight));

        let facts = GroundingFacts::build(profile, record, &annotations);
        let content = self.generator.generate(&facts).await?;

        debug!(
            candidate = %record.name(),
            matches = annotations.len(),
            score = overall_score,
            "scored"
        );
        Ok(self.output(record, annotations, overall_score, content, self.generator.name(), false))
    }

    /// Empty annotations, zero score, template content from literal fields.
    pub fn neutral(&self, profile: &RequesterProfile, record: &EnrichedRecord) -> RankedOutput {
        let facts = GroundingFacts::build(profile, record, &[]);
        let content = TemplateContentGenerator::new().render(&facts);
        self.output(record, Vec::new(), 0.0, content, "template", true)
    }

    fn output(
        &self,
        record: &EnrichedRecord,
        annotations: Vec<MatchAnnotation>,
        overall_score: f32,
        content: GeneratedContent,
        generator: &str,
        fallback: bool,
    ) -> RankedOutput {
        let candidate = &record.record;
        RankedOutput {
            candidate_name: candidate.name.clone(),
            profile_url: candidate.profile_url.clone(),
            department: candidate.department.clone(),
            candidate_email: candidate.email.clone(),
            annotations,
            overall_score,
            message: content.message,
            document: content.document,
            meta: GenerationMeta {
                generated_at: Utc::now(),
                generator: generator.to_string(),
                analyzer: self.analyzer.name().to_string(),
                fallback,
            },
        }
    }
}
