//! # Validation orchestrator
//! Runs one report through the whole pipeline:
//!
//! `FeatureGather -> LayerScoring -> Aggregate -> Decide -> FeedbackUpdate`
//!
//! Collaborators are fetched concurrently, each under its own timeout. A
//! failing or slow collaborator never aborts the validation: its signal is
//! replaced by a neutral default and listed in `ValidationResult::defaulted`.
//! Only out-of-domain input and a broken weight model surface as errors.

use std::{
    collections::BTreeMap,
    future::Future,
    path::Path,
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

use metrics::{counter, gauge, histogram};
use tracing::{debug, info, warn};

use crate::aggregator::{WeightModel, WeightedAggregator};
use crate::config::ValidatorConfig;
use crate::decision::{
    DefaultCause, DefaultedSignal, LayerBreakdown, Reason, ReasonKind, Signal,
    StatisticalBreakdown, Status, ValidationResult,
};
use crate::error::{ModelError, ValidationError};
use crate::layers::{
    statistical::blend_with_cluster, ExternalCorroborationScorer, LayerScores,
    PhysicalPlausibilityScorer, ReputationScore, ReputationScorer, SpatialConsensusAnalyzer,
    StatisticalConsistencyScorer, TrustStore, VisualEvidenceScorer, FUSED_LAYERS,
};
use crate::providers::{
    CorroborationSignal, ExternalCorroborationProvider, GroundTruthZoneProvider, ImageEvidence,
    ImageEvidenceClassifier, TerrainFeatureProvider, WeatherProvider, ZoneCheck,
};
use crate::report::{clamp01, round3, ContextReport, FeatureSet, Report, TrustProfile};
use crate::rolling::RecentReportCache;
use crate::telemetry::{anon_user, ensure_metrics_described};

/// Added to the physical layer inside an authoritative flood zone.
pub const ZONE_BOOST: f64 = 0.2;
/// Added to the final score for a flood-positive photo.
pub const VISUAL_BOOST: f64 = 0.1;

/// External dependencies, owned by the caller and injected at construction.
#[derive(Clone)]
pub struct Collaborators {
    pub terrain: Arc<dyn TerrainFeatureProvider>,
    pub weather: Arc<dyn WeatherProvider>,
    pub zones: Arc<dyn GroundTruthZoneProvider>,
    pub corroboration: Arc<dyn ExternalCorroborationProvider>,
    pub images: Arc<dyn ImageEvidenceClassifier>,
    pub trust: Arc<dyn TrustStore>,
}

/// Optional per-call overrides.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationContext<'a> {
    /// Used instead of the cache snapshot when set.
    pub reports: Option<&'a [ContextReport]>,
    /// Skips the weather fetch when set.
    pub rainfall_24h_mm: Option<f64>,
}

impl<'a> ValidationContext<'a> {
    pub fn with_reports(mut self, reports: &'a [ContextReport]) -> Self {
        self.reports = Some(reports);
        self
    }

    pub fn with_rainfall(mut self, mm: f64) -> Self {
        self.rainfall_24h_mm = Some(mm);
        self
    }
}

/// Reports the layer-2 scorers look at.
///
/// Clustering falls back to the recent-report cache; the rule checks only
/// ever see reports the caller supplied.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringContext<'a> {
    pub clustering: &'a [ContextReport],
    pub rules: &'a [ContextReport],
}

impl<'a> ScoringContext<'a> {
    /// Caller-supplied reports feed both clustering and the rule checks.
    pub fn supplied(reports: &'a [ContextReport]) -> Self {
        Self {
            clustering: reports,
            rules: reports,
        }
    }
}

/// Everything the collaborators said about one report, defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct GatheredSignals {
    pub features: FeatureSet,
    pub rainfall_mm: f64,
    pub zone: ZoneCheck,
    pub corroboration: Option<CorroborationSignal>,
    pub image: Option<ImageEvidence>,
    pub reputation: ReputationScore,
    pub defaulted: Vec<DefaultedSignal>,
}

pub struct ValidationOrchestrator {
    collaborators: Collaborators,
    reputation: ReputationScorer,
    cache: RecentReportCache,
    aggregator: RwLock<WeightedAggregator>,
    consensus: SpatialConsensusAnalyzer,
    physical: PhysicalPlausibilityScorer,
    statistical: StatisticalConsistencyScorer,
    corroboration: ExternalCorroborationScorer,
    visual: VisualEvidenceScorer,
    config: ValidatorConfig,
}

impl ValidationOrchestrator {
    /// Starts with the untrained (uniform) combiner.
    pub fn new(collaborators: Collaborators, config: ValidatorConfig) -> Self {
        let config = config.sanitized();
        let aggregator = WeightedAggregator::new(
            WeightModel::uniform(FUSED_LAYERS),
            config.model.learning_rate,
        );
        Self {
            reputation: ReputationScorer::new(collaborators.trust.clone()),
            cache: RecentReportCache::with_capacity(config.cache.capacity),
            aggregator: RwLock::new(aggregator),
            consensus: SpatialConsensusAnalyzer::new(
                config.consensus.eps_km,
                config.consensus.min_samples,
            ),
            physical: PhysicalPlausibilityScorer::new(),
            statistical: StatisticalConsistencyScorer::new(),
            corroboration: ExternalCorroborationScorer::new(),
            visual: VisualEvidenceScorer::new(),
            collaborators,
            config,
        }
    }

    pub fn with_model(self, model: WeightModel) -> Result<Self, ModelError> {
        self.set_model(model)?;
        Ok(self)
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn cache(&self) -> &RecentReportCache {
        &self.cache
    }

    /// Swap the combiner model. It must fuse exactly the four layers.
    pub fn set_model(&self, model: WeightModel) -> Result<(), ModelError> {
        if model.n_layers != FUSED_LAYERS {
            return Err(ModelError::DimensionMismatch {
                expected: FUSED_LAYERS,
                actual: model.n_layers,
            });
        }
        if model.weights.len() != model.n_layers {
            return Err(ModelError::DimensionMismatch {
                expected: model.n_layers,
                actual: model.weights.len(),
            });
        }
        let mut agg = self.aggregator.write().expect("aggregator lock poisoned");
        *agg = WeightedAggregator::new(model, agg.learning_rate());
        Ok(())
    }

    /// Reload the combiner from disk; the running model is kept on error.
    pub fn reload_weights<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        let model = WeightModel::load(path, FUSED_LAYERS)?;
        self.set_model(model)?;
        info!("weight model reloaded");
        Ok(())
    }

    pub fn model(&self) -> WeightModel {
        self.aggregator
            .read()
            .expect("aggregator lock poisoned")
            .model()
            .clone()
    }

    /// Normalised combiner weights keyed by layer name.
    pub fn weights(&self) -> BTreeMap<String, f64> {
        self.model().get_weights()
    }

    /// Score one report and feed the outcome back into the cache and the
    /// submitter's trust.
    pub async fn validate(
        &self,
        report: &Report,
        ctx: ValidationContext<'_>,
    ) -> Result<ValidationResult, ValidationError> {
        ensure_metrics_described();
        let t0 = Instant::now();

        if let Err(e) = self.check_input(report, &ctx) {
            counter!("validation_rejected_total").increment(1);
            warn!(report_id = report.id, error = %e, "report rejected");
            return Err(e);
        }

        let gathered = self.gather(report, ctx.rainfall_24h_mm).await;
        for d in &gathered.defaulted {
            counter!("signal_defaults_total", "signal" => d.signal.as_str()).increment(1);
            warn!(
                report_id = report.id,
                signal = d.signal.as_str(),
                cause = ?d.cause,
                detail = d.detail.as_deref().unwrap_or(""),
                "signal defaulted"
            );
        }

        let cached;
        let scoring = match ctx.reports {
            Some(r) => ScoringContext::supplied(r),
            None => {
                cached = self.cache.snapshot();
                ScoringContext {
                    clustering: &cached,
                    rules: &[],
                }
            }
        };

        let mut result = self.evaluate(report, &gathered, scoring)?;

        // Feedback
        self.cache.push(report.as_context());
        gauge!("report_cache_size").set(self.cache.len() as f64);
        result.trust_after = self.record_trust(report, result.status).await;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("validation_duration_ms").record(ms);
        counter!("validations_total", "status" => result.status.as_str()).increment(1);
        let defaulted: Vec<&str> = result.defaulted.iter().map(|d| d.signal.as_str()).collect();
        info!(
            report_id = report.id,
            user = %anon_user(report.user_id),
            score = result.final_score,
            status = result.status.as_str(),
            defaulted = ?defaulted,
            elapsed_ms = ms,
            "report validated"
        );

        Ok(result)
    }

    fn check_input(&self, report: &Report, ctx: &ValidationContext<'_>) -> Result<(), ValidationError> {
        report.check_bounds(self.config.input.max_depth_m)?;
        if let Some(mm) = ctx.rainfall_24h_mm {
            if !mm.is_finite() || mm < 0.0 {
                return Err(ValidationError::invalid(
                    "rainfall",
                    mm,
                    "must be a non-negative number",
                ));
            }
        }
        Ok(())
    }

    /// FeatureGather: every collaborator concurrently, each under its own timeout.
    pub async fn gather(&self, report: &Report, rainfall_override: Option<f64>) -> GatheredSignals {
        let c = &self.collaborators;
        let t = &self.config.timeouts;
        let (lat, lon) = (report.lat, report.lon);

        let terrain = guarded(Signal::Terrain, t.terrain(), c.terrain.get(lat, lon));
        let weather = async {
            match rainfall_override {
                Some(mm) => Ok(Some(mm)),
                None => guarded(Signal::Weather, t.weather(), c.weather.get_current(lat, lon))
                    .await
                    .map(|r| r.map(|w| w.rainfall_mm)),
            }
        };
        let zone = guarded(Signal::Zone, t.zone(), c.zones.check(lat, lon));
        let corroboration = guarded(
            Signal::Corroboration,
            t.corroboration(),
            c.corroboration.get(&self.config.corroboration.region),
        );
        let image = async {
            match report.image.as_deref() {
                Some(bytes) => guarded(Signal::Image, t.image(), c.images.validate(bytes))
                    .await
                    .map(Some),
                None => Ok(None),
            }
        };
        let trust = guarded(
            Signal::Trust,
            t.trust(),
            self.reputation.validate(report.user_id),
        );

        let (terrain, weather, zone, corroboration, image, trust) =
            tokio::join!(terrain, weather, zone, corroboration, image, trust);

        let mut defaulted = Vec::new();

        let features = terrain.unwrap_or_else(|d| {
            defaulted.push(d);
            FeatureSet::neutral()
        });
        let rainfall_mm = match weather {
            Ok(Some(mm)) if mm.is_finite() => mm.max(0.0),
            Ok(_) => {
                defaulted.push(DefaultedSignal::new(Signal::Weather, DefaultCause::NoData));
                0.0
            }
            Err(d) => {
                defaulted.push(d);
                0.0
            }
        };
        let zone = zone.unwrap_or_else(|d| {
            defaulted.push(d);
            ZoneCheck::outside()
        });
        let corroboration = corroboration
            .map_err(|d| defaulted.push(d))
            .ok();
        let image = image.unwrap_or_else(|d| {
            defaulted.push(d);
            None
        });
        let reputation = trust.unwrap_or_else(|d| {
            defaulted.push(d);
            ReputationScore {
                score: TrustProfile::INITIAL_TRUST,
                known_user: false,
            }
        });

        GatheredSignals {
            features,
            rainfall_mm,
            zone,
            corroboration,
            image,
            reputation,
            defaulted,
        }
    }

    /// LayerScoring, Aggregate and Decide. Pure given the gathered signals,
    /// the context and the current model; touches neither cache nor trust.
    pub fn evaluate(
        &self,
        report: &Report,
        gathered: &GatheredSignals,
        context: ScoringContext<'_>,
    ) -> Result<ValidationResult, ValidationError> {
        let candidate = report.as_context();
        let mut reasons = Vec::new();

        // Layer 1
        let mut physical = self
            .physical
            .score(report.lat, report.lon, report.depth_m, &gathered.features);
        reasons.push(
            Reason::new(format!(
                "terrain plausibility {:.3} (hand {:.3}, slope {:.3}, elevation {:.3})",
                physical.score, physical.hand_score, physical.slope_score, physical.elevation_score
            ))
            .kind(ReasonKind::Terrain),
        );
        if gathered.zone.in_flood_zone {
            physical.score = round3(clamp01(physical.score + ZONE_BOOST));
            physical.zone_boost = true;
            reasons.push(
                Reason::new(format!(
                    "inside authoritative flood zone ({})",
                    gathered.zone.source.as_deref().unwrap_or("unknown source")
                ))
                .kind(ReasonKind::GroundTruth),
            );
        }

        // Layer 2: the candidate joins the clustering context, the summary
        // describes the context alone and the rules skip the candidate.
        let cluster = self.consensus.assess(&candidate, context.clustering);
        let clusters = self.consensus.analyze_clusters(context.clustering);
        let others: Vec<ContextReport> = context
            .rules
            .iter()
            .filter(|r| r.id.is_none() || r.id != candidate.id)
            .cloned()
            .collect();
        let rules = self.statistical.score(
            report.lat,
            report.lon,
            report.depth_m,
            report.timestamp,
            &others,
            gathered.rainfall_mm,
        );
        let statistical_score = round3(clamp01(blend_with_cluster(cluster.score, rules.score)));
        if cluster.cluster_size > 0 {
            reasons.push(
                Reason::new(format!("part of a cluster of {} reports", cluster.cluster_size))
                    .kind(ReasonKind::Consensus),
            );
        }

        // Layers 3-5
        let reputation = gathered.reputation;
        let corroboration = self.corroboration.score(gathered.corroboration.as_ref());
        let visual = self.visual.score(gathered.image.as_ref());
        reasons.push(
            Reason::new(if reputation.known_user {
                format!("submitter trust {:.2}", reputation.score)
            } else {
                format!("new submitter, neutral trust {:.2}", reputation.score)
            })
            .kind(ReasonKind::Reputation),
        );
        if let Some(signal) = gathered.corroboration.as_ref().filter(|s| s.buzz_score > 0.0) {
            reasons.push(
                Reason::new(format!(
                    "external buzz {:.2} from {}",
                    corroboration.score,
                    signal.source.as_deref().unwrap_or("unknown source")
                ))
                .kind(ReasonKind::Corroboration),
            );
        }

        let layer_scores = LayerScores {
            physical: physical.score,
            statistical: statistical_score,
            reputation: round3(reputation.score),
            corroboration: corroboration.score,
        };
        debug!(
            report_id = report.id,
            physical = layer_scores.physical,
            statistical = layer_scores.statistical,
            reputation = layer_scores.reputation,
            corroboration = layer_scores.corroboration,
            visual = visual.score,
            visual_applied = visual.applied,
            "layer scores"
        );

        // Aggregate
        let (aggregate, normalized_weights) = {
            let agg = self.aggregator.read().expect("aggregator lock poisoned");
            (agg.forward(&layer_scores.as_array())?, agg.model().get_weights())
        };

        let mut raw = aggregate;
        if visual.flood_positive() {
            raw += VISUAL_BOOST;
            reasons.push(Reason::new("photo shows flooding").kind(ReasonKind::Visual));
        }
        let raw = clamp01(raw);

        // Decide on the unrounded score; only the published value is rounded.
        let threshold = self.config.decision.threshold;
        let status = Status::decide(raw, threshold);
        let final_score = round3(raw);
        reasons.push(
            Reason::new(format!(
                "score {raw:.4} {} threshold {threshold:.2}",
                if status == Status::Validated { ">=" } else { "<" }
            ))
            .kind(ReasonKind::Threshold),
        );
        for d in &gathered.defaulted {
            reasons.push(
                Reason::new(format!("{} unavailable, neutral default used", d.signal.as_str()))
                    .kind(ReasonKind::Default),
            );
        }

        Ok(ValidationResult {
            report_id: report.id,
            status,
            final_score,
            aggregate_score: round3(aggregate),
            threshold,
            layer_scores,
            layers: LayerBreakdown {
                physical,
                statistical: StatisticalBreakdown {
                    score: statistical_score,
                    cluster,
                    rules,
                    clusters,
                },
                reputation,
                corroboration,
                visual,
            },
            normalized_weights,
            features: gathered.features,
            rainfall_mm: gathered.rainfall_mm,
            ground_truth: gathered.zone.clone(),
            defaulted: gathered.defaulted.clone(),
            reasons,
            trust_after: None,
        })
    }

    /// FeedbackUpdate for trust. Failure is logged and leaves `trust_after` empty.
    async fn record_trust(&self, report: &Report, status: Status) -> Option<TrustProfile> {
        let limit = self.config.timeouts.trust();
        match tokio::time::timeout(limit, self.reputation.record_outcome(report.user_id, status))
            .await
        {
            Ok(Ok(profile)) => Some(profile),
            Ok(Err(e)) => {
                counter!("trust_update_failures_total").increment(1);
                warn!(user = %anon_user(report.user_id), error = %e, "trust update failed");
                None
            }
            Err(_) => {
                counter!("trust_update_failures_total").increment(1);
                warn!(user = %anon_user(report.user_id), "trust update timed out");
                None
            }
        }
    }
}

/// Await `fut` under `limit`; any error or timeout becomes a defaulted signal.
async fn guarded<T, F>(signal: Signal, limit: Duration, fut: F) -> Result<T, DefaultedSignal>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(DefaultedSignal::new(signal, DefaultCause::Error).with_detail(format!("{e:#}"))),
        Err(_) => Err(DefaultedSignal::new(signal, DefaultCause::Timeout)),
    }
}
