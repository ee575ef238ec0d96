use crate::core::models::configuration::Configuration;
use crate::core::registry::ModelRegistry;
use crate::engine::cancel::CancelToken;
use crate::engine::config::SamplingConfig;
use crate::engine::deviation;
use crate::engine::error::EngineError;
use crate::engine::predictor::{Committee, ModelLoader};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::selection::{self, Candidate};
use crate::engine::state::{DeviationRecord, Diagnostics, Phase, Selection, SkippedFrame};
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Result of one sampling run.
#[derive(Debug)]
pub struct SampleOutcome {
    /// The capacity-limited, in-band subset chosen for re-labeling.
    pub selection: Selection,
    /// Per-frame scores and the skipped-list, for external reporting.
    pub diagnostics: Diagnostics,
    /// Terminal phase of the run.
    pub phase: Phase,
}

/// Streams a trajectory through the committee and selects frames to re-label.
///
/// Frames are pulled from `configurations` in bounded batches, so the full
/// trajectory is never materialized; peak memory is roughly the batch size
/// plus the in-band candidate set. Within a batch, frames are evaluated
/// concurrently, but diagnostics and selection output are always in stream
/// order, independent of the degree of parallelism.
///
/// Failures evaluating a single frame are recorded in the skipped-list and
/// never abort the run. Failures detected before any frame is pulled (a
/// committee too small to disagree, unusable band or capacity parameters)
/// abort immediately.
///
/// Cancellation via `token` is cooperative: the in-flight batch finishes, no
/// further frames are admitted, and the partial diagnostics and selection
/// remain valid and consistently ordered.
#[instrument(skip_all, name = "sampling_workflow")]
pub fn run<I>(
    committee: &Committee,
    configurations: I,
    config: &SamplingConfig,
    reporter: &ProgressReporter,
    token: &CancelToken,
) -> Result<SampleOutcome, EngineError>
where
    I: IntoIterator<Item = Configuration>,
{
    let mut phase = Phase::NotStarted;

    if committee.len() < 2 {
        advance(&mut phase, Phase::Failed);
        return Err(EngineError::InsufficientEnsembleSize {
            size: committee.len(),
        });
    }
    if let Err(e) = selection::validate_parameters(config.lo, config.hi, config.max_n) {
        advance(&mut phase, Phase::Failed);
        return Err(e.into());
    }

    info!(
        committee = committee.label(),
        members = committee.len(),
        lo = config.lo,
        hi = config.hi,
        max_n = config.max_n,
        "Starting sampling run"
    );

    advance(&mut phase, Phase::Streaming);
    reporter.report(Progress::PhaseStart { name: "Streaming" });

    let mut diagnostics = Diagnostics::default();
    let mut candidates: Vec<Candidate> = Vec::new();
    let mut stream = configurations.into_iter();
    let mut processed: u64 = 0;

    loop {
        if token.is_cancelled() {
            warn!(processed, "Cancellation requested, stopping stream intake");
            break;
        }
        let batch: Vec<Configuration> = stream.by_ref().take(config.batch_size).collect();
        if batch.is_empty() {
            break;
        }

        for outcome in score_batch(committee, batch, config.keep_per_atom) {
            processed += 1;
            match outcome {
                Ok((configuration, record)) => {
                    if record.eps_t >= config.lo && record.eps_t <= config.hi {
                        candidates.push(Candidate {
                            configuration,
                            record: record.clone(),
                        });
                    }
                    diagnostics.records.push(record);
                }
                Err(skipped) => {
                    warn!(
                        index = skipped.index,
                        cause = %skipped.cause,
                        "Skipping frame after evaluation failure"
                    );
                    diagnostics.skipped.push(skipped);
                }
            }
        }
        reporter.report(Progress::FramesProcessed { count: processed });
    }
    reporter.report(Progress::PhaseFinish);

    advance(&mut phase, Phase::Filtering);
    debug!(
        scored = diagnostics.records.len(),
        skipped = diagnostics.skipped.len(),
        candidates = candidates.len(),
        "Stream finished"
    );

    advance(&mut phase, Phase::Selecting);
    reporter.report(Progress::PhaseStart { name: "Selecting" });
    let selection = selection::select(
        candidates,
        config.lo,
        config.hi,
        config.max_n,
        config.strategy,
    )?;
    reporter.report(Progress::PhaseFinish);

    advance(&mut phase, Phase::Done);
    info!(
        selected = selection.len(),
        scored = diagnostics.records.len(),
        skipped = diagnostics.skipped.len(),
        "Sampling run complete"
    );

    Ok(SampleOutcome {
        selection,
        diagnostics,
        phase,
    })
}

/// Resolves a registry label into a live committee and runs sampling.
///
/// Resolution failures (unknown label, unloadable artifact) surface before
/// any frame is pulled from the stream.
pub fn run_with_registry<I>(
    registry: &ModelRegistry,
    label: &str,
    loader: &dyn ModelLoader,
    configurations: I,
    config: &SamplingConfig,
    reporter: &ProgressReporter,
    token: &CancelToken,
) -> Result<SampleOutcome, EngineError>
where
    I: IntoIterator<Item = Configuration>,
{
    let ensemble = registry.get(label)?;
    let committee = Committee::from_ensemble(&ensemble, loader)?;
    run(&committee, configurations, config, reporter, token)
}

fn advance(phase: &mut Phase, next: Phase) {
    let from = *phase;
    debug!(?from, ?next, "Phase transition");
    *phase = next;
}

// Scores one batch; output order matches batch order even when evaluation
// runs concurrently.
fn score_batch(
    committee: &Committee,
    batch: Vec<Configuration>,
    keep_per_atom: bool,
) -> Vec<Result<(Configuration, DeviationRecord), SkippedFrame>> {
    #[cfg(feature = "parallel")]
    let iterator = batch.into_par_iter();

    #[cfg(not(feature = "parallel"))]
    let iterator = batch.into_iter();

    iterator
        .map(|configuration| score_frame(committee, configuration, keep_per_atom))
        .collect()
}

fn score_frame(
    committee: &Committee,
    configuration: Configuration,
    keep_per_atom: bool,
) -> Result<(Configuration, DeviationRecord), SkippedFrame> {
    let index = configuration.index();
    let predictions = committee
        .evaluate(&configuration)
        .map_err(|cause| SkippedFrame {
            index,
            cause: cause.into(),
        })?;
    let deviation = deviation::max_force_deviation(&predictions).map_err(|cause| SkippedFrame {
        index,
        cause: cause.into(),
    })?;
    let record = DeviationRecord {
        index,
        eps_t: deviation.eps_t,
        per_atom: keep_per_atom.then_some(deviation.per_atom),
    };
    Ok((configuration, record))
}
