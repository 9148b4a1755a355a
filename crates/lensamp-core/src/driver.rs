//! Trial loop: draw parameters, run the solver, keep multiply imaged results.
//!
//! Each attempt moves through
//! `Idle -> Generating -> AwaitingSolver -> Evaluating -> Accepted | Rejected`
//! and the driver finishes in `Complete` once every requested sample is in.

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::error::{LensError, LensResult};
use crate::image::{SampleResult, SolverTable};
use crate::lens::TrialParameters;
use crate::params::ParameterGenerator;
use crate::solver::LensSolver;
use crate::template::SolverTemplate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    Idle,
    Generating,
    AwaitingSolver,
    Evaluating,
    Accepted,
    Rejected,
    Complete,
}

impl fmt::Display for TrialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Generating => write!(f, "generating"),
            Self::AwaitingSolver => write!(f, "awaiting-solver"),
            Self::Evaluating => write!(f, "evaluating"),
            Self::Accepted => write!(f, "accepted"),
            Self::Rejected => write!(f, "rejected"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// What to do when the solver's output table cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Fail the whole run.
    #[default]
    Abort,
    /// Count the attempt as rejected and draw fresh parameters.
    Reroll,
}

impl fmt::Display for MalformedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::Reroll => write!(f, "reroll"),
        }
    }
}

impl std::str::FromStr for MalformedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "reroll" => Ok(Self::Reroll),
            _ => Err(format!("invalid malformed-output policy: {s}")),
        }
    }
}

/// Lenses to sample over.
#[derive(Debug, Clone, PartialEq)]
pub enum LensSource {
    /// A fresh SIE lens is drawn for every attempt.
    Sampled { samples: usize },
    /// Fixed lens lines, each collecting `samples_per_lens` accepted samples
    /// in catalog order.
    Catalog {
        lenses: Vec<String>,
        samples_per_lens: usize,
    },
}

impl LensSource {
    pub fn target(&self) -> usize {
        match self {
            Self::Sampled { samples } => *samples,
            Self::Catalog {
                lenses,
                samples_per_lens,
            } => lenses.len() * samples_per_lens,
        }
    }
}

/// One accepted, multiply imaged trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedSample {
    /// 1-based attempt number that produced this sample.
    pub trial: u64,
    pub params: TrialParameters,
    pub sample: SampleResult,
}

/// Execution bookkeeping for a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub seed: u64,
    pub trials: u64,
    pub accepted: usize,
    pub malformed: u64,
    pub elapsed_secs: f64,
}

impl RunRecord {
    /// Accepted samples per solver invocation, as a percentage.
    pub fn success_percent(&self) -> f64 {
        if self.trials == 0 {
            0.0
        } else {
            100.0 * self.accepted as f64 / self.trials as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub record: RunRecord,
    pub samples: Vec<AcceptedSample>,
}

impl RunOutcome {
    pub fn sample_results(&self) -> Vec<SampleResult> {
        self.samples.iter().map(|s| s.sample.clone()).collect()
    }
}

#[derive(Debug, Default)]
struct Counters {
    trials: u64,
    malformed: u64,
}

// ---------------------------------------------------------------------------
// TrialDriver
// ---------------------------------------------------------------------------

pub struct TrialDriver<'a, S: LensSolver> {
    solver: S,
    template: &'a SolverTemplate,
    generator: &'a ParameterGenerator,
    on_malformed: MalformedPolicy,
    max_trials: Option<u64>,
    state: TrialState,
}

impl<'a, S: LensSolver> TrialDriver<'a, S> {
    pub fn new(solver: S, template: &'a SolverTemplate, generator: &'a ParameterGenerator) -> Self {
        Self {
            solver,
            template,
            generator,
            on_malformed: MalformedPolicy::default(),
            max_trials: None,
            state: TrialState::Idle,
        }
    }

    pub fn on_malformed(mut self, policy: MalformedPolicy) -> Self {
        self.on_malformed = policy;
        self
    }

    /// Give up once this many solver invocations have been made.
    pub fn max_trials(mut self, limit: Option<u64>) -> Self {
        self.max_trials = limit;
        self
    }

    pub fn state(&self) -> TrialState {
        self.state
    }

    /// Run until `source` is satisfied. `seed` is only recorded; the caller
    /// owns the random stream.
    pub fn run<R: Rng + ?Sized>(
        &mut self,
        source: &LensSource,
        rng: &mut R,
        seed: u64,
    ) -> LensResult<RunOutcome> {
        let id = ulid::Ulid::new().to_string();
        let started_at = Utc::now();
        let clock = Instant::now();
        let target = source.target();
        info!("run {id}: collecting {target} multiply imaged samples (seed {seed})");

        self.state = TrialState::Idle;
        let mut counters = Counters::default();
        let mut samples = Vec::with_capacity(target);

        match source {
            LensSource::Sampled { samples: n } => {
                for _ in 0..*n {
                    let accepted =
                        self.collect_one(rng, None, &mut counters, samples.len(), target)?;
                    samples.push(accepted);
                }
            }
            LensSource::Catalog {
                lenses,
                samples_per_lens,
            } => {
                for (i, lens) in lenses.iter().enumerate() {
                    debug!("lens {}/{}: {lens}", i + 1, lenses.len());
                    for _ in 0..*samples_per_lens {
                        let accepted = self.collect_one(
                            rng,
                            Some(lens.as_str()),
                            &mut counters,
                            samples.len(),
                            target,
                        )?;
                        samples.push(accepted);
                    }
                }
            }
        }

        self.transition(TrialState::Complete);
        let record = RunRecord {
            id,
            started_at,
            seed,
            trials: counters.trials,
            accepted: samples.len(),
            malformed: counters.malformed,
            elapsed_secs: clock.elapsed().as_secs_f64(),
        };
        info!(
            "run {}: {} samples from {} trials ({:.2}% good) in {:.1}s",
            record.id,
            record.accepted,
            record.trials,
            record.success_percent(),
            record.elapsed_secs
        );
        Ok(RunOutcome { record, samples })
    }

    /// Attempt until one multiply imaged sample is accepted.
    fn collect_one<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        catalog_lens: Option<&str>,
        counters: &mut Counters,
        accepted: usize,
        target: usize,
    ) -> LensResult<AcceptedSample> {
        loop {
            if let Some(limit) = self.max_trials {
                if counters.trials >= limit {
                    return Err(LensError::Exhausted {
                        trials: counters.trials,
                        accepted,
                        target,
                    });
                }
            }

            self.transition(TrialState::Generating);
            let params = self.generator.draw(rng, catalog_lens)?;
            let input = self.template.render(&params);

            self.transition(TrialState::AwaitingSolver);
            counters.trials += 1;
            let output = self.solver.solve(&input)?;

            self.transition(TrialState::Evaluating);
            match SolverTable::parse(&output) {
                Ok(table) if table.is_multiply_imaged() => {
                    self.transition(TrialState::Accepted);
                    debug!(
                        "trial {}: accepted with {} images ({}/{target})",
                        counters.trials,
                        table.image_count(),
                        accepted + 1
                    );
                    self.transition(TrialState::Idle);
                    return Ok(AcceptedSample {
                        trial: counters.trials,
                        params,
                        sample: table.into_sample(),
                    });
                }
                Ok(table) => {
                    self.transition(TrialState::Rejected);
                    trace!(
                        "trial {}: rejected with {} image(s)",
                        counters.trials,
                        table.image_count()
                    );
                }
                Err(LensError::MalformedOutput(msg))
                    if self.on_malformed == MalformedPolicy::Reroll =>
                {
                    self.transition(TrialState::Rejected);
                    counters.malformed += 1;
                    warn!("trial {}: malformed solver output, rerolling: {msg}", counters.trials);
                }
                Err(e) => return Err(e),
            }
            self.transition(TrialState::Idle);
        }
    }

    fn transition(&mut self, next: TrialState) {
        trace!("{} -> {}", self.state, next);
        self.state = next;
    }
}
