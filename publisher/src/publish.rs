//! Publication service - the pipeline for one finished build
//!
//! ```text
//! BuildContext ──► GeneratorRegistry ──► batch ──► ClientWrapper per Target
//! ```
//!
//! Everything runs sequentially: generators one after another, then one
//! batched write per Target. A failing generator or Target never stops the
//! others. Target failures reach the caller only for Targets that expose
//! them, and only after every Target has been attempted.

use crate::client::{ClientWrapper, HttpClient};
use crate::console::{Console, StdoutConsole};
use crate::context::BuildContext;
use crate::error::{ClientError, PublishError, Result};
use crate::generate::{Clock, GeneratorContext, SystemClock};
use crate::metrics;
use crate::options::PublishOptions;
use crate::point::Point;
use crate::registry::GeneratorRegistry;
use crate::target::Target;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// What happened to one Target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    Written { points: usize },
    /// Target URL did not parse
    Skipped { reason: String },
    /// `kind` is the failing error's kind, e.g. `connection_failed`
    Failed {
        error: String,
        kind: &'static str,
        exposed: bool,
    },
}

impl TargetOutcome {
    /// Outcome label recorded in the write counter
    pub fn label(&self) -> &'static str {
        match self {
            TargetOutcome::Written { .. } => "ok",
            TargetOutcome::Skipped { .. } => "skipped",
            TargetOutcome::Failed { kind, .. } => kind,
        }
    }
}

/// Summary of one publication
#[derive(Debug, Clone, Default)]
pub struct PublicationReport {
    /// Points in the batch built for publication-time Targets
    pub points: usize,
    /// Per Target outcome, in the order Targets were given
    pub targets: Vec<(String, TargetOutcome)>,
}

impl PublicationReport {
    pub fn outcome(&self, description: &str) -> Option<&TargetOutcome> {
        self.targets
            .iter()
            .find(|(d, _)| d == description)
            .map(|(_, o)| o)
    }
}

/// Runs generators and delivers the batch
pub struct PublicationService {
    registry: Arc<GeneratorRegistry>,
    http: HttpClient,
    clock: Arc<dyn Clock>,
    console: Arc<dyn Console>,
}

impl PublicationService {
    pub fn new(registry: Arc<GeneratorRegistry>, http: HttpClient) -> Self {
        Self {
            registry,
            http,
            clock: Arc::new(SystemClock),
            console: Arc::new(StdoutConsole),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_console(mut self, console: Arc<dyn Console>) -> Self {
        self.console = console;
        self
    }

    async fn collect(
        &self,
        build: &dyn BuildContext,
        options: &Arc<PublishOptions>,
        timestamp_ns: i64,
    ) -> Result<Vec<Point>> {
        let ctx = GeneratorContext::new(
            build,
            Arc::clone(options),
            timestamp_ns,
            Arc::clone(&self.clock),
            self.http.shared(),
        );
        Ok(self
            .registry
            .collect(build, &ctx, self.console.as_ref())
            .await?)
    }

    /// Publish one build to the given Targets
    ///
    /// The batch is generated once per timestamp mode: Targets that time
    /// points at the scheduled time get their own batch.
    pub async fn perform(
        &self,
        build: &dyn BuildContext,
        targets: &[Target],
        options: &PublishOptions,
    ) -> Result<PublicationReport> {
        let started = Instant::now();
        let mut report = PublicationReport::default();
        if targets.is_empty() {
            info!(job = build.job_path(), "No targets selected");
            return Ok(report);
        }

        let options = Arc::new(options.clone());
        self.console.line("Collecting data...");

        let mut now_batch = None;
        if targets.iter().any(|t| !t.job_scheduled_time_as_timestamp) {
            let batch = self.collect(build, &options, self.clock.now_ns()).await?;
            report.points = batch.len();
            now_batch = Some(batch);
        }
        let mut scheduled_batch = None;
        if targets.iter().any(|t| t.job_scheduled_time_as_timestamp) {
            let scheduled_ns = build.scheduled_time_ms().saturating_mul(1_000_000);
            scheduled_batch = Some(self.collect(build, &options, scheduled_ns).await?);
        }

        let mut exposed: Option<PublishError> = None;
        for target in targets {
            let batch = if target.job_scheduled_time_as_timestamp {
                scheduled_batch.as_deref()
            } else {
                now_batch.as_deref()
            }
            .unwrap_or_default();

            self.console
                .line(&format!("Publishing data to: {}", target.description));
            let outcome = match self.deliver(target, batch).await {
                Ok(()) => TargetOutcome::Written {
                    points: batch.len(),
                },
                Err(ClientError::InvalidUrl { url, reason }) => {
                    warn!(destination = %target.description, url = %url, reason = %reason, "Skipping target with invalid URL");
                    self.console.line(&format!(
                        "Skipping {}: invalid URL '{}'",
                        target.description, url
                    ));
                    TargetOutcome::Skipped { reason }
                }
                Err(e) => {
                    let message = e.to_string();
                    let kind = e.kind();
                    if target.expose_exceptions {
                        error!(destination = %target.description, error = %e, "Publication failed");
                        if exposed.is_none() {
                            exposed = Some(PublishError::Target {
                                target: target.description.clone(),
                                source: e,
                            });
                        }
                    } else {
                        warn!(destination = %target.description, error = %e, "Publication failed, ignoring");
                    }
                    self.console.line(&format!(
                        "Failed to publish to {}: {}",
                        target.description, message
                    ));
                    TargetOutcome::Failed {
                        error: message,
                        kind,
                        exposed: target.expose_exceptions,
                    }
                }
            };
            metrics::try_record_write(&target.description, outcome.label());
            report.targets.push((target.description.clone(), outcome));
        }

        let elapsed = started.elapsed().as_secs_f64();
        metrics::try_record_publication(elapsed);
        info!(
            job = build.job_path(),
            build = build.build_number(),
            targets = targets.len(),
            elapsed_secs = elapsed,
            "Publication completed"
        );
        self.console.line("Completed.");

        match exposed {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    async fn deliver(&self, target: &Target, batch: &[Point]) -> std::result::Result<(), ClientError> {
        let mut client = ClientWrapper::new(target.clone(), self.http.for_target(target))?;
        let result = match client.connect().await {
            Ok(()) => client.write_points(batch).await,
            Err(e) => Err(e),
        };
        client.close().await;
        result
    }
}
