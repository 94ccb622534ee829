//! Generator registry for buildflux
//!
//! Holds every point generator in a fixed order. Built once at startup and
//! then used read-only by every publication.

use crate::console::Console;
use crate::context::BuildContext;
use crate::error::{GeneratorError, PointError};
use crate::generate::{
    AgentPointGenerator, Availability, BasePointGenerator, ChangeLogPointGenerator,
    CoberturaPointGenerator, CodeCoveragePointGenerator, CustomDataMapPointGenerator,
    CustomDataPointGenerator, GeneratorContext, GitPointGenerator, JUnitPointGenerator,
    JacocoPointGenerator, PerformancePointGenerator, PointGenerator, QueueMetricsPointGenerator,
    RobotFrameworkPointGenerator, SonarQubePointGenerator,
};
use crate::metrics;
use crate::point::Point;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Registry of point generators
///
/// Generators run in registration order. Order only affects log output and
/// the relative order of points in the batch.
pub struct GeneratorRegistry {
    generators: Vec<Arc<dyn PointGenerator>>,
}

impl GeneratorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            generators: Vec::new(),
        }
    }

    /// Registry with every built-in generator
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(BasePointGenerator));
        registry.register(Arc::new(CustomDataPointGenerator));
        registry.register(Arc::new(CustomDataMapPointGenerator));
        registry.register(Arc::new(ChangeLogPointGenerator));
        registry.register(Arc::new(CoberturaPointGenerator));
        registry.register(Arc::new(JacocoPointGenerator));
        registry.register(Arc::new(CodeCoveragePointGenerator));
        registry.register(Arc::new(PerformancePointGenerator));
        registry.register(Arc::new(JUnitPointGenerator));
        registry.register(Arc::new(RobotFrameworkPointGenerator));
        registry.register(Arc::new(AgentPointGenerator));
        registry.register(Arc::new(GitPointGenerator));
        registry.register(Arc::new(SonarQubePointGenerator));
        registry.register(Arc::new(QueueMetricsPointGenerator));
        registry
    }

    /// Register a generator after the ones already present
    pub fn register(&mut self, generator: Arc<dyn PointGenerator>) {
        debug!(generator = generator.name(), "Registered generator");
        self.generators.push(generator);
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    /// Generator names in run order
    pub fn names(&self) -> Vec<&'static str> {
        self.generators.iter().map(|g| g.name()).collect()
    }

    /// Run every generator against one build and collect the batch
    ///
    /// A generator that fails is logged and skipped; points from the others
    /// are kept. The one error that aborts collection is an encoding
    /// mismatch, which means point construction itself is broken.
    pub async fn collect(
        &self,
        build: &dyn BuildContext,
        ctx: &GeneratorContext,
        console: &dyn Console,
    ) -> Result<Vec<Point>, PointError> {
        let mut batch = Vec::new();

        for generator in &self.generators {
            let name = generator.name();
            match generator.availability(build, ctx) {
                Availability::Ready => {}
                Availability::ReportAbsent => {
                    debug!(generator = name, "No report, skipping");
                    continue;
                }
                Availability::DependencyMissing(upstream) => {
                    debug!(generator = name, upstream = ?upstream, "Upstream not installed, skipping");
                    continue;
                }
            }

            match generator.generate(build, ctx).await {
                Ok(points) => {
                    debug!(generator = name, points = points.len(), "Generated points");
                    metrics::try_record_points(name, points.len());
                    batch.extend(points);
                }
                Err(GeneratorError::Point(e @ PointError::EncodingMismatch { .. })) => {
                    error!(generator = name, error = %e, "Line protocol encoders disagree");
                    console.line(&format!("Aborting, {name} produced an inconsistent point: {e}"));
                    return Err(e);
                }
                Err(e) => {
                    warn!(generator = name, error = %e, "Generator failed, skipping");
                    console.line(&format!("Failed to collect data from {name}: {e}"));
                    metrics::try_record_generator_failure(name);
                }
            }
        }

        info!(
            job = build.job_path(),
            build = build.build_number(),
            points = batch.len(),
            "Collected points"
        );
        Ok(batch)
    }
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
