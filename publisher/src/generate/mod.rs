//! Point generators
//!
//! Each generator wraps one upstream data source and turns it into points.
//! Generators are stateless and registered once in a
//! [`GeneratorRegistry`](crate::registry::GeneratorRegistry); the build and
//! the shared [`GeneratorContext`] are passed on every call.
//!
//! # Example
//!
//! ```ignore
//! struct LintGenerator;
//!
//! #[async_trait]
//! impl PointGenerator for LintGenerator {
//!     fn name(&self) -> &'static str { "lint" }
//!
//!     fn has_report(&self, build: &dyn BuildContext, _ctx: &GeneratorContext) -> bool {
//!         build.log().contains("lint finished")
//!     }
//!
//!     async fn generate(
//!         &self,
//!         build: &dyn BuildContext,
//!         ctx: &GeneratorContext,
//!     ) -> Result<Vec<Point>, GeneratorError> {
//!         let mut point = ctx.point("lint_data", build);
//!         point.add_field("warnings", 3i64);
//!         Ok(vec![point.build()?])
//!     }
//! }
//! ```

pub mod agent;
pub mod base;
pub mod changelog;
pub mod coverage;
pub mod custom;
pub mod dedup;
pub mod git;
pub mod junit;
pub mod performance;
pub mod queue;
pub mod robot;
pub mod sonarqube;

use crate::context::{BuildContext, Upstream};
use crate::error::GeneratorError;
use crate::options::{PublishOptions, resolve_env_parameters};
use crate::point::{Point, PointBuilder, Precision, normalize_measurement};
use crate::renderer::MeasurementRenderer;
use async_trait::async_trait;
use std::sync::Arc;

pub use agent::AgentPointGenerator;
pub use base::BasePointGenerator;
pub use changelog::ChangeLogPointGenerator;
pub use coverage::{CoberturaPointGenerator, CodeCoveragePointGenerator, JacocoPointGenerator};
pub use custom::{CustomDataMapPointGenerator, CustomDataPointGenerator};
pub use dedup::Deduplicator;
pub use git::GitPointGenerator;
pub use junit::JUnitPointGenerator;
pub use performance::PerformancePointGenerator;
pub use queue::QueueMetricsPointGenerator;
pub use robot::RobotFrameworkPointGenerator;
pub use sonarqube::SonarQubePointGenerator;

/// Tag carrying the custom prefix on every point
pub const PREFIX_TAG: &str = "prefix";

/// Whether a generator can contribute to this build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Ready,
    /// Nothing to report for this build
    ReportAbsent,
    /// The upstream plugin is not installed on the host
    DependencyMissing(Upstream),
}

/// Generator trait - turns one upstream report into points
#[async_trait]
pub trait PointGenerator: Send + Sync {
    /// Generator name for identification and logging
    fn name(&self) -> &'static str;

    /// Upstream plugin this generator reads from, if any
    fn upstream(&self) -> Option<Upstream> {
        None
    }

    /// Cheap presence check. Returns false when the report is absent.
    fn has_report(&self, build: &dyn BuildContext, ctx: &GeneratorContext) -> bool;

    /// Produce points. Only called after `has_report` returned true.
    async fn generate(
        &self,
        build: &dyn BuildContext,
        ctx: &GeneratorContext,
    ) -> Result<Vec<Point>, GeneratorError>;

    fn availability(&self, build: &dyn BuildContext, ctx: &GeneratorContext) -> Availability {
        if let Some(upstream) = self.upstream() {
            if !build.plugin_installed(upstream) {
                return Availability::DependencyMissing(upstream);
            }
        }
        if self.has_report(build, ctx) {
            Availability::Ready
        } else {
            Availability::ReportAbsent
        }
    }
}

/// Source of wall clock time in nanoseconds
pub trait Clock: Send + Sync {
    fn now_ns(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ns(&self) -> i64 {
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
    }
}

/// Clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_ns(&self) -> i64 {
        self.0
    }
}

/// Strictly increasing timestamps anchored at a base
///
/// Each value is the base plus the time elapsed since the sequence started,
/// bumped by one nanosecond whenever it would not exceed the previous value.
pub struct TimestampSequence<'a> {
    clock: &'a dyn Clock,
    origin: i64,
    base: i64,
    last: Option<i64>,
}

impl<'a> TimestampSequence<'a> {
    pub fn new(clock: &'a dyn Clock, base_ns: i64) -> Self {
        Self {
            clock,
            origin: clock.now_ns(),
            base: base_ns,
            last: None,
        }
    }

    pub fn next(&mut self) -> i64 {
        let elapsed = self.clock.now_ns().saturating_sub(self.origin).max(0);
        let candidate = self.base.saturating_add(elapsed);
        let next = match self.last {
            Some(last) if candidate <= last => last + 1,
            _ => candidate,
        };
        self.last = Some(next);
        next
    }
}

/// State shared by every generator during one publication
#[derive(Clone)]
pub struct GeneratorContext {
    pub renderer: MeasurementRenderer,
    pub options: Arc<PublishOptions>,
    /// Timestamp shared by all points that do not need their own
    pub timestamp_ns: i64,
    pub clock: Arc<dyn Clock>,
    pub http: reqwest::Client,
    env_tags: Vec<(String, String)>,
}

impl GeneratorContext {
    pub fn new(
        build: &dyn BuildContext,
        options: Arc<PublishOptions>,
        timestamp_ns: i64,
        clock: Arc<dyn Clock>,
        http: reqwest::Client,
    ) -> Self {
        let renderer = MeasurementRenderer::new(
            options.custom_prefix.clone(),
            options.custom_project_name.clone(),
        )
        .replace_dashes(options.replace_dashes);
        let env_tags = options
            .env_parameter_tags
            .as_deref()
            .map(|text| resolve_env_parameters(text, build.environment()))
            .unwrap_or_default();

        Self {
            renderer,
            options,
            timestamp_ns,
            clock,
            http,
            env_tags,
        }
    }

    /// Start a point with the identity every generator shares: project name,
    /// path and build number as fields, project name/path, prefix and env
    /// tags as tags, and the shared timestamp.
    pub fn point(&self, measurement: &str, build: &dyn BuildContext) -> PointBuilder {
        let project_name = self.renderer.render(build);

        let mut point = Point::builder(measurement);
        point
            .add_field("project_name", project_name.as_str())
            .add_field("project_path", build.job_path())
            .add_field("build_number", build.build_number())
            .add_tag("project_name", project_name)
            .add_tag("project_path", build.job_path())
            .set_timestamp(self.timestamp_ns, Precision::Nanoseconds);

        if let Some(prefix) = self.renderer.custom_prefix() {
            point.add_tag(PREFIX_TAG, normalize_measurement(prefix));
        }
        point.add_tags(self.env_tags.iter().cloned());
        point
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub(crate) const BASE_TS: i64 = 1_700_000_000_000_000_000;

    pub(crate) fn context(build: &dyn BuildContext, options: PublishOptions) -> GeneratorContext {
        GeneratorContext::new(
            build,
            Arc::new(options),
            BASE_TS,
            Arc::new(FixedClock(BASE_TS)),
            reqwest::Client::new(),
        )
    }
}
