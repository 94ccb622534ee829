//! Queue and scheduling timings

use crate::context::{BuildContext, Upstream};
use crate::error::GeneratorError;
use crate::generate::{GeneratorContext, PointGenerator};
use crate::point::Point;
use async_trait::async_trait;

const MEASUREMENT: &str = "metrics_data";

/// Timing breakdown of how long the build waited and ran
pub struct QueueMetricsPointGenerator;

#[async_trait]
impl PointGenerator for QueueMetricsPointGenerator {
    fn name(&self) -> &'static str {
        "queue_metrics"
    }

    fn upstream(&self) -> Option<Upstream> {
        Some(Upstream::Metrics)
    }

    fn has_report(&self, build: &dyn BuildContext, _ctx: &GeneratorContext) -> bool {
        build.actions().queue_timing.is_some()
    }

    async fn generate(
        &self,
        build: &dyn BuildContext,
        ctx: &GeneratorContext,
    ) -> Result<Vec<Point>, GeneratorError> {
        let Some(timing) = &build.actions().queue_timing else {
            return Ok(Vec::new());
        };

        let mut point = ctx.point(MEASUREMENT, build);
        let values = [
            ("blocked_time", timing.blocked_ms),
            ("buildable_time", timing.buildable_ms),
            ("building_time", timing.building_ms),
            ("executing_time", timing.executing_ms),
            ("queuing_time", timing.queuing_ms),
            ("waiting_time", timing.waiting_ms),
            ("total_duration", timing.total_duration_ms),
            ("subtask_count", timing.subtask_count),
        ];
        for (name, value) in values {
            if let Some(value) = value {
                point.add_field(name, value);
            }
        }
        if let Some(utilization) = timing.executor_utilization {
            point.add_field("executor_utilization", utilization);
        }

        Ok(vec![point.build()?])
    }
}
