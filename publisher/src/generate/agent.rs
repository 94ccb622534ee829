//! Agents (nodes) the build ran on

use crate::context::BuildContext;
use crate::error::GeneratorError;
use crate::generate::{Deduplicator, GeneratorContext, PointGenerator};
use crate::point::Point;
use async_trait::async_trait;

const MEASUREMENT: &str = "agent_data";

/// One point per distinct agent. Classic jobs run on a single agent,
/// pipelines may visit several and revisit the same one across stages.
pub struct AgentPointGenerator;

#[async_trait]
impl PointGenerator for AgentPointGenerator {
    fn name(&self) -> &'static str {
        "agent"
    }

    fn has_report(&self, build: &dyn BuildContext, _ctx: &GeneratorContext) -> bool {
        build.agents().iter().any(|a| !a.name.trim().is_empty())
    }

    async fn generate(
        &self,
        build: &dyn BuildContext,
        ctx: &GeneratorContext,
    ) -> Result<Vec<Point>, GeneratorError> {
        let mut seen = Deduplicator::new();
        let mut points = Vec::new();
        for agent in build.agents() {
            let name = agent.name.trim();
            if name.is_empty() || !seen.check(name) {
                continue;
            }
            let mut point = ctx.point(MEASUREMENT, build);
            point
                .add_field("agent_name", name)
                .add_field("agent_label", agent.labels.join(", "));
            points.push(point.build()?);
        }
        Ok(points)
    }
}
