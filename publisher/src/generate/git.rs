//! SCM revisions checked out by the build

use crate::context::{BuildContext, Upstream};
use crate::error::GeneratorError;
use crate::generate::{Deduplicator, GeneratorContext, PointGenerator};
use crate::point::Point;
use async_trait::async_trait;

const MEASUREMENT: &str = "git_data";

/// One point per checked out revision
pub struct GitPointGenerator;

#[async_trait]
impl PointGenerator for GitPointGenerator {
    fn name(&self) -> &'static str {
        "git"
    }

    fn upstream(&self) -> Option<Upstream> {
        Some(Upstream::Git)
    }

    fn has_report(&self, build: &dyn BuildContext, _ctx: &GeneratorContext) -> bool {
        !build.actions().scm_revisions.is_empty()
    }

    async fn generate(
        &self,
        build: &dyn BuildContext,
        ctx: &GeneratorContext,
    ) -> Result<Vec<Point>, GeneratorError> {
        // Multi-checkout pipelines repeat the same revision action
        let mut seen = Deduplicator::new();
        let mut points = Vec::new();
        for revision in &build.actions().scm_revisions {
            if !seen.check(revision) {
                continue;
            }
            let mut point = ctx.point(MEASUREMENT, build);
            point
                .add_field("git_repository", revision.repository_url.as_str())
                .add_field("git_reference", revision.reference.as_str())
                .add_field("git_revision", revision.revision.as_str());
            points.push(point.build()?);
        }
        Ok(points)
    }
}
