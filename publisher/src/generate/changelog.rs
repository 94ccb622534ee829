//! SCM changelog summary

use crate::context::BuildContext;
use crate::error::GeneratorError;
use crate::generate::{GeneratorContext, PointGenerator};
use crate::point::Point;
use async_trait::async_trait;

const MEASUREMENT: &str = "changelog_data";

/// One point aggregating the commits of this build
pub struct ChangeLogPointGenerator;

#[async_trait]
impl PointGenerator for ChangeLogPointGenerator {
    fn name(&self) -> &'static str {
        "changelog"
    }

    fn has_report(&self, build: &dyn BuildContext, _ctx: &GeneratorContext) -> bool {
        build.change_sets().is_some_and(|entries| !entries.is_empty())
    }

    async fn generate(
        &self,
        build: &dyn BuildContext,
        ctx: &GeneratorContext,
    ) -> Result<Vec<Point>, GeneratorError> {
        let entries = build.change_sets().unwrap_or_default();

        let mut messages = String::new();
        let mut authors = String::new();
        let mut paths = String::new();
        for entry in entries {
            messages.push_str(entry.message.trim());
            messages.push_str(". ");
            authors.push_str(&entry.author);
            authors.push_str(", ");
            for path in &entry.affected_paths {
                paths.push_str(path);
                paths.push_str(", ");
            }
        }

        let mut point = ctx.point(MEASUREMENT, build);
        point
            .add_field("commit_messages", trim_separator(&messages, ". "))
            .add_field("commit_authors", trim_separator(&authors, ", "))
            .add_field("affected_paths", trim_separator(&paths, ", "))
            .add_field("commit_count", entries.len());

        Ok(vec![point.build()?])
    }
}

fn trim_separator<'a>(joined: &'a str, separator: &str) -> &'a str {
    joined.strip_suffix(separator).unwrap_or(joined)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::context::{BuildRecord, ChangeSetEntry};
    use crate::generate::testing::context;
    use crate::options::PublishOptions;
    use crate::point::FieldValue;

    fn entry(message: &str, author: &str, paths: &[&str]) -> ChangeSetEntry {
        ChangeSetEntry {
            message: message.to_string(),
            author: author.to_string(),
            affected_paths: paths.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_build_without_changesets() {
        let mut build = BuildRecord::new("app", 1);
        let ctx = context(&build, PublishOptions::default());
        assert!(!ChangeLogPointGenerator.has_report(&build, &ctx));

        build.change_sets = Some(vec![]);
        assert!(!ChangeLogPointGenerator.has_report(&build, &ctx));
    }

    #[tokio::test]
    async fn test_changelog_aggregation() {
        let mut build = BuildRecord::new("app", 1);
        build.change_sets = Some(vec![
            entry("Fix parser", "alice", &["src/parser.rs"]),
            entry("Add docs\n", "bob", &["README.md", "docs/a.md"]),
        ]);
        let ctx = context(&build, PublishOptions::default());

        assert!(ChangeLogPointGenerator.has_report(&build, &ctx));
        let points = ChangeLogPointGenerator.generate(&build, &ctx).await.unwrap();
        let p = &points[0];
        assert_eq!(p.measurement(), "changelog_data");
        assert_eq!(
            p.field("commit_messages"),
            Some(&FieldValue::String("Fix parser. Add docs".into()))
        );
        assert_eq!(
            p.field("commit_authors"),
            Some(&FieldValue::String("alice, bob".into()))
        );
        assert_eq!(
            p.field("affected_paths"),
            Some(&FieldValue::String("src/parser.rs, README.md, docs/a.md".into()))
        );
        assert_eq!(p.field("commit_count"), Some(&FieldValue::Integer(2)));
    }
}
