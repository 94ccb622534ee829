//! Project name rendering shared by every generator

use crate::context::BuildContext;

/// Maps a build to the project name used in points
///
/// Holds configuration only; the build is passed on every call, so one
/// renderer can serve any number of builds.
#[derive(Debug, Clone, Default)]
pub struct MeasurementRenderer {
    custom_project_name: Option<String>,
    custom_prefix: Option<String>,
    replace_dashes: bool,
}

impl MeasurementRenderer {
    pub fn new(custom_prefix: Option<String>, custom_project_name: Option<String>) -> Self {
        Self {
            custom_project_name: custom_project_name.filter(|s| !s.trim().is_empty()),
            custom_prefix: custom_prefix.filter(|s| !s.trim().is_empty()),
            replace_dashes: false,
        }
    }

    /// Replace `-` with `_` in the rendered name
    pub fn replace_dashes(mut self, enabled: bool) -> Self {
        self.replace_dashes = enabled;
        self
    }

    pub fn custom_prefix(&self) -> Option<&str> {
        self.custom_prefix.as_deref()
    }

    pub fn render(&self, build: &dyn BuildContext) -> String {
        let name = self
            .custom_project_name
            .as_deref()
            .unwrap_or_else(|| build.job_name());

        let rendered = match &self.custom_prefix {
            Some(prefix) => format!("{prefix}_{name}"),
            None => name.to_string(),
        };

        if self.replace_dashes {
            rendered.replace('-', "_")
        } else {
            rendered
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BuildRecord;

    #[test]
    fn test_plain_job_name() {
        let renderer = MeasurementRenderer::default();
        let build = BuildRecord::new("folder/influxdb-test-job", 1);
        assert_eq!(renderer.render(&build), "influxdb-test-job");
    }

    #[test]
    fn test_prefix_and_custom_name() {
        let renderer = MeasurementRenderer::new(Some("ci".into()), Some("renamed".into()));
        let build = BuildRecord::new("job", 1);
        assert_eq!(renderer.render(&build), "ci_renamed");
    }

    #[test]
    fn test_blank_options_are_ignored() {
        let renderer = MeasurementRenderer::new(Some(" ".into()), Some(String::new()));
        let build = BuildRecord::new("job", 1);
        assert_eq!(renderer.render(&build), "job");
    }

    #[test]
    fn test_dash_replacement() {
        let renderer = MeasurementRenderer::new(Some("my-prefix".into()), None).replace_dashes(true);
        let build = BuildRecord::new("my-job", 1);
        assert_eq!(renderer.render(&build), "my_prefix_my_job");
    }

    #[test]
    fn test_no_state_carried_between_builds() {
        let renderer = MeasurementRenderer::new(Some("pre".into()), None);
        let first = BuildRecord::new("alpha", 1);
        let second = BuildRecord::new("beta", 2);
        assert_eq!(renderer.render(&first), "pre_alpha");
        assert_eq!(renderer.render(&second), "pre_beta");
        assert_eq!(renderer.render(&first), "pre_alpha");
    }
}
