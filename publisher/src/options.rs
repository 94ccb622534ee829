//! Per-publication options supplied by the caller (job step or pipeline)

use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

/// Base measurement name when the caller does not override it
pub const DEFAULT_MEASUREMENT: &str = "jenkins_data";

/// Caller supplied options for one publication
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PublishOptions {
    pub custom_project_name: Option<String>,
    pub custom_prefix: Option<String>,
    /// Flat custom fields, merged into one custom data point
    pub custom_data: BTreeMap<String, serde_json::Value>,
    pub custom_data_tags: BTreeMap<String, String>,
    /// Series name to fields, one point per series
    pub custom_data_map: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
    pub custom_data_map_tags: BTreeMap<String, BTreeMap<String, String>>,
    pub measurement_name: Option<String>,
    /// `KEY=VALUE` lines added as fields to the base point, `$VAR` resolved
    /// against the build environment
    pub env_parameter_fields: Option<String>,
    /// `KEY=VALUE` lines added as tags to every point
    pub env_parameter_tags: Option<String>,
    pub replace_dashes: bool,
}

impl PublishOptions {
    pub fn measurement_name(&self) -> &str {
        self.measurement_name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_MEASUREMENT)
    }
}

/// Parse `KEY=VALUE` lines and expand `$VAR` / `${VAR}` references.
///
/// Blank lines and `#` comments are skipped. Unknown variables are left as
/// written.
pub fn resolve_env_parameters(text: &str, env: &HashMap<String, String>) -> Vec<(String, String)> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), expand(value.trim(), env)))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

fn expand(value: &str, env: &HashMap<String, String>) -> String {
    static VARIABLE: OnceLock<Regex> = OnceLock::new();
    let re = VARIABLE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)").unwrap()
    });
    re.replace_all(value, |caps: &Captures<'_>| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        env.get(name)
            .cloned()
            .unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> HashMap<String, String> {
        HashMap::from([
            ("NODE_NAME".to_string(), "agent-3".to_string()),
            ("GIT_BRANCH".to_string(), "main".to_string()),
        ])
    }

    #[test]
    fn test_default_measurement() {
        assert_eq!(PublishOptions::default().measurement_name(), "jenkins_data");
        let opts = PublishOptions {
            measurement_name: Some("ci".into()),
            ..Default::default()
        };
        assert_eq!(opts.measurement_name(), "ci");
    }

    #[test]
    fn test_resolve_env_parameters() {
        let text = "# comment\nnode=$NODE_NAME\n\nbranch = ${GIT_BRANCH}-x\nmissing=$NOPE\nbad line";
        let resolved = resolve_env_parameters(text, &env());
        assert_eq!(
            resolved,
            vec![
                ("node".to_string(), "agent-3".to_string()),
                ("branch".to_string(), "main-x".to_string()),
                ("missing".to_string(), "$NOPE".to_string()),
            ]
        );
    }
}
