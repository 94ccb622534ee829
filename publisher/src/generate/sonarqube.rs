//! SonarQube analysis summary
//!
//! The scanner prints the dashboard URL into the build log when an analysis
//! succeeds. From that URL we derive the server base and the component key,
//! then query the issue counts per severity and the lines of code.
//!
//! Network and parse failures are logged and yield no points.

use crate::context::{BuildContext, Upstream};
use crate::error::GeneratorError;
use crate::generate::{GeneratorContext, PointGenerator};
use crate::point::Point;
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use regex::Regex;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use std::sync::OnceLock;
use tracing::{debug, warn};
use url::Url;

const MEASUREMENT: &str = "sonarqube_data";

/// Build environment variable holding the analysis token
pub const SONAR_AUTH_TOKEN: &str = "SONAR_AUTH_TOKEN";

const SEVERITIES: [(&str, &str); 5] = [
    ("BLOCKER", "blocker_issues"),
    ("CRITICAL", "critical_issues"),
    ("MAJOR", "major_issues"),
    ("MINOR", "minor_issues"),
    ("INFO", "info_issues"),
];

fn success_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"ANALYSIS SUCCESSFUL, you can (?:browse|find the results at):? (\S+)").unwrap()
    })
}

/// Where the analysis results live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    /// URL printed by the scanner
    pub url: String,
    /// Server root, without trailing slash
    pub base: String,
    pub component: String,
}

impl Dashboard {
    /// Find the last successful analysis in a build log
    pub fn locate(log: &str) -> Option<Self> {
        let found = success_marker()
            .captures_iter(log)
            .filter_map(|caps| caps.get(1))
            .last()?
            .as_str();
        Self::parse(found)
    }

    /// Accepts both `/dashboard?id=<key>` and `/dashboard/index/<key>` forms
    pub fn parse(raw: &str) -> Option<Self> {
        let url = Url::parse(raw).ok()?;
        let path = url.path();
        let (root, rest) = match path.find("/dashboard") {
            Some(at) => (&path[..at], &path[at..]),
            None => return None,
        };

        let component = url
            .query_pairs()
            .find(|(key, _)| key == "id")
            .map(|(_, value)| value.into_owned())
            .or_else(|| {
                rest.rsplit('/')
                    .next()
                    .filter(|s| !s.is_empty() && *s != "dashboard")
                    .map(str::to_string)
            })?;

        let mut base = url.clone();
        base.set_query(None);
        base.set_fragment(None);
        base.set_path(root);
        let base = base.as_str().trim_end_matches('/').to_string();

        Some(Self {
            url: raw.to_string(),
            base,
            component,
        })
    }
}

#[derive(Debug, Deserialize)]
struct IssueSearch {
    total: u64,
}

#[derive(Debug, Deserialize)]
struct ComponentMeasures {
    component: MeasuredComponent,
}

#[derive(Debug, Deserialize)]
struct MeasuredComponent {
    #[serde(default)]
    measures: Vec<Measure>,
}

#[derive(Debug, Deserialize)]
struct Measure {
    metric: String,
    value: String,
}

#[derive(Debug, Default)]
struct Summary {
    issues: Vec<(&'static str, u64)>,
    lines_of_code: Option<u64>,
}

/// Issue counts and size of the analysed component
pub struct SonarQubePointGenerator;

impl SonarQubePointGenerator {
    fn request(
        http: &reqwest::Client,
        url: String,
        query: &[(&str, &str)],
        token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let request = http
            .get(url)
            .query(query)
            .header(ACCEPT, "application/json");
        match token {
            Some(token) => request.header(
                AUTHORIZATION,
                format!("Basic {}", STANDARD.encode(format!("{token}:"))),
            ),
            None => request,
        }
    }

    async fn fetch(
        http: &reqwest::Client,
        dashboard: &Dashboard,
        token: Option<&str>,
    ) -> Result<Summary, GeneratorError> {
        let mut summary = Summary::default();

        let component = dashboard.component.as_str();
        for (severity, field) in SEVERITIES {
            let query = [
                ("ps", "1"),
                ("resolved", "false"),
                ("componentKeys", component),
                ("severities", severity),
            ];
            let url = format!("{}/api/issues/search", dashboard.base);
            let search: IssueSearch = Self::request(http, url, &query, token)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            summary.issues.push((field, search.total));
        }

        let query = [("component", component), ("metricKeys", "ncloc")];
        let url = format!("{}/api/measures/component", dashboard.base);
        let measures: ComponentMeasures = Self::request(http, url, &query, token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        summary.lines_of_code = measures
            .component
            .measures
            .iter()
            .find(|m| m.metric == "ncloc")
            .map(|m| {
                m.value
                    .parse::<u64>()
                    .map_err(|e| GeneratorError::Report(format!("ncloc {:?}: {}", m.value, e)))
            })
            .transpose()?;

        Ok(summary)
    }
}

#[async_trait]
impl PointGenerator for SonarQubePointGenerator {
    fn name(&self) -> &'static str {
        "sonarqube"
    }

    fn upstream(&self) -> Option<Upstream> {
        Some(Upstream::SonarQube)
    }

    fn has_report(&self, build: &dyn BuildContext, _ctx: &GeneratorContext) -> bool {
        Dashboard::locate(build.log()).is_some()
    }

    async fn generate(
        &self,
        build: &dyn BuildContext,
        ctx: &GeneratorContext,
    ) -> Result<Vec<Point>, GeneratorError> {
        let Some(dashboard) = Dashboard::locate(build.log()) else {
            return Ok(Vec::new());
        };
        let token = build
            .environment()
            .get(SONAR_AUTH_TOKEN)
            .map(String::as_str)
            .filter(|t| !t.is_empty());
        debug!(base = %dashboard.base, component = %dashboard.component, "Querying SonarQube");

        let summary = match Self::fetch(&ctx.http, &dashboard, token).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(url = %dashboard.url, error = %e, "SonarQube query failed, skipping");
                return Ok(Vec::new());
            }
        };

        let mut point = ctx.point(MEASUREMENT, build);
        point.add_field("sonarqube_url", dashboard.url.as_str());
        for (field, count) in summary.issues {
            point.add_field(field, count);
        }
        if let Some(lines) = summary.lines_of_code {
            point.add_field("lines_of_code", lines);
        }
        Ok(vec![point.build()?])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::context::BuildRecord;
    use crate::generate::testing::context;
    use crate::options::PublishOptions;
    use crate::point::FieldValue;
    use axum::{
        Json, Router,
        extract::{Query, State},
        http::{HeaderMap, StatusCode},
        routing::get,
    };
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MockSonar {
        auth_headers: Mutex<Vec<String>>,
    }

    async fn issues(
        State(state): State<Arc<MockSonar>>,
        headers: HeaderMap,
        Query(params): Query<HashMap<String, String>>,
    ) -> (StatusCode, Json<Value>) {
        if let Some(auth) = headers.get("authorization") {
            state
                .auth_headers
                .lock()
                .await
                .push(auth.to_str().unwrap().to_string());
        }
        if params.get("componentKeys").map(String::as_str) != Some("my-app") {
            return (StatusCode::NOT_FOUND, Json(json!({})));
        }
        let total = match params.get("severities").map(String::as_str) {
            Some("BLOCKER") => 1,
            Some("MAJOR") => 7,
            _ => 0,
        };
        (StatusCode::OK, Json(json!({ "total": total, "issues": [] })))
    }

    async fn measures() -> Json<Value> {
        Json(json!({
            "component": {
                "key": "my-app",
                "measures": [{ "metric": "ncloc", "value": "12345" }]
            }
        }))
    }

    async fn start_mock_sonar() -> (SocketAddr, Arc<MockSonar>) {
        let state = Arc::new(MockSonar::default());
        let app = Router::new()
            .route("/sonar/api/issues/search", get(issues))
            .route("/sonar/api/measures/component", get(measures))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        (addr, state)
    }

    #[test]
    fn test_dashboard_url_forms() {
        let d = Dashboard::parse("https://sonar.example.com/dashboard?id=my-app").unwrap();
        assert_eq!(d.base, "https://sonar.example.com");
        assert_eq!(d.component, "my-app");

        let d = Dashboard::parse("http://ci:9000/sonar/dashboard/index/lib-core").unwrap();
        assert_eq!(d.base, "http://ci:9000/sonar");
        assert_eq!(d.component, "lib-core");

        assert!(Dashboard::parse("https://sonar.example.com/projects").is_none());
        assert!(Dashboard::parse("not a url").is_none());
    }

    #[test]
    fn test_locate_in_log() {
        let log = "[INFO] Analysis report uploaded\n\
                   [INFO] ANALYSIS SUCCESSFUL, you can find the results at: nothing\n\
                   [INFO] ANALYSIS SUCCESSFUL, you can browse http://sonar:9000/dashboard?id=app\n\
                   [INFO] done";
        let d = Dashboard::locate(log).unwrap();
        assert_eq!(d.component, "app");
        assert!(Dashboard::locate("BUILD SUCCESS").is_none());
    }

    #[tokio::test]
    async fn test_no_marker_no_report() {
        let build = BuildRecord::new("app", 1);
        let ctx = context(&build, PublishOptions::default());
        assert!(!SonarQubePointGenerator.has_report(&build, &ctx));
    }

    #[tokio::test]
    async fn test_queries_issue_counts_and_size() {
        let (addr, state) = start_mock_sonar().await;
        let mut build = BuildRecord::new("app", 1);
        build.log = format!(
            "ANALYSIS SUCCESSFUL, you can browse http://{addr}/sonar/dashboard?id=my-app\n"
        );
        build.environment.insert(SONAR_AUTH_TOKEN.into(), "squ_abc".into());
        let ctx = context(&build, PublishOptions::default());

        assert!(SonarQubePointGenerator.has_report(&build, &ctx));
        let points = SonarQubePointGenerator.generate(&build, &ctx).await.unwrap();
        assert_eq!(points.len(), 1);
        let p = &points[0];
        assert_eq!(p.measurement(), MEASUREMENT);
        assert_eq!(p.field("blocker_issues"), Some(&FieldValue::Integer(1)));
        assert_eq!(p.field("major_issues"), Some(&FieldValue::Integer(7)));
        assert_eq!(p.field("info_issues"), Some(&FieldValue::Integer(0)));
        assert_eq!(p.field("lines_of_code"), Some(&FieldValue::Integer(12345)));

        let expected = format!("Basic {}", STANDARD.encode("squ_abc:"));
        let headers = state.auth_headers.lock().await;
        assert_eq!(headers.len(), 5);
        assert!(headers.iter().all(|h| *h == expected));
    }

    #[tokio::test]
    async fn test_unreachable_server_yields_nothing() {
        let mut build = BuildRecord::new("app", 1);
        build.log = "ANALYSIS SUCCESSFUL, you can browse http://127.0.0.1:1/dashboard?id=x".into();
        let ctx = context(&build, PublishOptions::default());

        let points = SonarQubePointGenerator.generate(&build, &ctx).await.unwrap();
        assert!(points.is_empty());
    }
}
