//! InfluxDB client for one Target
//!
//! [`ClientWrapper`] negotiates a connection before anything is written. A
//! Target with an organization speaks the v2 API: token authentication is
//! tried first, then a username/password sign-in. A Target without one
//! speaks v1, with basic auth when credentials are configured. Every
//! strategy is verified by pinging the server and checking that it reports
//! the expected major version.
//!
//! ```text
//! Unconnected ─► ProbingV2 ─┬─► Connected(V2, Token | Session)
//!             │             └─► Failed
//!             └► ProbingV1 ─┬─► Connected(V1, Basic | Anonymous)
//!                           └─► Failed
//! ```

use crate::error::ClientError;
use crate::line_protocol::{LineProtocol, render_batch};
use crate::point::{Point, Precision};
use crate::target::Target;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default connection timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

const VERSION_HEADER: &str = "X-Influxdb-Version";

/// Process-wide HTTP clients
///
/// Built once and cloned everywhere so connections are pooled across
/// Targets and builds. Targets that opt out of the proxy get the direct
/// client.
#[derive(Debug, Clone)]
pub struct HttpClient {
    proxied: reqwest::Client,
    direct: reqwest::Client,
}

impl HttpClient {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Result<Self, ClientError> {
        let proxied = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;
        let direct = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .no_proxy()
            .build()?;
        Ok(Self { proxied, direct })
    }

    /// Client with the default timeouts
    pub fn with_defaults() -> Result<Self, ClientError> {
        Self::new(
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }

    /// Client honouring the environment proxy settings
    pub fn shared(&self) -> reqwest::Client {
        self.proxied.clone()
    }

    pub fn for_target(&self, target: &Target) -> reqwest::Client {
        if target.use_proxy {
            self.proxied.clone()
        } else {
            self.direct.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V1,
    V2,
}

impl ApiVersion {
    fn major(&self) -> &'static str {
        match self {
            ApiVersion::V1 => "1",
            ApiVersion::V2 => "2",
        }
    }
}

/// How a connection was authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// v2 API token
    Token,
    /// v2 username/password sign-in, session cookie
    Session,
    /// v1 username/password
    Basic,
    /// v1 without credentials
    Anonymous,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Token => "v2 token",
            AuthMethod::Session => "v2 username/password",
            AuthMethod::Basic => "v1 username/password",
            AuthMethod::Anonymous => "v1 anonymous",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    ProbingV2,
    ProbingV1,
    Connected { version: ApiVersion, auth: AuthMethod },
    Failed,
}

/// Credentials attached to every request of a verified connection
enum Session {
    Token(String),
    /// v2 credentials, exchanged for a cookie before use
    SignIn { username: String, password: String },
    Cookie(String),
    Basic { username: String, password: String },
    Anonymous,
}

impl Session {
    fn method(&self) -> AuthMethod {
        match self {
            Session::Token(_) => AuthMethod::Token,
            Session::SignIn { .. } | Session::Cookie(_) => AuthMethod::Session,
            Session::Basic { .. } => AuthMethod::Basic,
            Session::Anonymous => AuthMethod::Anonymous,
        }
    }

    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Session::Token(token) => request.header(AUTHORIZATION, format!("Token {token}")),
            Session::Cookie(cookie) => request.header(COOKIE, cookie.as_str()),
            Session::SignIn { username, password } | Session::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            Session::Anonymous => request,
        }
    }
}

/// Connection to the database behind one Target
pub struct ClientWrapper {
    target: Target,
    base: Url,
    http: reqwest::Client,
    state: ConnectionState,
    session: Option<Session>,
}

impl ClientWrapper {
    /// Fails with `InvalidUrl` when the Target URL does not parse
    pub fn new(target: Target, http: reqwest::Client) -> Result<Self, ClientError> {
        let base = target.parsed_url()?;
        Ok(Self {
            target,
            base,
            http,
            state: ConnectionState::Unconnected,
            session: None,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base.as_str().trim_end_matches('/'), path)
    }

    /// Negotiate and verify a connection. A no-op when already connected.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        if matches!(self.state, ConnectionState::Connected { .. }) {
            return Ok(());
        }

        let mut attempts = Vec::new();
        let version = if self.target.is_v2() {
            ApiVersion::V2
        } else {
            ApiVersion::V1
        };
        self.state = match version {
            ApiVersion::V2 => ConnectionState::ProbingV2,
            ApiVersion::V1 => ConnectionState::ProbingV1,
        };

        for strategy in self.strategies(version) {
            let method = strategy.method();
            debug!(destination = %self.target.description, strategy = method.as_str(), "Trying connection strategy");
            match self.verify(version, strategy).await {
                Ok(session) => {
                    info!(
                        destination = %self.target.description,
                        auth = method.as_str(),
                        "Connected"
                    );
                    self.session = Some(session);
                    self.state = ConnectionState::Connected {
                        version,
                        auth: method,
                    };
                    return Ok(());
                }
                Err(reason) => {
                    debug!(destination = %self.target.description, strategy = method.as_str(), reason = %reason, "Strategy failed");
                    attempts.push(format!("{}: {}", method.as_str(), reason));
                }
            }
        }

        if attempts.is_empty() {
            attempts.push(format!(
                "{}: no token or username configured",
                AuthMethod::Token.as_str()
            ));
        }
        self.state = ConnectionState::Failed;
        warn!(destination = %self.target.description, attempts = ?attempts, "Connection failed");
        Err(ClientError::ConnectionFailed { attempts })
    }

    fn strategies(&self, version: ApiVersion) -> Vec<Session> {
        let username = self
            .target
            .username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty());
        let password = self
            .target
            .password
            .as_ref()
            .map(|p| p.expose().to_string())
            .unwrap_or_default();

        let mut strategies = Vec::new();
        match version {
            ApiVersion::V2 => {
                if let Some(token) = self.target.token.as_ref().filter(|t| !t.is_empty()) {
                    strategies.push(Session::Token(token.expose().to_string()));
                }
                if let Some(username) = username {
                    strategies.push(Session::SignIn {
                        username: username.to_string(),
                        password,
                    });
                }
            }
            ApiVersion::V1 => match username {
                Some(username) => strategies.push(Session::Basic {
                    username: username.to_string(),
                    password,
                }),
                None => strategies.push(Session::Anonymous),
            },
        }
        strategies
    }

    /// Authenticate one strategy and check the server version.
    ///
    /// For v2, basic credentials are exchanged for a session cookie first.
    async fn verify(&self, version: ApiVersion, strategy: Session) -> Result<Session, String> {
        let session = match strategy {
            Session::SignIn { username, password } => self.sign_in(&username, &password).await?,
            strategy => strategy,
        };

        self.ping(version).await?;

        if version == ApiVersion::V2 {
            let org = self.target.organization().unwrap_or_default();
            let response = session
                .apply(self.http.get(self.endpoint("api/v2/orgs")))
                .query(&[("org", org)])
                .send()
                .await
                .map_err(|e| e.to_string())?;
            if !response.status().is_success() {
                return Err(format!("organization lookup returned {}", response.status()));
            }
        }
        Ok(session)
    }

    async fn sign_in(&self, username: &str, password: &str) -> Result<Session, String> {
        let response = self
            .http
            .post(self.endpoint("api/v2/signin"))
            .basic_auth(username, Some(password))
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("sign-in returned {}", response.status()));
        }
        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
            .ok_or_else(|| "sign-in returned no session cookie".to_string())?;
        Ok(Session::Cookie(cookie))
    }

    async fn ping(&self, version: ApiVersion) -> Result<(), String> {
        let response = self
            .http
            .get(self.endpoint("ping"))
            .send()
            .await
            .map_err(|e| format!("ping failed: {e}"))?;
        if !response.status().is_success() {
            return Err(format!("ping returned {}", response.status()));
        }
        let reported = response
            .headers()
            .get(VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if reported.trim_start_matches('v').starts_with(version.major()) {
            Ok(())
        } else {
            Err(format!(
                "server reports version '{reported}', expected {}.x",
                version.major()
            ))
        }
    }

    /// Write one batch. Legacy protocol for v1, current for v2.
    pub async fn write_points(&self, points: &[Point]) -> Result<(), ClientError> {
        let (ConnectionState::Connected { version, .. }, Some(session)) =
            (self.state, self.session.as_ref())
        else {
            return Err(ClientError::NotInitialized);
        };
        if points.is_empty() {
            return Ok(());
        }

        match version {
            ApiVersion::V2 => {
                let body = render_batch(points, LineProtocol::Current)?;
                let query = [
                    ("org", self.target.organization().unwrap_or_default()),
                    ("bucket", self.target.database.as_str()),
                    ("precision", Precision::Nanoseconds.as_str()),
                ];
                let request = self.http.post(self.endpoint("api/v2/write")).query(&query);
                self.send(session.apply(request), body).await?;
            }
            ApiVersion::V1 => {
                for chunk in points.chunk_by(|a, b| a.precision() == b.precision()) {
                    let precision = chunk[0].precision();
                    let body = render_batch(chunk, LineProtocol::Legacy)?;
                    let mut query = vec![
                        ("db", self.target.database.as_str()),
                        ("precision", precision.as_str()),
                    ];
                    if let Some(rp) = self.target.retention_policy.as_deref().filter(|s| !s.trim().is_empty()) {
                        query.push(("rp", rp));
                    }
                    if let Some(consistency) = self.target.consistency {
                        query.push(("consistency", consistency.as_str()));
                    }
                    let request = self.http.post(self.endpoint("write")).query(&query);
                    self.send(session.apply(request), body).await?;
                }
            }
        }

        debug!(destination = %self.target.description, points = points.len(), "Batch written");
        Ok(())
    }

    async fn send(&self, request: reqwest::RequestBuilder, body: String) -> Result<(), ClientError> {
        let response = request
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Write {
            status: status.as_u16(),
            body,
        })
    }

    /// Release the connection. Safe to call in any state, any number of times.
    pub async fn close(&mut self) {
        if let Some(Session::Cookie(cookie)) = self.session.take() {
            let result = self
                .http
                .post(self.endpoint("api/v2/signout"))
                .header(COOKIE, cookie)
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => debug!(status = %response.status(), "Sign-out rejected"),
                Err(e) => debug!(error = %e, "Sign-out failed"),
            }
        }
        if matches!(self.state, ConnectionState::Connected { .. }) {
            self.state = ConnectionState::Unconnected;
        }
    }
}
