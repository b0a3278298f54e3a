//! Typed, validated configuration tree.
//!
//! Loaded once at startup from a JSON or YAML document (dispatched on file
//! extension), validated, and then treated as immutable: the loaded tree is
//! handed around the process behind an `Arc` and never mutated again.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// The hosting HTTP server. Only `Local` is actually implemented by this
/// crate; the others are accepted for config compatibility with deployments
/// that also run behind uvicorn/gunicorn/etc. and treated identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    Uvicorn,
    Gunicorn,
    Hypercorn,
    Granian,
    Robyn,
    #[default]
    Local,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub r#type: ServerType,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

fn default_workers() -> usize {
    2
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { r#type: ServerType::default(), workers: default_workers(), port: None }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub server: ServerConfig,
    pub endpoints: Vec<Endpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middlewares: Option<MiddlewareConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<MonitoringConfig>,
}

/// Where the `/healthz` and `/metrics` routes live, and whether metrics
/// collection is enabled at all (§6).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
    #[serde(default = "default_health_check_path")]
    pub health_check_path: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            metrics_path: default_metrics_path(),
            health_check_path: default_health_check_path(),
        }
    }
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}
fn default_health_check_path() -> String {
    "/healthz".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MiddlewareConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceMiddleware>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityMiddleware>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PerformanceMiddleware {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_filter: Option<ResourceFilterMiddleware>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionMiddleware>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheMiddleware>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_breaking: Option<CircuitBreakerMiddleware>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResourceFilterMiddleware {
    pub skip_paths: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompressionMiddleware {
    pub types: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_compress_level")]
    pub compress_level: u32,
    #[serde(default = "default_compress_min_size")]
    pub min_size: usize,
}

fn default_compress_level() -> u32 {
    9
}
fn default_compress_min_size() -> usize {
    500
}

/// Circuit breaking is accepted and validated but not wired to the pipeline;
/// see the Open Question resolution in the design notes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CircuitBreakerMiddleware {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CacheMiddleware {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileCacheConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryCacheConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileCacheConfig {
    pub path: String,
    pub ttl: u64,
    pub max_size_mb: u64,
    pub max_entries: usize,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_patterns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_patterns: Option<Vec<String>>,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: String,
}

fn default_cleanup_interval() -> String {
    "1h".to_string()
}

/// Pass-through in this crate, matching the source's behavior; see §4.E of
/// the design notes. Still fully parsed and validated.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemoryCacheConfig {
    pub max_items: usize,
    pub ttl: u64,
    pub include_patterns: Vec<String>,
    pub max_item_size: usize,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_patterns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SecurityMiddleware {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_filter: Option<IpFilterMiddleware>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_filter: Option<BotFilterMiddleware>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IpFilterMiddleware {
    pub blacklist: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Bot {
    pub name: String,
    #[serde(alias = "user-agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotFilterMiddleware {
    #[serde(default)]
    pub blacklist: Vec<Bot>,
    #[serde(default)]
    pub whitelist: Vec<Bot>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TextReplacement {
    pub oldvalue: String,
    pub newvalue: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResponseTransformer {
    pub enabled: bool,
    #[serde(default)]
    pub text_replacements: Vec<TextReplacement>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Transformers {
    pub response: ResponseTransformer,
}

/// Binds an `Auth` provider (§10.Q) to an endpoint. `r#type` selects the
/// provider (`basic` or `jwt`); the rest of the fields are that provider's
/// credentials and are validated against `r#type` at load time.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub r#type: String,
    #[serde(default = "default_authorization_header")]
    pub header_name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(default)]
    pub additional_claims: HashMap<String, String>,
}

fn default_authorization_header() -> String {
    "authorization".to_string()
}

/// Which upstream dispatch mode an endpoint uses. Exactly one variant may be
/// `Some` after validation (`Endpoint::active_upstream_mode` enforces this).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct UpstreamConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyUpstream>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#virtual: Option<VirtualSourceConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub websocket: Option<WebSocketConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graphql: Option<GraphQLConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_mesh: Option<ServiceMeshConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyUpstream {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_upstream_timeout")]
    pub timeout_seconds: u64,
}

fn default_upstream_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VirtualSourceConfig {
    pub sources: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_strategy")]
    pub strategy: String,
}

fn default_strategy() -> String {
    "first-match".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebSocketConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_ping_interval")]
    pub ping_interval_seconds: u64,
    #[serde(default = "default_ws_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
}

fn default_ping_interval() -> u64 {
    30
}
fn default_ws_timeout() -> u64 {
    60
}
fn default_max_frame_size() -> usize {
    1_048_576
}

/// Accepted for forward compatibility; dispatch rejects it with `ENoHandler`
/// until a GraphQL backend exists (see SPEC_FULL.md §1 scope note).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphQLConfig {
    pub schema_path: String,
    pub resolvers: HashMap<String, String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub introspection: bool,
    #[serde(default)]
    pub playground: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceMeshConfig {
    pub service_name: String,
    pub namespace: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_mesh_protocol")]
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

fn default_mesh_protocol() -> String {
    "http".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FunctionConfig {
    pub runtime: String,
    pub handler: String,
    pub code_path: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<HashMap<String, String>>,
    #[serde(default = "default_upstream_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_function_memory")]
    pub memory_mb: u64,
}

fn default_function_memory() -> u64 {
    128
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Endpoint {
    pub prefix: String,
    pub r#match: String,
    pub upstream: UpstreamConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default = "default_weight")]
    pub weight: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backends: Option<BackendList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformers: Option<Transformers>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
    #[serde(default = "default_endpoint_timeout")]
    pub timeout: f64,
}

fn default_weight() -> i64 {
    100
}
fn default_endpoint_timeout() -> f64 {
    30.0
}

/// Mirrors the source's `Backends | list[Backends]`: a single backend union,
/// or a list of them where the first element is used by default.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum BackendList {
    One(Backends),
    Many(Vec<Backends>),
}

impl BackendList {
    pub fn primary(&self) -> Option<&Backends> {
        match self {
            BackendList::One(b) => Some(b),
            BackendList::Many(list) => list.first(),
        }
    }
}

/// The backend tagged union. Exactly one field should be `Some`; the
/// dispatcher treats more than one as "first non-null wins" the same way the
/// source's duck-typed `hasattr` chain effectively did, but config validation
/// flags it so it doesn't happen silently.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Backends {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https: Option<HttpsBackendList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileBackendConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub echo: Option<EchoConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mock: Option<MockConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<RedirectConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandBackend>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<SchedulerConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum HttpsBackendList {
    One(HttpsBackend),
    Many(Vec<HttpsBackend>),
}

impl HttpsBackendList {
    pub fn primary(&self) -> &HttpsBackend {
        match self {
            HttpsBackendList::One(b) => b,
            HttpsBackendList::Many(list) => &list[0],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    pub count: u32,
    pub delay_ms: u64,
    pub status_codes: Vec<u16>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimit {
    pub requests_per_minute: u32,
    pub burst: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpsBackend {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub weight: i64,
    #[serde(default = "default_true")]
    pub ssl: bool,
    #[serde(default = "default_upstream_timeout")]
    pub timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<RetryConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limiting: Option<RateLimit>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_methods")]
    pub methods: Vec<String>,
}

fn default_methods() -> Vec<String> {
    vec!["GET".to_string()]
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileBackendConfig {
    pub path: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EchoConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub response_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MockResponseTemplate {
    #[serde(default = "default_200")]
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    #[serde(default = "default_json_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub delay_ms: u64,
}

fn default_200() -> u16 {
    200
}
fn default_json_content_type() -> String {
    "application/json".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MockConfig {
    pub path_templates: HashMap<String, MockResponseTemplate>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_response: Option<MockResponseTemplate>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedirectConfig {
    pub location: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_redirect_status")]
    pub status_code: u16,
    #[serde(default = "default_true")]
    pub preserve_path: bool,
}

fn default_redirect_status() -> u16 {
    302
}

/// Per-OS command overrides, matching `platform.system()` values in the
/// source: Linux, Windows, Darwin, FreeBSD, OpenBSD, NetBSD, SunOS, AIX,
/// CYGWIN_NT, MSYS_NT, Java (Jython). Falls back to `default` when the
/// current OS has no override (or isn't one of the above).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommandBackend {
    pub default: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windows: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub darwin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freebsd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openbsd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netbsd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunos: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "cygwin_nt")]
    pub cygwin_nt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "msys_nt")]
    pub msys_nt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub java: Option<String>,
    #[serde(default = "default_command_timeout")]
    pub timeout_seconds: u64,
}

fn default_command_timeout() -> u64 {
    30
}

impl CommandBackend {
    /// Resolves the command for the current OS, falling back to `default`.
    pub fn resolve(&self) -> &str {
        let candidate = if cfg!(target_os = "linux") {
            self.linux.as_deref()
        } else if cfg!(target_os = "windows") {
            self.windows.as_deref()
        } else if cfg!(target_os = "macos") {
            self.darwin.as_deref()
        } else if cfg!(target_os = "freebsd") {
            self.freebsd.as_deref()
        } else if cfg!(target_os = "openbsd") {
            self.openbsd.as_deref()
        } else if cfg!(target_os = "netbsd") {
            self.netbsd.as_deref()
        } else {
            None
        };
        candidate.unwrap_or(&self.default)
    }
}

/// Status-only stub, per §4.K of the design notes: the scheduler/cron
/// execution engine is out of scope for this proxy core.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    pub cron_jobs: HashMap<String, CronJob>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CronJob {
    pub schedule: String,
    pub command: String,
    pub description: String,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config file {}: {e}", path.display()))?;
        let mut config: Config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&contents)?,
            _ => serde_yaml::from_str(&contents)?,
        };
        config.endpoints.sort_by(|a, b| b.weight.cmp(&a.weight));
        config.validate()?;
        Ok(config)
    }

    /// Validates the loaded tree. Called once, at startup; never again.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.name.trim().is_empty() {
            anyhow::bail!("config field 'name' must not be empty");
        }
        if self.endpoints.is_empty() {
            anyhow::bail!("config must declare at least one endpoint");
        }

        let identifiers: std::collections::HashSet<&str> = self
            .endpoints
            .iter()
            .filter_map(|e| e.identifier.as_deref())
            .collect();

        for endpoint in &self.endpoints {
            endpoint.validate(&identifiers)?;
        }

        Ok(())
    }
}

impl Endpoint {
    fn validate(&self, known_identifiers: &std::collections::HashSet<&str>) -> Result<(), anyhow::Error> {
        let modes = [
            self.upstream.proxy.is_some(),
            self.upstream.r#virtual.is_some(),
            self.upstream.websocket.is_some(),
            self.upstream.graphql.is_some(),
            self.upstream.service_mesh.is_some(),
            self.upstream.function.is_some(),
        ];
        if modes.iter().filter(|set| **set).count() > 1 {
            anyhow::bail!(
                "endpoint '{}' enables more than one upstream mode",
                self.prefix
            );
        }

        if let Some(ref virt) = self.upstream.r#virtual {
            for source in &virt.sources {
                if !known_identifiers.contains(source.as_str()) {
                    anyhow::bail!(
                        "endpoint '{}' virtual source '{source}' has no matching identifier",
                        self.prefix
                    );
                }
            }
        }

        if let Some(ref auth) = self.auth {
            match auth.r#type.as_str() {
                "basic" => {
                    if auth.username.is_none() || auth.password.is_none() {
                        anyhow::bail!(
                            "endpoint '{}' basic auth requires 'username' and 'password'",
                            self.prefix
                        );
                    }
                }
                "jwt" => {
                    if auth.secret.is_none() {
                        anyhow::bail!("endpoint '{}' jwt auth requires 'secret'", self.prefix);
                    }
                }
                other => {
                    anyhow::bail!("endpoint '{}' has unknown auth type '{other}'", self.prefix);
                }
            }
        }

        if let Some(ref backends) = self.backends {
            if let Some(primary) = backends.primary() {
                if let Some(ref mock) = primary.mock {
                    if mock.path_templates.is_empty() && mock.default_response.is_none() {
                        anyhow::bail!(
                            "endpoint '{}' mock backend has no path_templates and no default_response",
                            self.prefix
                        );
                    }
                }
                if let Some(ref command) = primary.command {
                    if command.default.trim().is_empty() {
                        anyhow::bail!(
                            "endpoint '{}' command backend has a blank default command",
                            self.prefix
                        );
                    }
                }
                if let Some(ref scheduler) = primary.scheduler {
                    for (name, job) in &scheduler.cron_jobs {
                        if !validate_cron_schedule(&job.schedule) {
                            anyhow::bail!(
                                "endpoint '{}' scheduler job '{name}' has an invalid cron schedule '{}'",
                                self.prefix,
                                job.schedule
                            );
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Validates a cron schedule: five space-separated fields, each a `*` or a
/// number in its valid range (`minute hour day month weekday`).
fn validate_cron_schedule(expr: &str) -> bool {
    let fields: Vec<&str> = expr.split(' ').collect();
    if fields.len() != 5 {
        return false;
    }
    let ranges: [(i64, i64); 5] = [(0, 59), (0, 23), (1, 31), (1, 12), (0, 6)];
    fields.iter().zip(ranges.iter()).all(|(field, (lo, hi))| {
        if *field == "*" {
            true
        } else {
            field.parse::<i64>().map(|v| v >= *lo && v <= *hi).unwrap_or(false)
        }
    })
}
