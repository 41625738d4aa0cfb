#[cfg(feature = "cli")]
use clap::Parser;
use std::time::Duration;
use url::Url;

/// # Web Author Monitoring Configuration
///
/// Configuration read once at startup from command-line arguments,
/// environment variables and an optional `.env` file.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", command(name = "wamon"))]
#[cfg_attr(feature = "cli", command(about = "Request metrics, metric reporting and log tooling for the Web Author server"))]
#[cfg_attr(feature = "cli", command(version))]
pub struct Config {
    // =============================================================================
    // CORE SERVER CONFIGURATION
    // =============================================================================

    /// Server port to listen on
    #[cfg_attr(feature = "cli", arg(short, long, env = "PORT", default_value = "8080"))]
    pub port: u16,

    /// Server host to bind to
    #[cfg_attr(feature = "cli", arg(long, env = "HOST", default_value = "0.0.0.0"))]
    pub host: String,

    // =============================================================================
    // REQUEST CLASSIFICATION
    // =============================================================================

    /// Deployment context path of the web application (empty for root)
    #[cfg_attr(feature = "cli", arg(long, env = "CONTEXT_PATH", default_value = "/oxygen-xml-web-author"))]
    pub context_path: String,

    /// Root of the REST API below the context path; only requests under it are monitored
    #[cfg_attr(feature = "cli", arg(long, env = "API_ROOT", default_value = "/rest"))]
    pub api_root: String,

    /// Route prefix of editing actions, relative to the context path
    #[cfg_attr(feature = "cli", arg(long, env = "EDIT_ROUTE", default_value = "/rest/v1/edit"))]
    pub edit_route: String,

    /// Route prefix of document loading, relative to the context path
    #[cfg_attr(feature = "cli", arg(long, env = "DOC_LOAD_ROUTE", default_value = "/rest/v1/doc/load"))]
    pub doc_load_route: String,

    // =============================================================================
    // METRIC REPORTING
    // =============================================================================

    /// Push collector address (host:port). Takes precedence over every other backend.
    #[cfg_attr(feature = "cli", arg(long, env = "METRICS_COLLECTOR_ADDRESS"))]
    pub collector_address: Option<String>,

    /// Cloud monitoring access key
    #[cfg_attr(feature = "cli", arg(long, env = "AWS_ACCESS_KEY_ID"))]
    pub aws_access_key_id: Option<String>,

    /// Cloud monitoring secret key
    #[cfg_attr(feature = "cli", arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true))]
    pub aws_secret_access_key: Option<String>,

    /// Cloud monitoring region
    #[cfg_attr(feature = "cli", arg(long, env = "AWS_DEFAULT_REGION", default_value = "us-east-1"))]
    pub aws_region: String,

    /// Override of the cloud monitoring endpoint URL (defaults to the regional endpoint)
    #[cfg_attr(feature = "cli", arg(long, env = "METRICS_CLOUD_ENDPOINT"))]
    pub cloud_endpoint: Option<String>,

    /// HTTPS proxy used for cloud monitoring calls
    #[cfg_attr(feature = "cli", arg(long, env = "HTTPS_PROXY"))]
    pub https_proxy: Option<String>,

    /// Interval between two metric reports, in milliseconds
    #[cfg_attr(feature = "cli", arg(long, env = "METRICS_REPORT_INTERVAL_MS", default_value = "60000"))]
    pub report_interval_ms: u64,

    /// HTTP client timeout in seconds
    #[cfg_attr(feature = "cli", arg(long, env = "HTTP_CLIENT_TIMEOUT", default_value = "30"))]
    pub http_client_timeout: u64,

    // =============================================================================
    // LOGGING
    // =============================================================================

    /// Active application log file; rotated shards live next to it
    #[cfg_attr(feature = "cli", arg(long, env = "LOG_FILE"))]
    pub log_file: Option<String>,

    /// Log level (error, warn, info, debug, trace) or a full filter directive
    #[cfg_attr(feature = "cli", arg(long, env = "RUST_LOG", default_value = "info"))]
    pub log_level: String,

    /// Environment (development, staging, production)
    #[cfg_attr(feature = "cli", arg(long, env = "ENVIRONMENT", default_value = "development"))]
    pub environment: String,
}

impl Config {
    /// Parse configuration from command line arguments and environment variables.
    ///
    /// Loads `.env` if present, parses and validates. Exits the process with a
    /// message when validation fails.
    #[cfg(feature = "cli")]
    pub fn parse_args() -> Self {
        // Load .env file if it exists (ignore errors if file doesn't exist)
        let _ = dotenv::dotenv();

        let config = Self::parse();

        if let Err(err) = config.validate() {
            eprintln!("Configuration validation failed: {}", err);
            std::process::exit(1);
        }

        config
    }

    /// Create a test configuration with minimal required fields.
    /// This is used for testing purposes only.
    pub fn for_test() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            context_path: "/oxygen-xml-web-author".to_string(),
            api_root: "/rest".to_string(),
            edit_route: "/rest/v1/edit".to_string(),
            doc_load_route: "/rest/v1/doc/load".to_string(),
            collector_address: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_region: "us-east-1".to_string(),
            cloud_endpoint: None,
            https_proxy: None,
            report_interval_ms: 60_000,
            http_client_timeout: 30,
            log_file: None,
            log_level: "info".to_string(),
            environment: "development".to_string(),
        }
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    /// Both cloud credentials, when both are present and non-empty.
    pub fn cloud_credentials(&self) -> Option<(&str, &str)> {
        match (self.aws_access_key_id.as_deref(), self.aws_secret_access_key.as_deref()) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => Some((key, secret)),
            _ => None,
        }
    }

    /// Validate configuration values and provide helpful error messages.
    ///
    /// Problems that make the process unusable are returned as errors;
    /// suspicious but workable values are reported on stderr.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("Port cannot be 0. Please specify a valid port number (1-65535).".to_string());
        }

        if self.host.is_empty() {
            return Err("Host cannot be empty. Please specify a valid host (e.g., '0.0.0.0', 'localhost', or an IP address).".to_string());
        }

        if !self.context_path.is_empty() && !self.context_path.starts_with('/') {
            return Err(format!(
                "Context path '{}' must be empty or start with '/'.",
                self.context_path
            ));
        }

        for (name, route) in [
            ("API root", &self.api_root),
            ("Edit route", &self.edit_route),
            ("Document load route", &self.doc_load_route),
        ] {
            if !route.starts_with('/') {
                return Err(format!("{} '{}' must start with '/'.", name, route));
            }
        }

        if !self.edit_route.starts_with(self.api_root.as_str())
            || !self.doc_load_route.starts_with(self.api_root.as_str())
        {
            eprintln!(
                "⚠️  Warning: Routes outside the API root '{}' are never classified.",
                self.api_root
            );
        }

        if self.report_interval_ms == 0 {
            return Err("Metric report interval must be greater than 0 milliseconds.".to_string());
        }

        // Malformed backend settings only disable that backend; reporter
        // selection moves on to the next one.
        if let Some(address) = self.collector_address.as_deref().filter(|a| !a.is_empty()) {
            match address.rsplit_once(':') {
                Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
                _ => eprintln!(
                    "⚠️  Warning: Invalid collector address '{}'. Expected 'host:port'. \
                    The collector reporter stays disabled.",
                    address
                ),
            }
        }

        for (name, value) in [("HTTPS proxy", &self.https_proxy), ("Cloud endpoint", &self.cloud_endpoint)] {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                if let Err(err) = Url::parse(value) {
                    eprintln!(
                        "⚠️  Warning: Invalid {} URL '{}': {}. Cloud metric reporting stays disabled.",
                        name, value, err
                    );
                }
            }
        }

        let has_key = self.aws_access_key_id.as_deref().map_or(false, |k| !k.is_empty());
        let has_secret = self.aws_secret_access_key.as_deref().map_or(false, |s| !s.is_empty());
        if has_key != has_secret {
            eprintln!(
                "⚠️  Warning: Only one of AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY is set. \
                Cloud metric reporting stays disabled."
            );
        }

        if self.http_client_timeout == 0 {
            return Err("HTTP client timeout must be greater than 0 seconds.".to_string());
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        let level_ok = valid_levels.contains(&self.log_level.to_lowercase().as_str())
            || self.log_level.contains('=')
            || self.log_level.contains(',');
        if !level_ok {
            return Err(format!(
                "Invalid log level '{}'. Valid options are: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.environment.as_str()) {
            return Err(format!(
                "Invalid environment '{}'. Valid options are: {}",
                self.environment,
                valid_environments.join(", ")
            ));
        }

        if self.environment == "production" && self.log_file.is_none() {
            eprintln!(
                "⚠️  Warning: No LOG_FILE configured in production. \
                The log download endpoints will answer 404."
            );
        }

        Ok(())
    }
}
