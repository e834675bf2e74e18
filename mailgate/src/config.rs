//! Daemon configuration, read once from the environment at startup.

use anyhow::Context;
use chrono::NaiveDate;
use mailgate_core::WarmupPolicy;

/// Everything the daemon needs, resolved from `MAILGATE_*` variables.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Externally reachable base URL, used in operator-facing log lines.
    pub public_url: String,
    /// Shared secret for `POST /send`.
    pub api_key: String,
    /// Shared secret for `POST /posthook`.
    pub posthook_key: String,
    pub metrics: bool,
    pub http_addr: String,
    /// When set, the sender domain of every submission is rewritten to this.
    pub from_domain_override: String,
    /// One backend per row: `name:credential[:credential...]`, prefixed with
    /// `weight:` when the weighted selection strategy is active.
    pub services: Vec<String>,
    pub select_strategy: String,
    pub retry_strategy: String,
    /// URL normalized posthooks are forwarded to; empty disables forwarding.
    pub posthook_forward: String,
    pub environment: String,
    pub allow_list: Vec<String>,
    /// One key per row: `service:domain:key[:prop=value...]`.
    pub domain_api_keys: Vec<String>,
    /// Pool names the sendgrid configurer may switch sends onto.
    pub sendgrid_ip_pools: Vec<String>,
    pub warmup: Option<WarmupPolicy>,
}

impl Config {
    /// Resolve the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// If a warmup variable is set but unparsable.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            public_url: env_or("MAILGATE_PUBLIC_URL", "http://localhost:8080"),
            api_key: env("MAILGATE_API_KEY"),
            posthook_key: env("MAILGATE_POSTHOOK_KEY"),
            metrics: parse_bool(&env_or("MAILGATE_METRICS", "true")),
            http_addr: env_or("MAILGATE_HTTP_ADDR", "0.0.0.0:8080"),
            from_domain_override: env("MAILGATE_FROM_DOMAIN_OVERRIDE"),
            services: split_rows(&env("MAILGATE_SERVICES")),
            select_strategy: env("MAILGATE_SELECT_STRATEGY"),
            retry_strategy: env("MAILGATE_RETRY_STRATEGY"),
            posthook_forward: env("MAILGATE_POSTHOOK_FORWARD"),
            environment: env_or("MAILGATE_ENVIRONMENT", "development"),
            allow_list: split_list(&env("MAILGATE_ALLOW_LIST")),
            domain_api_keys: split_rows(&env("MAILGATE_DOMAIN_API_KEYS")),
            sendgrid_ip_pools: split_list(&env("MAILGATE_SENDGRID_IP_POOLS")),
            warmup: warmup_from_env()?,
        })
    }

    #[must_use]
    pub fn is_dev(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

fn warmup_from_env() -> anyhow::Result<Option<WarmupPolicy>> {
    let start = env("MAILGATE_WARMUP_START_DATE");
    if start.is_empty() {
        return Ok(None);
    }
    let start_date = NaiveDate::parse_from_str(&start, "%Y-%m-%d")
        .context("MAILGATE_WARMUP_START_DATE must be YYYY-MM-DD")?;
    let base_per_hour = env_or("MAILGATE_WARMUP_BASE_PER_HOUR", "100")
        .parse()
        .context("MAILGATE_WARMUP_BASE_PER_HOUR must be a number")?;
    let growth_factor = env_or("MAILGATE_WARMUP_GROWTH_FACTOR", "1.3")
        .parse()
        .context("MAILGATE_WARMUP_GROWTH_FACTOR must be a number")?;
    let instances = env_or("MAILGATE_INSTANCES", "1")
        .parse()
        .context("MAILGATE_INSTANCES must be a positive integer")?;

    Ok(Some(WarmupPolicy {
        start_date,
        base_per_hour,
        growth_factor,
        instances,
    }))
}

fn env(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}

fn env_or(name: &str, default: &str) -> String {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => default.to_string(),
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// One entry per non-empty line, trimmed.
fn split_rows(value: &str) -> Vec<String> {
    value
        .lines()
        .map(str::trim)
        .filter(|row| !row.is_empty())
        .map(str::to_string)
        .collect()
}

/// One entry per comma, trimmed.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
