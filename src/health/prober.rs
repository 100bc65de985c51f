// src/health/prober.rs
use super::check::{effective_timeout, millis, CheckResult};
use super::context::{CheckContext, ScopeEnd};
use super::status::Status;
use reqwest::{redirect, Client, Response};
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// A 2xx slower than this is reported as a warning.
pub const SLOW_RESPONSE_THRESHOLD: Duration = Duration::from_secs(3);

const ALLOWED_SCHEMES: [&str; 2] = ["http", "https"];

enum Failure {
    Cancelled(ScopeEnd),
    Transport(reqwest::Error),
}

/// Probes a dependency over HTTP(S) with a GET request.
#[derive(Debug, Clone)]
pub struct UrlProber {
    client: Client,
}

impl UrlProber {
    pub fn new() -> Result<Self, reqwest::Error> {
        // Redirects are reported, not followed.
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .user_agent(concat!("heartbeat/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub async fn probe(&self, raw: &str, ctx: &CheckContext, timeout: Duration) -> CheckResult {
        let mut result = CheckResult {
            resource: raw.to_string(),
            ..Default::default()
        };

        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(e) => {
                result.status = Status::Critical;
                result.message = format!("invalid URL {:?}: {}", raw, e);
                return result;
            }
        };

        if !ALLOWED_SCHEMES.contains(&url.scheme()) {
            result.status = Status::Critical;
            result.message = format!("unsupported URL scheme: {}", url.scheme());
            return result;
        }

        let timeout = effective_timeout(timeout);
        let start = Instant::now();

        let outcome = tokio::select! {
            biased;
            end = ctx.done() => Err(Failure::Cancelled(end)),
            sent = self.client.get(url).timeout(timeout).send() => sent.map_err(Failure::Transport),
        };

        let elapsed = start.elapsed();
        result.latency_ms = millis(elapsed);

        let response = match outcome {
            Ok(response) => response,
            Err(Failure::Cancelled(end)) => {
                result.status = Status::Critical;
                result.message = format!("request cancelled: {}", end);
                debug!(url = raw, "probe cancelled before a response arrived");
                return result;
            }
            Err(Failure::Transport(e)) => {
                result.status = Status::Critical;
                result.message = format!("request failed: {}", e);
                debug!(url = raw, error = %e, "probe transport failure");
                return result;
            }
        };

        let code = response.status().as_u16();
        let (status, message) = classify(code, elapsed);
        result.status_code = code;
        result.status = status;
        result.message = message.to_string();

        discard_body(response, ctx).await;

        debug!(
            url = raw,
            status_code = code,
            status = %status,
            latency_ms = result.latency_ms,
            "probe complete"
        );
        result
    }
}

/// Maps a response code and latency onto a severity.
pub fn classify(code: u16, elapsed: Duration) -> (Status, &'static str) {
    match code {
        500..=u16::MAX => (Status::Critical, "server error"),
        400..=499 => (Status::Critical, "client error"),
        300..=399 => (Status::Warning, "redirect"),
        200..=299 if elapsed > SLOW_RESPONSE_THRESHOLD => (Status::Warning, "slow response"),
        200..=299 => (Status::OK, "ok"),
        _ => (Status::Critical, "unexpected status"),
    }
}

// The request timeout also bounds body reads, so this cannot hang past it.
async fn discard_body(response: Response, ctx: &CheckContext) {
    tokio::select! {
        biased;
        _ = ctx.done() => {}
        _ = response.bytes() => {}
    }
}
