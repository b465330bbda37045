//! Version output and the optional release freshness check.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::cli::VersionArgs;
use crate::terminal::Terminal;

const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");
const REGISTRY_URL: &str = "https://crates.io/api/v1/crates";

#[derive(Debug, Deserialize)]
struct CrateResponse {
    #[serde(rename = "crate")]
    krate: CrateInfo,
}

#[derive(Debug, Deserialize)]
struct CrateInfo {
    max_stable_version: Option<String>,
    max_version: String,
}

pub async fn run(args: &VersionArgs, terminal: &Terminal) -> Result<()> {
    terminal.print_line(&format!("Sigma version: {}", CURRENT_VERSION))?;
    if !args.check_latest {
        return Ok(());
    }

    let timeout = Duration::from_secs(args.timeout_secs);
    match tokio::time::timeout(timeout, latest_release()).await {
        Ok(Ok(latest)) if is_newer(&latest, CURRENT_VERSION) => {
            terminal.print_notice(&format!("A newer release is available: {}", latest))?;
        }
        Ok(Ok(latest)) => debug!(latest = %latest, "running the latest release"),
        Ok(Err(e)) => warn!(error = %e, "release check failed"),
        Err(_) => warn!(timeout_secs = args.timeout_secs, "release check timed out"),
    }
    Ok(())
}

async fn latest_release() -> Result<String> {
    let url = format!("{}/{}", REGISTRY_URL, CRATE_NAME);
    let resp = reqwest::Client::new()
        .get(&url)
        .header(reqwest::header::USER_AGENT, format!("{}/{}", CRATE_NAME, CURRENT_VERSION))
        .send()
        .await
        .context("registry not reachable")?;

    if !resp.status().is_success() {
        bail!("registry returned {}", resp.status());
    }

    let body: CrateResponse = resp.json().await.context("failed to parse registry response")?;
    Ok(body.krate.max_stable_version.unwrap_or(body.krate.max_version))
}

/// Compare dotted numeric versions; anything after `-` or `+` is ignored.
fn is_newer(candidate: &str, current: &str) -> bool {
    fn parts(version: &str) -> Vec<u64> {
        version
            .split(['-', '+'])
            .next()
            .unwrap_or_default()
            .split('.')
            .map(|p| p.parse().unwrap_or(0))
            .collect()
    }
    parts(candidate) > parts(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_versions_compare_numerically() {
        assert!(is_newer("0.10.0", "0.9.3"));
        assert!(is_newer("1.0.0", "0.99.0"));
        assert!(!is_newer("0.9.3", "0.9.3"));
        assert!(!is_newer("0.9.3-beta.1", "0.9.3"));
        assert!(!is_newer("0.8.0", "0.9.0"));
    }

    #[test]
    fn registry_response_prefers_stable() {
        let body: CrateResponse = serde_json::from_str(
            r#"{"crate": {"name": "sigma-cli", "max_stable_version": "1.2.0", "max_version": "1.3.0-rc.1"}}"#,
        )
        .unwrap();
        assert_eq!(body.krate.max_stable_version.as_deref(), Some("1.2.0"));
    }
}
