//! GitHub repository health check (spec §4.2 "GitHub").

use crate::registry::{Probe, ProbeOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use guardant_proto::ServiceTypeConfig;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};

pub struct GithubProbe {
    client: Client,
}

impl Default for GithubProbe {
    fn default() -> Self {
        Self {
            client: Client::builder()
                .user_agent("guardant-probe")
                .build()
                .expect("reqwest client"),
        }
    }
}

/// Extract `owner/repo` from a GitHub URL of the form
/// `https://github.com/<owner>/<repo>`.
fn extract_owner_repo(target: &str) -> Option<(String, String)> {
    let without_scheme = target.trim_start_matches("https://").trim_start_matches("http://");
    let without_host = without_scheme.strip_prefix("github.com/")?;
    let mut parts = without_host.trim_end_matches('/').splitn(2, '/');
    let owner = parts.next()?.to_string();
    let repo = parts.next()?.split('/').next()?.to_string();
    if owner.is_empty() || repo.is_empty() {
        None
    } else {
        Some((owner, repo))
    }
}

#[derive(Deserialize)]
struct RepoResponse {
    updated_at: DateTime<Utc>,
    open_issues_count: u32,
}

#[async_trait]
impl Probe for GithubProbe {
    async fn check(&self, target: &str, _config: &ServiceTypeConfig, deadline: Duration) -> ProbeOutcome {
        let start = Instant::now();
        let Some((owner, repo)) = extract_owner_repo(target) else {
            return ProbeOutcome::down(format!("Could not parse owner/repo from '{target}'"));
        };

        let web_url = format!("https://github.com/{owner}/{repo}");
        let web_check = crate::http_probe::check_web(&self.client, &web_url, deadline).await;
        if web_check.status != guardant_proto::ProbeStatus::Up {
            return ProbeOutcome::down(format!("Repository page unreachable: {}", web_check.message));
        }

        let api_url = format!("https://api.github.com/repos/{owner}/{repo}");
        let remaining = deadline.saturating_sub(start.elapsed());
        let resp = match tokio::time::timeout(remaining, self.client.get(&api_url).send()).await {
            Err(_) => return crate::timeout_outcome(),
            Ok(Err(e)) => return ProbeOutcome::down(format!("GitHub API request failed: {e}")),
            Ok(Ok(r)) => r,
        };

        match resp.status() {
            StatusCode::NOT_FOUND => return ProbeOutcome::down(format!("Repository {owner}/{repo} not found")),
            StatusCode::FORBIDDEN => {
                return ProbeOutcome::up("GitHub API rate limited", Some(crate::elapsed_ms(start)))
            }
            s if !s.is_success() => {
                return ProbeOutcome::down(format!("GitHub API returned {s}"))
            }
            _ => {}
        }

        let repo_info: RepoResponse = match resp.json().await {
            Ok(r) => r,
            Err(e) => return ProbeOutcome::down(format!("Failed to parse repo response: {e}")),
        };

        let age_days = (Utc::now() - repo_info.updated_at).num_days();
        let mut score: i32 = 100;
        if age_days > 365 {
            score -= 30;
        } else if age_days > 180 {
            score -= 15;
        } else if age_days > 30 {
            score -= 5;
        }
        if repo_info.open_issues_count > 100 {
            score -= 10;
        } else if repo_info.open_issues_count > 50 {
            score -= 5;
        }
        let score = score.clamp(0, 100);

        ProbeOutcome::up(
            format!("Repository health score {score}/100 (updated {age_days}d ago, {} open issues)", repo_info.open_issues_count),
            Some(crate::elapsed_ms(start)),
        )
        .with_metadata(json!({
            "health_score": score,
            "open_issues": repo_info.open_issues_count,
            "updated_at": repo_info.updated_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_owner_repo() {
        assert_eq!(
            extract_owner_repo("https://github.com/guardant/guardant"),
            Some(("guardant".to_string(), "guardant".to_string()))
        );
        assert_eq!(extract_owner_repo("https://example.com/nope"), None);
    }
}
