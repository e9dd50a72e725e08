//! Maintainer account validation against the repository's hosting service

use std::sync::LazyLock;

use async_trait::async_trait;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use regex::Regex;
use tracing::debug;

use ct_common::{Error, Result};

/// Host part of `https://host/...`, `ssh://git@host/...` or `git@host:...`
static DOMAIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-z][a-z0-9+.-]*://)?(?:[^@/]+@)?([^/:]+)")
        .unwrap_or_else(|e| panic!("invalid domain pattern: {e}"))
});

/// Checks that a maintainer name is an account on the repository's host.
#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait AccountValidator: Send + Sync {
    /// Validate `account` on the host serving `repo_url`.
    async fn validate(&self, repo_url: &str, account: &str) -> Result<()>;
}

/// Validator issuing HTTP requests to the hosting service.
pub struct HttpAccountValidator {
    client: reqwest::Client,
}

impl HttpAccountValidator {
    /// Create a validator with a default HTTP client.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpAccountValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Host name of a git remote URL.
pub fn parse_domain(repo_url: &str) -> Result<String> {
    DOMAIN_PATTERN
        .captures(repo_url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
        .filter(|domain| !domain.is_empty())
        .ok_or_else(|| Error::maintainers(format!("could not parse domain from '{}'", repo_url)))
}

/// Profile URL of `account` on `domain`, if the domain is supported.
pub fn account_url(domain: &str, account: &str) -> Option<String> {
    match domain {
        "github.com" => Some(format!("https://api.github.com/users/{}", account)),
        "gitlab.com" => Some(format!("https://gitlab.com/{}", account)),
        "bitbucket.org" => Some(format!("https://bitbucket.org/{}", account)),
        _ => None,
    }
}

#[async_trait]
impl AccountValidator for HttpAccountValidator {
    async fn validate(&self, repo_url: &str, account: &str) -> Result<()> {
        let domain = parse_domain(repo_url)?;
        let invalid = |message: String| Error::AccountInvalid {
            domain: domain.clone(),
            account: account.to_string(),
            message,
        };

        let url = account_url(&domain, account)
            .ok_or_else(|| invalid(format!("unsupported repository domain '{}'", domain)))?;

        debug!(%account, %url, "Validating maintainer account");
        let response = self
            .client
            .head(&url)
            .header(reqwest::header::USER_AGENT, "chart-testing")
            .send()
            .await
            .map_err(|e| invalid(e.to_string()))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(invalid(format!("{} returned {}", url, response.status())));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_https_and_ssh_remotes() {
        assert_eq!(
            parse_domain("https://github.com/helm/charts.git").unwrap(),
            "github.com"
        );
        assert_eq!(
            parse_domain("git@gitlab.com:group/charts.git").unwrap(),
            "gitlab.com"
        );
        assert_eq!(
            parse_domain("ssh://git@bitbucket.org/team/charts.git").unwrap(),
            "bitbucket.org"
        );
        assert_eq!(
            parse_domain("https://user@GitHub.com/helm/charts").unwrap(),
            "github.com"
        );
    }

    #[test]
    fn empty_url_has_no_domain() {
        assert!(parse_domain("").is_err());
    }

    #[test]
    fn account_urls_per_domain() {
        assert_eq!(
            account_url("github.com", "alice").as_deref(),
            Some("https://api.github.com/users/alice")
        );
        assert_eq!(
            account_url("gitlab.com", "bob").as_deref(),
            Some("https://gitlab.com/bob")
        );
        assert_eq!(
            account_url("bitbucket.org", "carol").as_deref(),
            Some("https://bitbucket.org/carol")
        );
        assert_eq!(account_url("example.com", "dave"), None);
    }

    #[tokio::test]
    async fn unsupported_domain_is_rejected_without_request() {
        let validator = HttpAccountValidator::new();
        let err = validator
            .validate("https://git.example.com/charts.git", "alice")
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::AccountInvalid { ref domain, ref account, .. }
                if domain == "git.example.com" && account == "alice")
        );
    }
}
