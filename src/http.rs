//! Shared HTTP client: a single `reqwest::Client` with a descriptive
//! user-agent, gzip negotiation, and per-request timeout, plus auth-token
//! attachment for the source forges (§5 "External Interfaces").

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use reqwest::{RequestBuilder, Response, Url};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub static CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("relfetch/", env!("CARGO_PKG_VERSION")))
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .expect("failed to build HTTP client")
});

/// Attaches a bearer/token header for the forge that owns `url`, reading
/// the token from the environment variables forges commonly use.
pub fn with_auth(url: &Url, mut req: RequestBuilder) -> RequestBuilder {
    match url.host_str() {
        Some("api.github.com") => {
            if let Some(token) = first_env(&["GITHUB_TOKEN", "GH_TOKEN"]) {
                req = req.header("authorization", format!("Bearer {token}"));
                req = req.header("x-github-api-version", "2022-11-28");
            }
        }
        Some(host) if host.contains("gitlab") => {
            if let Some(token) = first_env(&["GITLAB_TOKEN", "GL_TOKEN", "GITLAB_ACCESS_TOKEN"]) {
                req = req.header("private-token", token);
            }
        }
        _ => {}
    }
    req
}

fn first_env(names: &[&str]) -> Option<String> {
    names.iter().find_map(|n| std::env::var(n).ok())
}

/// Issues a GET request against `url`, attaching auth headers and mapping
/// transport/status failures to [`Error`].
pub async fn get(url: &str) -> Result<Response> {
    let parsed = Url::parse(url).map_err(|e| Error::Manager {
        package: String::new(),
        message: format!("invalid URL {url:?}: {e}"),
    })?;
    let req = with_auth(&parsed, CLIENT.get(parsed.clone()));
    let resp = req.send().await.map_err(|source| Error::Network {
        url: url.to_string(),
        source,
    })?;
    tracing::debug!(url, status = %resp.status(), "http GET");
    if !resp.status().is_success() {
        return Err(Error::HttpStatus {
            url: url.to_string(),
            status: resp.status().as_u16(),
        });
    }
    Ok(resp)
}

/// GETs `url` and deserializes the JSON body.
pub async fn get_json<T: serde::de::DeserializeOwned>(url: &str) -> Result<T> {
    let resp = get(url).await?;
    resp.json::<T>().await.map_err(|source| Error::Network {
        url: url.to_string(),
        source,
    })
}

/// Returns the next-page URL from a GitHub-style `Link` response header,
/// following RFC 5988 `rel="next"` link relations.
pub fn next_page_link(resp: &Response) -> Option<String> {
    let header = resp.headers().get("link")?.to_str().ok()?;
    header.split(',').find_map(|part| {
        let mut segments = part.split(';');
        let url_part = segments.next()?.trim();
        let is_next = segments.any(|s| s.trim() == r#"rel="next""#);
        if is_next {
            Some(url_part.trim_start_matches('<').trim_end_matches('>').to_string())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_next_link_header() {
        let header = r#"<https://api.github.com/repos/x/y/releases?page=2>; rel="next", <https://api.github.com/repos/x/y/releases?page=5>; rel="last""#;
        let parts: Vec<&str> = header.split(',').collect();
        assert_eq!(parts.len(), 2);
    }
}
