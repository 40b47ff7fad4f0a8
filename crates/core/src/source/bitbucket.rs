//! Bitbucket Cloud repository catalog client.

use std::collections::HashSet;
use std::fmt;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::errors::ListingError;
use crate::models::RepositoryRecord;
use crate::remote_url::{redact_url, with_credentials};

/// Largest page size the catalog endpoint accepts.
const PAGE_LEN: u32 = 100;

#[derive(Debug, Deserialize)]
struct RepositoryPage {
    #[serde(default)]
    values: Vec<BitbucketRepository>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BitbucketRepository {
    pub name: String,
    #[serde(default)]
    pub links: RepositoryLinks,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepositoryLinks {
    #[serde(default)]
    pub clone: Vec<CloneLink>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloneLink {
    pub name: String,
    pub href: String,
}

impl BitbucketRepository {
    /// The `https` clone link, if the repository advertises one.
    pub fn https_clone_url(&self) -> Option<&str> {
        self.links
            .clone
            .iter()
            .find(|l| l.name == "https")
            .map(|l| l.href.as_str())
    }
}

/// Result of listing a workspace.
///
/// `incomplete` is set when pagination stopped early; `repositories` then
/// holds everything from the pages fetched before the failure.
#[derive(Debug)]
pub struct SourceListing {
    pub repositories: Vec<RepositoryRecord>,
    pub incomplete: Option<ListingError>,
}

impl SourceListing {
    pub fn is_complete(&self) -> bool {
        self.incomplete.is_none()
    }
}

/// Asynchronous client for the Bitbucket Cloud 2.0 repositories API.
#[derive(Clone)]
pub struct BitbucketClient {
    http: reqwest::Client,
    api_url: String,
    username: String,
    password: String,
}

impl fmt::Debug for BitbucketClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitbucketClient")
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl BitbucketClient {
    pub fn new(
        api_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("repomigrate/", env!("CARGO_PKG_VERSION"))),
        );
        let http = reqwest::Client::builder().default_headers(headers).build()?;
        let client = Self {
            http,
            api_url,
            username: username.into(),
            password: password.into(),
        };
        info!(api_url = %client.api_url, username = %client.username, "created BitbucketClient");
        Ok(client)
    }

    /// List every repository of `workspace`, following the `next` cursor
    /// until the catalog is exhausted.
    ///
    /// Never fails outright: a page that cannot be fetched stops pagination
    /// and is reported through [`SourceListing::incomplete`].
    #[instrument(skip(self))]
    pub async fn list_repositories(&self, workspace: &str) -> SourceListing {
        let mut url = format!(
            "{}/repositories/{}?pagelen={}",
            self.api_url, workspace, PAGE_LEN
        );
        let mut repositories = Vec::new();
        let mut seen = HashSet::new();
        let mut page = 1usize;

        loop {
            if !seen.insert(url.clone()) {
                warn!(page, url = %url, "catalog cursor repeated, stopping pagination");
                break;
            }

            let body = match self.fetch_page(&url, page).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(
                        page,
                        fetched = repositories.len(),
                        error = %e,
                        "source listing incomplete, continuing with the pages fetched so far"
                    );
                    return SourceListing {
                        repositories,
                        incomplete: Some(e),
                    };
                }
            };

            debug!(page, count = body.values.len(), "fetched catalog page");
            for repo in body.values {
                match repo.https_clone_url() {
                    Some(href) => {
                        let clone_url =
                            with_credentials(href, Some(&self.username), &self.password);
                        repositories.push(RepositoryRecord::new(repo.name, clone_url));
                    }
                    None => {
                        warn!(repo = %repo.name, "repository has no https clone link, skipping");
                    }
                }
            }

            match body.next {
                Some(next) => {
                    url = next;
                    page += 1;
                }
                None => break,
            }
        }

        info!(count = repositories.len(), pages = page, "listed source repositories");
        SourceListing {
            repositories,
            incomplete: None,
        }
    }

    async fn fetch_page(&self, url: &str, page: usize) -> Result<RepositoryPage, ListingError> {
        debug!(page, url = %redact_url(url), "requesting catalog page");
        let resp = self
            .http
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|source| ListingError::Http { page, source })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ListingError::PageFailed {
                page,
                status: status.as_u16(),
                body,
            });
        }

        let text = resp
            .text()
            .await
            .map_err(|source| ListingError::Http { page, source })?;
        serde_json::from_str(&text).map_err(|e| ListingError::Parse {
            page,
            detail: e.to_string(),
        })
    }
}
