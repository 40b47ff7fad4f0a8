//! Git remote URL helpers.
//!
//! Derives the HTTPS push URL for a GitHub repository from the configured API
//! URL (or an explicit override), injects credentials into HTTPS clone URLs,
//! and redacts those credentials again before anything is logged.

use url::Url;

/// Derive the HTTPS remote URL for a GitHub repository.
///
/// Resolution order for the base:
/// 1. If `git_base_url` is `Some(non-empty)`, use it.
/// 2. Otherwise derive from `api_url`:
///    - `https://api.github.com` → `https://github.com`
///    - `https://<host>/api/v3`  → `https://<host>`
///    - Anything else            → strip trailing slash, use as-is
///
/// The resulting URL is `{base}/{owner}/{name}.git`.
pub fn derive_git_remote_url(
    api_url: &str,
    git_base_url: Option<&str>,
    owner: &str,
    name: &str,
) -> String {
    let base = derive_git_base_url(api_url, git_base_url);
    format!("{}/{}/{}.git", base, owner, name)
}

/// Derive just the Git base URL (without repo path).
///
/// See [`derive_git_remote_url`] for resolution rules.
pub fn derive_git_base_url(api_url: &str, git_base_url: Option<&str>) -> String {
    if let Some(explicit) = git_base_url {
        let trimmed = explicit.trim();
        if !trimmed.is_empty() {
            return trimmed.trim_end_matches('/').to_string();
        }
    }

    let url = api_url.trim().trim_end_matches('/');

    if url.eq_ignore_ascii_case("https://api.github.com") {
        return "https://github.com".to_string();
    }

    if let Some(base) = url.strip_suffix("/api/v3") {
        return base.to_string();
    }

    url.to_string()
}

/// Put `username:password` into an HTTP(S) URL, replacing any userinfo it
/// already carries. When `username` is `None` the URL's existing user is
/// kept. Non-HTTP URLs (ssh, file paths) are returned unchanged.
pub fn with_credentials(raw: &str, username: Option<&str>, password: &str) -> String {
    let mut url = match Url::parse(raw) {
        Ok(u) if u.scheme() == "https" || u.scheme() == "http" => u,
        _ => return raw.to_string(),
    };
    if let Some(user) = username {
        if url.set_username(user).is_err() {
            return raw.to_string();
        }
    }
    if url.set_password(Some(password)).is_err() {
        return raw.to_string();
    }
    url.to_string()
}

/// Replace the password (or a lone token username) in an HTTP(S) URL with
/// `***`. Anything that does not parse as a URL is returned unchanged.
pub fn redact_url(raw: &str) -> String {
    let mut url = match Url::parse(raw) {
        Ok(u) => u,
        Err(_) => return raw.to_string(),
    };
    if url.password().is_some() {
        let _ = url.set_password(Some("***"));
    } else if !url.username().is_empty() && url.scheme().starts_with("http") {
        // Bare-token form: https://<token>@host/...
        let _ = url.set_username("***");
    }
    url.to_string()
}

/// Redact every URL-looking argument in a command line.
pub fn redact_args(args: &[String]) -> String {
    args.iter()
        .map(|a| redact_word(a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Redact credentials in URLs embedded in free text such as git's stderr
/// (`fatal: unable to access 'https://user:pw@host/...'`).
pub fn redact_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word = String::new();
    for c in text.chars() {
        if c.is_whitespace() || c == '\'' || c == '"' {
            out.push_str(&redact_word(&word));
            word.clear();
            out.push(c);
        } else {
            word.push(c);
        }
    }
    out.push_str(&redact_word(&word));
    out
}

fn redact_word(word: &str) -> String {
    if word.contains("://") && word.contains('@') {
        redact_url(word)
    } else {
        word.to_string()
    }
}
