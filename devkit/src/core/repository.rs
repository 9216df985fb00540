//! Source repository owner/name extraction from manifest URLs.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

static REPO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[:/](?P<user>[\w.-]+)/(?P<repo>[\w.-]+?)\.git$").expect("valid repository regex")
});

/// Owner and repository name of a hosted git repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoSlug {
    pub user: String,
    pub repo: String,
}

/// Extract `user/repo` from a `.git` URL.
///
/// Supports `git@host:user/repo.git` and `https://host/user/repo.git`.
/// URLs not ending in `.git` yield `None`.
pub fn extract_repo(url: &str) -> Option<RepoSlug> {
    let caps = REPO_RE.captures(url.trim())?;
    Some(RepoSlug {
        user: caps["user"].to_string(),
        repo: caps["repo"].to_string(),
    })
}

/// Extract the slug from a manifest `repository` field (string or `{ url }`).
pub fn repo_from_field(field: &Value) -> Option<RepoSlug> {
    match field {
        Value::String(url) => extract_repo(url),
        Value::Object(map) => map.get("url").and_then(Value::as_str).and_then(extract_repo),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn slug(user: &str, repo: &str) -> Option<RepoSlug> {
        Some(RepoSlug {
            user: user.to_string(),
            repo: repo.to_string(),
        })
    }

    #[test]
    fn extracts_ssh_url() {
        assert_eq!(extract_repo("git@github.com:user/repo.git"), slug("user", "repo"));
    }

    #[test]
    fn extracts_https_url() {
        assert_eq!(
            extract_repo("https://github.com/user/repo.git"),
            slug("user", "repo")
        );
    }

    #[test]
    fn extracts_underscored_names() {
        assert_eq!(
            extract_repo("https://github.com/adam_brgmn/fransvilhelm_cli.git"),
            slug("adam_brgmn", "fransvilhelm_cli")
        );
    }

    #[test]
    fn extracts_git_plus_https_url() {
        assert_eq!(
            extract_repo("git+https://github.com/user/my.repo.git"),
            slug("user", "my.repo")
        );
    }

    #[test]
    fn rejects_url_without_git_suffix() {
        assert_eq!(extract_repo("https://github.com/user/repo"), None);
    }

    #[test]
    fn reads_object_repository_field() {
        let field = json!({ "type": "git", "url": "git@github.com:user/repo.git" });
        assert_eq!(repo_from_field(&field), slug("user", "repo"));
        assert_eq!(repo_from_field(&json!(42)), None);
    }
}
