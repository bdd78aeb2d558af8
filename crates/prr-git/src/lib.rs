//! Git repository context detection.
//!
//! Resolves the {host, owner, repo, branch} tuple for the current
//! working directory. Environment overrides (`MCP_PR_OWNER`,
//! `MCP_PR_REPO`, `MCP_PR_BRANCH`) win over detection; otherwise the
//! repository is discovered with libgit2, the `origin` remote (or the
//! first remote) is parsed, and the branch comes from the symbolic
//! `HEAD` reference so unborn branches still resolve.

use std::path::PathBuf;
use std::sync::OnceLock;

use git2::Repository;
use regex::Regex;
use tracing::debug;

use prr_core::{Error, GitContext, GitContextSource, Result};

/// Variable lookup used for overrides, injectable for tests.
type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Detects the repository context of a working directory.
pub struct GitDetector {
    lookup: Lookup,
    start_dir: PathBuf,
}

impl GitDetector {
    /// Detector over the process environment and current directory.
    pub fn new() -> Self {
        Self {
            lookup: Box::new(|name| std::env::var(name).ok()),
            start_dir: PathBuf::from("."),
        }
    }

    pub fn with_lookup(mut self, lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        self.lookup = Box::new(lookup);
        self
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.start_dir = dir.into();
        self
    }

    fn var(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

impl Default for GitDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl GitContextSource for GitDetector {
    fn detect(&self) -> Result<GitContext> {
        let env_owner = self.var("MCP_PR_OWNER");
        let env_repo = self.var("MCP_PR_REPO");
        let env_branch = self.var("MCP_PR_BRANCH");
        let env_host = self.var("GH_HOST");

        // With a full set of overrides, no repository is needed.
        if let (Some(owner), Some(repo), Some(branch)) =
            (env_owner.as_deref(), env_repo.as_deref(), env_branch.as_deref())
        {
            let host = env_host.as_deref().unwrap_or("github.com");
            return GitContext::new(host, owner, repo, branch);
        }

        let repository = Repository::discover(&self.start_dir).map_err(|e| {
            Error::Git(format!(
                "Not inside a git repository (and MCP_PR_OWNER/MCP_PR_REPO/MCP_PR_BRANCH \
                 are not all set): {}",
                e.message()
            ))
        })?;

        let remote_url = remote_url(&repository)?;
        let (host, owner, repo) = parse_remote_url(&remote_url)?;
        debug!(host, owner, repo, "parsed git remote");

        let branch = match env_branch {
            Some(branch) => branch,
            None => current_branch(&repository)?,
        };

        GitContext::new(
            env_host.unwrap_or(host),
            env_owner.unwrap_or(owner),
            env_repo.unwrap_or(repo),
            branch,
        )
    }
}

/// URL of the `origin` remote, falling back to the first remote.
fn remote_url(repository: &Repository) -> Result<String> {
    let remote = match repository.find_remote("origin") {
        Ok(remote) => remote,
        Err(_) => {
            let names = repository
                .remotes()
                .map_err(|e| Error::Git(format!("Failed to list remotes: {}", e.message())))?;
            let first = names
                .iter()
                .flatten()
                .next()
                .ok_or_else(|| Error::Git("Repository has no remotes".to_string()))?
                .to_string();
            repository
                .find_remote(&first)
                .map_err(|e| Error::Git(format!("Failed to read remote: {}", e.message())))?
        }
    };
    remote
        .url()
        .map(str::to_string)
        .ok_or_else(|| Error::Git("Remote URL is not valid UTF-8".to_string()))
}

/// Current branch from the symbolic `HEAD` reference.
///
/// Works on unborn branches (fresh `git init`), where `head()` would
/// fail because the ref has no target yet.
fn current_branch(repository: &Repository) -> Result<String> {
    let head = repository
        .find_reference("HEAD")
        .map_err(|e| Error::Git(format!("Failed to read HEAD: {}", e.message())))?;
    let target = head.symbolic_target().ok_or_else(|| {
        Error::Git("HEAD is detached; set MCP_PR_BRANCH or check out a branch".to_string())
    })?;
    target
        .strip_prefix("refs/heads/")
        .map(str::to_string)
        .ok_or_else(|| Error::Git(format!("Unexpected HEAD target: {target}")))
}

fn scp_like_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^git@([^:/]+):([^/]+)/(.+?)(?:\.git)?/?$").expect("static regex")
    })
}

fn ssh_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^ssh://(?:[^@/]+@)?([^/:]+)(?::\d+)?/([^/]+)/(.+?)(?:\.git)?/?$")
            .expect("static regex")
    })
}

fn http_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https?://(?:[^@/]+@)?([^/]+)/([^/]+)/(.+?)(?:\.git)?/?$")
            .expect("static regex")
    })
}

/// Parse a git remote URL into (host, owner, repo).
///
/// Supports scp-like (`git@host:owner/repo.git`), `ssh://` and
/// `http(s)://` forms. Host is lowercased; a port on an ssh URL is
/// dropped since the API endpoint does not share it.
pub fn parse_remote_url(url: &str) -> Result<(String, String, String)> {
    let url = url.trim();
    for re in [scp_like_regex(), ssh_regex(), http_regex()] {
        if let Some(caps) = re.captures(url) {
            return Ok((
                caps[1].to_lowercase(),
                caps[2].to_string(),
                caps[3].to_string(),
            ));
        }
    }
    Err(Error::Git(format!("Unsupported remote URL format: {url}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + Send + Sync + 'static {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn parses_scp_like_remote() {
        let (host, owner, repo) = parse_remote_url("git@github.com:octo/repo.git").unwrap();
        assert_eq!((host.as_str(), owner.as_str(), repo.as_str()), ("github.com", "octo", "repo"));
    }

    #[test]
    fn parses_ssh_remote_with_port() {
        let (host, owner, repo) =
            parse_remote_url("ssh://git@ghe.example.com:2222/team/proj.git").unwrap();
        assert_eq!(host, "ghe.example.com");
        assert_eq!(owner, "team");
        assert_eq!(repo, "proj");
    }

    #[test]
    fn parses_https_remote_without_git_suffix() {
        let (host, owner, repo) = parse_remote_url("https://GitHub.com/Octo/Repo").unwrap();
        assert_eq!(host, "github.com");
        assert_eq!(owner, "Octo");
        assert_eq!(repo, "Repo");
    }

    #[test]
    fn rejects_unsupported_remote() {
        assert!(parse_remote_url("file:///srv/git/repo.git").is_err());
        assert!(parse_remote_url("github.com/octo/repo").is_err());
    }

    #[test]
    fn env_overrides_bypass_git_entirely() {
        let detector = GitDetector::new()
            .with_dir(std::env::temp_dir())
            .with_lookup(lookup(&[
                ("MCP_PR_OWNER", "octo"),
                ("MCP_PR_REPO", "repo"),
                ("MCP_PR_BRANCH", "feature"),
                ("GH_HOST", "GHE.Example.com"),
            ]));
        let context = detector.detect().unwrap();
        assert_eq!(context.host, "ghe.example.com");
        assert_eq!(context.owner, "octo");
        assert_eq!(context.repo, "repo");
        assert_eq!(context.branch, "feature");
    }

    #[test]
    fn outside_a_repository_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let detector = GitDetector::new()
            .with_dir(dir.path())
            .with_lookup(lookup(&[]));
        let err = detector.detect().unwrap_err();
        assert!(matches!(err, Error::Git(_)));
    }

    mod repository {
        use super::*;
        use git2::{Repository, RepositoryInitOptions};

        fn init_repo(dir: &std::path::Path, remote: Option<&str>) -> Repository {
            let mut opts = RepositoryInitOptions::new();
            opts.initial_head("main");
            let repo = Repository::init_opts(dir, &opts).unwrap();
            if let Some(url) = remote {
                repo.remote("origin", url).unwrap();
            }
            repo
        }

        #[test]
        fn detects_context_from_origin_remote() {
            let dir = tempfile::tempdir().unwrap();
            init_repo(dir.path(), Some("git@github.com:octo/repo.git"));

            let detector = GitDetector::new()
                .with_dir(dir.path())
                .with_lookup(lookup(&[]));
            let context = detector.detect().unwrap();
            assert_eq!(context.host, "github.com");
            assert_eq!(context.owner, "octo");
            assert_eq!(context.repo, "repo");
            // Unborn branch still resolves via the symbolic HEAD.
            assert_eq!(context.branch, "main");
        }

        #[test]
        fn env_branch_overrides_detected_branch() {
            let dir = tempfile::tempdir().unwrap();
            init_repo(dir.path(), Some("https://ghe.example.com/team/proj.git"));

            let detector = GitDetector::new()
                .with_dir(dir.path())
                .with_lookup(lookup(&[("MCP_PR_BRANCH", "release/1.2")]));
            let context = detector.detect().unwrap();
            assert_eq!(context.host, "ghe.example.com");
            assert_eq!(context.branch, "release/1.2");
        }

        #[test]
        fn repository_without_remote_is_an_error() {
            let dir = tempfile::tempdir().unwrap();
            init_repo(dir.path(), None);

            let detector = GitDetector::new()
                .with_dir(dir.path())
                .with_lookup(lookup(&[]));
            let err = detector.detect().unwrap_err();
            assert!(err.to_string().contains("no remotes"));
        }
    }
}
