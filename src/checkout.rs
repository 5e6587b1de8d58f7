//! Clone a repository and move it to a branch, tag or pull request head.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{Cred, FetchOptions, RemoteCallbacks, Repository};
use indicatif::{ProgressBar, ProgressStyle};

use crate::scm::Provider;

#[derive(Debug, Clone)]
pub struct CheckoutOptions {
    pub url: Option<String>,
    pub remote: String,
    pub branch: String,
    pub tag: Option<String>,
    pub pr: i64,
    pub target: PathBuf,
    pub version_output: Option<PathBuf>,
    pub show_progress: bool,
}

impl Default for CheckoutOptions {
    fn default() -> Self {
        Self {
            url: None,
            remote: "origin".to_string(),
            branch: "master".to_string(),
            tag: None,
            pr: -1,
            target: PathBuf::from("."),
            version_output: None,
            show_progress: true,
        }
    }
}

/// Hosting flavour implied by a remote URL: anything that is not github.com is treated as GitLab.
pub fn detect_git_kind(url: &str) -> Provider {
    if url.contains("github.com") {
        Provider::GitHub
    } else {
        Provider::GitLab
    }
}

/// Server-side ref holding the head of pull request `pr`.
pub fn pr_ref(pr: i64, kind: Provider) -> String {
    match kind {
        Provider::GitHub => format!("refs/pull/{}/head", pr),
        Provider::GitLab => format!("refs/merge-requests/{}/head", pr),
    }
}

fn is_ssh(url: &str) -> bool {
    url.starts_with("git@") || url.starts_with("ssh://")
}

/// Run a checkout and return the short name of HEAD afterwards.
pub fn checkout(opts: &CheckoutOptions) -> Result<String> {
    let git_dir = opts.target.join(".git");
    let repo = if git_dir.exists() {
        tracing::debug!(target_dir = %opts.target.display(), "repository exists, skipping clone");
        Repository::open(&opts.target)
            .with_context(|| format!("Failed to open repository at {}", opts.target.display()))?
    } else {
        let url = opts
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                anyhow!("no git repository at {} and no URL given", opts.target.display())
            })?;
        clone(url, opts)?
    };

    let url = first_remote_url(&repo)?;

    if let Some(tag) = opts.tag.as_deref().filter(|t| !t.is_empty()) {
        checkout_tag(&repo, tag)?;
    }

    if opts.pr > 0 {
        let kind = detect_git_kind(&url);
        fetch_pull_request(&repo, &url, opts, kind)?;
    }

    let head = head_name(&repo)?;
    if let Some(path) = &opts.version_output {
        write_version(path, &head)?;
    }
    Ok(head)
}

fn clone(url: &str, opts: &CheckoutOptions) -> Result<Repository> {
    tracing::info!(url, target_dir = %opts.target.display(), branch = %opts.branch, "cloning");
    let progress = progress_bar(opts.show_progress);
    let remote_name = opts.remote.clone();

    let mut builder = RepoBuilder::new();
    builder.branch(&opts.branch);
    builder.remote_create(move |repo, _name, url| repo.remote(&remote_name, url));
    builder.fetch_options(fetch_options(url, Some(&progress))?);

    let repo = builder
        .clone(url, &opts.target)
        .with_context(|| format!("Failed to clone {} into {}", url, opts.target.display()))?;
    progress.finish_and_clear();
    Ok(repo)
}

fn progress_bar(visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} objects")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░"),
    );
    bar.set_prefix("Clone");
    bar
}

fn fetch_options<'a>(url: &str, progress: Option<&'a ProgressBar>) -> Result<FetchOptions<'a>> {
    let mut callbacks = RemoteCallbacks::new();
    if is_ssh(url) {
        let key = dirs::home_dir()
            .map(|home| home.join(".ssh").join("id_rsa"))
            .ok_or_else(|| anyhow!("cannot locate home directory for SSH key"))?;
        tracing::debug!(key = %key.display(), "using SSH key authentication");
        callbacks.credentials(move |_url, username, _allowed| {
            Cred::ssh_key(username.unwrap_or("git"), None, &key, None)
        });
    }
    if let Some(bar) = progress {
        callbacks.transfer_progress(move |stats| {
            bar.set_length(stats.total_objects() as u64);
            bar.set_position(stats.received_objects() as u64);
            true
        });
    }
    let mut fetch = FetchOptions::new();
    fetch.remote_callbacks(callbacks);
    Ok(fetch)
}

fn first_remote_url(repo: &Repository) -> Result<String> {
    let remotes = repo.remotes().context("Failed to list remotes")?;
    let name = remotes
        .iter()
        .flatten()
        .next()
        .ok_or_else(|| anyhow!("repository has no remotes"))?;
    let remote = repo.find_remote(name)?;
    remote
        .url()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("remote '{}' has no valid URL", name))
}

fn checkout_tag(repo: &Repository, tag: &str) -> Result<()> {
    let reference = format!("refs/tags/{}", tag);
    let commit = repo
        .revparse_single(&reference)
        .and_then(|obj| obj.peel_to_commit())
        .with_context(|| format!("Failed to resolve tag '{}'", tag))?;
    repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().safe()))
        .with_context(|| format!("Failed to check out tag '{}'", tag))?;
    repo.set_head_detached(commit.id())?;
    tracing::info!(tag, "checked out tag");
    Ok(())
}

fn fetch_pull_request(
    repo: &Repository,
    url: &str,
    opts: &CheckoutOptions,
    kind: Provider,
) -> Result<()> {
    let branch = format!("pr-{}", opts.pr);
    let tracking_ref = format!("refs/remotes/{}/pr/{}", opts.remote, opts.pr);
    let refspec = format!("+{}:{}", pr_ref(opts.pr, kind), tracking_ref);

    let mut remote = repo
        .find_remote(&opts.remote)
        .with_context(|| format!("remote '{}' not found", opts.remote))?;
    tracing::info!(refspec = %refspec, remote = %opts.remote, "fetching pull request");
    remote
        .fetch(&[refspec.as_str()], Some(&mut fetch_options(url, None)?), None)
        .with_context(|| format!("Failed to fetch pull request {}", opts.pr))?;

    let commit = repo
        .find_reference(&tracking_ref)
        .and_then(|r| r.peel_to_commit())
        .with_context(|| format!("Failed to resolve {}", tracking_ref))?;

    // Detach first: `pr-N` may be the branch HEAD points at.
    if let Ok(current) = repo.head().and_then(|h| h.peel_to_commit()) {
        repo.set_head_detached(current.id())?;
    }
    repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().safe()))
        .with_context(|| format!("Failed to check out {}", branch))?;
    let local = repo
        .branch(&branch, &commit, true)
        .with_context(|| format!("Failed to update branch {}", branch))?;
    let local_ref = local
        .get()
        .name()
        .ok_or_else(|| anyhow!("branch {} has an invalid name", branch))?;
    repo.set_head(local_ref)?;
    tracing::info!(branch = %branch, commit = %commit.id(), "checked out pull request");
    Ok(())
}

fn head_name(repo: &Repository) -> Result<String> {
    let head = repo.head().context("Failed to read HEAD")?;
    match head.shorthand() {
        Some(name) => Ok(name.to_string()),
        None => bail!("HEAD name is not valid UTF-8"),
    }
}

/// Write the HEAD name to `path` as a read-only file, replacing an earlier one.
fn write_version(path: &Path, head: &str) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
    }
    fs::write(path, head).with_context(|| format!("Failed to write {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o444))?;
    }
    Ok(())
}
