// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Settings repository synchronization through git.
//!
//! The sync repository directory can optionally be a git repository with an
//! `origin` remote. Backups commit everything in the directory and push it,
//! restores pull before copying settings back. Pulling only ever
//! fast-forwards. Diverged history is reported, never merged.
//!
//! Tracked files are checked out forcefully when pulling: the remote is
//! considered the source of truth for the repository directory, while the
//! user settings directory is the source of truth for backups.

use crate::config::RemoteConfig;

use auth_git2::{GitAuthenticator, Prompter};
use git2::{
    build::CheckoutBuilder, Commit, Config, FetchOptions, IndexAddOption, Oid, PushOptions,
    RemoteCallbacks, Repository, RepositoryInitOptions, Signature,
};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{
    cell::RefCell,
    path::{Path, PathBuf},
    time,
};
use tracing::{debug, info, instrument, warn};

/// Name of remote used for syncing.
pub const ORIGIN: &str = "origin";

/// Result of pulling from remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// Local branch already contains remote branch.
    UpToDate,

    /// Local branch moved forward to remote branch.
    FastForward,

    /// Remote does not have the branch yet.
    NoRemoteBranch,
}

/// Git repository holding backed up settings.
pub struct SyncRepo {
    repository: Repository,
    branch: String,
}

impl std::fmt::Debug for SyncRepo {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("SyncRepo")
            .field("path", &self.repository.path())
            .field("branch", &self.branch)
            .finish()
    }
}

impl SyncRepo {
    /// Open sync repository, creating it when needed.
    ///
    /// Initializes a new repository at target directory if there is none yet,
    /// using the configured branch as the initial branch. Makes sure the
    /// `origin` remote points at the configured URL.
    ///
    /// # Errors
    ///
    /// - Return [`RemoteError::Git2`] if libgit2 operations fail.
    /// - Return [`RemoteError::CreateDir`] if directory cannot be created.
    #[instrument(skip(dir, remote), level = "debug")]
    pub fn open_or_create(dir: impl AsRef<Path>, remote: &RemoteConfig) -> Result<Self> {
        let dir = dir.as_ref();
        let repository = match Repository::open(dir) {
            Ok(repository) => repository,
            Err(_) => {
                info!("initialize sync repository at {:?}", dir.display());
                mkdirp::mkdirp(dir).map_err(|err| RemoteError::CreateDir {
                    source: err,
                    path: dir.to_path_buf(),
                })?;
                let mut opts = RepositoryInitOptions::new();
                opts.initial_head(&remote.branch);
                Repository::init_opts(dir, &opts)?
            }
        };

        // INVARIANT: Origin always points at configured URL.
        match repository.find_remote(ORIGIN) {
            Ok(origin) if origin.url() == Some(remote.url.as_str()) => {}
            Ok(_) => {
                info!("point {ORIGIN} at {}", remote.url);
                repository.remote_set_url(ORIGIN, &remote.url)?;
            }
            Err(_) => {
                repository.remote(ORIGIN, &remote.url)?;
            }
        }

        Ok(Self {
            repository,
            branch: remote.branch.clone(),
        })
    }

    fn local_ref(&self) -> String {
        format!("refs/heads/{}", self.branch)
    }

    fn remote_ref(&self) -> String {
        format!("refs/remotes/{ORIGIN}/{}", self.branch)
    }

    /// Fetch remote branch, and fast-forward local branch to it.
    ///
    /// Fetch progress is displayed through a progress bar. If any credentials
    /// are required, then the user will be prompted for them accordingly.
    ///
    /// # Errors
    ///
    /// - Return [`RemoteError::Diverged`] if local and remote history split.
    /// - Return [`RemoteError::Git2`] if libgit2 operations fail.
    #[instrument(skip(self), level = "debug")]
    pub fn pull(&self) -> Result<PullOutcome> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
        )?
        .progress_chars("-Cco.");
        bar.set_style(style);
        bar.set_message(format!("fetch {ORIGIN}/{}", self.branch));
        bar.enable_steady_tick(time::Duration::from_millis(100));

        let prompter = IndicatifPrompter::new(bar.clone());
        let authenticator = GitAuthenticator::default().set_prompter(prompter);
        let config = Config::open_default()?;

        let mut throttle = time::Instant::now();
        let mut rc = RemoteCallbacks::new();
        rc.credentials(authenticator.credentials(&config));
        rc.transfer_progress(|progress| {
            if throttle.elapsed() > time::Duration::from_millis(10) {
                throttle = time::Instant::now();
                bar.set_length(progress.total_objects() as u64);
                bar.set_position(progress.received_objects() as u64);
            }
            true
        });

        let mut fo = FetchOptions::new();
        fo.remote_callbacks(rc);
        let refspec = format!("+{}:{}", self.local_ref(), self.remote_ref());
        let fetched = self
            .repository
            .find_remote(ORIGIN)?
            .fetch(&[refspec.as_str()], Some(&mut fo), None);
        bar.finish_and_clear();
        if let Err(err) = fetched {
            // INVARIANT: Empty remote has nothing to fetch yet.
            if err.code() == git2::ErrorCode::NotFound {
                warn!("{ORIGIN} has no branch {}", self.branch);
                return Ok(PullOutcome::NoRemoteBranch);
            }
            return Err(err.into());
        }

        let Ok(remote_ref) = self.repository.find_reference(&self.remote_ref()) else {
            warn!("{ORIGIN} has no branch {}", self.branch);
            return Ok(PullOutcome::NoRemoteBranch);
        };
        let target = self.repository.reference_to_annotated_commit(&remote_ref)?;
        let (analysis, _) = self.repository.merge_analysis(&[&target])?;

        if analysis.is_up_to_date() {
            debug!("already up to date");
            return Ok(PullOutcome::UpToDate);
        }

        if analysis.is_unborn() {
            self.repository.reference(
                &self.local_ref(),
                target.id(),
                true,
                "pull: initial checkout",
            )?;
        } else if analysis.is_fast_forward() {
            self.repository
                .find_reference(&self.local_ref())?
                .set_target(target.id(), "pull: fast-forward")?;
        } else {
            return Err(RemoteError::Diverged {
                branch: self.branch.clone(),
            });
        }

        self.repository.set_head(&self.local_ref())?;
        self.repository
            .checkout_head(Some(CheckoutBuilder::new().force()))?;
        info!("fast-forward {} to {}", self.branch, target.id());

        Ok(PullOutcome::FastForward)
    }

    /// Stage every change in working directory, and commit it.
    ///
    /// Returns `None` without committing if nothing changed since the last
    /// commit.
    ///
    /// # Errors
    ///
    /// - Return [`RemoteError::Git2`] if libgit2 operations fail.
    #[instrument(skip(self, message), level = "debug")]
    pub fn commit_all(&self, message: impl AsRef<str>) -> Result<Option<Oid>> {
        let mut index = self.repository.index()?;

        // INVARIANT: Stage additions, modifications, and deletions alike.
        index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"], None)?;
        index.write()?;
        let tree_oid = index.write_tree()?;

        let parent = self
            .repository
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok());
        let unchanged = match &parent {
            Some(parent) => parent.tree_id() == tree_oid,
            None => index.is_empty(),
        };
        if unchanged {
            info!("nothing to commit");
            return Ok(None);
        }

        let tree = self.repository.find_tree(tree_oid)?;
        let signature = self
            .repository
            .signature()
            .or_else(|_| Signature::now("homeops", "homeops@localhost"))?;
        let parents = parent.iter().collect::<Vec<&Commit>>();
        let oid = self.repository.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message.as_ref(),
            &tree,
            &parents,
        )?;
        info!("commit {oid}");

        Ok(Some(oid))
    }

    /// Push local branch to remote.
    ///
    /// # Errors
    ///
    /// - Return [`RemoteError::Rejected`] if remote refuses the update.
    /// - Return [`RemoteError::Git2`] if libgit2 operations fail.
    #[instrument(skip(self), level = "debug")]
    pub fn push(&self) -> Result<()> {
        let rejected = RefCell::new(None);
        {
            let bar = ProgressBar::hidden();
            let prompter = IndicatifPrompter::new(bar);
            let authenticator = GitAuthenticator::default().set_prompter(prompter);
            let config = Config::open_default()?;

            let mut rc = RemoteCallbacks::new();
            rc.credentials(authenticator.credentials(&config));
            rc.push_update_reference(|refname, status| {
                if let Some(status) = status {
                    *rejected.borrow_mut() = Some(format!("{refname}: {status}"));
                }
                Ok(())
            });

            let mut po = PushOptions::new();
            po.remote_callbacks(rc);
            let refspec = format!("{0}:{0}", self.local_ref());
            self.repository
                .find_remote(ORIGIN)?
                .push(&[refspec.as_str()], Some(&mut po))?;
        }

        if let Some(reason) = rejected.into_inner() {
            return Err(RemoteError::Rejected { reason });
        }

        info!("pushed {} to {ORIGIN}", self.branch);
        Ok(())
    }
}

/// Git2 authentication prompter for progress bar.
#[derive(Debug, Clone)]
pub struct IndicatifPrompter {
    pub(crate) bar: ProgressBar,
}

impl IndicatifPrompter {
    /// Construct new progress bar authenticator.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for IndicatifPrompter {
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| -> Option<(String, String)> {
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()?;
            Some((username, password))
        })
    }

    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(|| {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }

    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(|| {
            Password::new("passphrase")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }
}

/// Settings repository error types.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Local and remote history split.
    #[error("local branch {branch:?} and its remote have diverged, resolve manually")]
    Diverged { branch: String },

    /// Remote refused pushed reference.
    #[error("push rejected: {reason}")]
    Rejected { reason: String },

    /// Repository directory cannot be created.
    #[error("failed to create sync repository directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = RemoteError> = std::result::Result<T, E>;
