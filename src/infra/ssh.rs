//! Infrastructure implementation of the SSH transport ports.
//!
//! `OpenSshClient<R>` drives the system `ssh`/`scp` binaries through a
//! `CommandRunner`. Generic over `R: CommandRunner` so tests can inject a
//! mock runner without opening real connections.

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::{FileSync, RemoteShell};
use crate::command_runner::{CommandRunner, TokioCommandRunner};

/// Default budget for a remote command; convergence runs can take a long
/// while, so this is generous.
const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(1800);

/// Budget for recursive directory upload.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(900);

pub struct OpenSshClient<R: CommandRunner> {
    runner: R,
    user: String,
    identity: Option<PathBuf>,
}

impl<R: CommandRunner> OpenSshClient<R> {
    /// Create a client with an explicit runner instance.
    pub fn new(runner: R, user: impl Into<String>, identity: Option<PathBuf>) -> Self {
        Self {
            runner,
            user: user.into(),
            identity,
        }
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
        ];
        if let Some(identity) = &self.identity {
            args.push("-i".to_string());
            args.push(identity.to_string_lossy().into_owned());
        }
        args
    }

    fn target(&self, host: &str) -> String {
        format!("{}@{host}", self.user)
    }
}

impl OpenSshClient<TokioCommandRunner> {
    /// Convenience constructor for production use.
    #[must_use]
    pub fn default_runner(user: impl Into<String>, identity: Option<PathBuf>) -> Self {
        Self {
            runner: TokioCommandRunner::new(DEFAULT_EXEC_TIMEOUT),
            user: user.into(),
            identity,
        }
    }
}

impl<R: CommandRunner> RemoteShell for OpenSshClient<R> {
    async fn exec(&self, host: &str, command: &str) -> Result<Output> {
        let mut args = self.base_args();
        args.push(self.target(host));
        args.push(command.to_string());
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner.run("ssh", &refs).await.context("ssh exec")
    }

    async fn exec_with_timeout(
        &self,
        host: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<Output> {
        let mut args = self.base_args();
        args.push(self.target(host));
        args.push(command.to_string());
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner
            .run_with_timeout("ssh", &refs, timeout)
            .await
            .context("ssh exec")
    }
}

impl<R: CommandRunner> FileSync for OpenSshClient<R> {
    async fn upload_dir(&self, host: &str, local: &Path, remote: &str) -> Result<Output> {
        let mut args = self.base_args();
        args.insert(0, "-r".to_string());
        args.push(contents_of(local));
        args.push(format!("{}:{remote}", self.target(host)));
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner
            .run_with_timeout("scp", &refs, UPLOAD_TIMEOUT)
            .await
            .context("scp upload")
    }
}

/// Address the *contents* of a directory so scp copies them into the
/// destination rather than nesting the directory inside it. A trailing
/// separator on the input must not change the outcome.
fn contents_of(local: &Path) -> String {
    let s = local.to_string_lossy();
    format!("{}/.", s.trim_end_matches('/'))
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    struct RecordingRunner {
        invocations: RefCell<Vec<(String, Vec<String>)>>,
    }

    impl RecordingRunner {
        fn new() -> Self {
            Self {
                invocations: RefCell::new(Vec::new()),
            }
        }

        fn last(&self) -> (String, Vec<String>) {
            self.invocations
                .borrow()
                .last()
                .cloned()
                .expect("runner was never invoked")
        }
    }

    impl CommandRunner for RecordingRunner {
        async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
            self.invocations.borrow_mut().push((
                program.to_string(),
                args.iter().map(ToString::to_string).collect(),
            ));
            Ok(crate::application::services::test_support::ok_output(b""))
        }
        async fn run_with_timeout(
            &self,
            program: &str,
            args: &[&str],
            _: Duration,
        ) -> Result<Output> {
            self.run(program, args).await
        }
    }

    #[tokio::test]
    async fn exec_targets_user_at_host_with_batch_mode() {
        let ssh = OpenSshClient::new(RecordingRunner::new(), "ubuntu", None);
        ssh.exec("host.example", "ls").await.expect("exec");
        let (program, args) = ssh.runner.last();
        assert_eq!(program, "ssh");
        assert!(args.windows(2).any(|w| w == ["-o", "BatchMode=yes"]));
        assert_eq!(args[args.len() - 2], "ubuntu@host.example");
        assert_eq!(args[args.len() - 1], "ls");
    }

    #[tokio::test]
    async fn identity_file_is_passed_when_configured() {
        let ssh = OpenSshClient::new(
            RecordingRunner::new(),
            "ubuntu",
            Some(PathBuf::from("/home/me/.ssh/bakery.pem")),
        );
        ssh.exec("host.example", "ls").await.expect("exec");
        let (_, args) = ssh.runner.last();
        assert!(args.windows(2).any(|w| w == ["-i", "/home/me/.ssh/bakery.pem"]));
    }

    #[tokio::test]
    async fn upload_copies_directory_contents() {
        let ssh = OpenSshClient::new(RecordingRunner::new(), "ubuntu", None);
        ssh.upload_dir("host.example", Path::new("site-recipes"), "/tmp/chef-solo")
            .await
            .expect("upload");
        let (program, args) = ssh.runner.last();
        assert_eq!(program, "scp");
        assert_eq!(args[0], "-r");
        assert_eq!(args[args.len() - 2], "site-recipes/.");
        assert_eq!(args[args.len() - 1], "ubuntu@host.example:/tmp/chef-solo");
    }

    #[tokio::test]
    async fn trailing_separator_does_not_change_the_upload() {
        let ssh = OpenSshClient::new(RecordingRunner::new(), "ubuntu", None);
        ssh.upload_dir("host.example", Path::new("site-recipes/"), "/tmp/chef-solo")
            .await
            .expect("upload");
        let (_, args) = ssh.runner.last();
        assert_eq!(args[args.len() - 2], "site-recipes/.");
    }

    #[test]
    fn contents_of_normalizes_trailing_separators() {
        assert_eq!(contents_of(Path::new("a/b")), "a/b/.");
        assert_eq!(contents_of(Path::new("a/b/")), "a/b/.");
    }
}
