//! Remote command results and the batch success check.

use std::fmt;
use std::process::Output;

/// Result of one remote command. Immutable once produced.
#[derive(Debug, Clone)]
pub struct Job {
    /// The command text as sent over the wire.
    pub command: String,
    /// Exit status code; `None` when the process was killed by a signal.
    pub status: Option<i32>,
    /// Captured stdout, lossily decoded.
    pub stdout: String,
    /// Captured stderr, lossily decoded.
    pub stderr: String,
}

impl Job {
    /// Capture a finished process as a job.
    #[must_use]
    pub fn from_output(command: &str, output: &Output) -> Self {
        Self {
            command: command.to_string(),
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    /// A job succeeded only if it exited with status zero.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == Some(0)
    }
}

/// Error carrying every failing job of a batch.
///
/// The report never short-circuits: each failing command appears with its
/// exit status and captured output.
#[derive(Debug)]
pub struct BatchError {
    pub failures: Vec<Job>,
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, job) in self.failures.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            match job.status {
                Some(code) => {
                    writeln!(f, "command '{}' exited with status {code}", job.command)?;
                }
                None => writeln!(f, "command '{}' was killed by a signal", job.command)?,
            }
            writeln!(f, "  stdout: {}", job.stdout.trim_end())?;
            write!(f, "  stderr: {}", job.stderr.trim_end())?;
        }
        Ok(())
    }
}

impl std::error::Error for BatchError {}

/// Succeed only if every job in the batch exited zero.
///
/// # Errors
///
/// Returns a [`BatchError`] listing each failing job otherwise.
pub fn ensure_all_succeeded(jobs: &[Job]) -> Result<(), BatchError> {
    let failures: Vec<Job> = jobs.iter().filter(|j| !j.succeeded()).cloned().collect();
    if failures.is_empty() {
        Ok(())
    } else {
        Err(BatchError { failures })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    fn job(command: &str, status: Option<i32>, stderr: &str) -> Job {
        Job {
            command: command.to_string(),
            status,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn all_zero_statuses_succeed() {
        let jobs = vec![job("ls", Some(0), ""), job("pwd", Some(0), "")];
        assert!(ensure_all_succeeded(&jobs).is_ok());
    }

    #[test]
    fn empty_batch_succeeds() {
        assert!(ensure_all_succeeded(&[]).is_ok());
    }

    #[test]
    fn any_nonzero_status_fails() {
        let jobs = vec![job("ls", Some(0), ""), job("false", Some(1), "")];
        let err = ensure_all_succeeded(&jobs).expect_err("expected Err");
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].command, "false");
    }

    #[test]
    fn every_failure_is_reported_with_stderr() {
        let jobs = vec![
            job("apt-get update", Some(100), "mirror unreachable"),
            job("gem install chef", Some(1), "FAIL WHALE"),
        ];
        let err = ensure_all_succeeded(&jobs).expect_err("expected Err");
        let msg = err.to_string();
        assert!(msg.contains("'apt-get update' exited with status 100"), "{msg}");
        assert!(msg.contains("mirror unreachable"), "{msg}");
        assert!(msg.contains("'gem install chef' exited with status 1"), "{msg}");
        assert!(msg.contains("FAIL WHALE"), "{msg}");
    }

    #[test]
    fn signal_death_is_a_failure() {
        let jobs = vec![job("sleep 100", None, "")];
        let err = ensure_all_succeeded(&jobs).expect_err("expected Err");
        assert!(err.to_string().contains("killed by a signal"));
    }

    #[cfg(unix)]
    #[test]
    fn from_output_captures_status_and_streams() {
        use std::os::unix::process::ExitStatusExt;
        let output = Output {
            status: std::process::ExitStatus::from_raw(1 << 8),
            stdout: b"out".to_vec(),
            stderr: b"err".to_vec(),
        };
        let job = Job::from_output("true", &output);
        assert_eq!(job.status, Some(1));
        assert_eq!(job.stdout, "out");
        assert_eq!(job.stderr, "err");
        assert!(!job.succeeded());
    }
}
