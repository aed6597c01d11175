use std::{io::ErrorKind, path::PathBuf, process::Stdio, time::Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::application::print::{SpoolError, SpoolJob, Spooler};

/// Submits jobs through the CUPS `lp` command.
#[derive(Debug, Clone)]
pub struct LpSpooler {
    cli_path: PathBuf,
}

impl LpSpooler {
    pub fn new(cli_path: PathBuf) -> Self {
        Self { cli_path }
    }

    fn command(&self, job: &SpoolJob) -> Command {
        let mut command = Command::new(&self.cli_path);
        if let Some(printer) = &job.printer {
            command.arg("-d").arg(printer);
        }
        command.arg("-n").arg(job.copies.to_string());
        if job.duplex {
            command.arg("-o").arg("sides=two-sided-long-edge");
        }
        command
            .arg("--")
            .arg(&job.path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Spooler for LpSpooler {
    async fn submit(&self, job: &SpoolJob) -> Result<String, SpoolError> {
        let started_at = Instant::now();
        let output = self.command(job).output().await.map_err(|err| {
            warn!(
                target = "infra::spooler",
                op = "lp::submit",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                error_code = "spawn_cli",
                cli_path = %self.cli_path.display(),
                error = %err,
                "Failed to spawn print spooler"
            );
            SpoolError::Unavailable {
                cli_path: self.cli_path.clone(),
                message: if err.kind() == ErrorKind::NotFound {
                    "executable not found".to_string()
                } else {
                    err.to_string()
                },
            }
        })?;

        if !output.status.success() {
            let exit_code = output.status.code();
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(
                target = "infra::spooler",
                op = "lp::submit",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                error_code = "spooler_cli",
                stderr = %stderr,
                "Print spooler rejected job"
            );
            return Err(SpoolError::Rejected { exit_code, stderr });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let job_id = parse_job_id(&stdout).unwrap_or_else(|| stdout.trim().to_string());

        info!(
            target = "infra::spooler",
            op = "lp::submit",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            job_id = %job_id,
            printer = job.printer.as_deref().unwrap_or("default"),
            path = %job.path.display(),
            "Submitted job to print spooler"
        );

        Ok(job_id)
    }
}

/// Extract `office-42` from `request id is office-42 (1 file(s))`.
fn parse_job_id(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("request id is ")?;
        rest.split_whitespace().next().map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cups_request_id() {
        assert_eq!(
            parse_job_id("request id is office-42 (1 file(s))\n").as_deref(),
            Some("office-42")
        );
        assert_eq!(parse_job_id("queued\n"), None);
    }

    #[cfg(unix)]
    mod cli {
        use super::super::*;
        use std::{fs, os::unix::fs::PermissionsExt, path::Path};
        use tempfile::TempDir;

        fn make_executable(path: &Path) {
            let mut perms = fs::metadata(path).expect("metadata").permissions();
            perms.set_mode(0o755);
            fs::set_permissions(path, perms).expect("set perms");
        }

        fn fake_lp(dir: &Path, body: &str) -> PathBuf {
            let script_path = dir.join("fake-lp");
            fs::write(&script_path, format!("#!/bin/sh\n{body}\n")).expect("write script");
            make_executable(&script_path);
            script_path
        }

        fn job(path: PathBuf) -> SpoolJob {
            SpoolJob {
                path,
                printer: Some("office".to_string()),
                copies: 2,
                duplex: true,
            }
        }

        #[tokio::test]
        async fn submits_with_printer_copies_and_duplex() {
            let dir = TempDir::new().expect("temp dir");
            let args_path = dir.path().join("args.log");
            let script = fake_lp(
                dir.path(),
                &format!(
                    "echo \"$@\" > \"{}\"\necho 'request id is office-7 (1 file(s))'",
                    args_path.display()
                ),
            );

            let job_id = LpSpooler::new(script)
                .submit(&job(PathBuf::from("/docs/report.pdf")))
                .await
                .expect("submitted");

            assert_eq!(job_id, "office-7");
            let args = fs::read_to_string(&args_path).expect("args");
            assert_eq!(
                args.trim(),
                "-d office -n 2 -o sides=two-sided-long-edge -- /docs/report.pdf"
            );
        }

        #[tokio::test]
        async fn rejection_surfaces_stderr() {
            let dir = TempDir::new().expect("temp dir");
            let script = fake_lp(
                dir.path(),
                "echo 'lp: The printer or class does not exist.' >&2\nexit 1",
            );

            let err = LpSpooler::new(script)
                .submit(&job(PathBuf::from("/docs/report.pdf")))
                .await
                .expect_err("rejected");

            match err {
                SpoolError::Rejected { exit_code, stderr } => {
                    assert_eq!(exit_code, Some(1));
                    assert!(stderr.contains("does not exist"), "{stderr}");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[tokio::test]
        async fn missing_binary_is_unavailable() {
            let err = LpSpooler::new(PathBuf::from("/nonexistent/printgate-lp"))
                .submit(&job(PathBuf::from("/docs/report.pdf")))
                .await
                .expect_err("unavailable");
            assert!(matches!(err, SpoolError::Unavailable { .. }));
        }
    }
}
