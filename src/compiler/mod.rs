//! External compiler invocation
//!
//! Runs `<binary> make --docs=docs.json` in the package directory, capturing
//! combined output into a human-readable log. On failure the compiler is
//! re-run with `--report=json` and its stderr kept as a JSON artifact; only a
//! whitelisted projection of that report is returned.

mod report;
mod toolchain;

pub use report::{project_report, timeout_report, TRUNCATION_MARKER};
pub use toolchain::CompilerTable;

use chrono::{DateTime, Utc};
use eco_protocol::{CompileReport, ErrorReason, Job};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::{CompilerConfig, CompilerVersion};

/// Documentation file generated by a successful build
pub const DOCS_FILE: &str = "docs.json";

/// Compiler cache directory
pub const BUILD_CACHE_DIR: &str = "elm-stuff";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long output readers get after the process group is killed
const READER_GRACE: Duration = Duration::from_secs(1);

/// Errors that prevent the compiler from running at all
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Cannot run compiler {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result of a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    Success,
    Failure {
        reason: ErrorReason,
        detail: CompileReport,
    },
}

impl CompileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// A file written for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Object name in the build-logs bucket
    pub name: String,
    pub path: PathBuf,
}

/// Everything a build produced
#[derive(Debug, Clone)]
pub struct CompileRun {
    pub outcome: CompileOutcome,
    /// Version the package was built with, `None` if no compiler matched
    pub compiler_version: Option<String>,
    /// Combined compiler output; absent only when no compiler ran
    pub log: Option<Artifact>,
    /// Raw `--report=json` stream; present only after a completed failing build
    pub json_report: Option<Artifact>,
}

/// Names build-log artifacts
/// `<YYYYmmdd-HHMMSS>_<author>_<name>_<version>_compile_<compiler>.txt|.json`
#[derive(Debug, Clone)]
pub struct ArtifactNames {
    dir: PathBuf,
    stem: String,
}

impl ArtifactNames {
    pub fn new(dir: &Path, job: &Job, at: DateTime<Utc>) -> Self {
        Self {
            dir: dir.to_path_buf(),
            stem: format!(
                "{}_{}_{}_{}",
                at.format("%Y%m%d-%H%M%S"),
                job.author,
                job.name,
                job.version
            ),
        }
    }

    pub fn log(&self, compiler_version: &str) -> Artifact {
        self.artifact(compiler_version, "txt")
    }

    pub fn json_report(&self, compiler_version: &str) -> Artifact {
        self.artifact(compiler_version, "json")
    }

    fn artifact(&self, compiler_version: &str, ext: &str) -> Artifact {
        let name = format!("{}_compile_{}.{}", self.stem, compiler_version, ext);
        Artifact {
            path: self.dir.join(&name),
            name,
        }
    }
}

/// Runs the configured compilers
#[derive(Debug, Clone)]
pub struct CompilerRunner {
    table: CompilerTable,
    timeout: Duration,
    max_log_bytes: u64,
    max_report_field_chars: usize,
}

impl CompilerRunner {
    pub fn new(config: &CompilerConfig) -> Self {
        Self {
            table: CompilerTable::from_config(config),
            timeout: Duration::from_secs(config.timeout_seconds),
            max_log_bytes: config.max_log_bytes,
            max_report_field_chars: config.max_report_field_chars,
        }
    }

    /// Override the overall timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the package in `work_dir` for the manifest's `elm-version`.
    ///
    /// An unsupported version fails without running anything.
    pub fn compile(
        &self,
        work_dir: &Path,
        elm_version: &str,
        names: &ArtifactNames,
    ) -> Result<CompileRun, CompileError> {
        let Some(compiler) = self.table.select(elm_version) else {
            tracing::info!(elm_version, "unsupported compiler version");
            return Ok(CompileRun {
                outcome: CompileOutcome::Failure {
                    reason: ErrorReason::UnsupportedElmVersion,
                    detail: CompileReport::default(),
                },
                compiler_version: None,
                log: None,
                json_report: None,
            });
        };
        self.compile_with(work_dir, compiler, names)
    }

    /// Build the package in `work_dir` with a specific compiler.
    pub fn compile_with(
        &self,
        work_dir: &Path,
        compiler: &CompilerVersion,
        names: &ArtifactNames,
    ) -> Result<CompileRun, CompileError> {
        let version = compiler.prefix.clone();
        tracing::info!(binary = %compiler.binary, compiler_version = %version, "compiling");

        let docs_arg = format!("--docs={}", DOCS_FILE);
        let build = self.run(&compiler.binary, &["make", &docs_arg], work_dir, Capture::Combined)?;

        let log = names.log(&version);
        let mut log_text = build.output;
        if build.truncated {
            log_text.extend_from_slice(
                format!("\n[log truncated at {} bytes]\n", self.max_log_bytes).as_bytes(),
            );
        }
        if build.timed_out {
            log_text.extend_from_slice(
                format!("\n[compiler timed out after {:?}]\n", self.timeout).as_bytes(),
            );
        }
        fs::write(&log.path, &log_text)?;

        if build.timed_out {
            tracing::warn!(timeout_secs = self.timeout.as_secs(), "compiler timed out");
            return Ok(CompileRun {
                outcome: CompileOutcome::Failure {
                    reason: ErrorReason::CompileFailed,
                    detail: timeout_report(),
                },
                compiler_version: Some(version),
                log: Some(log),
                json_report: None,
            });
        }

        if build.status.is_some_and(|s| s.success()) {
            remove_build_byproducts(work_dir)?;
            tracing::info!("compiled ok");
            return Ok(CompileRun {
                outcome: CompileOutcome::Success,
                compiler_version: Some(version),
                log: Some(log),
                json_report: None,
            });
        }

        tracing::info!(status = ?build.status, "compile failed, collecting JSON report");
        let report_run = self.run(&compiler.binary, &["make", "--report=json"], work_dir, Capture::Stderr)?;
        let json_report = names.json_report(&version);
        fs::write(&json_report.path, &report_run.output)?;

        let detail = if report_run.timed_out {
            timeout_report()
        } else {
            project_report(&String::from_utf8_lossy(&report_run.output), self.max_report_field_chars)
        };

        Ok(CompileRun {
            outcome: CompileOutcome::Failure {
                reason: ErrorReason::CompileFailed,
                detail,
            },
            compiler_version: Some(version),
            log: Some(log),
            json_report: Some(json_report),
        })
    }

    fn run(
        &self,
        binary: &str,
        args: &[&str],
        work_dir: &Path,
        capture: Capture,
    ) -> Result<Captured, CompileError> {
        let mut command = Command::new(binary);
        command
            .args(args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stderr(Stdio::piped());
        match capture {
            Capture::Combined => command.stdout(Stdio::piped()),
            Capture::Stderr => command.stdout(Stdio::null()),
        };
        #[cfg(unix)]
        {
            // Own process group so wrapper scripts and their children die together
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|source| CompileError::Spawn {
            binary: binary.to_string(),
            source,
        })?;

        let buffer = Arc::new(Mutex::new(CappedBuffer::new(self.max_log_bytes)));
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(drain(stdout, Arc::clone(&buffer)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(drain(stderr, Arc::clone(&buffer)));
        }

        let deadline = Instant::now() + self.timeout;
        let (status, mut timed_out) = wait_with_deadline(&mut child, deadline)?;

        // Descendants that inherited the pipes can outlive the child
        if !join_until(&mut readers, deadline) {
            if status.is_some() {
                timed_out = true;
            }
            kill_process_group(&child);
            if !join_until(&mut readers, Instant::now() + READER_GRACE) {
                tracing::warn!(
                    readers = readers.len(),
                    "compiler output still open after kill, abandoning readers"
                );
            }
        }

        let (output, truncated) = match Arc::try_unwrap(buffer) {
            Ok(mutex) => mutex
                .into_inner()
                .map(CappedBuffer::into_parts)
                .unwrap_or_else(|poisoned| poisoned.into_inner().into_parts()),
            Err(shared) => {
                let guard = shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                (guard.data.clone(), guard.truncated)
            }
        };

        Ok(Captured {
            status,
            output,
            truncated,
            timed_out,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Capture {
    /// stdout and stderr interleaved
    Combined,
    /// stderr only; stdout discarded
    Stderr,
}

#[derive(Debug)]
struct Captured {
    /// `None` when the child was killed at the deadline
    status: Option<ExitStatus>,
    output: Vec<u8>,
    truncated: bool,
    timed_out: bool,
}

/// Output buffer that stops growing at its limit
#[derive(Debug)]
struct CappedBuffer {
    data: Vec<u8>,
    limit: u64,
    truncated: bool,
}

impl CappedBuffer {
    fn new(limit: u64) -> Self {
        Self {
            data: Vec::new(),
            limit,
            truncated: false,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.data.len() as u64) as usize;
        if chunk.len() > room {
            self.data.extend_from_slice(&chunk[..room]);
            self.truncated = true;
        } else {
            self.data.extend_from_slice(chunk);
        }
    }

    fn into_parts(self) -> (Vec<u8>, bool) {
        (self.data, self.truncated)
    }
}

/// Copy a pipe into the shared buffer until EOF. Reading continues past the
/// cap so the child never blocks on a full pipe.
fn drain(mut pipe: impl Read + Send + 'static, buffer: Arc<Mutex<CappedBuffer>>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.push(&chunk[..n]);
                    }
                }
            }
        }
    })
}

fn wait_with_deadline(child: &mut Child, deadline: Instant) -> io::Result<(Option<ExitStatus>, bool)> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((Some(status), false));
        }
        if Instant::now() >= deadline {
            kill_process_group(child);
            let _ = child.kill();
            let _ = child.wait();
            return Ok((None, true));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Join finished readers until all are done or `deadline` passes. Returns
/// whether every reader finished; unfinished ones stay in `readers`.
fn join_until(readers: &mut Vec<JoinHandle<()>>, deadline: Instant) -> bool {
    loop {
        let (finished, pending): (Vec<_>, Vec<_>) =
            readers.drain(..).partition(|reader| reader.is_finished());
        for reader in finished {
            let _ = reader.join();
        }
        *readers = pending;
        if readers.is_empty() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// SIGKILL every process in the child's group.
fn kill_process_group(child: &Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let pgid = Pid::from_raw(child.id() as i32);
        if let Err(e) = killpg(pgid, Signal::SIGKILL) {
            if e != nix::errno::Errno::ESRCH {
                tracing::warn!(error = %e, "failed to kill compiler process group");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = child;
    }
}

fn remove_build_byproducts(work_dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(work_dir.join(BUILD_CACHE_DIR)) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    match fs::remove_file(work_dir.join(DOCS_FILE)) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn job() -> Job {
        Job {
            seq: 7,
            zip_url: "https://example.invalid/foo.zip".to_string(),
            name: "elm-foo".to_string(),
            author: "someone".to_string(),
            version: "1.0.0".to_string(),
        }
    }

    #[test]
    fn test_artifact_names() {
        let at = Utc.with_ymd_and_hms(2020, 3, 4, 5, 6, 7).unwrap();
        let names = ArtifactNames::new(Path::new("/tmp/job-7"), &job(), at);
        let log = names.log("0.19.1");
        assert_eq!(log.name, "20200304-050607_someone_elm-foo_1.0.0_compile_0.19.1.txt");
        assert_eq!(log.path, Path::new("/tmp/job-7").join(&log.name));
        assert_eq!(
            names.json_report("0.19.0").name,
            "20200304-050607_someone_elm-foo_1.0.0_compile_0.19.0.json"
        );
    }

    #[test]
    fn test_capped_buffer() {
        let mut buf = CappedBuffer::new(5);
        buf.push(b"abc");
        buf.push(b"defg");
        buf.push(b"h");
        assert_eq!(buf.into_parts(), (b"abcde".to_vec(), true));
    }

    #[test]
    fn test_unsupported_version_runs_nothing() {
        let dir = TempDir::new().unwrap();
        let mut config = CompilerConfig::default();
        for v in &mut config.versions {
            v.binary = "/nonexistent/compiler".to_string();
        }
        let runner = CompilerRunner::new(&config);
        let names = ArtifactNames::new(dir.path(), &job(), Utc::now());

        let run = runner.compile(dir.path(), "0.18.0", &names).unwrap();
        assert_eq!(
            run.outcome,
            CompileOutcome::Failure {
                reason: ErrorReason::UnsupportedElmVersion,
                detail: CompileReport::default(),
            }
        );
        assert!(run.log.is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_binary_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let runner = CompilerRunner::new(&CompilerConfig::default());
        let compiler = CompilerVersion {
            prefix: "0.19.1".to_string(),
            binary: "/nonexistent/compiler".to_string(),
        };
        let names = ArtifactNames::new(dir.path(), &job(), Utc::now());
        let err = runner.compile_with(dir.path(), &compiler, &names).unwrap_err();
        assert!(matches!(err, CompileError::Spawn { .. }));
    }

    #[cfg(unix)]
    mod fake_compiler {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Install an executable shell script and return a compiler entry for it.
        fn install(dir: &Path, body: &str) -> CompilerVersion {
            let path = dir.join("fake-elm");
            fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            CompilerVersion {
                prefix: "0.19.1".to_string(),
                binary: path.to_string_lossy().to_string(),
            }
        }

        struct Fixture {
            _tmp: TempDir,
            bin_dir: PathBuf,
            work_dir: PathBuf,
            names: ArtifactNames,
        }

        fn fixture() -> Fixture {
            let tmp = TempDir::new().unwrap();
            let bin_dir = tmp.path().join("bin");
            let work_dir = tmp.path().join("pkg");
            let artifacts = tmp.path().join("artifacts");
            for d in [&bin_dir, &work_dir, &artifacts] {
                fs::create_dir_all(d).unwrap();
            }
            let names = ArtifactNames::new(&artifacts, &job(), Utc::now());
            Fixture {
                _tmp: tmp,
                bin_dir,
                work_dir,
                names,
            }
        }

        #[test]
        fn test_success_removes_build_byproducts() {
            let fx = fixture();
            let compiler = install(
                &fx.bin_dir,
                r#"mkdir -p elm-stuff/0.19.1
echo '[]' > docs.json
echo "Compiling ..."
echo "Success! Compiled 2 modules." >&2
exit 0
"#,
            );
            fs::create_dir_all(fx.work_dir.join("src")).unwrap();

            let run = CompilerRunner::new(&CompilerConfig::default())
                .compile_with(&fx.work_dir, &compiler, &fx.names)
                .unwrap();

            assert_eq!(run.outcome, CompileOutcome::Success);
            assert_eq!(run.compiler_version.as_deref(), Some("0.19.1"));
            assert!(!fx.work_dir.join("elm-stuff").exists());
            assert!(!fx.work_dir.join("docs.json").exists());
            assert!(fx.work_dir.join("src").exists());
            assert!(run.json_report.is_none());

            let log = fs::read_to_string(run.log.unwrap().path).unwrap();
            assert!(log.contains("Compiling ..."));
            assert!(log.contains("Success! Compiled 2 modules."));
        }

        #[test]
        fn test_failure_projects_report() {
            let fx = fixture();
            let compiler = install(
                &fx.bin_dir,
                r#"if [ "$2" = "--report=json" ]; then
  echo '{"type":"error","path":"src/Foo.elm","title":"UNKNOWN IMPORT","message":["long text"]}' >&2
  exit 1
fi
echo "-- UNKNOWN IMPORT ---- src/Foo.elm" >&2
exit 1
"#,
            );

            let run = CompilerRunner::new(&CompilerConfig::default())
                .compile_with(&fx.work_dir, &compiler, &fx.names)
                .unwrap();

            let CompileOutcome::Failure { reason, detail } = &run.outcome else {
                panic!("expected failure, got {:?}", run.outcome);
            };
            assert_eq!(*reason, ErrorReason::CompileFailed);
            assert_eq!(
                serde_json::to_value(detail).unwrap(),
                serde_json::json!({"path": "src/Foo.elm", "type": "error", "title": "UNKNOWN IMPORT"})
            );

            let log = fs::read_to_string(&run.log.as_ref().unwrap().path).unwrap();
            assert!(log.contains("-- UNKNOWN IMPORT"));
            let raw = fs::read_to_string(&run.json_report.as_ref().unwrap().path).unwrap();
            assert!(raw.contains("\"message\""));
        }

        #[test]
        fn test_undecodable_report() {
            let fx = fixture();
            let compiler = install(&fx.bin_dir, "echo 'elm: out of memory' >&2\nexit 1\n");

            let run = CompilerRunner::new(&CompilerConfig::default())
                .compile_with(&fx.work_dir, &compiler, &fx.names)
                .unwrap();

            assert_eq!(
                run.outcome,
                CompileOutcome::Failure {
                    reason: ErrorReason::CompileFailed,
                    detail: CompileReport::decode_failure(),
                }
            );
        }

        #[test]
        fn test_log_is_capped() {
            let fx = fixture();
            let compiler = install(
                &fx.bin_dir,
                "i=0\nwhile [ $i -lt 200 ]; do echo 0123456789012345678901234567890123456789; i=$((i+1)); done\nexit 0\n",
            );
            let config = CompilerConfig {
                max_log_bytes: 100,
                ..CompilerConfig::default()
            };

            let run = CompilerRunner::new(&config)
                .compile_with(&fx.work_dir, &compiler, &fx.names)
                .unwrap();

            let log = fs::read_to_string(run.log.unwrap().path).unwrap();
            assert!(log.starts_with("0123456789"));
            assert!(log.contains("[log truncated at 100 bytes]"));
            assert!(log.len() < 200);
        }

        #[test]
        fn test_timeout_kills_compiler_descendants() {
            let fx = fixture();
            // Not exec'd: the sleep is a grandchild holding the output pipes
            let compiler = install(&fx.bin_dir, "echo starting\nsleep 8\necho finished\n");

            let started = Instant::now();
            let run = CompilerRunner::new(&CompilerConfig::default())
                .with_timeout(Duration::from_millis(300))
                .compile_with(&fx.work_dir, &compiler, &fx.names)
                .unwrap();

            assert!(started.elapsed() < Duration::from_secs(4), "took {:?}", started.elapsed());
            assert_eq!(
                run.outcome,
                CompileOutcome::Failure {
                    reason: ErrorReason::CompileFailed,
                    detail: timeout_report(),
                }
            );
            let log = fs::read_to_string(run.log.unwrap().path).unwrap();
            assert!(log.contains("starting"));
            assert!(!log.contains("finished"));
        }

        #[test]
        fn test_background_child_holding_output_times_out() {
            let fx = fixture();
            let compiler = install(&fx.bin_dir, "sleep 8 &\necho started\nexit 0\n");

            let started = Instant::now();
            let run = CompilerRunner::new(&CompilerConfig::default())
                .with_timeout(Duration::from_millis(300))
                .compile_with(&fx.work_dir, &compiler, &fx.names)
                .unwrap();

            assert!(started.elapsed() < Duration::from_secs(4), "took {:?}", started.elapsed());
            assert!(!run.outcome.is_success());
        }

        #[test]
        fn test_timeout_kills_compiler() {
            let fx = fixture();
            let compiler = install(&fx.bin_dir, "echo starting\nexec sleep 30\n");

            let started = Instant::now();
            let run = CompilerRunner::new(&CompilerConfig::default())
                .with_timeout(Duration::from_millis(300))
                .compile_with(&fx.work_dir, &compiler, &fx.names)
                .unwrap();

            assert!(started.elapsed() < Duration::from_secs(10));
            assert_eq!(
                run.outcome,
                CompileOutcome::Failure {
                    reason: ErrorReason::CompileFailed,
                    detail: timeout_report(),
                }
            );
            assert!(run.json_report.is_none());
            let log = fs::read_to_string(run.log.unwrap().path).unwrap();
            assert!(log.contains("starting"));
            assert!(log.contains("timed out"));
        }
    }
}
