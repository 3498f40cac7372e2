use os_pipe::pipe;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    io::{self, BufRead, BufReader, Write},
    path::PathBuf,
    process::{Child, Command, ExitStatus},
    sync::{Arc, Mutex},
};
use tracing::{debug, info};

/// What to hand to the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// An executable script file, run with elevation per policy.
    Script(PathBuf),
    /// A single command line, run through `sh -c`.
    Command(String),
}

impl Invocation {
    pub fn describe(&self) -> String {
        match self {
            Invocation::Script(path) => path.display().to_string(),
            Invocation::Command(line) => line.clone(),
        }
    }
}

/// Exit code plus everything the child wrote to stdout and stderr, interleaved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub exit_code: i32,
    pub output: String,
}

impl Execution {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to read output of {command}: {source}")]
    Output {
        command: String,
        #[source]
        source: io::Error,
    },
}

/// Runs one child process at a time and reports how it ended.
pub trait Runner {
    fn run(&self, invocation: &Invocation) -> Result<Execution, ExecError>;
}

/// When to put `sudo` in front of a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Elevation {
    /// `sudo` unless already root.
    #[default]
    Auto,
    Always,
    Never,
}

impl Elevation {
    fn wants_sudo(self) -> bool {
        match self {
            Elevation::Always => true,
            Elevation::Never => false,
            Elevation::Auto => !running_as_root(),
        }
    }
}

#[cfg(unix)]
fn running_as_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn running_as_root() -> bool {
    false
}

/// Where output lines are echoed while the child runs.
pub type EchoSink = Arc<Mutex<dyn Write + Send>>;

/// Executes invocations with merged stdout/stderr, echoing each line to the
/// console as it arrives.
#[derive(Clone)]
pub struct ShellRunner {
    current_dir: PathBuf,
    elevation: Elevation,
    echo: Option<EchoSink>,
}

impl fmt::Debug for ShellRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellRunner")
            .field("current_dir", &self.current_dir)
            .field("elevation", &self.elevation)
            .field("echo", &self.echo.is_some())
            .finish()
    }
}

impl ShellRunner {
    pub fn new(current_dir: PathBuf, elevation: Elevation) -> Self {
        let stdout: EchoSink = Arc::new(Mutex::new(io::stdout()));
        Self {
            current_dir,
            elevation,
            echo: Some(stdout),
        }
    }

    /// Echo to `sink` instead of stdout.
    #[cfg(test)]
    pub fn with_echo(mut self, sink: EchoSink) -> Self {
        self.echo = Some(sink);
        self
    }

    /// Capture output without echoing it.
    #[cfg(test)]
    pub fn quiet(mut self) -> Self {
        self.echo = None;
        self
    }

    fn create_base_command(&self, invocation: &Invocation) -> Command {
        let mut cmd = match invocation {
            Invocation::Script(path) if self.elevation.wants_sudo() => {
                let mut cmd = Command::new("sudo");
                cmd.arg(path);
                cmd
            }
            Invocation::Script(path) => Command::new(path),
            Invocation::Command(line) => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(line);
                cmd
            }
        };
        cmd.current_dir(&self.current_dir);
        cmd
    }

    fn stream_lines(&self, reader: impl io::Read) -> io::Result<String> {
        let mut reader = BufReader::new(reader);
        let mut captured = String::new();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            if let Some(sink) = &self.echo {
                let mut out = sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                out.write_all(line.as_bytes())?;
                out.flush()?;
            }
            captured.push_str(&line);
        }

        Ok(captured)
    }
}

impl Runner for ShellRunner {
    fn run(&self, invocation: &Invocation) -> Result<Execution, ExecError> {
        let command = invocation.describe();
        let spawn_err = |source| ExecError::Spawn {
            command: command.clone(),
            source,
        };

        let (reader, writer) = pipe().map_err(spawn_err)?;
        let writer_clone = writer.try_clone().map_err(spawn_err)?;

        let mut cmd = self.create_base_command(invocation);
        cmd.stdout(writer).stderr(writer_clone);
        debug!(?cmd, "spawning");
        let mut child = cmd.spawn().map_err(spawn_err)?;
        // Our copies of the write end must go, or the read below never sees EOF.
        drop(cmd);

        let output = match self.stream_lines(reader) {
            Ok(output) => output,
            Err(source) => {
                reap(&mut child);
                return Err(ExecError::Output { command, source });
            }
        };
        let status = child.wait().map_err(|source| ExecError::Output {
            command: command.clone(),
            source,
        })?;

        let exit_code = exit_code(status);
        info!(%command, exit_code, "process finished");
        Ok(Execution { exit_code, output })
    }
}

/// Kills and waits for a child whose output can no longer be read.
fn reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(error = %e, "kill failed");
    }
    if let Err(e) = child.wait() {
        debug!(error = %e, "wait failed");
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        fs, thread,
        time::{Duration, Instant},
    };
    use tempfile::TempDir;

    /// Records each echoed chunk with the time it arrived.
    struct Recorder {
        started: Instant,
        writes: Vec<(Duration, Vec<u8>)>,
    }

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.writes.push((self.started.elapsed(), buf.to_vec()));
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn setup() -> (ShellRunner, TempDir) {
        let tmp_dir = TempDir::new().expect("Failed to create temp dir");
        let runner = ShellRunner::new(tmp_dir.path().to_path_buf(), Elevation::Never).quiet();
        (runner, tmp_dir)
    }

    fn command(line: &str) -> Invocation {
        Invocation::Command(line.to_string())
    }

    #[test]
    fn test_run_successful_command() {
        let (runner, _tmp_dir) = setup();
        let execution = runner.run(&command("echo hello")).unwrap();
        assert!(execution.success());
        assert_eq!(execution.output, "hello\n");
    }

    #[test]
    fn test_run_failing_command_keeps_code() {
        let (runner, _tmp_dir) = setup();
        let execution = runner.run(&command("echo oops; exit 3")).unwrap();
        assert!(!execution.success());
        assert_eq!(execution.exit_code, 3);
        assert_eq!(execution.output, "oops\n");
    }

    #[test]
    fn test_run_merges_stderr() {
        let (runner, _tmp_dir) = setup();
        let execution = runner
            .run(&command("echo out; echo err 1>&2; echo again"))
            .unwrap();
        assert_eq!(execution.output, "out\nerr\nagain\n");
    }

    #[test]
    fn test_run_captures_unterminated_last_line() {
        let (runner, _tmp_dir) = setup();
        let execution = runner.run(&command("printf 'a\\nb'")).unwrap();
        assert_eq!(execution.output, "a\nb");
    }

    #[test]
    fn test_run_echoes_lines_as_they_arrive() {
        let tmp_dir = TempDir::new().expect("Failed to create temp dir");
        let started = Instant::now();
        let recorder = Arc::new(Mutex::new(Recorder {
            started,
            writes: Vec::new(),
        }));
        let runner = ShellRunner::new(tmp_dir.path().to_path_buf(), Elevation::Never)
            .with_echo(recorder.clone());

        let execution = runner.run(&command("echo a; sleep 0.3; echo b")).unwrap();
        let finished = started.elapsed();

        let recorder = recorder.lock().unwrap();
        let (first_at, first) = &recorder.writes[0];
        assert_eq!(first, b"a\n");
        assert!(finished - *first_at >= Duration::from_millis(200));

        let echoed: Vec<u8> = recorder
            .writes
            .iter()
            .flat_map(|(_, chunk)| chunk.iter().copied())
            .collect();
        assert_eq!(echoed, execution.output.as_bytes());
    }

    #[test]
    fn test_echo_failure_kills_child() {
        let tmp_dir = TempDir::new().expect("Failed to create temp dir");
        let runner = ShellRunner::new(tmp_dir.path().to_path_buf(), Elevation::Never)
            .with_echo(Arc::new(Mutex::new(BrokenPipe)));

        let result = runner.run(&command("echo a; sleep 1; touch late.txt"));
        assert!(matches!(result, Err(ExecError::Output { .. })));

        thread::sleep(Duration::from_millis(1500));
        assert!(!tmp_dir.path().join("late.txt").exists());
    }

    #[test]
    fn test_run_uses_current_dir() {
        let (runner, tmp_dir) = setup();
        runner.run(&command("touch marker.txt")).unwrap();
        assert!(tmp_dir.path().join("marker.txt").exists());
    }

    #[test]
    fn test_run_many_lines() {
        let (runner, _tmp_dir) = setup();
        let execution = runner
            .run(&command("i=0; while [ $i -lt 500 ]; do echo line$i; i=$((i+1)); done"))
            .unwrap();
        assert_eq!(execution.output.lines().count(), 500);
        assert!(execution.output.ends_with("line499\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_script_file() {
        use std::os::unix::fs::PermissionsExt;

        let (runner, tmp_dir) = setup();
        let path = tmp_dir.path().join("script.sh");
        fs::write(&path, "#!/bin/sh\necho from script\nexit 7\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

        let execution = runner.run(&Invocation::Script(path)).unwrap();
        assert_eq!(execution.exit_code, 7);
        assert_eq!(execution.output, "from script\n");
    }

    #[test]
    fn test_run_missing_script() {
        let (runner, tmp_dir) = setup();
        let result = runner.run(&Invocation::Script(tmp_dir.path().join("missing.sh")));
        assert!(matches!(result, Err(ExecError::Spawn { .. })));
    }

    #[test]
    fn test_elevation_policy() {
        assert!(Elevation::Always.wants_sudo());
        assert!(!Elevation::Never.wants_sudo());
        assert_eq!(Elevation::default(), Elevation::Auto);
    }

    #[test]
    fn test_sudo_prefix_for_scripts_only() {
        let runner = ShellRunner::new(PathBuf::from("."), Elevation::Always);
        let script = runner.create_base_command(&Invocation::Script(PathBuf::from("./x.sh")));
        assert_eq!(script.get_program(), "sudo");

        let line = runner.create_base_command(&command("apt-get update"));
        assert_eq!(line.get_program(), "sh");
    }
}
