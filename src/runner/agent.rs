//! AgentRunner - runs one pipeline stage as a child process.
//!
//! stdout and stderr are drained through the stream multiplexer on the calling
//! task while keys are polled between reads. Stdin, when present, is written by
//! a separate task and then closed so a full pipe can never deadlock us.
//!
//! On unix each stage leads its own process group. Terminal Ctrl-C therefore
//! only reaches cycler, and pause, terminate and kill are sent to the whole
//! group so helpers the stage started are stopped with it.

use log::{debug, info, warn};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};

#[cfg(unix)]
use nix::sys::signal::{Signal, killpg};
#[cfg(unix)]
use nix::unistd::Pid;

use super::log_file::StageLog;
use super::spawn::SpawnConfig;
use crate::config::{DEFAULT_SURFACE_MARKERS, EmptyOutputPolicy, OptionsConfig};
use crate::domain::{Cycle, StageDefinition, StageFailure, StageOutcome, StageResult};
use crate::mux::{MuxEvent, SourceTag, StreamMultiplexer};
use crate::presenter::{AgentLine, KeyCommand, LineKind, Presenter, Tone};

/// Classify a stdout line: lifecycle lines are surfaced, the rest only logged.
pub fn classify_line(text: &str, markers: &[String]) -> LineKind {
    let lower = text.to_lowercase();
    if markers.iter().any(|m| lower.contains(m.as_str())) {
        LineKind::Lifecycle
    } else {
        LineKind::Detail
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub poll_interval: Duration,
    pub empty_output: EmptyOutputPolicy,
    /// Lowercased lifecycle markers
    pub surface_markers: Vec<String>,
    /// How long a SIGTERMed child gets before SIGKILL
    pub terminate_grace: Duration,
    /// How long to keep reading after the child exited while pipes stay open
    pub exit_drain_grace: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            empty_output: EmptyOutputPolicy::Accept,
            surface_markers: DEFAULT_SURFACE_MARKERS.iter().map(|s| s.to_string()).collect(),
            terminate_grace: Duration::from_secs(5),
            exit_drain_grace: Duration::from_secs(1),
        }
    }
}

impl RunnerConfig {
    pub fn from_options(options: &OptionsConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(options.poll_interval_ms.max(1)),
            empty_output: options.empty_output,
            surface_markers: options.surface_markers.iter().map(|m| m.to_lowercase()).collect(),
            ..Default::default()
        }
    }
}

/// Signal the stage's process group. The child is the group leader, so the
/// group id is its pid.
#[cfg(unix)]
fn signal_group(child: &Child, signal: Signal) {
    if let Some(pid) = child.id() {
        if let Err(e) = killpg(Pid::from_raw(pid as i32), signal) {
            warn!("Failed to send {} to process group {}: {}", signal, pid, e);
        }
    }
}

/// SIGKILL the group, then kill and reap the leader.
async fn force_kill(child: &mut Child) {
    #[cfg(unix)]
    signal_group(child, Signal::SIGKILL);
    if let Err(e) = child.kill().await {
        debug!("kill after group SIGKILL: {}", e);
    }
}

/// True when the output path is missing, an empty file, or an empty directory.
fn output_is_empty(path: &Path) -> bool {
    if path.is_dir() {
        return std::fs::read_dir(path).map(|mut d| d.next().is_none()).unwrap_or(true);
    }
    std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true)
}

fn describe_status(status: &ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit {}", code),
        None => "killed by signal".to_string(),
    }
}

pub struct AgentRunner {
    config: RunnerConfig,
}

impl AgentRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Run one stage to completion, failure, or operator cancellation.
    pub async fn run(
        &self,
        cycle: Cycle,
        stage: &StageDefinition,
        spawn: SpawnConfig,
        log_path: &Path,
        presenter: &mut dyn Presenter,
    ) -> StageOutcome {
        let name = stage.name.as_str();
        let failed = |failure: StageFailure| StageOutcome::Failed {
            stage: stage.name.clone(),
            failure,
        };

        let mut log = match StageLog::open(log_path, name, &spawn.display()) {
            Ok(log) => log,
            Err(e) => {
                presenter.log_main(Tone::Error, &format!("[{}] cannot open log {}: {}", name, log_path.display(), e));
                return failed(StageFailure::Io(e.to_string()));
            }
        };

        info!("Starting stage {} (cycle {}): {}", name, cycle, spawn.display());
        presenter.log_main(Tone::Info, &format!("Initiating {}...", name));

        let mut cmd = Command::new(&spawn.program);
        cmd.args(&spawn.args)
            .current_dir(&spawn.cwd)
            .envs(&spawn.env)
            .stdin(if spawn.stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let msg = format!("[{}] executable not found: {}", name, spawn.program);
                presenter.log_main(Tone::Error, &msg);
                log.finish(name, &msg);
                return failed(StageFailure::MissingExecutable(spawn.program.clone()));
            }
            Err(e) => {
                let msg = format!("[{}] failed to spawn {}: {}", name, spawn.program, e);
                presenter.log_main(Tone::Error, &msg);
                log.finish(name, &msg);
                return failed(StageFailure::Spawn(e.to_string()));
            }
        };

        if let (Some(input), Some(mut stdin)) = (spawn.stdin, child.stdin.take()) {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&input).await {
                    debug!("stdin write ended early: {}", e);
                }
                // dropping closes the pipe
            });
        }

        let mut mux = StreamMultiplexer::new(self.config.poll_interval);
        if let Some(stdout) = child.stdout.take() {
            mux.add_source(SourceTag::Stdout, stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            mux.add_source(SourceTag::Stderr, stderr);
        }

        presenter.set_status(cycle, Some(name), false);
        presenter.activity_started(&format!("Running {}...", name));

        let mut stdout_lines = Vec::new();
        let mut stderr = String::new();
        let mut paused = false;
        let mut exited_at: Option<Instant> = None;

        let status = loop {
            let event = match mux.next_event(&mut *presenter).await {
                Ok(event) => event,
                Err(e) => {
                    warn!("key polling failed: {}", e);
                    MuxEvent::Idle
                }
            };

            match event {
                MuxEvent::Chunk(chunk) => {
                    log.write_raw(&chunk.data);
                    let text = chunk.text();
                    let kind = match chunk.source {
                        SourceTag::Stdout => {
                            stdout_lines.push(text.clone());
                            classify_line(&text, &self.config.surface_markers)
                        }
                        SourceTag::Stderr => {
                            stderr.push_str(&String::from_utf8_lossy(&chunk.data));
                            LineKind::Stderr
                        }
                    };
                    presenter.log_agent(&AgentLine {
                        stage: name.to_string(),
                        text,
                        kind,
                        color: stage.color.clone(),
                    });
                }
                MuxEvent::Key(KeyCommand::Pause) => {
                    paused = !paused;
                    #[cfg(unix)]
                    signal_group(&child, if paused { Signal::SIGSTOP } else { Signal::SIGCONT });
                    let state = if paused { "paused" } else { "resumed" };
                    info!("Stage {} {}", name, state);
                    presenter.log_main(Tone::Warning, &format!("[{}] {}", name, state));
                    presenter.set_status(cycle, Some(name), paused);
                }
                MuxEvent::Key(KeyCommand::Interrupt) => {
                    presenter.activity_finished();
                    warn!("Interrupt requested during stage {}", name);
                    let outcome = self.terminate(&mut child, paused, presenter).await;
                    log.finish(name, if outcome == StageOutcome::Killed { "killed" } else { "interrupted" });
                    return outcome;
                }
                MuxEvent::Key(KeyCommand::Kill) => {
                    presenter.activity_finished();
                    warn!("Kill requested during stage {}", name);
                    let outcome = self.kill(&mut child).await;
                    log.finish(name, "killed");
                    return outcome;
                }
                MuxEvent::Idle => {
                    presenter.activity_tick();
                    match exited_at {
                        None => {
                            if let Ok(Some(_)) = child.try_wait() {
                                exited_at = Some(Instant::now());
                            }
                        }
                        Some(at) if at.elapsed() >= self.config.exit_drain_grace => {
                            debug!("stage {} exited but its pipes stayed open, closing", name);
                            mux.close();
                        }
                        Some(_) => {}
                    }
                }
                // keys were polled by next_event, so a stage that closed its
                // pipes but keeps running can still be paused or stopped
                MuxEvent::Drained => match child.try_wait() {
                    Ok(Some(status)) => break status,
                    Ok(None) => {
                        presenter.activity_tick();
                        tokio::time::sleep(self.config.poll_interval).await;
                    }
                    Err(e) => {
                        presenter.activity_finished();
                        presenter.log_main(Tone::Error, &format!("[{}] wait failed: {}", name, e));
                        log.finish(name, "wait failed");
                        return failed(StageFailure::Io(e.to_string()));
                    }
                },
            }
        };
        presenter.activity_finished();
        log.finish(name, &describe_status(&status));
        info!("Stage {} finished: {}", name, describe_status(&status));

        if !status.success() {
            let failure = match status.code() {
                Some(code) => StageFailure::ExitCode(code),
                None => StageFailure::Signal,
            };
            presenter.log_main(Tone::Error, &format!("[{}] ERROR: {}", name, failure));
            if !stderr.trim().is_empty() {
                presenter.log_main(Tone::Error, &format!("[{}] --- stderr ---", name));
                for line in stderr.trim_end().lines() {
                    presenter.log_main(Tone::Error, &format!("[{}] {}", name, line));
                }
            }
            return failed(failure);
        }

        if output_is_empty(&stage.output) {
            match self.config.empty_output {
                EmptyOutputPolicy::Accept => {
                    warn!("Stage {} produced no output at {}", name, stage.output.display());
                    presenter.log_main(
                        Tone::Warning,
                        &format!("[{}] no output at {} (accepted)", name, stage.output.display()),
                    );
                }
                EmptyOutputPolicy::Reject => {
                    let failure = StageFailure::EmptyOutput(stage.output.clone());
                    presenter.log_main(Tone::Error, &format!("[{}] ERROR: {}", name, failure));
                    return failed(failure);
                }
            }
        }

        presenter.log_main(Tone::Success, &format!("[{}] completed", name));
        StageOutcome::Succeeded(StageResult {
            stage: stage.name.clone(),
            exit_code: status.code(),
            stdout_lines,
            stderr,
            log_path: log.path().to_path_buf(),
        })
    }

    /// SIGTERM, give the child a grace period, then SIGKILL.
    ///
    /// A kill key during the grace period short-circuits to an immediate kill.
    async fn terminate(&self, child: &mut Child, paused: bool, presenter: &mut dyn Presenter) -> StageOutcome {
        #[cfg(unix)]
        {
            signal_group(child, Signal::SIGTERM);
            if paused {
                signal_group(child, Signal::SIGCONT);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = paused;
            let _ = child.start_kill();
        }

        let deadline = Instant::now() + self.config.terminate_grace;
        while Instant::now() < deadline {
            match child.try_wait() {
                Ok(Some(_)) => return StageOutcome::Cancelled,
                Ok(None) => {}
                Err(e) => {
                    warn!("try_wait failed during terminate: {}", e);
                    break;
                }
            }
            if let Ok(Some(KeyCommand::Kill)) = presenter.poll_key() {
                return self.kill(child).await;
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }

        warn!("Child ignored SIGTERM, sending SIGKILL");
        force_kill(child).await;
        StageOutcome::Cancelled
    }

    async fn kill(&self, child: &mut Child) -> StageOutcome {
        force_kill(child).await;
        StageOutcome::Killed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::ScriptedPresenter;
    use crate::workspace::Workspace;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn markers() -> Vec<String> {
        DEFAULT_SURFACE_MARKERS.iter().map(|s| s.to_string()).collect()
    }

    fn fast_config() -> RunnerConfig {
        RunnerConfig {
            poll_interval: Duration::from_millis(10),
            terminate_grace: Duration::from_millis(500),
            ..Default::default()
        }
    }

    fn stage_with(dir: &Path, script: &str, output: &str) -> (StageDefinition, SpawnConfig) {
        let path = dir.join("stage.sh");
        fs::write(&path, script).unwrap();
        let stage = StageDefinition {
            name: "builder".to_string(),
            command: vec!["sh".to_string(), path.to_string_lossy().into_owned()],
            input: dir.join("in"),
            output: dir.join(output),
            stdin: None,
            color: None,
        };
        let spawn = SpawnConfig::for_stage(&stage, &Workspace::new(dir), Cycle::FIRST, None).unwrap();
        (stage, spawn)
    }

    fn read_pid(path: &Path) -> Option<i32> {
        fs::read_to_string(path).ok()?.trim().parse().ok()
    }

    /// Scheduler state letter from /proc, e.g. 'S', 'T' or 'Z'.
    #[cfg(unix)]
    fn process_state(pid: i32) -> Option<char> {
        let stat = fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
        stat.rsplit_once(')')?.1.trim_start().chars().next()
    }

    /// Alive and not yet a zombie.
    #[cfg(unix)]
    fn is_running(pid: i32) -> bool {
        nix::sys::signal::kill(Pid::from_raw(pid), None).is_ok() && process_state(pid) != Some('Z')
    }

    #[test]
    fn test_classify_line() {
        assert_eq!(classify_line("-- Processing Briq: a.md --", &markers()), LineKind::Lifecycle);
        assert_eq!(classify_line("  - Wrote Briq: x.md", &markers()), LineKind::Lifecycle);
        assert_eq!(classify_line("some chatter", &markers()), LineKind::Detail);
    }

    #[test]
    fn test_output_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(output_is_empty(&dir.path().join("missing")));
        assert!(output_is_empty(dir.path()));
        fs::write(dir.path().join("f"), "x").unwrap();
        assert!(!output_is_empty(dir.path()));
        assert!(!output_is_empty(&dir.path().join("f")));
    }

    #[tokio::test]
    async fn test_success_logs_and_surfaces() {
        let dir = TempDir::new().unwrap();
        let (stage, spawn) = stage_with(
            dir.path(),
            "echo \"Processing cycle $CYCLE_NUM\"\necho chatter\necho warn >&2\necho done > \"$2\"\n",
            "out.md",
        );
        let log_path = dir.path().join("logs/cycle1_builder.log");
        let mut presenter = ScriptedPresenter::new();

        let outcome = AgentRunner::new(fast_config())
            .run(Cycle::FIRST, &stage, spawn, &log_path, &mut presenter)
            .await;

        let StageOutcome::Succeeded(result) = outcome else {
            panic!("expected success, got {:?}", outcome);
        };
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.stdout_lines, vec!["Processing cycle 1", "chatter"]);
        assert_eq!(result.stderr, "warn\n");

        let log = fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("Processing cycle 1\n"));
        assert!(log.contains("chatter\n"));
        assert!(log.contains("warn\n"));

        let lifecycle: Vec<&AgentLine> = presenter
            .agent_lines
            .iter()
            .filter(|l| l.kind == LineKind::Lifecycle)
            .collect();
        assert_eq!(lifecycle.len(), 1);
        assert_eq!(lifecycle[0].text, "Processing cycle 1");
    }

    #[tokio::test]
    async fn test_nonzero_exit_dumps_stderr() {
        let dir = TempDir::new().unwrap();
        let (stage, spawn) = stage_with(dir.path(), "echo 'ERROR: disk full' >&2\nexit 1\n", "out.md");
        let log_path = dir.path().join("cycle1_builder.log");
        let mut presenter = ScriptedPresenter::new();

        let outcome = AgentRunner::new(fast_config())
            .run(Cycle::FIRST, &stage, spawn, &log_path, &mut presenter)
            .await;

        assert_eq!(
            outcome,
            StageOutcome::Failed {
                stage: "builder".to_string(),
                failure: StageFailure::ExitCode(1)
            }
        );
        assert!(fs::read_to_string(&log_path).unwrap().contains("ERROR: disk full\n"));
        assert!(presenter.main_text().contains("[builder] ERROR: disk full"));
    }

    #[tokio::test]
    async fn test_missing_executable_is_distinct() {
        let dir = TempDir::new().unwrap();
        let stage = StageDefinition {
            name: "planner".to_string(),
            command: vec!["./does-not-exist.sh".to_string()],
            input: PathBuf::from("in"),
            output: PathBuf::from("out"),
            stdin: None,
            color: None,
        };
        let spawn = SpawnConfig::for_stage(&stage, &Workspace::new(dir.path()), Cycle::FIRST, None).unwrap();
        let mut presenter = ScriptedPresenter::new();

        let outcome = AgentRunner::new(fast_config())
            .run(Cycle::FIRST, &stage, spawn, &dir.path().join("p.log"), &mut presenter)
            .await;

        assert!(matches!(
            outcome,
            StageOutcome::Failed {
                failure: StageFailure::MissingExecutable(_),
                ..
            }
        ));
        assert!(presenter.main_text().contains("executable not found"));
    }

    #[tokio::test]
    async fn test_empty_output_policy() {
        let dir = TempDir::new().unwrap();
        let (stage, spawn) = stage_with(dir.path(), "echo nothing written\n", "never.md");

        let mut presenter = ScriptedPresenter::new();
        let accepted = AgentRunner::new(fast_config())
            .run(Cycle::FIRST, &stage, spawn.clone(), &dir.path().join("a.log"), &mut presenter)
            .await;
        assert!(accepted.is_success());

        let reject = RunnerConfig {
            empty_output: EmptyOutputPolicy::Reject,
            ..fast_config()
        };
        let rejected = AgentRunner::new(reject)
            .run(Cycle::FIRST, &stage, spawn, &dir.path().join("b.log"), &mut presenter)
            .await;
        assert!(matches!(
            rejected,
            StageOutcome::Failed {
                failure: StageFailure::EmptyOutput(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_stdin_is_fed_and_closed() {
        let dir = TempDir::new().unwrap();
        let (stage, mut spawn) = stage_with(dir.path(), "cat > \"$2\"\n", "out.md");
        // larger than a pipe buffer
        spawn.stdin = Some(vec![b'x'; 256 * 1024]);
        let mut presenter = ScriptedPresenter::new();

        let outcome = AgentRunner::new(fast_config())
            .run(Cycle::FIRST, &stage, spawn, &dir.path().join("s.log"), &mut presenter)
            .await;

        assert!(outcome.is_success());
        assert_eq!(fs::metadata(dir.path().join("out.md")).unwrap().len(), 256 * 1024);
    }

    #[tokio::test]
    async fn test_interrupt_cancels_running_stage() {
        let dir = TempDir::new().unwrap();
        let (stage, spawn) = stage_with(dir.path(), "echo started\nsleep 30\n", "out.md");
        let mut presenter = ScriptedPresenter::new().with_key_after(5, KeyCommand::Interrupt);

        let started = Instant::now();
        let outcome = AgentRunner::new(fast_config())
            .run(Cycle::FIRST, &stage, spawn, &dir.path().join("i.log"), &mut presenter)
            .await;

        assert_eq!(outcome, StageOutcome::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_stage_holding_no_pipes_can_still_be_stopped() {
        let dir = TempDir::new().unwrap();
        let script = "echo started\nexec >/dev/null 2>&1\nsleep 30\n";

        let (stage, spawn) = stage_with(dir.path(), script, "out.md");
        let mut presenter = ScriptedPresenter::new().with_key_after(20, KeyCommand::Interrupt);
        let started = Instant::now();
        let outcome = AgentRunner::new(fast_config())
            .run(Cycle::FIRST, &stage, spawn, &dir.path().join("d1.log"), &mut presenter)
            .await;
        assert_eq!(outcome, StageOutcome::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(5));

        let (stage, spawn) = stage_with(dir.path(), script, "out.md");
        let mut presenter = ScriptedPresenter::new().with_key_after(20, KeyCommand::Kill);
        let started = Instant::now();
        let outcome = AgentRunner::new(fast_config())
            .run(Cycle::FIRST, &stage, spawn, &dir.path().join("d2.log"), &mut presenter)
            .await;
        assert_eq!(outcome, StageOutcome::Killed);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_exited_stage_with_open_pipes_finishes_after_grace() {
        let dir = TempDir::new().unwrap();
        let pid_file = dir.path().join("pid");
        let script = format!("echo $$ > {}\nsleep 30 &\necho done > \"$2\"\n", pid_file.display());
        let (stage, spawn) = stage_with(dir.path(), &script, "out.md");
        let mut presenter = ScriptedPresenter::new();

        let started = Instant::now();
        let outcome = AgentRunner::new(fast_config())
            .run(Cycle::FIRST, &stage, spawn, &dir.path().join("g.log"), &mut presenter)
            .await;
        let elapsed = started.elapsed();

        // the background sleep is still alive in the stage's group
        #[cfg(unix)]
        {
            if let Some(pid) = read_pid(&pid_file) {
                let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
            }
        }

        assert!(outcome.is_success(), "got {:?}", outcome);
        assert!(elapsed >= RunnerConfig::default().exit_drain_grace);
        assert!(elapsed < Duration::from_secs(5), "took {:?}", elapsed);
    }

    #[cfg(unix)]
    mod process_control {
        use super::*;
        use crate::domain::ReqapDocument;
        use crate::error::Result;
        use crate::presenter::KeySource;
        use crate::signals::{InterruptCounter, InterruptKeys};

        /// What the stage process looked like at one key poll.
        #[derive(Debug)]
        struct Observation {
            key: Option<KeyCommand>,
            pid: Option<i32>,
            pgid: Option<i32>,
            state: Option<char>,
        }

        /// Scripted presenter that inspects the stage process on every key
        /// poll. The stage script writes its pid to `pid_file`.
        struct ChildWatch {
            inner: ScriptedPresenter,
            signals: Option<InterruptKeys>,
            pid_file: PathBuf,
            seen: Vec<Observation>,
        }

        impl ChildWatch {
            fn new(inner: ScriptedPresenter, pid_file: PathBuf) -> Self {
                Self {
                    inner,
                    signals: None,
                    pid_file,
                    seen: Vec::new(),
                }
            }

            fn states_between(&self, from: usize, to: usize) -> Vec<char> {
                self.seen[from + 1..to].iter().filter_map(|o| o.state).collect()
            }

            fn key_index(&self, key: KeyCommand, nth: usize) -> usize {
                self.seen
                    .iter()
                    .enumerate()
                    .filter(|(_, o)| o.key == Some(key))
                    .nth(nth)
                    .map(|(i, _)| i)
                    .unwrap()
            }
        }

        impl KeySource for ChildWatch {
            fn poll_key(&mut self) -> Result<Option<KeyCommand>> {
                let mut key = match self.signals.as_mut() {
                    Some(signals) => signals.poll_key()?,
                    None => None,
                };
                if key.is_none() {
                    key = self.inner.poll_key()?;
                }
                let pid = read_pid(&self.pid_file);
                self.seen.push(Observation {
                    key,
                    pid,
                    pgid: pid.and_then(|p| nix::unistd::getpgid(Some(Pid::from_raw(p))).ok().map(Pid::as_raw)),
                    state: pid.and_then(process_state),
                });
                Ok(key)
            }
        }

        impl Presenter for ChildWatch {
            fn log_main(&mut self, tone: Tone, text: &str) {
                self.inner.log_main(tone, text);
            }

            fn log_agent(&mut self, line: &AgentLine) {
                self.inner.log_agent(line);
            }

            fn show_review(&mut self, cycle: Cycle, doc: &ReqapDocument) {
                self.inner.show_review(cycle, doc);
            }

            fn prompt_blocking(&mut self, prompt: &str) -> Result<String> {
                self.inner.prompt_blocking(prompt)
            }

            fn suspend_for_editor(&mut self, editor: &str, path: &Path) -> Result<()> {
                self.inner.suspend_for_editor(editor, path)
            }
        }

        fn pid_script(pid_file: &Path, body: &str) -> String {
            format!("echo $$ > {}\n{}", pid_file.display(), body)
        }

        #[tokio::test]
        async fn test_stage_leads_its_own_process_group() {
            let dir = TempDir::new().unwrap();
            let pid_file = dir.path().join("pid");
            let (stage, spawn) = stage_with(dir.path(), &pid_script(&pid_file, "echo started\nsleep 30\n"), "out.md");
            let mut watch = ChildWatch::new(ScriptedPresenter::new().with_key_after(30, KeyCommand::Kill), pid_file);

            let outcome = AgentRunner::new(fast_config())
                .run(Cycle::FIRST, &stage, spawn, &dir.path().join("pg.log"), &mut watch)
                .await;
            assert_eq!(outcome, StageOutcome::Killed);

            let ours = nix::unistd::getpgrp().as_raw();
            let observed = watch
                .seen
                .iter()
                .find_map(|o| Some((o.pid?, o.pgid?)))
                .expect("stage pid was never observed");
            assert_eq!(observed.0, observed.1, "stage is not a group leader");
            assert_ne!(observed.1, ours, "stage shares the runner's process group");
        }

        #[tokio::test]
        async fn test_sigint_interrupts_stage_instead_of_failing_it() {
            let dir = TempDir::new().unwrap();
            let pid_file = dir.path().join("pid");
            let (stage, spawn) = stage_with(dir.path(), &pid_script(&pid_file, "echo started\nsleep 30\n"), "out.md");
            let mut watch = ChildWatch::new(ScriptedPresenter::new(), pid_file);
            watch.signals = Some(InterruptKeys::new(InterruptCounter::listen().unwrap()));

            tokio::spawn(async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                nix::sys::signal::kill(Pid::this(), Signal::SIGINT).unwrap();
            });

            let outcome = AgentRunner::new(fast_config())
                .run(Cycle::FIRST, &stage, spawn, &dir.path().join("int.log"), &mut watch)
                .await;
            assert_eq!(outcome, StageOutcome::Cancelled);
        }

        #[cfg(target_os = "linux")]
        #[tokio::test]
        async fn test_pause_stops_and_resumes_stage() {
            let dir = TempDir::new().unwrap();
            let pid_file = dir.path().join("pid");
            let (stage, spawn) = stage_with(dir.path(), &pid_script(&pid_file, "echo started\nsleep 30\n"), "out.md");
            let keys = ScriptedPresenter::new()
                .with_key_after(10, KeyCommand::Pause)
                .with_key_after(25, KeyCommand::Pause)
                .with_key_after(40, KeyCommand::Interrupt);
            let mut watch = ChildWatch::new(keys, pid_file);

            let outcome = AgentRunner::new(fast_config())
                .run(Cycle::FIRST, &stage, spawn, &dir.path().join("p.log"), &mut watch)
                .await;
            assert_eq!(outcome, StageOutcome::Cancelled);

            let paused = watch.key_index(KeyCommand::Pause, 0);
            let resumed = watch.key_index(KeyCommand::Pause, 1);
            let interrupted = watch.key_index(KeyCommand::Interrupt, 0);
            assert!(watch.states_between(paused, resumed).contains(&'T'));
            assert!(watch.states_between(resumed, interrupted).iter().any(|s| *s != 'T'));
            assert!(watch.inner.main_text().contains("[builder] paused"));
            assert!(watch.inner.main_text().contains("[builder] resumed"));
        }

        #[tokio::test]
        async fn test_interrupt_while_paused_continues_the_stage() {
            let dir = TempDir::new().unwrap();
            let pid_file = dir.path().join("pid");
            let (stage, spawn) = stage_with(dir.path(), &pid_script(&pid_file, "echo started\nsleep 30\n"), "out.md");
            let keys = ScriptedPresenter::new()
                .with_key_after(10, KeyCommand::Pause)
                .with_key_after(20, KeyCommand::Interrupt);
            let mut watch = ChildWatch::new(keys, pid_file);
            // a stopped group would sit out the whole grace before SIGKILL
            let config = RunnerConfig {
                terminate_grace: Duration::from_secs(10),
                ..fast_config()
            };

            let started = Instant::now();
            let outcome = AgentRunner::new(config)
                .run(Cycle::FIRST, &stage, spawn, &dir.path().join("pi.log"), &mut watch)
                .await;
            assert_eq!(outcome, StageOutcome::Cancelled);
            assert!(started.elapsed() < Duration::from_secs(5), "took {:?}", started.elapsed());
        }

        #[tokio::test]
        async fn test_ignored_sigterm_escalates_to_sigkill() {
            let dir = TempDir::new().unwrap();
            let pid_file = dir.path().join("pid");
            let (stage, spawn) = stage_with(
                dir.path(),
                &pid_script(&pid_file, "trap '' TERM\necho started\nsleep 30\n"),
                "out.md",
            );
            let mut watch = ChildWatch::new(ScriptedPresenter::new().with_key_after(5, KeyCommand::Interrupt), pid_file);
            let config = fast_config();
            let grace = config.terminate_grace;

            let started = Instant::now();
            let outcome = AgentRunner::new(config)
                .run(Cycle::FIRST, &stage, spawn, &dir.path().join("t.log"), &mut watch)
                .await;
            let elapsed = started.elapsed();

            assert_eq!(outcome, StageOutcome::Cancelled);
            assert!(elapsed >= grace, "returned before the grace period: {:?}", elapsed);
            assert!(elapsed < grace + Duration::from_secs(3), "took {:?}", elapsed);
            let pid = watch.seen.iter().find_map(|o| o.pid).unwrap();
            assert!(!is_running(pid), "stage {} survived escalation", pid);
        }

        #[tokio::test]
        async fn test_kill_leaves_no_child() {
            let dir = TempDir::new().unwrap();
            let pid_file = dir.path().join("pid");
            let helper_file = dir.path().join("helper");
            let script = format!(
                "echo $$ > {}\ntrap '' TERM\nsleep 30 &\necho $! > {}\nwait\n",
                pid_file.display(),
                helper_file.display()
            );
            let (stage, spawn) = stage_with(dir.path(), &script, "out.md");
            let mut presenter = ScriptedPresenter::new().with_key_after(20, KeyCommand::Kill);

            let outcome = AgentRunner::new(fast_config())
                .run(Cycle::FIRST, &stage, spawn, &dir.path().join("k.log"), &mut presenter)
                .await;
            assert_eq!(outcome, StageOutcome::Killed);

            let pid = read_pid(&pid_file).unwrap();
            assert!(!is_running(pid), "child {} still exists after kill", pid);

            // the background helper dies with its group
            let helper = read_pid(&helper_file).unwrap();
            let deadline = Instant::now() + Duration::from_secs(2);
            while is_running(helper) && Instant::now() < deadline {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            assert!(!is_running(helper), "helper {} outlived the stage", helper);
        }
    }
}
