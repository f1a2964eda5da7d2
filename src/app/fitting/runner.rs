//! Fitting runner
//!
//! Top-level driver for one fitting run. Owns the selected strategy and the
//! active subprocess, and is advanced by an external `tick()` like the setup
//! coordinator: every tick drains queued log lines, publishes progress, and
//! reacts to process exit. Nothing here blocks.

use std::path::PathBuf;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::app::command::build_argv;
use crate::app::fitting::strategy::{
    ContinuousStrategy, FitStrategy, SingleStepStrategy, StrategyAction, StrategyContext,
};
use crate::app::models::{find_config, requires_continuous_fitting, ConfigInfo, FitState};
use crate::app::process::{FitterProcess, LogSink};
use crate::app::progress::{self, ExecutionState};
use crate::constants::{fitting, ticks};
use crate::errors::{FittingError, FittingResult};

/// Notifications published to the embedding UI layer
#[derive(Debug, Clone, PartialEq)]
pub enum FitEvent {
    /// One log line from the subprocess (stderr lines carry an `ERROR: ` tag)
    Log(String),
    /// Short human-readable status text
    Status(String),
    /// The active step changed
    StepChanged { current: u32, total: u32 },
    /// Combined progress across all steps
    Progress { overall: f32, detail: Option<String> },
    /// Observable state changed; consumers should re-query
    StateChanged,
}

/// Fixed locations of the provisioned toolchain pieces
#[derive(Debug, Clone)]
pub struct FitterEnvironment {
    /// Blender executable
    pub executable: PathBuf,
    /// Fitter core entry script
    pub script_path: PathBuf,
    /// Base scene the core loads before importing meshes
    pub base_scene_path: PathBuf,
    /// Directory finished meshes land in
    pub output_dir: PathBuf,
}

/// Drives one fitting run at a time
pub struct FittingRunner {
    environment: FitterEnvironment,
    configs: Vec<ConfigInfo>,
    state: FitState,
    strategy: Option<Box<dyn FitStrategy>>,
    process: Option<FitterProcess>,
    sink: LogSink,
    events: Option<UnboundedSender<FitEvent>>,
    last_summary: Option<String>,
    last_output: Option<PathBuf>,
}

impl FittingRunner {
    pub fn new(environment: FitterEnvironment, configs: Vec<ConfigInfo>) -> Self {
        Self {
            environment,
            configs,
            state: FitState::default(),
            strategy: None,
            process: None,
            sink: LogSink::new(),
            events: None,
            last_summary: None,
            last_output: None,
        }
    }

    /// Replace the event subscription, dropping any previous receiver's feed
    pub fn subscribe(&mut self) -> UnboundedReceiver<FitEvent> {
        let (tx, rx) = unbounded_channel();
        self.events = Some(tx);
        rx
    }

    pub fn is_fitting(&self) -> bool {
        self.strategy.is_some()
    }

    pub fn execution_state(&self) -> ExecutionState {
        ExecutionState::derive(self.is_fitting(), self.last_summary.as_deref())
    }

    pub fn last_run_summary(&self) -> Option<&str> {
        self.last_summary.as_deref()
    }

    pub fn last_output_path(&self) -> Option<&PathBuf> {
        self.last_output.as_ref()
    }

    /// Begin a run for `state`, selecting the strategy once
    ///
    /// Fails when a run is already active or neither referenced
    /// configuration resolves.
    pub fn execute(&mut self, state: FitState) -> FittingResult<()> {
        if self.is_fitting() {
            return Err(FittingError::AlreadyRunning);
        }

        let known = find_config(&self.configs, &state.source_config_path).is_some()
            || find_config(&self.configs, &state.target_config_path).is_some();
        if !known {
            return Err(FittingError::ConfigNotFound {
                path: state.source_config_path.clone(),
            });
        }

        let continuous = requires_continuous_fitting(&state, &self.configs);
        let mut strategy: Box<dyn FitStrategy> = if continuous {
            Box::new(ContinuousStrategy::new())
        } else {
            Box::new(SingleStepStrategy::new())
        };
        info!(continuous, "starting fitting run");

        self.state = state;
        self.last_summary = None;
        self.last_output = None;
        self.sink = LogSink::new();

        let action = strategy.start(&Self::context(&self.environment, &self.state, &self.configs));
        self.strategy = Some(strategy);
        self.apply(action)
    }

    /// Advance the run: drain logs, publish progress, react to exit
    pub fn tick(&mut self) -> FittingResult<()> {
        if self.strategy.is_none() {
            return Ok(());
        }

        self.drain_logs();

        let exited = match self.process.as_mut() {
            Some(process) => process.try_wait()?,
            None => None,
        };
        if let Some(success) = exited {
            // The readers may still be flushing the last lines. Hold the
            // exit open until the pipes are drained so the summary never
            // precedes the subprocess's own final output.
            if let Some(process) = &self.process {
                if !process.output_flushed() {
                    return Ok(());
                }
            }
            debug!(success, "fitter process exited");
            self.process = None;
            self.drain_logs();

            let Some(mut strategy) = self.strategy.take() else {
                return Ok(());
            };
            let action = strategy.on_process_exited(
                success,
                &Self::context(&self.environment, &self.state, &self.configs),
            );
            self.strategy = Some(strategy);
            self.apply(action)?;
        }
        Ok(())
    }

    /// Kill the active subprocess and end the run as cancelled
    pub async fn cancel(&mut self) {
        if self.strategy.is_none() {
            return;
        }
        if let Some(mut process) = self.process.take() {
            process.kill().await;
        }
        self.drain_logs();
        self.finish(false, fitting::SUMMARY_CANCELLED.to_string());
    }

    /// Tick until the run reaches a terminal state
    pub async fn run_to_completion(&mut self) -> FittingResult<()> {
        while self.is_fitting() {
            self.tick()?;
            tokio::time::sleep(ticks::TICK_INTERVAL).await;
        }
        Ok(())
    }

    fn context<'a>(
        environment: &'a FitterEnvironment,
        state: &'a FitState,
        configs: &'a [ConfigInfo],
    ) -> StrategyContext<'a> {
        StrategyContext {
            state,
            configs,
            script_path: environment.script_path.to_str().unwrap_or_default(),
            base_scene_path: environment.base_scene_path.to_str().unwrap_or_default(),
            output_dir: &environment.output_dir,
        }
    }

    fn apply(&mut self, action: StrategyAction) -> FittingResult<()> {
        match action {
            StrategyAction::Launch { args, status } => {
                let argv = match build_argv(&args) {
                    Ok(argv) => argv,
                    Err(e) => {
                        warn!(error = %e, "rejected fitter command arguments");
                        self.finish(false, format!("Failed: {}", e));
                        return Err(e.into());
                    }
                };
                let program = self.environment.executable.display().to_string();
                let process = match FitterProcess::spawn(&program, &argv, self.sink.clone()) {
                    Ok(process) => process,
                    Err(e) => {
                        warn!(error = %e, "failed to launch fitter process");
                        self.finish(false, format!("Failed: {}", e));
                        return Err(e.into());
                    }
                };
                self.process = Some(process);

                if let Some(strategy) = &self.strategy {
                    self.emit(FitEvent::StepChanged {
                        current: strategy.current_step(),
                        total: strategy.total_steps(),
                    });
                }
                self.emit(FitEvent::Status(status));
                self.emit(FitEvent::StateChanged);
                Ok(())
            }
            StrategyAction::Finish { success, summary } => {
                self.finish(success, summary);
                Ok(())
            }
        }
    }

    fn finish(&mut self, success: bool, summary: String) {
        if success {
            if let Some(strategy) = &self.strategy {
                self.last_output = strategy.final_output().map(|p| p.to_path_buf());
            }
        }
        self.strategy = None;
        self.process = None;
        info!(success, %summary, "fitting run finished");

        self.emit(FitEvent::Log(format!("\n[System] {}", summary)));
        self.emit(FitEvent::Status(summary.clone()));
        self.emit(FitEvent::StateChanged);
        self.last_summary = Some(summary);
    }

    fn drain_logs(&mut self) {
        for line in self.sink.drain() {
            let sample = progress::parse(&line);
            self.emit(FitEvent::Log(line));
            if sample.has_update {
                if let Some(strategy) = &self.strategy {
                    let overall = strategy.overall_progress(sample.step_fraction);
                    self.emit(FitEvent::Progress {
                        overall,
                        detail: sample.detail,
                    });
                }
            }
        }
    }

    fn emit(&self, event: FitEvent) {
        // A dropped receiver just means nobody is listening right now.
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::AvatarInfo;
    use std::time::Duration;

    /// Stand-in for the Blender binary: a script that ignores its flags
    fn fake_blender(dir: &std::path::Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-blender");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn environment(dir: &std::path::Path, executable: PathBuf) -> FitterEnvironment {
        FitterEnvironment {
            executable,
            script_path: dir.join("core.py"),
            base_scene_path: dir.join("base.blend"),
            output_dir: dir.to_path_buf(),
        }
    }

    fn single_config(dir: &std::path::Path) -> ConfigInfo {
        ConfigInfo {
            config_path: "pair.json".to_string(),
            display_name: "Pair".to_string(),
            base_avatar: AvatarInfo {
                name: "Astra".to_string(),
                default_mesh_path: dir.join("astra.fbx").display().to_string(),
                ..Default::default()
            },
            clothing_avatar: AvatarInfo {
                name: "Coat".to_string(),
                default_mesh_path: dir.join("coat.fbx").display().to_string(),
                ..Default::default()
            },
            init_pose_path: dir.join("init.json").display().to_string(),
            ..Default::default()
        }
    }

    fn state() -> FitState {
        FitState {
            source_config_path: "pair.json".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_execute_rejects_unknown_config() {
        let tmp = tempfile::tempdir().unwrap();
        let executable = fake_blender(tmp.path(), "exit 0");
        let mut runner = FittingRunner::new(environment(tmp.path(), executable), Vec::new());
        let result = runner.execute(state());
        assert!(matches!(result, Err(FittingError::ConfigNotFound { .. })));
        assert_eq!(runner.execution_state(), ExecutionState::Idle);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_terminal() {
        let tmp = tempfile::tempdir().unwrap();
        let env = environment(tmp.path(), PathBuf::from("/nonexistent/blender"));
        let mut runner = FittingRunner::new(env, vec![single_config(tmp.path())]);

        assert!(runner.execute(state()).is_err());
        assert!(!runner.is_fitting());
        assert_eq!(runner.execution_state(), ExecutionState::Error);
    }

    #[tokio::test]
    async fn test_invalid_arguments_end_the_run() {
        let tmp = tempfile::tempdir().unwrap();
        let executable = fake_blender(tmp.path(), "exit 0");
        let mut config = single_config(tmp.path());
        config.base_avatar.default_mesh_path = String::new();
        let mut runner =
            FittingRunner::new(environment(tmp.path(), executable), vec![config]);

        let result = runner.execute(state());
        assert!(matches!(result, Err(FittingError::Command(_))));
        assert!(!runner.is_fitting());
        assert_eq!(runner.execution_state(), ExecutionState::Error);

        // The failed run must not block the next attempt.
        let result = runner.execute(state());
        assert!(!matches!(result, Err(FittingError::AlreadyRunning)));
    }

    #[tokio::test]
    async fn test_last_output_line_precedes_summary() {
        let tmp = tempfile::tempdir().unwrap();
        let executable = fake_blender(
            tmp.path(),
            "echo 'Status: [fit] (1/1) exporting'\necho 'wrote scene to disk'",
        );
        let mut runner = FittingRunner::new(
            environment(tmp.path(), executable),
            vec![single_config(tmp.path())],
        );
        let mut events = runner.subscribe();

        runner.execute(state()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), runner.run_to_completion())
            .await
            .unwrap()
            .unwrap();

        let mut logs = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let FitEvent::Log(line) = event {
                logs.push(line);
            }
        }
        let last_line = logs
            .iter()
            .position(|l| l == "wrote scene to disk")
            .expect("final line delivered");
        let summary = logs
            .iter()
            .position(|l| l.contains("[System]"))
            .expect("summary delivered");
        assert!(last_line < summary);
    }

    #[tokio::test]
    async fn test_single_step_run_completes_and_reports() {
        let tmp = tempfile::tempdir().unwrap();
        let executable = fake_blender(
            tmp.path(),
            "echo 'Status: [fit] (1/2) posing'\necho 'Status: [fit] (2/2) exporting'",
        );
        let mut runner = FittingRunner::new(
            environment(tmp.path(), executable),
            vec![single_config(tmp.path())],
        );
        let mut events = runner.subscribe();

        runner.execute(state()).unwrap();
        assert!(runner.is_fitting());
        assert_eq!(runner.execution_state(), ExecutionState::Processing);
        assert!(runner.execute(state()).is_err());

        tokio::time::timeout(Duration::from_secs(5), runner.run_to_completion())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(runner.execution_state(), ExecutionState::Completed);
        assert_eq!(runner.last_run_summary(), Some(fitting::SUMMARY_SUCCESS));
        assert!(runner.last_output_path().is_some());

        let mut saw_state_change = false;
        let mut saw_summary_log = false;
        let mut last_progress = -1.0f32;
        while let Ok(event) = events.try_recv() {
            match event {
                FitEvent::StateChanged => saw_state_change = true,
                FitEvent::Log(line) if line.contains("[System]") => saw_summary_log = true,
                FitEvent::Progress { overall, .. } => {
                    assert!(overall >= last_progress);
                    last_progress = overall;
                }
                _ => {}
            }
        }
        assert!(saw_state_change);
        assert!(saw_summary_log);
        assert_eq!(last_progress, 1.0);
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_error_summary() {
        let tmp = tempfile::tempdir().unwrap();
        let executable = fake_blender(tmp.path(), "echo 'boom' >&2\nexit 2");
        let mut runner = FittingRunner::new(
            environment(tmp.path(), executable),
            vec![single_config(tmp.path())],
        );
        let mut events = runner.subscribe();

        runner.execute(state()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), runner.run_to_completion())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(runner.execution_state(), ExecutionState::Error);
        assert_eq!(runner.last_run_summary(), Some(fitting::SUMMARY_EXIT_ERROR));
        assert!(runner.last_output_path().is_none());

        let mut saw_tagged_stderr = false;
        while let Ok(event) = events.try_recv() {
            if let FitEvent::Log(line) = event {
                if line == "ERROR: boom" {
                    saw_tagged_stderr = true;
                }
            }
        }
        assert!(saw_tagged_stderr);
    }

    #[tokio::test]
    async fn test_cancel_mid_run_reports_cancelled() {
        let tmp = tempfile::tempdir().unwrap();
        let executable = fake_blender(tmp.path(), "sleep 30");
        let mut runner = FittingRunner::new(
            environment(tmp.path(), executable),
            vec![single_config(tmp.path())],
        );

        runner.execute(state()).unwrap();
        runner.cancel().await;

        assert!(!runner.is_fitting());
        assert_eq!(runner.last_run_summary(), Some(fitting::SUMMARY_CANCELLED));
        assert_eq!(runner.execution_state(), ExecutionState::Idle);
    }

    #[tokio::test]
    async fn test_continuous_run_chains_two_invocations() {
        let tmp = tempfile::tempdir().unwrap();
        // Writes whatever path follows --output so step 2 finds step 1's file.
        let executable = fake_blender(
            tmp.path(),
            r#"prev=""
for arg in "$@"; do
  if [ "$prev" = "--output" ]; then echo fbx > "$arg"; fi
  prev="$arg"
done"#,
        );
        let source = ConfigInfo {
            config_path: "source.json".to_string(),
            display_name: "CoatSource".to_string(),
            base_avatar: AvatarInfo {
                name: "Template".to_string(),
                default_mesh_path: tmp.path().join("template.fbx").display().to_string(),
                ..Default::default()
            },
            clothing_avatar: AvatarInfo {
                name: "Coat".to_string(),
                default_mesh_path: tmp.path().join("coat.fbx").display().to_string(),
                ..Default::default()
            },
            init_pose_path: tmp.path().join("init.json").display().to_string(),
            ..Default::default()
        };
        let target = ConfigInfo {
            config_path: "target.json".to_string(),
            display_name: "AstraTarget".to_string(),
            base_avatar: AvatarInfo {
                name: "Astra".to_string(),
                default_mesh_path: tmp.path().join("astra.fbx").display().to_string(),
                ..Default::default()
            },
            clothing_avatar: AvatarInfo {
                name: "Template".to_string(),
                default_mesh_path: tmp.path().join("template.fbx").display().to_string(),
                ..Default::default()
            },
            init_pose_path: tmp.path().join("init.json").display().to_string(),
            ..Default::default()
        };
        let mut runner =
            FittingRunner::new(environment(tmp.path(), executable), vec![source, target]);
        let mut events = runner.subscribe();

        runner
            .execute(FitState {
                source_config_path: "source.json".to_string(),
                target_config_path: "target.json".to_string(),
                ..Default::default()
            })
            .unwrap();
        tokio::time::timeout(Duration::from_secs(10), runner.run_to_completion())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(runner.execution_state(), ExecutionState::Completed);
        let output = runner.last_output_path().unwrap();
        assert!(output.is_file());
        assert!(output
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("CoatSource_to_AstraTarget_"));

        let mut steps = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let FitEvent::StepChanged { current, total } = event {
                steps.push((current, total));
            }
        }
        assert_eq!(steps, vec![(1, 2), (2, 2)]);
    }
}
