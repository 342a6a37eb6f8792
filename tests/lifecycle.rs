//! Lifecycle integration: hook ordering, PID file handling, preflight.

use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, OnceLock};

use runner_forge::{DaemonError, DaemonResult, Process, Property, Service};

/// A name no other process on the machine carries in its command line.
fn unique_name(tag: &str) -> String {
    format!("forge-{}-{}", tag, std::process::id())
}

// execute() touches process-wide state (umask, environment); run one
// ritual at a time
fn gate() -> MutexGuard<'static, ()> {
    static GATE: OnceLock<Mutex<()>> = OnceLock::new();
    GATE.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Noop;

impl Service for Noop {
    fn run(&mut self, _process: &Process) -> DaemonResult<()> {
        Ok(())
    }
}

#[derive(Default)]
struct Recorder {
    calls: Vec<&'static str>,
    pid_path: PathBuf,
    final_during_after: Option<bool>,
    final_during_run: Option<bool>,
    pid_file_during_after: Option<bool>,
    pid_during_run: Option<String>,
}

impl Service for Recorder {
    fn before(&mut self, _process: &Process) -> DaemonResult<()> {
        self.calls.push("before");
        Ok(())
    }

    fn between(&mut self, _process: &Process) -> DaemonResult<()> {
        self.calls.push("between");
        Ok(())
    }

    fn after(&mut self, process: &Process) -> DaemonResult<()> {
        self.calls.push("after");
        self.final_during_after = Some(process.final_instance());
        self.pid_file_during_after = Some(self.pid_path.exists());
        Ok(())
    }

    fn run(&mut self, process: &Process) -> DaemonResult<()> {
        self.calls.push("run");
        self.final_during_run = Some(process.final_instance());
        self.pid_during_run = fs::read_to_string(&self.pid_path)
            .ok()
            .map(|text| text.trim().to_owned());
        Ok(())
    }
}

#[test]
fn hooks_run_in_order_without_forking() {
    let _guard = gate();
    let mut process = Process::new(&unique_name("plain")).unwrap();
    let mut recorder = Recorder::default();

    process.execute(&mut recorder).unwrap();

    assert_eq!(recorder.calls, ["before", "between", "after", "run"]);
    assert_eq!(recorder.final_during_after, Some(false));
    assert_eq!(recorder.final_during_run, Some(true));
    assert!(process.final_instance());
}

#[test]
fn pid_file_lives_exactly_as_long_as_run() {
    let _guard = gate();
    let scratch = tempfile::tempdir().unwrap();
    let pid_path = scratch.path().join("recorder.pid");

    let mut process = Process::new(&unique_name("pidfile")).unwrap();
    process
        .set(Property::PidFile, pid_path.to_str().unwrap())
        .unwrap();
    process.enable(Property::PidFile);

    let mut recorder = Recorder {
        pid_path: pid_path.clone(),
        ..Recorder::default()
    };
    process.execute(&mut recorder).unwrap();

    assert_eq!(recorder.calls, ["before", "between", "after", "run"]);
    assert_eq!(recorder.pid_file_during_after, Some(true));
    assert_eq!(
        recorder.pid_during_run.as_deref(),
        Some(std::process::id().to_string().as_str())
    );
    assert!(!pid_path.exists());
}

#[test]
fn preflight_flags_a_live_pid() {
    let _guard = gate();
    let scratch = tempfile::tempdir().unwrap();
    let pid_path = scratch.path().join("busy.pid");
    fs::write(&pid_path, std::process::id().to_string()).unwrap();

    let mut process = Process::new(&unique_name("busy")).unwrap();
    process
        .set(Property::PidFile, pid_path.to_str().unwrap())
        .unwrap();
    process.enable(Property::PidFile);

    let err = process.execute(&mut Noop).unwrap_err();
    assert!(matches!(err, DaemonError::Busy(_)));

    // the ritual never got far enough to touch the file
    assert_eq!(
        fs::read_to_string(&pid_path).unwrap(),
        std::process::id().to_string()
    );
}

#[test]
fn preflight_accepts_a_stale_pid() {
    let _guard = gate();
    let scratch = tempfile::tempdir().unwrap();
    let pid_path = scratch.path().join("stale.pid");
    // far beyond any default pid_max, so nothing alive answers for it
    fs::write(&pid_path, "3999999").unwrap();

    let mut process = Process::new(&unique_name("stale")).unwrap();
    process
        .set(Property::PidFile, pid_path.to_str().unwrap())
        .unwrap();
    process.enable(Property::PidFile);

    process.execute(&mut Noop).unwrap();
    assert!(!pid_path.exists());
}

#[test]
fn preflight_treats_garbage_pids_as_busy() {
    let _guard = gate();
    let scratch = tempfile::tempdir().unwrap();
    let pid_path = scratch.path().join("garbage.pid");
    fs::write(&pid_path, "not-a-pid").unwrap();

    let mut process = Process::new(&unique_name("garbage")).unwrap();
    process
        .set(Property::PidFile, pid_path.to_str().unwrap())
        .unwrap();
    process.enable(Property::PidFile);

    // an unparseable PID reads as 0, and signal 0 to the own process
    // group always answers; the file has to be cleaned up by an operator
    let err = process.execute(&mut Noop).unwrap_err();
    assert!(matches!(err, DaemonError::Busy(_)));
}

#[test]
fn execute_is_single_shot() {
    let _guard = gate();
    let mut process = Process::new(&unique_name("once")).unwrap();
    process.execute(&mut Noop).unwrap();

    let err = process.execute(&mut Noop).unwrap_err();
    assert!(matches!(err, DaemonError::InvalidArgument(_)));
}

#[test]
fn failing_before_aborts_the_ritual() {
    let _guard = gate();
    struct Refusing {
        calls: Vec<&'static str>,
    }

    impl Service for Refusing {
        fn before(&mut self, _process: &Process) -> DaemonResult<()> {
            self.calls.push("before");
            Err(DaemonError::InvalidArgument(String::from("not today")))
        }

        fn between(&mut self, _process: &Process) -> DaemonResult<()> {
            self.calls.push("between");
            Ok(())
        }

        fn run(&mut self, _process: &Process) -> DaemonResult<()> {
            self.calls.push("run");
            Ok(())
        }
    }

    let scratch = tempfile::tempdir().unwrap();
    let pid_path = scratch.path().join("refused.pid");

    let mut process = Process::new(&unique_name("refused")).unwrap();
    process
        .set(Property::PidFile, pid_path.to_str().unwrap())
        .unwrap();
    process.enable(Property::PidFile);

    let mut refusing = Refusing { calls: Vec::new() };
    let err = process.execute(&mut refusing).unwrap_err();
    assert!(matches!(err, DaemonError::InvalidArgument(_)));

    assert_eq!(refusing.calls, ["before"]);
    assert!(!pid_path.exists());
    assert!(!process.final_instance());
}
