use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use libc::{c_int, c_void, siginfo_t};
use nix::unistd::Uid;

use runner_forge::signal::{self, Handler, Policy};
use runner_forge::syslog::{self, Level};
use runner_forge::{DaemonError, DaemonResult, Process, Property, Service};

static STOP: AtomicBool = AtomicBool::new(false);

/// SIGTERM flips the flag; the main cycle drains and leaves.
struct Shutdown;

impl Handler for Shutdown {
    fn signal(&self) -> c_int {
        libc::SIGTERM
    }

    fn policy(&self) -> Policy {
        Policy::Terminate
    }

    fn handle(&self, _signal: c_int, _info: *mut siginfo_t, _context: *mut c_void) {
        STOP.store(true, Ordering::SeqCst);
    }
}

struct Sentinel;

impl Service for Sentinel {
    fn before(&mut self, _process: &Process) -> DaemonResult<()> {
        syslog::log(Level::Info, "Call before() ...");
        Ok(())
    }

    fn between(&mut self, _process: &Process) -> DaemonResult<()> {
        syslog::log(Level::Info, "Call between() ...");
        Ok(())
    }

    fn after(&mut self, _process: &Process) -> DaemonResult<()> {
        signal::install(Box::new(Shutdown))
    }

    fn run(&mut self, process: &Process) -> DaemonResult<()> {
        syslog::log(
            Level::Info,
            &format!("{} is up; send SIGTERM to stop", process.name()),
        );

        while !STOP.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(500));
        }

        syslog::log(
            Level::Info,
            &format!(
                "stopping after {} SIGTERM deliveries",
                signal::stat(libc::SIGTERM).call_count
            ),
        );
        Ok(())
    }
}

fn main() {
    let argv0 = env::args().next().unwrap_or_else(|| String::from("sentinel"));

    let result = Process::new(&argv0).and_then(|mut process| {
        process.set(Property::Description, "Sentinel sample daemon")?;
        process.set(Property::Syslog, "sentinel")?;
        process.enable(Property::Syslog);
        process.enable(Property::Trace);
        process.set(Property::PidFile, "/tmp/sentinel.pid")?;
        process.enable(Property::PidFile);

        // identity switch needs root or CAP_SETUID
        if Uid::effective().is_root() {
            process.set(Property::User, "daemon")?;
            process.set(Property::Group, "daemon")?;
            process.enable(Property::User);
            process.enable(Property::Group);
        }

        process.enable(Property::Daemon);
        process.execute(&mut Sentinel)
    });

    match result {
        Ok(()) => {}
        Err(DaemonError::Busy(message)) => {
            eprintln!("Already running: {}", message);
            std::process::exit(1);
        }
        Err(error) => {
            eprintln!("Error: {}", error);
            std::process::exit(1);
        }
    }
}
