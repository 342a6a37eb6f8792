use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use runner_forge::{DaemonResult, Process, Property, Service};

struct Heartbeat {
    log_path: PathBuf,
}

impl Service for Heartbeat {
    fn run(&mut self, _process: &Process) -> DaemonResult<()> {
        // append so restarts keep the history
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        for beat in 0.. {
            writeln!(log, "[heartbeat] beat #{}", beat)?;
            thread::sleep(Duration::from_secs(3));
        }
        Ok(())
    }
}

fn main() {
    let pwd = env::current_dir().expect("no working directory");
    let log_path = pwd.join("heartbeat.log");
    let pid_path = pwd.join("heartbeat.pid");

    println!("Launching the heartbeat daemon...");
    println!("Watch heartbeat.log for activity; the PID is in {:?}.", pid_path);

    let argv0 = env::args().next().unwrap_or_else(|| String::from("heartbeat"));

    let result = Process::new(&argv0).and_then(|mut process| {
        process.set(Property::Description, "Heartbeat sample daemon")?;
        process.set(Property::PidFile, &pid_path.to_string_lossy())?;
        process.enable(Property::PidFile);
        process.set(Property::WorkingDirectory, &pwd.to_string_lossy())?;
        process.enable(Property::WorkingDirectory);
        process.enable(Property::Daemon);
        process.execute(&mut Heartbeat { log_path })
    });

    if let Err(error) = result {
        eprintln!("Error: {}", error);
        std::process::exit(1);
    }
}
