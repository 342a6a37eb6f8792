//! # runner-forge
//!
//! **runner-forge** turns a long-running program into a well-behaved
//! UNIX/Linux service: it verifies no prior instance is running,
//! rearranges capabilities and credentials, performs the double-fork /
//! setsid / descriptor / umask ritual, writes and removes the PID
//! file, and drives a user-supplied [`Service`] lifecycle in a fixed
//! order, cooperating with a process-wide [`signal`] controller around
//! the forks.
//!
//! ```no_run
//! use runner_forge::{DaemonResult, Process, Property, Service};
//!
//! struct Widget;
//!
//! impl Service for Widget {
//!     fn run(&mut self, _process: &Process) -> DaemonResult<()> {
//!         // main loop
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> DaemonResult<()> {
//!     let argv0 = std::env::args().next().unwrap_or_default();
//!     let mut process = Process::new(&argv0)?;
//!     process.set(Property::PidFile, "/run/widget/widget.pid")?;
//!     process.enable(Property::PidFile);
//!     process.enable(Property::Daemon);
//!     process.execute(&mut Widget)
//! }
//! ```

pub mod credentials;
pub mod signal;
pub mod syslog;

mod error;
mod process;

// Re-export public types to keep the API flat
pub use error::{DaemonError, DaemonResult};
pub use process::{find_all_by_name, find_by_name, Process, Property, Service};
