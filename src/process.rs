//! The daemonization state machine.
//!
//! A [`Process`] carries the configuration surface (flags, identity,
//! paths, syslog label) and [`Process::execute`] walks the ordered
//! ritual: preflight, capability and credential switch, double fork,
//! terminal detach, PID file, then the user's [`Service`] hooks.

use std::env;
use std::ffi::CString;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use caps::{CapSet, Capability, CapsHashSet};
use libc::{c_int, c_void, siginfo_t};
use nix::sys::signal::kill;
use nix::sys::stat::{umask, Mode};
use nix::sys::wait::{waitpid, WaitPidFlag};
use nix::unistd::{self, fork, setsid, ForkResult, Gid, Pid, Uid, User};

use crate::credentials;
use crate::error::{DaemonError, DaemonResult};
use crate::signal;
use crate::syslog::{self, Level};

/// The closed set of configurable properties.
///
/// `Daemon`, `Cgroup` and `Trace` are flag-only and react to
/// [`Process::enable`]/[`Process::disable`]; the rest carry a string
/// value through [`Process::set`]. `User` and `Group` double as flags:
/// the value names the target account, the flag requests the switch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Property {
    Description,
    Daemon,
    User,
    Group,
    WorkingDirectory,
    PidFile,
    Syslog,
    Cgroup,
    Trace,
}

/// The user-supplied lifecycle.
///
/// `before` runs with the caller's identity, `between` after the
/// session switch, `after` in the final instance once the PID file is
/// in place, and `run` is the main loop. Every hook may veto the
/// ritual by returning an error.
pub trait Service {
    /// Called before any capability or identity change.
    fn before(&mut self, process: &Process) -> DaemonResult<()> {
        let _ = process;
        Ok(())
    }

    /// Called between the two forks, after the new session exists.
    fn between(&mut self, process: &Process) -> DaemonResult<()> {
        let _ = process;
        Ok(())
    }

    /// Called in the final instance, after the PID file is written.
    fn after(&mut self, process: &Process) -> DaemonResult<()> {
        let _ = process;
        Ok(())
    }

    /// The service main loop.
    fn run(&mut self, process: &Process) -> DaemonResult<()>;
}

/// Gives SIGCHLD a real handler across the fork window. SIG_IGN would
/// let the kernel auto-reap the child and make waitpid fail with
/// ECHILD on some kernels; delivery itself needs no action.
struct ChildSentinel;

impl signal::Handler for ChildSentinel {
    fn signal(&self) -> c_int {
        libc::SIGCHLD
    }

    fn flags(&self) -> c_int {
        libc::SA_RESTART
    }

    fn handle(&self, _signal: c_int, _info: *mut siginfo_t, _context: *mut c_void) {}
}

/// Daemonizer configuration and state machine.
pub struct Process {
    name: String,
    description: String,

    f_trace: bool,
    f_daemon: bool,
    f_user_change: bool,
    f_group_change: bool,
    f_cwd_change: bool,
    f_pid_file: bool,
    f_syslog: bool,
    f_cgroup: bool,

    uid: Uid,
    user: String,
    gid: Gid,
    group: String,

    syslog_label: String,
    working_directory: String,
    pid_path: String,

    switch_complete: bool,
    executed: bool,
}

impl Process {
    /// Creates a process description from `argv[0]`; everything after
    /// the final `/` becomes the instance name used by the preflight
    /// collision probe.
    pub fn new(program: &str) -> DaemonResult<Self> {
        let name = match program.rfind('/') {
            Some(cut) => program[cut + 1..].to_owned(),
            None => program.to_owned(),
        };

        let uid = Uid::current();
        let user = credentials::uid_to_name(uid)?;
        let gid = Gid::current();
        let group = credentials::gid_to_name(gid)?;

        Ok(Process {
            name,
            description: String::from("Default process"),
            f_trace: false,
            f_daemon: false,
            f_user_change: false,
            f_group_change: false,
            f_cwd_change: false,
            f_pid_file: false,
            f_syslog: false,
            f_cgroup: false,
            uid,
            user,
            gid,
            group,
            syslog_label: String::from("DMN"),
            working_directory: String::new(),
            pid_path: String::new(),
            switch_complete: false,
            executed: false,
        })
    }

    /// The purified instance name (basename of `argv[0]`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True only in the process that completed the whole ritual and
    /// owns the PID file; forked ancestors keep `false`.
    pub fn final_instance(&self) -> bool {
        self.switch_complete
    }

    /// Raises a flag. Enabling `Syslog` opens the connection with the
    /// current label immediately.
    pub fn enable(&mut self, property: Property) {
        match property {
            Property::Trace => self.f_trace = true,
            Property::Daemon => self.f_daemon = true,
            Property::User => self.f_user_change = true,
            Property::Group => self.f_group_change = true,
            Property::WorkingDirectory => self.f_cwd_change = true,
            Property::PidFile => self.f_pid_file = true,
            Property::Syslog => {
                self.f_syslog = true;
                syslog::open(&self.syslog_label);
                self.trace(Level::Info, "Start logging ...");
            }
            Property::Cgroup => self.f_cgroup = true,
            Property::Description => {}
        }
    }

    /// Clears a flag. Disabling `Syslog` closes the connection.
    pub fn disable(&mut self, property: Property) {
        match property {
            Property::Trace => self.f_trace = false,
            Property::Daemon => self.f_daemon = false,
            Property::User => self.f_user_change = false,
            Property::Group => self.f_group_change = false,
            Property::WorkingDirectory => self.f_cwd_change = false,
            Property::PidFile => self.f_pid_file = false,
            Property::Syslog => {
                self.f_syslog = false;
                syslog::close();
            }
            Property::Cgroup => self.f_cgroup = false,
            Property::Description => {}
        }
    }

    /// `enable` or `disable` depending on `value`.
    pub fn toggle(&mut self, property: Property, value: bool) {
        if value {
            self.enable(property);
        } else {
            self.disable(property);
        }
    }

    /// Current flag state; `Description` has no flag and reads false.
    pub fn status(&self, property: Property) -> bool {
        match property {
            Property::Trace => self.f_trace,
            Property::Daemon => self.f_daemon,
            Property::User => self.f_user_change,
            Property::Group => self.f_group_change,
            Property::WorkingDirectory => self.f_cwd_change,
            Property::PidFile => self.f_pid_file,
            Property::Syslog => self.f_syslog,
            Property::Cgroup => self.f_cgroup,
            Property::Description => false,
        }
    }

    /// Assigns a value. `User`/`Group` resolve the name eagerly and
    /// fail on unknown accounts; flag-only properties ignore the value.
    pub fn set(&mut self, property: Property, value: &str) -> DaemonResult<()> {
        match property {
            Property::Description => {
                self.description = value.to_owned();
                self.trace(Level::Debug, &format!("Set name to \"{}\"", value));
            }
            Property::User => {
                self.uid = credentials::name_to_uid(value)?;
                self.user = value.to_owned();
                self.trace(
                    Level::Debug,
                    &format!("Set user name to \"{}\" (id: {})", self.user, self.uid),
                );
            }
            Property::Group => {
                self.gid = credentials::name_to_gid(value)?;
                self.group = value.to_owned();
                self.trace(
                    Level::Debug,
                    &format!("Set group name to \"{}\" (id: {})", self.group, self.gid),
                );
            }
            Property::WorkingDirectory => {
                self.working_directory = value.to_owned();
                self.trace(
                    Level::Debug,
                    &format!("Set working directory to \"{}\"", value),
                );
            }
            Property::PidFile => {
                self.pid_path = value.to_owned();
                self.trace(Level::Debug, &format!("Set PID file name to \"{}\"", value));
            }
            Property::Syslog => {
                self.syslog_label = value.to_owned();
                self.trace(Level::Debug, &format!("Change label to \"{}\"", value));
            }
            Property::Daemon | Property::Cgroup | Property::Trace => {}
        }
        Ok(())
    }

    /// Reads a value back; flag-only properties yield `None`.
    pub fn get(&self, property: Property) -> Option<String> {
        match property {
            Property::Description => Some(self.description.clone()),
            Property::User => Some(self.user.clone()),
            Property::Group => Some(self.group.clone()),
            Property::WorkingDirectory => Some(self.working_directory.clone()),
            Property::PidFile => Some(self.pid_path.clone()),
            Property::Syslog => Some(self.syslog_label.clone()),
            Property::Daemon | Property::Cgroup | Property::Trace => None,
        }
    }

    /// Runs the full daemonization ritual and the service lifecycle.
    ///
    /// In daemon mode the calling process and the intermediate child
    /// return `Ok(())` with [`Process::final_instance`] still false;
    /// only the grand-child proceeds into `run`. A second call on the
    /// same instance is an error.
    pub fn execute(&mut self, service: &mut dyn Service) -> DaemonResult<()> {
        if self.executed {
            return Err(DaemonError::InvalidArgument(String::from(
                "execute() already ran on this process",
            )));
        }
        self.executed = true;

        if self.f_syslog {
            syslog::open(&self.syslog_label);
            self.trace(Level::Info, "Start logging ...");
        }

        self.is_service_up()?;

        if self.f_pid_file {
            if let Some(cut) = self.pid_path.rfind('/') {
                if cut > 0 {
                    let parent = self.pid_path[..cut].to_owned();
                    self.trace(
                        Level::Debug,
                        &format!("Create directory \"{}\" if required ...", parent),
                    );
                    credentials::create_directory(&parent, self.uid, self.gid)?;
                }
            }
        }

        service.before(self)?;

        self.set_capabilities();
        self.set_credentials()?;
        self.change_working_directory()?;

        if self.f_daemon {
            if self.fork_once()? {
                return Ok(());
            }

            self.detach_terminal()?;

            self.trace(Level::Info, "Starting new session ...");
            setsid().map_err(|errno| DaemonError::from_errno("setsid", errno))?;
        }

        self.in_between();

        service.between(self)?;

        if self.f_daemon && self.fork_once()? {
            return Ok(());
        }

        self.write_pid()?;

        service.after(self)?;

        self.trace(Level::Info, "Initialization complete!");
        self.switch_complete = true;

        let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Ready]);

        self.trace(Level::Info, "Starting main cycle ...");
        service.run(self)?;
        self.trace(Level::Info, "Main cycle complete!");

        self.remove_pid();
        Ok(())
    }

    fn trace(&self, level: Level, message: &str) {
        if self.f_syslog && self.f_trace {
            syslog::log(level, message);
        }
    }

    fn note(&self, level: Level, message: &str) {
        if self.f_syslog {
            syslog::log(level, message);
        }
    }

    /// Preflight: the PID file liveness probe and the /proc collision
    /// scan must both come back clean.
    fn is_service_up(&self) -> DaemonResult<()> {
        if self.f_pid_file && Path::new(&self.pid_path).exists() {
            let mut file = File::open(&self.pid_path).map_err(|e| {
                self.note(Level::Err, &format!("open({}): {}", self.pid_path, e));
                DaemonError::Io(e)
            })?;

            let mut buffer = [0u8; 64];
            let count = file.read(&mut buffer).map_err(|e| {
                self.note(Level::Err, &format!("read({}): {}", self.pid_path, e));
                DaemonError::Io(e)
            })?;

            let pid = parse_pid(&buffer[..count]);
            self.trace(Level::Debug, &format!("Querying PID {} ...", pid));

            match kill(Pid::from_raw(pid), None) {
                Ok(()) => {
                    let message = format!("Process {} exists", pid);
                    self.note(Level::Alert, &message);
                    return Err(DaemonError::Busy(message));
                }
                Err(nix::errno::Errno::ESRCH) => {}
                Err(errno) => {
                    self.note(Level::Err, &format!("kill({}, 0): {}", pid, errno));
                    return Err(DaemonError::from_errno("kill", errno));
                }
            }
        }

        self.trace(
            Level::Debug,
            &format!("Check if the process with the name {} does exist", self.name),
        );

        if let Some(pid) = find_by_name(&self.name)? {
            let message = format!("Identical process {} exists. Please, stop it first", pid);
            self.note(Level::Alert, &message);
            return Err(DaemonError::Busy(message));
        }

        Ok(())
    }

    /// Best-effort capability setup: keep only SETUID/SETGID for the
    /// upcoming identity switch. On any failure the sets are cleared
    /// and the ritual continues; privileges then drop naturally with
    /// the switch itself.
    fn set_capabilities(&self) {
        self.trace(Level::Debug, "Setting up capabilities ...");

        let result = (|| -> Result<(), caps::errors::CapsError> {
            caps::read(None, CapSet::Effective)?;

            let mut retained = CapsHashSet::new();
            retained.insert(Capability::CAP_SETUID);
            retained.insert(Capability::CAP_SETGID);

            caps::clear(None, CapSet::Bounding)?;
            caps::clear(None, CapSet::Inheritable)?;
            caps::set(None, CapSet::Permitted, &retained)?;
            caps::set(None, CapSet::Effective, &retained)?;
            Ok(())
        })();

        if let Err(error) = result {
            self.note(Level::Err, &error.to_string());
            clear_capabilities();
        }

        self.trace(Level::Debug, "Capabilities set.");
    }

    fn set_credentials(&self) -> DaemonResult<()> {
        if !self.f_user_change {
            self.note(Level::Info, "User switch disabled!");
            return Ok(());
        }

        let euid = Uid::effective();
        let euser = credentials::uid_to_name(euid)?;
        let egid = Gid::effective();
        let egroup = credentials::gid_to_name(egid)?;

        self.trace(
            Level::Debug,
            &format!(
                "Switch user EUID: {}({}), UID: {}({}), EGID: {}({}), GID: {}({}).",
                self.user, self.uid, euser, euid, self.group, self.gid, egroup, egid
            ),
        );

        if self.uid == euid {
            self.note(
                Level::Info,
                "Trying to switch to the same user. Credentials are kept as is.",
            );
            return Ok(());
        }

        let has_setuid =
            caps::has_cap(None, CapSet::Effective, Capability::CAP_SETUID).unwrap_or(false);

        if !Uid::current().is_root() && !has_setuid {
            self.note(
                Level::Info,
                &format!(
                    "Not enough credentials to switch to user \"{}\" and group \"{}\"",
                    self.user, self.group
                ),
            );
            return Ok(());
        }

        if has_setuid {
            // capability path: clears the sets and re-raises on failure
            if let Err(error) = self.change_id() {
                self.trace(Level::Err, &error.to_string());
                clear_capabilities();
                return Err(error);
            }
        } else {
            // traditional root path
            if Gid::current().as_raw() == 0 {
                unistd::setgid(self.gid)
                    .map_err(|errno| DaemonError::from_errno("setgid", errno))?;
                self.trace(
                    Level::Info,
                    &format!("Setting up group/ID: {} ({})", self.group, self.gid),
                );

                let user_name = CString::new(self.user.as_str()).map_err(|_| {
                    DaemonError::InvalidArgument(String::from("user name contains NUL"))
                })?;
                unistd::initgroups(&user_name, self.gid)
                    .map_err(|errno| DaemonError::from_errno("initgroups", errno))?;
                self.trace(
                    Level::Info,
                    &format!("Initializing all groups for the user {}", self.user),
                );

                unistd::setegid(self.gid)
                    .map_err(|errno| DaemonError::from_errno("setegid", errno))?;
                self.trace(
                    Level::Info,
                    &format!("Setting up effective group/ID: {} ({})", self.group, self.gid),
                );
            }

            if Uid::current().as_raw() == 0 {
                unistd::setuid(self.uid)
                    .map_err(|errno| DaemonError::from_errno("setuid", errno))?;
                self.trace(
                    Level::Info,
                    &format!("Setting up user/ID: {} ({})", self.user, self.uid),
                );

                unistd::seteuid(self.uid)
                    .map_err(|errno| DaemonError::from_errno("seteuid", errno))?;
                self.note(
                    Level::Info,
                    &format!("Setting up effective user/ID: {} ({})", self.user, self.uid),
                );
            }
        }

        let home = match User::from_uid(self.uid) {
            Ok(Some(user)) => user.dir,
            Ok(None) => {
                return Err(DaemonError::Lookup(format!(
                    "User id {} not found",
                    self.uid
                )))
            }
            Err(errno) => return Err(DaemonError::from_errno("getpwuid_r", errno)),
        };

        env::set_var("USER", &self.user);
        env::set_var("LOGNAME", &self.user);
        env::set_var("HOME", &home);

        self.trace(
            Level::Debug,
            "Successfully retaining privileges over UID switch",
        );
        Ok(())
    }

    /// Mirrors the libcap-ng change_id sequence: keep capabilities
    /// across the id switch, move gid, drop supplementary groups, move
    /// uid, then shed the switching capabilities. Whatever the kernel
    /// leaves in the effective set afterwards stays as it is.
    fn change_id(&self) -> DaemonResult<()> {
        let mut retained = CapsHashSet::new();
        retained.insert(Capability::CAP_SETUID);
        retained.insert(Capability::CAP_SETGID);

        caps::set(None, CapSet::Permitted, &retained)
            .map_err(|e| DaemonError::Capability(e.to_string()))?;
        caps::set(None, CapSet::Effective, &retained)
            .map_err(|e| DaemonError::Capability(e.to_string()))?;

        if unsafe { libc::prctl(libc::PR_SET_KEEPCAPS, 1, 0, 0, 0) } != 0 {
            return Err(DaemonError::syscall("prctl(PR_SET_KEEPCAPS)"));
        }

        unistd::setresgid(self.gid, self.gid, self.gid)
            .map_err(|errno| DaemonError::from_errno("setresgid", errno))?;
        unistd::setgroups(&[]).map_err(|errno| DaemonError::from_errno("setgroups", errno))?;
        unistd::setresuid(self.uid, self.uid, self.uid)
            .map_err(|errno| DaemonError::from_errno("setresuid", errno))?;

        unsafe { libc::prctl(libc::PR_SET_KEEPCAPS, 0, 0, 0, 0) };

        caps::drop(None, CapSet::Effective, Capability::CAP_SETUID)
            .map_err(|e| DaemonError::Capability(e.to_string()))?;
        caps::drop(None, CapSet::Effective, Capability::CAP_SETGID)
            .map_err(|e| DaemonError::Capability(e.to_string()))?;
        caps::drop(None, CapSet::Permitted, Capability::CAP_SETUID)
            .map_err(|e| DaemonError::Capability(e.to_string()))?;
        caps::drop(None, CapSet::Permitted, Capability::CAP_SETGID)
            .map_err(|e| DaemonError::Capability(e.to_string()))?;

        Ok(())
    }

    fn change_working_directory(&self) -> DaemonResult<()> {
        if !self.f_cwd_change {
            return Ok(());
        }

        if unistd::chdir(Path::new(&self.working_directory)).is_err() {
            unistd::chdir("/").map_err(|errno| DaemonError::from_errno("chdir", errno))?;
        }
        Ok(())
    }

    /// One guarded fork. Returns true in the parent (the caller then
    /// unwinds out of the ritual) and false in the child.
    fn fork_once(&self) -> DaemonResult<bool> {
        signal::block_all()?;
        signal::install(Box::new(ChildSentinel))?;
        signal::unblock(libc::SIGCHLD)?;

        // SAFETY: the ritual is single-threaded; both sides only run
        // plain syscalls before returning to the caller.
        let forked = unsafe { fork() };

        match forked {
            Err(errno) => {
                signal::uninstall(libc::SIGCHLD);
                let _ = signal::unblock_all();
                Err(DaemonError::from_errno("fork", errno))
            }
            Ok(ForkResult::Parent { child }) => {
                // harvest immediate exits only; the child is on its own
                let harvest = waitpid(
                    child,
                    Some(WaitPidFlag::WUNTRACED | WaitPidFlag::WNOHANG | WaitPidFlag::WCONTINUED),
                );

                signal::uninstall(libc::SIGCHLD);
                signal::unblock_all()?;

                if let Err(errno) = harvest {
                    return Err(DaemonError::from_errno("waitpid", errno));
                }
                Ok(true)
            }
            Ok(ForkResult::Child) => {
                signal::uninstall(libc::SIGCHLD);
                signal::unblock_all()?;
                Ok(false)
            }
        }
    }

    fn detach_terminal(&self) -> DaemonResult<()> {
        reopen_null(libc::O_RDONLY, libc::STDIN_FILENO)?;
        reopen_null(libc::O_WRONLY, libc::STDOUT_FILENO)?;
        reopen_null(libc::O_WRONLY, libc::STDERR_FILENO)?;

        // everything above the standard trio goes
        let limit = unsafe { libc::sysconf(libc::_SC_OPEN_MAX) };
        let limit = if limit < 0 { 1024 } else { limit as c_int };
        for fd in 3..limit {
            unsafe { libc::close(fd) };
        }
        Ok(())
    }

    fn in_between(&self) {
        self.trace(Level::Info, "Setting mask 0077");
        umask(Mode::from_bits_truncate(0o077));

        if env::var_os("IFS").is_none() {
            env::set_var("IFS", " \t\n");
        }
        if env::var_os("PATH").is_none() {
            env::set_var("PATH", "/usr/local/sbin:/sbin:/bin:/usr/sbin:/usr/bin");
        }
    }

    fn write_pid(&self) -> DaemonResult<()> {
        if !self.f_pid_file || self.pid_path.is_empty() {
            self.note(Level::Warning, "PID file not set. Bypassing ...");
            return Ok(());
        }

        self.trace(Level::Info, &format!("Writing PID to {} ...", self.pid_path));

        let mut file = File::create(&self.pid_path).map_err(|e| {
            self.note(Level::Err, &format!("open({}, w): {}", self.pid_path, e));
            DaemonError::Io(e)
        })?;
        write!(file, "{}", std::process::id()).map_err(|e| {
            self.note(Level::Err, &format!("write({}): {}", self.pid_path, e));
            DaemonError::Io(e)
        })?;
        Ok(())
    }

    fn remove_pid(&self) {
        if self.f_pid_file && !self.pid_path.is_empty() {
            let _ = fs::remove_file(&self.pid_path);
        }
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        if self.f_syslog {
            syslog::close();
        }
    }
}

/// Rebinds `target` onto /dev/null: open, dup2, close the scratch
/// descriptor.
fn reopen_null(flags: c_int, target: c_int) -> DaemonResult<()> {
    let fd = unsafe { libc::open(b"/dev/null\0".as_ptr() as *const libc::c_char, flags) };
    if fd < 0 {
        return Err(DaemonError::syscall("open(/dev/null)"));
    }

    if unsafe { libc::dup2(fd, target) } < 0 {
        let error = DaemonError::syscall("dup2");
        unsafe { libc::close(fd) };
        return Err(error);
    }

    if fd != target {
        unsafe { libc::close(fd) };
    }
    Ok(())
}

fn clear_capabilities() {
    let empty = CapsHashSet::new();
    let _ = caps::set(None, CapSet::Effective, &empty);
    let _ = caps::set(None, CapSet::Permitted, &empty);
    let _ = caps::set(None, CapSet::Inheritable, &empty);
}

/// strtol-style: leading whitespace, then decimal digits, 0 on garbage.
fn parse_pid(bytes: &[u8]) -> i32 {
    let text = String::from_utf8_lossy(bytes);
    let digits: String = text
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

fn cmdline_contains(pid: i32, name: &str) -> bool {
    let mut buffer = [0u8; 512];

    let Ok(mut file) = File::open(format!("/proc/{}/cmdline", pid)) else {
        return false;
    };
    let Ok(count) = file.read(&mut buffer) else {
        return false;
    };
    if count == 0 {
        return false;
    }

    // the buffer is NUL-separated argv; matching stops at the first
    // NUL, so in practice this sees argv[0]
    let end = buffer[..count].iter().position(|&b| b == 0).unwrap_or(count);
    String::from_utf8_lossy(&buffer[..end]).contains(name)
}

/// Finds some process other than the caller whose command line contains
/// `name` as a substring.
///
/// The match is substring-based and may flag an unrelated process whose
/// argv[0] merely contains `name`; pick distinctive instance names.
pub fn find_by_name(name: &str) -> DaemonResult<Option<i32>> {
    let entries = fs::read_dir("/proc").map_err(|e| DaemonError::Syscall {
        call: "opendir(/proc)",
        errno: e.raw_os_error().unwrap_or(0),
    })?;

    let self_pid = std::process::id() as i32;

    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(pid) = file_name.to_str().and_then(|s| s.parse::<i32>().ok()) else {
            continue;
        };
        if pid == self_pid {
            continue;
        }
        if cmdline_contains(pid, name) {
            return Ok(Some(pid));
        }
    }

    Ok(None)
}

/// Collects every process (the caller included) whose command line
/// contains `name` as a substring.
pub fn find_all_by_name(name: &str) -> DaemonResult<Vec<i32>> {
    let entries = fs::read_dir("/proc").map_err(|e| DaemonError::Syscall {
        call: "opendir(/proc)",
        errno: e.raw_os_error().unwrap_or(0),
    })?;

    let mut found = Vec::new();
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(pid) = file_name.to_str().and_then(|s| s.parse::<i32>().ok()) else {
            continue;
        };
        if cmdline_contains(pid, name) {
            found.push(pid);
        }
    }

    Ok(found)
}
