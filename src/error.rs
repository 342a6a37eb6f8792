use std::fmt;
use std::io;

/// Custom error type for runner-forge.
/// Provides specific details about why the daemonization failed.
#[derive(Debug)]
pub enum DaemonError {
    /// Standard IO errors (PID file access, /proc scans, etc.)
    Io(io::Error),
    /// A user/group name or numeric id that does not exist on this system.
    Lookup(String),
    /// Another instance is already running (live PID file or /proc collision).
    Busy(String),
    /// Specific system call failure (fork, setsid, setuid, chown, ...).
    Syscall { call: &'static str, errno: i32 },
    /// Capability manipulation failure (read/update/apply of the sets).
    Capability(String),
    /// Out-of-range signal number, repeated execute() and similar misuse.
    InvalidArgument(String),
}

impl DaemonError {
    /// Captures the calling thread's current errno for a failed `call`.
    pub(crate) fn syscall(call: &'static str) -> Self {
        DaemonError::Syscall {
            call,
            errno: io::Error::last_os_error().raw_os_error().unwrap_or(0),
        }
    }

    pub(crate) fn from_errno(call: &'static str, errno: nix::errno::Errno) -> Self {
        DaemonError::Syscall {
            call,
            errno: errno as i32,
        }
    }
}

impl fmt::Display for DaemonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaemonError::Io(err) => write!(f, "IO Error: {}", err),
            DaemonError::Lookup(msg) => write!(f, "Lookup Error: {}", msg),
            DaemonError::Busy(msg) => write!(f, "Resource Busy: {}", msg),
            DaemonError::Syscall { call, errno } => {
                write!(f, "Syscall '{}' failed with errno {}", call, errno)
            }
            DaemonError::Capability(msg) => write!(f, "Capability Error: {}", msg),
            DaemonError::InvalidArgument(msg) => write!(f, "Invalid Argument: {}", msg),
        }
    }
}

impl std::error::Error for DaemonError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DaemonError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for DaemonError {
    fn from(err: io::Error) -> Self {
        DaemonError::Io(err)
    }
}

/// A specialized Result type for runner-forge operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
