//! Syslog level plumbing for the daemonizer and its services.

use std::ffi::CString;
use std::sync::atomic::{AtomicBool, Ordering};

use libc::c_char;

/// Priorities used by the ritual: DEBUG for trace steps, INFO for
/// milestones, WARNING for soft skips, ERR for caught fatals, ALERT
/// for instance collisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Err,
    Alert,
}

impl Level {
    fn priority(self) -> libc::c_int {
        match self {
            Level::Debug => libc::LOG_DEBUG,
            Level::Info => libc::LOG_INFO,
            Level::Warning => libc::LOG_WARNING,
            Level::Err => libc::LOG_ERR,
            Level::Alert => libc::LOG_ALERT,
        }
    }
}

static OPEN: AtomicBool = AtomicBool::new(false);

fn sanitized(text: &str) -> CString {
    let cleaned: String = text.chars().filter(|&c| c != '\0').collect();
    CString::new(cleaned).unwrap_or_default()
}

/// Opens the syslog connection under `label` with facility LOG_DAEMON.
/// Reopening is allowed; the last label wins.
pub fn open(label: &str) {
    // glibc keeps the ident pointer, so the string must outlive the
    // connection; one small leak per open
    let ident: &'static CString = Box::leak(Box::new(sanitized(label)));
    unsafe {
        libc::openlog(
            ident.as_ptr(),
            libc::LOG_CONS | libc::LOG_NDELAY | libc::LOG_PERROR | libc::LOG_PID,
            libc::LOG_DAEMON,
        );
    }
    OPEN.store(true, Ordering::SeqCst);
}

/// Closes the connection. Closes at most once per prior `open`.
pub fn close() {
    if OPEN.swap(false, Ordering::SeqCst) {
        unsafe { libc::closelog() };
    }
}

/// Whether an `open` is outstanding.
pub fn is_open() -> bool {
    OPEN.load(Ordering::SeqCst)
}

/// Emits one message at `level`.
pub fn log(level: Level, message: &str) {
    let text = sanitized(message);
    unsafe {
        libc::syslog(
            level.priority(),
            b"%s\0".as_ptr() as *const c_char,
            text.as_ptr(),
        );
    }
}
