//! Process-wide signal controller.
//!
//! One handler table for the whole process, indexed by signal number.
//! Handlers are installed and removed from the main thread; delivery
//! preempts it through a single C trampoline that forwards into the
//! registered handler and keeps per-signal counters.

use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};

use libc::{c_int, c_void, siginfo_t};

use crate::error::{DaemonError, DaemonResult};

/// Size of the handler table, one slot per signal number. Mirrors the
/// platform's NSIG.
pub const NSIG: usize = 65;

/// Advisory classification of a signal's default action (see signal(7)).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Policy {
    /// Default action is to terminate the process.
    Terminate,
    /// Default action is to ignore the signal.
    Ignore,
    /// Default action is to terminate the process and dump core (see core(5)).
    CoreDump,
    /// Default action is to stop the process.
    Stop,
    /// Default action is to continue the process if it is currently stopped.
    Continue,
}

/// A per-signal handler object.
///
/// `handle` runs in signal context: no allocation, no locking, no
/// panicking. Atomics and writes to pre-opened descriptors are fine.
pub trait Handler: Send {
    /// Signal number this handler owns.
    fn signal(&self) -> c_int;

    /// Extra sigaction flags; `SA_SIGINFO` is always added.
    fn flags(&self) -> c_int {
        0
    }

    /// Advisory policy metadata.
    fn policy(&self) -> Policy {
        Policy::Continue
    }

    /// The callback invoked for each delivery of the signal.
    fn handle(&self, signal: c_int, info: *mut siginfo_t, context: *mut c_void);
}

/// Delivery counters for one signal number.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stat {
    /// Deliveries dispatched into an installed handler.
    pub call_count: u64,
    /// Deliveries that found the slot empty.
    pub error_count: u64,
}

struct Entry {
    handler: Box<dyn Handler>,
    previous: libc::sigaction,
}

struct Counters {
    calls: AtomicU64,
    errors: AtomicU64,
}

static TABLE: [AtomicPtr<Entry>; NSIG] = [const { AtomicPtr::new(ptr::null_mut()) }; NSIG];

static COUNTERS: [Counters; NSIG] = [const {
    Counters {
        calls: AtomicU64::new(0),
        errors: AtomicU64::new(0),
    }
}; NSIG];

/// The trampoline the kernel invokes. Allocation- and lock-free; the
/// counters are relaxed atomics with a single writer per signal.
extern "C" fn dispatch(signal: c_int, info: *mut siginfo_t, context: *mut c_void) {
    if signal < 0 || signal as usize >= NSIG {
        return;
    }

    let slot = TABLE[signal as usize].load(Ordering::Acquire);
    if slot.is_null() {
        COUNTERS[signal as usize].errors.fetch_add(1, Ordering::Relaxed);
    } else {
        // SAFETY: entries are only unlinked from the table by
        // uninstall/install on the main thread while no handler code
        // is running; the pointer read above stays valid for the call.
        unsafe { (*slot).handler.handle(signal, info, context) };
        COUNTERS[signal as usize].calls.fetch_add(1, Ordering::Relaxed);
    }
}

fn validate(signal: c_int) -> DaemonResult<usize> {
    if signal < 0 || signal as usize >= NSIG {
        return Err(DaemonError::InvalidArgument(format!(
            "Wrong signal code {}. The max signal value is {}",
            signal,
            NSIG - 1
        )));
    }
    Ok(signal as usize)
}

/// Installs `handler` for its signal, replacing and disposing of any
/// prior handler for the same number.
///
/// The sigaction mask blocks every signal that currently has a handler
/// installed, so registered handlers never interrupt each other. The
/// previous OS disposition is saved for restore at uninstall time.
pub fn install(handler: Box<dyn Handler>) -> DaemonResult<()> {
    let id = handler.signal();
    let index = validate(id)?;

    let entry = Box::new(Entry {
        handler,
        // overwritten by sigaction below
        previous: unsafe { std::mem::zeroed() },
    });
    let raw = Box::into_raw(entry);

    let old = TABLE[index].swap(raw, Ordering::AcqRel);
    if !old.is_null() {
        // SAFETY: the swap above is the only unlink of this pointer.
        drop(unsafe { Box::from_raw(old) });
    }

    let result = (|| {
        let mut sa: libc::sigaction = unsafe { std::mem::zeroed() };
        if unsafe { libc::sigemptyset(&mut sa.sa_mask) } != 0 {
            return Err(DaemonError::syscall("sigemptyset"));
        }

        for i in 0..NSIG {
            if !TABLE[i].load(Ordering::Acquire).is_null()
                && unsafe { libc::sigaddset(&mut sa.sa_mask, i as c_int) } != 0
            {
                return Err(DaemonError::InvalidArgument(format!("Wrong signal {}", i)));
            }
        }

        // SAFETY: raw was stored above and cannot be freed concurrently.
        sa.sa_flags = libc::SA_SIGINFO | unsafe { (*raw).handler.flags() };
        sa.sa_sigaction =
            dispatch as extern "C" fn(c_int, *mut siginfo_t, *mut c_void) as libc::sighandler_t;

        if unsafe { libc::sigaction(id, &sa, &mut (*raw).previous) } != 0 {
            return Err(DaemonError::syscall("sigaction"));
        }

        Ok(())
    })();

    if result.is_err() {
        // an unservable entry would poison the shared mask of every
        // later install; take it back out
        let stored = TABLE[index].swap(ptr::null_mut(), Ordering::AcqRel);
        if !stored.is_null() {
            drop(unsafe { Box::from_raw(stored) });
        }
    }

    result
}

/// Removes the handler for `signal`, restoring the OS disposition that
/// was saved when it was installed. A never-installed or out-of-range
/// signal is a no-op.
pub fn uninstall(signal: c_int) {
    if signal < 0 || signal as usize >= NSIG {
        return;
    }

    let old = TABLE[signal as usize].swap(ptr::null_mut(), Ordering::AcqRel);
    if old.is_null() {
        return;
    }

    // SAFETY: the swap above is the only unlink of this pointer.
    let entry = unsafe { Box::from_raw(old) };
    unsafe { libc::sigaction(signal, &entry.previous, ptr::null_mut()) };
}

/// Blocks every signal via the process mask.
pub fn block_all() -> DaemonResult<()> {
    mask_all(libc::SIG_BLOCK)
}

/// Unblocks every signal via the process mask.
pub fn unblock_all() -> DaemonResult<()> {
    mask_all(libc::SIG_UNBLOCK)
}

/// Blocks a single signal.
pub fn block(signal: c_int) -> DaemonResult<()> {
    mask_one(libc::SIG_BLOCK, signal)
}

/// Unblocks a single signal.
pub fn unblock(signal: c_int) -> DaemonResult<()> {
    mask_one(libc::SIG_UNBLOCK, signal)
}

/// Returns the delivery counters for `signal` (zeroes when out of range).
pub fn stat(signal: c_int) -> Stat {
    if signal < 0 || signal as usize >= NSIG {
        return Stat::default();
    }

    let counters = &COUNTERS[signal as usize];
    Stat {
        call_count: counters.calls.load(Ordering::Relaxed),
        error_count: counters.errors.load(Ordering::Relaxed),
    }
}

fn mask_all(action: c_int) -> DaemonResult<()> {
    let mut mask: libc::sigset_t = unsafe { std::mem::zeroed() };
    if unsafe { libc::sigfillset(&mut mask) } != 0 {
        return Err(DaemonError::syscall("sigfillset"));
    }
    if unsafe { libc::sigprocmask(action, &mask, ptr::null_mut()) } != 0 {
        return Err(DaemonError::syscall("sigprocmask"));
    }
    Ok(())
}

fn mask_one(action: c_int, signal: c_int) -> DaemonResult<()> {
    validate(signal)?;

    let mut mask: libc::sigset_t = unsafe { std::mem::zeroed() };
    if unsafe { libc::sigemptyset(&mut mask) } != 0 {
        return Err(DaemonError::syscall("sigemptyset"));
    }
    if unsafe { libc::sigaddset(&mut mask, signal) } != 0 {
        return Err(DaemonError::InvalidArgument(format!(
            "Wrong signal {}",
            signal
        )));
    }
    if unsafe { libc::sigprocmask(action, &mask, ptr::null_mut()) } != 0 {
        return Err(DaemonError::syscall("sigprocmask"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::sync::{Arc, Mutex, OnceLock};

    // the handler table is process-wide state; tests take turns
    fn lock() -> std::sync::MutexGuard<'static, ()> {
        static GATE: OnceLock<Mutex<()>> = OnceLock::new();
        GATE.get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    struct Counting {
        signal: c_int,
        hits: Arc<AtomicU64>,
    }

    impl Handler for Counting {
        fn signal(&self) -> c_int {
            self.signal
        }

        fn handle(&self, _signal: c_int, _info: *mut siginfo_t, _context: *mut c_void) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn current_disposition(signal: c_int) -> libc::sighandler_t {
        let mut old: libc::sigaction = unsafe { std::mem::zeroed() };
        assert_eq!(
            unsafe { libc::sigaction(signal, ptr::null(), &mut old) },
            0
        );
        old.sa_sigaction
    }

    fn restore_default(signal: c_int) {
        let mut sa: libc::sigaction = unsafe { std::mem::zeroed() };
        sa.sa_sigaction = libc::SIG_DFL;
        unsafe {
            libc::sigemptyset(&mut sa.sa_mask);
            libc::sigaction(signal, &sa, ptr::null_mut());
        }
    }

    #[test]
    fn rejects_out_of_range_signals() {
        let _guard = lock();

        let hits = Arc::new(AtomicU64::new(0));
        for bad in [-1, NSIG as c_int, 1000] {
            let err = install(Box::new(Counting {
                signal: bad,
                hits: hits.clone(),
            }))
            .unwrap_err();
            assert!(matches!(err, DaemonError::InvalidArgument(_)));
        }

        assert!(matches!(block(-1), Err(DaemonError::InvalidArgument(_))));
        assert!(matches!(
            unblock(NSIG as c_int),
            Err(DaemonError::InvalidArgument(_))
        ));

        // never-installed and out-of-range uninstalls are no-ops
        uninstall(libc::SIGWINCH);
        uninstall(-1);
        uninstall(NSIG as c_int);
    }

    #[test]
    fn counts_deliveries_per_signal() {
        let _guard = lock();

        let before = stat(libc::SIGUSR1);
        let hits = Arc::new(AtomicU64::new(0));
        install(Box::new(Counting {
            signal: libc::SIGUSR1,
            hits: hits.clone(),
        }))
        .unwrap();

        for _ in 0..3 {
            nix::sys::signal::raise(nix::sys::signal::Signal::SIGUSR1).unwrap();
        }

        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(stat(libc::SIGUSR1).call_count, before.call_count + 3);

        uninstall(libc::SIGUSR1);
        restore_default(libc::SIGUSR1);
    }

    #[test]
    fn blocked_signals_wait_for_unblock() {
        let _guard = lock();

        let hits = Arc::new(AtomicU64::new(0));
        install(Box::new(Counting {
            signal: libc::SIGUSR1,
            hits: hits.clone(),
        }))
        .unwrap();

        block(libc::SIGUSR1).unwrap();
        nix::sys::signal::raise(nix::sys::signal::Signal::SIGUSR1).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        // delivery happens before sigprocmask returns
        unblock(libc::SIGUSR1).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        uninstall(libc::SIGUSR1);
        restore_default(libc::SIGUSR1);
    }

    #[test]
    fn replace_disposes_and_uninstall_restores() {
        let _guard = lock();

        let default_action = current_disposition(libc::SIGUSR2);

        let first = Arc::new(AtomicU64::new(0));
        install(Box::new(Counting {
            signal: libc::SIGUSR2,
            hits: first.clone(),
        }))
        .unwrap();

        // replacement disposes of the first handler
        let second = Arc::new(AtomicU64::new(0));
        install(Box::new(Counting {
            signal: libc::SIGUSR2,
            hits: second.clone(),
        }))
        .unwrap();

        nix::sys::signal::raise(nix::sys::signal::Signal::SIGUSR2).unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        // the second install captured the trampoline as "previous";
        // restoring it with an empty slot routes deliveries to the
        // error counter
        uninstall(libc::SIGUSR2);
        let errors_before = stat(libc::SIGUSR2).error_count;
        nix::sys::signal::raise(nix::sys::signal::Signal::SIGUSR2).unwrap();
        assert_eq!(stat(libc::SIGUSR2).error_count, errors_before + 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        restore_default(libc::SIGUSR2);
    }

    #[test]
    fn uninstall_restores_first_saved_disposition() {
        let _guard = lock();

        restore_default(libc::SIGWINCH);
        let original = current_disposition(libc::SIGWINCH);

        let hits = Arc::new(AtomicU64::new(0));
        install(Box::new(Counting {
            signal: libc::SIGWINCH,
            hits,
        }))
        .unwrap();
        assert_ne!(current_disposition(libc::SIGWINCH), original);

        uninstall(libc::SIGWINCH);
        assert_eq!(current_disposition(libc::SIGWINCH), original);
    }
}
