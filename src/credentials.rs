//! Lookups between numeric ids and account names, plus the couple of
//! filesystem helpers the daemonizer needs around its PID directory.

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use nix::sys::stat::Mode;
use nix::unistd::{self, Gid, Group, Uid, User};

use crate::error::{DaemonError, DaemonResult};

/// Resolves a numeric user id to its account name.
pub fn uid_to_name(uid: Uid) -> DaemonResult<String> {
    match User::from_uid(uid) {
        Ok(Some(user)) => Ok(user.name),
        Ok(None) => Err(DaemonError::Lookup(format!("User id {} not found", uid))),
        Err(errno) => Err(DaemonError::from_errno("getpwuid_r", errno)),
    }
}

/// Resolves an account name to its numeric user id.
pub fn name_to_uid(name: &str) -> DaemonResult<Uid> {
    match User::from_name(name) {
        Ok(Some(user)) => Ok(user.uid),
        Ok(None) => Err(DaemonError::Lookup(format!("User \"{}\" not found", name))),
        Err(errno) => Err(DaemonError::from_errno("getpwnam_r", errno)),
    }
}

/// Resolves a numeric group id to its group name.
pub fn gid_to_name(gid: Gid) -> DaemonResult<String> {
    match Group::from_gid(gid) {
        Ok(Some(group)) => Ok(group.name),
        Ok(None) => Err(DaemonError::Lookup(format!("Group id {} not found", gid))),
        Err(errno) => Err(DaemonError::from_errno("getgrgid_r", errno)),
    }
}

/// Resolves a group name to its numeric group id.
pub fn name_to_gid(name: &str) -> DaemonResult<Gid> {
    match Group::from_name(name) {
        Ok(Some(group)) => Ok(group.gid),
        Ok(None) => Err(DaemonError::Lookup(format!("Group \"{}\" not found", name))),
        Err(errno) => Err(DaemonError::from_errno("getgrnam_r", errno)),
    }
}

/// Returns the current working directory.
///
/// The underlying buffer grows until the kernel stops answering ERANGE;
/// any other failure is fatal.
pub fn working_directory() -> DaemonResult<PathBuf> {
    unistd::getcwd().map_err(|errno| DaemonError::from_errno("getcwd", errno))
}

/// Creates `path` as a `(uid, gid)`-owned directory with mode 0755.
///
/// A pre-existing directory is kept and only its ownership reconciled.
/// A pre-existing non-directory is an error; nothing is ever unlinked
/// or replaced here.
pub fn create_directory(path: impl AsRef<Path>, uid: Uid, gid: Gid) -> DaemonResult<()> {
    let path = path.as_ref();

    let info = match fs::read_dir(path) {
        Err(_) => {
            unistd::mkdir(path, Mode::from_bits_truncate(0o755))
                .map_err(|errno| DaemonError::from_errno("mkdir", errno))?;

            fs::metadata(path).map_err(|e| DaemonError::Syscall {
                call: "stat",
                errno: e.raw_os_error().unwrap_or(0),
            })?
        }
        Ok(_) => fs::metadata(path).map_err(|e| DaemonError::Syscall {
            call: "fstat",
            errno: e.raw_os_error().unwrap_or(0),
        })?,
    };

    if info.uid() != uid.as_raw() || info.gid() != gid.as_raw() {
        unistd::chown(path, Some(uid), Some(gid))
            .map_err(|errno| DaemonError::from_errno("chown", errno))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_name_round_trip() {
        // uid 0 exists on every system this crate targets
        let name = uid_to_name(Uid::from_raw(0)).unwrap();
        assert_eq!(name_to_uid(&name).unwrap(), Uid::from_raw(0));

        let gname = gid_to_name(Gid::from_raw(0)).unwrap();
        assert_eq!(name_to_gid(&gname).unwrap(), Gid::from_raw(0));
    }

    #[test]
    fn current_identity_round_trip() {
        let uid = Uid::current();
        let name = uid_to_name(uid).unwrap();
        assert_eq!(name_to_uid(&name).unwrap(), uid);
    }

    #[test]
    fn unknown_entries_are_lookup_errors() {
        assert!(matches!(
            name_to_uid("no-such-user-runner-forge"),
            Err(DaemonError::Lookup(_))
        ));
        assert!(matches!(
            name_to_gid("no-such-group-runner-forge"),
            Err(DaemonError::Lookup(_))
        ));
        assert!(matches!(
            uid_to_name(Uid::from_raw(0xDEAD_BEEF)),
            Err(DaemonError::Lookup(_))
        ));
        assert!(matches!(
            gid_to_name(Gid::from_raw(0xDEAD_BEEF)),
            Err(DaemonError::Lookup(_))
        ));
    }

    #[test]
    fn working_directory_matches_std() {
        assert_eq!(
            working_directory().unwrap(),
            std::env::current_dir().unwrap()
        );
    }

    #[test]
    fn create_directory_is_idempotent() {
        let scratch = tempfile::tempdir().unwrap();
        let target = scratch.path().join("run");

        let uid = Uid::current();
        let gid = Gid::current();

        create_directory(&target, uid, gid).unwrap();
        create_directory(&target, uid, gid).unwrap();

        let info = fs::metadata(&target).unwrap();
        assert!(info.is_dir());
        assert_eq!(info.uid(), uid.as_raw());
        assert_eq!(info.gid(), gid.as_raw());
    }

    #[test]
    fn create_directory_rejects_plain_files() {
        let scratch = tempfile::tempdir().unwrap();
        let target = scratch.path().join("blocker");
        fs::write(&target, b"not a directory").unwrap();

        let err = create_directory(&target, Uid::current(), Gid::current()).unwrap_err();
        assert!(matches!(err, DaemonError::Syscall { call: "mkdir", .. }));
        // still present and untouched
        assert_eq!(fs::read(&target).unwrap(), b"not a directory");
    }
}
