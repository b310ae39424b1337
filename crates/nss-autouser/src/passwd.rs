//! System user database access.
//!
//! Lookups by name go through glibc's getpwnam_r(3), which walks every
//! configured NSS source — including this very module. A thread-local flag
//! guards that recursion: the exported entry point answers "not found"
//! immediately while the flag is up, and the flag is restored on every exit
//! path, panics included.

use std::cell::Cell;
use std::ffi::{CStr, CString};

/// One record of the passwd database, with owned strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasswdEntry {
    pub name: String,
    pub passwd: String,
    pub uid: libc::uid_t,
    pub gid: libc::gid_t,
    pub gecos: String,
    pub dir: String,
    pub shell: String,
}

/// The seam between the resolver and the host's user database.
pub trait UserDb {
    /// Look a user up by name.
    fn lookup_name(&self, name: &str) -> Option<PasswdEntry>;
    /// Whether a UID is already assigned to some user.
    fn uid_taken(&self, uid: libc::uid_t) -> bool;
}

thread_local! {
    static NESTING: Cell<bool> = const { Cell::new(false) };
}

/// Whether this thread is already inside a nested database lookup.
pub fn nested() -> bool {
    NESTING.with(Cell::get)
}

/// Run `body` with the re-entry flag raised.
fn with_nesting<R>(body: impl FnOnce() -> R) -> R {
    struct Lower;
    impl Drop for Lower {
        fn drop(&mut self) {
            NESTING.with(|flag| flag.set(false));
        }
    }

    NESTING.with(|flag| flag.set(true));
    let _lower = Lower;
    body()
}

/// Buffers for getpw*_r start here and double on ERANGE.
const INITIAL_BUFLEN: usize = 128;
/// Give up rather than retrying forever on a database gone mad.
const MAX_BUFLEN: usize = 1 << 20;

fn owned(field: *const libc::c_char) -> String {
    if field.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(field) }.to_string_lossy().into_owned()
    }
}

fn entry_from_libc(pwd: &libc::passwd) -> PasswdEntry {
    PasswdEntry {
        name: owned(pwd.pw_name),
        passwd: owned(pwd.pw_passwd),
        uid: pwd.pw_uid,
        gid: pwd.pw_gid,
        gecos: owned(pwd.pw_gecos),
        dir: owned(pwd.pw_dir),
        shell: owned(pwd.pw_shell),
    }
}

fn getpwnam(name: &str) -> Option<PasswdEntry> {
    let name = CString::new(name).ok()?;
    let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut buffer = vec![0u8; INITIAL_BUFLEN];
    loop {
        let mut result: *mut libc::passwd = std::ptr::null_mut();
        let errno = unsafe {
            libc::getpwnam_r(
                name.as_ptr(),
                &mut pwd,
                buffer.as_mut_ptr().cast(),
                buffer.len(),
                &mut result,
            )
        };
        if !result.is_null() {
            return Some(entry_from_libc(&pwd));
        }
        if errno == libc::ERANGE && buffer.len() < MAX_BUFLEN {
            buffer.resize(buffer.len() * 2, 0);
            continue;
        }
        return None;
    }
}

fn getpwuid(uid: libc::uid_t) -> Option<PasswdEntry> {
    let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut buffer = vec![0u8; INITIAL_BUFLEN];
    loop {
        let mut result: *mut libc::passwd = std::ptr::null_mut();
        let errno = unsafe {
            libc::getpwuid_r(
                uid,
                &mut pwd,
                buffer.as_mut_ptr().cast(),
                buffer.len(),
                &mut result,
            )
        };
        if !result.is_null() {
            return Some(entry_from_libc(&pwd));
        }
        if errno == libc::ERANGE && buffer.len() < MAX_BUFLEN {
            buffer.resize(buffer.len() * 2, 0);
            continue;
        }
        return None;
    }
}

/// The real user database, reached through glibc.
pub struct SystemUsers;

impl UserDb for SystemUsers {
    fn lookup_name(&self, name: &str) -> Option<PasswdEntry> {
        with_nesting(|| getpwnam(name))
    }

    fn uid_taken(&self, uid: libc::uid_t) -> bool {
        getpwuid(uid).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_exists() {
        let root = getpwnam("root").expect("root should exist");
        assert_eq!(root.uid, 0);
        assert_eq!(root.name, "root");
        assert!(!root.dir.is_empty());
    }

    #[test]
    fn nonexistent_user_is_none() {
        assert!(getpwnam("zzzz_nonexistent_user_99999").is_none());
        assert!(getpwnam("with\0nul").is_none());
    }

    #[test]
    fn uid_zero_is_taken() {
        assert!(SystemUsers.uid_taken(0));
    }

    #[test]
    fn nesting_flag_is_restored() {
        assert!(!nested());
        with_nesting(|| {
            assert!(nested());
            with_nesting(|| assert!(nested()));
            assert!(nested());
        });
        assert!(!nested());
    }

    #[test]
    fn nesting_flag_is_restored_on_panic() {
        let result = std::panic::catch_unwind(|| with_nesting(|| panic!("boom")));
        assert!(result.is_err());
        assert!(!nested());
    }
}
