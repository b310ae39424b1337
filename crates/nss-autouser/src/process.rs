//! Load-time capture of the host process identity.
//!
//! Per the ELF specification, functions listed in `.init_array` run when
//! the shared object is loaded, and glibc passes them the original argc,
//! argv and envp of the program. That is the only reliable way for an NSS
//! module to learn who is asking, so the capture happens exactly once,
//! here, before the first lookup.

use std::ffi::{CStr, c_char, c_int};
use std::sync::OnceLock;

struct ProcessIdentity {
    argc: c_int,
    argv0: Option<String>,
}

static PROCESS: OnceLock<ProcessIdentity> = OnceLock::new();

extern "C" fn capture(argc: c_int, argv: *const *const c_char, _envp: *const *const c_char) {
    let argv0 = if argc > 0 && !argv.is_null() {
        let first = unsafe { *argv };
        if first.is_null() {
            None
        } else {
            Some(unsafe { CStr::from_ptr(first) }.to_string_lossy().into_owned())
        }
    } else {
        None
    };
    let _ = PROCESS.set(ProcessIdentity { argc, argv0 });
}

#[unsafe(link_section = ".init_array")]
#[used]
static CAPTURE_PROCESS: extern "C" fn(c_int, *const *const c_char, *const *const c_char) = capture;

/// argv[0] of the host process, or None when the runtime never delivered
/// it (which usually indicates a libc incompatibility).
pub fn argv0() -> Option<&'static str> {
    PROCESS
        .get()
        .filter(|identity| identity.argc > 0)
        .and_then(|identity| identity.argv0.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argv0_is_captured_at_load_time() {
        // The constructor runs for the test binary too, and cargo always
        // invokes it with at least its own path.
        let argv0 = argv0().expect("argv0 should have been captured");
        assert!(!argv0.is_empty());
    }
}
