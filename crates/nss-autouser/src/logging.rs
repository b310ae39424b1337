//! Module logger.
//!
//! A shared object loaded into arbitrary processes cannot log to stdout,
//! so records go to two places: messages of Info level and above are
//! forwarded to syslog(3), and when the operator configures `DebugLog`,
//! every record — Debug included — is appended to that file. Appends use
//! line granularity so concurrent processes sharing the file do not
//! corrupt each other's lines. Every record carries the pid and argv[0]
//! of the host process, which is what makes the log readable when a whole
//! fleet of shells funnels into one file.

use std::ffi::CString;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Once, RwLock};

use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::process;

struct ModuleLogger {
    debug_path: RwLock<Option<PathBuf>>,
}

static LOGGER: ModuleLogger = ModuleLogger {
    debug_path: RwLock::new(None),
};
static INIT: Once = Once::new();

/// Install the logger. Safe to call on every lookup; only the first call
/// does anything.
pub fn init() {
    INIT.call_once(|| {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(LevelFilter::Debug);
    });
}

/// Point the logger at the operator-configured debug file, or detach it.
/// Called once per lookup, after the configuration has been parsed.
pub fn set_debug_path(path: Option<&str>) {
    if let Ok(mut debug_path) = LOGGER.debug_path.write() {
        *debug_path = path.map(PathBuf::from);
    }
}

fn syslog(priority: libc::c_int, message: &str) {
    let Ok(message) = CString::new(message) else {
        return;
    };
    unsafe { libc::syslog(priority, c"%s".as_ptr(), message.as_ptr()) };
}

impl Log for ModuleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let line = format!(
            "nss-autouser for pid {} ({}) - {}",
            std::process::id(),
            process::argv0().unwrap_or("unknown"),
            record.args()
        );

        if let Ok(debug_path) = self.debug_path.read() {
            if let Some(path) = debug_path.as_ref() {
                if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
                    let _ = writeln!(file, "{line}");
                }
            }
        }

        if record.level() <= Level::Info {
            let priority = match record.level() {
                Level::Error => libc::LOG_ERR,
                Level::Warn => libc::LOG_WARNING,
                _ => libc::LOG_INFO,
            };
            syslog(priority, &line);
        }
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::debug;

    #[test]
    fn debug_records_land_in_the_configured_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug.log");

        init();
        set_debug_path(path.to_str());
        debug!("hello from the test");
        set_debug_path(None);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("hello from the test"), "{content}");
        assert!(content.contains("nss-autouser for pid"), "{content}");

        // Detached again: nothing further is appended.
        debug!("dropped on the floor");
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("dropped on the floor"), "{content}");
    }
}
