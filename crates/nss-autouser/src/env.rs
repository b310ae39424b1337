//! Publication of the computed record as environment variables.
//!
//! The variables become part of the host process environment and are
//! inherited by the session it spawns next (the login shell on a bastion,
//! the sandbox entry point, ...). Mutating the environment from a library
//! is a side effect on global state, so it is isolated behind a small sink
//! that tests can replace with a capturing one.

use crate::record::UserRecord;

/// Where published variables go.
pub trait EnvSink {
    fn set(&mut self, key: &str, value: &str);
}

/// The real process environment.
pub struct ProcessEnv;

impl EnvSink for ProcessEnv {
    fn set(&mut self, key: &str, value: &str) {
        // Safety: NSS lookups are serialized per thread by the host and the
        // module spawns no threads of its own.
        unsafe { std::env::set_var(key, value) };
    }
}

/// Export the record for downstream sessions. `original` is the name as
/// requested, before any suffix was stripped.
pub fn publish(sink: &mut dyn EnvSink, original: &str, record: &UserRecord, autogen: bool) {
    sink.set("AUTOUSER_ORIGINAL", original);
    sink.set("AUTOUSER_NAME", &record.name);
    sink.set("AUTOUSER_SHELL", &record.shell);
    sink.set("AUTOUSER_HOME", &record.dir);
    sink.set("AUTOUSER_GECOS", &record.gecos);
    sink.set("AUTOUSER_AUTOGEN", if autogen { "true" } else { "false" });
    sink.set("AUTOUSER_UID", &record.uid.to_string());
    sink.set("AUTOUSER_GID", &record.gid.to_string());
}


#[cfg(test)]
mod tests {
    use super::capture::CaptureEnv;
    use super::*;

    #[test]
    fn publish_exports_every_variable() {
        let record = UserRecord {
            name: "bin".into(),
            passwd: "*".into(),
            uid: 2,
            gid: 2,
            gecos: "bin".into(),
            dir: "/bin".into(),
            shell: "/bin/docker-login".into(),
        };
        let mut sink = CaptureEnv::default();
        publish(&mut sink, "bin:docker", &record, false);

        assert_eq!(sink.vars.len(), 8);
        assert_eq!(sink.get("AUTOUSER_ORIGINAL"), Some("bin:docker"));
        assert_eq!(sink.get("AUTOUSER_NAME"), Some("bin"));
        assert_eq!(sink.get("AUTOUSER_SHELL"), Some("/bin/docker-login"));
        assert_eq!(sink.get("AUTOUSER_HOME"), Some("/bin"));
        assert_eq!(sink.get("AUTOUSER_GECOS"), Some("bin"));
        assert_eq!(sink.get("AUTOUSER_AUTOGEN"), Some("false"));
        assert_eq!(sink.get("AUTOUSER_UID"), Some("2"));
        assert_eq!(sink.get("AUTOUSER_GID"), Some("2"));
    }

    #[test]
    fn autogen_flag_is_reported() {
        let record = UserRecord {
            name: "fueller".into(),
            passwd: "*".into(),
            uid: 7123,
            gid: 7123,
            gecos: String::new(),
            dir: "/home/fueller".into(),
            shell: "/bin/bash".into(),
        };
        let mut sink = CaptureEnv::default();
        publish(&mut sink, "fueller", &record, true);
        assert_eq!(sink.get("AUTOUSER_AUTOGEN"), Some("true"));
    }
}
