//! Composition of the final passwd record and packing into the caller's
//! flat buffer.

use bitflags::bitflags;

use crate::config::MatchRule;

/// Shell used when no rule supplies one.
pub const DEFAULT_SHELL: &str = "/bin/bash";
/// Base directory for composed home paths.
pub const DEFAULT_HOME: &str = "/home";

bitflags! {
    /// How to compose the record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StoreFlags: u32 {
        /// The configured home directory is already the full path of the
        /// user's home; do not append the user name.
        const FULL_DIR = 1 << 0;
        /// The record was fabricated rather than decorated from an
        /// existing user.
        const AUTO_GEN = 1 << 1;
    }
}

/// A fully composed passwd record, before packing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub name: String,
    pub passwd: String,
    pub uid: libc::uid_t,
    pub gid: libc::gid_t,
    pub gecos: String,
    pub dir: String,
    pub shell: String,
}

/// Compose the record for `name` from the merged rule.
///
/// `password` is the system password to propagate, if any; without one the
/// account password is the single character `*`. A rule without a GID uses
/// the UID as the group.
pub fn compose(
    name: &str,
    uid: libc::uid_t,
    rule: &MatchRule,
    password: Option<&str>,
    flags: StoreFlags,
) -> UserRecord {
    let home = rule.home.as_deref().filter(|home| !home.is_empty());
    let dir = match home {
        Some(home) if flags.contains(StoreFlags::FULL_DIR) => home.to_string(),
        _ => format!("{}/{}", home.unwrap_or(DEFAULT_HOME), name),
    };

    UserRecord {
        name: name.to_string(),
        passwd: password.unwrap_or("*").to_string(),
        uid,
        gid: if rule.gid != 0 { rule.gid } else { uid },
        gecos: rule
            .gecos
            .as_deref()
            .filter(|gecos| !gecos.is_empty())
            .unwrap_or("")
            .to_string(),
        dir,
        shell: rule
            .shell
            .as_deref()
            .filter(|shell| !shell.is_empty())
            .unwrap_or(DEFAULT_SHELL)
            .to_string(),
    }
}

/// Byte offsets of the packed strings inside the caller's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedOffsets {
    pub name: usize,
    pub passwd: usize,
    pub gecos: usize,
    pub shell: usize,
    pub dir: usize,
}

/// Append one NUL-terminated string to the bump allocator.
fn bump(buffer: &mut [u8], cursor: &mut usize, value: &str) -> Option<usize> {
    let bytes = value.as_bytes();
    let start = *cursor;
    let end = start.checked_add(bytes.len())?;
    if end >= buffer.len() {
        return None;
    }
    buffer[start..end].copy_from_slice(bytes);
    buffer[end] = 0;
    *cursor = end + 1;
    Some(start)
}

/// Pack the record's strings into the caller-supplied buffer.
///
/// Strings are laid out in fixed order — name, password, gecos, shell,
/// home — each with its terminator, at mutually disjoint offsets. Returns
/// None when the buffer cannot hold them all; the caller discards the
/// buffer content in that case.
pub fn pack(record: &UserRecord, buffer: &mut [u8]) -> Option<PackedOffsets> {
    let mut cursor = 0usize;
    Some(PackedOffsets {
        name: bump(buffer, &mut cursor, &record.name)?,
        passwd: bump(buffer, &mut cursor, &record.passwd)?,
        gecos: bump(buffer, &mut cursor, &record.gecos)?,
        shell: bump(buffer, &mut cursor, &record.shell)?,
        dir: bump(buffer, &mut cursor, &record.dir)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchRule;

    fn rule() -> MatchRule {
        MatchRule::default()
    }

    #[test]
    fn compose_applies_defaults() {
        let record = compose("fueller", 7123, &rule(), None, StoreFlags::AUTO_GEN);
        assert_eq!(record.name, "fueller");
        assert_eq!(record.passwd, "*");
        assert_eq!(record.uid, 7123);
        assert_eq!(record.gid, 7123);
        assert_eq!(record.gecos, "");
        assert_eq!(record.shell, DEFAULT_SHELL);
        assert_eq!(record.dir, "/home/fueller");
    }

    #[test]
    fn compose_uses_rule_attributes() {
        let rule = MatchRule {
            shell: Some("/bin/zsh".into()),
            home: Some("/srv/users".into()),
            gecos: Some("Ephemeral user".into()),
            gid: 4000,
            ..MatchRule::default()
        };
        let record = compose("ada", 7000, &rule, None, StoreFlags::empty());
        assert_eq!(record.shell, "/bin/zsh");
        assert_eq!(record.dir, "/srv/users/ada");
        assert_eq!(record.gecos, "Ephemeral user");
        assert_eq!(record.gid, 4000);
    }

    #[test]
    fn full_dir_takes_home_verbatim() {
        let rule = MatchRule {
            home: Some("/var/lib/svc".into()),
            ..MatchRule::default()
        };
        let record = compose("svc", 10, &rule, None, StoreFlags::FULL_DIR);
        assert_eq!(record.dir, "/var/lib/svc");

        // Without a configured home the name is still appended.
        let record = compose("svc", 10, &MatchRule::default(), None, StoreFlags::FULL_DIR);
        assert_eq!(record.dir, "/home/svc");
    }

    #[test]
    fn propagated_password_is_kept() {
        let record = compose("bin", 2, &rule(), Some("x"), StoreFlags::FULL_DIR);
        assert_eq!(record.passwd, "x");
    }

    #[test]
    fn pack_lays_out_strings_in_order() {
        let record = compose("ada", 7000, &rule(), None, StoreFlags::empty());
        let mut buffer = [0xffu8; 256];
        let offsets = pack(&record, &mut buffer).unwrap();

        assert_eq!(offsets.name, 0);
        assert!(offsets.passwd > offsets.name);
        assert!(offsets.gecos > offsets.passwd);
        assert!(offsets.shell > offsets.gecos);
        assert!(offsets.dir > offsets.shell);

        let string_at = |offset: usize| {
            let end = buffer[offset..].iter().position(|&b| b == 0).unwrap() + offset;
            std::str::from_utf8(&buffer[offset..end]).unwrap().to_string()
        };
        assert_eq!(string_at(offsets.name), "ada");
        assert_eq!(string_at(offsets.passwd), "*");
        assert_eq!(string_at(offsets.gecos), "");
        assert_eq!(string_at(offsets.shell), "/bin/bash");
        assert_eq!(string_at(offsets.dir), "/home/ada");
    }

    #[test]
    fn pack_fails_on_overflow() {
        let record = compose("ada", 7000, &rule(), None, StoreFlags::empty());
        let needed = record.name.len()
            + record.passwd.len()
            + record.gecos.len()
            + record.shell.len()
            + record.dir.len()
            + 5;
        let mut buffer = vec![0u8; needed];
        assert!(pack(&record, &mut buffer).is_some());

        let mut buffer = vec![0u8; needed - 1];
        assert!(pack(&record, &mut buffer).is_none());

        let mut buffer = [0u8; 4];
        assert!(pack(&record, &mut buffer).is_none());
    }
}
