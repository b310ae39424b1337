//! The resolver entry: one name lookup from policy to packed record.

use std::ffi::{CStr, c_char, c_int};
use std::path::Path;

use log::{debug, error, info, warn};

use crate::config::{self, Config, MatchFlags};
use crate::env::{self, ProcessEnv};
use crate::logging;
use crate::passwd::{self, SystemUsers, UserDb};
use crate::policy;
use crate::process;
use crate::record::{self, StoreFlags, UserRecord};
use crate::uid;

/// Seed used when the configuration does not provide one.
const DEFAULT_SEED: &str = "default-seed";

/// Status codes of the NSS module interface:
/// <https://www.gnu.org/software/libc/manual/html_node/NSS-Modules-Interface.html>
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NssStatus {
    /// A resource is temporarily unavailable; with errno ERANGE the caller
    /// should retry with a larger buffer.
    TryAgain = -2,
    /// The service is permanently unavailable.
    Unavail = -1,
    /// Not this module's user; the caller continues with the next source.
    NotFound = 0,
    /// The record was populated.
    Success = 1,
}

/// What one lookup resolved to, before any buffer packing.
#[derive(Debug)]
pub enum Lookup {
    /// Not our user. Carries the errno to report (0, EINVAL or ENOENT).
    NotFound { errno: c_int },
    /// A record to hand back, synthesized or decorated.
    Found { record: UserRecord, autogen: bool },
}

/// Resolve `name` for `process` against a parsed configuration.
///
/// When the name carries a configured suffix, the remainder is looked up in
/// the system database: a hit decorates the existing user (subject to the
/// rule's UID/GID bounds), a miss falls through to synthesizing the
/// stripped name. Names without a suffix synthesize directly, and only
/// when the rule provides a UID range.
pub fn lookup(config: &Config, process: &str, name: &str, db: &dyn UserDb) -> Lookup {
    let resolved = policy::apply(config, process, name);
    if config.debug.is_some() {
        debug!("computed configuration for user:'{name}' process:'{process}'");
        resolved.rule.dump();
    }

    let mut rule = resolved.rule;
    if let Some(offset) = resolved.suffix_offset {
        if rule.min_uid == 0 && rule.max_uid == 0 && rule.gid == 0 {
            warn!(
                "user:{name} has a policy that does not specify MinUid, MaxUid, nor Gid - ignoring"
            );
            return Lookup::NotFound {
                errno: libc::EINVAL,
            };
        }

        let stripped = &name[..offset];
        if let Some(entry) = db.lookup_name(stripped) {
            debug!(
                "user:{stripped} - found on the system with uid:{} - applying suffix policy",
                entry.uid
            );

            let bounds_set = rule.min_uid != 0 || rule.max_uid != 0;
            if (bounds_set && (entry.uid < rule.min_uid || entry.uid > rule.max_uid))
                || (rule.gid != 0 && entry.gid != rule.gid)
            {
                info!(
                    "user:{stripped} - refusing to apply policy - uid:{} or gid:{} not allowed",
                    entry.uid, entry.gid
                );
                return Lookup::NotFound {
                    errno: libc::EINVAL,
                };
            }

            // The system record provides the defaults the rule left open.
            rule.gid = entry.gid;
            if rule.shell.as_deref().unwrap_or("").is_empty() {
                rule.shell = Some(entry.shell.clone());
            }
            if rule.home.as_deref().unwrap_or("").is_empty() {
                rule.home = Some(entry.dir.clone());
            }
            if rule.gecos.as_deref().unwrap_or("").is_empty() {
                rule.gecos = Some(entry.gecos.clone());
            }

            let password = rule
                .has(MatchFlags::USE_PASSWORD)
                .then_some(entry.passwd.as_str());
            let record = record::compose(stripped, entry.uid, &rule, password, StoreFlags::FULL_DIR);
            return Lookup::Found {
                record,
                autogen: false,
            };
        }

        // No such user on the system: synthesize the stripped name instead.
        return synthesize(config, stripped, &rule, db);
    }

    synthesize(config, name, &rule, db)
}

fn synthesize(config: &Config, name: &str, rule: &config::MatchRule, db: &dyn UserDb) -> Lookup {
    // Never ever allow a root UID.
    if rule.min_uid == 0 || rule.max_uid == 0 {
        debug!("user:{name} - no uid range set - ignoring");
        return Lookup::NotFound { errno: 0 };
    }

    let seed = config.seed.as_deref().unwrap_or(DEFAULT_SEED);
    let uid = uid::compute_uid(
        seed,
        name,
        rule.min_uid,
        rule.max_uid,
        uid::HASH_ATTEMPTS,
        |uid| db.uid_taken(uid),
    );
    if uid == 0 {
        error!(
            "hashing '{name}' generated clashing uids for {} attempts",
            uid::HASH_ATTEMPTS
        );
        return Lookup::NotFound {
            errno: libc::ENOENT,
        };
    }

    let mut flags = StoreFlags::AUTO_GEN;
    if rule.has(MatchFlags::USE_FULL_HOME) {
        flags |= StoreFlags::FULL_DIR;
    }
    Lookup::Found {
        record: record::compose(name, uid, rule, None, flags),
        autogen: true,
    }
}

unsafe fn store_errno(errnop: *mut c_int, value: c_int) {
    if !errnop.is_null() {
        unsafe { *errnop = value };
    }
}

/// The NSS passwd-by-name entry point.
///
/// # Safety
///
/// Called by glibc with `name` a NUL-terminated string, `pwd` a valid
/// passwd struct, and `buffer` holding `buflen` writable bytes that outlive
/// the returned record.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn _nss_autouser_getpwnam_r(
    name: *const c_char,
    pwd: *mut libc::passwd,
    buffer: *mut c_char,
    buflen: libc::size_t,
    errnop: *mut c_int,
) -> c_int {
    logging::init();

    // A lookup of ours is already running on this thread; answering would
    // recurse without bound.
    if passwd::nested() {
        unsafe { store_errno(errnop, 0) };
        return NssStatus::NotFound as c_int;
    }

    if name.is_null() || pwd.is_null() || buffer.is_null() {
        unsafe { store_errno(errnop, 0) };
        return NssStatus::NotFound as c_int;
    }
    let Ok(name) = unsafe { CStr::from_ptr(name) }.to_str() else {
        // A name we could never have produced is not our user.
        unsafe { store_errno(errnop, 0) };
        return NssStatus::NotFound as c_int;
    };

    let config = match Config::load(Path::new(config::CONFIG_PATH)) {
        Ok(config) => config,
        Err(parse_error) => {
            logging::set_debug_path(None);
            error!(
                "error {} parsing configuration file '{}': {}",
                parse_error.kind.code(),
                config::CONFIG_PATH,
                parse_error
            );
            unsafe { store_errno(errnop, libc::ENOENT) };
            return NssStatus::Unavail as c_int;
        }
    };
    logging::set_debug_path(config.debug.as_deref());
    if config.debug.is_some() {
        config.dump();
    }

    if config.rules.is_empty() {
        error!("no rules specified in {} - disabled", config::CONFIG_PATH);
        unsafe { store_errno(errnop, libc::ENOENT) };
        return NssStatus::Unavail as c_int;
    }

    let Some(process) = process::argv0() else {
        error!(
            "argv could not be detected - disabled - this often indicates a libc incompatibility"
        );
        unsafe { store_errno(errnop, libc::ENOENT) };
        return NssStatus::Unavail as c_int;
    };

    match lookup(&config, process, name, &SystemUsers) {
        Lookup::NotFound { errno } => {
            debug!("user:{name} - status:notfound errno:{errno}");
            unsafe { store_errno(errnop, errno) };
            NssStatus::NotFound as c_int
        }
        Lookup::Found { record, autogen } => {
            let buffer = unsafe { std::slice::from_raw_parts_mut(buffer.cast::<u8>(), buflen) };
            let Some(offsets) = record::pack(&record, buffer) else {
                debug!(
                    "user:{} - buffer too small ({buflen}), could not store result",
                    record.name
                );
                unsafe { store_errno(errnop, libc::ERANGE) };
                return NssStatus::TryAgain as c_int;
            };

            let base = buffer.as_mut_ptr().cast::<c_char>();
            let pwd = unsafe { &mut *pwd };
            pwd.pw_name = unsafe { base.add(offsets.name) };
            pwd.pw_passwd = unsafe { base.add(offsets.passwd) };
            pwd.pw_uid = record.uid;
            pwd.pw_gid = record.gid;
            pwd.pw_gecos = unsafe { base.add(offsets.gecos) };
            pwd.pw_dir = unsafe { base.add(offsets.dir) };
            pwd.pw_shell = unsafe { base.add(offsets.shell) };

            env::publish(&mut ProcessEnv, name, &record, autogen);

            debug!(
                "user:{} - status:success uid:{} gid:{} home:{} gecos:{} shell:{}",
                record.name, record.uid, record.gid, record.dir, record.gecos, record.shell
            );
            unsafe { store_errno(errnop, 0) };
            NssStatus::Success as c_int
        }
    }
}
