//! Rule selection and merging.

use confparse::assign_bits;

use crate::config::{Config, MatchFlags, MatchRule};
use crate::glob;

/// Offset at which `suffix` starts inside `name`, if `name` ends with it.
pub fn suffix_index(name: &str, suffix: &str) -> Option<usize> {
    if name.ends_with(suffix) {
        Some(name.len() - suffix.len())
    } else {
        None
    }
}

/// Overlay `source` onto `dest`: non-empty strings and non-zero integers
/// override, and each flag pair is copied only when the source marks it as
/// explicitly set.
fn merge(dest: &mut MatchRule, source: &MatchRule) {
    fn overlay(dest: &mut Option<String>, source: &Option<String>) {
        if let Some(value) = source {
            if !value.is_empty() {
                *dest = Some(value.clone());
            }
        }
    }

    overlay(&mut dest.argv, &source.argv);
    overlay(&mut dest.suffix, &source.suffix);
    overlay(&mut dest.shell, &source.shell);
    overlay(&mut dest.home, &source.home);
    overlay(&mut dest.gecos, &source.gecos);

    if source.min_uid > 0 {
        dest.min_uid = source.min_uid;
    }
    if source.max_uid > 0 {
        dest.max_uid = source.max_uid;
    }
    if source.gid > 0 {
        dest.gid = source.gid;
    }

    if source.has(MatchFlags::SET_PASSWORD) {
        let mask = (MatchFlags::SET_PASSWORD | MatchFlags::USE_PASSWORD).bits();
        dest.flags = assign_bits(
            u64::from(dest.flags),
            u64::from(source.flags),
            u64::from(mask),
        ) as u32;
    }
    if source.has(MatchFlags::SET_FULL_HOME) {
        let mask = (MatchFlags::SET_FULL_HOME | MatchFlags::USE_FULL_HOME).bits();
        dest.flags = assign_bits(
            u64::from(dest.flags),
            u64::from(source.flags),
            u64::from(mask),
        ) as u32;
    }
}

/// The outcome of rule selection: the merged rule, and where the matched
/// suffix starts in the requested name (None when no suffix rule matched).
#[derive(Debug, Default)]
pub struct Resolved {
    pub rule: MatchRule,
    pub suffix_offset: Option<usize>,
}

/// Select and merge the rules applying to one lookup.
///
/// Every rule lands in one of four buckets along two independent axes: the
/// process axis (no argv glob = default, argv glob matching `process` =
/// set, otherwise dropped) and the user axis (no suffix = default, suffix
/// ending `name` = set, otherwise dropped). Within a bucket the last rule
/// in configuration order wins. The winners merge in fixed order, most
/// generic first:
///
/// 1. default process x default user
/// 2. default process x set user
/// 3. set process     x default user
/// 4. set process     x set user
///
/// The reported suffix offset comes from the most specific suffix bucket.
pub fn apply(config: &Config, process: &str, name: &str) -> Resolved {
    let mut def_process_def_user: Option<&MatchRule> = None;
    let mut def_process_set_user: Option<&MatchRule> = None;
    let mut set_process_def_user: Option<&MatchRule> = None;
    let mut set_process_set_user: Option<&MatchRule> = None;

    let mut def_suffix_offset = None;
    let mut set_suffix_offset = None;

    for rule in &config.rules {
        let argv = rule.argv.as_deref().unwrap_or("");
        let suffix = rule.suffix.as_deref().unwrap_or("");

        if argv.is_empty() {
            if suffix.is_empty() {
                def_process_def_user = Some(rule);
            } else if let Some(offset) = suffix_index(name, suffix) {
                def_process_set_user = Some(rule);
                def_suffix_offset = Some(offset);
            }
        } else if glob::matches(argv, process) {
            if suffix.is_empty() {
                set_process_def_user = Some(rule);
            } else if let Some(offset) = suffix_index(name, suffix) {
                set_process_set_user = Some(rule);
                set_suffix_offset = Some(offset);
            }
        }
    }

    let mut resolved = Resolved::default();
    for source in [
        def_process_def_user,
        def_process_set_user,
        set_process_def_user,
        set_process_set_user,
    ]
    .into_iter()
    .flatten()
    {
        merge(&mut resolved.rule, source);
    }
    resolved.suffix_offset = set_suffix_offset.or(def_suffix_offset);
    resolved
}
