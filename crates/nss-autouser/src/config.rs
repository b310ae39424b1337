//! Policy configuration: the rule data model and its grammar.

use std::path::Path;

use bitflags::bitflags;
use confparse::{
    Matcher, Options, Result, Statement, expect_bool32, expect_section, expect_string,
    expect_uint32, parse_buffer, parse_file,
};
use log::debug;

/// Default location of the policy file.
pub const CONFIG_PATH: &str = "/etc/nss-autouser.conf";

bitflags! {
    /// Per-rule behavior flags. Each USE bit is paired with a SET bit that
    /// records whether the operator supplied the value explicitly, which
    /// keeps an explicit `no` distinguishable from the default during rule
    /// merging.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MatchFlags: u32 {
        /// The configured home directory is the full path; do not append
        /// `/$USER`.
        const USE_FULL_HOME = 1 << 0;
        const SET_FULL_HOME = 1 << 1;

        /// When decorating a user that already exists on the system, keep
        /// the password configured on the system instead of disabling it.
        const USE_PASSWORD = 1 << 4;
        const SET_PASSWORD = 1 << 5;
    }
}

/// One policy rule: how to select it, and the attributes it contributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchRule {
    /// Glob matched against the requesting process argv[0]; None selects
    /// every process.
    pub argv: Option<String>,
    /// Suffix the requested name must carry; None selects every name.
    pub suffix: Option<String>,

    pub shell: Option<String>,
    pub home: Option<String>,
    pub gecos: Option<String>,

    /// Bounds of the synthesized UID range; both must be set for the rule
    /// to produce records.
    pub min_uid: libc::uid_t,
    pub max_uid: libc::uid_t,
    /// Primary group; 0 means "use the UID".
    pub gid: libc::gid_t,

    /// Raw [`MatchFlags`] bits.
    pub flags: u32,
}

impl MatchRule {
    pub fn has(&self, flag: MatchFlags) -> bool {
        self.flags & flag.bits() != 0
    }

    pub(crate) fn dump(&self) {
        debug!("config:   argv {}", self.argv.as_deref().unwrap_or("(unset)"));
        debug!("config:   suffix {}", self.suffix.as_deref().unwrap_or("(unset)"));
        debug!("config:   shell {}", self.shell.as_deref().unwrap_or("(unset)"));
        debug!("config:   home {}", self.home.as_deref().unwrap_or("(unset)"));
        debug!("config:   gecos {}", self.gecos.as_deref().unwrap_or("(unset)"));
        debug!("config:   min_uid {}", self.min_uid);
        debug!("config:   max_uid {}", self.max_uid);
        debug!("config:   gid {}", self.gid);
        debug!("config:   flags {:08x}", self.flags);
    }
}

/// The parsed policy file. Owns all of its strings.
#[derive(Debug, Default)]
pub struct Config {
    /// Seed folded into the UID hash before the user name.
    pub seed: Option<String>,
    /// Path of the operator-requested debug log, if any.
    pub debug: Option<String>,
    /// Rules in configuration order; later rules override earlier ones
    /// within the same selection bucket.
    pub rules: Vec<MatchRule>,
}

/// Append a fresh rule. The new rule inherits the previous rule's argv
/// glob, so `Suffix` blocks written under a `Match` line stay scoped to
/// that process.
fn add_rule(config: &mut Config) -> &mut MatchRule {
    let argv = config.rules.last().and_then(|rule| rule.argv.clone());
    config.rules.push(MatchRule {
        argv,
        ..MatchRule::default()
    });
    let index = config.rules.len() - 1;
    &mut config.rules[index]
}

fn suffix_statements<'a>() -> Vec<Statement<'a, MatchRule>> {
    vec![
        Statement::new(
            Options::START,
            Matcher::exact("Suffix"),
            expect_string(|rule: &mut MatchRule| &mut rule.suffix),
        ),
        Statement::new(
            Options::empty(),
            Matcher::exact("Shell"),
            expect_string(|rule: &mut MatchRule| &mut rule.shell),
        ),
        Statement::new(
            Options::empty(),
            Matcher::exact("Home"),
            expect_string(|rule: &mut MatchRule| &mut rule.home),
        ),
        Statement::new(
            Options::empty(),
            Matcher::exact("Gecos"),
            expect_string(|rule: &mut MatchRule| &mut rule.gecos),
        ),
        Statement::new(
            Options::empty(),
            Matcher::exact("MinUid"),
            expect_uint32(|rule: &mut MatchRule| &mut rule.min_uid),
        ),
        Statement::new(
            Options::empty(),
            Matcher::exact("MaxUid"),
            expect_uint32(|rule: &mut MatchRule| &mut rule.max_uid),
        ),
        Statement::new(
            Options::empty(),
            Matcher::exact("Gid"),
            expect_uint32(|rule: &mut MatchRule| &mut rule.gid),
        ),
        Statement::new(
            Options::empty(),
            Matcher::exact("PropagatePassword"),
            expect_bool32(
                |rule: &mut MatchRule| &mut rule.flags,
                MatchFlags::SET_PASSWORD.bits(),
                MatchFlags::USE_PASSWORD.bits(),
            ),
        ),
        Statement::new(
            Options::empty(),
            Matcher::exact("FullHomePath"),
            expect_bool32(
                |rule: &mut MatchRule| &mut rule.flags,
                MatchFlags::SET_FULL_HOME.bits(),
                MatchFlags::USE_FULL_HOME.bits(),
            ),
        ),
    ]
}

fn match_statements<'a>() -> Vec<Statement<'a, MatchRule>> {
    vec![
        Statement::new(
            Options::START,
            Matcher::exact("Match"),
            expect_string(|rule: &mut MatchRule| &mut rule.argv),
        ),
        Statement::new(
            Options::empty(),
            Matcher::any(),
            expect_section(suffix_statements(), |rule: &mut MatchRule| rule),
        ),
    ]
}

fn root_statements<'a>() -> Vec<Statement<'a, Config>> {
    vec![
        Statement::new(
            Options::empty(),
            Matcher::exact("Seed"),
            expect_string(|config: &mut Config| &mut config.seed),
        ),
        Statement::new(
            Options::empty(),
            Matcher::exact("DebugLog"),
            expect_string(|config: &mut Config| &mut config.debug),
        ),
        Statement::new(
            Options::MULTI,
            Matcher::any(),
            expect_section(match_statements(), add_rule),
        ),
    ]
}

impl Config {
    /// Parse a configuration from an in-memory buffer.
    pub fn parse(input: &str) -> Result<Config> {
        let mut config = Config::default();
        parse_buffer(input, &root_statements(), &mut config)?;
        Ok(config)
    }

    /// Load and parse the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Config> {
        let mut config = Config::default();
        parse_file(path, &root_statements(), &mut config)?;
        Ok(config)
    }

    /// Log the parsed configuration. Emitted at debug level so it only
    /// reaches the log file the operator asked for, never syslog.
    pub fn dump(&self) {
        debug!("config: DebugLog {}", self.debug.as_deref().unwrap_or("(unset)"));
        debug!(
            "config: Seed {}",
            if self.seed.is_some() {
                "(set but hidden)"
            } else {
                "(unset)"
            }
        );
        for (index, rule) in self.rules.iter().enumerate() {
            debug!("config: Entry {index}:");
            rule.dump();
        }
    }
}
