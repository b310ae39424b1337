//! nss-autouser — synthesize POSIX user records on demand.
//!
//! An NSS passwd provider for gateway hosts (SSH bastions, login shells into
//! container sandboxes) that need a fleet of ephemeral identities without
//! pre-provisioning. When the system asks for a user by name, the module
//! consults `/etc/nss-autouser.conf` and the identity of the asking process
//! and either fabricates a user (deriving a deterministic UID from a seeded
//! hash of the name), decorates an existing system user with alternate
//! attributes, or declines the lookup.
//!
//! Configuration is a list of policy rules selected by the requesting
//! process (shell-style glob against argv[0]) and the requested name
//! (suffix match):
//!
//! ```text
//! Seed "per-fleet hash seed"
//! DebugLog /var/log/nss-autouser.log
//!
//! # Defaults for every process.
//! MinUid 7000
//! MaxUid 8000
//!
//! Match /usr/sbin/sshd
//!   Suffix :docker
//!     MinUid 1
//!     MaxUid 1000
//!     Shell /bin/docker-login
//!     PropagatePassword yes
//! ```
//!
//! A name ending in a configured suffix is looked up, suffix stripped, in
//! the system database and decorated with the rule's attributes; any other
//! name is synthesized with a UID hashed into the rule's range. The values
//! that make up the final record are also exported as `AUTOUSER_*`
//! environment variables for the session the host process spawns next.
//!
//! Install as `libnss_autouser.so.2` and add `autouser` to the `passwd`
//! line of nsswitch.conf(5).

pub mod config;
pub mod env;
pub mod glob;
pub mod logging;
pub mod nss;
pub mod passwd;
pub mod policy;
pub mod process;
pub mod record;
pub mod uid;
