//! confparse — table-driven parsing of line-oriented configuration files.
//!
//! A configuration language is described as a table of [`Statement`]s: each
//! statement names a command (or matches any command), carries cardinality
//! options, and binds a parse step that stores the command's value into a
//! caller-owned target structure. [`parse_section`] interprets one table
//! against one target; statements can recurse into nested tables through
//! [`expect_section`], optionally appending a fresh record to a growable
//! sequence for every occurrence. This is how grammars of the shape
//!
//! ```text
//! Seed "my seed"
//! Match /usr/sbin/sshd
//!   Suffix :ephemeral
//!     Shell /bin/bash
//! ```
//!
//! are parsed directly into vectors of typed records.
//!
//! The parser is reentrant and carries no global state: tables are plain
//! values, the input buffer is borrowed, and all position bookkeeping lives
//! in a [`Context`]. Errors are localized to a `line N, char M: ` prefix.

mod context;
mod error;
mod section;
mod statement;

pub use context::{Context, Line};
pub use error::{Error, ErrorKind, Result, assign_bits};
pub use section::{parse_buffer, parse_file, parse_section};
pub use statement::{
    Matcher, Options, Parse, Statement, expect_bool32, expect_bool64, expect_int8, expect_int16,
    expect_int32, expect_int64, expect_nothing, expect_section, expect_string, expect_uint8,
    expect_uint16, expect_uint32, expect_uint64,
};
