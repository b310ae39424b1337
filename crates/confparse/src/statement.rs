use bitflags::bitflags;

use crate::context::Context;
use crate::error::Result;
use crate::section::parse_section;

bitflags! {
    /// Cardinality and sectioning options of a statement.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Options: u32 {
        /// The statement must be supplied before the section ends.
        const MUST = 1 << 0;
        /// The statement may appear multiple times; new values override old.
        const MULTI = 1 << 1;
        /// The statement starts a new section: a second occurrence closes
        /// the section it appears in.
        const START = 1 << 2;
    }
}

/// How a statement recognizes its command token.
#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    /// Match a command by its exact name.
    Exact(&'static str),
    /// Match any command. The token is not consumed; the parse step decides
    /// what to do with it (typically re-entering a nested section).
    Any,
}

impl Matcher {
    pub fn exact(name: &'static str) -> Self {
        Matcher::Exact(name)
    }

    pub fn any() -> Self {
        Matcher::Any
    }

    pub(crate) fn matches(&self, token: &str) -> bool {
        match self {
            Matcher::Exact(name) => *name == token,
            Matcher::Any => true,
        }
    }
}

/// The parse step bound to a statement. Invoked with the context positioned
/// right after the command token and the byte offset where the token began;
/// mutates the caller-owned target on success.
pub struct Parse<'a, T>(pub(crate) Box<dyn Fn(&mut Context, usize, &mut T) -> Result<()> + 'a>);

/// One grammar rule: options, a command matcher, and the parse step that
/// stores the recognized value into the target.
pub struct Statement<'a, T> {
    pub(crate) options: Options,
    pub(crate) matcher: Matcher,
    pub(crate) parse: Parse<'a, T>,
}

impl<'a, T> Statement<'a, T> {
    pub fn new(options: Options, matcher: Matcher, parse: Parse<'a, T>) -> Self {
        Statement {
            options,
            matcher,
            parse,
        }
    }
}

/// Recognize the command and nothing else.
pub fn expect_nothing<'a, T>() -> Parse<'a, T> {
    Parse(Box::new(|_ctx, _start, _dest| Ok(())))
}

/// Parse a string into the field selected by `field`. A legitimately
/// repeated statement replaces the previous value: the last one wins.
pub fn expect_string<'a, T, A>(field: A) -> Parse<'a, T>
where
    A: for<'t> Fn(&'t mut T) -> &'t mut Option<String> + 'a,
{
    Parse(Box::new(move |ctx, _start, dest| {
        let value = ctx.parse_string()?;
        *field(dest) = Some(value);
        Ok(())
    }))
}

macro_rules! expect_unsigned {
    ($(#[$doc:meta])* $name:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $name<'a, T, A>(field: A) -> Parse<'a, T>
        where
            A: for<'t> Fn(&'t mut T) -> &'t mut $ty + 'a,
        {
            Parse(Box::new(move |ctx, _start, dest| {
                let value = ctx.parse_uint64(<$ty>::MAX as u64)?;
                *field(dest) = value as $ty;
                Ok(())
            }))
        }
    };
}

macro_rules! expect_signed {
    ($(#[$doc:meta])* $name:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $name<'a, T, A>(field: A) -> Parse<'a, T>
        where
            A: for<'t> Fn(&'t mut T) -> &'t mut $ty + 'a,
        {
            Parse(Box::new(move |ctx, _start, dest| {
                let value = ctx.parse_int64(<$ty>::MIN as i64, <$ty>::MAX as i64)?;
                *field(dest) = value as $ty;
                Ok(())
            }))
        }
    };
}

expect_unsigned!(
    /// Parse an unsigned 8-bit integer into the selected field.
    expect_uint8, u8
);
expect_unsigned!(
    /// Parse an unsigned 16-bit integer into the selected field.
    expect_uint16, u16
);
expect_unsigned!(
    /// Parse an unsigned 32-bit integer into the selected field.
    expect_uint32, u32
);
expect_unsigned!(
    /// Parse an unsigned 64-bit integer into the selected field.
    expect_uint64, u64
);
expect_signed!(
    /// Parse a signed 8-bit integer into the selected field.
    expect_int8, i8
);
expect_signed!(
    /// Parse a signed 16-bit integer into the selected field.
    expect_int16, i16
);
expect_signed!(
    /// Parse a signed 32-bit integer into the selected field.
    expect_int32, i32
);
expect_signed!(
    /// Parse a signed 64-bit integer into the selected field.
    expect_int64, i64
);

/// Parse a boolean into a pair of bits of the selected 32-bit flag word.
///
/// A true value sets both `seen` and `flip`; a false value sets `seen` and
/// clears `flip`. The `seen` bit records that the value was supplied at all,
/// which lets callers distinguish an explicit false from the default.
pub fn expect_bool32<'a, T, A>(field: A, seen: u32, flip: u32) -> Parse<'a, T>
where
    A: for<'t> Fn(&'t mut T) -> &'t mut u32 + 'a,
{
    Parse(Box::new(move |ctx, _start, dest| {
        ctx.parse_bool32(seen, flip, field(dest))
    }))
}

/// 64-bit variant of [`expect_bool32`].
pub fn expect_bool64<'a, T, A>(field: A, seen: u64, flip: u64) -> Parse<'a, T>
where
    A: for<'t> Fn(&'t mut T) -> &'t mut u64 + 'a,
{
    Parse(Box::new(move |ctx, _start, dest| {
        ctx.parse_bool64(seen, flip, field(dest))
    }))
}

/// Enter a nested statement table.
///
/// `adder` selects (or appends) the nested target from the current one: pass
/// `|target| target` to keep filling the same value, or push a fresh record
/// onto a vector and return a reference to it to turn every occurrence of a
/// MULTI statement into a new record. The cursor is rewound to the start of
/// the command token, so the nested table sees it again and can claim it.
pub fn expect_section<'a, T, U, A>(statements: Vec<Statement<'a, U>>, adder: A) -> Parse<'a, T>
where
    A: for<'t> Fn(&'t mut T) -> &'t mut U + 'a,
    U: 'a,
{
    Parse(Box::new(move |ctx, start, dest| {
        let child = adder(dest);
        ctx.rewind(start);
        parse_section(ctx, &statements, child)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::section::parse_buffer;

    #[derive(Default)]
    struct Widths {
        narrow: u8,
        medium: u16,
        signed: i16,
        wide: u64,
        offset: i64,
    }

    fn width_statements<'a>() -> Vec<Statement<'a, Widths>> {
        vec![
            Statement::new(
                Options::empty(),
                Matcher::exact("Narrow"),
                expect_uint8(|t: &mut Widths| &mut t.narrow),
            ),
            Statement::new(
                Options::empty(),
                Matcher::exact("Medium"),
                expect_uint16(|t: &mut Widths| &mut t.medium),
            ),
            Statement::new(
                Options::empty(),
                Matcher::exact("Signed"),
                expect_int16(|t: &mut Widths| &mut t.signed),
            ),
            Statement::new(
                Options::empty(),
                Matcher::exact("Wide"),
                expect_uint64(|t: &mut Widths| &mut t.wide),
            ),
            Statement::new(
                Options::empty(),
                Matcher::exact("Offset"),
                expect_int64(|t: &mut Widths| &mut t.offset),
            ),
        ]
    }

    #[test]
    fn numeric_adapters_store_into_their_width() {
        let mut result = Widths::default();
        parse_buffer(
            "Narrow 255\nMedium 0xffff\nSigned -42\nWide 0x123456789\nOffset -1",
            &width_statements(),
            &mut result,
        )
        .unwrap();
        assert_eq!(result.narrow, 255);
        assert_eq!(result.medium, 65535);
        assert_eq!(result.signed, -42);
        assert_eq!(result.wide, 0x1_2345_6789);
        assert_eq!(result.offset, -1);
    }

    #[test]
    fn numeric_adapters_enforce_the_narrow_limits() {
        let mut result = Widths::default();
        let err = parse_buffer("Narrow 256", &width_statements(), &mut result).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ParseInt);

        let mut result = Widths::default();
        let err = parse_buffer("Signed 40000", &width_statements(), &mut result).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ParseInt);
    }

    #[test]
    fn matcher_compares_whole_tokens() {
        assert!(Matcher::exact("Seed").matches("Seed"));
        assert!(!Matcher::exact("Seed").matches("Seeds"));
        assert!(!Matcher::exact("Seed").matches("See"));
        assert!(Matcher::any().matches("anything"));
        assert!(Matcher::any().matches(""));
    }
}
