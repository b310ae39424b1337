use std::path::Path;

use crate::context::{Context, is_space};
use crate::error::{Error, ErrorKind, Result};
use crate::statement::{Options, Statement};

/// Bound prefix of the unconsumed input, for error messages.
fn snippet(rest: &str) -> &str {
    match rest.char_indices().nth(16) {
        Some((index, _)) => &rest[..index],
        None => rest,
    }
}

/// Interpret a statement table against the input until the section ends.
///
/// The section ends at the end of the input, at the first command no
/// statement recognizes, or at a repeat of a statement that does not allow
/// one. The latter two are reported as the `Command` and `Repeated` signal
/// kinds with the cursor rewound to the start of the offending token, so an
/// enclosing section can pick it up; [`parse_buffer`] turns signals that
/// escape the outermost section into positioned errors.
///
/// Statement state is per-invocation: a MUST statement missing when the
/// section ends raises `Required`, a repeat without MULTI raises the
/// `Repeated` signal, and a START statement seen after anything else was
/// executed closes the section.
pub fn parse_section<T>(ctx: &mut Context, statements: &[Statement<'_, T>], dest: &mut T) -> Result<()> {
    let mut command_expected = true;
    let mut seen = vec![false; statements.len()];
    let mut required = statements
        .iter()
        .filter(|statement| statement.options.contains(Options::MUST))
        .count();
    let mut executed = 0usize;
    // Signal to surface when a token exhausts the table.
    let mut pending = ErrorKind::Command;

    'input: while !ctx.at_end() {
        ctx.skip_line_spaces();
        let Some(byte) = ctx.peek() else { break };
        match byte {
            b'\n' => {
                ctx.newline();
                ctx.bump();
                command_expected = true;
                continue;
            }
            b'#' => {
                ctx.skip_until_eol();
                continue;
            }
            byte if is_space(byte) => {
                // \r, \v or \f: skip without starting a new line.
                ctx.bump();
                continue;
            }
            _ => {}
        }

        if !command_expected {
            return Err(ctx.error(
                ErrorKind::Unexpected,
                format!("'{}' is being parsed as a command", snippet(ctx.rest())),
            ));
        }

        let start = ctx.cursor();
        let token = ctx.take_token();

        for (index, statement) in statements.iter().enumerate() {
            if !statement.matcher.matches(token) {
                continue;
            }

            if executed > 0 && statement.options.contains(Options::START) {
                ctx.rewind(start);
                return Err(Error::signal(ErrorKind::Command));
            }

            if seen[index] {
                if !statement.options.contains(Options::MULTI) {
                    if required > 0 {
                        return Err(ctx.error(
                            ErrorKind::Required,
                            format!("{required} mandatory commands were not specified"),
                        ));
                    }
                    ctx.rewind(start);
                    return Err(Error::signal(ErrorKind::Repeated));
                }
            } else {
                seen[index] = true;
                if statement.options.contains(Options::MUST) {
                    required -= 1;
                }
            }

            // Four possible outcomes of a parse step:
            //   1. a hard error - propagate it;
            //   2. success - the command and its arguments were consumed, no
            //      further command is expected until the end of the line;
            //   3. a Command/Repeated signal with the cursor moved forward -
            //      a nested section consumed some statements and then gave
            //      up, the cursor sits on a fresh command for this table;
            //   4. a Command/Repeated signal with the cursor still at the
            //      token - the step rejected it, try the next statement.
            match (statement.parse.0)(ctx, start, dest) {
                Ok(()) => {
                    pending = ErrorKind::Command;
                    executed += 1;
                    command_expected = false;
                    continue 'input;
                }
                Err(error) if error.is_signal() => {
                    pending = error.kind;
                    if ctx.cursor() != start {
                        executed += 1;
                        continue 'input;
                    }
                }
                Err(error) => return Err(error),
            }
        }

        // No statement claimed the token.
        ctx.rewind(start);
        if required > 0 {
            return Err(ctx.error(
                ErrorKind::Required,
                format!("{required} mandatory commands were not specified"),
            ));
        }
        return Err(Error::signal(pending));
    }

    if required > 0 {
        return Err(ctx.error(
            ErrorKind::Required,
            format!("{required} mandatory commands were not specified"),
        ));
    }
    Ok(())
}

/// Parse a complete input buffer against the root statement table.
///
/// Unlike [`parse_section`], nothing may be left over: signals escaping the
/// root table and unconsumed trailing input are both reported as errors.
pub fn parse_buffer<T>(input: &str, statements: &[Statement<'_, T>], dest: &mut T) -> Result<()> {
    let mut ctx = Context::new(input);
    match parse_section(&mut ctx, statements, dest) {
        Ok(()) => {
            if !ctx.at_end() {
                return Err(ctx.error(
                    ErrorKind::Unexpected,
                    format!("unknown parameter found around '{}'", snippet(ctx.rest())),
                ));
            }
            Ok(())
        }
        Err(error) if error.kind == ErrorKind::Command => Err(ctx.error(
            ErrorKind::Command,
            format!("unknown command found around '{}'", snippet(ctx.rest())),
        )),
        Err(error) if error.kind == ErrorKind::Repeated => Err(ctx.error(
            ErrorKind::Repeated,
            "command can only appear once",
        )),
        Err(error) => Err(error),
    }
}

/// Read a whole configuration file and parse it with [`parse_buffer`].
///
/// The file is read in a single operation; the content is decoded lossily
/// and scanning stops at an embedded NUL, if any.
pub fn parse_file<T>(path: &Path, statements: &[Statement<'_, T>], dest: &mut T) -> Result<()> {
    let data = std::fs::read(path).map_err(|error| {
        Error::new(
            ErrorKind::Read,
            format!("error reading {}: {}", path.display(), error),
        )
    })?;
    let text = String::from_utf8_lossy(&data);
    let input = match text.find('\0') {
        Some(end) => &text[..end],
        None => &text,
    };
    parse_buffer(input, statements, dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::{
        Matcher, expect_nothing, expect_section, expect_string, expect_uint32,
    };

    #[derive(Default)]
    struct KeyValue {
        key: Option<String>,
        value: u32,
    }

    fn key_value_statements<'a>() -> Vec<Statement<'a, KeyValue>> {
        vec![
            Statement::new(
                Options::empty(),
                Matcher::exact("Key"),
                expect_string(|t: &mut KeyValue| &mut t.key),
            ),
            Statement::new(
                Options::empty(),
                Matcher::exact("Value"),
                expect_uint32(|t: &mut KeyValue| &mut t.value),
            ),
        ]
    }

    #[test]
    fn empty_input_parses_to_defaults() {
        let mut result = KeyValue::default();
        parse_buffer("", &key_value_statements(), &mut result).unwrap();
        assert_eq!(result.key, None);
        assert_eq!(result.value, 0);
    }

    #[test]
    fn simple_section_with_comments() {
        let input = "   # this is a full fledged config\n Key \"test key\"\n Value 0x10 # I love this value";
        let mut result = KeyValue::default();
        parse_buffer(input, &key_value_statements(), &mut result).unwrap();
        assert_eq!(result.key.as_deref(), Some("test key"));
        assert_eq!(result.value, 16);
    }

    #[test]
    fn repeated_statement_is_rejected() {
        let input = " Key \"test\n key\"\n Value 0x10\n Value 11";
        let mut result = KeyValue::default();
        let err = parse_buffer(input, &key_value_statements(), &mut result).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Repeated);
    }

    #[test]
    fn unknown_command_is_reported_with_position() {
        let mut result = KeyValue::default();
        let err =
            parse_buffer("Key one\nBogus 3", &key_value_statements(), &mut result).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Command);
        assert!(err.message.contains("line 2"), "{}", err.message);
        assert!(err.message.contains("Bogus"), "{}", err.message);
    }

    #[test]
    fn two_commands_on_one_line_are_rejected() {
        let mut result = KeyValue::default();
        let err =
            parse_buffer("Key one Value 3", &key_value_statements(), &mut result).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unexpected);
    }

    #[test]
    fn missing_must_statement_raises_required() {
        let statements = vec![
            Statement::new(
                Options::MUST,
                Matcher::exact("Key"),
                expect_string(|t: &mut KeyValue| &mut t.key),
            ),
            Statement::new(
                Options::empty(),
                Matcher::exact("Value"),
                expect_uint32(|t: &mut KeyValue| &mut t.value),
            ),
        ];
        let mut result = KeyValue::default();
        let err = parse_buffer("Value 3", &statements, &mut result).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Required);

        let mut result = KeyValue::default();
        parse_buffer("Key k\nValue 3", &statements, &mut result).unwrap();
        assert_eq!(result.key.as_deref(), Some("k"));
    }

    #[derive(Default)]
    struct Mappings {
        entries: Vec<KeyValue>,
    }

    fn mapping_statements<'a>() -> Vec<Statement<'a, Mappings>> {
        let entry = vec![
            Statement::new(
                Options::empty(),
                Matcher::exact("Mapping"),
                expect_nothing(),
            ),
            Statement::new(
                Options::empty(),
                Matcher::exact("Key"),
                expect_string(|t: &mut KeyValue| &mut t.key),
            ),
            Statement::new(
                Options::empty(),
                Matcher::exact("Value"),
                expect_uint32(|t: &mut KeyValue| &mut t.value),
            ),
        ];
        vec![Statement::new(
            Options::MULTI,
            Matcher::exact("Mapping"),
            expect_section(entry, |t: &mut Mappings| {
                t.entries.push(KeyValue::default());
                let index = t.entries.len() - 1;
                &mut t.entries[index]
            }),
        )]
    }

    #[test]
    fn recursive_section_appends_records() {
        let mut result = Mappings::default();
        parse_buffer("", &mapping_statements(), &mut result).unwrap();
        assert!(result.entries.is_empty());

        let input = " # wow, this is a complex one\n\
            Mapping\n\
            \x20 Key \"foo bar\" # a key\n\
            \x20 Value 0x10\n\
            \n # A second mapping\n\
            Mapping\n\
            \x20 Key meh # a key\n\
            \x20 Value 0x100\n";
        let mut result = Mappings::default();
        parse_buffer(input, &mapping_statements(), &mut result).unwrap();
        assert_eq!(result.entries.len(), 2);
        assert_eq!(result.entries[0].key.as_deref(), Some("foo bar"));
        assert_eq!(result.entries[0].value, 16);
        assert_eq!(result.entries[1].key.as_deref(), Some("meh"));
        assert_eq!(result.entries[1].value, 256);
    }

    #[test]
    fn dispatcher_is_deterministic_over_reruns() {
        let input = "Key \"stable\"\nValue 7";
        let mut first = KeyValue::default();
        parse_buffer(input, &key_value_statements(), &mut first).unwrap();
        let mut second = KeyValue::default();
        parse_buffer(input, &key_value_statements(), &mut second).unwrap();
        assert_eq!(first.key, second.key);
        assert_eq!(first.value, second.value);
    }

    #[test]
    fn parse_file_reads_and_reports() {
        let dir = std::env::temp_dir().join("confparse-test-parse-file");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("simple.conf");
        std::fs::write(&path, "Key disk\nValue 9\n").unwrap();

        let mut result = KeyValue::default();
        parse_file(&path, &key_value_statements(), &mut result).unwrap();
        assert_eq!(result.key.as_deref(), Some("disk"));
        assert_eq!(result.value, 9);

        let err = parse_file(
            &dir.join("does-not-exist.conf"),
            &key_value_statements(),
            &mut result,
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Read);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
