use crate::error::{Error, ErrorKind, Result, assign_bits};

/// Position of the line currently being scanned.
#[derive(Debug, Clone, Copy)]
pub struct Line {
    /// Byte offset of the first character of the line.
    pub start: usize,
    /// Line number, starting from 0.
    pub number: usize,
}

/// Cursor state over a borrowed input buffer. The context never owns the
/// buffer and the cursor never moves past its end.
pub struct Context<'a> {
    input: &'a str,
    cursor: usize,
    line: Line,
}

/// Whitespace in the sense of isspace(3) in the C locale.
pub(crate) fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\x0b' | b'\x0c' | b'\r')
}

const TRUES: [&str; 4] = ["True", "true", "yes", "on"];
const FALSES: [&str; 4] = ["False", "false", "no", "off"];

impl<'a> Context<'a> {
    pub fn new(input: &'a str) -> Self {
        Context {
            input,
            cursor: 0,
            line: Line { start: 0, number: 0 },
        }
    }

    /// Current byte offset into the input.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn at_end(&self) -> bool {
        self.cursor >= self.input.len()
    }

    /// The unconsumed remainder of the input.
    pub fn rest(&self) -> &'a str {
        &self.input[self.cursor..]
    }

    pub fn line(&self) -> Line {
        self.line
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.cursor).copied()
    }

    pub(crate) fn bump(&mut self) {
        if self.cursor < self.input.len() {
            self.cursor += 1;
        }
    }

    pub(crate) fn rewind(&mut self, position: usize) {
        self.cursor = position;
    }

    /// Record that the cursor sits on a newline; the next line starts right
    /// after it.
    pub(crate) fn newline(&mut self) {
        self.line.start = self.cursor + 1;
        self.line.number += 1;
    }

    /// Build a positioned error at the current line.
    pub fn error(&self, kind: ErrorKind, message: impl AsRef<str>) -> Error {
        let line = self.line;
        self.error_at(kind, &line, message)
    }

    /// Build a positioned error against an explicitly saved line, for
    /// constructs (like quoted strings) that span lines and want to report
    /// where they started.
    pub fn error_at(&self, kind: ErrorKind, line: &Line, message: impl AsRef<str>) -> Error {
        Error::new(
            kind,
            format!(
                "line {}, char {}: {}",
                line.number + 1,
                self.cursor.saturating_sub(line.start),
                message.as_ref()
            ),
        )
    }

    /// Advance past spaces and tabs. Never crosses a newline or the end of
    /// the input.
    pub fn skip_line_spaces(&mut self) {
        while let Some(byte) = self.peek() {
            if byte != b' ' && byte != b'\t' {
                break;
            }
            self.bump();
        }
    }

    /// Advance to the beginning of the next field on this line, failing if
    /// the line (or the input) ends first.
    pub fn skip_until_field(&mut self) -> Result<()> {
        self.skip_line_spaces();
        match self.peek() {
            None => Err(self.error(
                ErrorKind::Unexpected,
                "was expecting a field, found end of input",
            )),
            Some(byte) if is_space(byte) => Err(self.error(
                ErrorKind::Unexpected,
                "was expecting a field, found end of line",
            )),
            Some(_) => Ok(()),
        }
    }

    /// Advance to the end of the current line without consuming the newline.
    pub fn skip_until_eol(&mut self) {
        while let Some(byte) = self.peek() {
            if byte == b'\n' {
                break;
            }
            self.bump();
        }
    }

    /// Consume the command token under the cursor: everything up to the next
    /// whitespace or the end of the input.
    pub(crate) fn take_token(&mut self) -> &'a str {
        let start = self.cursor;
        while let Some(byte) = self.peek() {
            if is_space(byte) {
                break;
            }
            self.bump();
        }
        &self.input[start..self.cursor]
    }

    /// Parse a string enclosed in double quotes. The string may contain
    /// spaces and newlines; `\"` and `\\` are the only escape sequences.
    pub fn parse_quoted_string(&mut self) -> Result<String> {
        self.skip_until_field()?;
        match self.peek() {
            Some(b'"') => {}
            Some(byte) => {
                return Err(self.error(
                    ErrorKind::ParseQuote,
                    format!(
                        "was expecting a quoted string, starting with '\"', found '{}'",
                        byte as char
                    ),
                ));
            }
            None => {
                return Err(self.error(
                    ErrorKind::Unexpected,
                    "was expecting a quoted string, found end of input",
                ));
            }
        }

        // Unterminated strings are reported at the opening quote.
        let opening = self.line;
        self.bump();

        let mut value = String::new();
        let mut segment = self.cursor;
        loop {
            match self.peek() {
                None => {
                    return Err(self.error_at(
                        ErrorKind::Unexpected,
                        &opening,
                        "reached end of input without finding the closing '\"'",
                    ));
                }
                Some(b'"') => {
                    value.push_str(&self.input[segment..self.cursor]);
                    self.bump();
                    break;
                }
                Some(b'\n') => {
                    self.newline();
                    self.bump();
                }
                Some(b'\\') => {
                    value.push_str(&self.input[segment..self.cursor]);
                    match self.input.as_bytes().get(self.cursor + 1) {
                        None => {
                            self.bump();
                            return Err(self.error(
                                ErrorKind::Unexpected,
                                "reached end of input while processing escape '\\'",
                            ));
                        }
                        Some(escaped @ (b'"' | b'\\')) => {
                            value.push(*escaped as char);
                            self.cursor += 2;
                            segment = self.cursor;
                        }
                        Some(other) => {
                            return Err(self.error(
                                ErrorKind::ParseQuote,
                                format!(
                                    "escape sequence '\\{}' is unknown, only \\\\ and \\\" are supported",
                                    *other as char
                                ),
                            ));
                        }
                    }
                }
                Some(_) => self.bump(),
            }
        }
        Ok(value)
    }

    /// Parse a string: either quoted, or a bare token ending at the first
    /// whitespace.
    pub fn parse_string(&mut self) -> Result<String> {
        self.skip_until_field()?;
        if self.peek() == Some(b'"') {
            return self.parse_quoted_string();
        }
        Ok(self.take_token().to_string())
    }

    /// Parse an unsigned C-style numeric literal (decimal, 0x hex, leading-0
    /// octal), optionally preceded by '+'. The value must not exceed `limit`
    /// and must be terminated by whitespace or the end of the input.
    pub fn parse_uint64(&mut self, limit: u64) -> Result<u64> {
        self.skip_until_field()?;
        let Some(byte) = self.peek() else {
            return Err(self.error(ErrorKind::ParseInt, "was expecting a digit, found nothing"));
        };
        if !byte.is_ascii_digit() && byte != b'+' {
            return Err(self.error(
                ErrorKind::ParseInt,
                format!("was expecting a digit, found '{}'", byte as char),
            ));
        }
        let field = self.cursor;
        if byte == b'+' {
            self.bump();
        }
        let value = self.scan_unsigned(field);
        if let Some(byte) = self.peek() {
            if !is_space(byte) {
                return Err(self.error(
                    ErrorKind::ParseInt,
                    format!("was expecting a number, found invalid '{}'", byte as char),
                ));
            }
        }
        match value {
            Some(value) if value <= limit => Ok(value),
            _ => Err(self.error(
                ErrorKind::ParseInt,
                format!("specified number is too large (max: {limit})"),
            )),
        }
    }

    /// Parse a signed C-style numeric literal and enforce `min <= value <= max`.
    pub fn parse_int64(&mut self, min: i64, max: i64) -> Result<i64> {
        self.skip_until_field()?;
        let Some(byte) = self.peek() else {
            return Err(self.error(ErrorKind::ParseInt, "was expecting a digit, found nothing"));
        };
        if !byte.is_ascii_digit() && byte != b'+' && byte != b'-' {
            return Err(self.error(
                ErrorKind::ParseInt,
                format!("was expecting a digit, found '{}'", byte as char),
            ));
        }
        let field = self.cursor;
        let negative = byte == b'-';
        if byte == b'+' || byte == b'-' {
            self.bump();
        }
        let magnitude = self.scan_unsigned(field);
        if let Some(byte) = self.peek() {
            if !is_space(byte) {
                return Err(self.error(
                    ErrorKind::ParseInt,
                    format!("was expecting a number, found invalid '{}'", byte as char),
                ));
            }
        }
        let value = match magnitude {
            Some(magnitude) if negative => -(magnitude as i128),
            Some(magnitude) => magnitude as i128,
            None if negative => i128::MIN,
            None => i128::MAX,
        };
        if value < min as i128 || value > max as i128 {
            return Err(self.error(
                ErrorKind::ParseInt,
                format!("specified number is outside valid range (min: {min}, max: {max})"),
            ));
        }
        Ok(value as i64)
    }

    /// Scan the digits of an unsigned literal, choosing the radix from the
    /// prefix. Consumes every digit even when the value overflows, in which
    /// case None is returned; on a malformed literal the cursor is restored
    /// to `field` so the caller's terminator check reports the right spot.
    fn scan_unsigned(&mut self, field: usize) -> Option<u64> {
        let bytes = self.input.as_bytes();
        let (radix, digits): (u64, fn(u8) -> bool) = match self.peek() {
            Some(b'0') => {
                if matches!(bytes.get(self.cursor + 1), Some(b'x' | b'X'))
                    && bytes
                        .get(self.cursor + 2)
                        .is_some_and(|b| b.is_ascii_hexdigit())
                {
                    self.cursor += 2;
                    (16, |b: u8| b.is_ascii_hexdigit())
                } else {
                    (8, |b: u8| (b'0'..=b'7').contains(&b))
                }
            }
            Some(b) if b.is_ascii_digit() => (10, |b: u8| b.is_ascii_digit()),
            _ => {
                self.rewind(field);
                return None;
            }
        };

        let mut value: Option<u64> = Some(0);
        while let Some(byte) = self.peek() {
            if !digits(byte) {
                break;
            }
            let digit = match byte {
                b'0'..=b'9' => (byte - b'0') as u64,
                b'a'..=b'f' => (byte - b'a' + 10) as u64,
                _ => (byte - b'A' + 10) as u64,
            };
            value = value
                .and_then(|v| v.checked_mul(radix))
                .and_then(|v| v.checked_add(digit));
            self.bump();
        }
        value
    }

    /// Match one of the boolean spellings at the cursor and advance past it.
    fn scan_bool(&mut self) -> Result<bool> {
        self.skip_until_field()?;
        let rest = self.rest();
        for option in TRUES {
            if rest.starts_with(option) {
                self.cursor += option.len();
                return Ok(true);
            }
        }
        for option in FALSES {
            if rest.starts_with(option) {
                self.cursor += option.len();
                return Ok(false);
            }
        }
        Err(self.error(
            ErrorKind::ParseBool,
            "was expecting a boolean (True/true/yes/on or False/false/no/off)",
        ))
    }

    /// Parse a boolean into a pair of bits inside a 64-bit flag word: a true
    /// value sets `seen | flip`, a false value sets `seen` and clears `flip`.
    /// The bits are stored before the terminator is validated, so a trailing
    /// junk character fails the parse but leaves the bits assigned.
    pub fn parse_bool64(&mut self, seen: u64, flip: u64, dest: &mut u64) -> Result<()> {
        let value = self.scan_bool()?;
        *dest = if value {
            assign_bits(*dest, seen | flip, seen | flip)
        } else {
            assign_bits(*dest, seen, seen | flip)
        };
        if let Some(byte) = self.peek() {
            if !is_space(byte) {
                return Err(self.error(
                    ErrorKind::ParseBool,
                    format!("unexpected character after boolean '{}'", byte as char),
                ));
            }
        }
        Ok(())
    }

    /// 32-bit variant of [`Context::parse_bool64`].
    pub fn parse_bool32(&mut self, seen: u32, flip: u32, dest: &mut u32) -> Result<()> {
        let mut wide = u64::from(*dest);
        let result = self.parse_bool64(u64::from(seen), u64::from(flip), &mut wide);
        *dest = wide as u32;
        result
    }
}
