//! Shell-style glob matching with path-separator semantics.
//!
//! Pattern and text are split at `/` and matched segment by segment, so `*`
//! and `?` never cross a separator (the fnmatch(3) FNM_PATHNAME behavior).
//! Bracket classes support plain characters, ranges and `!`/`^` negation.

/// Match `pattern` against `text`, treating `/` as a separator that
/// wildcards cannot cross.
pub fn matches(pattern: &str, text: &str) -> bool {
    let pattern_parts: Vec<&str> = pattern.split('/').collect();
    let text_parts: Vec<&str> = text.split('/').collect();

    if pattern_parts.len() != text_parts.len() {
        return false;
    }

    pattern_parts
        .iter()
        .zip(text_parts.iter())
        .all(|(pattern, text)| {
            let pattern: Vec<char> = pattern.chars().collect();
            let text: Vec<char> = text.chars().collect();
            segment_matches(&pattern, &text)
        })
}

fn segment_matches(pattern: &[char], text: &[char]) -> bool {
    let Some(&first) = pattern.first() else {
        return text.is_empty();
    };

    match first {
        '*' => {
            // '*' matches zero or more characters within the segment.
            for skip in 0..=text.len() {
                if segment_matches(&pattern[1..], &text[skip..]) {
                    return true;
                }
            }
            false
        }
        '?' => !text.is_empty() && segment_matches(&pattern[1..], &text[1..]),
        '[' => match bracket_class(pattern) {
            Some((rest, class)) => match text.first() {
                Some(&ch) if class.contains(ch) => segment_matches(rest, &text[1..]),
                _ => false,
            },
            // Unterminated class: '[' matches itself.
            None => {
                !text.is_empty() && text[0] == '[' && segment_matches(&pattern[1..], &text[1..])
            }
        },
        ch => !text.is_empty() && text[0] == ch && segment_matches(&pattern[1..], &text[1..]),
    }
}

struct BracketClass {
    negated: bool,
    singles: Vec<char>,
    ranges: Vec<(char, char)>,
}

impl BracketClass {
    fn contains(&self, ch: char) -> bool {
        let member = self.singles.contains(&ch)
            || self.ranges.iter().any(|&(lo, hi)| ch >= lo && ch <= hi);
        member != self.negated
    }
}

/// Parse a bracket class at the head of `pattern`, returning the remainder
/// of the pattern and the class. None if the class never closes.
fn bracket_class(pattern: &[char]) -> Option<(&[char], BracketClass)> {
    let mut index = 1;
    let negated = matches!(pattern.get(index), Some('!' | '^'));
    if negated {
        index += 1;
    }

    let mut class = BracketClass {
        negated,
        singles: Vec::new(),
        ranges: Vec::new(),
    };

    // A ']' in first position is a literal member, not the terminator.
    let mut first = true;
    loop {
        let ch = *pattern.get(index)?;
        if ch == ']' && !first {
            return Some((&pattern[index + 1..], class));
        }
        first = false;
        if pattern.get(index + 1) == Some(&'-') && pattern.get(index + 2).is_some_and(|&c| c != ']')
        {
            class.ranges.push((ch, pattern[index + 2]));
            index += 3;
        } else {
            class.singles.push(ch);
            index += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_and_star() {
        assert!(matches("sshd", "sshd"));
        assert!(!matches("sshd", "sshx"));
        assert!(matches("*", "anything"));
        assert!(matches("ssh*", "sshd"));
        assert!(matches("*sh*", "zsh-static"));
        assert!(!matches("ssh*", "bash"));
    }

    #[test]
    fn question_mark() {
        assert!(matches("ssh?", "sshd"));
        assert!(!matches("ssh?", "ssh"));
        assert!(!matches("ssh?", "sshdd"));
    }

    #[test]
    fn wildcards_do_not_cross_separators() {
        assert!(matches("/usr/sbin/*", "/usr/sbin/sshd"));
        assert!(!matches("/usr/*", "/usr/sbin/sshd"));
        assert!(matches("/usr/*/sshd", "/usr/sbin/sshd"));
        assert!(!matches("*", "/usr/sbin/sshd"));
        assert!(matches("/*/sbin/ssh?", "/usr/sbin/sshd"));
    }

    #[test]
    fn bracket_classes() {
        assert!(matches("sshd.[0-9]", "sshd.3"));
        assert!(!matches("sshd.[0-9]", "sshd.x"));
        assert!(matches("[bd]ash", "bash"));
        assert!(matches("[bd]ash", "dash"));
        assert!(!matches("[bd]ash", "cash"));
        assert!(matches("[!0-9]sh", "zsh"));
        assert!(!matches("[!0-9]sh", "1sh"));
        assert!(matches("[]]", "]"));
    }

    #[test]
    fn unterminated_bracket_is_literal() {
        assert!(matches("a[b", "a[b"));
        assert!(!matches("a[b", "ab"));
    }

    #[test]
    fn empty_segments() {
        assert!(matches("", ""));
        assert!(!matches("", "x"));
        assert!(matches("/usr//sshd", "/usr//sshd"));
    }
}
