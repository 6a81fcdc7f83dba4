//! Physical-to-logical line splitting.
//!
//! The grammar in `grammar.pest` sees one logical line at a time. This pass
//! measures indentation, drops blank and comment-only lines, strips `#`
//! comments, and joins lines that continue inside brackets, string literals or
//! after a trailing backslash. Newlines are preserved inside a joined line so
//! that positions reported by the grammar map back to physical lines.

use crate::error::ParseError;

const TAB_WIDTH: usize = 8;

/// Deepest bracket nesting accepted within one logical line.
pub const MAX_BRACKET_DEPTH: usize = 100;

/// One logical line of source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    /// Physical line (1-based) the logical line starts on.
    pub number: usize,
    /// Indentation width, tabs expanded to multiples of eight.
    pub indent: usize,
    /// Column (1-based) of the first character of `text`.
    pub column: usize,
    pub text: String,
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Scanner {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_to_newline(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    /// Measure leading whitespace; returns (width, characters consumed).
    fn indentation(&mut self) -> (usize, usize) {
        let mut width = 0;
        let mut consumed = 0;
        while let Some(c) = self.peek() {
            match c {
                ' ' => width += 1,
                '\t' => width = (width / TAB_WIDTH + 1) * TAB_WIDTH,
                '\u{0C}' => width = 0,
                _ => break,
            }
            self.pos += 1;
            consumed += 1;
        }
        (width, consumed)
    }

    /// Copy a string literal starting at the opening quote into `out`.
    fn string(&mut self, quote: char, out: &mut String) -> Result<(), ParseError> {
        let start = self.line;
        let triple = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        let delimiter = if triple { 3 } else { 1 };
        for _ in 0..delimiter {
            self.bump();
            out.push(quote);
        }
        loop {
            let c = match self.peek() {
                Some(c) => c,
                None if triple => {
                    return Err(ParseError::new(start, 1, "unterminated triple-quoted string"))
                }
                None => return Err(ParseError::new(start, 1, "unterminated string literal")),
            };
            if c == '\n' && !triple {
                return Err(ParseError::new(start, 1, "unterminated string literal"));
            }
            if c == '\\' {
                self.bump();
                out.push(c);
                if let Some(escaped) = self.bump() {
                    out.push(escaped);
                }
                continue;
            }
            if c == quote
                && (!triple || (self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote)))
            {
                for _ in 0..delimiter {
                    self.bump();
                    out.push(quote);
                }
                return Ok(());
            }
            self.bump();
            out.push(c);
        }
    }
}

/// Split `source` into logical lines.
pub fn logical_lines(source: &str) -> Result<Vec<LogicalLine>, ParseError> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let normalized = source.replace("\r\n", "\n").replace('\r', "\n");
    let mut scanner = Scanner {
        chars: normalized.chars().collect(),
        pos: 0,
        line: 1,
    };
    let mut lines = Vec::new();

    while scanner.peek().is_some() {
        let number = scanner.line;
        let (indent, consumed) = scanner.indentation();
        match scanner.peek() {
            None => break,
            Some('\n') => {
                scanner.bump();
                continue;
            }
            Some('#') => {
                scanner.skip_to_newline();
                scanner.bump();
                continue;
            }
            Some(_) => {}
        }

        let mut text = String::new();
        let mut depth = 0usize;
        let mut open_line = number;
        loop {
            let Some(c) = scanner.peek() else {
                if depth > 0 {
                    return Err(ParseError::new(
                        open_line,
                        1,
                        "unexpected end of file inside brackets",
                    ));
                }
                break;
            };
            match c {
                '#' => scanner.skip_to_newline(),
                '\\' if scanner.peek_at(1) == Some('\n') => {
                    scanner.bump();
                    scanner.bump();
                    text.push_str(" \n");
                }
                '\'' | '"' => scanner.string(c, &mut text)?,
                '(' | '[' | '{' => {
                    if depth == 0 {
                        open_line = scanner.line;
                    }
                    depth += 1;
                    if depth > MAX_BRACKET_DEPTH {
                        return Err(ParseError::new(scanner.line, 1, "too many nested brackets"));
                    }
                    scanner.bump();
                    text.push(c);
                }
                ')' | ']' | '}' => {
                    depth = depth.saturating_sub(1);
                    scanner.bump();
                    text.push(c);
                }
                '\n' => {
                    scanner.bump();
                    if depth == 0 {
                        break;
                    }
                    text.push(c);
                }
                _ => {
                    scanner.bump();
                    text.push(c);
                }
            }
        }

        let trimmed = text.trim_end();
        if !trimmed.trim_start().is_empty() {
            lines.push(LogicalLine {
                number,
                indent,
                column: consumed + 1,
                text: trimmed.to_string(),
            });
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(source: &str) -> Vec<(usize, usize, String)> {
        logical_lines(source)
            .expect("layout")
            .into_iter()
            .map(|l| (l.number, l.indent, l.text))
            .collect()
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        let src = "# header\n\nx = 1  # trailing\n    \n  # indented comment\ny = 2\n";
        assert_eq!(
            texts(src),
            vec![(3, 0, "x = 1".to_string()), (6, 0, "y = 2".to_string())]
        );
    }

    #[test]
    fn measures_indentation_with_tabs() {
        let src = "def f():\n\treturn 1\n        pass\n";
        let lines = texts(src);
        assert_eq!(lines[1].1, 8);
        assert_eq!(lines[2].1, 8);
    }

    #[test]
    fn joins_bracket_continuations() {
        let src = "pkt = (Ether() /\n       IP(dst='1.2.3.4') /  # comment\n       TCP())\nz = 0\n";
        let lines = logical_lines(src).expect("layout");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].number, 1);
        assert_eq!(lines[0].text.lines().count(), 3);
        assert!(!lines[0].text.contains("comment"));
        assert_eq!(lines[1].number, 4);
    }

    #[test]
    fn joins_backslash_continuations() {
        let src = "x = 1 + \\\n    2\ny = 3\n";
        let lines = logical_lines(src).expect("layout");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].number, 3);
    }

    #[test]
    fn hash_inside_string_is_not_a_comment() {
        let lines = texts("s = 'a#b'  # real\n");
        assert_eq!(lines[0].2, "s = 'a#b'");
    }

    #[test]
    fn triple_quoted_strings_span_lines() {
        let src = "doc = \"\"\"first\n# not a comment\n(\"\"\"\nafter = 1\n";
        let lines = logical_lines(src).expect("layout");
        assert_eq!(lines.len(), 2);
        assert!(lines[0].text.contains("# not a comment"));
        assert_eq!(lines[1].number, 4);
    }

    #[test]
    fn escaped_quote_does_not_close_string() {
        let lines = texts("s = 'it\\'s'\n");
        assert_eq!(lines[0].2, "s = 'it\\'s'");
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = logical_lines("x = 1\ns = 'abc\n").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn unclosed_bracket_is_an_error() {
        let err = logical_lines("x = 1\ny = f(1,\n  2\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("brackets"));
    }

    #[test]
    fn bracket_nesting_is_bounded() {
        let ok = format!("x = {}1{}\n", "(".repeat(MAX_BRACKET_DEPTH), ")".repeat(MAX_BRACKET_DEPTH));
        assert_eq!(logical_lines(&ok).expect("layout").len(), 1);
        let deep = format!("a = 1\nx = {}1{}\n", "[".repeat(5000), "]".repeat(5000));
        let err = logical_lines(&deep).unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("nested brackets"));
    }

    #[test]
    fn handles_crlf_and_bom() {
        let lines = texts("\u{feff}a = 1\r\nb = 2\r\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].0, 2);
    }
}
