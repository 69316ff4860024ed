//! Escaping and delimiter-aware splitting.
//!
//! Three characters are reserved: [`FIELD_SEPARATOR`], [`COMMAND_SEPARATOR`]
//! and [`ESCAPE_CHAR`]. Inside a value each of them is sent as the escape
//! marker followed by the literal character. Nothing else is reserved.

/// Separates arguments within a command.
pub const FIELD_SEPARATOR: char = ',';

/// Terminates a command.
pub const COMMAND_SEPARATOR: char = ';';

/// Marks the following character as literal.
pub const ESCAPE_CHAR: char = '/';

/// Whether empty tokens survive a split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SplitOptions {
    /// Drop empty tokens. Used for frame splitting.
    #[default]
    RemoveEmpty,
    /// Keep empty tokens, for protocols where an empty optional argument
    /// still occupies its position.
    KeepEmpty,
}

/// Returns true for the characters that must be escaped inside a value.
pub fn is_reserved(c: char) -> bool {
    matches!(c, FIELD_SEPARATOR | COMMAND_SEPARATOR | ESCAPE_CHAR)
}

/// Prefix every reserved character in `value` with the escape marker.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + value.len() / 8);
    for c in value.chars() {
        if is_reserved(c) {
            out.push(ESCAPE_CHAR);
        }
        out.push(c);
    }
    out
}

/// Reverse [`escape`]: each escape marker is dropped and the character after
/// it kept literally. A marker with nothing after it is kept as-is.
pub fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == ESCAPE_CHAR {
            match chars.next() {
                Some(literal) => out.push(literal),
                None => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Split `text` on `separator`, honouring escape pairs.
///
/// Escape pairs are recognised left to right, so `//,` is an escaped marker
/// followed by a real separator. Tokens keep their escape pairs; run them
/// through [`unescape`] to recover values.
pub fn split(text: &str, separator: char, escape: char, options: SplitOptions) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c == escape {
            current.push(c);
            if let Some(literal) = chars.next() {
                current.push(literal);
            }
        } else if c == separator {
            push_token(&mut tokens, std::mem::take(&mut current), options);
        } else {
            current.push(c);
        }
    }
    push_token(&mut tokens, current, options);
    tokens
}

fn push_token(tokens: &mut Vec<String>, token: String, options: SplitOptions) {
    if options == SplitOptions::KeepEmpty || !token.is_empty() {
        tokens.push(token);
    }
}

/// Cut `text` at its first unescaped `terminator`, dropping the terminator
/// and anything after it. Text without a terminator is returned whole.
pub fn strip_terminator(text: &str, terminator: char, escape: char) -> &str {
    let mut chars = text.char_indices();
    while let Some((idx, c)) = chars.next() {
        if c == escape {
            chars.next();
        } else if c == terminator {
            return &text[..idx];
        }
    }
    text
}

/// Result of scanning a byte buffer for the next frame terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scan {
    /// Unescaped terminator at this byte offset.
    Terminator(usize),
    /// No terminator yet. Scanning can resume at this offset once more input
    /// arrives; it points at a dangling escape marker or at the end.
    Incomplete { resume: usize },
}

/// Scan `buf` from `from` for an unescaped `;`.
///
/// All reserved characters are ASCII, so the scan works on UTF-8 bytes
/// directly: continuation bytes never match a delimiter.
pub(crate) fn scan_for_terminator(buf: &[u8], from: usize) -> Scan {
    let mut pos = from;
    while pos < buf.len() {
        match buf[pos] {
            b'/' => {
                if pos + 1 == buf.len() {
                    return Scan::Incomplete { resume: pos };
                }
                pos += 2;
            }
            b';' => return Scan::Terminator(pos),
            _ => pos += 1,
        }
    }
    Scan::Incomplete { resume: pos }
}
