//! Best-effort sentence splitter.
//!
//! Splits on `.`, `!`, `?` and `…` followed by whitespace, except after known
//! abbreviations and initials, inside open quotes, and before a lowercase
//! continuation (including dialogue attributions after a dash). Blank lines
//! and dialogue turns that start a new line are always boundaries.

use crate::types::TextRange;

use super::patterns::ABBREVIATIONS;

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…')
}

fn is_dash(c: char) -> bool {
    matches!(c, '—' | '–' | '-' | '―')
}

fn is_closing(c: char) -> bool {
    matches!(c, '”' | '»' | '’' | ')' | ']' | '\'')
}

/// Split text into trimmed sentence ranges (byte offsets).
pub fn split_sentences(text: &str) -> Vec<TextRange> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut quote_depth = 0usize;
    let mut straight_open = false;
    let mut i = 0usize;

    while i < chars.len() {
        let (pos, c) = chars[i];

        match c {
            '“' | '«' => quote_depth += 1,
            '”' | '»' => quote_depth = quote_depth.saturating_sub(1),
            '"' => straight_open = !straight_open,
            '\n' if starts_new_block(&chars, i) => {
                push_trimmed(text, start, pos, &mut sentences);
                start = pos;
                quote_depth = 0;
                straight_open = false;
            }
            c if is_terminator(c) => {
                // Consume the whole terminator run plus closing quotes/brackets.
                let mut j = i + 1;
                let mut run_len = 1;
                while j < chars.len() {
                    let next = chars[j].1;
                    if is_terminator(next) {
                        run_len += 1;
                    } else if next == '"' && straight_open {
                        straight_open = false;
                    } else if is_closing(next) {
                        if matches!(next, '”' | '»') {
                            quote_depth = quote_depth.saturating_sub(1);
                        }
                    } else {
                        break;
                    }
                    j += 1;
                }

                let end = chars.get(j).map(|(p, _)| *p).unwrap_or(text.len());
                let followed_by_space = chars.get(j).map(|(_, n)| n.is_whitespace()).unwrap_or(true);

                if followed_by_space
                    && quote_depth == 0
                    && !straight_open
                    && !(c == '.' && run_len == 1 && is_protected_period(text, pos))
                    && !continues_lowercase(&chars, j)
                {
                    push_trimmed(text, start, end, &mut sentences);
                    start = end;
                }

                i = j;
                continue;
            }
            _ => {}
        }

        i += 1;
    }

    push_trimmed(text, start, text.len(), &mut sentences);
    sentences
}

/// A newline that opens a blank line or a dialogue turn.
fn starts_new_block(chars: &[(usize, char)], newline: usize) -> bool {
    let mut j = newline + 1;
    while j < chars.len() && chars[j].1.is_whitespace() && chars[j].1 != '\n' {
        j += 1;
    }
    match chars.get(j) {
        Some((_, '\n')) => true,
        Some((_, c)) => is_dash(*c),
        None => false,
    }
}

/// The period at `pos` closes an abbreviation, an initial or a number.
fn is_protected_period(text: &str, pos: usize) -> bool {
    let before = &text[..pos];
    let word_start = before
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '.')
        .last()
        .map(|(i, _)| i)
        .unwrap_or(pos);
    let word = before[word_start..].trim_start_matches('.');
    if word.is_empty() {
        return false;
    }

    let lower = word.to_lowercase();
    if ABBREVIATIONS.contains(lower.as_str()) {
        return true;
    }

    // Initials such as "J. R. R. Tolkien" or "e.g."
    let mut letters = word.chars().filter(|c| c.is_alphabetic());
    let single_letter = matches!((letters.next(), letters.next()), (Some(_), None))
        && word.chars().all(|c| c.is_alphabetic() || c == '.');
    if single_letter && word.chars().next().is_some_and(char::is_uppercase) {
        return true;
    }

    // Dotted abbreviations: "e.g", "i.e", "U.S"
    word.contains('.') && word.split('.').all(|part| part.chars().count() <= 1)
}

/// The next visible text after `from` is a lowercase continuation.
fn continues_lowercase(chars: &[(usize, char)], from: usize) -> bool {
    let mut j = from;
    while j < chars.len() && chars[j].1.is_whitespace() {
        if chars[j].1 == '\n' && starts_new_block(chars, j) {
            return false;
        }
        j += 1;
    }
    // Skip a dialogue dash to reach the attribution ("—dijo ella").
    let mut saw_dash = false;
    while j < chars.len() && (is_dash(chars[j].1) || (saw_dash && chars[j].1 == ' ')) {
        saw_dash = true;
        j += 1;
    }
    chars
        .get(j)
        .map(|(_, c)| c.is_lowercase())
        .unwrap_or(false)
}

fn push_trimmed(text: &str, start: usize, end: usize, out: &mut Vec<TextRange>) {
    let slice = &text[start..end];
    let leading = slice.len() - slice.trim_start().len();
    let trailing = slice.len() - slice.trim_end().len();
    if leading + trailing >= slice.len() {
        return;
    }
    out.push(TextRange::new(start + leading, end - trailing));
}
