//! Disambiguation and body-extraction helpers for the three substitution
//! forms that embed an entire sub-script inside a word: `$((...))` vs
//! `$(...)` subshells, `$(...)` command substitution, and legacy backtick
//! substitution. These operate on raw char slices rather than the lexer's
//! token stream because the ambiguity between arithmetic and command
//! substitution can only be resolved by scanning the candidate body itself.

use crate::ast::types::{CommandSubstitutionPart, ScriptNode, AST};

/// Factory that turns a substitution body string into a fully parsed
/// sub-script. Passed as a function pointer rather than called directly to
/// keep this module free of a dependency on the top-level `Parser`.
pub type ParserFactory = fn(&str) -> ScriptNode;

/// Error-reporting callback; implementations are expected to panic, which
/// is why call sites below follow it with `unreachable!()`.
pub type ErrorFn = fn(&str);

/// Bash treats `$((` as ambiguous: it's almost always arithmetic, but it can
/// also be a command substitution whose body happens to start with a
/// parenthesized subshell, e.g. `$((cmd) 2>/dev/null)`. Scan forward from
/// `start` (the `$` of `$((`) tracking paren depth and quoting, and decide
/// which reading applies:
///
/// - the inner `)` closing immediately into another `)` (i.e. `))`) means
///   the parens are adjacent, which is the arithmetic shape;
/// - the inner `)` followed by anything else before the matching outer `)`
///   means there's a subshell with trailing redirections/pipeline syntax,
///   which is the command-substitution shape;
/// - seeing `|`, `||`, or `&&` at depth 1 (inside the outer parens, outside
///   any inner ones) means commands are being connected, also command
///   substitution.
///
/// Returns `true` for the command-substitution reading, `false` for
/// arithmetic (including the fallback when neither heuristic fires).
pub fn is_dollar_dparen_subshell(value: &str, start: usize) -> bool {
    let chars: Vec<char> = value.chars().collect();
    let len = chars.len();
    let mut pos = start + 3;
    let mut paren_depth: i32 = 2;
    let mut single_quoted = false;
    let mut double_quoted = false;

    while pos < len && paren_depth > 0 {
        let ch = chars[pos];

        if single_quoted {
            if ch == '\'' {
                single_quoted = false;
            }
            pos += 1;
            continue;
        }

        if double_quoted {
            if ch == '\\' {
                pos += 2;
                continue;
            }
            if ch == '"' {
                double_quoted = false;
            }
            pos += 1;
            continue;
        }

        match ch {
            '\'' => {
                single_quoted = true;
                pos += 1;
            }
            '"' => {
                double_quoted = true;
                pos += 1;
            }
            '\\' => {
                pos += 2;
            }
            '(' => {
                paren_depth += 1;
                pos += 1;
            }
            ')' => {
                paren_depth -= 1;
                if paren_depth == 1 {
                    let followed_by_close = chars.get(pos + 1) == Some(&')');
                    return !followed_by_close;
                }
                if paren_depth == 0 {
                    return false;
                }
                pos += 1;
            }
            '|' if paren_depth == 1 && pos + 1 < len => return true,
            '&' if paren_depth == 1 && chars.get(pos + 1) == Some(&'&') => return true,
            _ => pos += 1,
        }
    }

    false
}

/// Tracks whether the scanner inside [`parse_command_substitution_from_string`]
/// is currently inside a `case ... esac` pattern list, where a bare `)`
/// closes a pattern instead of decrementing paren depth.
struct CaseScanState {
    case_depth: u32,
    in_pattern: bool,
    word_buffer: String,
}

impl CaseScanState {
    fn new() -> Self {
        Self { case_depth: 0, in_pattern: false, word_buffer: String::new() }
    }

    /// Feed one non-quoted, non-escaped word character.
    fn push_word_char(&mut self, ch: char) {
        self.word_buffer.push(ch);
    }

    /// Called on a non-word character (or EOF) to flush the accumulated
    /// identifier and update case-statement tracking if it was a keyword.
    fn flush_word(&mut self) {
        match self.word_buffer.as_str() {
            "case" => {
                self.case_depth += 1;
                self.in_pattern = false;
            }
            "in" if self.case_depth > 0 => self.in_pattern = true,
            "esac" if self.case_depth > 0 => {
                self.case_depth -= 1;
                self.in_pattern = false;
            }
            _ => {}
        }
        self.word_buffer.clear();
    }
}

/// Parse a `$(...)` command substitution starting at `start` (the `$` of
/// `$(`). Depth tracking has to understand quoting, escapes, nested `$(`,
/// and `case`/`esac` pattern lists (where a bare `)` terminates a pattern
/// rather than closing the substitution) to find the matching close paren.
/// On success returns the parsed body and the index just past the closing
/// `)`; on an unterminated substitution, invokes `error` (expected to
/// panic) and never returns normally.
pub fn parse_command_substitution_from_string(
    value: &str,
    start: usize,
    create_parser: ParserFactory,
    error: ErrorFn,
) -> (CommandSubstitutionPart, usize) {
    let chars: Vec<char> = value.chars().collect();
    let body_start = start + 2;
    let mut depth = 1;
    let mut cursor = body_start;

    let mut single_quoted = false;
    let mut double_quoted = false;
    let mut case = CaseScanState::new();

    while cursor < chars.len() && depth > 0 {
        let ch = chars[cursor];

        if single_quoted {
            if ch == '\'' {
                single_quoted = false;
            }
        } else if double_quoted {
            if ch == '\\' && cursor + 1 < chars.len() {
                cursor += 1;
            } else if ch == '"' {
                double_quoted = false;
            }
        } else if ch == '\'' {
            single_quoted = true;
            case.word_buffer.clear();
        } else if ch == '"' {
            double_quoted = true;
            case.word_buffer.clear();
        } else if ch == '\\' && cursor + 1 < chars.len() {
            cursor += 1;
            case.word_buffer.clear();
        } else if ch.is_ascii_alphabetic() || ch == '_' {
            case.push_word_char(ch);
        } else {
            case.flush_word();

            if ch == '(' {
                let is_nested_substitution = cursor > 0 && chars[cursor - 1] == '$';
                if is_nested_substitution || !case.in_pattern {
                    depth += 1;
                }
            } else if ch == ')' {
                if case.in_pattern {
                    case.in_pattern = false;
                } else {
                    depth -= 1;
                }
            } else if ch == ';' && case.case_depth > 0 && chars.get(cursor + 1) == Some(&';') {
                case.in_pattern = true;
            }
        }

        if depth > 0 {
            cursor += 1;
        }
    }

    if depth > 0 {
        error("unexpected EOF while looking for matching `)'");
        unreachable!("error function should panic");
    }

    let body_text: String = chars[body_start..cursor].iter().collect();
    let body = create_parser(&body_text);

    (CommandSubstitutionPart { body, legacy: false }, cursor + 1)
}

/// Parse a legacy backtick substitution starting at `start` (the opening
/// backtick). Backtick escaping is narrower than double-quote escaping:
/// only `\$`, `` \` ``, `\\`, and `\<newline>` drop their backslash
/// unconditionally, `\"` drops its backslash only when the backtick itself
/// sits inside a double-quoted word (`in_double_quotes`), and every other
/// `\x` keeps the backslash literally. Returns the parsed body and the
/// index just past the closing backtick, or invokes `error` (expected to
/// panic) if the backtick is never closed.
pub fn parse_backtick_substitution_from_string(
    value: &str,
    start: usize,
    in_double_quotes: bool,
    create_parser: ParserFactory,
    error: ErrorFn,
) -> (CommandSubstitutionPart, usize) {
    let chars: Vec<char> = value.chars().collect();
    let mut cursor = start + 1;
    let mut body_text = String::new();

    while cursor < chars.len() && chars[cursor] != '`' {
        if chars[cursor] == '\\' && cursor + 1 < chars.len() {
            let next = chars[cursor + 1];
            let drops_backslash = matches!(next, '$' | '`' | '\\' | '\n')
                || (in_double_quotes && next == '"');
            if drops_backslash {
                if next != '\n' {
                    body_text.push(next);
                }
            } else {
                body_text.push(chars[cursor]);
            }
            cursor += if drops_backslash { 2 } else { 1 };
        } else {
            body_text.push(chars[cursor]);
            cursor += 1;
        }
    }

    if cursor >= chars.len() {
        error("unexpected EOF while looking for matching ``'");
        unreachable!("error function should panic");
    }

    let body = create_parser(&body_text);
    (CommandSubstitutionPart { body, legacy: true }, cursor + 1)
}
