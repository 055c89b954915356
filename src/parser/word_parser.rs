//! Word-level string scanning shared across the parser: matching-bracket
//! and quote-aware delimiter search (used by parameter expansion and glob
//! parsing), `$'...'` ANSI-C escape decoding, brace-expansion range/list
//! parsing, and the `WordNode -> String` reconstruction used when an array
//! assignment's element words need to be folded back into a single
//! argument string for `declare`/`local`.

use crate::ast::types::{
    ArithExpr, ArithNumberNode, ArithmeticExpressionNode, BraceExpansionPart, BraceItem,
    BraceRangeValue, DoubleQuotedPart, EscapedPart, GlobPart, LiteralPart, RedirectionOperator,
    SingleQuotedPart, TildeExpansionPart, WordNode, WordPart, AST,
};
use crate::parser::arithmetic_parser::parse_arithmetic_expression;
use crate::parser::lexer::TokenType;

/// Decode raw bytes (collected from one or more consecutive `\xHH` escapes)
/// as UTF-8, falling back to treating any byte that doesn't fit a valid
/// sequence as a standalone Latin-1 character. This mirrors bash's own
/// permissive handling of `$'\xNN'` sequences, which never fails outright
/// on malformed input.
fn decode_utf8_with_recovery(bytes: &[u8]) -> String {
    let emit_latin1 = |out: &mut String, byte: u8| out.push(byte as char);

    let mut out = String::new();
    let mut i = 0;
    while i < bytes.len() {
        let lead = bytes[i];

        if lead < 0x80 {
            out.push(lead as char);
            i += 1;
            continue;
        }

        let continuation = |idx: usize| bytes.get(idx).map_or(false, |b| (b & 0xc0) == 0x80);

        if (lead & 0xe0) == 0xc0 && continuation(i + 1) && lead >= 0xc2 {
            let cp = ((lead as u32 & 0x1f) << 6) | (bytes[i + 1] as u32 & 0x3f);
            if let Some(c) = char::from_u32(cp) {
                out.push(c);
            }
            i += 2;
            continue;
        }

        if (lead & 0xf0) == 0xe0 && continuation(i + 1) && continuation(i + 2) {
            let overlong = lead == 0xe0 && bytes[i + 1] < 0xa0;
            let cp = ((lead as u32 & 0x0f) << 12)
                | ((bytes[i + 1] as u32 & 0x3f) << 6)
                | (bytes[i + 2] as u32 & 0x3f);
            let is_surrogate = (0xd800..=0xdfff).contains(&cp);
            if overlong || is_surrogate {
                emit_latin1(&mut out, lead);
                i += 1;
                continue;
            }
            if let Some(c) = char::from_u32(cp) {
                out.push(c);
            }
            i += 3;
            continue;
        }

        if (lead & 0xf8) == 0xf0 && lead <= 0xf4 && continuation(i + 1) && continuation(i + 2) && continuation(i + 3) {
            let overlong = lead == 0xf0 && bytes[i + 1] < 0x90;
            let cp = ((lead as u32 & 0x07) << 18)
                | ((bytes[i + 1] as u32 & 0x3f) << 12)
                | ((bytes[i + 2] as u32 & 0x3f) << 6)
                | (bytes[i + 3] as u32 & 0x3f);
            if overlong || cp > 0x10ffff {
                emit_latin1(&mut out, lead);
                i += 1;
                continue;
            }
            if let Some(c) = char::from_u32(cp) {
                out.push(c);
            }
            i += 4;
            continue;
        }

        emit_latin1(&mut out, lead);
        i += 1;
    }

    out
}

/// Find the end of a `~name` tilde prefix: the span of alphanumeric,
/// `_`, and `-` characters immediately following the `~` at `start`.
pub fn find_tilde_end(value: &str, start: usize) -> usize {
    let chars: Vec<char> = value.chars().collect();
    let mut pos = start + 1;
    while pos < chars.len() && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_' || chars[pos] == '-') {
        pos += 1;
    }
    pos
}

/// Find the index of the `close` bracket matching the `open` bracket at
/// `start`, tracking nested depth. Returns `-1` if unterminated.
pub fn find_matching_bracket(value: &str, start: usize, open: char, close: char) -> isize {
    let chars: Vec<char> = value.chars().collect();
    let mut depth = 1;
    let mut pos = start + 1;

    while pos < chars.len() && depth > 0 {
        if chars[pos] == open {
            depth += 1;
        } else if chars[pos] == close {
            depth -= 1;
        }
        if depth > 0 {
            pos += 1;
        }
    }

    if depth == 0 { pos as isize } else { -1 }
}

/// Find the end of a `${...}` parameter-operation body starting just past
/// the opening brace, skipping over quoted substrings (whose `{`/`}` don't
/// count) so nested braces inside quotes don't confuse the depth count.
pub fn find_parameter_operation_end(value: &str, start: usize) -> usize {
    let chars: Vec<char> = value.chars().collect();
    let mut pos = start;
    let mut depth = 1;

    while pos < chars.len() && depth > 0 {
        let ch = chars[pos];

        if ch == '\\' && pos + 1 < chars.len() {
            pos += 2;
            continue;
        }

        if ch == '\'' {
            if let Some(close) = chars[pos + 1..].iter().position(|&c| c == '\'') {
                pos = pos + 1 + close + 1;
                continue;
            }
        }

        if ch == '"' {
            pos += 1;
            while pos < chars.len() && chars[pos] != '"' {
                pos += if chars[pos] == '\\' && pos + 1 < chars.len() { 2 } else { 1 };
            }
            if pos < chars.len() {
                pos += 1;
            }
            continue;
        }

        if ch == '{' {
            depth += 1;
        } else if ch == '}' {
            depth -= 1;
        }
        if depth > 0 {
            pos += 1;
        }
    }

    pos
}

/// Find the end of a pattern operand inside `${var/pat/repl}`-family
/// expansions: runs until an un-escaped, unquoted `/` or `}`, except that
/// the very first character is never treated as the `/` delimiter (so
/// `${x////c}` reads the pattern as a literal `/`).
pub fn find_pattern_end(value: &str, start: usize) -> usize {
    let chars: Vec<char> = value.chars().collect();
    let mut pos = start;
    let mut consumed_any = false;

    while pos < chars.len() {
        let ch = chars[pos];
        if (ch == '/' && consumed_any) || ch == '}' {
            break;
        }

        if ch == '\'' {
            if let Some(close) = chars[pos + 1..].iter().position(|&c| c == '\'') {
                pos = pos + 1 + close + 1;
                consumed_any = true;
                continue;
            }
        }

        if ch == '"' {
            pos += 1;
            while pos < chars.len() && chars[pos] != '"' {
                pos += if chars[pos] == '\\' && pos + 1 < chars.len() { 2 } else { 1 };
            }
            if pos < chars.len() {
                pos += 1;
            }
            consumed_any = true;
            continue;
        }

        pos += if ch == '\\' { 2 } else { 1 };
        consumed_any = true;
    }

    pos
}

/// Parse a run of glob metacharacters (`*`, `?`, `[...]`) starting at
/// `start`, returning the matched text and the position just past it.
pub fn parse_glob_pattern(value: &str, start: usize) -> (String, usize) {
    let chars: Vec<char> = value.chars().collect();
    let mut pos = start;
    let mut pattern = String::new();

    while pos < chars.len() {
        match chars[pos] {
            '*' | '?' => {
                pattern.push(chars[pos]);
                pos += 1;
            }
            '[' => match find_character_class_end(value, pos) {
                -1 => {
                    pattern.push('[');
                    pos += 1;
                }
                close if close >= 0 => {
                    let close = close as usize;
                    pattern.extend(&chars[pos..=close]);
                    pos = close + 1;
                }
                _ => unreachable!(),
            },
            _ => break,
        }
    }

    (pattern, pos)
}

/// Find the closing `]` of a bracket character class starting at `start`
/// (the `[`), or `-1` if `[...]` isn't actually a valid class here. Handles
/// negation (`[^...]`), a leading literal `]` (`[]...]`/`[^]...]`), POSIX
/// named classes (`[:alpha:]`), collating symbols (`[.x.]`) and
/// equivalence classes (`[=x=]`), and the bash extension of single-quoting
/// a literal `]` inside the class. Expansion/quote characters (`"`, `$`,
/// `` ` ``) inside the brackets mean this was never a character class —
/// shell quoting takes precedence, same as real bash.
fn find_character_class_end(value: &str, start: usize) -> isize {
    let chars: Vec<char> = value.chars().collect();
    let mut pos = start + 1;

    if chars.get(pos) == Some(&'^') {
        pos += 1;
    }
    if chars.get(pos) == Some(&']') {
        pos += 1;
    }

    while pos < chars.len() {
        let ch = chars[pos];

        if ch == '\\' && pos + 1 < chars.len() {
            let next = chars[pos + 1];
            if next == '"' || next == '\'' {
                return -1;
            }
            pos += 2;
            continue;
        }

        if ch == ']' {
            return pos as isize;
        }

        if ch == '"' || ch == '$' || ch == '`' {
            return -1;
        }

        if ch == '\'' {
            if let Some(close) = chars[pos + 1..].iter().position(|&c| c == '\'') {
                pos = pos + 1 + close + 1;
                continue;
            }
        }

        if ch == '[' && chars.get(pos + 1) == Some(&':') {
            let rest: String = chars[pos + 2..].iter().collect();
            if let Some(end) = rest.find(":]") {
                pos = pos + 2 + end + 2;
                continue;
            }
        }

        if ch == '[' && matches!(chars.get(pos + 1), Some(&'.') | Some(&'=')) {
            let closer = format!("{}]", chars[pos + 1]);
            let rest: String = chars[pos + 2..].iter().collect();
            if let Some(end) = rest.find(&closer) {
                pos = pos + 2 + end + 2;
                continue;
            }
        }

        pos += 1;
    }

    -1
}

/// Decode backslash escapes inside `$'...'`, matching bash's ANSI-C
/// quoting: `\n \t \r \\ \' \" \a \b \e \f \v`, `\xHH` hex bytes (possibly
/// several in a row, decoded as one UTF-8 sequence via
/// [`decode_utf8_with_recovery`]), `\uHHHH` Unicode code points, `\cX`
/// control-character escapes, and `\NNN` octal escapes. Unknown escapes
/// keep their backslash. Returns the decoded literal and the position
/// just past the closing `'`.
pub fn parse_ansi_c_quoted(value: &str, start: usize) -> (WordPart, usize) {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::new();
    let mut pos = start;

    while pos < chars.len() && chars[pos] != '\'' {
        let ch = chars[pos];
        if ch != '\\' || pos + 1 >= chars.len() {
            out.push(ch);
            pos += 1;
            continue;
        }

        match chars[pos + 1] {
            'n' => { out.push('\n'); pos += 2; }
            't' => { out.push('\t'); pos += 2; }
            'r' => { out.push('\r'); pos += 2; }
            '\\' => { out.push('\\'); pos += 2; }
            '\'' => { out.push('\''); pos += 2; }
            '"' => { out.push('"'); pos += 2; }
            'a' => { out.push('\x07'); pos += 2; }
            'b' => { out.push('\x08'); pos += 2; }
            'e' | 'E' => { out.push('\x1b'); pos += 2; }
            'f' => { out.push('\x0c'); pos += 2; }
            'v' => { out.push('\x0b'); pos += 2; }
            'x' => {
                let mut bytes: Vec<u8> = Vec::new();
                let mut scan = pos;
                while scan + 1 < chars.len() && chars[scan] == '\\' && chars[scan + 1] == 'x' {
                    let hex: String = chars[scan + 2..].iter().take(2).collect();
                    match u8::from_str_radix(&hex, 16) {
                        Ok(byte) => {
                            bytes.push(byte);
                            scan += 2 + hex.len();
                        }
                        Err(_) => break,
                    }
                }
                if bytes.is_empty() {
                    out.push_str("\\x");
                    pos += 2;
                } else {
                    out.push_str(&decode_utf8_with_recovery(&bytes));
                    pos = scan;
                }
            }
            'u' => {
                let hex: String = chars[pos + 2..].iter().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(c) => { out.push(c); pos += 6; }
                    None => { out.push_str("\\u"); pos += 2; }
                }
            }
            'c' => {
                if pos + 2 < chars.len() {
                    let code = (chars[pos + 2] as u8) & 0x1f;
                    out.push(code as char);
                    pos += 3;
                } else {
                    out.push_str("\\c");
                    pos += 2;
                }
            }
            '0'..='7' => {
                let mut octal = String::new();
                let mut scan = pos + 1;
                while scan < chars.len() && scan < pos + 4 && ('0'..='7').contains(&chars[scan]) {
                    octal.push(chars[scan]);
                    scan += 1;
                }
                if let Ok(code) = u8::from_str_radix(&octal, 8) {
                    out.push(code as char);
                }
                pos = scan;
            }
            _ => {
                out.push(ch);
                pos += 1;
            }
        }
    }

    if chars.get(pos) == Some(&'\'') {
        pos += 1;
    }

    (AST::literal(&out), pos)
}

/// Parse an arithmetic slice operand (as used by `${arr:offset:length}`),
/// treating empty/all-whitespace input as the literal `0`.
pub fn parse_arith_expr_from_string(input: &str) -> ArithmeticExpressionNode {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return ArithmeticExpressionNode {
            expression: ArithExpr::Number(ArithNumberNode { value: 0 }),
            original_text: None,
        };
    }
    parse_arithmetic_expression(trimmed)
}

/// Split a brace-expansion body on top-level commas, treating nested
/// `{...}` as opaque so `{a,{b,c},d}` splits into `a`, `{b,c}`, `d`.
fn split_brace_items(inner: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut depth = 0;

    for ch in inner.chars() {
        match ch {
            '{' => { depth += 1; current.push(ch); }
            '}' => { depth -= 1; current.push(ch); }
            ',' if depth == 0 => { items.push(std::mem::take(&mut current)); }
            _ => current.push(ch),
        }
    }
    items.push(current);
    items
}

/// Word-parts parser passed in by callers that want full expansion support
/// inside brace-expansion list items (rather than plain literal text).
pub type WordPartsParser = fn(&str, bool, bool, bool) -> Vec<WordPart>;

/// Parse a `{...}` brace expansion starting at `start` (the `{`): a
/// numeric range (`{1..10}`, `{1..10..2}`), a character range (`{a..z}`,
/// `{a..z..2}`), or a comma-separated list (`{a,b,c}`). Returns `None` if
/// the content matches none of those shapes (e.g. `{no commas or range}`
/// isn't a brace expansion at all — it's a literal string).
pub fn try_parse_brace_expansion(
    value: &str,
    start: usize,
    parse_word_parts_fn: Option<WordPartsParser>,
) -> Option<(WordPart, usize)> {
    let close_idx = find_matching_bracket(value, start, '{', '}');
    if close_idx == -1 {
        return None;
    }
    let close_idx = close_idx as usize;

    let chars: Vec<char> = value.chars().collect();
    let inner: String = chars[start + 1..close_idx].iter().collect();

    if let Some(range) = try_parse_numeric_range(&inner).or_else(|| try_parse_char_range(&inner)) {
        return Some((WordPart::BraceExpansion(BraceExpansionPart { items: vec![range] }), close_idx + 1));
    }

    if !inner.contains(',') {
        return None;
    }

    let raw_items = split_brace_items(&inner);
    let items: Vec<BraceItem> = match parse_word_parts_fn {
        Some(parse_fn) => raw_items
            .iter()
            .map(|s| BraceItem::Word { word: AST::word(parse_fn(s, false, false, false)) })
            .collect(),
        None => raw_items
            .iter()
            .map(|s| BraceItem::Word { word: AST::word(vec![AST::literal(s)]) })
            .collect(),
    };
    Some((WordPart::BraceExpansion(BraceExpansionPart { items }), close_idx + 1))
}

/// Parse `N..M` or `N..M..STEP` where `N`/`M` are integers.
fn try_parse_numeric_range(inner: &str) -> Option<BraceItem> {
    let parts: Vec<&str> = inner.split("..").collect();
    if !(2..=3).contains(&parts.len()) {
        return None;
    }

    let start_num: i64 = parts[0].parse().ok()?;
    let end_num: i64 = parts[1].parse().ok()?;
    let step = parts.get(2).map(|s| s.parse()).transpose().ok()?;

    Some(BraceItem::Range {
        start: BraceRangeValue::Number(start_num),
        end: BraceRangeValue::Number(end_num),
        step,
        start_str: Some(parts[0].to_string()),
        end_str: Some(parts[1].to_string()),
    })
}

/// Parse `a..z` or `a..z..STEP` where the endpoints are single alphabetic
/// characters.
fn try_parse_char_range(inner: &str) -> Option<BraceItem> {
    let parts: Vec<&str> = inner.split("..").collect();
    if !(2..=3).contains(&parts.len()) {
        return None;
    }
    if parts[0].len() != 1 || parts[1].len() != 1 {
        return None;
    }

    let start_char = parts[0].chars().next()?;
    let end_char = parts[1].chars().next()?;
    if !start_char.is_ascii_alphabetic() || !end_char.is_ascii_alphabetic() {
        return None;
    }

    let step = parts.get(2).map(|s| s.parse()).transpose().ok()?;

    Some(BraceItem::Range {
        start: BraceRangeValue::Char(start_char),
        end: BraceRangeValue::Char(end_char),
        step,
        start_str: None,
        end_str: None,
    })
}

/// Reconstruct a `WordNode`'s source text, used to fold an array literal's
/// parsed element words back into a single `name=(elem1 elem2 ...)`
/// argument string for builtins like `declare`/`local` that parse their
/// own array syntax from argument text rather than AST nodes.
pub fn word_to_string(word: &WordNode) -> String {
    let mut result = String::new();
    for part in &word.parts {
        match part {
            WordPart::Literal(LiteralPart { value }) | WordPart::Escaped(EscapedPart { value }) => {
                result.push_str(value);
            }
            WordPart::SingleQuoted(SingleQuotedPart { value }) => {
                // Keep the quotes so an empty literal like '' survives the round trip.
                result.push('\'');
                result.push_str(value);
                result.push('\'');
            }
            WordPart::DoubleQuoted(DoubleQuotedPart { parts }) => {
                result.push('"');
                for inner in parts {
                    match inner {
                        WordPart::Literal(LiteralPart { value }) | WordPart::Escaped(EscapedPart { value }) => {
                            result.push_str(value);
                        }
                        WordPart::ParameterExpansion(exp) => {
                            result.push_str("${");
                            result.push_str(&exp.parameter);
                            result.push('}');
                        }
                        _ => {}
                    }
                }
                result.push('"');
            }
            WordPart::ParameterExpansion(exp) => {
                result.push_str("${");
                result.push_str(&exp.parameter);
                result.push('}');
            }
            WordPart::Glob(GlobPart { pattern }) => result.push_str(pattern),
            WordPart::TildeExpansion(TildeExpansionPart { user }) => {
                result.push('~');
                if let Some(u) = user {
                    result.push_str(u);
                }
            }
            WordPart::BraceExpansion(BraceExpansionPart { items }) => {
                result.push('{');
                result.push_str(&brace_items_to_string(items));
                result.push('}');
            }
            _ => result.push_str(&format!("{:?}", part)),
        }
    }
    result
}

fn brace_items_to_string(items: &[BraceItem]) -> String {
    let rendered: Vec<String> = items
        .iter()
        .map(|item| match item {
            BraceItem::Range { start, end, step, start_str, end_str } => {
                let start_val = start_str.clone().unwrap_or_else(|| format!("{}", start));
                let end_val = end_str.clone().unwrap_or_else(|| format!("{}", end));
                match step {
                    Some(s) => format!("{}..{}..{}", start_val, end_val, s),
                    None => format!("{}..{}", start_val, end_val),
                }
            }
            BraceItem::Word { word } => word_to_string(word),
        })
        .collect();

    // A lone range keeps its `start..end` shape; anything else (including
    // a single plain word) joins as a comma list, matching `{a,b,c}`.
    if rendered.len() == 1 && matches!(items[0], BraceItem::Range { .. }) {
        rendered[0].clone()
    } else {
        rendered.join(",")
    }
}

/// Map a redirection-operator token to its AST operator. Here-doc start
/// tokens (`<<`, `<<-`) resolve to plain `<` since the heredoc-specific
/// behavior lives in the target (`RedirectionTarget::HereDoc`), not the
/// operator itself.
pub fn token_to_redirect_op(token_type: TokenType) -> RedirectionOperator {
    match token_type {
        TokenType::Less | TokenType::DLess | TokenType::DLessDash => RedirectionOperator::Less,
        TokenType::Great => RedirectionOperator::Great,
        TokenType::DGreat => RedirectionOperator::DGreat,
        TokenType::LessAnd => RedirectionOperator::LessAnd,
        TokenType::GreatAnd => RedirectionOperator::GreatAnd,
        TokenType::LessGreat => RedirectionOperator::LessGreat,
        TokenType::Clobber => RedirectionOperator::Clobber,
        TokenType::TLess => RedirectionOperator::TLess,
        TokenType::AndGreat => RedirectionOperator::AndGreat,
        TokenType::AndDGreat => RedirectionOperator::AndDGreat,
        _ => RedirectionOperator::Great,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tilde_end_covers_user_and_trailing_dash() {
        assert_eq!(find_tilde_end("~user/path", 0), 5);
        assert_eq!(find_tilde_end("~/path", 0), 1);
        assert_eq!(find_tilde_end("~user-name/path", 0), 10);
    }

    #[test]
    fn matching_bracket_handles_nesting_and_missing_close() {
        assert_eq!(find_matching_bracket("{abc}", 0, '{', '}'), 4);
        assert_eq!(find_matching_bracket("{a{b}c}", 0, '{', '}'), 6);
        assert_eq!(find_matching_bracket("{abc", 0, '{', '}'), -1);
    }

    #[test]
    fn brace_item_split_respects_nesting() {
        assert_eq!(split_brace_items("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(split_brace_items("a,{b,c},d"), vec!["a", "{b,c}", "d"]);
    }

    #[test]
    fn ansi_c_quote_decodes_escapes_and_stops_at_close_quote() {
        let (part, idx) = parse_ansi_c_quoted("hello\\nworld'rest", 0);
        assert_eq!(idx, 13);
        if let WordPart::Literal(LiteralPart { value }) = part {
            assert_eq!(value, "hello\nworld");
        } else {
            panic!("Expected Literal");
        }
    }

    #[test]
    fn numeric_range_parses_start_end_and_optional_step() {
        let result = try_parse_numeric_range("1..10").unwrap();
        if let BraceItem::Range { start, end, step, .. } = result {
            assert_eq!(start, BraceRangeValue::Number(1));
            assert_eq!(end, BraceRangeValue::Number(10));
            assert_eq!(step, None);
        }

        if let BraceItem::Range { step, .. } = try_parse_numeric_range("1..10..2").unwrap() {
            assert_eq!(step, Some(2));
        }
    }

    #[test]
    fn char_range_parses_single_letter_endpoints() {
        if let BraceItem::Range { start, end, step, .. } = try_parse_char_range("a..z").unwrap() {
            assert_eq!(start, BraceRangeValue::Char('a'));
            assert_eq!(end, BraceRangeValue::Char('z'));
            assert_eq!(step, None);
        }
    }

    #[test]
    fn utf8_recovery_keeps_valid_sequences_and_recovers_invalid_bytes() {
        assert_eq!(decode_utf8_with_recovery(&[0x48, 0x65, 0x6c, 0x6c, 0x6f]), "Hello");
        assert_eq!(decode_utf8_with_recovery(&[0xff]), "\u{ff}");
    }
}
