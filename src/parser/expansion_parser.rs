//! Parameter expansion and word-splitting: turns the raw text captured by
//! the lexer for an unquoted/double-quoted word into the `WordPart` tree —
//! `${...}` operations, `$((...))`/`$[...]` arithmetic, command and
//! backtick substitution, tilde/glob/brace expansion, and the escaping
//! rules that differ between plain words, double quotes, and here-docs.

use crate::ast::types::{
    ArithmeticExpressionNode, AssignDefaultOp, BadSubstitutionOp, CaseDirection,
    CaseModificationOp, DefaultValueOp, DoubleQuotedPart, ErrorIfUnsetOp,
    GlobPart, InnerParameterOperation, LengthOp, LengthSliceErrorOp,
    ParameterExpansionPart, ParameterOperation, PatternAnchor, PatternRemovalOp,
    PatternRemovalSide, PatternReplacementOp, SubstringOp, TildeExpansionPart,
    TransformOp, TransformOperator, UseAlternativeOp, WordNode, WordPart, AST,
};
use crate::parser::arithmetic_parser::parse_arithmetic_expression;
use crate::parser::types::ParseException;
use crate::parser::word_parser;

/// Find the matching close-paren for an extglob pattern's open-paren at
/// `open_idx`, recursing into nested extglob groups and skipping escapes.
fn find_extglob_close(value: &str, open_idx: usize) -> isize {
    let chars: Vec<char> = value.chars().collect();
    let mut depth = 1;
    let mut i = open_idx + 1;

    while i < chars.len() && depth > 0 {
        let c = chars[i];
        if c == '\\' {
            i += 2;
            continue;
        }
        if "@*+?!".contains(c) && chars.get(i + 1) == Some(&'(') {
            i += 2;
            depth += 1;
            continue;
        }
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return i as isize;
                }
            }
            _ => {}
        }
        i += 1;
    }
    -1
}

fn parse_simple_parameter(value: &str, start: usize) -> (ParameterExpansionPart, usize) {
    let chars: Vec<char> = value.chars().collect();
    let mut i = start + 1;
    let c = chars.get(i).copied().unwrap_or('\0');

    if "@*#?$!-0123456789".contains(c) {
        return (ParameterExpansionPart { parameter: c.to_string(), operation: None }, i + 1);
    }

    let mut name = String::new();
    while chars.get(i).is_some_and(|c| c.is_ascii_alphanumeric() || *c == '_') {
        name.push(chars[i]);
        i += 1;
    }

    (ParameterExpansionPart { parameter: name, operation: None }, i)
}

/// Parser callbacks an [`ExpansionContext`] needs back from the main
/// command/word parser, since the expansion parser doesn't own the token
/// cursor that knows how to recognize a subshell vs. an arithmetic command
/// or consume a balanced `$(...)`/backtick span.
pub struct ExpansionContext<'a> {
    pub parse_command_substitution: &'a dyn Fn(&str, usize) -> (Option<WordPart>, usize),
    pub parse_backtick_substitution: &'a dyn Fn(&str, usize, bool) -> (WordPart, usize),
    pub parse_arithmetic_expansion: &'a dyn Fn(&str, usize) -> (Option<WordPart>, usize),
    pub is_dollar_dparen_subshell: &'a dyn Fn(&str, usize) -> bool,
    pub report_error: &'a dyn Fn(&str),
}

/// A no-op context for standalone expansion parsing (tests, or callers
/// that only need parameter-operation parsing without the surrounding
/// command grammar).
pub fn dummy_expansion_context() -> ExpansionContext<'static> {
    static DUMMY_CMD_SUB: fn(&str, usize) -> (Option<WordPart>, usize) = |_, i| (None, i);
    static DUMMY_BACKTICK: fn(&str, usize, bool) -> (WordPart, usize) = |_, i, _| (AST::literal("`"), i + 1);
    static DUMMY_ARITH: fn(&str, usize) -> (Option<WordPart>, usize) = |_, i| (None, i);
    static DUMMY_SUBSHELL: fn(&str, usize) -> bool = |_, _| false;
    static DUMMY_ERROR: fn(&str) = |_| {};

    ExpansionContext {
        parse_command_substitution: &DUMMY_CMD_SUB,
        parse_backtick_substitution: &DUMMY_BACKTICK,
        parse_arithmetic_expansion: &DUMMY_ARITH,
        is_dollar_dparen_subshell: &DUMMY_SUBSHELL,
        report_error: &DUMMY_ERROR,
    }
}

fn parse_parameter_expansion(
    ctx: &ExpansionContext,
    value: &str,
    start: usize,
    quoted: bool,
) -> Result<(ParameterExpansionPart, usize), ParseException> {
    let chars: Vec<char> = value.chars().collect();
    let mut i = start + 2; // skip "${"

    let mut indirection = false;
    if chars.get(i) == Some(&'!') {
        indirection = true;
        i += 1;
    }

    let mut length_op = false;
    let next_char = chars.get(i + 1).copied().unwrap_or('}');
    if chars.get(i) == Some(&'#') && !":#%/^,}".contains(next_char) {
        length_op = true;
        i += 1;
    }

    let mut name = String::new();
    let first_char = chars.get(i).copied().unwrap_or('\0');
    let after_first = chars.get(i + 1).copied().unwrap_or('\0');

    if "@*#?$!-".contains(first_char) && !after_first.is_ascii_alphanumeric() && after_first != '_' {
        name.push(first_char);
        i += 1;
    } else {
        while chars.get(i).is_some_and(|c| c.is_ascii_alphanumeric() || *c == '_') {
            name.push(chars[i]);
            i += 1;
        }
    }

    if chars.get(i) == Some(&'[') {
        let close_idx = word_parser::find_matching_bracket(value, i, '[', ']');
        if close_idx >= 0 {
            let close_idx = close_idx as usize;
            let subscript: String = chars[i..=close_idx].iter().collect();
            name.push_str(&subscript);
            i = close_idx + 1;

            if chars.get(i) == Some(&'[') {
                let j = find_matching_brace_end(&chars, i);
                let bad_text: String = chars[start + 2..j].iter().collect();
                return Ok((bad_substitution(bad_text), j + 1));
            }
        }
    }

    if name.is_empty() && !indirection && !length_op && chars.get(i) != Some(&'}') {
        let j = find_matching_brace_end(&chars, i);
        if j >= chars.len() {
            return Err(ParseException::new("unexpected EOF while looking for matching '}'", 0, 0));
        }
        let bad_text: String = chars[start + 2..j].iter().collect();
        return Ok((bad_substitution(bad_text), j + 1));
    }

    let mut operation: Option<ParameterOperation> = None;

    if indirection {
        operation = parse_indirection_operation(ctx, value, &chars, &mut i, &mut name, quoted)?;
    } else if length_op {
        parse_length_operation(ctx, &chars, &mut i, &name, &mut operation);
    }

    if operation.is_none() && i < chars.len() && chars[i] != '}' {
        let (op, end_idx) = parse_parameter_operation(ctx, value, i, &name, quoted)?;
        if let Some(inner_op) = op {
            operation = Some(ParameterOperation::Inner(inner_op));
        }
        i = end_idx;
    }

    if i < chars.len() && chars[i] != '}' && !":-+=?#%/^,@[".contains(chars[i]) {
        let mut end_idx = i;
        while end_idx < chars.len() && chars[end_idx] != '}' {
            end_idx += 1;
        }
        let bad_exp: String = chars[start..end_idx + 1].iter().collect();
        (ctx.report_error)(&format!("${{{}}}: bad substitution", &bad_exp[2..bad_exp.len() - 1]));
    }

    while i < chars.len() && chars[i] != '}' {
        i += 1;
    }
    if i >= chars.len() {
        return Err(ParseException::new("unexpected EOF while looking for matching '}'", 0, 0));
    }

    Ok((ParameterExpansionPart { parameter: name, operation }, i + 1))
}

fn bad_substitution(text: String) -> ParameterExpansionPart {
    ParameterExpansionPart {
        parameter: String::new(),
        operation: Some(ParameterOperation::Inner(InnerParameterOperation::BadSubstitution(BadSubstitutionOp { text }))),
    }
}

/// Find the `}` that closes the brace opened before `search_start`, honoring
/// nested `{`/`}` pairs inside the expansion body.
fn find_matching_brace_end(chars: &[char], search_start: usize) -> usize {
    let mut depth = 1;
    let mut j = search_start;
    while j < chars.len() && depth > 0 {
        match chars[j] {
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
        if depth > 0 {
            j += 1;
        }
    }
    j
}

fn parse_indirection_operation(
    ctx: &ExpansionContext,
    value: &str,
    chars: &[char],
    i: &mut usize,
    name: &mut String,
    quoted: bool,
) -> Result<Option<ParameterOperation>, ParseException> {
    let array_keys_pattern = regex_lite::Regex::new(r"^([a-zA-Z_][a-zA-Z0-9_]*)\[([@*])\]$").unwrap();
    if let Some(caps) = array_keys_pattern.captures(name) {
        let array_name = caps.get(1).unwrap().as_str().to_string();
        let star = caps.get(2).unwrap().as_str() == "*";
        let current_char = chars.get(*i).copied().unwrap_or('}');

        if *i < chars.len() && current_char != '}' && ":=-+?#%/^,@".contains(current_char) {
            let (inner_op, end_idx) = parse_parameter_operation(ctx, value, *i, name, quoted)?;
            if let Some(op) = inner_op {
                *i = end_idx;
                return Ok(Some(ParameterOperation::Indirection(crate::ast::types::IndirectionOp { inner_op: Some(Box::new(op)) })));
            }
        }
        *name = String::new();
        return Ok(Some(ParameterOperation::ArrayKeys(crate::ast::types::ArrayKeysOp { array: array_name, star })));
    }

    let current_char = chars.get(*i).copied().unwrap_or('\0');
    let next_char = chars.get(*i + 1).copied().unwrap_or('\0');

    if current_char == '*' || (current_char == '@' && !"QPaAEKkuUL".contains(next_char)) {
        *i += 1;
        let prefix = std::mem::take(name);
        return Ok(Some(ParameterOperation::VarNamePrefix(crate::ast::types::VarNamePrefixOp {
            prefix,
            star: current_char == '*',
        })));
    }

    let brace_char = chars.get(*i).copied().unwrap_or('}');
    if *i < chars.len() && brace_char != '}' && ":=-+?#%/^,@".contains(brace_char) {
        let (inner_op, end_idx) = parse_parameter_operation(ctx, value, *i, name, quoted)?;
        if let Some(op) = inner_op {
            *i = end_idx;
            return Ok(Some(ParameterOperation::Indirection(crate::ast::types::IndirectionOp { inner_op: Some(Box::new(op)) })));
        }
    }
    Ok(Some(ParameterOperation::Indirection(crate::ast::types::IndirectionOp { inner_op: None })))
}

fn parse_length_operation(ctx: &ExpansionContext, chars: &[char], i: &mut usize, name: &str, operation: &mut Option<ParameterOperation>) {
    let current_char = chars.get(*i).copied().unwrap_or('}');
    if current_char == ':' {
        *operation = Some(ParameterOperation::Inner(InnerParameterOperation::LengthSliceError(LengthSliceErrorOp)));
        while *i < chars.len() && chars[*i] != '}' {
            *i += 1;
        }
    } else if current_char != '}' && "-+=?".contains(current_char) {
        let end_idx = chars[*i..].iter().position(|&c| c == '}').unwrap_or(chars.len() - *i) + *i;
        let suffix: String = chars[*i..end_idx].iter().collect();
        (ctx.report_error)(&format!("${{#{}{}}}): bad substitution", name, suffix));
    } else if current_char == '/' {
        let end_idx = chars[*i..].iter().position(|&c| c == '}').unwrap_or(chars.len() - *i) + *i;
        let suffix: String = chars[*i..end_idx].iter().collect();
        (ctx.report_error)(&format!("${{#{}{}}}): bad substitution", name, suffix));
    } else {
        *operation = Some(ParameterOperation::Inner(InnerParameterOperation::Length(LengthOp)));
    }
}

/// Parse an operation word (the `word` in `${x:-word}`/`${x/pat/word}`/etc):
/// run it back through [`parse_word_parts`] with the given flags and fall
/// back to an empty literal when the source text is empty, matching how
/// bash treats a bare `${x:-}` as "default to the empty string" rather than
/// "no word at all".
fn parse_operation_word(ctx: &ExpansionContext, word_str: &str, quoted: bool, is_assignment: bool, in_parameter_expansion: bool) -> WordNode {
    let word_parts = parse_word_parts(ctx, word_str, false, false, is_assignment, false, quoted, false, false, in_parameter_expansion);
    AST::word(if word_parts.is_empty() { vec![AST::literal("")] } else { word_parts })
}

/// Build a `:-`/`:=`/`:?`/`:+`-family operation node for `op_char`. `word`
/// is the already-parsed replacement word; `omit_word_if_unset_without_colon`
/// lets the bare `${x?}` form (no colon, no text) carry `None` instead of an
/// empty-literal word, matching bash's distinct error message for that case.
fn build_default_like_op(op_char: char, word: WordNode, check_empty: bool, word_is_present: bool) -> Option<InnerParameterOperation> {
    match op_char {
        '-' => Some(InnerParameterOperation::DefaultValue(DefaultValueOp { word, check_empty })),
        '=' => Some(InnerParameterOperation::AssignDefault(AssignDefaultOp { word, check_empty })),
        '?' => Some(InnerParameterOperation::ErrorIfUnset(ErrorIfUnsetOp {
            word: if word_is_present { Some(word) } else { None },
            check_empty,
        })),
        '+' => Some(InnerParameterOperation::UseAlternative(UseAlternativeOp { word, check_empty })),
        _ => None,
    }
}

fn parse_parameter_operation(
    ctx: &ExpansionContext,
    value: &str,
    start: usize,
    _param_name: &str,
    quoted: bool,
) -> Result<(Option<InnerParameterOperation>, usize), ParseException> {
    let chars: Vec<char> = value.chars().collect();
    let mut i = start;
    let c = chars.get(i).copied().unwrap_or('\0');
    let next_char = chars.get(i + 1).copied().unwrap_or('\0');

    if c == ':' {
        let op = next_char;
        if "-=?+".contains(op) {
            i += 2;
            let word_end = word_parser::find_parameter_operation_end(value, i);
            let word_str: String = chars[i..word_end].iter().collect();
            let word = parse_operation_word(ctx, &word_str, quoted, true, true);
            return Ok((build_default_like_op(op, word, true, true), word_end));
        }

        i += 1; // substring: ${var:offset} or ${var:offset:length}
        let word_end = word_parser::find_parameter_operation_end(value, i);
        let word_str: String = chars[i..word_end].iter().collect();

        let mut colon_idx: Option<usize> = None;
        let mut depth = 0;
        let mut ternary_depth = 0;
        for (j, &wc) in word_str.chars().collect::<Vec<_>>().iter().enumerate() {
            match wc {
                '(' | '[' => depth += 1,
                ')' | ']' => depth -= 1,
                '?' if depth == 0 => ternary_depth += 1,
                ':' if depth == 0 => {
                    if ternary_depth > 0 {
                        ternary_depth -= 1;
                    } else {
                        colon_idx = Some(j);
                        break;
                    }
                }
                _ => {}
            }
        }

        let offset_str = colon_idx.map_or_else(|| word_str.clone(), |idx| word_str[..idx].to_string());
        let length_str = colon_idx.map(|idx| word_str[idx + 1..].to_string());

        return Ok((
            Some(InnerParameterOperation::Substring(SubstringOp {
                offset: word_parser::parse_arith_expr_from_string(&offset_str),
                length: length_str.map(|s| word_parser::parse_arith_expr_from_string(&s)),
            })),
            word_end,
        ));
    }

    if "-=?+".contains(c) {
        i += 1;
        let word_end = word_parser::find_parameter_operation_end(value, i);
        let word_str: String = chars[i..word_end].iter().collect();
        let word = parse_operation_word(ctx, &word_str, quoted, true, true);
        return Ok((build_default_like_op(c, word, false, !word_str.is_empty()), word_end));
    }

    if c == '#' || c == '%' {
        let greedy = next_char == c;
        let side = if c == '#' { PatternRemovalSide::Prefix } else { PatternRemovalSide::Suffix };
        i += if greedy { 2 } else { 1 };

        let pattern_end = word_parser::find_parameter_operation_end(value, i);
        let pattern_str: String = chars[i..pattern_end].iter().collect();
        let pattern = parse_operation_word(ctx, &pattern_str, false, false, false);

        return Ok((Some(InnerParameterOperation::PatternRemoval(PatternRemovalOp { pattern, side, greedy })), pattern_end));
    }

    if c == '/' {
        let all = next_char == '/';
        i += if all { 2 } else { 1 };

        let mut anchor: Option<PatternAnchor> = None;
        if chars.get(i) == Some(&'#') {
            anchor = Some(PatternAnchor::Start);
            i += 1;
        } else if chars.get(i) == Some(&'%') {
            anchor = Some(PatternAnchor::End);
            i += 1;
        }

        let pattern_end = if anchor.is_some() && matches!(chars.get(i), Some('/') | Some('}')) {
            i
        } else {
            word_parser::find_pattern_end(value, i)
        };
        let pattern_str: String = chars[i..pattern_end].iter().collect();
        let pattern = parse_operation_word(ctx, &pattern_str, false, false, false);

        let mut replacement: Option<WordNode> = None;
        let mut end_idx = pattern_end;
        if chars.get(pattern_end) == Some(&'/') {
            let replace_start = pattern_end + 1;
            let replace_end = word_parser::find_parameter_operation_end(value, replace_start);
            let replace_str: String = chars[replace_start..replace_end].iter().collect();
            replacement = Some(parse_operation_word(ctx, &replace_str, false, false, false));
            end_idx = replace_end;
        }

        return Ok((Some(InnerParameterOperation::PatternReplacement(PatternReplacementOp { pattern, replacement, all, anchor })), end_idx));
    }

    if c == '^' || c == ',' {
        let all = next_char == c;
        let direction = if c == '^' { CaseDirection::Upper } else { CaseDirection::Lower };
        i += if all { 2 } else { 1 };

        let pattern_end = word_parser::find_parameter_operation_end(value, i);
        let pattern_str: String = chars[i..pattern_end].iter().collect();
        let pattern = if pattern_str.is_empty() { None } else { Some(AST::word(vec![AST::literal(&pattern_str)])) };

        return Ok((Some(InnerParameterOperation::CaseModification(CaseModificationOp { direction, all, pattern })), pattern_end));
    }

    if c == '@' && "QPaAEKkuUL".contains(next_char) {
        let operator = match next_char {
            'Q' => TransformOperator::Q,
            'P' => TransformOperator::P,
            'a' => TransformOperator::LowerA,
            'A' => TransformOperator::A,
            'E' => TransformOperator::E,
            'K' => TransformOperator::K,
            'k' => TransformOperator::LowerK,
            'u' => TransformOperator::LowerU,
            'U' => TransformOperator::U,
            'L' => TransformOperator::L,
            _ => return Ok((None, i)),
        };
        return Ok((Some(InnerParameterOperation::Transform(TransformOp { operator })), i + 2));
    }

    Ok((None, i))
}

fn parse_expansion(ctx: &ExpansionContext, value: &str, start: usize, quoted: bool) -> Result<(Option<WordPart>, usize), ParseException> {
    let chars: Vec<char> = value.chars().collect();
    let i = start + 1;

    if i >= chars.len() {
        return Ok((Some(AST::literal("$")), i));
    }
    let c = chars[i];

    if c == '(' && chars.get(i + 1) == Some(&'(') {
        if (ctx.is_dollar_dparen_subshell)(value, start) {
            return Ok((ctx.parse_command_substitution)(value, start));
        }
        return Ok((ctx.parse_arithmetic_expansion)(value, start));
    }

    if c == '[' {
        let j = find_matching_brace_end_of(&chars, i + 1, '[', ']');
        if j < chars.len() {
            let expr: String = chars[i + 1..j].iter().collect();
            let arith_expr = parse_arithmetic_expression(&expr);
            return Ok((
                Some(WordPart::ArithmeticExpansion(crate::ast::types::ArithmeticExpansionPart { expression: arith_expr })),
                j + 1,
            ));
        }
    }

    if c == '(' {
        return Ok((ctx.parse_command_substitution)(value, start));
    }

    if c == '{' {
        let (part, end_idx) = parse_parameter_expansion(ctx, value, start, quoted)?;
        return Ok((Some(WordPart::ParameterExpansion(part)), end_idx));
    }

    if c.is_ascii_alphanumeric() || "_@*#?$!-".contains(c) {
        let (part, end_idx) = parse_simple_parameter(value, start);
        return Ok((Some(WordPart::ParameterExpansion(part)), end_idx));
    }

    Ok((Some(AST::literal("$")), i))
}

/// Find the index of the close bracket matching the open bracket just
/// before `search_start`, or `chars.len()` if unbalanced. Used for `$[...]`
/// old-style arithmetic, which nests like braces but with `[`/`]`.
fn find_matching_brace_end_of(chars: &[char], search_start: usize, open: char, close: char) -> usize {
    let mut depth = 1;
    let mut j = search_start;
    while j < chars.len() && depth > 0 {
        if chars[j] == open {
            depth += 1;
        } else if chars[j] == close {
            depth -= 1;
        }
        if depth > 0 {
            j += 1;
        }
    }
    j
}

fn flush_literal(parts: &mut Vec<WordPart>, literal: &mut String) {
    if !literal.is_empty() {
        parts.push(AST::literal(literal.as_str()));
        literal.clear();
    }
}

/// Consume a `$...` expansion at `i`, reporting whether it produced a part
/// or should fall back to treating the `$` as a literal character (bash
/// does this for a bare trailing `$` or one followed by nothing expandable).
fn consume_dollar_expansion(ctx: &ExpansionContext, value: &str, i: usize, quoted: bool) -> Option<(WordPart, usize)> {
    match parse_expansion(ctx, value, i, quoted) {
        Ok((Some(part), end_index)) => Some((part, end_index)),
        _ => None,
    }
}

fn parse_double_quoted_content(ctx: &ExpansionContext, value: &str) -> Vec<WordPart> {
    let chars: Vec<char> = value.chars().collect();
    let mut parts: Vec<WordPart> = Vec::new();
    let mut i = 0;
    let mut literal = String::new();

    while i < chars.len() {
        let c = chars[i];

        if c == '\\' && i + 1 < chars.len() {
            let next = chars[i + 1];
            if "$`\"\\".contains(next) {
                literal.push(next);
                i += 2;
            } else {
                literal.push(c);
                i += 1;
            }
            continue;
        }

        if c == '$' {
            flush_literal(&mut parts, &mut literal);
            match consume_dollar_expansion(ctx, value, i, true) {
                Some((part, end_index)) => {
                    parts.push(part);
                    i = end_index;
                }
                None => i += 1,
            }
            continue;
        }

        if c == '`' {
            flush_literal(&mut parts, &mut literal);
            let (part, end_index) = (ctx.parse_backtick_substitution)(value, i, true);
            parts.push(part);
            i = end_index;
            continue;
        }

        literal.push(c);
        i += 1;
    }

    flush_literal(&mut parts, &mut literal);
    parts
}

fn parse_double_quoted(ctx: &ExpansionContext, value: &str, start: usize) -> (WordPart, usize) {
    let chars: Vec<char> = value.chars().collect();
    let mut inner_parts: Vec<WordPart> = Vec::new();
    let mut i = start;
    let mut literal = String::new();

    while i < chars.len() && chars[i] != '"' {
        let c = chars[i];

        if c == '\\' && i + 1 < chars.len() {
            let next = chars[i + 1];
            if "\"\\$`\n".contains(next) {
                literal.push(next);
                i += 2;
            } else {
                literal.push(c);
                i += 1;
            }
            continue;
        }

        if c == '$' {
            flush_literal(&mut inner_parts, &mut literal);
            match consume_dollar_expansion(ctx, value, i, true) {
                Some((part, end_index)) => {
                    inner_parts.push(part);
                    i = end_index;
                }
                None => i += 1,
            }
            continue;
        }

        if c == '`' {
            flush_literal(&mut inner_parts, &mut literal);
            let (part, end_index) = (ctx.parse_backtick_substitution)(value, i, true);
            inner_parts.push(part);
            i = end_index;
            continue;
        }

        literal.push(c);
        i += 1;
    }

    flush_literal(&mut inner_parts, &mut literal);
    (AST::double_quoted(inner_parts), i)
}

/// Split `value` (the raw text of one unquoted or double-quoted word) into
/// its constituent [`WordPart`]s: literals, quoting, expansions, tildes,
/// globs, and brace expansion, applying whichever escaping/expansion rules
/// the caller's flags select (here-doc body, assignment RHS, regex operand
/// of `=~`, parameter-expansion operand, ...).
pub fn parse_word_parts(
    ctx: &ExpansionContext,
    value: &str,
    quoted: bool,
    single_quoted: bool,
    is_assignment: bool,
    here_doc: bool,
    single_quotes_are_literal: bool,
    no_brace_expansion: bool,
    regex_pattern: bool,
    in_parameter_expansion: bool,
) -> Vec<WordPart> {
    if single_quoted {
        return vec![AST::single_quoted(value)];
    }

    let chars: Vec<char> = value.chars().collect();

    if quoted {
        return vec![AST::double_quoted(parse_double_quoted_content(ctx, value))];
    }

    if value.len() >= 2 && chars.first() == Some(&'"') && chars.last() == Some(&'"') && !contains_unescaped_double_quote(&chars[1..chars.len() - 1]) {
        let inner: String = chars[1..chars.len() - 1].iter().collect();
        return vec![AST::double_quoted(parse_double_quoted_content(ctx, &inner))];
    }

    let mut parts: Vec<WordPart> = Vec::new();
    let mut i = 0;
    let mut literal = String::new();

    while i < chars.len() {
        let c = chars[i];

        if c == '\\' && i + 1 < chars.len() {
            let next = chars[i + 1];

            if regex_pattern {
                flush_literal(&mut parts, &mut literal);
                parts.push(AST::escaped(next.to_string()));
                i += 2;
                continue;
            }

            let is_escapable = if here_doc {
                "$`\n".contains(next)
            } else {
                "$`\"'\n".contains(next) || (in_parameter_expansion && next == '}')
            };
            let is_glob_meta_or_backslash = if single_quotes_are_literal {
                "*?[]\\".contains(next)
            } else {
                "*?[]\\(){}.^+".contains(next)
            };

            if is_escapable {
                literal.push(next);
            } else if is_glob_meta_or_backslash {
                flush_literal(&mut parts, &mut literal);
                parts.push(AST::escaped(next.to_string()));
            } else {
                literal.push('\\');
                literal.push(next);
            }
            i += 2;
            continue;
        }

        if c == '\'' && !single_quotes_are_literal && !here_doc {
            flush_literal(&mut parts, &mut literal);
            match chars[i + 1..].iter().position(|&x| x == '\'') {
                Some(rel_pos) => {
                    let quoted_content: String = chars[i + 1..i + 1 + rel_pos].iter().collect();
                    parts.push(AST::single_quoted(&quoted_content));
                    i = i + 1 + rel_pos + 1;
                }
                None => {
                    let remaining: String = chars[i..].iter().collect();
                    literal.push_str(&remaining);
                    break;
                }
            }
            continue;
        }

        if c == '"' && !here_doc {
            flush_literal(&mut parts, &mut literal);
            let (part, end_index) = parse_double_quoted(ctx, value, i + 1);
            parts.push(part);
            i = end_index + 1;
            continue;
        }

        if c == '$' && chars.get(i + 1) == Some(&'\'') {
            flush_literal(&mut parts, &mut literal);
            let (part, end_index) = word_parser::parse_ansi_c_quoted(value, i + 2);
            parts.push(part);
            i = end_index;
            continue;
        }

        if c == '$' {
            flush_literal(&mut parts, &mut literal);
            match consume_dollar_expansion(ctx, value, i, false) {
                Some((part, end_index)) => {
                    parts.push(part);
                    i = end_index;
                }
                None => {
                    literal.push('$');
                    i += 1;
                }
            }
            continue;
        }

        if c == '`' {
            flush_literal(&mut parts, &mut literal);
            let (part, end_index) = (ctx.parse_backtick_substitution)(value, i, false);
            parts.push(part);
            i = end_index;
            continue;
        }

        if c == '~' {
            let prev_char = if i > 0 { Some(chars[i - 1]) } else { None };
            let can_expand_after_colon = is_assignment && prev_char == Some(':');
            if (i == 0 || prev_char == Some('=') || can_expand_after_colon) && try_parse_tilde(&chars, value, i, &mut parts, &mut literal, &mut i) {
                continue;
            }
        }

        if "@*+?!".contains(c) && chars.get(i + 1) == Some(&'(') {
            let close = find_extglob_close(value, i + 1);
            if close >= 0 {
                let close_idx = close as usize;
                flush_literal(&mut parts, &mut literal);
                let pattern: String = chars[i..=close_idx].iter().collect();
                parts.push(WordPart::Glob(GlobPart { pattern }));
                i = close_idx + 1;
                continue;
            }
        }

        if c == '*' || c == '?' || c == '[' {
            flush_literal(&mut parts, &mut literal);
            let (pattern, end_index) = word_parser::parse_glob_pattern(value, i);
            parts.push(WordPart::Glob(GlobPart { pattern }));
            i = end_index;
            continue;
        }

        if c == '{' && !is_assignment && !no_brace_expansion {
            if let Some((part, end_index)) = word_parser::try_parse_brace_expansion(value, i, None) {
                flush_literal(&mut parts, &mut literal);
                parts.push(part);
                i = end_index;
                continue;
            }
        }

        literal.push(c);
        i += 1;
    }

    flush_literal(&mut parts, &mut literal);
    parts
}

fn contains_unescaped_double_quote(inner_chars: &[char]) -> bool {
    let mut j = 0;
    while j < inner_chars.len() {
        if inner_chars[j] == '"' {
            return true;
        }
        if inner_chars[j] == '\\' && j + 1 < inner_chars.len() {
            j += 1;
        }
        j += 1;
    }
    false
}

/// Try to consume a leading tilde-expansion span (`~`, `~user`, `~/`, ...)
/// at `i`. Returns `false` (leaving everything untouched) when what follows
/// isn't actually a tilde-prefix boundary, so the caller falls through to
/// treating `~` as an ordinary character.
fn try_parse_tilde(chars: &[char], value: &str, i: usize, parts: &mut Vec<WordPart>, literal: &mut String, cursor: &mut usize) -> bool {
    let tilde_end = word_parser::find_tilde_end(value, i);
    let after_tilde = chars.get(tilde_end).copied();
    if after_tilde.is_some() && after_tilde != Some('/') && after_tilde != Some(':') {
        return false;
    }
    flush_literal(parts, literal);
    let user_str: String = chars[i + 1..tilde_end].iter().collect();
    let user = if user_str.is_empty() { None } else { Some(user_str) };
    parts.push(WordPart::TildeExpansion(TildeExpansionPart { user }));
    *cursor = tilde_end;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_parameter_reads_name_up_to_non_identifier_char() {
        let (part, idx) = parse_simple_parameter("$var rest", 0);
        assert_eq!(part.parameter, "var");
        assert_eq!(idx, 4);
    }

    #[test]
    fn special_single_char_parameter_consumes_only_that_char() {
        let (part, idx) = parse_simple_parameter("$@ rest", 0);
        assert_eq!(part.parameter, "@");
        assert_eq!(idx, 2);
    }

    #[test]
    fn extglob_close_paren_search_handles_nesting() {
        assert_eq!(find_extglob_close("@(a|b)", 1), 5);
        assert_eq!(find_extglob_close("@(a|(b|c))", 1), 9);
    }

    #[test]
    fn plain_word_without_specials_becomes_one_literal_part() {
        let ctx = dummy_expansion_context();
        let parts = parse_word_parts(&ctx, "hello", false, false, false, false, false, false, false, false);
        assert_eq!(parts.len(), 1);
        assert!(matches!(&parts[0], WordPart::Literal(l) if l.value == "hello"));
    }

    #[test]
    fn single_quoted_flag_bypasses_all_other_parsing() {
        let ctx = dummy_expansion_context();
        let parts = parse_word_parts(&ctx, "$weird `stuff`", false, true, false, false, false, false, false, false);
        assert_eq!(parts.len(), 1);
        assert!(matches!(&parts[0], WordPart::SingleQuoted(_)));
    }
}
