//! Precedence-climbing parser for `$(( ))` arithmetic expressions:
//! `$((1 + 2))`, `$((x++))`, `$((a ? b : c))`, `$((2#1010))`, array
//! subscripts, and the C-style assignment/compound-assignment operators.
//!
//! The grammar is the usual C precedence ladder, from loosest to tightest:
//! comma, ternary, `||`, `&&`, `|`, `^`, `&`, equality, relational, shift,
//! additive, multiplicative, power (right-associative), unary, postfix,
//! primary. Every left-associative binary level shares one driver,
//! [`parse_binary_level`], parametrized by an operator table and the next
//! tighter-precedence function to recurse into.

use crate::ast::types::*;
use super::arithmetic_primaries::{
    skip_arith_whitespace, parse_arith_number, ARITH_ASSIGN_OPS,
    parse_ansi_c_quoting, parse_localization_quoting, parse_nested_arithmetic,
};

pub use super::arithmetic_primaries::parse_arith_number as parse_number;

/// Strip double-quoted spans down to their raw content (with `\x` escapes
/// resolved) before parsing; bash treats `"..."` inside arithmetic as
/// nothing more than an escaping mechanism, not an expression primary.
fn preprocess_arith_input(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut result = String::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '"' {
            result.push(chars[i]);
            i += 1;
            continue;
        }
        i += 1;
        while i < chars.len() && chars[i] != '"' {
            if chars[i] == '\\' && i + 1 < chars.len() {
                result.push(chars[i + 1]);
                i += 2;
            } else {
                result.push(chars[i]);
                i += 1;
            }
        }
        if i < chars.len() {
            i += 1;
        }
    }
    result
}

pub fn parse_arithmetic_expression(input: &str) -> ArithmeticExpressionNode {
    let preprocessed = preprocess_arith_input(input);
    let (expression, pos) = parse_arith_expr(&preprocessed, 0);

    let final_pos = skip_arith_whitespace(&preprocessed, pos);
    if final_pos < preprocessed.len() {
        let remaining = preprocessed[final_pos..].trim().to_string();
        if !remaining.is_empty() {
            return ArithmeticExpressionNode {
                original_text: Some(input.to_string()),
                expression: ArithExpr::SyntaxError(ArithSyntaxErrorNode {
                    error_token: remaining.clone(),
                    message: format!("{}: syntax error: invalid arithmetic operator (error token is \"{}\")", remaining, remaining),
                }),
            };
        }
    }

    ArithmeticExpressionNode { expression, original_text: Some(input.to_string()) }
}

fn missing_operand_error(op: &str, pos: usize) -> (ArithExpr, usize) {
    (
        ArithExpr::SyntaxError(ArithSyntaxErrorNode {
            error_token: op.to_string(),
            message: format!("syntax error: operand expected (error token is \"{}\")", op),
        }),
        pos,
    )
}

fn is_missing_operand(input: &str, pos: usize) -> bool {
    skip_arith_whitespace(input, pos) >= input.len()
}

pub fn parse_arith_expr(input: &str, pos: usize) -> (ArithExpr, usize) {
    parse_arith_comma(input, pos)
}

/// One entry of a binary-operator precedence table: the operator's source
/// text, the node it builds, and whether a single-char operator should NOT
/// match when immediately followed by the same character again (so `+`
/// doesn't swallow half of `++`, `&` doesn't swallow half of `&&`, etc).
type BinOpEntry = (&'static str, ArithBinaryOperator, bool);

const EQUALITY_OPS: &[BinOpEntry] = &[("==", ArithBinaryOperator::Eq, false), ("!=", ArithBinaryOperator::Ne, false)];
const RELATIONAL_OPS: &[BinOpEntry] = &[
    ("<=", ArithBinaryOperator::Le, false),
    (">=", ArithBinaryOperator::Ge, false),
    ("<", ArithBinaryOperator::Lt, false),
    (">", ArithBinaryOperator::Gt, false),
];
const SHIFT_OPS: &[BinOpEntry] = &[("<<", ArithBinaryOperator::LShift, false), (">>", ArithBinaryOperator::RShift, false)];
const ADDITIVE_OPS: &[BinOpEntry] = &[("+", ArithBinaryOperator::Add, true), ("-", ArithBinaryOperator::Sub, true)];
const MULTIPLICATIVE_OPS: &[BinOpEntry] = &[
    ("*", ArithBinaryOperator::Mul, true),
    ("/", ArithBinaryOperator::Div, false),
    ("%", ArithBinaryOperator::Mod, false),
];
const BITWISE_OR_OPS: &[BinOpEntry] = &[("|", ArithBinaryOperator::BitOr, true)];
const BITWISE_XOR_OPS: &[BinOpEntry] = &[("^", ArithBinaryOperator::BitXor, false)];
const BITWISE_AND_OPS: &[BinOpEntry] = &[("&", ArithBinaryOperator::BitAnd, true)];
const LOGICAL_AND_OPS: &[BinOpEntry] = &[("&&", ArithBinaryOperator::LogAnd, false)];
const LOGICAL_OR_OPS: &[BinOpEntry] = &[("||", ArithBinaryOperator::LogOr, false)];

/// Try to match one operator table entry at `pos`, returning the position
/// just past it. A single-character operator whose `reject_doubled` flag is
/// set refuses to match when the next character repeats it (distinguishing
/// e.g. `+` from the first half of `++`).
fn match_binary_op(chars: &[char], input: &str, pos: usize, entry: &BinOpEntry) -> Option<usize> {
    let (text, _, reject_doubled) = *entry;
    if text.len() == 1 {
        let c = text.chars().next().unwrap();
        if chars.get(pos) != Some(&c) {
            return None;
        }
        if reject_doubled && chars.get(pos + 1) == Some(&c) {
            return None;
        }
        Some(pos + 1)
    } else if input[pos..].starts_with(text) {
        Some(pos + text.len())
    } else {
        None
    }
}

/// Drive one left-associative binary precedence level: parse an operand via
/// `next`, then repeatedly consume any operator in `ops` (tried in table
/// order, so longer operators must precede their single-char prefixes)
/// followed by another operand.
fn parse_binary_level(input: &str, pos: usize, next: fn(&str, usize) -> (ArithExpr, usize), ops: &[BinOpEntry]) -> (ArithExpr, usize) {
    let (mut left, mut current_pos) = next(input, pos);
    let chars: Vec<char> = input.chars().collect();

    loop {
        current_pos = skip_arith_whitespace(input, current_pos);
        let matched = ops.iter().find_map(|entry| match_binary_op(&chars, input, current_pos, entry).map(|end| (end, entry)));

        let Some((op_end, (op_text, operator, _))) = matched else { break };
        current_pos = op_end;
        if is_missing_operand(input, current_pos) {
            return missing_operand_error(op_text, current_pos);
        }
        let (right, next_pos) = next(input, current_pos);
        left = ArithExpr::Binary(Box::new(ArithBinaryNode { operator: *operator, left, right }));
        current_pos = next_pos;
    }

    (left, current_pos)
}

fn parse_arith_comma(input: &str, pos: usize) -> (ArithExpr, usize) {
    let (mut left, mut current_pos) = parse_arith_ternary(input, pos);
    let chars: Vec<char> = input.chars().collect();
    current_pos = skip_arith_whitespace(input, current_pos);

    while current_pos < chars.len() && chars[current_pos] == ',' {
        current_pos += 1;
        if is_missing_operand(input, current_pos) {
            return missing_operand_error(",", current_pos);
        }
        let (right, p2) = parse_arith_ternary(input, current_pos);
        left = ArithExpr::Binary(Box::new(ArithBinaryNode { operator: ArithBinaryOperator::Comma, left, right }));
        current_pos = skip_arith_whitespace(input, p2);
    }

    (left, current_pos)
}

fn parse_arith_ternary(input: &str, pos: usize) -> (ArithExpr, usize) {
    let (condition, mut current_pos) = parse_arith_logical_or(input, pos);
    let chars: Vec<char> = input.chars().collect();
    current_pos = skip_arith_whitespace(input, current_pos);

    if current_pos < chars.len() && chars[current_pos] == '?' {
        current_pos += 1;
        let (consequent, p2) = parse_arith_expr(input, current_pos);
        current_pos = skip_arith_whitespace(input, p2);
        if current_pos < chars.len() && chars[current_pos] == ':' {
            current_pos += 1;
            let (alternate, p3) = parse_arith_expr(input, current_pos);
            return (ArithExpr::Ternary(Box::new(ArithTernaryNode { condition, consequent, alternate })), p3);
        }
    }

    (condition, current_pos)
}

fn parse_arith_logical_or(input: &str, pos: usize) -> (ArithExpr, usize) {
    parse_binary_level(input, pos, parse_arith_logical_and, LOGICAL_OR_OPS)
}

fn parse_arith_logical_and(input: &str, pos: usize) -> (ArithExpr, usize) {
    parse_binary_level(input, pos, parse_arith_bitwise_or, LOGICAL_AND_OPS)
}

fn parse_arith_bitwise_or(input: &str, pos: usize) -> (ArithExpr, usize) {
    parse_binary_level(input, pos, parse_arith_bitwise_xor, BITWISE_OR_OPS)
}

fn parse_arith_bitwise_xor(input: &str, pos: usize) -> (ArithExpr, usize) {
    parse_binary_level(input, pos, parse_arith_bitwise_and, BITWISE_XOR_OPS)
}

fn parse_arith_bitwise_and(input: &str, pos: usize) -> (ArithExpr, usize) {
    parse_binary_level(input, pos, parse_arith_equality, BITWISE_AND_OPS)
}

fn parse_arith_equality(input: &str, pos: usize) -> (ArithExpr, usize) {
    parse_binary_level(input, pos, parse_arith_relational, EQUALITY_OPS)
}

fn parse_arith_relational(input: &str, pos: usize) -> (ArithExpr, usize) {
    parse_binary_level(input, pos, parse_arith_shift, RELATIONAL_OPS)
}

fn parse_arith_shift(input: &str, pos: usize) -> (ArithExpr, usize) {
    parse_binary_level(input, pos, parse_arith_additive, SHIFT_OPS)
}

fn parse_arith_additive(input: &str, pos: usize) -> (ArithExpr, usize) {
    parse_binary_level(input, pos, parse_arith_multiplicative, ADDITIVE_OPS)
}

fn parse_arith_multiplicative(input: &str, pos: usize) -> (ArithExpr, usize) {
    parse_binary_level(input, pos, parse_arith_power, MULTIPLICATIVE_OPS)
}

fn parse_arith_power(input: &str, pos: usize) -> (ArithExpr, usize) {
    let (base, current_pos) = parse_arith_unary(input, pos);
    let mut p2 = skip_arith_whitespace(input, current_pos);

    if input[p2..].starts_with("**") {
        p2 += 2;
        if is_missing_operand(input, p2) {
            return missing_operand_error("**", p2);
        }
        let (exponent, p3) = parse_arith_power(input, p2); // right-associative
        return (ArithExpr::Binary(Box::new(ArithBinaryNode { operator: ArithBinaryOperator::Pow, left: base, right: exponent })), p3);
    }

    (base, current_pos)
}

fn parse_arith_unary(input: &str, pos: usize) -> (ArithExpr, usize) {
    let current_pos = skip_arith_whitespace(input, pos);
    let chars: Vec<char> = input.chars().collect();

    let prefix_inc_dec = [("++", ArithUnaryOperator::Inc), ("--", ArithUnaryOperator::Dec)];
    for (text, operator) in prefix_inc_dec {
        if input[current_pos..].starts_with(text) {
            let (operand, p2) = parse_arith_unary(input, current_pos + 2);
            return (ArithExpr::Unary(Box::new(ArithUnaryNode { operator, operand, prefix: true })), p2);
        }
    }

    if let Some(&c) = chars.get(current_pos) {
        let op = match c {
            '+' => Some(ArithUnaryOperator::Pos),
            '-' => Some(ArithUnaryOperator::Neg),
            '!' => Some(ArithUnaryOperator::Not),
            '~' => Some(ArithUnaryOperator::BitNot),
            _ => None,
        };
        if let Some(operator) = op {
            let (operand, p2) = parse_arith_unary(input, current_pos + 1);
            return (ArithExpr::Unary(Box::new(ArithUnaryNode { operator, operand, prefix: true })), p2);
        }
    }

    parse_arith_postfix(input, current_pos)
}

fn can_start_concat_primary(input: &str, pos: usize) -> bool {
    matches!(input.chars().nth(pos), Some('$') | Some('`'))
}

fn apply_assignment_operator(input: &str, pos: usize, skip_double_eq: bool) -> Option<(ArithAssignmentOperator, ArithExpr, usize)> {
    for op_str in ARITH_ASSIGN_OPS {
        if input[pos..].starts_with(op_str) && (!skip_double_eq || !input[pos..].starts_with("==")) {
            let value_pos = pos + op_str.len();
            let (value, p2) = parse_arith_ternary(input, value_pos);
            let operator = match *op_str {
                "=" => ArithAssignmentOperator::Assign,
                "+=" => ArithAssignmentOperator::AddAssign,
                "-=" => ArithAssignmentOperator::SubAssign,
                "*=" => ArithAssignmentOperator::MulAssign,
                "/=" => ArithAssignmentOperator::DivAssign,
                "%=" => ArithAssignmentOperator::ModAssign,
                "<<=" => ArithAssignmentOperator::LShiftAssign,
                ">>=" => ArithAssignmentOperator::RShiftAssign,
                "&=" => ArithAssignmentOperator::AndAssign,
                "|=" => ArithAssignmentOperator::OrAssign,
                "^=" => ArithAssignmentOperator::XorAssign,
                _ => ArithAssignmentOperator::Assign,
            };
            return Some((operator, value, p2));
        }
    }
    None
}

fn parse_arith_postfix(input: &str, pos: usize) -> (ArithExpr, usize) {
    let (first, mut current_pos) = parse_arith_primary(input, pos, false);

    let mut parts: Vec<ArithExpr> = vec![first];
    while can_start_concat_primary(input, current_pos) {
        let (next_expr, next_pos) = parse_arith_primary(input, current_pos, true);
        parts.push(next_expr);
        current_pos = next_pos;
    }
    let mut expr = if parts.len() > 1 { ArithExpr::Concat(ArithConcatNode { parts }) } else { parts.into_iter().next().unwrap() };

    let chars: Vec<char> = input.chars().collect();
    if current_pos < chars.len() && chars[current_pos] == '[' && matches!(expr, ArithExpr::Concat(_)) {
        current_pos += 1;
        let (index_expr, p2) = parse_arith_expr(input, current_pos);
        current_pos = p2;
        if current_pos < chars.len() && chars[current_pos] == ']' {
            current_pos += 1;
        }
        expr = ArithExpr::DynamicElement(Box::new(ArithDynamicElementNode { name_expr: expr, subscript: Box::new(index_expr) }));
    }

    current_pos = skip_arith_whitespace(input, current_pos);

    if matches!(&expr, ArithExpr::Concat(_) | ArithExpr::Variable(_) | ArithExpr::DynamicElement(_)) {
        if let Some((operator, value, p2)) = apply_assignment_operator(input, current_pos, true) {
            match expr {
                ArithExpr::DynamicElement(de) => {
                    return (
                        ArithExpr::DynamicAssignment(Box::new(ArithDynamicAssignmentNode {
                            operator,
                            target: de.name_expr,
                            subscript: Some(de.subscript),
                            value,
                        })),
                        p2,
                    );
                }
                ArithExpr::Concat(_) => {
                    return (
                        ArithExpr::DynamicAssignment(Box::new(ArithDynamicAssignmentNode { operator, target: expr, subscript: None, value })),
                        p2,
                    );
                }
                ArithExpr::Variable(ref v) => {
                    return (
                        ArithExpr::Assignment(Box::new(ArithAssignmentNode {
                            operator,
                            variable: v.name.clone(),
                            subscript: None,
                            string_key: None,
                            value,
                        })),
                        p2,
                    );
                }
                _ => unreachable!(),
            }
        }
    }

    if input[current_pos..].starts_with("++") {
        return (ArithExpr::Unary(Box::new(ArithUnaryNode { operator: ArithUnaryOperator::Inc, operand: expr, prefix: false })), current_pos + 2);
    }
    if input[current_pos..].starts_with("--") {
        return (ArithExpr::Unary(Box::new(ArithUnaryNode { operator: ArithUnaryOperator::Dec, operand: expr, prefix: false })), current_pos + 2);
    }

    (expr, current_pos)
}

/// Parse one of the substitution-style primaries that embed a whole
/// sub-script: `$((...))`/nested arithmetic, `$'...'`, `$"..."`, `$(cmd)`,
/// or `` `cmd` ``. Returns `None` when `input[pos..]` doesn't start with one
/// of these forms, so the caller falls through to literal/variable parsing.
fn parse_substitution_primary(input: &str, pos: usize) -> Option<(ArithExpr, usize)> {
    if let Some(result) = parse_nested_arithmetic(|s, p| Some(parse_arith_expr(s, p)), input, pos) {
        return Some((result.expr, result.pos));
    }
    if let Some(result) = parse_ansi_c_quoting(input, pos) {
        return Some((result.expr, result.pos));
    }
    if let Some(result) = parse_localization_quoting(input, pos) {
        return Some((result.expr, result.pos));
    }

    if input[pos..].starts_with("$(") && !input[pos..].starts_with("$((") {
        let chars: Vec<char> = input.chars().collect();
        let cmd_start = pos + 2;
        let mut current_pos = cmd_start;
        let mut depth = 1;
        while current_pos < chars.len() && depth > 0 {
            match chars[current_pos] {
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => {}
            }
            if depth > 0 {
                current_pos += 1;
            }
        }
        let command: String = chars[cmd_start..current_pos].iter().collect();
        return Some((ArithExpr::CommandSubst(ArithCommandSubstNode { command }), current_pos + 1));
    }

    if input[pos..].starts_with('`') {
        let chars: Vec<char> = input.chars().collect();
        let cmd_start = pos + 1;
        let mut current_pos = cmd_start;
        while current_pos < chars.len() && chars[current_pos] != '`' {
            current_pos += 1;
        }
        let command: String = chars[cmd_start..current_pos].iter().collect();
        if current_pos < chars.len() {
            current_pos += 1;
        }
        return Some((ArithExpr::CommandSubst(ArithCommandSubstNode { command }), current_pos));
    }

    None
}

/// Parse a `${...}` braced-expansion primary, including the two forms bash
/// nests inside arithmetic that aren't ordinary parameter expansion: a
/// dynamic base constant (`${base}#digits`) and a dynamic numeric prefix
/// (`${zero}11` octal, `${zero}xAB` hex). `brace_start` must point just
/// past the opening `${`.
fn parse_braced_expansion_primary(chars: &[char], brace_start: usize) -> (ArithExpr, usize) {
    let mut depth = 1;
    let mut i = brace_start;
    while i < chars.len() && depth > 0 {
        match chars[i] {
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
        if depth > 0 {
            i += 1;
        }
    }
    let content: String = chars[brace_start..i].iter().collect();
    let after_brace = i + 1;

    if chars.get(after_brace) == Some(&'#') {
        let mut value_end = after_brace + 1;
        while value_end < chars.len() && (chars[value_end].is_ascii_alphanumeric() || chars[value_end] == '@' || chars[value_end] == '_') {
            value_end += 1;
        }
        let value: String = chars[after_brace + 1..value_end].iter().collect();
        return (ArithExpr::DynamicBase(ArithDynamicBaseNode { base_expr: content, value }), value_end);
    }

    if matches!(chars.get(after_brace), Some(c) if c.is_ascii_digit() || *c == 'x' || *c == 'X') {
        let mut num_end = after_brace;
        if matches!(chars[after_brace], 'x' | 'X') {
            num_end += 1;
            while num_end < chars.len() && chars[num_end].is_ascii_hexdigit() {
                num_end += 1;
            }
        } else {
            while num_end < chars.len() && chars[num_end].is_ascii_digit() {
                num_end += 1;
            }
        }
        let suffix: String = chars[after_brace..num_end].iter().collect();
        return (ArithExpr::DynamicNumber(ArithDynamicNumberNode { prefix: content, suffix }), num_end);
    }

    (ArithExpr::BracedExpansion(ArithBracedExpansionNode { content }), after_brace)
}

/// Parse a numeric literal primary: decimal, `0x`/`0X` hex, `base#digits`,
/// or one of the "not a valid number" error shapes (trailing identifier
/// characters, a decimal point, or an array subscript directly on a
/// number).
fn parse_number_primary(chars: &[char], start: usize) -> (ArithExpr, usize) {
    let mut current_pos = start;
    let mut num_str = String::new();
    let mut seen_hash = false;
    let mut is_hex = false;

    while current_pos < chars.len() {
        let ch = chars[current_pos];
        if seen_hash {
            if ch.is_ascii_alphanumeric() || ch == '@' || ch == '_' {
                num_str.push(ch);
                current_pos += 1;
            } else {
                break;
            }
        } else if ch == '#' {
            seen_hash = true;
            num_str.push(ch);
            current_pos += 1;
        } else if num_str == "0" && matches!(ch, 'x' | 'X') && chars.get(current_pos + 1).is_some_and(|c| c.is_ascii_hexdigit()) {
            is_hex = true;
            num_str.push(ch);
            current_pos += 1;
        } else if is_hex && ch.is_ascii_hexdigit() {
            num_str.push(ch);
            current_pos += 1;
        } else if !is_hex && ch.is_ascii_digit() {
            num_str.push(ch);
            current_pos += 1;
        } else {
            break;
        }
    }

    if matches!(chars.get(current_pos), Some(c) if c.is_ascii_alphabetic() || *c == '_') {
        let mut invalid_token = num_str.clone();
        while matches!(chars.get(current_pos), Some(c) if c.is_ascii_alphanumeric() || *c == '_') {
            invalid_token.push(chars[current_pos]);
            current_pos += 1;
        }
        return (
            ArithExpr::SyntaxError(ArithSyntaxErrorNode {
                error_token: invalid_token.clone(),
                message: format!("{}: value too great for base (error token is \"{}\")", invalid_token, invalid_token),
            }),
            current_pos,
        );
    }

    if chars.get(current_pos) == Some(&'.') && chars.get(current_pos + 1).is_some_and(|c| c.is_ascii_digit()) {
        let mut float_str = num_str.clone();
        float_str.push('.');
        float_str.push(chars[current_pos + 1]);
        return (
            ArithExpr::SyntaxError(ArithSyntaxErrorNode {
                error_token: float_str.clone(),
                message: format!("{}...: syntax error: invalid arithmetic operator", float_str),
            }),
            current_pos,
        );
    }

    if chars.get(current_pos) == Some(&'[') {
        let error_token: String = chars[current_pos..].iter().collect::<String>().trim().to_string();
        return (ArithExpr::NumberSubscript(ArithNumberSubscriptNode { number: num_str, error_token }), chars.len());
    }

    let value = parse_arith_number(&num_str).unwrap_or(0);
    (ArithExpr::Number(ArithNumberNode { value }), current_pos)
}

/// Parse a name primary (`$name`, `name`, or `$1`/`$*`-style special forms),
/// including array-subscript and assignment-operator suffixes, unless
/// `skip_assignment` is set (used while scanning a concatenation operand,
/// where `=` belongs to the outer postfix parse instead).
fn parse_name_primary(input: &str, chars: &[char], start: usize, skip_assignment: bool) -> (ArithExpr, usize) {
    if chars.get(start) == Some(&'$') && chars.get(start + 1).is_some_and(|c| c.is_ascii_digit()) {
        let mut current_pos = start + 1;
        let mut name = String::new();
        while chars.get(current_pos).is_some_and(|c| c.is_ascii_digit()) {
            name.push(chars[current_pos]);
            current_pos += 1;
        }
        return (ArithExpr::Variable(ArithVariableNode { name, has_dollar_prefix: true }), current_pos);
    }

    if chars.get(start) == Some(&'$') && matches!(chars.get(start + 1), Some('*' | '@' | '#' | '?' | '-' | '!' | '$')) {
        let name = chars[start + 1].to_string();
        return (ArithExpr::SpecialVar(ArithSpecialVarNode { name }), start + 2);
    }

    let mut current_pos = start;
    let mut has_dollar_prefix = false;
    if chars.get(current_pos) == Some(&'$') && chars.get(current_pos + 1).is_some_and(|c| c.is_ascii_alphabetic() || *c == '_') {
        has_dollar_prefix = true;
        current_pos += 1;
    }

    let is_name_start = chars.get(current_pos).is_some_and(|c| c.is_ascii_alphabetic() || *c == '_');
    if !is_name_start {
        return parse_invalid_char_primary(chars, current_pos);
    }

    let mut name = String::new();
    while chars.get(current_pos).is_some_and(|c| c.is_ascii_alphanumeric() || *c == '_') {
        name.push(chars[current_pos]);
        current_pos += 1;
    }

    if chars.get(current_pos) == Some(&'[') && !skip_assignment {
        return parse_array_subscript_primary(input, chars, current_pos + 1, name);
    }

    current_pos = skip_arith_whitespace(input, current_pos);
    if !skip_assignment {
        if let Some((operator, value, p2)) = apply_assignment_operator(input, current_pos, true) {
            return (
                ArithExpr::Assignment(Box::new(ArithAssignmentNode { operator, variable: name, subscript: None, string_key: None, value })),
                p2,
            );
        }
    }

    (ArithExpr::Variable(ArithVariableNode { name, has_dollar_prefix }), current_pos)
}

/// Parse `name[...]` once the caller has already consumed `name[`: a quoted
/// associative-array key, a numeric subscript expression, a chained double
/// subscript (`arr[i][j]`, reported as an error shape upstream resolves),
/// or a compound-assignment suffix.
fn parse_array_subscript_primary(input: &str, chars: &[char], mut current_pos: usize, name: String) -> (ArithExpr, usize) {
    let mut string_key: Option<String> = None;
    if matches!(chars.get(current_pos), Some('\'' | '"')) {
        let quote = chars[current_pos];
        current_pos += 1;
        let mut key = String::new();
        while chars.get(current_pos).is_some_and(|&c| c != quote) {
            key.push(chars[current_pos]);
            current_pos += 1;
        }
        if chars.get(current_pos) == Some(&quote) {
            current_pos += 1;
        }
        string_key = Some(key);
        current_pos = skip_arith_whitespace(input, current_pos);
        if chars.get(current_pos) == Some(&']') {
            current_pos += 1;
        }
    }

    let mut index_expr: Option<ArithExpr> = None;
    if string_key.is_none() {
        let (expr, p2) = parse_arith_expr(input, current_pos);
        index_expr = Some(expr);
        current_pos = p2;
        if chars.get(current_pos) == Some(&']') {
            current_pos += 1;
        }
    }

    current_pos = skip_arith_whitespace(input, current_pos);

    if chars.get(current_pos) == Some(&'[') && index_expr.is_some() {
        return (
            ArithExpr::DoubleSubscript(ArithDoubleSubscriptNode { array: name, index: Box::new(index_expr.unwrap()) }),
            current_pos,
        );
    }

    if let Some((operator, value, p2)) = apply_assignment_operator(input, current_pos, true) {
        return (
            ArithExpr::Assignment(Box::new(ArithAssignmentNode {
                operator,
                variable: name,
                subscript: index_expr.map(Box::new),
                string_key,
                value,
            })),
            p2,
        );
    }

    (ArithExpr::ArrayElement(ArithArrayElementNode { array: name, index: index_expr.map(Box::new), string_key }), current_pos)
}

/// Final fallback: a leading `#` not belonging to a numeric literal is a
/// syntax error that consumes the rest of the line; anything else defaults
/// to a bare `0`, matching bash's tolerant behavior on an empty expression.
fn parse_invalid_char_primary(chars: &[char], pos: usize) -> (ArithExpr, usize) {
    if chars.get(pos) != Some(&'#') {
        return (ArithExpr::Number(ArithNumberNode { value: 0 }), pos);
    }

    let mut error_end = pos + 1;
    while error_end < chars.len() && chars[error_end] != '\n' {
        error_end += 1;
    }
    let error_token: String = chars[pos..error_end].iter().collect::<String>().trim().to_string();
    let error_token = if error_token.is_empty() { "#".to_string() } else { error_token };
    (
        ArithExpr::SyntaxError(ArithSyntaxErrorNode {
            error_token: error_token.clone(),
            message: format!("{}: syntax error: invalid arithmetic operator (error token is \"{}\")", error_token, error_token),
        }),
        chars.len(),
    )
}

fn parse_arith_primary(input: &str, pos: usize, skip_assignment: bool) -> (ArithExpr, usize) {
    let current_pos = skip_arith_whitespace(input, pos);
    let chars: Vec<char> = input.chars().collect();

    if let Some(result) = parse_substitution_primary(input, current_pos) {
        return result;
    }

    if current_pos < chars.len() && chars[current_pos] == '(' {
        let (expr, p2) = parse_arith_expr(input, current_pos + 1);
        let mut end_pos = skip_arith_whitespace(input, p2);
        if chars.get(end_pos) == Some(&')') {
            end_pos += 1;
        }
        return (ArithExpr::Group(Box::new(ArithGroupNode { expression: expr })), end_pos);
    }

    if current_pos < chars.len() && chars[current_pos] == '\'' {
        let mut p = current_pos + 1;
        let mut content = String::new();
        while chars.get(p).is_some_and(|&c| c != '\'') {
            content.push(chars[p]);
            p += 1;
        }
        if chars.get(p) == Some(&'\'') {
            p += 1;
        }
        let value = content.parse::<i64>().unwrap_or(0);
        return (ArithExpr::SingleQuote(ArithSingleQuoteNode { content, value }), p);
    }

    if current_pos < chars.len() && chars[current_pos] == '"' {
        let mut p = current_pos + 1;
        let mut content = String::new();
        while chars.get(p).is_some_and(|&c| c != '"') {
            if chars[p] == '\\' && p + 1 < chars.len() {
                content.push(chars[p + 1]);
                p += 2;
            } else {
                content.push(chars[p]);
                p += 1;
            }
        }
        if chars.get(p) == Some(&'"') {
            p += 1;
        }
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return (ArithExpr::Number(ArithNumberNode { value: 0 }), p);
        }
        let (expr, _) = parse_arith_expr(trimmed, 0);
        return (expr, p);
    }

    if current_pos < chars.len() && chars[current_pos].is_ascii_digit() {
        return parse_number_primary(&chars, current_pos);
    }

    if input[current_pos..].starts_with("${") {
        return parse_braced_expansion_primary(&chars, current_pos + 2);
    }

    if chars.get(current_pos) == Some(&'$') || matches!(chars.get(current_pos), Some(c) if c.is_ascii_alphabetic() || *c == '_') {
        return parse_name_primary(input, &chars, current_pos, skip_assignment);
    }

    parse_invalid_char_primary(&chars, current_pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_digits_parse_as_a_number() {
        let result = parse_arithmetic_expression("42");
        assert!(matches!(result.expression, ArithExpr::Number(n) if n.value == 42));
    }

    #[test]
    fn addition_produces_an_add_binary_node() {
        let result = parse_arithmetic_expression("1 + 2");
        assert!(matches!(result.expression, ArithExpr::Binary(b) if matches!(b.operator, ArithBinaryOperator::Add)));
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let result = parse_arithmetic_expression("1 + 2 * 3");
        if let ArithExpr::Binary(b) = result.expression {
            assert!(matches!(b.operator, ArithBinaryOperator::Add));
            assert!(matches!(b.right, ArithExpr::Binary(rb) if matches!(rb.operator, ArithBinaryOperator::Mul)));
        } else {
            panic!("expected a binary addition at the top");
        }
    }

    #[test]
    fn bare_name_parses_as_a_variable() {
        let result = parse_arithmetic_expression("x");
        assert!(matches!(result.expression, ArithExpr::Variable(v) if v.name == "x"));
    }

    #[test]
    fn equals_sign_produces_an_assignment_node() {
        let result = parse_arithmetic_expression("x = 5");
        if let ArithExpr::Assignment(a) = result.expression {
            assert_eq!(a.variable, "x");
            assert!(matches!(a.operator, ArithAssignmentOperator::Assign));
        } else {
            panic!("expected assignment");
        }
    }

    #[test]
    fn question_colon_produces_a_ternary_node() {
        let result = parse_arithmetic_expression("1 ? 2 : 3");
        assert!(matches!(result.expression, ArithExpr::Ternary(_)));
    }

    #[test]
    fn trailing_plusplus_is_postfix_increment() {
        let result = parse_arithmetic_expression("x++");
        if let ArithExpr::Unary(u) = result.expression {
            assert!(matches!(u.operator, ArithUnaryOperator::Inc));
            assert!(!u.prefix);
        } else {
            panic!("expected unary");
        }
    }

    #[test]
    fn leading_plusplus_is_prefix_increment() {
        let result = parse_arithmetic_expression("++x");
        if let ArithExpr::Unary(u) = result.expression {
            assert!(matches!(u.operator, ArithUnaryOperator::Inc));
            assert!(u.prefix);
        } else {
            panic!("expected unary");
        }
    }

    #[test]
    fn plus_does_not_swallow_half_of_plusplus() {
        let result = parse_arithmetic_expression("x+ +y");
        assert!(matches!(result.expression, ArithExpr::Binary(b) if matches!(b.operator, ArithBinaryOperator::Add)));
    }

    #[test]
    fn bitwise_or_is_distinct_from_logical_or() {
        let result = parse_arithmetic_expression("1 | 2");
        assert!(matches!(result.expression, ArithExpr::Binary(b) if matches!(b.operator, ArithBinaryOperator::BitOr)));
        let result = parse_arithmetic_expression("1 || 2");
        assert!(matches!(result.expression, ArithExpr::Binary(b) if matches!(b.operator, ArithBinaryOperator::LogOr)));
    }
}
