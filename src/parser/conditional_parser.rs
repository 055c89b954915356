//! Parsing for `[[ ... ]]` conditional expressions: the `||`/`&&`/`!`
//! precedence chain, unary file/string tests, binary comparisons, and the
//! `=~` regex operand (whose grammar is its own beast — see
//! [`parse_regex_pattern`]).

use crate::ast::types::{
    CondAndNode, CondBinaryNode, CondBinaryOperator, CondGroupNode, CondNotNode,
    CondOrNode, CondUnaryNode, CondUnaryOperator, CondWordNode, ConditionalExpressionNode,
    LiteralPart, WordNode, WordPart,
};
use crate::parser::lexer::TokenType;

pub const UNARY_OPS: &[&str] = &[
    "-a", "-b", "-c", "-d", "-e", "-f", "-g", "-h", "-k", "-p", "-r", "-s", "-t", "-u", "-w", "-x",
    "-G", "-L", "-N", "-O", "-S", "-z", "-n", "-o", "-v", "-R",
];

pub const BINARY_OPS: &[&str] = &[
    "==", "!=", "=~", "<", ">", "-eq", "-ne", "-lt", "-le", "-gt", "-ge", "-nt", "-ot", "-ef",
];

/// A token as seen by the `[[ ]]` parsing helpers.
#[derive(Debug, Clone)]
pub struct CondToken {
    pub token_type: TokenType,
    pub value: String,
    pub quoted: bool,
    pub start: usize,
    pub end: usize,
}

/// Closures back into the owning `Parser`.
pub struct CondParserContext<'a> {
    pub is_word: &'a dyn Fn() -> bool,
    pub check: &'a dyn Fn(TokenType) -> bool,
    pub peek: &'a dyn Fn(isize) -> CondToken,
    pub current: &'a dyn Fn() -> CondToken,
    pub advance: &'a dyn Fn() -> CondToken,
    pub expect: &'a dyn Fn(TokenType),
    pub skip_newlines: &'a dyn Fn(),
    pub parse_word_no_brace_expansion: &'a dyn Fn() -> WordNode,
    pub parse_word_for_regex: &'a dyn Fn() -> WordNode,
    pub parse_word_from_string:
        &'a dyn Fn(&str, bool, bool, bool, bool, bool) -> WordNode,
    pub get_input: &'a dyn Fn() -> String,
    pub error: &'a dyn Fn(&str),
}

/// Whether the current token can stand as a conditional operand. `[[ ]]`
/// relaxes the usual grammar here: `{`, `}`, and assignment-shaped words
/// (`a=x`) are all accepted as plain strings rather than their normal
/// structural roles.
fn is_cond_operand(ctx: &CondParserContext) -> bool {
    (ctx.is_word)()
        || (ctx.check)(TokenType::LBrace)
        || (ctx.check)(TokenType::RBrace)
        || (ctx.check)(TokenType::AssignmentWord)
}

/// Parse the pattern on the RHS of `==`/`!=`/bare `=`. Handles `!(...)`
/// extglob patterns specially, since the lexer tokenizes `!` and `(`
/// separately and this is the one place that glob shape needs reassembling
/// from tokens rather than being read as ordinary word text.
fn parse_pattern_word(ctx: &CondParserContext) -> WordNode {
    let is_negated_extglob = (ctx.check)(TokenType::Bang) && (ctx.peek)(1).token_type == TokenType::LParen;
    if !is_negated_extglob {
        return (ctx.parse_word_no_brace_expansion)();
    }

    (ctx.advance)(); // !
    (ctx.advance)(); // (

    let mut depth = 1;
    let mut pattern = String::from("!(");
    while depth > 0 && !(ctx.check)(TokenType::Eof) {
        if (ctx.check)(TokenType::LParen) {
            depth += 1;
            pattern.push('(');
            (ctx.advance)();
        } else if (ctx.check)(TokenType::RParen) {
            depth -= 1;
            if depth > 0 {
                pattern.push(')');
            }
            (ctx.advance)();
        } else if (ctx.is_word)() {
            pattern.push_str(&(ctx.advance)().value);
        } else if (ctx.check)(TokenType::Pipe) {
            pattern.push('|');
            (ctx.advance)();
        } else {
            break;
        }
    }
    pattern.push(')');

    (ctx.parse_word_from_string)(&pattern, false, false, false, false, true)
}

/// Entry point: skip leading newlines (bash allows `[[` to be immediately
/// followed by one) and parse the `||`-precedence top of the grammar.
pub fn parse_conditional_expression(ctx: &CondParserContext) -> ConditionalExpressionNode {
    (ctx.skip_newlines)();
    parse_cond_or(ctx)
}

fn parse_cond_or(ctx: &CondParserContext) -> ConditionalExpressionNode {
    let mut left = parse_cond_and(ctx);
    (ctx.skip_newlines)();
    while (ctx.check)(TokenType::OrOr) {
        (ctx.advance)();
        (ctx.skip_newlines)();
        let right = parse_cond_and(ctx);
        left = ConditionalExpressionNode::Or(Box::new(CondOrNode { left, right }));
        (ctx.skip_newlines)();
    }
    left
}

fn parse_cond_and(ctx: &CondParserContext) -> ConditionalExpressionNode {
    let mut left = parse_cond_not(ctx);
    (ctx.skip_newlines)();
    while (ctx.check)(TokenType::AndAnd) {
        (ctx.advance)();
        (ctx.skip_newlines)();
        let right = parse_cond_not(ctx);
        left = ConditionalExpressionNode::And(Box::new(CondAndNode { left, right }));
        (ctx.skip_newlines)();
    }
    left
}

fn parse_cond_not(ctx: &CondParserContext) -> ConditionalExpressionNode {
    (ctx.skip_newlines)();
    if (ctx.check)(TokenType::Bang) {
        (ctx.advance)();
        (ctx.skip_newlines)();
        let operand = parse_cond_not(ctx);
        return ConditionalExpressionNode::Not(Box::new(CondNotNode { operand }));
    }
    parse_cond_primary(ctx)
}

fn unary_operator_for(op: &str) -> Option<CondUnaryOperator> {
    Some(match op {
        "-a" => CondUnaryOperator::A,
        "-b" => CondUnaryOperator::B,
        "-c" => CondUnaryOperator::C,
        "-d" => CondUnaryOperator::D,
        "-e" => CondUnaryOperator::E,
        "-f" => CondUnaryOperator::F,
        "-g" => CondUnaryOperator::G,
        "-h" => CondUnaryOperator::H,
        "-k" => CondUnaryOperator::K,
        "-p" => CondUnaryOperator::P,
        "-r" => CondUnaryOperator::R,
        "-s" => CondUnaryOperator::S,
        "-t" => CondUnaryOperator::T,
        "-u" => CondUnaryOperator::U,
        "-w" => CondUnaryOperator::W,
        "-x" => CondUnaryOperator::X,
        "-G" => CondUnaryOperator::UpperG,
        "-L" => CondUnaryOperator::L,
        "-N" => CondUnaryOperator::N,
        "-O" => CondUnaryOperator::UpperO,
        "-S" => CondUnaryOperator::UpperS,
        "-z" => CondUnaryOperator::Z,
        "-n" => CondUnaryOperator::LowerN,
        "-o" => CondUnaryOperator::LowerO,
        "-v" => CondUnaryOperator::V,
        "-R" => CondUnaryOperator::UpperR,
        _ => return None,
    })
}

fn binary_operator_for(op: &str) -> Option<CondBinaryOperator> {
    Some(match op {
        "==" => CondBinaryOperator::EqEq,
        "!=" => CondBinaryOperator::Ne,
        "=~" => CondBinaryOperator::Match,
        "<" => CondBinaryOperator::Lt,
        ">" => CondBinaryOperator::Gt,
        "-eq" => CondBinaryOperator::NumEq,
        "-ne" => CondBinaryOperator::NumNe,
        "-lt" => CondBinaryOperator::NumLt,
        "-le" => CondBinaryOperator::NumLe,
        "-gt" => CondBinaryOperator::NumGt,
        "-ge" => CondBinaryOperator::NumGe,
        "-nt" => CondBinaryOperator::Nt,
        "-ot" => CondBinaryOperator::Ot,
        "-ef" => CondBinaryOperator::Ef,
        _ => return None,
    })
}

/// Try to parse a unary test (`-f file`, `-z string`, ...) at the current
/// position. `first` is the already-peeked token text. Returns `None` if
/// `first` isn't a recognized unary operator or is quoted (a quoted `-f`
/// is a string operand, not an operator).
fn try_parse_unary(ctx: &CondParserContext, first_token: &CondToken) -> Option<ConditionalExpressionNode> {
    if first_token.quoted || !UNARY_OPS.contains(&first_token.value.as_str()) {
        return None;
    }
    (ctx.advance)();

    if (ctx.check)(TokenType::DBrackEnd) {
        (ctx.error)(&format!("Expected operand after {}", first_token.value));
        unreachable!();
    }
    if !is_cond_operand(ctx) {
        let bad = (ctx.current)();
        (ctx.error)(&format!("unexpected argument `{}' to conditional unary operator", bad.value));
        unreachable!();
    }

    let operand = (ctx.parse_word_no_brace_expansion)();
    let operator = unary_operator_for(&first_token.value).unwrap_or_else(|| {
        (ctx.error)(&format!("Unknown unary operator: {}", first_token.value));
        unreachable!();
    });
    Some(ConditionalExpressionNode::Unary(CondUnaryNode { operator, operand }))
}

/// Parse the RHS and operator of a binary test once `left` has already
/// been consumed as a word, covering the named binary operators, the
/// token-level `<`/`>`, and bare `=` (treated as `==`).
fn try_parse_binary(ctx: &CondParserContext, left: WordNode) -> ConditionalExpressionNode {
    if (ctx.is_word)() && BINARY_OPS.contains(&(ctx.current)().value.as_str()) {
        let operator_str = (ctx.advance)().value;
        let right = match operator_str.as_str() {
            "=~" => parse_regex_pattern(ctx),
            "==" | "!=" => parse_pattern_word(ctx),
            _ => (ctx.parse_word_no_brace_expansion)(),
        };
        let operator = binary_operator_for(&operator_str).unwrap_or_else(|| {
            (ctx.error)(&format!("Unknown binary operator: {}", operator_str));
            unreachable!();
        });
        return ConditionalExpressionNode::Binary(CondBinaryNode { operator, left, right });
    }

    if (ctx.check)(TokenType::Less) {
        (ctx.advance)();
        let right = (ctx.parse_word_no_brace_expansion)();
        return ConditionalExpressionNode::Binary(CondBinaryNode { operator: CondBinaryOperator::Lt, left, right });
    }
    if (ctx.check)(TokenType::Great) {
        (ctx.advance)();
        let right = (ctx.parse_word_no_brace_expansion)();
        return ConditionalExpressionNode::Binary(CondBinaryNode { operator: CondBinaryOperator::Gt, left, right });
    }
    if (ctx.is_word)() && (ctx.current)().value == "=" {
        (ctx.advance)();
        let right = parse_pattern_word(ctx);
        return ConditionalExpressionNode::Binary(CondBinaryNode { operator: CondBinaryOperator::EqEq, left, right });
    }

    ConditionalExpressionNode::Word(CondWordNode { word: left })
}

fn parse_cond_primary(ctx: &CondParserContext) -> ConditionalExpressionNode {
    if (ctx.check)(TokenType::LParen) {
        (ctx.advance)();
        let expression = parse_conditional_expression(ctx);
        (ctx.expect)(TokenType::RParen);
        return ConditionalExpressionNode::Group(Box::new(CondGroupNode { expression }));
    }

    if !is_cond_operand(ctx) {
        (ctx.error)("Expected conditional expression");
        unreachable!();
    }

    let first_token = (ctx.current)();
    if let Some(unary) = try_parse_unary(ctx, &first_token) {
        return unary;
    }

    let left = (ctx.parse_word_no_brace_expansion)();
    try_parse_binary(ctx, left)
}

/// Literal text to splice into a regex pattern for redirection-shaped
/// tokens that lose their operator meaning once they appear inside the
/// parenthesized part of a `=~` RHS (e.g. `(a<b)` is a literal `<`, not a
/// redirection). Only consulted once `paren_depth > 0`.
const PAREN_LITERAL_TOKENS: &[(TokenType, &str)] = &[
    (TokenType::Less, "<"),
    (TokenType::Great, ">"),
    (TokenType::DGreat, ">>"),
    (TokenType::DLess, "<<"),
    (TokenType::LessAnd, "<&"),
    (TokenType::GreatAnd, ">&"),
    (TokenType::LessGreat, "<>"),
    (TokenType::Clobber, ">|"),
    (TokenType::TLess, "<<<"),
    (TokenType::Amp, "&"),
    (TokenType::LBrace, "{"),
    (TokenType::RBrace, "}"),
];

/// Parse the RHS of `=~`. Bash lets this operand include unquoted `(` and
/// `)` for regex grouping, so it can't be read as an ordinary word: tokens
/// are collected one at a time, tracking paren depth to tell a regex group
/// apart from the `]]` closer.
///
/// - at depth 0, tokens must be adjacent (no whitespace) — `[[ a =~ b c ]]`
///   is a syntax error, matching bash;
/// - inside a group (depth > 0), whitespace is preserved literally and
///   several operator-shaped tokens (see [`PAREN_LITERAL_TOKENS`]) fold
///   back into their literal characters since they've lost their special
///   meaning there;
/// - `((`/`))` are lexed as single tokens but represent two regex parens
///   each, so they adjust depth by 2.
fn parse_regex_pattern(ctx: &CondParserContext) -> WordNode {
    let mut parts: Vec<WordPart> = Vec::new();
    let mut paren_depth = 0;
    let mut last_token_end: isize = -1;
    let input = (ctx.get_input)();

    let is_terminator = || {
        (ctx.check)(TokenType::DBrackEnd)
            || (ctx.check)(TokenType::AndAnd)
            || (ctx.check)(TokenType::OrOr)
            || (ctx.check)(TokenType::Newline)
            || (ctx.check)(TokenType::Eof)
    };

    let push_literal = |parts: &mut Vec<WordPart>, text: &str| {
        parts.push(WordPart::Literal(LiteralPart { value: text.to_string() }));
    };

    while !is_terminator() {
        let current_token = (ctx.current)();
        let has_gap = last_token_end >= 0 && (current_token.start as isize) > last_token_end;

        if paren_depth == 0 && has_gap {
            break;
        }
        if paren_depth > 0 && has_gap {
            let whitespace = &input[last_token_end as usize..current_token.start];
            push_literal(&mut parts, whitespace);
        }

        if (ctx.is_word)() || (ctx.check)(TokenType::AssignmentWord) {
            let word = (ctx.parse_word_for_regex)();
            parts.extend(word.parts);
            last_token_end = (ctx.peek)(-1).end as isize;
        } else if (ctx.check)(TokenType::LParen) {
            let token = (ctx.advance)();
            push_literal(&mut parts, "(");
            paren_depth += 1;
            last_token_end = token.end as isize;
        } else if (ctx.check)(TokenType::DParenStart) {
            let token = (ctx.advance)();
            push_literal(&mut parts, "((");
            paren_depth += 2;
            last_token_end = token.end as isize;
        } else if (ctx.check)(TokenType::DParenEnd) {
            if paren_depth >= 2 {
                let token = (ctx.advance)();
                push_literal(&mut parts, "))");
                paren_depth -= 2;
                last_token_end = token.end as isize;
            } else {
                // Either one regex paren is open (this `))` closes it and
                // leaves the outer `)` for the `[[ ]]` grammar) or none
                // are (it's entirely the conditional's own closer) —
                // either way, stop here and let the caller see it.
                break;
            }
        } else if (ctx.check)(TokenType::RParen) {
            if paren_depth > 0 {
                let token = (ctx.advance)();
                push_literal(&mut parts, ")");
                paren_depth -= 1;
                last_token_end = token.end as isize;
            } else {
                break;
            }
        } else if (ctx.check)(TokenType::Pipe) {
            let token = (ctx.advance)();
            push_literal(&mut parts, "|");
            last_token_end = token.end as isize;
        } else if (ctx.check)(TokenType::Semicolon) {
            if paren_depth > 0 {
                let token = (ctx.advance)();
                push_literal(&mut parts, ";");
                last_token_end = token.end as isize;
            } else {
                break;
            }
        } else if paren_depth > 0 {
            let literal_match = PAREN_LITERAL_TOKENS.iter().find(|(tt, _)| (ctx.check)(*tt));
            match literal_match {
                Some(&(_, text)) => {
                    let token = (ctx.advance)();
                    push_literal(&mut parts, text);
                    last_token_end = token.end as isize;
                }
                None => break,
            }
        } else {
            break;
        }
    }

    if parts.is_empty() {
        (ctx.error)("Expected regex pattern after =~");
        unreachable!();
    }

    WordNode { parts }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unary_ops_table_contains_expected_entries() {
        assert!(UNARY_OPS.contains(&"-f"));
        assert!(UNARY_OPS.contains(&"-z"));
        assert!(UNARY_OPS.contains(&"-n"));
        assert!(!UNARY_OPS.contains(&"-eq"));
    }

    #[test]
    fn binary_ops_table_contains_expected_entries() {
        assert!(BINARY_OPS.contains(&"=="));
        assert!(BINARY_OPS.contains(&"!="));
        assert!(BINARY_OPS.contains(&"-eq"));
        assert!(BINARY_OPS.contains(&"=~"));
    }

    #[test]
    fn unary_and_binary_operator_lookups_round_trip() {
        assert_eq!(unary_operator_for("-z"), Some(CondUnaryOperator::Z));
        assert_eq!(unary_operator_for("-q"), None);
        assert_eq!(binary_operator_for("-eq"), Some(CondBinaryOperator::NumEq));
        assert_eq!(binary_operator_for("??"), None);
    }
}
