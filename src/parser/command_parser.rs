//! Parsing for simple commands: the assignment/redirection prefix, the
//! command name and its arguments, and the variable-assignment grammar
//! (`VAR=value`, `VAR+=value`, `VAR[sub]=value`, and array literals).
//!
//! This module doesn't own a token stream of its own. It's driven through
//! [`CommandParserContext`], a bundle of closures back into the main
//! [`crate::parser::parser::Parser`] — that keeps the simple-command grammar
//! testable and reviewable in isolation without duplicating the parser's
//! token-cursor state.

use crate::ast::types::{
    AssignmentNode, HereDocNode, RedirectionNode, RedirectionOperator, RedirectionTarget,
    SimpleCommandNode, WordNode, AST,
};
use crate::parser::lexer::TokenType;
use crate::parser::types::{
    is_invalid_array_token, is_redirection_after_fd_variable, is_redirection_after_number,
    is_redirection_token,
};
use crate::parser::word_parser;

/// A lexed token as seen by the command-parsing helpers, carrying the span
/// and quoting metadata needed to reconstruct assignment/word text.
#[derive(Debug, Clone)]
pub struct CommandToken {
    pub token_type: TokenType,
    pub value: String,
    pub quoted: bool,
    pub single_quoted: bool,
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

/// Closures back into the owning `Parser`'s token cursor and word-parsing
/// logic, so the functions in this module can drive parsing without holding
/// a mutable reference to the parser itself.
pub struct CommandParserContext<'a> {
    pub current: &'a dyn Fn() -> CommandToken,
    pub peek: &'a dyn Fn(isize) -> CommandToken,
    pub advance: &'a dyn Fn() -> CommandToken,
    pub expect: &'a dyn Fn(TokenType) -> CommandToken,
    pub check: &'a dyn Fn(TokenType) -> bool,
    pub check_multi: &'a dyn Fn(&[TokenType]) -> bool,
    pub is_word: &'a dyn Fn() -> bool,
    pub is_statement_end: &'a dyn Fn() -> bool,
    pub skip_newlines: &'a dyn Fn(),
    pub parse_word: &'a dyn Fn() -> WordNode,
    pub parse_word_from_string: &'a dyn Fn(&str, bool, bool, bool) -> WordNode,
    pub add_pending_heredoc:
        &'a dyn Fn(&RedirectionNode, &str, bool, bool),
    pub check_iteration_limit: &'a dyn Fn(),
    pub error: &'a dyn Fn(&str),
}

/// Whether the current token begins a redirection. Bare numbers and
/// `{fdvar}` tokens only count when immediately adjacent to a redirection
/// operator (`2>file` is fd redirection, `2 > file` is `2` as a word
/// followed by a plain `>`).
pub fn is_redirection(ctx: &CommandParserContext) -> bool {
    let token = (ctx.current)();

    if token.token_type == TokenType::Number {
        let next = (ctx.peek)(1);
        return token.end == next.start && is_redirection_after_number(next.token_type);
    }

    if token.token_type == TokenType::FdVariable {
        let next = (ctx.peek)(1);
        return is_redirection_after_fd_variable(next.token_type);
    }

    is_redirection_token(token.token_type)
}

/// Parse one redirection: an optional fd number or `{fdvar}` prefix, the
/// operator, and the target — a word, or (for `<<`/`<<-`) a here-document
/// delimiter handed off to [`parse_heredoc_start`].
pub fn parse_redirection(ctx: &CommandParserContext) -> RedirectionNode {
    let mut fd: Option<i32> = None;
    let mut fd_variable: Option<String> = None;

    if (ctx.check)(TokenType::Number) {
        fd = Some((ctx.advance)().value.parse().unwrap_or(0));
    } else if (ctx.check)(TokenType::FdVariable) {
        fd_variable = Some((ctx.advance)().value);
    }

    let op_token = (ctx.advance)();
    let operator = word_parser::token_to_redirect_op(op_token.token_type);

    let is_heredoc = op_token.token_type == TokenType::DLess
        || op_token.token_type == TokenType::DLessDash;
    if is_heredoc {
        return parse_heredoc_start(ctx, operator, fd, op_token.token_type == TokenType::DLessDash);
    }

    if !(ctx.is_word)() {
        (ctx.error)("Expected redirection target");
        unreachable!();
    }

    AST::redirection(operator, RedirectionTarget::Word((ctx.parse_word)()), fd, fd_variable)
}

/// Strip a single layer of matching quotes from a here-doc delimiter token,
/// e.g. `'EOF'` or `"EOF"` both become `EOF`. An unquoted delimiter (or one
/// using only partial quoting, like `EO'F'`) is left as-is — partial
/// quoting is handled separately by the caller via the `quoted` flag, not
/// by stripping here.
fn strip_heredoc_delimiter_quotes(raw: &str) -> String {
    let is_wrapped = |q: char| raw.starts_with(q) && raw.ends_with(q) && raw.len() >= 2;
    if is_wrapped('\'') || is_wrapped('"') {
        raw[1..raw.len() - 1].to_string()
    } else {
        raw.to_string()
    }
}

/// Parse a here-document delimiter and register the pending body with the
/// owning parser via `add_pending_heredoc` — the body text itself is
/// collected later, once the rest of the current line has been consumed.
fn parse_heredoc_start(
    ctx: &CommandParserContext,
    _operator: RedirectionOperator,
    fd: Option<i32>,
    strip_tabs: bool,
) -> RedirectionNode {
    if !(ctx.is_word)() {
        (ctx.error)("Expected here-document delimiter");
        unreachable!();
    }

    let delim_token = (ctx.advance)();
    let delimiter = strip_heredoc_delimiter_quotes(&delim_token.value);
    let quoted = delim_token.quoted;

    let heredoc_op = if strip_tabs { RedirectionOperator::DLessDash } else { RedirectionOperator::DLess };
    let redirect = AST::redirection(
        heredoc_op,
        RedirectionTarget::HereDoc(HereDocNode {
            delimiter: delimiter.clone(),
            content: AST::word(vec![]),
            strip_tabs,
            quoted,
        }),
        fd,
        None,
    );

    (ctx.add_pending_heredoc)(&redirect, &delimiter, strip_tabs, quoted);
    redirect
}

/// Parse one simple command: leading assignment/redirection prefix
/// (interleavable, e.g. `FOO=foo >file BAR=bar cmd`), the command name, and
/// its trailing arguments and redirections. Several token types that are
/// normally structural (`}`, `{`, `]]`) are accepted as plain argument text
/// here because bash allows them in command position once they've lost
/// their special meaning (e.g. `echo }`).
pub fn parse_simple_command(ctx: &CommandParserContext) -> SimpleCommandNode {
    let start_line = (ctx.current)().line;

    let mut assignments: Vec<AssignmentNode> = Vec::new();
    let mut name: Option<WordNode> = None;
    let mut args: Vec<WordNode> = Vec::new();
    let mut redirections: Vec<RedirectionNode> = Vec::new();

    while (ctx.check)(TokenType::AssignmentWord) || is_redirection(ctx) {
        (ctx.check_iteration_limit)();
        if (ctx.check)(TokenType::AssignmentWord) {
            assignments.push(parse_assignment(ctx));
        } else {
            redirections.push(parse_redirection(ctx));
        }
    }

    if (ctx.is_word)() {
        name = Some((ctx.parse_word)());
    } else if !assignments.is_empty()
        && ((ctx.check)(TokenType::DBrackStart) || (ctx.check)(TokenType::DParenStart))
    {
        // A prefix assignment (FOO=bar [[ ... ]]) demotes `[[`/`((` from a
        // compound-command keyword to a plain command name.
        let token = (ctx.advance)();
        name = Some(AST::word(vec![AST::literal(&token.value)]));
    }

    while (!(ctx.is_statement_end)() || (ctx.check)(TokenType::RBrace))
        && !(ctx.check_multi)(&[TokenType::Pipe, TokenType::PipeAmp])
    {
        (ctx.check_iteration_limit)();

        if is_redirection(ctx) {
            redirections.push(parse_redirection(ctx));
            continue;
        }

        if (ctx.check)(TokenType::RBrace)
            || (ctx.check)(TokenType::LBrace)
            || (ctx.check)(TokenType::DBrackEnd)
        {
            let token = (ctx.advance)();
            args.push((ctx.parse_word_from_string)(&token.value, false, false, false));
        } else if (ctx.is_word)() {
            args.push((ctx.parse_word)());
        } else if (ctx.check)(TokenType::AssignmentWord) {
            args.push(parse_assignment_like_argument(ctx));
        } else if (ctx.check)(TokenType::LParen) {
            (ctx.error)("syntax error near unexpected token `('");
            unreachable!();
        } else {
            break;
        }
    }

    let mut node = AST::simple_command(name, args, assignments, redirections);
    node.line = Some(start_line);
    node
}

/// `VAR=value` tokens appearing after the command name aren't treated as
/// prefix assignments — they're plain arguments, as needed for builtins
/// like `local`/`export`/`declare` that take `name=value` operands. A
/// trailing `=(` or `= (` still gets the array-literal treatment so that
/// e.g. `declare -a arr=(1 2 3)` reconstructs its argument text correctly.
fn parse_assignment_like_argument(ctx: &CommandParserContext) -> WordNode {
    let token = (ctx.advance)();
    let raw = token.value.clone();

    let ends_with_eq = raw.ends_with('=');
    let ends_with_eq_paren = raw.ends_with("=(");

    if (ends_with_eq || ends_with_eq_paren) && (ends_with_eq_paren || (ctx.check)(TokenType::LParen)) {
        let base_name = if ends_with_eq_paren { &raw[..raw.len() - 2] } else { &raw[..raw.len() - 1] };
        if !ends_with_eq_paren {
            (ctx.expect)(TokenType::LParen);
        }
        let elements = parse_array_elements(ctx);
        (ctx.expect)(TokenType::RParen);

        let joined = elements.iter().map(word_parser::word_to_string).collect::<Vec<_>>().join(" ");
        let array_text = format!("{}=({})", base_name, joined);
        return (ctx.parse_word_from_string)(&array_text, false, false, false);
    }

    (ctx.parse_word_from_string)(&raw, token.quoted, token.single_quoted, false)
}

/// Split an `AssignmentWord` token's raw text into name, optional array
/// subscript, and the value text that follows `=`/`+=`, validating as it
/// goes (bash rejects names that don't start with a letter/underscore).
/// Depth-tracked bracket scanning lets the subscript itself contain nested
/// `[...]`, e.g. `a[a[0]]=value`. Scanning is done over a `Vec<char>`
/// throughout (not byte offsets into the original `&str`) so a
/// non-ASCII subscript or value doesn't panic on a mid-character split.
struct AssignmentHead {
    name: String,
    subscript: Option<String>,
    value_text: String,
    append: bool,
}

fn scan_assignment_head(ctx: &CommandParserContext, raw: &str) -> AssignmentHead {
    let chars: Vec<char> = raw.chars().collect();
    let name_end = chars.iter().take_while(|c| c.is_ascii_alphanumeric() || **c == '_').count();
    let starts_valid = chars.first().map_or(false, |c| c.is_ascii_alphabetic() || *c == '_');
    if name_end == 0 || !starts_valid {
        (ctx.error)(&format!("Invalid assignment: {}", raw));
        unreachable!();
    }
    let name: String = chars[..name_end].iter().collect();

    let mut pos = name_end;
    let mut subscript = None;

    if chars.get(pos) == Some(&'[') {
        let subscript_start = pos + 1;
        let mut depth = 0;
        while pos < chars.len() {
            match chars[pos] {
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            pos += 1;
        }
        if depth != 0 {
            (ctx.error)(&format!("Invalid assignment: {}", raw));
            unreachable!();
        }
        subscript = Some(chars[subscript_start..pos].iter().collect());
        pos += 1;
    }

    let append = chars.get(pos) == Some(&'+');
    if append {
        pos += 1;
    }
    if chars.get(pos) != Some(&'=') {
        (ctx.error)(&format!("Invalid assignment: {}", raw));
        unreachable!();
    }
    pos += 1;

    let value_text: String = chars[pos..].iter().collect();
    AssignmentHead { name, subscript, value_text, append }
}

fn assignment_target_name(name: &str, subscript: &Option<String>) -> String {
    match subscript {
        Some(sub) => format!("{}[{}]", name, sub),
        None => name.to_string(),
    }
}

/// Parse `VAR=value`, `VAR+=value`, `VAR[sub]=value`, or an array literal
/// assignment (`VAR=(a b c)`).
fn parse_assignment(ctx: &CommandParserContext) -> AssignmentNode {
    let token = (ctx.expect)(TokenType::AssignmentWord);
    let raw = token.value.clone();
    let head = scan_assignment_head(ctx, &raw);

    if head.value_text == "(" {
        let elements = parse_array_elements(ctx);
        (ctx.expect)(TokenType::RParen);
        return AST::assignment(assignment_target_name(&head.name, &head.subscript), None, head.append, Some(elements));
    }

    // `a=()` with no space before the paren: the assignment word ends at
    // `=` and the `(` arrives as its own token immediately afterward.
    if head.value_text.is_empty() && (ctx.check)(TokenType::LParen) {
        let current = (ctx.current)();
        if token.end == current.start {
            (ctx.advance)();
            let elements = parse_array_elements(ctx);
            (ctx.expect)(TokenType::RParen);
            return AST::assignment(assignment_target_name(&head.name, &head.subscript), None, head.append, Some(elements));
        }
        // A space before `(` is a syntax error the caller's token stream will surface.
    }

    let word_value = if head.value_text.is_empty() {
        None
    } else {
        Some((ctx.parse_word_from_string)(&head.value_text, token.quoted, token.single_quoted, true))
    };

    AST::assignment(assignment_target_name(&head.name, &head.subscript), word_value, head.append, None)
}

/// Parse the comma-free, whitespace-separated element list inside an array
/// literal's parentheses, stopping at the matching `)`.
fn parse_array_elements(ctx: &CommandParserContext) -> Vec<WordNode> {
    let mut elements: Vec<WordNode> = Vec::new();
    (ctx.skip_newlines)();

    while !(ctx.check_multi)(&[TokenType::RParen, TokenType::Eof]) {
        (ctx.check_iteration_limit)();
        if (ctx.is_word)() {
            elements.push((ctx.parse_word)());
        } else if is_invalid_array_token((ctx.current)().token_type) {
            let bad = (ctx.current)();
            (ctx.error)(&format!("syntax error near unexpected token `{}'", bad.value));
            unreachable!();
        } else {
            (ctx.advance)();
        }
        (ctx.skip_newlines)();
    }

    elements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirection_tokens_are_recognized() {
        assert!(is_redirection_token(TokenType::Less));
        assert!(is_redirection_token(TokenType::Great));
        assert!(is_redirection_token(TokenType::DGreat));
        assert!(!is_redirection_token(TokenType::Word));
    }
}
