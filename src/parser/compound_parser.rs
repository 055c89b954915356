//! Parsing for compound commands: `if`/`while`/`until`/`for` (both the
//! regular and C-style forms)/`case`/subshells/brace groups. Like
//! [`crate::parser::command_parser`], this is driven through a context
//! struct of closures ([`CompoundParserContext`]) rather than holding the
//! parser's token cursor directly.

use crate::ast::types::{
    ArithmeticExpressionNode, CaseItemNode, CaseNode, CaseTerminator, CStyleForNode, ForNode,
    GroupNode, IfClause, IfNode, RedirectionNode, StatementNode, SubshellNode, UntilNode,
    WhileNode, WordNode, AST,
};
use crate::parser::arithmetic_parser::parse_arithmetic_expression;
use crate::parser::lexer::TokenType;

/// A lexed token as seen by the compound-command parsing helpers.
#[derive(Debug, Clone)]
pub struct CompoundToken {
    pub token_type: TokenType,
    pub value: String,
    pub line: usize,
}

/// Closures back into the owning `Parser`, mirroring
/// [`crate::parser::command_parser::CommandParserContext`] but scoped to
/// what compound-command parsing needs (statement lists, iteration-limit
/// checks, position tracking for case-item loop safety).
pub struct CompoundParserContext<'a> {
    pub check: &'a dyn Fn(TokenType) -> bool,
    pub check_multi: &'a dyn Fn(&[TokenType]) -> bool,
    pub advance: &'a dyn Fn() -> CompoundToken,
    pub expect: &'a dyn Fn(TokenType) -> CompoundToken,
    pub is_word: &'a dyn Fn() -> bool,
    pub peek: &'a dyn Fn(isize) -> CompoundToken,
    pub skip_newlines: &'a dyn Fn(),
    pub skip_separators: &'a dyn Fn(bool),
    pub parse_compound_list: &'a dyn Fn() -> Vec<StatementNode>,
    pub parse_word: &'a dyn Fn() -> WordNode,
    pub parse_statement: &'a dyn Fn() -> Option<StatementNode>,
    pub parse_optional_redirections: &'a dyn Fn() -> Vec<RedirectionNode>,
    pub get_pos: &'a dyn Fn() -> usize,
    pub check_iteration_limit: &'a dyn Fn(),
    pub error: &'a dyn Fn(&str),
}

/// Tweaks shared by every `parse_*` entry point in this module.
#[derive(Default)]
pub struct ParseOptions {
    /// Function bodies parse their own trailing redirections at the
    /// function-definition level, so the inner compound command should
    /// skip collecting them itself.
    pub skip_redirections: bool,
}

fn trailing_redirections(ctx: &CompoundParserContext, options: &ParseOptions) -> Vec<RedirectionNode> {
    if options.skip_redirections {
        Vec::new()
    } else {
        (ctx.parse_optional_redirections)()
    }
}

/// Pick the keyword name to report in a "syntax error near unexpected
/// token" message when a clause body turns out empty — whichever of
/// `fi`/`else`/`elif` is actually next, defaulting to `fi`.
fn next_if_keyword_name(ctx: &CompoundParserContext) -> &'static str {
    if (ctx.check)(TokenType::Else) {
        "else"
    } else if (ctx.check)(TokenType::Elif) {
        "elif"
    } else {
        "fi"
    }
}

/// Parse `if cond; then body; [elif cond; then body;]... [else body;] fi`.
/// Bash treats an empty clause body (no statements between `then`/`elif`/
/// `else` and the next keyword) as a syntax error, which this enforces for
/// every clause including `elif`/`else`.
pub fn parse_if(ctx: &CompoundParserContext, options: &ParseOptions) -> IfNode {
    (ctx.expect)(TokenType::If);
    let mut clauses: Vec<IfClause> = Vec::new();

    let condition = (ctx.parse_compound_list)();
    (ctx.expect)(TokenType::Then);
    let body = (ctx.parse_compound_list)();
    if body.is_empty() {
        let near = next_if_keyword_name(ctx);
        (ctx.error)(&format!("syntax error near unexpected token `{}'", near));
        unreachable!();
    }
    clauses.push(IfClause { condition, body });

    while (ctx.check)(TokenType::Elif) {
        (ctx.advance)();
        let elif_condition = (ctx.parse_compound_list)();
        (ctx.expect)(TokenType::Then);
        let elif_body = (ctx.parse_compound_list)();
        if elif_body.is_empty() {
            let near = next_if_keyword_name(ctx);
            (ctx.error)(&format!("syntax error near unexpected token `{}'", near));
            unreachable!();
        }
        clauses.push(IfClause { condition: elif_condition, body: elif_body });
    }

    let mut else_body: Option<Vec<StatementNode>> = None;
    if (ctx.check)(TokenType::Else) {
        (ctx.advance)();
        let body = (ctx.parse_compound_list)();
        if body.is_empty() {
            (ctx.error)("syntax error near unexpected token `fi'");
            unreachable!();
        }
        else_body = Some(body);
    }

    (ctx.expect)(TokenType::Fi);
    AST::if_node(clauses, else_body, trailing_redirections(ctx, options))
}

/// Either shape a `for` loop can take: the regular `for x in ...; do ...;
/// done` or the C-style `for ((init; cond; step)); do ...; done`.
pub enum ForOrCStyleFor {
    Regular(ForNode),
    CStyle(CStyleForNode),
}

/// Parse a `for` loop, dispatching to the C-style parser when the token
/// right after `for` opens an arithmetic `((`.
pub fn parse_for(ctx: &CompoundParserContext, options: &ParseOptions) -> ForOrCStyleFor {
    let for_token = (ctx.expect)(TokenType::For);

    if (ctx.check)(TokenType::DParenStart) {
        return ForOrCStyleFor::CStyle(parse_c_style_for(ctx, options, Some(for_token.line)));
    }

    // The loop variable can be any word token, including names bash itself
    // would reject (e.g. "i.j") — invalid-name validation happens at
    // execution time, to match bash's own deferred error reporting.
    if !(ctx.is_word)() {
        (ctx.error)("Expected variable name in for loop");
        unreachable!();
    }
    let variable = (ctx.advance)().value;

    let mut words: Option<Vec<WordNode>> = None;
    (ctx.skip_newlines)();
    if (ctx.check)(TokenType::In) {
        (ctx.advance)();
        let mut word_list = Vec::new();
        while !(ctx.check_multi)(&[TokenType::Semicolon, TokenType::Newline, TokenType::Do, TokenType::Eof]) {
            if (ctx.is_word)() {
                word_list.push((ctx.parse_word)());
            } else {
                break;
            }
        }
        words = Some(word_list);
    }

    if (ctx.check)(TokenType::Semicolon) {
        (ctx.advance)();
    }
    (ctx.skip_newlines)();

    (ctx.expect)(TokenType::Do);
    let body = (ctx.parse_compound_list)();
    (ctx.expect)(TokenType::Done);

    ForOrCStyleFor::Regular(AST::for_node(variable, words, body, trailing_redirections(ctx, options)))
}

/// Accumulates the raw text of a C-style for-loop's three `;`-separated
/// clauses (init, condition, update) while tracking paren depth so that a
/// `;` nested inside e.g. a command substitution doesn't split a clause
/// early.
struct ClauseAccumulator {
    parts: [String; 3],
    index: usize,
    paren_depth: i32,
}

impl ClauseAccumulator {
    fn new() -> Self {
        Self { parts: [String::new(), String::new(), String::new()], index: 0, paren_depth: 0 }
    }

    /// Feed one token. Returns `true` once a fourth `;`-separated clause
    /// has been opened, signaling the caller to stop (malformed input, but
    /// bash's own grammar doesn't bound clause count at the lexer level
    /// either — this mirrors the original scanner's bail-out).
    fn feed(&mut self, token_type: TokenType, text: &str) -> bool {
        if token_type == TokenType::Semicolon && self.paren_depth == 0 {
            self.index += 1;
            return self.index > 2;
        }
        if text == "(" {
            self.paren_depth += 1;
        }
        if text == ")" {
            self.paren_depth -= 1;
        }
        self.parts[self.index].push_str(text);
        false
    }

    fn parse_clause(text: &str) -> Option<ArithmeticExpressionNode> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(parse_arithmetic_expression(trimmed))
        }
    }
}

/// Parse the `(( init; cond; step ))` header and `do...done`/`{...}` body
/// of a C-style for loop. The header is read as raw token text rather than
/// through the statement grammar, since its three clauses are arithmetic
/// expressions parsed independently afterward.
fn parse_c_style_for(
    ctx: &CompoundParserContext,
    options: &ParseOptions,
    start_line: Option<usize>,
) -> CStyleForNode {
    (ctx.expect)(TokenType::DParenStart);

    let mut acc = ClauseAccumulator::new();
    while !(ctx.check_multi)(&[TokenType::DParenEnd, TokenType::Eof]) {
        let token = (ctx.advance)();
        if acc.feed(token.token_type, &token.value) {
            break;
        }
    }
    (ctx.expect)(TokenType::DParenEnd);

    let init = ClauseAccumulator::parse_clause(&acc.parts[0]);
    let condition = ClauseAccumulator::parse_clause(&acc.parts[1]);
    let update = ClauseAccumulator::parse_clause(&acc.parts[2]);

    (ctx.skip_newlines)();
    if (ctx.check)(TokenType::Semicolon) {
        (ctx.advance)();
    }
    (ctx.skip_newlines)();

    // Bash accepts either `do...done` or `{ ... }` as the loop body here.
    let body = if (ctx.check)(TokenType::LBrace) {
        (ctx.advance)();
        let body = (ctx.parse_compound_list)();
        (ctx.expect)(TokenType::RBrace);
        body
    } else {
        (ctx.expect)(TokenType::Do);
        let body = (ctx.parse_compound_list)();
        (ctx.expect)(TokenType::Done);
        body
    };

    CStyleForNode {
        init,
        condition,
        update,
        body,
        redirections: trailing_redirections(ctx, options),
        line: start_line,
    }
}

/// Parse `while cond; do body; done`. An empty body is a syntax error.
pub fn parse_while(ctx: &CompoundParserContext, options: &ParseOptions) -> WhileNode {
    (ctx.expect)(TokenType::While);
    let condition = (ctx.parse_compound_list)();
    (ctx.expect)(TokenType::Do);
    let body = (ctx.parse_compound_list)();
    if body.is_empty() {
        (ctx.error)("syntax error near unexpected token `done'");
        unreachable!();
    }
    (ctx.expect)(TokenType::Done);
    AST::while_node(condition, body, trailing_redirections(ctx, options))
}

/// Parse `until cond; do body; done`. An empty body is a syntax error.
pub fn parse_until(ctx: &CompoundParserContext, options: &ParseOptions) -> UntilNode {
    (ctx.expect)(TokenType::Until);
    let condition = (ctx.parse_compound_list)();
    (ctx.expect)(TokenType::Do);
    let body = (ctx.parse_compound_list)();
    if body.is_empty() {
        (ctx.error)("syntax error near unexpected token `done'");
        unreachable!();
    }
    (ctx.expect)(TokenType::Done);
    AST::until_node(condition, body, trailing_redirections(ctx, options))
}

/// Parse `case word in pattern) body;; ... esac`.
pub fn parse_case(ctx: &CompoundParserContext, options: &ParseOptions) -> CaseNode {
    (ctx.expect)(TokenType::Case);
    if !(ctx.is_word)() {
        (ctx.error)("Expected word after 'case'");
        unreachable!();
    }
    let word = (ctx.parse_word)();

    (ctx.skip_newlines)();
    (ctx.expect)(TokenType::In);
    (ctx.skip_newlines)();

    let mut items: Vec<CaseItemNode> = Vec::new();
    while !(ctx.check_multi)(&[TokenType::Esac, TokenType::Eof]) {
        (ctx.check_iteration_limit)();
        let pos_before = (ctx.get_pos)();

        if let Some(item) = parse_case_item(ctx) {
            items.push(item);
        }
        (ctx.skip_newlines)();

        if (ctx.get_pos)() == pos_before {
            break;
        }
    }
    (ctx.expect)(TokenType::Esac);

    AST::case_node(word, items, trailing_redirections(ctx, options))
}

/// Parse one `pattern1 | pattern2) body ;;` item. Returns `None` once the
/// pattern list comes up empty, which the caller treats as "no more items,
/// stop looping" rather than an error (covers trailing whitespace/comments
/// before `esac`).
fn parse_case_item(ctx: &CompoundParserContext) -> Option<CaseItemNode> {
    if (ctx.check)(TokenType::LParen) {
        (ctx.advance)();
    }

    let mut patterns: Vec<WordNode> = Vec::new();
    while (ctx.is_word)() {
        patterns.push((ctx.parse_word)());
        if (ctx.check)(TokenType::Pipe) {
            (ctx.advance)();
        } else {
            break;
        }
    }
    if patterns.is_empty() {
        return None;
    }

    (ctx.expect)(TokenType::RParen);
    (ctx.skip_newlines)();

    let mut body: Vec<StatementNode> = Vec::new();
    while !(ctx.check_multi)(&[TokenType::DSemi, TokenType::SemiAnd, TokenType::SemiSemiAnd, TokenType::Esac, TokenType::Eof]) {
        (ctx.check_iteration_limit)();

        // `a) b) echo A ;;` — a second pattern arriving without the first
        // item ever getting a terminator is a syntax error in bash.
        if (ctx.is_word)() && (ctx.peek)(1).token_type == TokenType::RParen {
            (ctx.error)("syntax error near unexpected token `)'");
            unreachable!();
        }
        if (ctx.check)(TokenType::LParen) && (ctx.peek)(1).token_type == TokenType::Word {
            let next_val = (ctx.peek)(1).value.clone();
            (ctx.error)(&format!("syntax error near unexpected token `{}'", next_val));
            unreachable!();
        }

        let pos_before = (ctx.get_pos)();
        if let Some(stmt) = (ctx.parse_statement)() {
            body.push(stmt);
        }
        // Terminators (;;, ;&, ;;&) are meaningful here and must not be
        // swallowed by the generic separator skip.
        (ctx.skip_separators)(false);

        if (ctx.get_pos)() == pos_before {
            break;
        }
    }

    let terminator = if (ctx.check)(TokenType::DSemi) {
        (ctx.advance)();
        CaseTerminator::DoubleSemi
    } else if (ctx.check)(TokenType::SemiAnd) {
        (ctx.advance)();
        CaseTerminator::SemiAnd
    } else if (ctx.check)(TokenType::SemiSemiAnd) {
        (ctx.advance)();
        CaseTerminator::SemiSemiAnd
    } else {
        CaseTerminator::DoubleSemi
    };

    Some(AST::case_item(patterns, body, terminator))
}

/// Parse `( body )` — a subshell.
pub fn parse_subshell(ctx: &CompoundParserContext, options: &ParseOptions) -> SubshellNode {
    (ctx.expect)(TokenType::LParen);
    let body = (ctx.parse_compound_list)();
    (ctx.expect)(TokenType::RParen);
    AST::subshell(body, trailing_redirections(ctx, options))
}

/// Parse `{ body }` — a brace group (runs in the current shell, unlike a subshell).
pub fn parse_group(ctx: &CompoundParserContext, options: &ParseOptions) -> GroupNode {
    (ctx.expect)(TokenType::LBrace);
    let body = (ctx.parse_compound_list)();
    (ctx.expect)(TokenType::RBrace);
    AST::group(body, trailing_redirections(ctx, options))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parse_options_keep_redirections() {
        let options = ParseOptions::default();
        assert!(!options.skip_redirections);
    }
}
