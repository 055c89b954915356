//! Tokenizer for the shell's input stream.
//!
//! Converts raw source text into a flat `Vec<Token>` that the recursive-descent
//! parser consumes. Beyond simple operator/word splitting, the lexer owns a
//! handful of context-sensitive decisions that can't be deferred to the parser:
//! matching `(( ))` depth so arithmetic commands and C-style `for` headers
//! tokenize differently from nested subshells, recognizing here-document
//! delimiters and slurping their body on the following line(s), and walking
//! past `$(...)`, `${...}`, `` `...` `` and `$'...'` constructs as opaque
//! spans inside a word rather than trying to tokenize their insides here.

use std::collections::HashMap;

/// The kind of lexical token produced by [`Lexer::tokenize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Eof,

    Newline,
    Semicolon,
    Amp, // &

    Pipe,    // |
    PipeAmp, // |&
    AndAnd,  // &&
    OrOr,    // ||
    Bang,    // !

    Less,      // <
    Great,     // >
    DLess,     // <<
    DGreat,    // >>
    LessAnd,   // <&
    GreatAnd,  // >&
    LessGreat, // <>
    DLessDash, // <<-
    Clobber,   // >|
    TLess,     // <<<
    AndGreat,  // &>
    AndDGreat, // &>>

    LParen, // (
    RParen, // )
    LBrace, // {
    RBrace, // }

    DSemi,       // ;;
    SemiAnd,     // ;&
    SemiSemiAnd, // ;;&

    DBrackStart, // [[
    DBrackEnd,   // ]]
    DParenStart, // ((
    DParenEnd,   // ))

    If,
    Then,
    Else,
    Elif,
    Fi,
    For,
    While,
    Until,
    Do,
    Done,
    Case,
    Esac,
    In,
    Function,
    Select,
    Time,
    Coproc,

    Word,
    Name,           // a valid variable name
    Number,         // an all-digit word, e.g. the "2" in "2>&1"
    AssignmentWord, // NAME=value or NAME+=value
    FdVariable,     // {fd} before a redirection operator

    Comment,
    HeredocContent,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eof => "EOF",
            Self::Newline => "NEWLINE",
            Self::Semicolon => ";",
            Self::Amp => "&",
            Self::Pipe => "|",
            Self::PipeAmp => "|&",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
            Self::Bang => "!",
            Self::Less => "<",
            Self::Great => ">",
            Self::DLess => "<<",
            Self::DGreat => ">>",
            Self::LessAnd => "<&",
            Self::GreatAnd => ">&",
            Self::LessGreat => "<>",
            Self::DLessDash => "<<-",
            Self::Clobber => ">|",
            Self::TLess => "<<<",
            Self::AndGreat => "&>",
            Self::AndDGreat => "&>>",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::DSemi => ";;",
            Self::SemiAnd => ";&",
            Self::SemiSemiAnd => ";;&",
            Self::DBrackStart => "[[",
            Self::DBrackEnd => "]]",
            Self::DParenStart => "((",
            Self::DParenEnd => "))",
            Self::If => "if",
            Self::Then => "then",
            Self::Else => "else",
            Self::Elif => "elif",
            Self::Fi => "fi",
            Self::For => "for",
            Self::While => "while",
            Self::Until => "until",
            Self::Do => "do",
            Self::Done => "done",
            Self::Case => "case",
            Self::Esac => "esac",
            Self::In => "in",
            Self::Function => "function",
            Self::Select => "select",
            Self::Time => "time",
            Self::Coproc => "coproc",
            Self::Word => "WORD",
            Self::Name => "NAME",
            Self::Number => "NUMBER",
            Self::AssignmentWord => "ASSIGNMENT_WORD",
            Self::FdVariable => "FD_VARIABLE",
            Self::Comment => "COMMENT",
            Self::HeredocContent => "HEREDOC_CONTENT",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub value: String,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
    /// Set for WORD tokens that were wholly or partly quoted.
    pub quoted: bool,
    pub single_quoted: bool,
}

impl Token {
    pub fn new(
        token_type: TokenType,
        value: impl Into<String>,
        start: usize,
        end: usize,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            token_type,
            value: value.into(),
            start,
            end,
            line,
            column,
            quoted: false,
            single_quoted: false,
        }
    }

    pub fn with_quotes(mut self, quoted: bool, single_quoted: bool) -> Self {
        self.quoted = quoted;
        self.single_quoted = single_quoted;
        self
    }
}

#[derive(Debug, Clone)]
pub struct LexerError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for LexerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for LexerError {}

impl LexerError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self { message: message.into(), line, column }
    }
}

#[derive(Debug, Clone)]
struct PendingHeredoc {
    delimiter: String,
    strip_tabs: bool,
    quoted: bool,
}

lazy_static::lazy_static! {
    static ref RESERVED_WORDS: HashMap<&'static str, TokenType> = {
        let mut m = HashMap::new();
        m.insert("if", TokenType::If);
        m.insert("then", TokenType::Then);
        m.insert("else", TokenType::Else);
        m.insert("elif", TokenType::Elif);
        m.insert("fi", TokenType::Fi);
        m.insert("for", TokenType::For);
        m.insert("while", TokenType::While);
        m.insert("until", TokenType::Until);
        m.insert("do", TokenType::Do);
        m.insert("done", TokenType::Done);
        m.insert("case", TokenType::Case);
        m.insert("esac", TokenType::Esac);
        m.insert("in", TokenType::In);
        m.insert("function", TokenType::Function);
        m.insert("select", TokenType::Select);
        m.insert("time", TokenType::Time);
        m.insert("coproc", TokenType::Coproc);
        m
    };

    static ref SINGLE_CHAR_OPS: HashMap<char, TokenType> = {
        let mut m = HashMap::new();
        m.insert('|', TokenType::Pipe);
        m.insert('&', TokenType::Amp);
        m.insert(';', TokenType::Semicolon);
        m.insert('(', TokenType::LParen);
        m.insert(')', TokenType::RParen);
        m.insert('<', TokenType::Less);
        m.insert('>', TokenType::Great);
        m
    };
}

const THREE_CHAR_OPS: &[(&str, TokenType)] = &[
    (";;&", TokenType::SemiSemiAnd),
    ("<<<", TokenType::TLess),
    ("&>>", TokenType::AndDGreat),
];

const TWO_CHAR_OPS: &[(&str, TokenType)] = &[
    ("[[", TokenType::DBrackStart),
    ("]]", TokenType::DBrackEnd),
    ("((", TokenType::DParenStart),
    ("))", TokenType::DParenEnd),
    ("&&", TokenType::AndAnd),
    ("||", TokenType::OrOr),
    (";;", TokenType::DSemi),
    (";&", TokenType::SemiAnd),
    ("|&", TokenType::PipeAmp),
    (">>", TokenType::DGreat),
    ("<&", TokenType::LessAnd),
    (">&", TokenType::GreatAnd),
    ("<>", TokenType::LessGreat),
    (">|", TokenType::Clobber),
    ("&>", TokenType::AndGreat),
];

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_valid_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => chars.all(is_name_char),
        _ => false,
    }
}

fn is_word_boundary(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | ';' | '&' | '|' | '(' | ')' | '<' | '>')
}

/// Check whether `s` is a valid assignment left-hand side: a name, optionally
/// followed by a `[subscript]`, optionally followed by a trailing `+` (for
/// `NAME+=` / `NAME[sub]+=`).
fn assignment_lhs_is_valid(s: &str) -> bool {
    let name_end = s.chars().take_while(|&c| is_name_char(c)).count();
    if name_end == 0 {
        return false;
    }
    let first = s.chars().next().unwrap();
    if !first.is_ascii_alphabetic() && first != '_' {
        return false;
    }

    let after_name = &s[name_end..];
    if after_name.is_empty() || after_name == "+" {
        return true;
    }

    if let Some(subscript) = after_name.strip_prefix('[') {
        let mut depth = 0;
        let mut consumed = 0;
        for c in subscript.chars() {
            match c {
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            consumed += c.len_utf8();
        }
        if depth != 0 {
            return false;
        }
        let after_bracket = &subscript[consumed + 1..];
        return after_bracket.is_empty() || after_bracket == "+";
    }

    false
}

/// Find the index of the top-level `=` (or the `=` of a `+=`) in `s`,
/// ignoring anything inside `[...]` brackets.
fn find_top_level_assignment_eq(s: &str) -> Option<usize> {
    let mut depth = 0;
    let chars: Vec<char> = s.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '[' => depth += 1,
            ']' => depth -= 1,
            '=' if depth == 0 => return Some(i),
            '+' if depth == 0 && chars.get(i + 1) == Some(&'=') => return Some(i + 1),
            _ => {}
        }
    }
    None
}

pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    pending_heredocs: Vec<PendingHeredoc>,
    /// Depth of nested `((`/`)` while inside an arithmetic command or
    /// C-style `for` header, so `#`/`;;` lex differently there.
    dparen_depth: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            pending_heredocs: Vec::new(),
            dparen_depth: 0,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexerError> {
        let len = self.input.len();

        while self.pos < len {
            let just_saw_newline = !self.pending_heredocs.is_empty()
                && self.tokens.last().map(|t| t.token_type) == Some(TokenType::Newline);
            if just_saw_newline {
                self.read_heredoc_content()?;
                continue;
            }

            self.skip_whitespace();
            if self.pos >= len {
                break;
            }

            if let Some(token) = self.next_token()? {
                self.tokens.push(token);
            }
        }

        self.tokens.push(Token::new(TokenType::Eof, "", self.pos, self.pos, self.line, self.column));
        Ok(self.tokens)
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current() {
            match c {
                ' ' | '\t' => {
                    self.pos += 1;
                    self.column += 1;
                }
                '\\' if self.peek(1) == Some('\n') => {
                    self.pos += 2;
                    self.line += 1;
                    self.column = 1;
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, LexerError> {
        let start_line = self.line;
        let start_column = self.column;
        let start_pos = self.pos;

        let c0 = match self.current() {
            Some(c) => c,
            None => return Ok(None),
        };
        let c1 = self.peek(1);
        let c2 = self.peek(2);

        // `#` starts a comment everywhere except inside `(( ))`, where it's
        // part of `base#digits` numeric literal syntax.
        if c0 == '#' && self.dparen_depth == 0 {
            return Ok(Some(self.read_comment(start_pos, start_line, start_column)));
        }

        if c0 == '\n' {
            self.pos += 1;
            self.line += 1;
            self.column = 1;
            return Ok(Some(Token::new(TokenType::Newline, "\n", start_pos, self.pos, start_line, start_column)));
        }

        if c0 == '<' && c1 == Some('<') && c2 == Some('-') {
            self.pos += 3;
            self.column += 3;
            self.register_heredoc_from_lookahead(true);
            return Ok(Some(Token::new(TokenType::DLessDash, "<<-", start_pos, self.pos, start_line, start_column)));
        }

        for (op_str, token_type) in THREE_CHAR_OPS {
            let mut op_chars = op_str.chars();
            let (a, b, c) = (op_chars.next(), op_chars.next(), op_chars.next());
            if Some(c0) == a && c1 == b && c2 == c {
                self.pos += 3;
                self.column += 3;
                return Ok(Some(Token::new(*token_type, *op_str, start_pos, self.pos, start_line, start_column)));
            }
        }

        if c0 == '<' && c1 == Some('<') {
            self.pos += 2;
            self.column += 2;
            self.register_heredoc_from_lookahead(false);
            return Ok(Some(Token::new(TokenType::DLess, "<<", start_pos, self.pos, start_line, start_column)));
        }

        if let Some(token) = self.try_lex_dparen_boundary(c0, c1, start_pos, start_line, start_column) {
            return Ok(Some(token));
        }

        for (op_str, token_type) in TWO_CHAR_OPS {
            if *op_str == "((" || *op_str == "))" {
                continue; // handled by try_lex_dparen_boundary above
            }
            let mut op_chars = op_str.chars();
            let (a, b) = (op_chars.next(), op_chars.next());
            if Some(c0) != a || c1 != b {
                continue;
            }

            let suppressed_in_dparen = self.dparen_depth > 0
                && c0 == ';'
                && matches!(*token_type, TokenType::DSemi | TokenType::SemiAnd | TokenType::SemiSemiAnd);
            if suppressed_in_dparen {
                continue;
            }

            if matches!(*token_type, TokenType::DBrackStart | TokenType::DBrackEnd) {
                if let Some(after) = self.peek(2) {
                    if !is_word_boundary(after) {
                        continue;
                    }
                }
            }

            self.pos += 2;
            self.column += 2;
            return Ok(Some(Token::new(*token_type, *op_str, start_pos, self.pos, start_line, start_column)));
        }

        if c0 == '(' && self.dparen_depth > 0 {
            self.pos += 1;
            self.column += 1;
            self.dparen_depth += 1;
            return Ok(Some(Token::new(TokenType::LParen, "(", start_pos, self.pos, start_line, start_column)));
        }
        if c0 == ')' && self.dparen_depth > 1 {
            self.pos += 1;
            self.column += 1;
            self.dparen_depth -= 1;
            return Ok(Some(Token::new(TokenType::RParen, ")", start_pos, self.pos, start_line, start_column)));
        }

        if let Some(&token_type) = SINGLE_CHAR_OPS.get(&c0) {
            self.pos += 1;
            self.column += 1;
            return Ok(Some(Token::new(token_type, c0.to_string(), start_pos, self.pos, start_line, start_column)));
        }

        if c0 == '{' {
            if let Some(token) = self.try_lex_brace(c1, start_pos, start_line, start_column)? {
                return Ok(Some(token));
            }
        }

        if c0 == '}' {
            if self.is_word_char_following(self.pos + 1) {
                return self.read_word(start_pos, start_line, start_column);
            }
            self.pos += 1;
            self.column += 1;
            return Ok(Some(Token::new(TokenType::RBrace, "}", start_pos, self.pos, start_line, start_column)));
        }

        if c0 == '!' {
            if c1 == Some('=') {
                self.pos += 2;
                self.column += 2;
                return Ok(Some(Token::new(TokenType::Word, "!=", start_pos, self.pos, start_line, start_column)));
            }
            self.pos += 1;
            self.column += 1;
            return Ok(Some(Token::new(TokenType::Bang, "!", start_pos, self.pos, start_line, start_column)));
        }

        self.read_word(start_pos, start_line, start_column)
    }

    /// Handles the `((`/`)` lexing that depends on `dparen_depth`, including
    /// the subshell-vs-arithmetic disambiguation for a fresh `((`. Returns
    /// `None` when `c0`/`c1` don't form one of these cases, so the caller
    /// falls through to ordinary two/one-char operator lexing.
    fn try_lex_dparen_boundary(
        &mut self,
        c0: char,
        c1: Option<char>,
        start_pos: usize,
        start_line: usize,
        start_column: usize,
    ) -> Option<Token> {
        if c0 == '(' && c1 == Some('(') {
            if self.dparen_depth > 0 {
                self.pos += 1;
                self.column += 1;
                self.dparen_depth += 1;
                return Some(Token::new(TokenType::LParen, "(", start_pos, self.pos, start_line, start_column));
            }
            if self.looks_like_nested_subshells(self.pos + 2) || self.dparen_closes_with_spaced_parens(self.pos + 2) {
                self.pos += 1;
                self.column += 1;
                return Some(Token::new(TokenType::LParen, "(", start_pos, self.pos, start_line, start_column));
            }
            self.pos += 2;
            self.column += 2;
            self.dparen_depth = 1;
            return Some(Token::new(TokenType::DParenStart, "((", start_pos, self.pos, start_line, start_column));
        }

        if c0 == ')' && c1 == Some(')') {
            if self.dparen_depth == 1 {
                self.pos += 2;
                self.column += 2;
                self.dparen_depth = 0;
                return Some(Token::new(TokenType::DParenEnd, "))", start_pos, self.pos, start_line, start_column));
            }
            if self.dparen_depth > 1 {
                self.pos += 1;
                self.column += 1;
                self.dparen_depth -= 1;
                return Some(Token::new(TokenType::RParen, ")", start_pos, self.pos, start_line, start_column));
            }
            self.pos += 1;
            self.column += 1;
            return Some(Token::new(TokenType::RParen, ")", start_pos, self.pos, start_line, start_column));
        }

        None
    }

    /// Handles the four ways a leading `{` can lex: a `{fd}` redirection
    /// target, the literal two-char word `{}`, a brace-expansion word, or a
    /// plain group-start token. Returns `None` (never erroring) only when
    /// none apply and the caller should fall through.
    fn try_lex_brace(
        &mut self,
        c1: Option<char>,
        start_pos: usize,
        start_line: usize,
        start_column: usize,
    ) -> Result<Option<Token>, LexerError> {
        if let Some(fd_var) = self.scan_fd_variable(start_pos) {
            self.pos = fd_var.end;
            self.column = start_column + (fd_var.end - start_pos);
            return Ok(Some(Token::new(TokenType::FdVariable, fd_var.varname, start_pos, self.pos, start_line, start_column)));
        }

        if c1 == Some('}') {
            self.pos += 2;
            self.column += 2;
            return Ok(Some(
                Token::new(TokenType::Word, "{}", start_pos, self.pos, start_line, start_column).with_quotes(false, false),
            ));
        }

        if self.scan_brace_expansion(start_pos).is_some() || self.scan_literal_brace_word(start_pos).is_some() {
            return self.read_word_with_brace_expansion(start_pos, start_line, start_column);
        }

        // A lone `{` only opens a group when followed by whitespace.
        if let Some(next) = c1 {
            if next != ' ' && next != '\t' && next != '\n' {
                return self.read_word(start_pos, start_line, start_column);
            }
        }

        self.pos += 1;
        self.column += 1;
        Ok(Some(Token::new(TokenType::LBrace, "{", start_pos, self.pos, start_line, start_column)))
    }

    fn read_comment(&mut self, start: usize, line: usize, column: usize) -> Token {
        while let Some(c) = self.current() {
            if c == '\n' {
                break;
            }
            self.pos += 1;
            self.column += 1;
        }
        let value: String = self.input[start..self.pos].iter().collect();
        Token::new(TokenType::Comment, value, start, self.pos, line, column)
    }

    /// Heuristic used right after seeing `((` with `dparen_depth == 0`: does
    /// what follows look like `(cmd)` or `((cmd))` nested subshells rather
    /// than an arithmetic expression? Recognizes a command name (or `!`/`[`)
    /// followed eventually by a `)` on the same line, or a closing `)`
    /// chained into `||`/`&&`/`;`/a single `|`.
    fn looks_like_nested_subshells(&self, start_pos: usize) -> bool {
        let mut pos = start_pos;
        while pos < self.input.len() && matches!(self.input.get(pos), Some(' ' | '\t')) {
            pos += 1;
        }
        if pos >= self.input.len() {
            return false;
        }

        let c = self.input[pos];
        if c == '(' {
            return self.looks_like_nested_subshells(pos + 1);
        }

        let is_letter = c.is_ascii_alphabetic() || c == '_';
        let is_special_command = c == '!' || c == '[';
        if !is_letter && !is_special_command {
            return false;
        }

        let mut word_end = pos;
        while word_end < self.input.len() {
            let ch = self.input[word_end];
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || ch == '.' {
                word_end += 1;
            } else {
                break;
            }
        }
        if word_end == pos {
            return is_special_command;
        }

        let mut after_word = word_end;
        while after_word < self.input.len() && matches!(self.input.get(after_word), Some(' ' | '\t')) {
            after_word += 1;
        }
        if after_word >= self.input.len() {
            return false;
        }

        let next_char = self.input[after_word];

        if next_char == '=' && self.input.get(after_word + 1) != Some(&'=') {
            return false;
        }
        if next_char == '\n' {
            return false;
        }
        if word_end == after_word
            && next_char != '-'
            && matches!(next_char, '+' | '*' | '/' | '%' | '<' | '>' | '&' | '|' | '^' | '!' | '~' | '?' | ':')
        {
            return false;
        }
        if next_char == ')' && self.input.get(after_word + 1) == Some(&')') {
            return false;
        }

        let looks_like_command_arg = matches!(next_char, '-' | '"' | '\'' | '$' | '/' | '.')
            || next_char.is_ascii_alphabetic()
            || next_char == '_';
        if after_word > word_end && looks_like_command_arg {
            let mut scan_pos = after_word;
            while scan_pos < self.input.len() && self.input[scan_pos] != '\n' {
                if self.input[scan_pos] == ')' {
                    return true;
                }
                scan_pos += 1;
            }
            return false;
        }

        if next_char == ')' {
            let mut after_paren = after_word + 1;
            while after_paren < self.input.len() && matches!(self.input.get(after_paren), Some(' ' | '\t')) {
                after_paren += 1;
            }
            let next = self.input.get(after_paren);
            let next2 = self.input.get(after_paren + 1);
            if (next == Some(&'|') && next2 == Some(&'|'))
                || (next == Some(&'&') && next2 == Some(&'&'))
                || next == Some(&';')
                || (next == Some(&'|') && next2 != Some(&'|'))
            {
                return true;
            }
        }

        false
    }

    /// Complement to [`Self::looks_like_nested_subshells`]: scans forward
    /// from inside a candidate `((` tracking paren depth and quoting, and
    /// reports whether the outer pair closes as `) )` (spaced — a subshell)
    /// rather than `))` (adjacent — arithmetic).
    fn dparen_closes_with_spaced_parens(&self, start_pos: usize) -> bool {
        let mut pos = start_pos;
        let mut depth = 2;
        let mut in_single_quote = false;
        let mut in_double_quote = false;

        while pos < self.input.len() && depth > 0 {
            let c = self.input[pos];

            if in_single_quote {
                if c == '\'' {
                    in_single_quote = false;
                }
                pos += 1;
                continue;
            }
            if in_double_quote {
                if c == '\\' && pos + 1 < self.input.len() {
                    pos += 2;
                    continue;
                }
                if c == '"' {
                    in_double_quote = false;
                }
                pos += 1;
                continue;
            }

            match c {
                '\'' => in_single_quote = true,
                '"' => in_double_quote = true,
                '\\' if pos + 1 < self.input.len() => {
                    pos += 2;
                    continue;
                }
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 1 {
                        let next_pos = pos + 1;
                        if self.input.get(next_pos) == Some(&')') {
                            return false;
                        }
                        let mut scan_pos = next_pos;
                        let mut has_whitespace = false;
                        while scan_pos < self.input.len() && matches!(self.input.get(scan_pos), Some(' ' | '\t' | '\n')) {
                            has_whitespace = true;
                            scan_pos += 1;
                        }
                        if has_whitespace && self.input.get(scan_pos) == Some(&')') {
                            return true;
                        }
                    }
                    if depth == 0 {
                        return false;
                    }
                }
                '|' if depth == 1 => return true,
                '&' if depth == 1 && self.input.get(pos + 1) == Some(&'&') => return true,
                _ => {}
            }
            pos += 1;
        }

        false
    }

    fn read_word(&mut self, start: usize, line: usize, column: usize) -> Result<Option<Token>, LexerError> {
        let mut value = String::new();
        let mut quoted = false;
        let mut single_quoted = false;
        let mut in_single_quote = false;
        let mut in_double_quote = false;
        let starts_with_quote = matches!(self.current(), Some('"' | '\''));
        let mut has_content_after_quote = false;
        let mut bracket_depth = 0;
        let mut col = column;
        let mut ln = line;

        while let Some(c) = self.current() {
            if !in_single_quote && !in_double_quote {
                if c == '(' && !value.is_empty() && "@*+?!".contains(value.chars().last().unwrap_or(' ')) {
                    if let Some(result) = self.scan_extglob_pattern(self.pos) {
                        value.push_str(&result.content);
                        self.pos = result.end;
                        col += result.content.len();
                        continue;
                    }
                }

                if c == '[' && bracket_depth == 0 && is_valid_name(&value) {
                    let escapes_subscript = matches!(self.peek(1), Some('^' | '!'));
                    if !escapes_subscript {
                        bracket_depth = 1;
                        value.push(c);
                        self.pos += 1;
                        col += 1;
                        continue;
                    }
                } else if c == '[' && bracket_depth > 0 {
                    if !value.is_empty() && value.chars().last() != Some('\\') {
                        bracket_depth += 1;
                    }
                    value.push(c);
                    self.pos += 1;
                    col += 1;
                    continue;
                } else if c == ']' && bracket_depth > 0 {
                    if !value.is_empty() && value.chars().last() != Some('\\') {
                        bracket_depth -= 1;
                    }
                    value.push(c);
                    self.pos += 1;
                    col += 1;
                    continue;
                }

                if bracket_depth > 0 {
                    if c == '\n' {
                        break;
                    }
                    value.push(c);
                    self.pos += 1;
                    col += 1;
                    continue;
                }

                if is_word_boundary(c) {
                    break;
                }
            }

            if c == '$' && self.peek(1) == Some('\'') && !in_single_quote && !in_double_quote {
                self.consume_ansi_c_quote_span(&mut value, &mut col);
                continue;
            }

            if c == '$' && self.peek(1) == Some('"') && !in_single_quote && !in_double_quote {
                self.pos += 2;
                col += 2;
                in_double_quote = true;
                quoted = true;
                continue;
            }

            if c == '\'' && !in_double_quote {
                self.consume_single_quote_boundary(
                    &mut value, &mut in_single_quote, &mut quoted, &mut single_quoted,
                    starts_with_quote, &mut has_content_after_quote,
                );
                self.pos += 1;
                col += 1;
                continue;
            }

            if c == '"' && !in_single_quote {
                self.consume_double_quote_boundary(
                    &mut value, &mut in_double_quote, &mut quoted, &mut single_quoted,
                    starts_with_quote, &mut has_content_after_quote,
                );
                self.pos += 1;
                col += 1;
                continue;
            }

            if c == '\\' && !in_single_quote {
                if let Some(next) = self.peek(1) {
                    if next == '\n' {
                        self.pos += 2;
                        ln += 1;
                        col = 1;
                        continue;
                    }
                    if in_double_quote {
                        if matches!(next, '"' | '\\' | '$' | '`' | '\n') {
                            value.push(c);
                            value.push(next);
                            self.pos += 2;
                            col += 2;
                            continue;
                        }
                    } else {
                        if matches!(next, '\\' | '"' | '\'' | '`' | '*' | '?' | '[' | ']' | '(' | ')' | '$' | '-' | '.' | '^' | '+' | '{' | '}') {
                            value.push(c);
                            value.push(next);
                        } else {
                            value.push(next);
                        }
                        self.pos += 2;
                        col += 2;
                        continue;
                    }
                }
            }

            if c == '$' && self.peek(1) == Some('(') && !in_single_quote {
                self.consume_dollar_paren_span(&mut value, &mut col, &mut ln);
                continue;
            }

            if c == '$' && self.peek(1) == Some('{') && !in_single_quote {
                self.consume_dollar_brace_span(&mut value, &mut col, &mut ln)?;
                continue;
            }

            if c == '$' && self.peek(1) == Some('[') && !in_single_quote {
                self.consume_dollar_bracket_span(&mut value, &mut col, &mut ln);
                continue;
            }

            if c == '$' && !in_single_quote {
                if let Some(next) = self.peek(1) {
                    if matches!(next, '#' | '?' | '$' | '!' | '@' | '*' | '-') || next.is_ascii_digit() {
                        value.push(c);
                        value.push(next);
                        self.pos += 2;
                        col += 2;
                        continue;
                    }
                }
            }

            if c == '`' && !in_single_quote {
                self.consume_backtick_span(&mut value, &mut col, &mut ln);
                continue;
            }

            value.push(c);
            self.pos += 1;
            if c == '\n' {
                ln += 1;
                col = 1;
            } else {
                col += 1;
            }
        }

        self.column = col;
        self.line = ln;

        if has_content_after_quote && starts_with_quote {
            let open_quote = self.input[start];
            value = format!("{}{}", open_quote, value);
            quoted = false;
            single_quoted = false;
        }

        if in_single_quote || in_double_quote {
            let quote_type = if in_single_quote { "'" } else { "\"" };
            return Err(LexerError::new(format!("unexpected EOF while looking for matching `{}'", quote_type), line, column));
        }

        if !starts_with_quote && value.len() >= 2 {
            self.collapse_if_wholly_quoted(&mut value, &mut quoted, &mut single_quoted);
        }

        if value.is_empty() {
            return Ok(Some(Token::new(TokenType::Word, "", start, self.pos, line, column).with_quotes(quoted, single_quoted)));
        }

        if !quoted {
            if let Some(&token_type) = RESERVED_WORDS.get(value.as_str()) {
                return Ok(Some(Token::new(token_type, value, start, self.pos, line, column)));
            }
        }

        if !starts_with_quote {
            if let Some(eq_idx) = find_top_level_assignment_eq(&value) {
                if eq_idx > 0 && assignment_lhs_is_valid(&value[..eq_idx]) {
                    return Ok(Some(
                        Token::new(TokenType::AssignmentWord, value, start, self.pos, line, column).with_quotes(quoted, single_quoted),
                    ));
                }
            }
        }

        if value.chars().all(|c| c.is_ascii_digit()) {
            return Ok(Some(Token::new(TokenType::Number, value, start, self.pos, line, column)));
        }

        if is_valid_name(&value) {
            return Ok(Some(Token::new(TokenType::Name, value, start, self.pos, line, column).with_quotes(quoted, single_quoted)));
        }

        Ok(Some(Token::new(TokenType::Word, value, start, self.pos, line, column).with_quotes(quoted, single_quoted)))
    }

    fn consume_single_quote_boundary(
        &self,
        value: &mut String,
        in_single_quote: &mut bool,
        quoted: &mut bool,
        single_quoted: &mut bool,
        starts_with_quote: bool,
        has_content_after_quote: &mut bool,
    ) {
        if *in_single_quote {
            *in_single_quote = false;
            if !starts_with_quote || *has_content_after_quote {
                value.push('\'');
            } else if let Some(next) = self.peek(1) {
                if !is_word_boundary(next) && next != '\'' {
                    *has_content_after_quote = true;
                    value.push('\'');
                    if next == '"' {
                        *single_quoted = false;
                        *quoted = false;
                    }
                }
            }
        } else {
            *in_single_quote = true;
            if starts_with_quote && !*has_content_after_quote {
                *single_quoted = true;
                *quoted = true;
            } else {
                value.push('\'');
            }
        }
    }

    fn consume_double_quote_boundary(
        &self,
        value: &mut String,
        in_double_quote: &mut bool,
        quoted: &mut bool,
        single_quoted: &mut bool,
        starts_with_quote: bool,
        has_content_after_quote: &mut bool,
    ) {
        if *in_double_quote {
            *in_double_quote = false;
            if !starts_with_quote || *has_content_after_quote {
                value.push('"');
            } else if let Some(next) = self.peek(1) {
                if !is_word_boundary(next) && next != '"' {
                    *has_content_after_quote = true;
                    value.push('"');
                    if next == '\'' {
                        *single_quoted = false;
                        *quoted = false;
                    }
                }
            }
        } else {
            *in_double_quote = true;
            if starts_with_quote && !*has_content_after_quote {
                *quoted = true;
            } else {
                value.push('"');
            }
        }
    }

    /// If `value` is a single fully-quoted token (`'...'` with no embedded
    /// quote, or `"..."` with no unescaped inner `"`), strip the quotes and
    /// mark it quoted — matching the shell's own "whole word was one quoted
    /// string" shortcut rather than leaving quote chars in the token value.
    fn collapse_if_wholly_quoted(&self, value: &mut String, quoted: &mut bool, single_quoted: &mut bool) {
        let chars: Vec<char> = value.chars().collect();
        let last = chars.len() - 1;

        if chars[0] == '\'' && chars[last] == '\'' {
            let inner: String = chars[1..last].iter().collect();
            if !inner.contains('\'') && !inner.contains('"') {
                *value = inner;
                *quoted = true;
                *single_quoted = true;
            }
        } else if chars[0] == '"' && chars[last] == '"' {
            let inner: String = chars[1..last].iter().collect();
            let inner_chars: Vec<char> = inner.chars().collect();
            let mut i = 0;
            let mut has_unescaped_quote = false;
            while i < inner_chars.len() {
                if inner_chars[i] == '"' {
                    has_unescaped_quote = true;
                    break;
                }
                if inner_chars[i] == '\\' && i + 1 < inner_chars.len() {
                    i += 1;
                }
                i += 1;
            }
            if !has_unescaped_quote {
                *value = inner;
                *quoted = true;
                *single_quoted = false;
            }
        }
    }

    /// Copy a `$'...'` span verbatim into `value` without interpreting its
    /// escapes — that decoding happens later in the word-expansion stage.
    fn consume_ansi_c_quote_span(&mut self, value: &mut String, col: &mut usize) {
        value.push_str("$'");
        self.pos += 2;
        *col += 2;
        while let Some(ch) = self.current() {
            if ch == '\'' {
                break;
            }
            if ch == '\\' && self.peek(1).is_some() {
                value.push(ch);
                value.push(self.peek(1).unwrap());
                self.pos += 2;
                *col += 2;
            } else {
                value.push(ch);
                self.pos += 1;
                *col += 1;
            }
        }
        if self.current() == Some('\'') {
            value.push('\'');
            self.pos += 1;
            *col += 1;
        }
    }

    /// Copy a `$(...)` span verbatim into `value`, tracking quoting, nested
    /// `$(`, `${...}` (so its own parens don't affect depth), and
    /// `case ... esac` pattern lists (whose bare `)` doesn't close the
    /// substitution). Interpretation of the body happens later.
    fn consume_dollar_paren_span(&mut self, value: &mut String, col: &mut usize, ln: &mut usize) {
        value.push('$');
        self.pos += 1;
        *col += 1;
        value.push(self.current().unwrap());
        self.pos += 1;
        *col += 1;

        let mut depth = 1;
        let mut in_sq = false;
        let mut in_dq = false;
        let mut case_depth = 0;
        let mut in_case_pattern = false;
        let mut word_buffer = String::new();
        let is_arithmetic = self.current() == Some('(') && !self.dollar_dparen_is_subshell(self.pos);

        while depth > 0 && self.pos < self.input.len() {
            let ch = self.input[self.pos];
            value.push(ch);

            if in_sq {
                if ch == '\'' {
                    in_sq = false;
                }
            } else if in_dq {
                if ch == '\\' && self.pos + 1 < self.input.len() {
                    value.push(self.input[self.pos + 1]);
                    self.pos += 1;
                    *col += 1;
                } else if ch == '"' {
                    in_dq = false;
                }
            } else if ch == '\'' {
                in_sq = true;
                word_buffer.clear();
            } else if ch == '"' {
                in_dq = true;
                word_buffer.clear();
            } else if ch == '\\' && self.pos + 1 < self.input.len() {
                value.push(self.input[self.pos + 1]);
                self.pos += 1;
                *col += 1;
                word_buffer.clear();
            } else if ch == '$' && self.peek(1) == Some('{') {
                self.copy_nested_brace_span(value, col, ln);
                word_buffer.clear();
                continue;
            } else if ch == '#'
                && !is_arithmetic
                && (word_buffer.is_empty() || self.input.get(self.pos.wrapping_sub(1)).map_or(false, |c| c.is_whitespace()))
            {
                while self.pos + 1 < self.input.len() && self.input[self.pos + 1] != '\n' {
                    self.pos += 1;
                    *col += 1;
                    value.push(self.input[self.pos]);
                }
                word_buffer.clear();
            } else if ch.is_ascii_alphabetic() || ch == '_' {
                word_buffer.push(ch);
            } else {
                match word_buffer.as_str() {
                    "case" => {
                        case_depth += 1;
                        in_case_pattern = false;
                    }
                    "in" if case_depth > 0 => in_case_pattern = true,
                    "esac" if case_depth > 0 => {
                        case_depth -= 1;
                        in_case_pattern = false;
                    }
                    _ => {}
                }
                word_buffer.clear();

                if ch == '(' {
                    let preceded_by_dollar = self.pos > 0 && self.input.get(self.pos.wrapping_sub(1)) == Some(&'$');
                    if preceded_by_dollar || !in_case_pattern {
                        depth += 1;
                    }
                } else if ch == ')' {
                    if in_case_pattern {
                        in_case_pattern = false;
                    } else {
                        depth -= 1;
                    }
                } else if ch == ';' && case_depth > 0 && self.peek(1) == Some(';') {
                    in_case_pattern = true;
                }
            }

            if ch == '\n' {
                *ln += 1;
                *col = 0;
                word_buffer.clear();
            }
            self.pos += 1;
            *col += 1;
        }
    }

    /// Helper for [`Self::consume_dollar_paren_span`]: copies a nested
    /// `${...}` construct (already positioned at the `$`) verbatim,
    /// respecting its own quote/backslash/brace-depth rules.
    fn copy_nested_brace_span(&mut self, value: &mut String, col: &mut usize, ln: &mut usize) {
        self.pos += 1;
        *col += 1;
        value.push(self.input[self.pos]);
        self.pos += 1;
        *col += 1;

        let mut depth = 1;
        let mut in_sq = false;
        let mut in_dq = false;
        while depth > 0 && self.pos < self.input.len() {
            let bc = self.input[self.pos];
            if bc == '\\' && self.pos + 1 < self.input.len() && !in_sq {
                value.push(bc);
                self.pos += 1;
                *col += 1;
                value.push(self.input[self.pos]);
                self.pos += 1;
                *col += 1;
                continue;
            }
            value.push(bc);
            if in_sq {
                if bc == '\'' {
                    in_sq = false;
                }
            } else if in_dq {
                if bc == '"' {
                    in_dq = false;
                }
            } else {
                match bc {
                    '\'' => in_sq = true,
                    '"' => in_dq = true,
                    '{' => depth += 1,
                    '}' => depth -= 1,
                    _ => {}
                }
            }
            if bc == '\n' {
                *ln += 1;
                *col = 0;
            } else {
                *col += 1;
            }
            self.pos += 1;
        }
    }

    /// Copy a `${...}` parameter expansion span verbatim into `value`.
    /// Errors if a `'...'`/`"..."` inside it is left unterminated.
    fn consume_dollar_brace_span(&mut self, value: &mut String, col: &mut usize, ln: &mut usize) -> Result<(), LexerError> {
        value.push('$');
        self.pos += 1;
        *col += 1;
        value.push(self.current().unwrap());
        self.pos += 1;
        *col += 1;

        let mut depth = 1;
        let mut in_sq = false;
        let mut in_dq = false;
        let (mut sq_line, mut sq_col) = (*ln, *col);
        let (mut dq_line, mut dq_col) = (*ln, *col);

        while depth > 0 && self.pos < self.input.len() {
            let ch = self.input[self.pos];

            if ch == '\\' && self.peek(1) == Some('\n') {
                self.pos += 2;
                *ln += 1;
                *col = 1;
                continue;
            }
            if ch == '\\' && self.pos + 1 < self.input.len() && !in_sq {
                value.push(ch);
                self.pos += 1;
                *col += 1;
                value.push(self.input[self.pos]);
                self.pos += 1;
                *col += 1;
                continue;
            }

            value.push(ch);
            if in_sq {
                if ch == '\'' {
                    in_sq = false;
                }
            } else if in_dq {
                if ch == '"' {
                    in_dq = false;
                }
            } else {
                match ch {
                    '\'' => {
                        in_sq = true;
                        sq_line = *ln;
                        sq_col = *col;
                    }
                    '"' => {
                        in_dq = true;
                        dq_line = *ln;
                        dq_col = *col;
                    }
                    '{' => depth += 1,
                    '}' => depth -= 1,
                    _ => {}
                }
            }

            if ch == '\n' {
                *ln += 1;
                *col = 0;
            }
            self.pos += 1;
            *col += 1;
        }

        if in_sq {
            return Err(LexerError::new("unexpected EOF while looking for matching `''", sq_line, sq_col));
        }
        if in_dq {
            return Err(LexerError::new("unexpected EOF while looking for matching `\"'", dq_line, dq_col));
        }
        Ok(())
    }

    /// Copy a legacy `$[...]` arithmetic span verbatim into `value`.
    fn consume_dollar_bracket_span(&mut self, value: &mut String, col: &mut usize, ln: &mut usize) {
        value.push('$');
        self.pos += 1;
        *col += 1;
        value.push(self.current().unwrap());
        self.pos += 1;
        *col += 1;

        let mut depth = 1;
        while depth > 0 && self.pos < self.input.len() {
            let ch = self.input[self.pos];
            value.push(ch);
            match ch {
                '[' => depth += 1,
                ']' => depth -= 1,
                '\n' => {
                    *ln += 1;
                    *col = 0;
                }
                _ => {}
            }
            self.pos += 1;
            *col += 1;
        }
    }

    /// Copy a backtick command-substitution span verbatim into `value`.
    fn consume_backtick_span(&mut self, value: &mut String, col: &mut usize, ln: &mut usize) {
        value.push('`');
        self.pos += 1;
        *col += 1;
        while let Some(ch) = self.current() {
            if ch == '`' {
                break;
            }
            value.push(ch);
            if ch == '\\' && self.peek(1).is_some() {
                value.push(self.peek(1).unwrap());
                self.pos += 1;
                *col += 1;
            }
            if ch == '\n' {
                *ln += 1;
                *col = 0;
            }
            self.pos += 1;
            *col += 1;
        }
        if self.current() == Some('`') {
            value.push('`');
            self.pos += 1;
            *col += 1;
        }
    }

    fn read_heredoc_content(&mut self) -> Result<(), LexerError> {
        while let Some(heredoc) = self.pending_heredocs.pop() {
            let start = self.pos;
            let start_line = self.line;
            let start_column = self.column;
            let mut content = String::new();

            while self.pos < self.input.len() {
                let mut line_content = String::new();
                while self.pos < self.input.len() && self.input[self.pos] != '\n' {
                    line_content.push(self.input[self.pos]);
                    self.pos += 1;
                    self.column += 1;
                }

                let line_to_check = if heredoc.strip_tabs {
                    line_content.trim_start_matches('\t').to_string()
                } else {
                    line_content.clone()
                };

                if line_to_check == heredoc.delimiter {
                    if self.pos < self.input.len() && self.input[self.pos] == '\n' {
                        self.pos += 1;
                        self.line += 1;
                        self.column = 1;
                    }
                    break;
                }

                content.push_str(&line_content);
                if self.pos < self.input.len() && self.input[self.pos] == '\n' {
                    content.push('\n');
                    self.pos += 1;
                    self.line += 1;
                    self.column = 1;
                }
            }

            self.tokens.push(Token::new(TokenType::HeredocContent, content, start, self.pos, start_line, start_column));
        }
        Ok(())
    }

    fn register_heredoc_from_lookahead(&mut self, strip_tabs: bool) {
        let saved_pos = self.pos;
        let saved_column = self.column;

        while self.pos < self.input.len() && matches!(self.input.get(self.pos), Some(' ' | '\t')) {
            self.pos += 1;
            self.column += 1;
        }

        let mut delimiter = String::new();
        let mut quoted = false;

        while self.pos < self.input.len() {
            let c = self.input[self.pos];
            if c.is_whitespace() || matches!(c, ';' | '<' | '>' | '&' | '|' | '(' | ')') {
                break;
            }

            if c == '\'' || c == '"' {
                quoted = true;
                let quote_char = c;
                self.pos += 1;
                self.column += 1;
                while self.pos < self.input.len() && self.input[self.pos] != quote_char {
                    delimiter.push(self.input[self.pos]);
                    self.pos += 1;
                    self.column += 1;
                }
                if self.pos < self.input.len() && self.input[self.pos] == quote_char {
                    self.pos += 1;
                    self.column += 1;
                }
            } else if c == '\\' {
                quoted = true;
                self.pos += 1;
                self.column += 1;
                if self.pos < self.input.len() {
                    delimiter.push(self.input[self.pos]);
                    self.pos += 1;
                    self.column += 1;
                }
            } else {
                delimiter.push(c);
                self.pos += 1;
                self.column += 1;
            }
        }

        self.pos = saved_pos;
        self.column = saved_column;

        if !delimiter.is_empty() {
            self.pending_heredocs.push(PendingHeredoc { delimiter, strip_tabs, quoted });
        }
    }

    fn is_word_char_following(&self, pos: usize) -> bool {
        pos < self.input.len() && !is_word_boundary(self.input[pos])
    }

    /// Read a word that contains a `{...}` brace expansion, skipping over
    /// its interior (and any nested `$(...)`/`${...}`/backtick spans) rather
    /// than treating their contents as ordinary word characters.
    fn read_word_with_brace_expansion(&mut self, start: usize, line: usize, column: usize) -> Result<Option<Token>, LexerError> {
        let mut col = column;

        while self.pos < self.input.len() {
            let c = self.input[self.pos];
            if is_word_boundary(c) {
                break;
            }

            if c == '{' && self.scan_brace_expansion(self.pos).is_some() {
                self.skip_balanced(&mut col, '{', '}');
                continue;
            }
            if c == '{' || c == '}' {
                self.pos += 1;
                col += 1;
                continue;
            }
            if c == '$' && self.peek(1) == Some('(') {
                self.pos += 2;
                col += 2;
                self.skip_balanced(&mut col, '(', ')');
                continue;
            }
            if c == '$' && self.peek(1) == Some('{') {
                self.pos += 2;
                col += 2;
                self.skip_balanced(&mut col, '{', '}');
                continue;
            }
            if c == '`' {
                self.pos += 1;
                col += 1;
                while self.pos < self.input.len() && self.input[self.pos] != '`' {
                    if self.input[self.pos] == '\\' && self.pos + 1 < self.input.len() {
                        self.pos += 2;
                        col += 2;
                    } else {
                        self.pos += 1;
                        col += 1;
                    }
                }
                if self.pos < self.input.len() {
                    self.pos += 1;
                    col += 1;
                }
                continue;
            }

            self.pos += 1;
            col += 1;
        }

        let value: String = self.input[start..self.pos].iter().collect();
        self.column = col;
        Ok(Some(Token::new(TokenType::Word, value, start, self.pos, line, column).with_quotes(false, false)))
    }

    /// Advance `self.pos` past a balanced `open`/`close` pair, assuming the
    /// cursor is just past the opening delimiter (depth already 1).
    fn skip_balanced(&mut self, col: &mut usize, open: char, close: char) {
        let mut depth = 1;
        while self.pos < self.input.len() && depth > 0 {
            let c = self.input[self.pos];
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
            }
            self.pos += 1;
            *col += 1;
        }
    }

    fn scan_brace_expansion(&self, start_pos: usize) -> Option<String> {
        let mut pos = start_pos + 1;
        let mut depth = 1;
        let mut has_comma = false;
        let mut has_range = false;

        while pos < self.input.len() && depth > 0 {
            match self.input[pos] {
                '{' => {
                    depth += 1;
                    pos += 1;
                }
                '}' => {
                    depth -= 1;
                    pos += 1;
                }
                ',' if depth == 1 => {
                    has_comma = true;
                    pos += 1;
                }
                '.' if pos + 1 < self.input.len() && self.input[pos + 1] == '.' => {
                    has_range = true;
                    pos += 2;
                }
                ' ' | '\t' | '\n' | ';' | '&' | '|' => return None,
                _ => pos += 1,
            }
        }

        if depth == 0 && (has_comma || has_range) {
            Some(self.input[start_pos..pos].iter().collect())
        } else {
            None
        }
    }

    fn scan_literal_brace_word(&self, start_pos: usize) -> Option<String> {
        let mut pos = start_pos + 1;
        let mut depth = 1;

        while pos < self.input.len() && depth > 0 {
            match self.input[pos] {
                '{' => {
                    depth += 1;
                    pos += 1;
                }
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(self.input[start_pos..=pos].iter().collect());
                    }
                    pos += 1;
                }
                ' ' | '\t' | '\n' | ';' | '&' | '|' => return None,
                _ => pos += 1,
            }
        }

        None
    }

    fn scan_extglob_pattern(&self, start_pos: usize) -> Option<ExtglobResult> {
        let mut pos = start_pos + 1;
        let mut depth = 1;

        while pos < self.input.len() && depth > 0 {
            let c = self.input[pos];

            if c == '\\' && pos + 1 < self.input.len() {
                pos += 2;
                continue;
            }
            if "@*+?!".contains(c) && pos + 1 < self.input.len() && self.input[pos + 1] == '(' {
                pos += 2;
                depth += 1;
                continue;
            }

            match c {
                '(' => {
                    depth += 1;
                    pos += 1;
                }
                ')' => {
                    depth -= 1;
                    pos += 1;
                }
                '\n' => return None,
                _ => pos += 1,
            }
        }

        if depth == 0 {
            Some(ExtglobResult { content: self.input[start_pos..pos].iter().collect(), end: pos })
        } else {
            None
        }
    }

    fn scan_fd_variable(&self, start_pos: usize) -> Option<FdVariableResult> {
        let mut pos = start_pos + 1;
        let name_start = pos;

        while pos < self.input.len() {
            let c = self.input[pos];
            if pos == name_start {
                if !c.is_ascii_alphabetic() && c != '_' {
                    return None;
                }
            } else if !is_name_char(c) {
                break;
            }
            pos += 1;
        }
        if pos == name_start {
            return None;
        }

        let varname: String = self.input[name_start..pos].iter().collect();

        if pos >= self.input.len() || self.input[pos] != '}' {
            return None;
        }
        pos += 1;

        if pos >= self.input.len() {
            return None;
        }
        let c = self.input[pos];
        let c2 = self.input.get(pos + 1).copied();
        let is_redirect_op = c == '>' || c == '<' || (c == '&' && matches!(c2, Some('>' | '<')));
        if !is_redirect_op {
            return None;
        }

        Some(FdVariableResult { varname, end: pos })
    }

    /// Looks ahead from just past `$((` to decide whether it closes as a
    /// command-substitution-wrapped subshell (`) )`, or has an embedded
    /// newline before the close) rather than plain arithmetic (`))`).
    fn dollar_dparen_is_subshell(&self, start_pos: usize) -> bool {
        let mut pos = start_pos + 1;
        let mut depth = 2;
        let mut in_single_quote = false;
        let mut in_double_quote = false;
        let mut has_newline = false;

        while pos < self.input.len() && depth > 0 {
            let c = self.input[pos];

            if in_single_quote {
                if c == '\'' {
                    in_single_quote = false;
                }
                has_newline |= c == '\n';
                pos += 1;
                continue;
            }
            if in_double_quote {
                if c == '\\' && pos + 1 < self.input.len() {
                    pos += 2;
                    continue;
                }
                if c == '"' {
                    in_double_quote = false;
                }
                has_newline |= c == '\n';
                pos += 1;
                continue;
            }

            match c {
                '\'' => {
                    in_single_quote = true;
                    pos += 1;
                }
                '"' => {
                    in_double_quote = true;
                    pos += 1;
                }
                '\\' if pos + 1 < self.input.len() => pos += 2,
                '\n' => {
                    has_newline = true;
                    pos += 1;
                }
                '(' => {
                    depth += 1;
                    pos += 1;
                }
                ')' => {
                    depth -= 1;
                    if depth == 1 {
                        let next_pos = pos + 1;
                        if next_pos < self.input.len() && self.input[next_pos] == ')' {
                            return false;
                        }
                        let mut scan_pos = next_pos;
                        let mut has_whitespace = false;
                        while scan_pos < self.input.len() && matches!(self.input.get(scan_pos), Some(' ' | '\t' | '\n')) {
                            has_whitespace = true;
                            scan_pos += 1;
                        }
                        if has_whitespace && scan_pos < self.input.len() && self.input[scan_pos] == ')' {
                            return true;
                        }
                        if has_newline {
                            return true;
                        }
                    }
                    if depth == 0 {
                        return false;
                    }
                    pos += 1;
                }
                _ => pos += 1,
            }
        }

        false
    }

    /// Queue a here-doc to be slurped after the next newline token. Exposed
    /// for the parser, which needs to register a heredoc for `<<` operators
    /// it reconstructs itself (e.g. inside command substitution bodies).
    pub fn add_pending_heredoc(&mut self, delimiter: String, strip_tabs: bool, quoted: bool) {
        self.pending_heredocs.push(PendingHeredoc { delimiter, strip_tabs, quoted });
    }
}

struct ExtglobResult {
    content: String,
    end: usize,
}

struct FdVariableResult {
    varname: String,
    end: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_command_tokenizes_as_two_names() {
        let tokens = Lexer::new("echo hello").tokenize().unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].token_type, TokenType::Name);
        assert_eq!(tokens[0].value, "echo");
        assert_eq!(tokens[1].token_type, TokenType::Name);
        assert_eq!(tokens[1].value, "hello");
    }

    #[test]
    fn pipeline_emits_pipe_token() {
        let tokens = Lexer::new("cat file | grep pattern").tokenize().unwrap();
        assert_eq!(tokens[2].token_type, TokenType::Pipe);
    }

    #[test]
    fn redirection_emits_great_token() {
        let tokens = Lexer::new("echo hello > file.txt").tokenize().unwrap();
        assert_eq!(tokens[2].token_type, TokenType::Great);
    }

    #[test]
    fn assignment_word_keeps_name_and_value_joined() {
        let tokens = Lexer::new("VAR=value").tokenize().unwrap();
        assert_eq!(tokens[0].token_type, TokenType::AssignmentWord);
        assert_eq!(tokens[0].value, "VAR=value");
    }

    #[test]
    fn double_quoted_word_is_unwrapped_and_marked_quoted() {
        let tokens = Lexer::new("echo \"hello world\"").tokenize().unwrap();
        assert_eq!(tokens[1].value, "hello world");
        assert!(tokens[1].quoted);
    }

    #[test]
    fn single_quoted_word_is_unwrapped_and_marked_single_quoted() {
        let tokens = Lexer::new("echo 'hello world'").tokenize().unwrap();
        assert_eq!(tokens[1].value, "hello world");
        assert!(tokens[1].quoted);
        assert!(tokens[1].single_quoted);
    }

    #[test]
    fn reserved_words_tokenize_distinctly_from_plain_words() {
        let tokens = Lexer::new("if then else fi").tokenize().unwrap();
        assert_eq!(tokens[0].token_type, TokenType::If);
        assert_eq!(tokens[1].token_type, TokenType::Then);
        assert_eq!(tokens[2].token_type, TokenType::Else);
        assert_eq!(tokens[3].token_type, TokenType::Fi);
    }

    #[test]
    fn heredoc_body_is_captured_up_to_bare_delimiter_line() {
        let tokens = Lexer::new("cat <<EOF\nhello\nEOF\n").tokenize().unwrap();
        assert_eq!(tokens[1].token_type, TokenType::DLess);
        let heredoc_token = tokens.iter().find(|t| t.token_type == TokenType::HeredocContent);
        assert_eq!(heredoc_token.unwrap().value, "hello\n");
    }

    #[test]
    fn trailing_comment_is_its_own_token() {
        let tokens = Lexer::new("echo hello # this is a comment").tokenize().unwrap();
        assert!(tokens.iter().any(|t| t.token_type == TokenType::Comment));
    }

    #[test]
    fn arithmetic_command_opens_with_dparen_start() {
        let tokens = Lexer::new("(( x + 1 ))").tokenize().unwrap();
        assert_eq!(tokens[0].token_type, TokenType::DParenStart);
    }

    #[test]
    fn conditional_command_opens_with_dbrack_start() {
        let tokens = Lexer::new("[[ -f file ]]").tokenize().unwrap();
        assert_eq!(tokens[0].token_type, TokenType::DBrackStart);
    }

    #[test]
    fn assignment_lhs_validates_simple_and_subscripted_names() {
        assert!(assignment_lhs_is_valid("VAR"));
        assert!(assignment_lhs_is_valid("arr[0]"));
        assert!(assignment_lhs_is_valid("arr[0]+"));
        assert!(!assignment_lhs_is_valid("0VAR"));
        assert!(!assignment_lhs_is_valid("arr[0"));
    }
}
