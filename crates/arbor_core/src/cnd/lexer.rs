//! Tokenizer for compact node type definitions.
//!
//! Skips whitespace and `//` / `/* */` comments. Tracks lines for error
//! reporting.

use crate::error::{CoreError, CoreResult};

/// A single token with the line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    /// Unquoted name, keyword or value.
    Word(String),
    /// `'text'` or `"text"`.
    Quoted(String),
    Lt,
    Gt,
    LeftBracket,
    RightBracket,
    LeftParen,
    RightParen,
    Comma,
    Eq,
    Minus,
    Plus,
    Star,
    Bang,
    Question,
    Eof,
}

impl TokenKind {
    /// Text of a word or quoted string.
    pub(crate) fn text(&self) -> Option<&str> {
        match self {
            Self::Word(s) | Self::Quoted(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Word(s) => format!("'{s}'"),
            Self::Quoted(s) => format!("string '{s}'"),
            Self::Eof => "end of input".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Gt => ">",
            Self::LeftBracket => "[",
            Self::RightBracket => "]",
            Self::LeftParen => "(",
            Self::RightParen => ")",
            Self::Comma => ",",
            Self::Eq => "=",
            Self::Minus => "-",
            Self::Plus => "+",
            Self::Star => "*",
            Self::Bang => "!",
            Self::Question => "?",
            Self::Word(_) | Self::Quoted(_) | Self::Eof => "",
        }
    }
}

pub(crate) struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self { src, pos: 0, line: 1 }
    }

    /// Tokenizes the whole input. The last token is always [`TokenKind::Eof`].
    pub(crate) fn tokenize(src: &str) -> CoreResult<Vec<Token>> {
        let mut lexer = Lexer::new(src);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) -> CoreResult<()> {
        loop {
            match (self.peek(), self.peek_second()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                (Some('/'), Some('*')) => {
                    let start = self.line;
                    self.bump();
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('*') if self.peek() == Some('/') => {
                                self.bump();
                                break;
                            }
                            Some(_) => {}
                            None => return Err(CoreError::syntax(start, "unterminated comment")),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> CoreResult<Token> {
        self.skip_trivia()?;
        let line = self.line;
        let Some(c) = self.peek() else {
            return Ok(Token { kind: TokenKind::Eof, line });
        };

        let kind = match c {
            '\'' | '"' => self.quoted(c)?,
            c if is_word_start(c) => self.word(),
            _ => {
                self.bump();
                match c {
                    '<' => TokenKind::Lt,
                    '>' => TokenKind::Gt,
                    '[' => TokenKind::LeftBracket,
                    ']' => TokenKind::RightBracket,
                    '(' => TokenKind::LeftParen,
                    ')' => TokenKind::RightParen,
                    ',' => TokenKind::Comma,
                    '=' => TokenKind::Eq,
                    '-' => TokenKind::Minus,
                    '+' => TokenKind::Plus,
                    '*' => TokenKind::Star,
                    '!' => TokenKind::Bang,
                    '?' => TokenKind::Question,
                    other => {
                        return Err(CoreError::syntax(line, format!("unexpected character '{other}'")))
                    }
                }
            }
        };
        Ok(Token { kind, line })
    }

    fn quoted(&mut self, quote: char) -> CoreResult<TokenKind> {
        let start = self.line;
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(TokenKind::Quoted(text)),
                Some('\\') => match self.bump() {
                    Some(escaped) => text.push(escaped),
                    None => break,
                },
                Some(c) => text.push(c),
                None => break,
            }
        }
        Err(CoreError::syntax(start, "unterminated string"))
    }

    fn word(&mut self) -> TokenKind {
        let start = self.pos;
        while self.peek().is_some_and(is_word_char) {
            self.bump();
        }
        TokenKind::Word(self.src[start..self.pos].to_string())
    }
}

fn is_word_start(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '.' | '-' | '{' | '}')
}
