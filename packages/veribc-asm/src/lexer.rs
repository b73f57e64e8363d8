use std::fmt;

use smol_str::SmolStr;

#[derive(Debug, Clone, PartialEq, Eq, logos::Logos)]
pub enum Token {
    // Punctuation
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(":")]
    Colon,

    // Keywords
    #[token("code")]
    KwCode,
    #[token("stacksize")]
    KwStacksize,
    #[token("consts")]
    KwConsts,
    #[token("raw")]
    KwRaw,

    // Identifiers
    #[regex("[a-zA-Z_][a-zA-Z0-9_]*", |lex| SmolStr::new(lex.slice()))]
    Ident(SmolStr),
    #[regex("@[a-zA-Z_][a-zA-Z0-9_]*", |lex| SmolStr::new(&lex.slice()[1..]))]
    LabelRef(SmolStr),

    // Literals
    #[token("none")]
    LitNone,
    #[token("true")]
    LitTrue,
    #[token("false")]
    LitFalse,
    #[regex("-?[0-9]+", |lex| lex.slice().parse())]
    LitInt(i64),
    #[regex(r#""[^"\n]*""#, |lex| SmolStr::new(&lex.slice()[1..lex.slice().len() - 1]))]
    LitStr(SmolStr),

    /// A special token that marks the start of the input.
    Start,
    /// A special token that represents the end of the input.
    Eof,
    #[error]
    #[regex(r"[ \t\r\n\f]+", logos::skip)] // Whitespace
    #[regex(r";[^\n]*", logos::skip)] // Line comments
    Err,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::LBrace => write!(f, "`{{`"),
            Token::RBrace => write!(f, "`}}`"),
            Token::Colon => write!(f, "`:`"),
            Token::KwCode => write!(f, "`code`"),
            Token::KwStacksize => write!(f, "`stacksize`"),
            Token::KwConsts => write!(f, "`consts`"),
            Token::KwRaw => write!(f, "`raw`"),
            Token::Ident(ident) => write!(f, "identifier `{ident}`"),
            Token::LabelRef(label) => write!(f, "label `@{label}`"),
            Token::LitNone => write!(f, "`none`"),
            Token::LitTrue => write!(f, "`true`"),
            Token::LitFalse => write!(f, "`false`"),
            Token::LitInt(value) => write!(f, "integer `{value}`"),
            Token::LitStr(value) => write!(f, "string \"{value}\""),
            Token::Start => write!(f, "start of input"),
            Token::Eof => write!(f, "end of input"),
            Token::Err => write!(f, "invalid token"),
        }
    }
}
