use logos::Logos;
use strum_macros::EnumIter;
pub use self::TokenKind::*;

/// Lexical grammar for the interactive KeyQuarry command language: one
/// verb keyword followed by positional arguments and a handful of
/// `NAME value`-style option flags. Grounded on the teacher's
/// `kv-cli/src/ast/token_kind.rs` logos definition, trimmed down from a
/// SQL-ish token set to the vocabulary the command dispatcher actually
/// needs.
#[allow(non_camel_case_types)]
#[derive(Logos, EnumIter, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Error,

    EOI,

    #[regex(r"[ \t\r\f]+", logos::skip)]
    Whitespace,

    #[regex(r"--[^\t\n\f]*", logos::skip)]
    Comment,

    #[regex(r"/\*")]
    CommentBlockStart,
    #[regex(r"\*/")]
    CommentBlockEnd,

    #[regex(r"[\n]+")]
    Newline,

    #[regex(r#"[_a-zA-Z][_\-$a-zA-Z0-9.:/]*"#)]
    Ident,

    #[regex(r#"`[^`]*`"#)]
    #[regex(r#""([^"\\]|\\.|"")*""#)]
    #[regex(r#"'([^'\\]|\\.|'')*'"#)]
    QuotedString,

    #[regex(r"[0-9]+")]
    LiteralInteger,

    #[regex(r"([0-9]*\.[0-9]+)|([0-9]+\.[0-9]*)")]
    LiteralFloat,

    #[token(";")]
    SemiColon,
    #[token("*")]
    Star,
    #[token(",")]
    Comma,

    // Command verbs.
    //
    // Steps to add a verb:
    // 1. Add the token variant in alphabetical order.
    // 2. Add it to `Keywords` and to `is_keyword`.
    // 3. Teach `server::session::QueryKind::try_from` what it dispatches to.
    #[token("SET", ignore(ascii_case))]
    SET,
    #[token("GET", ignore(ascii_case))]
    GET,
    #[token("DEL", ignore(ascii_case))]
    DEL,
    #[token("DELETE", ignore(ascii_case))]
    DELETE,
    #[token("POP", ignore(ascii_case))]
    POP,
    #[token("EXISTS", ignore(ascii_case))]
    EXISTS,
    #[token("CLEAR", ignore(ascii_case))]
    CLEAR,
    #[token("KEYS", ignore(ascii_case))]
    KEYS,
    #[token("STATS", ignore(ascii_case))]
    STATS,
    #[token("LOCK", ignore(ascii_case))]
    LOCK,
    #[token("UNLOCK", ignore(ascii_case))]
    UNLOCK,
    #[token("INSPECT", ignore(ascii_case))]
    INSPECT,
    #[token("WATCH", ignore(ascii_case))]
    WATCH,
    #[token("REGISTER", ignore(ascii_case))]
    REGISTER,
    #[token("SETREADONLY", ignore(ascii_case))]
    SETREADONLY,
    #[token("CLEARHISTORY", ignore(ascii_case))]
    CLEARHISTORY,
    #[token("GETREVISION", ignore(ascii_case))]
    GETREVISION,
    #[token("GETKEYMETRIC", ignore(ascii_case))]
    GETKEYMETRIC,
    #[token("INFO", ignore(ascii_case))]
    INFO,
    #[token("KSIZE", ignore(ascii_case))]
    KSIZE,
    #[token("SHOW", ignore(ascii_case))]
    SHOW,
    #[token("EXIT", ignore(ascii_case))]
    EXIT,
    #[token("QUIT", ignore(ascii_case))]
    QUIT,

    // Option flags, recognized by keyword rather than taken positionally.
    #[token("FORCE", ignore(ascii_case))]
    FORCE,
    #[token("PATTERN", ignore(ascii_case))]
    PATTERN,
    #[token("LIMIT", ignore(ascii_case))]
    LIMIT,
    #[token("TTL", ignore(ascii_case))]
    TTL,
    #[token("LOCKFOR", ignore(ascii_case))]
    LOCKFOR,
    #[token("CONTENTTYPE", ignore(ascii_case))]
    CONTENTTYPE,
    #[token("VALUE", ignore(ascii_case))]
    VALUE,
    #[token("METRIC", ignore(ascii_case))]
    METRIC,
}

#[allow(non_camel_case_types)]
#[derive(Logos, EnumIter, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Keywords {
    SET,
    GET,
    DEL,
    DELETE,
    POP,
    EXISTS,
    CLEAR,
    KEYS,
    STATS,
    LOCK,
    UNLOCK,
    INSPECT,
    WATCH,
    REGISTER,
    SETREADONLY,
    CLEARHISTORY,
    GETREVISION,
    GETKEYMETRIC,
    INFO,
    KSIZE,
    SHOW,
    EXIT,
    QUIT,
    FORCE,
    PATTERN,
    LIMIT,
    TTL,
    LOCKFOR,
    CONTENTTYPE,
    VALUE,
    METRIC,
}

impl TokenKind {
    pub fn is_literal(&self) -> bool {
        matches!(self, LiteralInteger | LiteralFloat | QuotedString)
    }

    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            SET | GET
                | DEL
                | DELETE
                | POP
                | EXISTS
                | CLEAR
                | KEYS
                | STATS
                | LOCK
                | UNLOCK
                | INSPECT
                | WATCH
                | REGISTER
                | SETREADONLY
                | CLEARHISTORY
                | GETREVISION
                | GETKEYMETRIC
                | INFO
                | KSIZE
                | SHOW
                | EXIT
                | QUIT
                | FORCE
                | PATTERN
                | LIMIT
                | TTL
                | LOCKFOR
                | CONTENTTYPE
                | VALUE
                | METRIC
        )
    }
}
