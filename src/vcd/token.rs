// SPDX-License-Identifier: MIT

/// Keywords recognised by the lexer, case-sensitive as in IEEE 1364-2001 §18.2.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Keyword {
    Comment,
    Date,
    Version,
    Var,
    AttrBegin,
    AttrEnd,
    EndDefinitions,
    End,
    Scope,
    Upscope,
    Timescale,
    DumpAll,
    DumpOn,
    DumpOff,
    DumpVars,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Keyword> {
        Some(match word {
            "$comment" => Keyword::Comment,
            "$date" => Keyword::Date,
            "$version" => Keyword::Version,
            "$var" => Keyword::Var,
            "$attrbegin" => Keyword::AttrBegin,
            "$attrend" => Keyword::AttrEnd,
            "$enddefinitions" => Keyword::EndDefinitions,
            "$end" => Keyword::End,
            "$scope" => Keyword::Scope,
            "$upscope" => Keyword::Upscope,
            "$timescale" => Keyword::Timescale,
            "$dumpall" => Keyword::DumpAll,
            "$dumpon" => Keyword::DumpOn,
            "$dumpoff" => Keyword::DumpOff,
            "$dumpvars" => Keyword::DumpVars,
            _ => return None,
        })
    }

    /// Keyword that, seen in `Root`, pushes a free-form lexical mode.
    pub(crate) fn opens_mode(self) -> Option<super::lexer::Mode> {
        use super::lexer::Mode;
        match self {
            Keyword::Comment => Some(Mode::CommentTokens),
            Keyword::Date => Some(Mode::DateTokens),
            Keyword::Version => Some(Mode::VersionTokens),
            Keyword::Var => Some(Mode::VarTokens),
            Keyword::AttrBegin => Some(Mode::AttrBeginTokens),
            Keyword::AttrEnd => Some(Mode::AttrEndTokens),
            _ => None,
        }
    }
}

/// A lexical token. Value tokens keep their lexeme text rather than parsing
/// it eagerly, so the grammar engine decides how to interpret ambiguous
/// shapes (garbled scalars, state strings).
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Keyword(Keyword),
    /// `$end` closing a free-form mode (DateTokens, CommentTokens, ...).
    KwEndSpecial,
    /// `#<digits>`.
    Timestamp(u64),
    /// `b`/`B` followed by a run of `01xXzZuU`.
    Binstring(String),
    /// `r`/`R` followed by a float literal.
    RealString(String),
    /// `s`/`S` followed by an identifier (state-labelled vector change).
    StateString(String),
    /// Any non-whitespace run the lexer could not otherwise classify; this
    /// is the catch-all used for short identifier codes and garbled scalars.
    IdCode(String),
    /// A run of decimal digits, used for sizes and scope/var identifiers.
    Int(i64),
    /// A plain identifier, only produced while still inside declarations.
    Ident(String),
    /// A free-form word inside a pushed mode (`$date`, `$comment`, ...).
    AnyNonspace(String),
    Eof,
}

/// Classify a word under the declaration grammar (Root mode). `Err` carries
/// the lexeme for a position-tagged `LexError` when a `#`-prefixed word is
/// not a well-formed timestamp — the one case this lexer cannot shrug off
/// into a catch-all token kind.
pub(crate) fn classify_declaration_word(word: &str) -> Result<Token, String> {
    if let Some(kw) = Keyword::from_word(word) {
        return Ok(Token::Keyword(kw));
    }
    if let Some(rest) = word.strip_prefix('#') {
        return rest
            .parse()
            .map(Token::Timestamp)
            .map_err(|_| word.to_string());
    }
    if let Ok(v) = word.parse::<i64>() {
        return Ok(Token::Int(v));
    }
    Ok(Token::Ident(word.to_string()))
}

pub(crate) fn classify_simulation_word(word: &str) -> Result<Token, String> {
    if let Some(kw) = Keyword::from_word(word) {
        return Ok(Token::Keyword(kw));
    }
    if let Some(rest) = word.strip_prefix('#') {
        return rest
            .parse()
            .map(Token::Timestamp)
            .map_err(|_| word.to_string());
    }
    if let Some(rest) = word.strip_prefix(['b', 'B']) {
        if !rest.is_empty() && rest.chars().all(|c| "01xXzZuU".contains(c)) {
            return Ok(Token::Binstring(rest.to_string()));
        }
    }
    if let Some(rest) = word.strip_prefix(['r', 'R']) {
        if !rest.is_empty() && rest.parse::<f64>().is_ok() {
            return Ok(Token::RealString(rest.to_string()));
        }
    }
    if let Some(rest) = word.strip_prefix(['s', 'S']) {
        if !rest.is_empty() && rest.chars().next().unwrap().is_alphabetic() {
            return Ok(Token::StateString(rest.to_string()));
        }
    }
    Ok(Token::IdCode(word.to_string()))
}
