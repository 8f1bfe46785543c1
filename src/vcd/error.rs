// SPDX-License-Identifier: MIT

/// Position-tagged: no lexical rule matched at the current word.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("lex error at line {line}: no rule matches {lexeme:?}")]
pub struct LexError {
    pub line: usize,
    pub lexeme: String,
}

/// Position-tagged: the token stream did not match any grammar production.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("parse error at line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

/// Raised by the `$var` capture hook when the positionally-interpreted
/// token list does not form a valid `VarT`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("capture error at token #{token_index}: {reason}")]
pub struct CaptureError {
    pub token_index: usize,
    pub reason: String,
}

/// Top-level error for the lexer + grammar engine, chaining the three
/// lower-level kinds as the spec's "single error with the full chain."
#[derive(Debug, thiserror::Error)]
pub enum VcdError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
}
