// SPDX-License-Identifier: MIT
//! Stateful lexer and grammar engine that turn VCD text into an AST
//! (components A, B and C).

pub mod ast;
pub mod error;
mod lexer;
mod parser;
mod token;

use std::io::prelude::*;

pub use self::error::VcdError;

/// Parses a full VCD file from `input` into a [`ast::File`].
pub fn parse<I: BufRead>(input: I) -> Result<ast::File, VcdError> {
    parser::Parser::new(input).parse()
}
