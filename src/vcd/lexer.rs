// SPDX-License-Identifier: MIT
use super::error::LexError;
use super::token::{classify_declaration_word, classify_simulation_word, Keyword, Token};
use std::collections::VecDeque;
use std::io::prelude::*;

/// A lexical mode. The mode stack is the lexer's only piece of state beyond
/// its word queue; it starts as `[Root]`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Mode {
    Root,
    AfterEnddefinitions,
    DateTokens,
    CommentTokens,
    VersionTokens,
    VarTokens,
    AttrBeginTokens,
    AttrEndTokens,
}

impl Mode {
    fn is_free_form(self) -> bool {
        !matches!(self, Mode::Root | Mode::AfterEnddefinitions)
    }
}

pub(crate) struct Lexer<I: BufRead> {
    input: I,
    buf: String,
    word_queue: VecDeque<String>,
    modes: Vec<Mode>,
    line: usize,
}

impl<I: BufRead> Lexer<I> {
    pub(crate) fn new(input: I) -> Lexer<I> {
        Lexer {
            input,
            buf: String::new(),
            word_queue: VecDeque::new(),
            modes: vec![Mode::Root],
            line: 0,
        }
    }

    fn feed_words(&mut self) -> bool {
        self.buf.clear();
        loop {
            match self.input.read_line(&mut self.buf) {
                Ok(0) => return false,
                Ok(_) => {
                    self.line += 1;
                    if self.buf.trim().is_empty() {
                        self.buf.clear();
                        continue;
                    }
                    for word in self.buf.split_whitespace() {
                        self.word_queue.push_back(word.to_string())
                    }
                    return true;
                }
                Err(e) => panic!("error reading VCD input: {:?}", e),
            }
        }
    }

    fn next_word(&mut self) -> Option<String> {
        loop {
            if let Some(w) = self.word_queue.pop_front() {
                return Some(w);
            }
            if !self.feed_words() {
                return None;
            }
        }
    }

    pub(crate) fn line(&self) -> usize {
        self.line
    }

    fn mode(&self) -> Mode {
        *self.modes.last().expect("mode stack never empties")
    }

    /// Pop the next token, driving the mode stack per §4.A.
    pub(crate) fn next_token(&mut self) -> Result<Token, LexError> {
        let word = match self.next_word() {
            Some(w) => w,
            None => return Ok(Token::Eof),
        };

        let mode = self.mode();
        if mode.is_free_form() {
            if word == "$end" {
                self.modes.pop();
                return Ok(Token::KwEndSpecial);
            }
            return Ok(Token::AnyNonspace(word));
        }

        let classified = if mode == Mode::AfterEnddefinitions {
            classify_simulation_word(&word)
        } else {
            classify_declaration_word(&word)
        };

        let tok = classified.map_err(|lexeme| LexError {
            line: self.line,
            lexeme,
        })?;

        if let Token::Keyword(kw) = tok {
            if let Some(sub_mode) = kw.opens_mode() {
                self.modes.push(sub_mode);
            } else if kw == Keyword::EndDefinitions {
                self.modes.push(Mode::AfterEnddefinitions);
            }
        }
        Ok(tok)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::BufReader;

    fn tok<I: BufRead>(l: &mut Lexer<I>) -> Token {
        l.next_token().unwrap()
    }

    #[test]
    fn plain_words() {
        let input = BufReader::new("hello world".as_bytes());
        let mut l = Lexer::new(input);
        assert_eq!(tok(&mut l), Token::Ident("hello".to_string()));
        assert_eq!(tok(&mut l), Token::Ident("world".to_string()));
        assert_eq!(tok(&mut l), Token::Eof);
    }

    #[test]
    fn keywords_and_pop() {
        let input = BufReader::new("$scope module top $end $upscope $end".as_bytes());
        let mut l = Lexer::new(input);
        assert_eq!(tok(&mut l), Token::Keyword(Keyword::Scope));
        assert_eq!(tok(&mut l), Token::Ident("module".to_string()));
        assert_eq!(tok(&mut l), Token::Ident("top".to_string()));
        assert_eq!(tok(&mut l), Token::Keyword(Keyword::End));
        assert_eq!(tok(&mut l), Token::Keyword(Keyword::Upscope));
        assert_eq!(tok(&mut l), Token::Keyword(Keyword::End));
        assert_eq!(tok(&mut l), Token::Eof);
    }

    #[test]
    fn comment_hides_nested_enddefinitions() {
        let input =
            BufReader::new("$comment $enddefinitions $end $enddefinitions $end".as_bytes());
        let mut l = Lexer::new(input);
        assert_eq!(tok(&mut l), Token::Keyword(Keyword::Comment));
        assert_eq!(
            tok(&mut l),
            Token::AnyNonspace("$enddefinitions".to_string())
        );
        assert_eq!(tok(&mut l), Token::KwEndSpecial);
        assert_eq!(tok(&mut l), Token::Keyword(Keyword::EndDefinitions));
        assert_eq!(tok(&mut l), Token::Keyword(Keyword::End));
        assert_eq!(tok(&mut l), Token::Eof);
    }

    #[test]
    fn after_enddefinitions_absorbs_garble() {
        let input = BufReader::new("$enddefinitions $end #10 0V# b1010 !".as_bytes());
        let mut l = Lexer::new(input);
        assert_eq!(tok(&mut l), Token::Keyword(Keyword::EndDefinitions));
        assert_eq!(tok(&mut l), Token::Keyword(Keyword::End));
        assert_eq!(tok(&mut l), Token::Timestamp(10));
        assert_eq!(tok(&mut l), Token::IdCode("0V#".to_string()));
        assert_eq!(tok(&mut l), Token::Binstring("1010".to_string()));
        assert_eq!(tok(&mut l), Token::IdCode("!".to_string()));
        assert_eq!(tok(&mut l), Token::Eof);
    }

    #[test]
    fn empty_lines_skipped() {
        let input = BufReader::new("   \n\n$end".as_bytes());
        let mut l = Lexer::new(input);
        assert_eq!(tok(&mut l), Token::Keyword(Keyword::End));
        assert_eq!(tok(&mut l), Token::Eof);
    }

    #[test]
    fn malformed_timestamp_is_lex_error() {
        let input = BufReader::new("#notanumber".as_bytes());
        let mut l = Lexer::new(input);
        let err = l.next_token().unwrap_err();
        assert_eq!(err.lexeme, "#notanumber");
    }
}
