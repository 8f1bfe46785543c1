// SPDX-License-Identifier: MIT
use super::ast::*;
use super::error::{CaptureError, ParseError, VcdError};
use super::lexer::Lexer;
use super::token::{Keyword, Token};
use std::io::prelude::*;

macro_rules! parse_error {
    ($parser:ident, $msg:expr) => {
        Err(VcdError::Parse(ParseError {
            line: $parser.lexer.line(),
            message: $msg.to_string(),
        }))
    };
}

pub(crate) struct Parser<I: BufRead> {
    lexer: Lexer<I>,
    lookahead: Option<Token>,
}

impl<I: BufRead> Parser<I> {
    pub(crate) fn new(input: I) -> Parser<I> {
        Parser {
            lexer: Lexer::new(input),
            lookahead: None,
        }
    }

    fn bump(&mut self) -> Result<Token, VcdError> {
        if let Some(tok) = self.lookahead.take() {
            return Ok(tok);
        }
        Ok(self.lexer.next_token()?)
    }

    fn peek(&mut self) -> Result<&Token, VcdError> {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.lexer.next_token()?);
        }
        Ok(self.lookahead.as_ref().unwrap())
    }

    fn expect_end(&mut self) -> Result<(), VcdError> {
        match self.bump()? {
            Token::Keyword(Keyword::End) => Ok(()),
            _ => parse_error!(self, "expected $end"),
        }
    }

    /// Consumes `AnyNonspace` tokens until `KwEndSpecial`, joining them with
    /// a single space — used for `$date`/`$comment`/`$version`/`$attrbegin`/
    /// `$attrend` free-form bodies.
    fn parse_free_form_text(&mut self) -> Result<String, VcdError> {
        let mut words = Vec::new();
        loop {
            match self.bump()? {
                Token::AnyNonspace(w) => words.push(w),
                Token::KwEndSpecial => break,
                _ => return parse_error!(self, "expected free-form text or $end"),
            }
        }
        Ok(words.join(" "))
    }

    fn parse_scope(&mut self) -> Result<DeclarationCommand, VcdError> {
        let kind = match self.bump()? {
            Token::Ident(w) => ScopeKind::from_str(&w),
            _ => return parse_error!(self, "expected scope type"),
        };
        let id = match self.bump()? {
            Token::Ident(w) => w,
            _ => return parse_error!(self, "expected scope id"),
        };
        self.expect_end()?;
        Ok(DeclarationCommand::Scope { scope_kind: kind, id })
    }

    fn parse_timescale(&mut self) -> Result<DeclarationCommand, VcdError> {
        let first = self.bump()?;
        let (number, unit) = match first {
            Token::Int(n) => match self.bump()? {
                Token::Ident(w) => {
                    let unit = TimeUnit::from_suffix(&w)
                        .ok_or_else(|| VcdError::Parse(ParseError {
                            line: self.lexer.line(),
                            message: format!("unknown timescale unit {:?}", w),
                        }))?;
                    (n, unit)
                }
                _ => return parse_error!(self, "expected timescale unit"),
            },
            Token::Ident(w) => split_timescale_word(&w).ok_or_else(|| {
                VcdError::Parse(ParseError {
                    line: self.lexer.line(),
                    message: format!("malformed timescale {:?}", w),
                })
            })?,
            _ => return parse_error!(self, "expected timescale"),
        };
        self.expect_end()?;
        Ok(DeclarationCommand::Timescale { number, unit })
    }

    fn parse_var(&mut self) -> Result<DeclarationCommand, VcdError> {
        let mut tokens = vec!["$var".to_string()];
        loop {
            match self.bump()? {
                Token::AnyNonspace(w) => tokens.push(w),
                Token::KwEndSpecial => break,
                _ => return parse_error!(self, "expected $var body or $end"),
            }
        }
        let (var_type, size, code, id) =
            capture_var(&tokens).map_err(VcdError::Capture)?;
        Ok(DeclarationCommand::Var {
            var_type,
            size,
            code,
            id,
        })
    }

    fn parse_declaration(&mut self, tok: Token) -> Result<Option<DeclarationCommand>, VcdError> {
        match tok {
            Token::Keyword(Keyword::Comment) => {
                Ok(Some(DeclarationCommand::Comment { text: self.parse_free_form_text()? }))
            }
            Token::Keyword(Keyword::Date) => {
                Ok(Some(DeclarationCommand::Date { text: self.parse_free_form_text()? }))
            }
            Token::Keyword(Keyword::Version) => {
                Ok(Some(DeclarationCommand::Version { text: self.parse_free_form_text()? }))
            }
            Token::Keyword(Keyword::AttrBegin) => {
                Ok(Some(DeclarationCommand::AttrBegin { text: self.parse_free_form_text()? }))
            }
            Token::Keyword(Keyword::AttrEnd) => {
                Ok(Some(DeclarationCommand::AttrEnd { text: self.parse_free_form_text()? }))
            }
            Token::Keyword(Keyword::Scope) => Ok(Some(self.parse_scope()?)),
            Token::Keyword(Keyword::Upscope) => {
                self.expect_end()?;
                Ok(Some(DeclarationCommand::Upscope))
            }
            Token::Keyword(Keyword::Timescale) => Ok(Some(self.parse_timescale()?)),
            Token::Keyword(Keyword::Var) => Ok(Some(self.parse_var()?)),
            Token::Keyword(Keyword::EndDefinitions) => {
                self.expect_end()?;
                Ok(Some(DeclarationCommand::EndDefinitions))
            }
            _ => parse_error!(self, "unexpected token in declarations"),
        }
    }

    fn parse_value_change(&mut self, tok: Token) -> Result<ValueChange, VcdError> {
        match tok {
            Token::Binstring(bits) => {
                let code = self.expect_code()?;
                Ok(ValueChange::VectorBin { bits, code })
            }
            Token::RealString(v) => {
                let code = self.expect_code()?;
                let value: f64 = v.parse().map_err(|_| {
                    VcdError::Parse(ParseError {
                        line: self.lexer.line(),
                        message: format!("malformed real value {:?}", v),
                    })
                })?;
                Ok(ValueChange::VectorReal { value, code })
            }
            Token::StateString(label) => {
                let code = self.expect_code()?;
                Ok(ValueChange::VectorState { label, code })
            }
            Token::IdCode(s) => {
                let first = s.chars().next().unwrap();
                if !"01xXzZ".contains(first) {
                    return parse_error!(self, format!("invalid scalar value {:?}", s));
                }
                if s.len() == 1 {
                    if let Token::IdCode(_) = self.peek()? {
                        let code = self.expect_code()?;
                        return Ok(ValueChange::Scalar { value: first, code });
                    }
                }
                Ok(ValueChange::Scalar {
                    value: first,
                    code: s[first.len_utf8()..].to_string(),
                })
            }
            _ => parse_error!(self, "expected value change"),
        }
    }

    fn expect_code(&mut self) -> Result<String, VcdError> {
        match self.bump()? {
            Token::IdCode(code) => Ok(code),
            _ => parse_error!(self, "expected identifier code"),
        }
    }

    fn parse_dump_block(&mut self) -> Result<Vec<ValueChange>, VcdError> {
        let mut changes = Vec::new();
        loop {
            match self.bump()? {
                Token::Keyword(Keyword::End) => break,
                tok => changes.push(self.parse_value_change(tok)?),
            }
        }
        Ok(changes)
    }

    fn parse_simulation(&mut self, tok: Token) -> Result<Option<SimulationCommand>, VcdError> {
        match tok {
            Token::Timestamp(t) => Ok(Some(SimulationCommand::SimulationTime { time: t })),
            Token::Keyword(Keyword::DumpAll) => Ok(Some(SimulationCommand::Dumpall {
                value_changes: self.parse_dump_block()?,
            })),
            Token::Keyword(Keyword::DumpOn) => Ok(Some(SimulationCommand::Dumpon {
                value_changes: self.parse_dump_block()?,
            })),
            Token::Keyword(Keyword::DumpOff) => Ok(Some(SimulationCommand::Dumpoff {
                value_changes: self.parse_dump_block()?,
            })),
            Token::Keyword(Keyword::DumpVars) => Ok(Some(SimulationCommand::Dumpvars {
                value_changes: self.parse_dump_block()?,
            })),
            Token::Keyword(Keyword::AttrBegin) => Ok(Some(SimulationCommand::AttrBegin {
                text: self.parse_free_form_text()?,
            })),
            Token::Keyword(Keyword::AttrEnd) => Ok(Some(SimulationCommand::AttrEnd {
                text: self.parse_free_form_text()?,
            })),
            Token::Keyword(Keyword::Comment) => {
                self.parse_free_form_text()?;
                Ok(None)
            }
            other => Ok(Some(SimulationCommand::ValueChange {
                value_change: self.parse_value_change(other)?,
            })),
        }
    }

    pub(crate) fn parse(mut self) -> Result<File, VcdError> {
        let mut declarations = Vec::new();
        loop {
            match self.bump()? {
                Token::Eof => return Ok(File { declarations, simulations: Vec::new() }),
                tok => {
                    let ends_declarations = matches!(tok, Token::Keyword(Keyword::EndDefinitions));
                    if let Some(decl) = self.parse_declaration(tok)? {
                        declarations.push(decl);
                    }
                    if ends_declarations {
                        break;
                    }
                }
            }
        }

        let mut simulations = Vec::new();
        loop {
            match self.bump()? {
                Token::Eof => break,
                tok => {
                    if let Some(cmd) = self.parse_simulation(tok)? {
                        simulations.push(cmd);
                    }
                }
            }
        }
        Ok(File { declarations, simulations })
    }
}

/// Splits a merged `<digits><unit>` timescale word, e.g. `"100ps"`.
fn split_timescale_word(word: &str) -> Option<(i64, TimeUnit)> {
    let end = word.find(|c: char| !c.is_ascii_digit())?;
    let unit = TimeUnit::from_suffix(&word[end..])?;
    let number = if end == 0 { 1 } else { word[..end].parse().ok()? };
    Some((number, unit))
}

/// Capture hook for `VarT` (§4.B). `tokens` is positionally interpreted:
/// #1 must be `"$var"`; #2 the var type; #3 the bit size; #4 the code;
/// #5.. joined without separator and handed to the nested identifier parser.
fn capture_var(tokens: &[String]) -> Result<(VarKind, i32, String, IdT), CaptureError> {
    if tokens.first().map(String::as_str) != Some("$var") {
        return Err(CaptureError {
            token_index: 1,
            reason: "expected literal $var".to_string(),
        });
    }
    let var_type_word = tokens.get(1).ok_or_else(|| CaptureError {
        token_index: 2,
        reason: "missing var type".to_string(),
    })?;
    let var_type = VarKind::from_str(var_type_word);
    if var_type == VarKind::Unknown {
        return Err(CaptureError {
            token_index: 2,
            reason: format!("unknown var type {:?}", var_type_word),
        });
    }
    let size: i32 = tokens
        .get(2)
        .ok_or_else(|| CaptureError {
            token_index: 3,
            reason: "missing size".to_string(),
        })?
        .parse()
        .map_err(|_| CaptureError {
            token_index: 3,
            reason: "malformed size".to_string(),
        })?;
    let code = tokens
        .get(3)
        .ok_or_else(|| CaptureError {
            token_index: 4,
            reason: "missing code".to_string(),
        })?
        .clone();
    let joined: String = tokens[4.min(tokens.len())..].concat();
    let id = parse_nested_id(&joined).ok_or_else(|| CaptureError {
        token_index: 5,
        reason: format!("malformed identifier {:?}", joined),
    })?;
    Ok((var_type, size, code, id))
}

/// Nested identifier sub-grammar: `Ident (('[' Int ']') | ('[' Int ':' Int ']'))*`.
fn parse_nested_id(s: &str) -> Option<IdT> {
    let split_at = s.find('[').unwrap_or(s.len());
    let name = s[..split_at].to_string();
    if name.is_empty() {
        return None;
    }
    let mut indices = Vec::new();
    let mut remaining = &s[split_at..];
    while let Some(stripped) = remaining.strip_prefix('[') {
        let close = stripped.find(']')?;
        let inner = &stripped[..close];
        if let Some((msb, lsb)) = inner.split_once(':') {
            indices.push(Idx::Range {
                msb: msb.parse().ok()?,
                lsb: lsb.parse().ok()?,
            });
        } else {
            indices.push(Idx::Single {
                index: inner.parse().ok()?,
            });
        }
        remaining = &stripped[close + 1..];
    }
    if !remaining.is_empty() {
        return None;
    }
    Some(IdT { name, indices })
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::BufReader;

    fn parse(src: &str) -> File {
        Parser::new(BufReader::new(src.as_bytes())).parse().unwrap()
    }

    #[test]
    fn header_only() {
        let file = parse("$comment\nAny comment text.\n$end");
        assert_eq!(
            file.declarations,
            vec![DeclarationCommand::Comment {
                text: "Any comment text.".to_string()
            }]
        );
    }

    #[test]
    fn nested_id_with_repeated_indices() {
        let id = parse_nested_id("mem[48][7:0]").unwrap();
        assert_eq!(id.name, "mem");
        assert_eq!(
            id.indices,
            vec![Idx::Single { index: 48 }, Idx::Range { msb: 7, lsb: 0 }]
        );
    }

    #[test]
    fn scalar_and_vector_roundtrip() {
        let file = parse(
            "$scope module top $end \
             $var logic 1 ! clk $end \
             $var logic 8 :! mem[48][7:0] $end \
             $upscope $end $enddefinitions $end \
             #10 1! #20 b00001111 :!",
        );
        assert_eq!(
            file.declarations[0],
            DeclarationCommand::Scope {
                scope_kind: ScopeKind::Module,
                id: "top".to_string()
            }
        );
        assert!(matches!(
            file.declarations[1],
            DeclarationCommand::Var { ref code, .. } if code == "!"
        ));
        assert_eq!(
            file.simulations[1],
            SimulationCommand::ValueChange {
                value_change: ValueChange::Scalar {
                    value: '1',
                    code: "!".to_string()
                }
            }
        );
        assert_eq!(
            file.simulations[3],
            SimulationCommand::ValueChange {
                value_change: ValueChange::VectorBin {
                    bits: "00001111".to_string(),
                    code: ":!".to_string()
                }
            }
        );
    }

    #[test]
    fn garble_split() {
        let file = parse("$enddefinitions $end $dumpvars 0V# $end");
        assert_eq!(
            file.simulations,
            vec![SimulationCommand::Dumpvars {
                value_changes: vec![ValueChange::Scalar {
                    value: '0',
                    code: "V#".to_string()
                }]
            }]
        );
    }

    #[test]
    fn comment_hides_nested_enddefinitions() {
        let file = parse("$comment $enddefinitions $end $enddefinitions $end");
        let count = file
            .declarations
            .iter()
            .filter(|d| matches!(d, DeclarationCommand::EndDefinitions))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn state_string_change() {
        let file = parse("$enddefinitions $end srx_get_start_bit ^");
        assert_eq!(
            file.simulations,
            vec![SimulationCommand::ValueChange {
                value_change: ValueChange::VectorState {
                    label: "rx_get_start_bit".to_string(),
                    code: "^".to_string()
                }
            }]
        );
    }

    #[test]
    fn fail_on_bare_end() {
        let err = Parser::new(BufReader::new("$end".as_bytes())).parse();
        assert!(err.is_err());
    }
}
