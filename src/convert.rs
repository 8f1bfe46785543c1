// SPDX-License-Identifier: MIT
//! Single-pass streaming transform from the VCD AST into the Signal Store
//! (component D). Grounded on `cvt/pkg.go`'s `Convert`: a scope stack, a
//! running simulation timestamp, and periodic transaction commits.

use crate::store::{Store, StoreError};
use crate::vcd::ast::{DeclarationCommand, File, SimulationCommand, TimeUnit, ValueChange};
use serde::Deserialize;

/// Replaces the reference implementation's process-global `MaxTx` (see
/// `SPEC_FULL.md` §9): threaded in through the constructor instead of read
/// from ambient mutable state.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ConverterOptions {
    pub max_tx: usize,
}

impl Default for ConverterOptions {
    fn default() -> ConverterOptions {
        ConverterOptions { max_tx: 1_000_000 }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("conversion failed: {0}")]
pub struct ConvertError(#[from] pub StoreError);

pub struct Converter<'a> {
    store: &'a Store,
    options: ConverterOptions,
    scope: Vec<String>,
    timestamp: i64,
    op_count: usize,
    timescale_resolved: bool,
}

impl<'a> Converter<'a> {
    pub fn new(store: &'a Store, options: ConverterOptions) -> Converter<'a> {
        Converter {
            store,
            options,
            scope: Vec::new(),
            timestamp: 0,
            op_count: 0,
            timescale_resolved: false,
        }
    }

    /// Renders the fully-qualified name for a declared variable: `/` plus
    /// the scope path plus the identifier and its index suffixes, all
    /// joined by `/` — matching the concrete scenario in `SPEC_FULL.md` §8
    /// rather than the ambiguous double-slash in its prose description
    /// (see `DESIGN.md`).
    fn render_name(&self, id: &crate::vcd::ast::IdT) -> String {
        let mut segments: Vec<&str> = self.scope.iter().map(String::as_str).collect();
        let rendered = id.to_string();
        segments.push(&rendered);
        format!("/{}", segments.join("/"))
    }

    fn bump_tx_counter(&mut self, tx: &mut Option<rusqlite::Transaction<'a>>) -> Result<(), StoreError> {
        self.op_count += 1;
        if self.op_count >= self.options.max_tx {
            if let Some(t) = tx.take() {
                t.commit().map_err(StoreError::Transaction)?;
            }
            *tx = Some(self.store.begin()?);
            self.op_count = 0;
        }
        Ok(())
    }

    fn record_timescale(&mut self, number: i64, unit: TimeUnit) -> Result<(), StoreError> {
        if self.timescale_resolved {
            return Ok(());
        }
        self.timescale_resolved = true;
        let seconds_per_tick = number as f64 * unit.multiplier();
        self.store.set_meta("timescale_unit", &format!("{:?}", unit))?;
        self.store
            .set_meta("timescale_seconds_per_tick", &seconds_per_tick.to_string())
    }

    fn convert_declarations(&mut self, declarations: &[DeclarationCommand]) -> Result<(), StoreError> {
        let mut tx = Some(self.store.begin()?);
        for decl in declarations {
            match decl {
                DeclarationCommand::Var { var_type, size, code, id } => {
                    let name = self.render_name(id);
                    self.store.insert_signal(&name, var_type.as_i32(), code, *size)?;
                    self.bump_tx_counter(&mut tx)?;
                }
                DeclarationCommand::Scope { id, .. } => {
                    self.scope.push(id.clone());
                }
                DeclarationCommand::Upscope => {
                    // Pops exactly one entry — the reference pops two, an
                    // anomaly resolved here per SPEC_FULL.md §9.
                    self.scope.pop();
                }
                DeclarationCommand::Timescale { number, unit } => {
                    self.record_timescale(*number, *unit)?;
                }
                DeclarationCommand::EndDefinitions => break,
                _ => {}
            }
        }
        if let Some(t) = tx.take() {
            t.commit().map_err(StoreError::Transaction)?;
        }
        Ok(())
    }

    fn insert_value_change(
        &mut self,
        vc: &ValueChange,
        tx: &mut Option<rusqlite::Transaction<'a>>,
    ) -> Result<(), StoreError> {
        self.store
            .insert_value(self.timestamp, vc.get_id_code(), &vc.get_value())?;
        self.bump_tx_counter(tx)
    }

    fn convert_simulations(&mut self, simulations: &[SimulationCommand]) -> Result<(), StoreError> {
        let mut tx = Some(self.store.begin()?);
        for cmd in simulations {
            match cmd {
                SimulationCommand::SimulationTime { time } => {
                    self.timestamp = *time as i64;
                }
                SimulationCommand::Dumpall { value_changes }
                | SimulationCommand::Dumpon { value_changes }
                | SimulationCommand::Dumpoff { value_changes }
                | SimulationCommand::Dumpvars { value_changes } => {
                    for vc in value_changes {
                        self.insert_value_change(vc, &mut tx)?;
                    }
                }
                SimulationCommand::ValueChange { value_change } => {
                    self.insert_value_change(value_change, &mut tx)?;
                }
                SimulationCommand::AttrBegin { .. } | SimulationCommand::AttrEnd { .. } => {}
            }
        }
        if let Some(t) = tx.take() {
            t.commit().map_err(StoreError::Transaction)?;
        }
        Ok(())
    }

    /// Streams `file` into the store. Any store error aborts conversion;
    /// the currently-open (uncommitted) transaction is dropped, rolling
    /// back its partial inserts.
    pub fn convert(mut self, file: &File) -> Result<(), ConvertError> {
        self.convert_declarations(&file.declarations)?;
        self.convert_simulations(&file.simulations)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::Store;
    use crate::vcd;
    use std::io::BufReader;

    fn convert_str(src: &str, options: ConverterOptions) -> Store {
        let file = vcd::parse(BufReader::new(src.as_bytes())).unwrap();
        let store = Store::open_in_memory().unwrap();
        Converter::new(&store, options).convert(&file).unwrap();
        store
    }

    const SAMPLE: &str = "$scope module top $end \
        $var logic 1 ! clk $end \
        $var logic 8 :! mem[48][7:0] $end \
        $upscope $end $enddefinitions $end \
        #10 1! #20 b00001111 :!";

    #[test]
    fn scalar_and_vector_roundtrip() {
        let store = convert_str(SAMPLE, ConverterOptions::default());
        let clk = store.find_signal_by_name("/top/clk").unwrap().unwrap();
        assert_eq!(clk.code, "!");
        assert_eq!(clk.size, 1);
        let mem = store
            .find_signal_by_name("/top/mem[48][7:0]")
            .unwrap()
            .unwrap();
        assert_eq!(mem.code, ":!");
        assert_eq!(mem.size, 8);
    }

    #[test]
    fn max_tx_does_not_change_contents() {
        let store_a = convert_str(SAMPLE, ConverterOptions { max_tx: 1 });
        let store_b = convert_str(SAMPLE, ConverterOptions { max_tx: 1_000_000 });
        assert_eq!(store_a.all_signals().unwrap(), store_b.all_signals().unwrap());
    }

    #[test]
    fn upscope_pops_exactly_one() {
        let store = convert_str(
            "$scope module top $end $scope module inner $end \
             $var wire 1 ! a $end $upscope $end \
             $var wire 1 # b $end $upscope $end $enddefinitions $end",
            ConverterOptions::default(),
        );
        assert!(store.find_signal_by_name("/top/inner/a").unwrap().is_some());
        assert!(store.find_signal_by_name("/top/b").unwrap().is_some());
    }

    #[test]
    fn first_timescale_wins() {
        let store = convert_str(
            "$timescale 1 ns $end $enddefinitions $end",
            ConverterOptions::default(),
        );
        assert_eq!(
            store.get_meta("timescale_unit").unwrap(),
            Some("Ns".to_string())
        );
    }
}
