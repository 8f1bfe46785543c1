// SPDX-License-Identifier: MIT
//! Hand-written CSV emission of a store's signal catalogue. No `csv` crate:
//! the rows are fixed-shape and small enough that one doesn't pay for itself.

use crate::store::{Store, StoreError};
use std::io::Write;

/// Writes `(name, type, size)` for every signal in `store`, one per line,
/// comma-separated. Field values never contain commas or quotes (signal
/// names are slash-joined identifiers, types and sizes are plain integers)
/// so no escaping is needed.
pub fn write_csv<W: Write>(store: &Store, mut out: W) -> Result<(), StoreError> {
    writeln!(out, "name,type,size").map_err(io_to_query)?;
    for signal in store.all_signals()? {
        writeln!(out, "{},{},{}", signal.name, signal.var_type, signal.size).map_err(io_to_query)?;
    }
    Ok(())
}

fn io_to_query(err: std::io::Error) -> StoreError {
    StoreError::Query(rusqlite::Error::ToSqlConversionFailure(Box::new(err)))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn emits_header_and_rows() {
        let store = Store::open_in_memory().unwrap();
        store.insert_signal("/top/clk", 0, "!", 1).unwrap();
        let mut buf = Vec::new();
        write_csv(&store, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "name,type,size\n/top/clk,0,1\n");
    }
}
