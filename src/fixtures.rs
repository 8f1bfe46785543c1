// SPDX-License-Identifier: MIT
//! Test-support builders for assembling a populated [`Store`] without going
//! through a VCD file (component G). Grounded on `dbt/pkg.go`'s `NewMemDB`
//! and its `Instance`/`Signal` builders.

use crate::store::Store;

/// Base-36 code generator, mirroring `dbt/pkg.go`'s scheme for producing
/// short, collision-free `Svalues.Code` values inside a single fixture.
fn code_for(index: usize) -> String {
    let mut n = index + 1;
    let mut chars = Vec::new();
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    while n > 0 {
        chars.push(ALPHABET[n % 36]);
        n /= 36;
    }
    if chars.is_empty() {
        chars.push(ALPHABET[0]);
    }
    chars.reverse();
    String::from_utf8(chars).unwrap()
}

/// A fresh in-memory [`Store`], plus the next unused fixture code.
pub struct Instance {
    pub store: Store,
    next_code: usize,
}

impl Instance {
    pub fn new() -> Instance {
        Instance {
            store: Store::open_in_memory().expect("in-memory store must open"),
            next_code: 0,
        }
    }

    /// Declares a signal and returns a builder for populating its history.
    pub fn signal(&mut self, name: &str, size: i32) -> SignalBuilder<'_> {
        let code = code_for(self.next_code);
        self.next_code += 1;
        self.store
            .insert_signal(name, 0, &code, size)
            .expect("fixture signal insert must succeed");
        SignalBuilder {
            store: &self.store,
            code,
        }
    }
}

impl Default for Instance {
    fn default() -> Instance {
        Instance::new()
    }
}

/// Appends value changes for one signal. Panics on misuse, matching a
/// test-only builder's contract: a malformed fixture is a bug in the test,
/// not a runtime condition to recover from.
pub struct SignalBuilder<'a> {
    store: &'a Store,
    code: String,
}

impl<'a> SignalBuilder<'a> {
    /// Records `value` taking hold at `timestamp`. Returns `self` so calls
    /// chain: `.at(0, "0").at(5, "1").at(10, "0")`.
    pub fn at(self, timestamp: i64, value: &str) -> Self {
        self.store
            .insert_value(timestamp, &self.code, value)
            .expect("fixture value insert must succeed");
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builds_a_queryable_signal() {
        let mut instance = Instance::new();
        instance.signal("/top/clk", 1).at(0, "0").at(5, "1").at(10, "0");
        let row = instance.store.find_signal_by_name("/top/clk").unwrap().unwrap();
        assert_eq!(row.size, 1);
    }

    #[test]
    fn codes_do_not_collide() {
        let mut instance = Instance::new();
        let a = instance.signal("/top/a", 1).code().to_string();
        let b = instance.signal("/top/b", 1).code().to_string();
        assert_ne!(a, b);
    }
}
