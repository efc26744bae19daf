// Quoppa, a minimal vau-calculus Lisp.

// SPDX-FileCopyrightText: © 2024 Quoppa contributors
// SPDX-License-Identifier: AGPL-3.0-only

// Quoppa is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/vau/symtab.rs

// A table to associate symbol names with efficient internal IDs.

// <>

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

/// An interned symbol; two symbols with the same normalized name
/// always carry the same ID
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(u32);

/// Bidirectional name <-> ID map backing every [`Symbol`]
pub struct SymbolTable {
    id_to_nm: Vec<Arc<str>>,
    nm_to_id: HashMap<Arc<str>, u32>,
}

impl SymbolTable {
    fn new(approx_cap: usize) -> Self {
        Self {
            id_to_nm: Vec::with_capacity(approx_cap),
            nm_to_id: HashMap::with_capacity(approx_cap),
        }
    }

    /// Looks up a name, inserting it with the next available ID if
    /// it is not present yet. Names must already be normalized.
    fn get_id(&mut self, name: &str) -> u32 {
        if let Some(id) = self.nm_to_id.get(name) {
            return *id;
        }

        let id = self.id_to_nm.len() as u32;
        let name: Arc<str> = Arc::from(name);
        self.id_to_nm.push(name.clone());
        self.nm_to_id.insert(name, id);

        assert!(id < (1u32 << 31));
        id
    }

    fn lookup_by_id(&self, id: u32) -> Option<Arc<str>> {
        self.id_to_nm.get(id as usize).cloned()
    }

    fn lookup_by_name(&self, name: &str) -> Option<u32> {
        self.nm_to_id.get(name).copied()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.id_to_nm.len()
    }
}

fn symtab() -> &'static Mutex<SymbolTable> {
    static SYMTAB: OnceLock<Mutex<SymbolTable>> = OnceLock::new();
    SYMTAB.get_or_init(|| Mutex::new(SymbolTable::new(256)))
}

fn with_symtab<T>(f: impl FnOnce(&mut SymbolTable) -> T) -> T {
    // a panic while holding the lock cannot leave the table half-written
    let mut tab = match symtab().lock() {
        Ok(tab) => tab,
        Err(poisoned) => poisoned.into_inner(),
    };
    f(&mut tab)
}

/// Interns `name` (case-insensitively) and returns its symbol
pub fn symbol(name: &str) -> Symbol {
    let name = name.to_lowercase();
    Symbol(with_symtab(|tab| tab.get_id(&name)))
}

/// Returns the symbol for `name` only if it has been interned before
pub fn existing_symbol(name: &str) -> Option<Symbol> {
    let name = name.to_lowercase();
    with_symtab(|tab| tab.lookup_by_name(&name)).map(Symbol)
}

/// The discard symbol `_`, interned once
fn discard_symbol() -> Symbol {
    static WILDCARD: OnceLock<Symbol> = OnceLock::new();
    *WILDCARD.get_or_init(|| symbol("_"))
}

impl Symbol {
    pub fn name(self) -> Arc<str> {
        with_symtab(|tab| tab.lookup_by_id(self.0)).unwrap_or_else(|| Arc::from("#<unknown>"))
    }

    /// Whether this is the discard symbol `_`, which never binds
    pub fn is_wildcard(self) -> bool {
        self == discard_symbol()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.name())
    }
}
