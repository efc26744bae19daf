// Quoppa, a minimal vau-calculus Lisp.

// SPDX-FileCopyrightText: © 2024 Quoppa contributors
// SPDX-License-Identifier: AGPL-3.0-only

// Quoppa is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/vau/frame.rs

// Environments: chained mutable frames of bindings. Each frame keeps
// one authoritative symbol map and can also present itself as a list
// of `(symbol value)` entries that in-language code may extend.

// <>

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;

use indexmap::IndexMap;

use super::core::{release, Pair, PairRole, Value};
use super::error::{Error, Result};
use super::symtab::Symbol;

/// One binding, held as the cells the pair view hands out
struct Binding {
    /// `(symbol value)`
    entry: Pair,
    /// `(value)`, the cdr of `entry`
    slot: Pair,
}

impl Binding {
    fn new(sym: Symbol, value: Value) -> Self {
        let slot = Pair::with_role(value, Value::Nil, PairRole::Slot);
        let entry = Pair::with_role(Value::Symbol(sym), Value::Pair(slot.clone()), PairRole::Entry);
        Binding { entry, slot }
    }

    fn release(&self) {
        self.entry.set_role(PairRole::Plain);
        self.slot.set_role(PairRole::Plain);
    }
}

pub struct Frame {
    /// Bindings of this level, oldest first
    slots: RefCell<IndexMap<Symbol, Binding>>,
    /// Binding list handed out by `car`, built on first request and
    /// then kept in step with `slots`
    view: RefCell<Option<Value>>,
    parent: Option<Env>,
}

impl Frame {
    /// Moves out everything this frame holds
    fn take_contents(&mut self, out: &mut Vec<Value>) {
        for (_, binding) in self.slots.get_mut().drain(..) {
            out.push(Value::Pair(binding.entry));
            out.push(Value::Pair(binding.slot));
        }
        if let Some(view) = self.view.get_mut().take() {
            out.push(view);
        }
        if let Some(parent) = self.parent.take() {
            out.push(Value::Env(parent));
        }
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        // bound closures and parents go through the shared worklist
        let mut pending = Vec::new();
        self.take_contents(&mut pending);
        release(pending);
    }
}

/// Shared handle to a frame; clones refer to the same frame
#[derive(Clone)]
pub struct Env(Rc<Frame>);

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<environment {:p}>", Rc::as_ptr(&self.0))
    }
}

impl Env {
    /// Creates an empty frame chained to `parent`
    pub fn new(parent: Option<&Env>) -> Self {
        Env(Rc::new(Frame {
            slots: RefCell::new(IndexMap::new()),
            view: RefCell::new(None),
            parent: parent.cloned(),
        }))
    }

    /// Drops this handle. When it was the last one, the frame's
    /// contents are handed to `out` instead of being dropped in place.
    pub(crate) fn dismantle(self, out: &mut Vec<Value>) {
        if let Ok(mut frame) = Rc::try_unwrap(self.0) {
            frame.take_contents(out);
        }
    }

    pub fn parent(&self) -> Option<&Env> {
        self.0.parent.as_ref()
    }

    pub fn ptr_eq(&self, other: &Env) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of bindings at this level only
    pub fn len(&self) -> usize {
        self.0.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts or overwrites `sym` at this level. Binding `_` does
    /// nothing.
    pub fn bind(&self, sym: Symbol, value: Value) {
        if sym.is_wildcard() {
            return;
        }

        let mut slots = self.0.slots.borrow_mut();
        if let Some(binding) = slots.get(&sym) {
            binding.slot.replace_car(value);
            return;
        }

        let binding = Binding::new(sym, value);
        if let Some(view) = self.0.view.borrow_mut().as_mut() {
            let rest = mem::replace(view, Value::Nil);
            *view = spine(binding.entry.clone(), rest);
        }
        slots.insert(sym, binding);
    }

    /// Value bound to `sym` at this level, ignoring enclosing frames
    pub fn lookup_local(&self, sym: Symbol) -> Option<Value> {
        self.0.slots.borrow().get(&sym).map(|b| b.slot.car())
    }

    /// Resolves `sym` here or in the nearest enclosing frame that binds it
    pub fn lookup(&self, sym: Symbol) -> Result<Value> {
        let mut env = self;
        loop {
            if let Some(value) = env.lookup_local(sym) {
                return Ok(value);
            }
            match env.parent() {
                Some(parent) => env = parent,
                None => return Err(Error::Lookup(sym.to_string())),
            }
        }
    }

    /// The binding list of this frame, newest entry first. Repeated
    /// calls return the same cells until the frame changes.
    pub fn bindings_view(&self) -> Value {
        let mut view = self.0.view.borrow_mut();
        if let Some(list) = view.as_ref() {
            return list.clone();
        }

        let list = self
            .0
            .slots
            .borrow()
            .values()
            .fold(Value::Nil, |rest, b| spine(b.entry.clone(), rest));
        *view = Some(list.clone());
        list
    }

    /// The enclosing environment, or `()` at the root
    pub fn parent_view(&self) -> Value {
        match self.parent() {
            Some(parent) => Value::Env(parent.clone()),
            None => Value::Nil,
        }
    }

    /// `set-car!` on the environment. `new_list` must be a fresh cell
    /// whose car is a `(symbol value)` entry and whose cdr is the
    /// current binding list; the entry becomes the binding for that
    /// symbol at this level.
    pub fn graft(&self, new_list: Value) -> Result<()> {
        let current = self.bindings_view();

        let spine_cell = match &new_list {
            Value::Pair(p) if p.role() == PairRole::Plain => p.clone(),
            Value::Pair(_) => {
                return Err(Error::consistency(
                    "binding list cell already belongs to an environment",
                ))
            }
            other => {
                return Err(Error::consistency(format!(
                    "cannot replace bindings with {}",
                    other
                )))
            }
        };

        if !spine_cell.cdr().is_eq(&current) {
            return Err(Error::consistency(
                "new binding must extend the current binding list",
            ));
        }

        let (sym, entry, slot) = entry_parts(&spine_cell.car())?;

        spine_cell.set_role(PairRole::Spine);
        if !sym.is_wildcard() {
            entry.set_role(PairRole::Entry);
            slot.set_role(PairRole::Slot);
            let mut slots = self.0.slots.borrow_mut();
            if let Some(old) = slots.insert(sym, Binding { entry, slot }) {
                old.release();
            }
        }

        *self.0.view.borrow_mut() = Some(new_list);
        Ok(())
    }
}

fn spine(entry: Pair, rest: Value) -> Value {
    Value::Pair(Pair::with_role(Value::Pair(entry), rest, PairRole::Spine))
}

/// Splits a candidate `(symbol value)` entry into its symbol and cells
fn entry_parts(candidate: &Value) -> Result<(Symbol, Pair, Pair)> {
    let malformed = || Error::consistency(format!("malformed binding entry {}", candidate));

    let entry = match candidate {
        Value::Pair(p) if p.role() == PairRole::Plain => p.clone(),
        _ => return Err(malformed()),
    };
    let sym = match entry.car() {
        Value::Symbol(s) => s,
        _ => return Err(malformed()),
    };
    let slot = match entry.cdr() {
        Value::Pair(p) if p.role() == PairRole::Plain && p.cdr().nil_p() => p,
        _ => return Err(malformed()),
    };

    Ok((sym, entry, slot))
}
