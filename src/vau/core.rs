// Quoppa, a minimal vau-calculus Lisp.

// SPDX-FileCopyrightText: © 2024 Quoppa contributors
// SPDX-License-Identifier: AGPL-3.0-only

// Quoppa is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/vau/core.rs

// The closed set of values every other part of the interpreter works
// on, with their printed forms and the three equality tiers.

// <>

use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem;
use std::rc::Rc;

use super::error::{Error, Result};
use super::frame::Env;
use super::symtab::{self, Symbol};

/// Host function backing an applicative primitive; receives its
/// already-evaluated arguments
pub type NativeFn = fn(&[Value]) -> Result<Value>;

/// Exact integers and inexact reals; nothing else
#[derive(Clone, Copy, Debug)]
pub enum Number {
    Int(i64),
    Real(f64),
}

impl Number {
    pub fn exact_p(self) -> bool {
        matches!(self, Number::Int(_))
    }

    pub fn to_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Real(r) => r,
        }
    }

    /// Rounds half away from zero. The result is exact unless it falls
    /// outside the range of exact integers, in which case it stays real.
    pub fn round(self) -> Number {
        match self {
            Number::Int(i) => Number::Int(i),
            Number::Real(r) => {
                let int_part = r.trunc();
                let out = if r > 0.0 {
                    if r >= int_part + 0.5 {
                        int_part + 1.0
                    } else {
                        int_part
                    }
                } else if r <= int_part - 0.5 {
                    int_part - 1.0
                } else {
                    int_part
                };

                // i64::MAX as f64 is 2^63, one past the largest exact value
                if out >= i64::MIN as f64 && out < i64::MAX as f64 {
                    Number::Int(out as i64)
                } else {
                    Number::Real(out)
                }
            }
        }
    }

    /// Same exactness and same value
    pub fn eqv(self, other: Number) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (Number::Real(a), Number::Real(b)) => a == b,
            _ => false,
        }
    }

    /// Numeric equality across exactness, as the `=` primitive sees it
    pub fn num_eq(self, other: Number) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            _ => self.to_f64() == other.to_f64(),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            // Debug keeps the trailing ".0" on integral reals
            Number::Real(r) => write!(f, "{:?}", r),
        }
    }
}

/// What a pair cell is currently used for. Cells that make up an
/// environment's binding list belong to that environment and may only
/// be changed in the ways the environment allows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PairRole {
    /// Ordinary user data
    Plain,
    /// Links one binding entry to the next in a frame's binding list
    Spine,
    /// `(symbol value)` entry; its car names the binding
    Entry,
    /// Second cell of an entry; its car is the bound value
    Slot,
}

impl PairRole {
    fn describe(self) -> &'static str {
        match self {
            PairRole::Plain => "plain",
            PairRole::Spine => "binding list",
            PairRole::Entry => "binding entry",
            PairRole::Slot => "binding value",
        }
    }
}

pub struct PairCell {
    car: RefCell<Value>,
    cdr: RefCell<Value>,
    role: Cell<PairRole>,
}

impl Drop for PairCell {
    fn drop(&mut self) {
        let car = mem::replace(self.car.get_mut(), Value::Nil);
        let cdr = mem::replace(self.cdr.get_mut(), Value::Nil);
        let pending: Vec<Value> = [car, cdr].into_iter().filter(Value::owner_p).collect();
        release(pending);
    }
}

/// Drops `pending` and everything only they keep alive, one value at a
/// time. Nested lists, closures and frames are taken apart onto the
/// worklist instead of being dropped recursively, so no structure is too
/// deep to free. Values still shared elsewhere just lose one reference.
pub(crate) fn release(mut pending: Vec<Value>) {
    while let Some(value) = pending.pop() {
        match value {
            Value::Pair(pair) => {
                if let Ok(mut cell) = Rc::try_unwrap(pair.0) {
                    pending.push(mem::replace(cell.car.get_mut(), Value::Nil));
                    pending.push(mem::replace(cell.cdr.get_mut(), Value::Nil));
                }
            }
            Value::Fexpr(fexpr) => {
                if let Ok(Fexpr {
                    params,
                    static_env,
                    body,
                    ..
                }) = Rc::try_unwrap(fexpr)
                {
                    pending.push(params);
                    pending.push(body);
                    pending.push(Value::Env(static_env));
                }
            }
            Value::Env(env) => env.dismantle(&mut pending),
            _ => {}
        }
    }
}

/// A shared, mutable cons cell
#[derive(Clone)]
pub struct Pair(Rc<PairCell>);

impl Pair {
    pub fn new(car: Value, cdr: Value) -> Self {
        Self::with_role(car, cdr, PairRole::Plain)
    }

    pub(crate) fn with_role(car: Value, cdr: Value, role: PairRole) -> Self {
        Pair(Rc::new(PairCell {
            car: RefCell::new(car),
            cdr: RefCell::new(cdr),
            role: Cell::new(role),
        }))
    }

    pub fn car(&self) -> Value {
        self.0.car.borrow().clone()
    }

    pub fn cdr(&self) -> Value {
        self.0.cdr.borrow().clone()
    }

    pub fn role(&self) -> PairRole {
        self.0.role.get()
    }

    pub(crate) fn set_role(&self, role: PairRole) {
        self.0.role.set(role)
    }

    pub fn ptr_eq(&self, other: &Pair) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// `set-car!`; refused on cells owned by a frame, except that the
    /// value cell of a binding may be overwritten
    pub fn set_car(&self, value: Value) -> Result<()> {
        match self.role() {
            PairRole::Plain | PairRole::Slot => {
                self.replace_car(value);
                Ok(())
            }
            role => Err(Error::consistency(format!(
                "set-car! on a {} cell",
                role.describe()
            ))),
        }
    }

    /// `set-cdr!`; refused on every cell owned by a frame
    pub fn set_cdr(&self, value: Value) -> Result<()> {
        match self.role() {
            PairRole::Plain => {
                *self.0.cdr.borrow_mut() = value;
                Ok(())
            }
            role => Err(Error::consistency(format!(
                "set-cdr! on a {} cell",
                role.describe()
            ))),
        }
    }

    pub(crate) fn replace_car(&self, value: Value) {
        *self.0.car.borrow_mut() = value;
    }
}

/// How a primitive operative receives its operands
pub enum PrimKind {
    /// Host function over evaluated arguments
    Native(NativeFn),
    /// The seed operative; gets the raw operand tree and environment
    Vau,
    /// `(eval env term)`, continued inside the evaluator
    Eval,
    /// `(operate env operative operands)`, continued inside the evaluator
    Operate,
    /// `(lookup symbol env)`
    Lookup,
}

pub struct Primitive {
    pub name: Symbol,
    pub kind: PrimKind,
    pub argct: usize,
}

impl Primitive {
    pub fn native(name: &str, fun: NativeFn, argct: usize) -> Self {
        Primitive {
            name: symtab::symbol(name),
            kind: PrimKind::Native(fun),
            argct,
        }
    }

    /// Whether the operands are evaluated before the primitive runs
    pub fn applicative_p(&self) -> bool {
        !matches!(self.kind, PrimKind::Vau)
    }
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<primitive {}>", self.name)
    }
}

/// A compound operative made by `vau`
pub struct Fexpr {
    pub params: Value,
    pub env_param: Symbol,
    pub static_env: Env,
    pub body: Value,
}

/// Every value the language can manipulate
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Symbol(Symbol),
    String(Rc<str>),
    Number(Number),
    Pair(Pair),
    Primitive(Rc<Primitive>),
    Fexpr(Rc<Fexpr>),
    Env(Env),
}

impl Value {
    pub fn sym(name: &str) -> Value {
        Value::Symbol(symtab::symbol(name))
    }

    pub fn string(s: &str) -> Value {
        Value::String(Rc::from(s))
    }

    pub fn int(i: i64) -> Value {
        Value::Number(Number::Int(i))
    }

    pub fn real(r: f64) -> Value {
        Value::Number(Number::Real(r))
    }

    pub fn cons(car: Value, cdr: Value) -> Value {
        Value::Pair(Pair::new(car, cdr))
    }

    /// Builds a proper list
    pub fn list(items: Vec<Value>) -> Value {
        Self::list_with_tail(items, Value::Nil)
    }

    /// Builds a list whose final cdr is `tail`
    pub fn list_with_tail(items: Vec<Value>, tail: Value) -> Value {
        items
            .into_iter()
            .rev()
            .fold(tail, |acc, item| Value::cons(item, acc))
    }

    /// Elements of a proper list, or None for anything else
    pub fn list_to_vec(&self) -> Option<Vec<Value>> {
        let mut out = Vec::new();
        let mut cur = self.clone();
        loop {
            let next = match &cur {
                Value::Nil => return Some(out),
                Value::Pair(p) => p.clone(),
                _ => return None,
            };
            out.push(next.car());
            cur = next.cdr();
        }
    }

    /// Whether dropping this value can free other values
    fn owner_p(&self) -> bool {
        matches!(self, Value::Pair(_) | Value::Fexpr(_) | Value::Env(_))
    }

    pub fn nil_p(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Only `#f` is false
    pub fn truthy(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Symbol(_) => "symbol",
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Pair(_) => "pair",
            Value::Primitive(_) => "primitive",
            Value::Fexpr(_) => "operative",
            Value::Env(_) => "environment",
        }
    }

    pub fn as_symbol(&self, op: &str) -> Result<Symbol> {
        match self {
            Value::Symbol(s) => Ok(*s),
            other => Err(Error::type_mismatch(op, "symbol", other)),
        }
    }

    pub fn as_number(&self, op: &str) -> Result<Number> {
        match self {
            Value::Number(n) => Ok(*n),
            other => Err(Error::type_mismatch(op, "number", other)),
        }
    }

    pub fn as_pair(&self, op: &str) -> Result<&Pair> {
        match self {
            Value::Pair(p) => Ok(p),
            other => Err(Error::type_mismatch(op, "pair", other)),
        }
    }

    /// car of a pair, or the current binding list of an environment
    pub fn car(&self, op: &str) -> Result<Value> {
        match self {
            Value::Pair(p) => Ok(p.car()),
            Value::Env(env) => Ok(env.bindings_view()),
            other => Err(Error::type_mismatch(op, "pair", other)),
        }
    }

    /// cdr of a pair, or the enclosing environment of an environment
    pub fn cdr(&self, op: &str) -> Result<Value> {
        match self {
            Value::Pair(p) => Ok(p.cdr()),
            Value::Env(env) => Ok(env.parent_view()),
            other => Err(Error::type_mismatch(op, "pair", other)),
        }
    }

    /// `set-car!`; on an environment this grafts a new binding
    pub fn set_car(&self, value: Value, op: &str) -> Result<()> {
        match self {
            Value::Pair(p) => p.set_car(value),
            Value::Env(env) => env.graft(value),
            other => Err(Error::type_mismatch(op, "pair", other)),
        }
    }

    pub fn set_cdr(&self, value: Value, op: &str) -> Result<()> {
        match self {
            Value::Pair(p) => p.set_cdr(value),
            Value::Env(_) => Err(Error::consistency(
                "the enclosing environment of a frame cannot be replaced",
            )),
            other => Err(Error::type_mismatch(op, "pair", other)),
        }
    }

    /// Reference identity for strings, pairs, operatives and
    /// environments. Nil, booleans, symbols and numbers are immediates
    /// with no identity of their own and compare by value, so two
    /// separately read `5`s are `eq?` even though they are distinct
    /// literals.
    pub fn is_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a.eqv(*b),
            (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b),
            (Value::Pair(a), Value::Pair(b)) => a.ptr_eq(b),
            (Value::Primitive(a), Value::Primitive(b)) => Rc::ptr_eq(a, b),
            (Value::Fexpr(a), Value::Fexpr(b)) => Rc::ptr_eq(a, b),
            (Value::Env(a), Value::Env(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Same tag and same content; numbers must agree in exactness
    pub fn is_eqv(&self, other: &Value) -> bool {
        self.is_eq(other)
    }

    /// Deep structural equality through pairs and strings
    pub fn is_equal(&self, other: &Value) -> bool {
        let mut pending = vec![(self.clone(), other.clone())];
        while let Some((a, b)) = pending.pop() {
            match (&a, &b) {
                (Value::Pair(x), Value::Pair(y)) => {
                    if !x.ptr_eq(y) {
                        pending.push((x.cdr(), y.cdr()));
                        pending.push((x.car(), y.car()));
                    }
                }
                (Value::String(x), Value::String(y)) => {
                    if x != y {
                        return false;
                    }
                }
                _ => {
                    if !a.is_eqv(&b) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Machine-literal printed form
    pub fn repr(&self) -> Repr<'_> {
        Repr(self)
    }
}

/// Printing work left for a list; cars are pushed ahead of the rest of
/// their list so nesting in either direction stays off the native stack
enum Emit {
    Term(Value),
    Rest(Value),
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &Value, repr: bool) -> fmt::Result {
    let mut pending = vec![Emit::Term(value.clone())];

    while let Some(emit) = pending.pop() {
        match emit {
            Emit::Term(Value::Pair(p)) => {
                write!(f, "(")?;
                pending.push(Emit::Rest(p.cdr()));
                pending.push(Emit::Term(p.car()));
            }
            Emit::Term(atom) => write_atom(f, &atom, repr)?,
            Emit::Rest(Value::Nil) => write!(f, ")")?,
            Emit::Rest(Value::Pair(p)) => {
                write!(f, " ")?;
                pending.push(Emit::Rest(p.cdr()));
                pending.push(Emit::Term(p.car()));
            }
            Emit::Rest(tail) => {
                write!(f, " . ")?;
                write_atom(f, &tail, repr)?;
                write!(f, ")")?;
            }
        }
    }

    Ok(())
}

fn write_atom(f: &mut fmt::Formatter<'_>, value: &Value, repr: bool) -> fmt::Result {
    match value {
        Value::Nil => write!(f, "()"),
        Value::Bool(true) => write!(f, "#t"),
        Value::Bool(false) => write!(f, "#f"),
        Value::Symbol(s) => write!(f, "{}", s),
        Value::String(s) if repr => {
            write!(f, "\"")?;
            for ch in s.chars() {
                if ch == '"' || ch == '\\' {
                    write!(f, "\\")?;
                }
                write!(f, "{}", ch)?;
            }
            write!(f, "\"")
        }
        Value::String(s) => write!(f, "{}", s),
        Value::Number(n) => write!(f, "{}", n),
        // write_value opens pairs itself
        Value::Pair(_) => write!(f, "(...)"),
        Value::Primitive(p) => write!(f, "#<primitive {}>", p.name),
        Value::Fexpr(_) => write!(f, "#<operative>"),
        Value::Env(_) => write!(f, "#<environment>"),
    }
}

/// Human-readable form; strings print without quotes
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, false)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, true)
    }
}

pub struct Repr<'a>(&'a Value);

impl fmt::Display for Repr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self.0, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(items: &[i64]) -> Value {
        Value::list(items.iter().map(|i| Value::int(*i)).collect())
    }

    #[test]
    fn displays() {
        let list = Value::list(vec![
            Value::list(vec![Value::int(42), Value::Bool(true)]),
            Value::string("the answer"),
            Value::Nil,
        ]);
        assert_eq!("((42 #t) the answer ())", list.to_string());
        assert_eq!("((42 #t) \"the answer\" ())", list.repr().to_string());
    }

    #[test]
    fn dotted() {
        let dotted = Value::list_with_tail(vec![Value::int(1), Value::int(2)], Value::int(3));
        assert_eq!("(1 2 . 3)", dotted.to_string());
        assert_eq!("(1 . 2.5)", Value::cons(Value::int(1), Value::real(2.5)).repr().to_string());
    }

    #[test]
    fn escapes() {
        let s = Value::string("say \"hi\" \\o/");
        assert_eq!(r#""say \"hi\" \\o/""#, s.repr().to_string());
        assert_eq!("say \"hi\" \\o/", s.to_string());
    }

    #[test]
    fn reals_print_as_reals() {
        assert_eq!("1.0", Value::real(1.0).to_string());
        assert_eq!("-0.25", Value::real(-0.25).to_string());
        assert_eq!("7", Value::int(7).to_string());
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Bool(false).truthy());
        assert!(Value::Bool(true).truthy());
        assert!(Value::int(0).truthy());
        assert!(Value::string("").truthy());
        assert!(Value::Nil.truthy());
    }

    #[test]
    fn equality_tiers() {
        let a = nums(&[1, 2, 3]);
        let b = nums(&[1, 2, 3]);
        assert!(!a.is_eq(&b));
        assert!(!a.is_eqv(&b));
        assert!(a.is_equal(&b));
        assert!(a.is_eq(&a.clone()));

        let exact = Value::int(1);
        let inexact = Value::real(1.0);
        assert!(!exact.is_eqv(&inexact));
        assert!(!exact.is_equal(&inexact));
        assert!(Number::Int(1).num_eq(Number::Real(1.0)));

        let s1 = Value::string("abc");
        let s2 = Value::string("abc");
        assert!(!s1.is_eq(&s2));
        assert!(s1.is_equal(&s2));

        assert!(Value::sym("foo").is_eq(&Value::sym("FOO")));
        assert!(!nums(&[1, 2]).is_equal(&nums(&[1, 2, 3])));
    }

    #[test]
    fn rounding() {
        assert_eq!(Number::Real(2.5).round().to_string(), "3");
        assert_eq!(Number::Real(2.49).round().to_string(), "2");
        assert_eq!(Number::Real(-2.5).round().to_string(), "-3");
        assert_eq!(Number::Real(-2.4).round().to_string(), "-2");
        assert_eq!(Number::Int(-9).round().to_string(), "-9");
        assert!(Number::Real(4.0).round().exact_p());
    }

    #[test]
    fn rounding_out_of_range_stays_real() {
        assert!(!Number::Real(1e300).round().exact_p());
        assert_eq!(Number::Real(1e300).round().to_f64(), 1e300);
        assert!(!Number::Real(-1e300).round().exact_p());
        assert!(!Number::Real(9.3e18).round().exact_p());
        assert!(!Number::Real(f64::INFINITY).round().exact_p());
        assert!(!Number::Real(f64::NAN).round().exact_p());
        assert_eq!(Number::Real(-9.2e18).round().to_string(), "-9200000000000000000");
    }

    #[test]
    fn list_conversion() {
        let items = nums(&[4, 5, 6]).list_to_vec().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].to_string(), "6");
        assert!(Value::cons(Value::int(1), Value::int(2)).list_to_vec().is_none());
        assert!(Value::Nil.list_to_vec().unwrap().is_empty());
    }

    #[test]
    fn plain_pairs_mutate() {
        let p = Pair::new(Value::int(1), Value::Nil);
        p.set_car(Value::int(2)).unwrap();
        p.set_cdr(Value::int(3)).unwrap();
        assert_eq!(Value::Pair(p).to_string(), "(2 . 3)");
    }

    #[test]
    fn guarded_pairs_refuse() {
        let spine = Pair::with_role(Value::Nil, Value::Nil, PairRole::Spine);
        assert!(spine.set_car(Value::int(1)).is_err());
        assert!(spine.set_cdr(Value::int(1)).is_err());

        let slot = Pair::with_role(Value::int(1), Value::Nil, PairRole::Slot);
        assert!(slot.set_car(Value::int(2)).is_ok());
        assert!(slot.set_cdr(Value::int(2)).is_err());
    }

    #[test]
    fn long_lists_drop() {
        let long = Value::list((0..200_000).map(Value::int).collect());
        drop(long);
    }

    fn car_nest(depth: usize) -> Value {
        (0..depth).fold(Value::int(0), |acc, _| Value::cons(acc, Value::Nil))
    }

    #[test]
    fn car_nests_drop() {
        drop(car_nest(100_000));
    }

    #[test]
    fn car_nests_print() {
        assert_eq!(car_nest(2).to_string(), "((0))");

        let text = car_nest(100_000).to_string();
        assert_eq!(text.len(), 200_001);
        assert!(text.starts_with("(((("));
        assert!(text.ends_with("0))))"));
    }

    #[test]
    fn closure_chains_drop() {
        let mut held = Value::int(0);
        for _ in 0..100_000 {
            let env = Env::new(None);
            env.bind(symtab::symbol("acc"), held);
            held = Value::Fexpr(Rc::new(Fexpr {
                params: Value::Nil,
                env_param: symtab::symbol("_"),
                static_env: env,
                body: Value::sym("acc"),
            }));
        }
        drop(held);
    }

    #[test]
    fn shared_tails_survive_release() {
        let tail = Value::list(vec![Value::int(1), Value::int(2)]);
        let head = Value::cons(Value::int(0), tail.clone());
        drop(head);
        assert_eq!(tail.to_string(), "(1 2)");
    }
}
