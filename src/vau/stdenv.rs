// Quoppa, a minimal vau-calculus Lisp.

// SPDX-FileCopyrightText: © 2024 Quoppa contributors
// SPDX-License-Identifier: AGPL-3.0-only

// Quoppa is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/vau/stdenv.rs

// Primitive operatives that make up the ground environment, and the
// bootstrap that installs them.

// <>

use std::cmp::Ordering;
use std::io::{self, Write};
use std::rc::Rc;

use log::debug;

use super::core::{Number, PrimKind, Primitive, Value};
use super::error::{Error, Result};
use super::frame::Env;
use super::symtab::symbol;

/// Generates a slice of native functions along with names and
/// argument counts
///
/// The syntax used is quite similar to that of regular functions but
/// eases access to arguments in the body, which sees each argument as
/// a `&Value`. Every body must evaluate to a `Result<Value>`.
macro_rules! qp_fn {
    ( const $array:ident;
      $( $name:literal $argct:literal [ $($args:ident),* ] $body:block )+
    ) => {
        pub const $array: &[(&str, $crate::vau::core::NativeFn, usize)] =
            &[$(($name, |_args: &[$crate::vau::core::Value]|
                  -> $crate::vau::error::Result<$crate::vau::core::Value> {
                #[allow(unused_mut, unused_variables, unused_assignments)]
                let mut _ind = 0;
                $(
                    let $args = match _args.get(_ind) {
                        Some(arg) => arg,
                        None => {
                            return Err($crate::vau::error::Error::Arity {
                                op: $name.to_string(),
                                expected: $argct,
                                found: _args.len(),
                            })
                        }
                    };
                    _ind += 1;
                )*

                $body
            },
            $argct)),+];
    };
}

fn boolean(b: bool) -> Result<Value> {
    Ok(Value::Bool(b))
}

/// Applies an arithmetic operation; exact operands stay exact unless
/// the result overflows
fn arith(
    op: &str,
    fst: &Value,
    snd: &Value,
    exact: fn(i64, i64) -> Option<i64>,
    real: fn(f64, f64) -> f64,
) -> Result<Value> {
    let (a, b) = (fst.as_number(op)?, snd.as_number(op)?);
    let out = match (a, b) {
        (Number::Int(x), Number::Int(y)) => match exact(x, y) {
            Some(n) => Number::Int(n),
            None => Number::Real(real(x as f64, y as f64)),
        },
        _ => Number::Real(real(a.to_f64(), b.to_f64())),
    };
    Ok(Value::Number(out))
}

fn divide(fst: &Value, snd: &Value) -> Result<Value> {
    let (a, b) = (fst.as_number("/")?, snd.as_number("/")?);
    let out = match (a, b) {
        (Number::Int(_), Number::Int(0)) => {
            return Err(Error::Arithmetic("division by zero".to_string()))
        }
        (Number::Int(x), Number::Int(y)) if x.checked_rem(y) == Some(0) => match x.checked_div(y) {
            Some(n) => Number::Int(n),
            None => Number::Real(x as f64 / y as f64),
        },
        _ => Number::Real(a.to_f64() / b.to_f64()),
    };
    Ok(Value::Number(out))
}

fn compare(op: &str, fst: &Value, snd: &Value, test: fn(Ordering) -> bool) -> Result<Value> {
    let (a, b) = (fst.as_number(op)?, snd.as_number(op)?);
    let ord = match (a, b) {
        (Number::Int(x), Number::Int(y)) => Some(x.cmp(&y)),
        _ => a.to_f64().partial_cmp(&b.to_f64()),
    };
    boolean(ord.map_or(false, test))
}

fn emit(text: std::fmt::Arguments) -> Result<Value> {
    let mut out = io::stdout().lock();
    out.write_fmt(text)?;
    out.flush()?;
    Ok(Value::Nil)
}

qp_fn! {
    const ENVFNS;

    "bool" 3 [test, t, f] {
        Ok(if test.truthy() { t.clone() } else { f.clone() })
    }

    "eq?" 2 [fst, snd] { boolean(fst.is_eq(snd)) }
    "eqv?" 2 [fst, snd] { boolean(fst.is_eqv(snd)) }
    "equal?" 2 [fst, snd] { boolean(fst.is_equal(snd)) }

    "null?" 1 [obj] { boolean(obj.nil_p()) }
    "symbol?" 1 [obj] { boolean(matches!(obj, Value::Symbol(_))) }
    "pair?" 1 [obj] { boolean(matches!(obj, Value::Pair(_) | Value::Env(_))) }
    "number?" 1 [obj] { boolean(matches!(obj, Value::Number(_))) }
    "string?" 1 [obj] { boolean(matches!(obj, Value::String(_))) }
    "operative?" 1 [obj] {
        boolean(matches!(obj, Value::Primitive(_) | Value::Fexpr(_)))
    }
    "environment?" 1 [obj] { boolean(matches!(obj, Value::Env(_))) }

    "cons" 2 [fst, snd] { Ok(Value::cons(fst.clone(), snd.clone())) }
    "car" 1 [pair] { pair.car("car") }
    "cdr" 1 [pair] { pair.cdr("cdr") }

    "set-car!" 2 [pair, value] {
        pair.set_car(value.clone(), "set-car!")?;
        Ok(pair.clone())
    }

    "set-cdr!" 2 [pair, value] {
        pair.set_cdr(value.clone(), "set-cdr!")?;
        Ok(pair.clone())
    }

    "+" 2 [fst, snd] { arith("+", fst, snd, i64::checked_add, |a, b| a + b) }
    "-" 2 [fst, snd] { arith("-", fst, snd, i64::checked_sub, |a, b| a - b) }
    "*" 2 [fst, snd] { arith("*", fst, snd, i64::checked_mul, |a, b| a * b) }
    "/" 2 [fst, snd] { divide(fst, snd) }

    "<=" 2 [fst, snd] { compare("<=", fst, snd, |o| o != Ordering::Greater) }
    "<" 2 [fst, snd] { compare("<", fst, snd, |o| o == Ordering::Less) }
    "=" 2 [fst, snd] {
        let (a, b) = (fst.as_number("=")?, snd.as_number("=")?);
        boolean(a.num_eq(b))
    }

    "round" 1 [num] { Ok(Value::Number(num.as_number("round")?.round())) }

    "error" 1 [msg] { Err(Error::User(msg.to_string())) }

    "display" 1 [obj] { emit(format_args!("{}", obj)) }
    "write" 1 [obj] { emit(format_args!("{}", obj.repr())) }
    "newline" 0 [] { emit(format_args!("\n")) }

    "make-environment" 1 [parent] {
        match parent {
            Value::Env(env) => Ok(Value::Env(Env::new(Some(env)))),
            Value::Nil => Ok(Value::Env(Env::new(None))),
            other => Err(Error::type_mismatch("make-environment", "environment", other)),
        }
    }
}

fn reflective(name: &str, kind: PrimKind, argct: usize) -> Value {
    Value::Primitive(Rc::new(Primitive {
        name: symbol(name),
        kind,
        argct,
    }))
}

/// Installs `vau`, the reflective entry points and every native
/// primitive into `env`
pub fn bootstrap(env: &Env) {
    env.bind(symbol("vau"), reflective("vau", PrimKind::Vau, 3));
    env.bind(symbol("eval"), reflective("eval", PrimKind::Eval, 2));
    env.bind(symbol("operate"), reflective("operate", PrimKind::Operate, 3));
    env.bind(symbol("lookup"), reflective("lookup", PrimKind::Lookup, 2));

    for (name, fun, argct) in ENVFNS {
        env.bind(
            symbol(name),
            Value::Primitive(Rc::new(Primitive::native(name, *fun, *argct))),
        );
    }

    debug!("ground environment holds {} primitives", env.len());
}

/// A fresh root environment holding only the primitives
pub fn ground_env() -> Env {
    let env = Env::new(None);
    bootstrap(&env);
    env
}
