// Quoppa, a minimal vau-calculus Lisp.

// SPDX-FileCopyrightText: © 2024 Quoppa contributors
// SPDX-License-Identifier: AGPL-3.0-only

// Quoppa is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/vau/bind.rs

// Structural matching of a parameter tree against an argument tree.

// <>

use super::core::Value;
use super::error::{Error, Result};
use super::frame::Env;
use super::symtab::Symbol;

/// Walks `params` and `args` together, left to right, calling `emit`
/// for every symbol in `params` with the subtree of `args` it matches
fn walk(params: &Value, args: &Value, mut emit: impl FnMut(Symbol, Value)) -> Result<()> {
    let mut pending = vec![(params.clone(), args.clone())];

    while let Some((params, args)) = pending.pop() {
        match (&params, &args) {
            (Value::Nil, Value::Nil) => {}
            (Value::Symbol(sym), _) => {
                if !sym.is_wildcard() {
                    emit(*sym, args.clone());
                }
            }
            (Value::Pair(p), Value::Pair(a)) => {
                // cdr first so the car is matched first
                pending.push((p.cdr(), a.cdr()));
                pending.push((p.car(), a.car()));
            }
            (Value::Nil, _) => return Err(Error::TooManyArguments),
            (Value::Pair(_), Value::Nil) => return Err(Error::TooFewArguments),
            _ => {
                return Err(Error::BindShape {
                    params: params.to_string(),
                    args: args.repr().to_string(),
                })
            }
        }
    }

    Ok(())
}

/// Matches `params` against `args`, returning the bindings in the
/// order the symbols appear in `params`
pub fn bind_params(params: &Value, args: &Value) -> Result<Vec<(Symbol, Value)>> {
    let mut out = Vec::new();
    walk(params, args, |sym, value| out.push((sym, value)))?;
    Ok(out)
}

/// Matches `params` against `args` and binds the result into `env`
/// one symbol at a time; on failure the bindings already made stay
pub fn bind_into(env: &Env, params: &Value, args: &Value) -> Result<()> {
    walk(params, args, |sym, value| env.bind(sym, value))
}

#[cfg(test)]
mod tests {
    use super::super::parser::parse_one;
    use super::super::symtab::symbol;
    use super::*;

    fn tree(text: &str) -> Value {
        parse_one(text).unwrap()
    }

    fn bound(params: &str, args: &str) -> Vec<(String, String)> {
        bind_params(&tree(params), &tree(args))
            .unwrap()
            .into_iter()
            .map(|(s, v)| (s.to_string(), v.to_string()))
            .collect()
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn flat() {
        assert_eq!(bound("(a b)", "(1 2)"), pairs(&[("a", "1"), ("b", "2")]));
        assert!(bound("()", "()").is_empty());
    }

    #[test]
    fn rest() {
        assert_eq!(
            bound("(a . b)", "(1 2 3)"),
            pairs(&[("a", "1"), ("b", "(2 3)")])
        );
        assert_eq!(bound("xs", "(1 2)"), pairs(&[("xs", "(1 2)")]));
    }

    #[test]
    fn nested() {
        assert_eq!(
            bound("((a b) (c . d) e)", "((1 2) (3 4 5) 6)"),
            pairs(&[("a", "1"), ("b", "2"), ("c", "3"), ("d", "(4 5)"), ("e", "6")])
        );
    }

    #[test]
    fn wildcard() {
        assert_eq!(bound("(_ b _)", "(1 2 3)"), pairs(&[("b", "2")]));
    }

    #[test]
    fn mismatches() {
        let err = |p: &str, a: &str| bind_params(&tree(p), &tree(a)).unwrap_err();
        assert_eq!(err("(a b)", "(1)"), Error::TooFewArguments);
        assert_eq!(err("(a)", "(1 2)"), Error::TooManyArguments);
        assert!(matches!(err("((a b) c)", "(1 2)"), Error::BindShape { .. }));
        assert!(matches!(err("(1)", "(2)"), Error::BindShape { .. }));
    }

    #[test]
    fn into_env_keeps_prefix() {
        let env = Env::new(None);
        assert!(bind_into(&env, &tree("(a b c)"), &tree("(1 2)")).is_err());
        assert_eq!(env.lookup(symbol("a")).unwrap().to_string(), "1");
        assert_eq!(env.lookup(symbol("b")).unwrap().to_string(), "2");
        assert!(env.lookup(symbol("c")).is_err());
    }

    #[test]
    fn long_rest_lists() {
        let args = Value::list((0..5_000).map(Value::int).collect());
        let params = Value::list((0..5_000).map(|i| Value::sym(&format!("p{}", i))).collect());
        assert_eq!(bind_params(&params, &args).unwrap().len(), 5_000);
    }
}
