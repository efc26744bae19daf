// Quoppa, a minimal vau-calculus Lisp.

// SPDX-FileCopyrightText: © 2024 Quoppa contributors
// SPDX-License-Identifier: AGPL-3.0-only

// Quoppa is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/vau/eval.rs

// Iterative stack evaluator. Defines the instruction format and the
// loop that runs any term one instruction at a time, so that tail
// calls replace work instead of stacking it.

// <>

use std::rc::Rc;

use log::debug;

use super::bind::bind_into;
use super::core::{Fexpr, PrimKind, Primitive, Value};
use super::error::{Error, Result};
use super::frame::Env;

/// One unit of pending work
#[derive(Debug)]
pub enum Opcode {
    /// Term to be evaluated
    Eval { env: Env, term: Value },

    /// Operand tree waiting for its operator, which is on top of the
    /// value stack
    PreApp { env: Env, operands: Value },

    /// Operative and its unevaluated operands
    Apply {
        env: Env,
        operative: Value,
        operands: Value,
    },

    /// Primitive whose `argct` evaluated arguments are on top of the
    /// value stack
    Invoke { prim: Rc<Primitive>, argct: usize },
}

/// Evaluation stack: pending instructions plus the values they produce
pub struct EvalStack {
    work: Vec<Opcode>,
    values: Vec<Value>,
}

impl EvalStack {
    /// Create a new stack with room for `size` entries before growing
    pub fn new(size: usize) -> Self {
        EvalStack {
            work: Vec::with_capacity(size),
            values: Vec::with_capacity(size),
        }
    }

    /// Determines whether the stack is currently empty
    pub fn is_empty(&self) -> bool {
        self.work.is_empty() && self.values.is_empty()
    }

    /// Number of pending instructions
    pub fn depth(&self) -> usize {
        self.work.len()
    }

    /// Starts evaluating `term` in `env`
    ///
    /// Returns false and does nothing if the stack is already in use
    pub fn start(&mut self, env: Env, term: Value) -> bool {
        if !self.is_empty() {
            false
        } else {
            self.work.push(Opcode::Eval { env, term });
            true
        }
    }

    /// Discards all pending work and intermediate values
    pub fn unwind(&mut self, error: &Error) {
        debug!(
            "unwinding {} instructions, {} values: {}",
            self.work.len(),
            self.values.len(),
            error
        );
        self.work.clear();
        self.values.clear();
    }

    fn pop_value(&mut self) -> Result<Value> {
        self.values
            .pop()
            .ok_or_else(|| Error::consistency("evaluation stack underflow"))
    }

    /// Consumes one instruction off the top of the stack and executes it
    ///
    /// Returns `Ok(false)` once no work is left. Never recurses:
    /// everything that still has to happen is pushed as new work.
    pub fn iter_once(&mut self, ground: &Env) -> Result<bool> {
        let opc = match self.work.pop() {
            Some(opc) => opc,
            None => return Ok(false),
        };

        if cfg!(feature = "stkdbg") {
            log::trace!(
                "ENTER: {:?}; work: {}, values: {}",
                opc,
                self.work.len(),
                self.values.len()
            );
        }

        match opc {
            Opcode::Eval { env, term } => match term {
                Value::Symbol(sym) => {
                    let value = env.lookup(sym)?;
                    self.values.push(value);
                }
                Value::Pair(list) => {
                    self.work.push(Opcode::PreApp {
                        env: env.clone(),
                        operands: list.cdr(),
                    });
                    self.work.push(Opcode::Eval {
                        env,
                        term: list.car(),
                    });
                }
                other => self.values.push(other),
            },
            Opcode::PreApp { env, operands } => {
                let operative = self.pop_value()?;
                self.work.push(Opcode::Apply {
                    env,
                    operative,
                    operands,
                });
            }
            Opcode::Apply {
                env,
                operative,
                operands,
            } => self.apply(env, operative, operands)?,
            Opcode::Invoke { prim, argct } => {
                if self.values.len() < argct {
                    return Err(Error::consistency("evaluation stack underflow"));
                }
                let args = self.values.split_off(self.values.len() - argct);
                self.invoke(ground, &prim, &args)?;
            }
        }

        Ok(true)
    }

    fn apply(&mut self, env: Env, operative: Value, operands: Value) -> Result<()> {
        match operative {
            Value::Fexpr(fexpr) => {
                let local = Env::new(Some(&fexpr.static_env));
                bind_into(&local, &fexpr.params, &operands)?;
                // the env-param shadows a parameter of the same name
                local.bind(fexpr.env_param, Value::Env(env));

                // tail position: the body takes over this call's slot
                self.work.push(Opcode::Eval {
                    env: local,
                    term: fexpr.body.clone(),
                });
            }
            Value::Primitive(prim) => {
                if !prim.applicative_p() {
                    let fexpr = make_fexpr(&env, &operands)?;
                    self.values.push(fexpr);
                    return Ok(());
                }

                let name = prim.name.to_string();
                let terms = operands
                    .list_to_vec()
                    .ok_or_else(|| Error::type_mismatch(&name, "operand list", &operands))?;
                if terms.len() != prim.argct {
                    return Err(Error::Arity {
                        op: name,
                        expected: prim.argct,
                        found: terms.len(),
                    });
                }

                self.work.push(Opcode::Invoke {
                    prim: prim.clone(),
                    argct: terms.len(),
                });
                // leftmost operand ends up on top and runs first
                for term in terms.into_iter().rev() {
                    self.work.push(Opcode::Eval {
                        env: env.clone(),
                        term,
                    });
                }
            }
            other => return Err(Error::type_mismatch("apply", "operative", &other)),
        }

        Ok(())
    }

    fn invoke(&mut self, ground: &Env, prim: &Primitive, args: &[Value]) -> Result<()> {
        match (&prim.kind, args) {
            (PrimKind::Native(fun), args) => {
                let out = fun(args)?;
                self.values.push(out);
            }
            (PrimKind::Eval, [env, term]) => {
                let env = env_operand(ground, env, "eval")?;
                self.work.push(Opcode::Eval {
                    env,
                    term: term.clone(),
                });
            }
            (PrimKind::Operate, [env, operative, operands]) => {
                let env = env_operand(ground, env, "operate")?;
                self.work.push(Opcode::Apply {
                    env,
                    operative: operative.clone(),
                    operands: operands.clone(),
                });
            }
            (PrimKind::Lookup, [sym, env]) => {
                let sym = sym.as_symbol("lookup")?;
                let value = env_operand(ground, env, "lookup")?.lookup(sym)?;
                self.values.push(value);
            }
            _ => {
                return Err(Error::Arity {
                    op: prim.name.to_string(),
                    expected: prim.argct,
                    found: args.len(),
                })
            }
        }

        Ok(())
    }

    /// Runs until no work is left and returns the single value produced
    ///
    /// On error the stack is unwound before the error is returned.
    pub fn run(&mut self, ground: &Env) -> Result<Value> {
        loop {
            match self.iter_once(ground) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    self.unwind(&e);
                    return Err(e);
                }
            }
        }

        let out = self.pop_value();
        if !self.values.is_empty() {
            let e = Error::consistency("values left over after evaluation");
            self.unwind(&e);
            return Err(e);
        }
        out
    }
}

/// Environment operand of a reflective primitive; `()` selects the
/// ground environment
fn env_operand(ground: &Env, value: &Value, op: &str) -> Result<Env> {
    match value {
        Value::Env(env) => Ok(env.clone()),
        Value::Nil => Ok(ground.clone()),
        other => Err(Error::type_mismatch(op, "environment", other)),
    }
}

/// Builds the operative for `(vau params env-param body)`
fn make_fexpr(static_env: &Env, operands: &Value) -> Result<Value> {
    let parts = operands
        .list_to_vec()
        .ok_or_else(|| Error::VauShape(operands.repr().to_string()))?;

    match parts.as_slice() {
        [params, env_param, body] => Ok(Value::Fexpr(Rc::new(Fexpr {
            params: params.clone(),
            env_param: env_param.as_symbol("vau")?,
            static_env: static_env.clone(),
            body: body.clone(),
        }))),
        _ => Err(Error::VauShape(operands.repr().to_string())),
    }
}

/// Evaluates `term` in `env` on a freshly created stack
pub fn eval(ground: &Env, env: &Env, term: Value) -> Result<Value> {
    let mut stack = EvalStack::new(64);
    stack.start(env.clone(), term);
    stack.run(ground)
}

#[cfg(test)]
mod tests {
    use super::super::error::ErrorKind;
    use super::super::parser::parse_one;
    use super::super::stdenv;
    use super::super::symtab::symbol;
    use super::*;

    fn run(env: &Env, text: &str) -> Result<Value> {
        eval(env, env, parse_one(text).unwrap())
    }

    fn ground() -> Env {
        stdenv::ground_env()
    }

    #[test]
    fn self_evaluating() {
        let env = ground();
        for text in ["42", "-7", "2.5", "\"str\"", "#t", "#f", "()"] {
            assert_eq!(run(&env, text).unwrap().repr().to_string(), text);
        }
    }

    #[test]
    fn symbols_resolve() {
        let env = ground();
        env.bind(symbol("y"), Value::int(42));
        assert_eq!(run(&env, "y").unwrap().to_string(), "42");
        assert_eq!(
            run(&env, "nope").unwrap_err(),
            Error::Lookup("nope".into())
        );
    }

    #[test]
    fn primitives_evaluate_operands() {
        let env = ground();
        assert_eq!(run(&env, "(+ 1 (* 2 3))").unwrap().to_string(), "7");
        assert_eq!(run(&env, "(cons 1 (cons 2 ()))").unwrap().to_string(), "(1 2)");
    }

    #[test]
    fn vau_receives_raw_operands() {
        let env = ground();
        assert_eq!(
            run(&env, "((vau (x) e x) (+ 1 2))").unwrap().to_string(),
            "(+ 1 2)"
        );
        assert_eq!(run(&env, "((vau (x) e x) 5)").unwrap().to_string(), "5");
        assert_eq!(
            run(&env, "((vau args e args) a b c)").unwrap().to_string(),
            "(a b c)"
        );
    }

    #[test]
    fn dynamic_environment_access() {
        let env = ground();
        env.bind(symbol("y"), Value::int(42));
        assert_eq!(
            run(&env, "((vau (x) e (eval e x)) y)").unwrap().to_string(),
            "42"
        );
    }

    #[test]
    fn env_param_wins_over_params() {
        let env = ground();
        assert_eq!(run(&env, "((vau (e) e e) 5)").unwrap().to_string(), "#<environment>");
        assert_eq!(
            run(&env, "((vau (a . e) e e) 5 6)").unwrap().to_string(),
            "#<environment>"
        );
        assert_eq!(run(&env, "((vau (e x) e x) 5 6)").unwrap().to_string(), "6");
    }

    #[test]
    fn static_scoping() {
        let env = ground();
        env.bind(symbol("y"), Value::int(1));
        let op = run(&env, "(vau () _ y)").unwrap();

        let other = Env::new(Some(&env));
        other.bind(symbol("y"), Value::int(2));
        other.bind(symbol("op"), op);
        assert_eq!(run(&other, "(op)").unwrap().to_string(), "1");
    }

    #[test]
    fn reflective_entries() {
        let env = ground();
        env.bind(symbol("z"), Value::int(3));
        assert_eq!(run(&env, "(eval () 1)").unwrap().to_string(), "1");
        assert_eq!(
            run(&env, "(lookup ((vau (s) _ s) z) ())").unwrap().to_string(),
            "3"
        );
        assert_eq!(
            run(&env, "(eval ((vau () e e)) ((vau (s) _ s) z))")
                .unwrap()
                .to_string(),
            "3"
        );
        assert_eq!(
            run(&env, "(operate () + (cons 1 (cons 2 ())))")
                .unwrap()
                .to_string(),
            "3"
        );
        assert_eq!(
            run(&env, "(operate () (vau x _ x) (cons 1 (cons 2 ())))")
                .unwrap()
                .to_string(),
            "(1 2)"
        );
    }

    #[test]
    fn shape_errors() {
        let env = ground();
        assert_eq!(
            run(&env, "(vau (x) e)").unwrap_err().kind(),
            ErrorKind::ArityMismatch
        );
        assert_eq!(
            run(&env, "(vau (x) 3 x)").unwrap_err().kind(),
            ErrorKind::TypeMismatch
        );
        assert_eq!(
            run(&env, "(cons 1)").unwrap_err().kind(),
            ErrorKind::ArityMismatch
        );
        assert_eq!(
            run(&env, "((vau (a b) _ a) 1)").unwrap_err(),
            Error::TooFewArguments
        );
        assert_eq!(run(&env, "(1 2)").unwrap_err().kind(), ErrorKind::TypeMismatch);
        assert_eq!(
            run(&env, "(car 5)").unwrap_err().kind(),
            ErrorKind::TypeMismatch
        );
    }

    #[test]
    fn errors_unwind() {
        let env = ground();
        let mut stack = EvalStack::new(16);
        stack.start(env.clone(), parse_one("(cons 1 (car (cons undefined ())))").unwrap());
        assert!(stack.run(&env).is_err());
        assert!(stack.is_empty());

        stack.start(env.clone(), parse_one("(+ 1 1)").unwrap());
        assert_eq!(stack.run(&env).unwrap().to_string(), "2");
    }

    #[test]
    fn busy_stack_refuses() {
        let env = ground();
        let mut stack = EvalStack::new(16);
        assert!(stack.start(env.clone(), Value::int(1)));
        assert!(!stack.start(env.clone(), Value::int(2)));
        assert_eq!(stack.run(&env).unwrap().to_string(), "1");
    }

    #[test]
    fn tail_calls_stay_flat() {
        let env = ground();
        env.bind(symbol("stop"), run(&env, "(vau _ _ 0)").unwrap());
        let count = run(
            &env,
            "(vau (n) _ (operate () (bool (<= n 0) stop count) (cons (- n 1) ())))",
        )
        .unwrap();
        env.bind(symbol("count"), count);

        let mut stack = EvalStack::new(16);
        stack.start(env.clone(), parse_one("(count 50000)").unwrap());
        let mut peak = 0;
        loop {
            match stack.iter_once(&env) {
                Ok(true) => peak = peak.max(stack.depth()),
                Ok(false) => break,
                Err(e) => panic!("{}", e),
            }
        }
        assert!(peak < 16, "work stack grew to {}", peak);
        assert_eq!(stack.pop_value().unwrap().to_string(), "0");
    }
}
