// Quoppa, a minimal vau-calculus Lisp.

// SPDX-FileCopyrightText: © 2024 Quoppa contributors
// SPDX-License-Identifier: AGPL-3.0-only

// Quoppa is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/vau/error.rs

// Failures that abort evaluation of a top-level term. None of these
// can be caught from inside the language.

// <>

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every way an `interpret` call (or the reader / driver around it)
/// can fail
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("cannot find {0} in env")]
    Lookup(String),

    #[error("{op} expects {expected} arguments, got {found}")]
    Arity {
        op: String,
        expected: usize,
        found: usize,
    },

    #[error("malformed vau: {0}")]
    VauShape(String),

    #[error("too many arguments")]
    TooManyArguments,

    #[error("too few arguments")]
    TooFewArguments,

    #[error("can't bind {params} to {args}")]
    BindShape { params: String, args: String },

    #[error("wrong type argument {found} for {op}: expected {expected}")]
    TypeMismatch {
        op: String,
        expected: &'static str,
        found: String,
    },

    #[error("consistency: {0}")]
    Consistency(String),

    #[error("{0}")]
    User(String),

    #[error("arithmetic: {0}")]
    Arithmetic(String),

    #[error("parse error in line {line}: {msg}")]
    Read { line: usize, msg: String },

    #[error("{0}")]
    Io(String),
}

/// Coarse classification of an [`Error`], one entry per row of the
/// failure taxonomy plus the collaborator failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    LookupFailure,
    ArityMismatch,
    TooManyArguments,
    TooFewArguments,
    BindShapeMismatch,
    TypeMismatch,
    ConsistencyFailure,
    UserError,
    Arithmetic,
    Read,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Lookup(_) => ErrorKind::LookupFailure,
            Error::Arity { .. } | Error::VauShape(_) => ErrorKind::ArityMismatch,
            Error::TooManyArguments => ErrorKind::TooManyArguments,
            Error::TooFewArguments => ErrorKind::TooFewArguments,
            Error::BindShape { .. } => ErrorKind::BindShapeMismatch,
            Error::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Error::Consistency(_) => ErrorKind::ConsistencyFailure,
            Error::User(_) => ErrorKind::UserError,
            Error::Arithmetic(_) => ErrorKind::Arithmetic,
            Error::Read { .. } => ErrorKind::Read,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Builds a type mismatch for operation `op`, describing the
    /// offending value by its printed form
    pub fn type_mismatch(op: &str, expected: &'static str, found: &super::Value) -> Self {
        Error::TypeMismatch {
            op: op.to_string(),
            expected,
            found: found.to_string(),
        }
    }

    pub fn consistency(msg: impl Into<String>) -> Self {
        Error::Consistency(msg.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
