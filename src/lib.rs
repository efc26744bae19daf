// Quoppa, a minimal vau-calculus Lisp.

// SPDX-FileCopyrightText: © 2024 Quoppa contributors
// SPDX-License-Identifier: AGPL-3.0-only

// Quoppa is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/lib.rs

// Crate root.

// <>

pub mod vau;

pub use vau::{Env, Error, ErrorKind, Result, Runtime, RuntimeConfig, Value};
