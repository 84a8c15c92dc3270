// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Synthesis determinism and ownership, plus parameter binding precedence.

mod parameter_binding;
mod synthesis;
