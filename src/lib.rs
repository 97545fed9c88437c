//! Wiregen - dependency-injection and routing code generator for Go
//!
//! Wiregen reads comment directives (`@Service`, `@Router`, `@Inject`,
//! `@Config`, `@Route`) from the Go sources of each package folder and writes
//! one generated file per folder that registers the services, initializes
//! their injected and configured fields and mounts their routes.
//!
//! ## Module Structure
//!
//! - `cli`: Command-line interface layer (user-facing commands)
//! - `config`: Configuration file loading and parsing
//! - `core`: Generation pipeline (collect, validate, aggregate, synthesize, emit)
//! - `issues`: Issue type definitions and reporting

pub mod cli;
pub mod config;
pub mod core;
pub mod issues;
