//! Output file rendering.
//!
//! Layout of the generated file:
//!
//! ```go
//! // Code generated by wiregen. DO NOT EDIT.
//!
//! package svc
//!
//! import (...)
//!
//! func init() {
//! 	registerUsers(runtime.Default())
//! }
//!
//! func registerUsers(r *runtime.Registry) { ... }
//!
//! // wiregen:user-begin helpers
//! ...kept verbatim across regenerations...
//! // wiregen:user-end helpers
//! ```
//!
//! Rendering is deterministic: services in name order, imports sorted, so an
//! unchanged folder always renders byte-identical output.

use std::collections::BTreeMap;

use crate::core::aggregate::{ServiceGeneration, ServiceKind, TypeCapabilities};
use crate::core::collect::directive::go_quote;
use crate::core::error::GenError;
use crate::core::imports::{ImportEntry, ImportResolver};
use crate::core::synth::handler::render_route;
use crate::core::synth::{CodeWriter, RenderContext, ServicePlan, Synthesizer, render_field};

/// First line of every generated file.
pub const GENERATED_HEADER: &str = "// Code generated by wiregen. DO NOT EDIT.";

pub const USER_BLOCK_BEGIN: &str = "// wiregen:user-begin";
pub const USER_BLOCK_END: &str = "// wiregen:user-end";

/// Hand-written block carried over from the previous output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreservedBlock {
    pub name: String,
    /// Lines between the markers, each newline-terminated.
    pub body: String,
}

/// Everything a folder's output is made of.
#[derive(Debug, Clone, Default)]
pub struct GeneratedCode {
    pub package: String,
    pub services: BTreeMap<String, ServiceGeneration>,
    pub preserved_blocks: Vec<PreservedBlock>,
}

impl GeneratedCode {
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// A service dropped at emission time because its code cannot be
/// synthesized.
#[derive(Debug, Clone)]
pub struct RejectedService {
    pub service: ServiceGeneration,
    pub error: GenError,
}

#[derive(Debug, Default)]
pub struct Emission {
    /// Rendered file; `None` if no service survived.
    pub text: Option<String>,
    /// Names of the services in `text`.
    pub services: Vec<String>,
    pub rejected: Vec<RejectedService>,
}

/// Extract `user-begin`/`user-end` blocks from an existing output. An
/// unterminated block runs to the end of the file. Blocks keep their order;
/// a repeated name keeps its first block.
pub fn extract_preserved_blocks(existing: &str) -> Vec<PreservedBlock> {
    let mut blocks: Vec<PreservedBlock> = Vec::new();
    let mut current: Option<PreservedBlock> = None;

    for line in existing.lines() {
        let trimmed = line.trim();
        match current.as_mut() {
            None => {
                if let Some(name) = trimmed.strip_prefix(USER_BLOCK_BEGIN) {
                    current = Some(PreservedBlock {
                        name: name.trim().to_string(),
                        body: String::new(),
                    });
                }
            }
            Some(block) => {
                if let Some(name) = trimmed.strip_prefix(USER_BLOCK_END)
                    && name.trim() == block.name
                {
                    push_block(&mut blocks, current.take());
                } else {
                    block.body.push_str(line);
                    block.body.push('\n');
                }
            }
        }
    }
    push_block(&mut blocks, current);
    blocks
}

fn push_block(blocks: &mut Vec<PreservedBlock>, block: Option<PreservedBlock>) {
    if let Some(block) = block
        && !blocks.iter().any(|b| b.name == block.name)
    {
        blocks.push(block);
    }
}

pub struct Emitter<'a> {
    runtime: &'a ImportEntry,
    capabilities: &'a TypeCapabilities,
}

impl<'a> Emitter<'a> {
    pub fn new(runtime: &'a ImportEntry, capabilities: &'a TypeCapabilities) -> Self {
        Self {
            runtime,
            capabilities,
        }
    }

    pub fn emit(&self, code: &GeneratedCode) -> Result<Emission, GenError> {
        let synthesizer = Synthesizer::new(self.capabilities);
        let mut emission = Emission::default();
        let mut plans: Vec<ServicePlan<'_>> = Vec::new();

        for service in code.services.values() {
            match synthesizer.plan(service) {
                Ok(plan) => plans.push(plan),
                Err(error) => emission.rejected.push(RejectedService {
                    service: service.clone(),
                    error,
                }),
            }
        }
        if plans.is_empty() {
            return Ok(emission);
        }

        let mut resolver = ImportResolver::new();
        resolver.add(self.runtime.clone());
        for plan in &plans {
            resolver.extend(plan.imports());
        }
        for plan in &plans {
            resolver.extend(plan.service.required_imports.iter().cloned());
        }
        let imports = resolver.resolve()?;
        let runtime = imports
            .alias_for(&self.runtime.path)
            .unwrap_or(&self.runtime.alias)
            .to_string();
        let ctx = RenderContext {
            imports: &imports,
            runtime: &runtime,
        };

        let mut out = String::new();
        out.push_str(GENERATED_HEADER);
        out.push_str("\n\n");
        out.push_str(&format!("package {}\n\n", code.package));
        out.push_str(&imports.render_block());

        let mut init = CodeWriter::new(0);
        init.line("");
        init.line("func init() {");
        init.indented(|w| {
            for plan in &plans {
                w.line(&format!(
                    "{}({}.Default())",
                    register_fn(plan.service),
                    runtime
                ));
            }
        });
        init.line("}");
        out.push_str(&init.finish());

        for plan in &plans {
            out.push('\n');
            out.push_str(&render_service(plan, &ctx));
        }

        for block in &code.preserved_blocks {
            out.push('\n');
            out.push_str(&format!("{} {}\n", USER_BLOCK_BEGIN, block.name));
            out.push_str(&block.body);
            out.push_str(&format!("{} {}\n", USER_BLOCK_END, block.name));
        }

        emission.services = plans.iter().map(|p| p.service.name.clone()).collect();
        emission.text = Some(out);
        Ok(emission)
    }
}

fn register_fn(service: &ServiceGeneration) -> String {
    format!("register{}", service.struct_name)
}

fn render_service(plan: &ServicePlan<'_>, ctx: &RenderContext<'_>) -> String {
    let service = plan.service;
    let name = go_quote(&service.name);
    let mut w = CodeWriter::new(0);

    w.line(&format!(
        "func {}(r *{}.Registry) {{",
        register_fn(service),
        ctx.runtime
    ));
    w.indented(|w| {
        w.line(&format!(
            "r.Provide({}, func(c {}.Container) (any, error) {{",
            name, ctx.runtime
        ));
        w.indented(|w| {
            w.line(&format!("svc := &{}{{}}", service.struct_name));
            if plan.has_config() {
                w.line("cfg := c.Config()");
            }
            for field in &plan.fields {
                w.raw(&render_field(field, ctx, 2));
            }
            w.line("return svc, nil");
        });
        w.line("})");

        if service.kind == ServiceKind::Router && !service.routes.is_empty() {
            w.line(&format!(
                "r.Mount({}, func(instance any, router {}.Router) {{",
                name, ctx.runtime
            ));
            w.indented(|w| {
                w.line(&format!("svc := instance.(*{})", service.struct_name));
                for route in &service.routes {
                    w.raw(&render_route(route, ctx, 2));
                }
            });
            w.line("})");
        }
    });
    w.line("}");
    w.finish()
}
