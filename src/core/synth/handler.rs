//! Route adapters: one `router.Handle(...)` call per routed method.
//!
//! Each adapter declares a local per handler parameter, binds it by name from
//! the request context, calls the handler on the service instance and folds
//! its results into `(any, error)`.

use crate::core::aggregate::RouteBinding;
use crate::core::collect::directive::go_quote;
use crate::core::synth::{CodeWriter, RenderContext};

pub fn render_route(route: &RouteBinding, ctx: &RenderContext<'_>, indent: usize) -> String {
    let mut w = CodeWriter::new(indent);

    let middleware = if route.middleware.is_empty() {
        "nil".to_string()
    } else {
        format!(
            "[]string{{{}}}",
            route
                .middleware
                .iter()
                .map(String::as_str)
                .map(go_quote)
                .collect::<Vec<_>>()
                .join(", ")
        )
    };

    w.line(&format!(
        "router.Handle({}, {}, {}, func(ctx {}.Context) (any, error) {{",
        go_quote(&route.method),
        go_quote(&route.path),
        middleware,
        ctx.runtime
    ));
    w.indented(|w| {
        let mut args = Vec::with_capacity(route.params.len());
        for (i, param) in route.params.iter().enumerate() {
            let local = format!("arg{}", i);
            let ty = ctx.imports.render_type(&param.ty);
            if param.variadic {
                w.line(&format!("var {} []{}", local, ty));
                args.push(format!("{}...", local));
            } else {
                w.line(&format!("var {} {}", local, ty));
                args.push(local.clone());
            }
            w.line(&format!(
                "if err := ctx.Bind({}, &{}); err != nil {{",
                go_quote(&param.name),
                local
            ));
            w.indented(|w| w.line("return nil, err"));
            w.line("}");
        }

        // Results are declared with their types so every import a handler
        // signature needs is referenced.
        let call = format!("svc.{}({})", route.handler, args.join(", "));
        match route.results.as_slice() {
            [] => {
                w.line(&call);
                w.line("return nil, nil");
            }
            [only] if only.text == "error" => w.line(&format!("return nil, {}", call)),
            [only] => {
                w.line(&format!("var res0 {} = {}", ctx.imports.render_type(only), call));
                w.line("return res0, nil");
            }
            [first, ..] => {
                w.line(&format!("var res0 {}", ctx.imports.render_type(first)));
                w.line(&format!("res0, err := {}", call));
                w.line("return res0, err");
            }
        }
    });
    w.line("})");

    w.finish()
}
