//! Kernel-launch transformer.
//!
//! Rewrites `k<<<grid, block, shmem, stream>>>(args...)` into
//! `hipLaunchKernel(HIP_KERNEL_NAME(k), grid, block, shmem, stream, args...)`
//! as one composite edit, and adds the synthetic `hipLaunchParm lp`
//! parameter to the launched kernel.
//!
//! When the callee resolves to a concrete function, the parameter list of
//! every main-file declaration of it is rewritten right away, so prototypes
//! and the definition keep one signature. A callee that names a function template (or
//! nothing visible) is deferred: after the main traversal, every function
//! template of that name gets the parameter.

use hipify_ast::{CalleeResolution, ExprKind, KernelLaunchExpr, ParamListLoc, Span};
use tracing::debug;

use crate::dispatch::{MatchBinding, MatchContext, MatchHandler, PassOutput};
use crate::edit::{Provenance, RewriteContext, TextEdit, VerbatimSegment};
use crate::rewrite::expr_span;

/// The literal names a launch is rewritten to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSyntax {
    /// Function replacing the launch expression
    pub launch_fn: String,
    /// Macro wrapping the kernel name
    pub kernel_name_macro: String,
    /// Synthetic first kernel parameter
    pub launch_param: String,
    /// Dimension-triple type; configuration arguments of this type are
    /// wrapped in an explicit constructor call
    pub dim_type: String,
}

impl Default for LaunchSyntax {
    fn default() -> Self {
        Self {
            launch_fn: "hipLaunchKernel".to_string(),
            kernel_name_macro: "HIP_KERNEL_NAME".to_string(),
            launch_param: "hipLaunchParm lp".to_string(),
            dim_type: "dim3".to_string(),
        }
    }
}

/// Rewrites launch expressions.
pub struct KernelLaunchRewriter;

impl MatchHandler for KernelLaunchRewriter {
    fn on_match(&self, binding: MatchBinding<'_>, cx: &MatchContext<'_>, out: &mut PassOutput) {
        let MatchBinding::Expr(expr) = binding else {
            return;
        };
        let ExprKind::KernelLaunch(launch) = &expr.kind else {
            return;
        };
        let kernel = launch.callee_name.as_str();

        out.edits.push(launch_edit(expr_span(expr), launch, cx));

        match launch.resolution {
            CalleeResolution::Function(id) => {
                let before = out.edits.len();
                for entry in cx.unit.redeclarations(id) {
                    debug!(kernel, id = entry.id.0, "adding launch parameter to kernel");
                    out.edits.push(param_list_edit(&entry.params, kernel, cx));
                }
                if out.edits.len() == before {
                    out.deferred_templates.insert(kernel.to_string());
                }
            }
            CalleeResolution::Template | CalleeResolution::Unresolved => {
                debug!(kernel, "deferring launch parameter to function templates");
                out.deferred_templates.insert(kernel.to_string());
            }
        }
    }
}

/// Adds the launch parameter to function templates named by unresolved
/// launches.
pub struct TemplateParamsRewriter;

impl MatchHandler for TemplateParamsRewriter {
    fn on_match(&self, binding: MatchBinding<'_>, cx: &MatchContext<'_>, out: &mut PassOutput) {
        let MatchBinding::FunctionTemplate(template) = binding else {
            return;
        };
        debug!(kernel = template.name(), "adding launch parameter to template");
        out.edits.push(param_list_edit(
            &template.function.params.loc,
            template.name(),
            cx,
        ));
    }
}

/// The composite edit replacing the whole launch expression.
fn launch_edit(span: Span, launch: &KernelLaunchExpr, cx: &MatchContext<'_>) -> TextEdit {
    let syntax = cx.launch;
    let mut builder = CompositeBuilder::new(cx.source);

    builder.push(&syntax.launch_fn);
    builder.push("(");
    builder.push(&syntax.kernel_name_macro);
    builder.push("(");
    builder.copy(launch.callee.span);
    builder.push(")");

    for config in &launch.config {
        builder.push(", ");
        match &config.value {
            None => builder.push("0"),
            Some(value) if *config.param_type == *syntax.dim_type => {
                builder.push(&syntax.dim_type);
                builder.push("(");
                builder.copy(value.span);
                builder.push(")");
            }
            Some(value) => builder.copy(value.span),
        }
    }
    for arg in &launch.args {
        builder.push(", ");
        builder.copy(arg.span);
    }
    builder.push(")");

    debug!(
        kernel = launch.callee_name.as_str(),
        config = launch.config.len(),
        args = launch.args.len(),
        "rewrite kernel launch"
    );
    let (text, segments) = builder.finish();
    TextEdit::composite(
        span,
        text,
        segments,
        Provenance::new(RewriteContext::KernelLaunch, launch.callee_name.as_str()),
    )
}

/// Insert the launch parameter at the head of a parameter list.
fn param_list_edit(loc: &ParamListLoc, kernel: &str, cx: &MatchContext<'_>) -> TextEdit {
    let param = &cx.launch.launch_param;
    let provenance = Provenance::new(RewriteContext::KernelParams, kernel);
    if let Some(void) = loc.void_span {
        TextEdit::replace(void, param.as_str(), provenance)
    } else if let Some(first) = loc.first_param {
        TextEdit::insert(first.start, format!("{}, ", param), provenance)
    } else {
        TextEdit::insert(loc.open.end, param.as_str(), provenance)
    }
}

/// Replacement text that records which parts were copied from the source.
struct CompositeBuilder<'a> {
    source: &'a str,
    text: String,
    segments: Vec<VerbatimSegment>,
}

impl<'a> CompositeBuilder<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            text: String::new(),
            segments: Vec::new(),
        }
    }

    fn push(&mut self, literal: &str) {
        self.text.push_str(literal);
    }

    fn copy(&mut self, span: Span) {
        self.segments.push(VerbatimSegment {
            source: span,
            output_offset: self.text.len() as u32,
        });
        self.text.push_str(span.text(self.source));
    }

    fn finish(self) -> (String, Vec<VerbatimSegment>) {
        (self.text, self.segments)
    }
}
