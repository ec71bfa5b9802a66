//! End-to-end tests of the reference front end through the `FrontEnd` trait.
//!
//! Covers:
//! - Host and device views of one source
//! - Kernels, templates, launches and vendor names in a realistic file
//! - Fatal errors reported as `FrontEndError`

use hipify_ast::walk::{walk_unit, Node};
use hipify_ast::{
    CalleeResolution, Decl, DeclKind, ExprKind, FrontEnd, PpEvent, TranslationUnit,
};
use hipify_frontend::ReferenceFrontEnd;

const VECTOR_ADD: &str = r#"#include <cuda_runtime.h>
#include "helpers.h"

#define CHECK(call) do { cudaError_t e = (call); if (e != cudaSuccess) return 1; } while (0)

template <typename T>
__global__ void add(const T *a, const T *b, T *c, int n) {
    int i = blockIdx.x * blockDim.x + threadIdx.x;
    if (i < n) c[i] = a[i] + b[i];
}

__device__ float twice(float x) { return 2.0f * x; }

#ifdef __CUDA_ARCH__
__device__ int arch_only;
#else
int host_only(cudaStream_t stream) {
    float *d = nullptr;
    CHECK(cudaMalloc((void **)&d, 16 * sizeof(float)));
    add<float><<<dim3(4), 256, 0, stream>>>(d, d, d, 4);
    cudaMemcpyKind kind = cudaMemcpyDeviceToHost;
    return 0;
}
#endif
"#;

fn parse(source: &str, view: &str) -> TranslationUnit {
    ReferenceFrontEnd::default()
        .parse(source, &[view.to_string(), "-std=c++11".to_string()])
        .expect("unit should parse")
}

fn top_level_names(unit: &TranslationUnit) -> Vec<String> {
    unit.decls
        .iter()
        .filter_map(|d| match d {
            Decl::Function(f) => Some(f.name.as_str().to_string()),
            Decl::FunctionTemplate(t) => Some(t.name().to_string()),
            Decl::Var(v) => Some(v.name.as_str().to_string()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_views_see_different_regions() {
    let host = parse(VECTOR_ADD, "--cuda-host-only");
    let device = parse(VECTOR_ADD, "--cuda-device-only");

    assert_eq!(top_level_names(&host), ["add", "twice", "host_only"]);
    assert_eq!(top_level_names(&device), ["add", "twice", "arch_only"]);
}

#[test]
fn test_kernel_qualifiers_and_registry() {
    let unit = parse(VECTOR_ADD, "--cuda-host-only");
    let Some(Decl::FunctionTemplate(add)) = unit.decls.first() else {
        panic!("expected function template first, got {:?}", unit.decls.first());
    };
    assert!(add.function.qualifiers.is_kernel());
    assert_eq!(add.function.params.loc.param_count, 4);

    let entry = unit.function(add.function.id).unwrap();
    assert!(entry.is_template);
    assert!(entry.is_definition);
}

#[test]
fn test_host_view_expressions() {
    let unit = parse(VECTOR_ADD, "--cuda-host-only");
    let mut launches = Vec::new();
    let mut vendor_refs = Vec::new();
    let mut macro_names = Vec::new();
    walk_unit(&unit, &mut |node| {
        if let Node::Expr(e) = node {
            match &e.kind {
                ExprKind::KernelLaunch(l) => launches.push(l.resolution),
                ExprKind::DeclRef(r) if r.decl.as_ref().is_some_and(|d| d.is_vendor()) => {
                    vendor_refs.push(r.name.as_str().to_string());
                }
                ExprKind::MacroExpansion { name, .. } => {
                    macro_names.push(name.as_str().to_string())
                }
                _ => {}
            }
        }
    });

    assert_eq!(launches, [CalleeResolution::Template]);
    assert!(vendor_refs.contains(&"cudaMalloc".to_string()));
    assert!(vendor_refs.contains(&"cudaMemcpyDeviceToHost".to_string()));
    assert_eq!(macro_names, ["CHECK"]);
}

#[test]
fn test_builtin_variables_resolve() {
    let unit = parse(VECTOR_ADD, "--cuda-device-only");
    let mut builtins = Vec::new();
    walk_unit(&unit, &mut |node| {
        if let Node::Expr(e) = node {
            if let ExprKind::DeclRef(r) = &e.kind {
                if let Some(DeclKind::BuiltinVariable { record }) = r.decl.as_ref().map(|d| &d.kind)
                {
                    builtins.push(record.to_string());
                }
            }
        }
    });
    assert_eq!(
        builtins,
        [
            "__cuda_builtin_blockIdx_t",
            "__cuda_builtin_blockDim_t",
            "__cuda_builtin_threadIdx_t"
        ]
    );
}

#[test]
fn test_preprocessor_events_in_source_order() {
    let unit = parse(VECTOR_ADD, "--cuda-host-only");
    let includes: Vec<_> = unit
        .preprocessor
        .iter()
        .filter_map(|e| match e {
            PpEvent::Inclusion(i) => Some((i.file_name.to_string(), i.angled)),
            _ => None,
        })
        .collect();
    assert_eq!(
        includes,
        [
            ("cuda_runtime.h".to_string(), true),
            ("helpers.h".to_string(), false)
        ]
    );
    let spans: Vec<_> = unit.preprocessor.iter().map(|e| e.span().start).collect();
    assert!(spans.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_unknown_constructs_are_skimmed() {
    let source = "int before;\n\
                  class Widget : public Base<Widget> { public: void f() {} };\n\
                  operator_soup + = ;\n\
                  int after;\n";
    let unit = parse(source, "--cuda-host-only");
    let names = top_level_names(&unit);
    assert_eq!(names.first().map(String::as_str), Some("before"));
    assert_eq!(names.last().map(String::as_str), Some("after"));
}

#[test]
fn test_fatal_errors() {
    let front_end = ReferenceFrontEnd::default();

    let err = front_end
        .parse("void f() { k<<<1, 2, 3, 4, 5>>>(); }", &[])
        .unwrap_err();
    assert!(err.message.contains("too many"));

    let err = front_end.parse("void f() { (; }", &[]).unwrap_err();
    assert!(err.span.is_some());

    let err = front_end.parse("#if 1\nint x;\n", &[]).unwrap_err();
    assert!(err.message.contains("unterminated"));

    let err = front_end
        .parse("int x;", &["-D".to_string()])
        .unwrap_err();
    assert!(err.span.is_none());
}
