//! End-to-end tests of the engine with the reference front end.
//!
//! Covers:
//! - A realistic CUDA file rewritten line for line
//! - Host-only and device-only regions
//! - Idempotence on already converted output
//! - File placement, backups and failure handling
//! - Sources that are not UTF-8

use std::fs;

use hipify_core::output::backup_path;
use hipify_core::{
    plan_output, CompilationPass, Engine, EngineError, FileStatus, RewriteContext,
};
use hipify_frontend::ReferenceFrontEnd;
use tempfile::TempDir;

const VECTOR_ADD: &str = r#"#include <cuda_runtime.h>
#include "helpers.h"

#define CHECK(call) do { cudaError_t e = (call); if (e != cudaSuccess) return 1; } while (0)

template <typename T>
__global__ void add(const T *a, const T *b, T *c, int n) {
    int i = blockIdx.x * blockDim.x + threadIdx.x;
    if (i < n) c[i] = a[i] + b[i];
}

#ifdef __CUDA_ARCH__
__device__ cudaError_t last_error = cudaSuccess;
#else
int run(cudaStream_t stream, int n) {
    float *d = nullptr;
    const char *msg = "cudaMalloc failed";
    CHECK(cudaMalloc((void **)&d, n * sizeof(float)));
    add<float><<<dim3(4), 256, 0, stream>>>(d, d, d, n);
    cudaMemcpyKind kind = cudaMemcpyDeviceToHost;
    CHECK(cudaFree(d));
    return 0;
}
#endif
"#;

const VECTOR_ADD_HIP: &str = r#"#include <hip_runtime.h>
#include "helpers.h"

#define CHECK(call) do { hipError_t e = (call); if (e != hipSuccess) return 1; } while (0)

template <typename T>
__global__ void add(hipLaunchParm lp, const T *a, const T *b, T *c, int n) {
    int i = hipBlockIdx_x * hipBlockDim_x + hipThreadIdx_x;
    if (i < n) c[i] = a[i] + b[i];
}

#ifdef __CUDA_ARCH__
__device__ hipError_t last_error = hipSuccess;
#else
int run(hipStream_t stream, int n) {
    float *d = nullptr;
    const char *msg = "hipMalloc failed";
    CHECK(hipMalloc((void **)&d, n * sizeof(float)));
    hipLaunchKernel(HIP_KERNEL_NAME(add<float>), dim3(dim3(4)), dim3(256), 0, stream, d, d, d, n);
    hipMemcpyKind kind = hipMemcpyDeviceToHost;
    CHECK(hipFree(d));
    return 0;
}
#endif
"#;

fn engine() -> Engine<ReferenceFrontEnd> {
    Engine::new(ReferenceFrontEnd::default())
}

#[test]
fn test_vector_add_rewritten() {
    let result = engine().transform(VECTOR_ADD).unwrap();
    assert_eq!(result.output, VECTOR_ADD_HIP);
    assert!(result.skipped.is_empty(), "skipped: {:?}", result.skipped);
    assert!(result.duplicates > 0, "both passes see the shared code");
}

#[test]
fn test_line_structure_preserved() {
    let result = engine().transform(VECTOR_ADD).unwrap();
    assert_eq!(result.output.lines().count(), VECTOR_ADD.lines().count());
}

#[test]
fn test_device_region_only_rewritten_by_device_pass() {
    let source = "#ifdef __CUDA_ARCH__\n__device__ cudaError_t err = cudaSuccess;\n#endif\n";
    let result = engine().transform(source).unwrap();
    assert_eq!(
        result.output,
        "#ifdef __CUDA_ARCH__\n__device__ hipError_t err = hipSuccess;\n#endif\n"
    );
    assert_eq!(result.duplicates, 0);
}

#[test]
fn test_output_is_a_fixed_point() {
    let first = engine().transform(VECTOR_ADD).unwrap();
    let second = engine().transform(&first.output).unwrap();
    assert_eq!(second.output, first.output);
    assert!(second.applied.is_empty(), "applied: {:?}", second.applied);
}

#[test]
fn test_provenance_of_merged_edits() {
    let result = engine().transform(VECTOR_ADD).unwrap();
    let contexts: Vec<_> = result
        .applied
        .iter()
        .map(|edit| edit.provenance.context)
        .collect();
    assert!(contexts.contains(&RewriteContext::IncludeDirective));
    assert!(contexts.contains(&RewriteContext::MacroDefine));
    assert!(contexts.contains(&RewriteContext::KernelLaunch));
    assert!(contexts.contains(&RewriteContext::KernelParams));
    assert!(contexts.contains(&RewriteContext::BuiltinMember));
    assert!(contexts.contains(&RewriteContext::EnumTypedVar));
    assert!(contexts.contains(&RewriteContext::StringLiteral));
}

#[test]
fn test_device_parse_error_fails_whole_file() {
    let source = "void h() { cudaDeviceReset(); }\n#ifdef __CUDA_ARCH__\n#error no device\n#endif\n";
    let err = engine().transform(source).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Parse {
            pass: CompilationPass::Device,
            line: 3,
            ..
        }
    ));
}

#[test]
fn test_macro_argument_count_mismatch_fails_file() {
    let source = "#define K(x) x\n__global__ void k() {}\nvoid h() { K(k<<<1, 1>>>()); }\n";
    let err = engine().transform(source).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Parse {
            pass: CompilationPass::Host,
            line: 3,
            column: 12,
            ..
        }
    ));
}

#[test]
fn test_cu_file_written_next_to_input() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("vector_add.cu");
    fs::write(&input, VECTOR_ADD).unwrap();

    let plan = plan_output(&input, None, false).unwrap();
    let report = engine().process_file(&plan);

    assert_eq!(report.status, FileStatus::Rewritten);
    assert_eq!(
        fs::read_to_string(dir.path().join("vector_add.hip")).unwrap(),
        VECTOR_ADD_HIP
    );
    assert_eq!(fs::read_to_string(&input).unwrap(), VECTOR_ADD);
}

#[test]
fn test_in_place_keeps_backup_and_reruns_from_it() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("vector_add.cu");
    fs::write(&input, VECTOR_ADD).unwrap();

    let plan = plan_output(&input, None, true).unwrap();
    let first = engine().process_file(&plan);
    assert_eq!(first.status, FileStatus::Rewritten);
    assert_eq!(fs::read_to_string(backup_path(&input)).unwrap(), VECTOR_ADD);
    assert_eq!(fs::read_to_string(&input).unwrap(), VECTOR_ADD_HIP);

    let plan = plan_output(&input, None, true).unwrap();
    assert_eq!(plan.read_from, backup_path(&input));
    let second = engine().process_file(&plan);
    assert_eq!(second.applied, first.applied);
    assert_eq!(fs::read_to_string(&input).unwrap(), VECTOR_ADD_HIP);
    assert_eq!(fs::read_to_string(backup_path(&input)).unwrap(), VECTOR_ADD);
}

#[test]
fn test_failed_file_left_untouched() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("broken.cu");
    let source = "void h() { k<<<1>>>(); }\n";
    fs::write(&input, source).unwrap();

    let plan = plan_output(&input, None, true).unwrap();
    let report = engine().process_file(&plan);

    assert_eq!(report.status, FileStatus::Failed);
    assert!(report.error.unwrap().starts_with("host pass: 1:13:"));
    assert_eq!(fs::read_to_string(&input).unwrap(), source);
    assert!(!backup_path(&input).exists());
    assert!(!dir.path().join("broken.hip").exists());
}

#[test]
fn test_unchanged_file_still_written() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("plain.cu");
    fs::write(&input, "int main() { return 0; }\n").unwrap();

    let report = engine().process_file(&plan_output(&input, None, false).unwrap());
    assert_eq!(report.status, FileStatus::Unchanged);
    assert_eq!(
        fs::read_to_string(dir.path().join("plain.hip")).unwrap(),
        "int main() { return 0; }\n"
    );
}

#[test]
fn test_latin1_source_bytes_preserved() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("k.cu");
    fs::write(&input, b"// r\xe9sum\xe9\nvoid f(float *d) { cudaFree(d); }\n").unwrap();

    let report = engine().process_file(&plan_output(&input, None, false).unwrap());

    assert_eq!(report.status, FileStatus::Rewritten);
    assert_eq!(
        fs::read(dir.path().join("k.hip")).unwrap(),
        b"// r\xe9sum\xe9\nvoid f(float *d) { hipFree(d); }\n".to_vec()
    );
    assert_eq!(report.applied[0].line, 2);
    assert_eq!(report.applied[0].offset, 29);
}
