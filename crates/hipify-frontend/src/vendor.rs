//! Built-in model of the CUDA runtime header.
//!
//! The reference front end never reads system headers. Instead, every name
//! the runtime header would make visible is described here: runtime
//! functions, enumerations with their enumerators, records, typedefs, the
//! builtin coordinate objects and the execution-configuration signature.
//! References that resolve to these declarations carry
//! [`DeclOrigin::Vendor`].

use hipify_ast::{DeclKind, DeclOrigin, ResolvedDecl, TypeInfo, TypeKind};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Runtime API functions.
const FUNCTIONS: &[&str] = &[
    // Errors
    "cudaGetLastError",
    "cudaPeekAtLastError",
    "cudaGetErrorName",
    "cudaGetErrorString",
    // Memory
    "cudaMalloc",
    "cudaMallocHost",
    "cudaMallocManaged",
    "cudaMallocPitch",
    "cudaHostAlloc",
    "cudaFree",
    "cudaFreeHost",
    "cudaMemcpy",
    "cudaMemcpyAsync",
    "cudaMemcpy2D",
    "cudaMemcpyToSymbol",
    "cudaMemcpyFromSymbol",
    "cudaMemcpyPeer",
    "cudaMemcpyPeerAsync",
    "cudaMemset",
    "cudaMemsetAsync",
    "cudaMemGetInfo",
    "cudaGetSymbolAddress",
    // Events
    "cudaEventCreate",
    "cudaEventCreateWithFlags",
    "cudaEventDestroy",
    "cudaEventRecord",
    "cudaEventElapsedTime",
    "cudaEventSynchronize",
    "cudaEventQuery",
    // Streams
    "cudaStreamCreate",
    "cudaStreamCreateWithFlags",
    "cudaStreamDestroy",
    "cudaStreamWaitEvent",
    "cudaStreamSynchronize",
    "cudaStreamQuery",
    // Device management
    "cudaDeviceSynchronize",
    "cudaThreadSynchronize",
    "cudaDeviceReset",
    "cudaThreadExit",
    "cudaSetDevice",
    "cudaGetDevice",
    "cudaGetDeviceCount",
    "cudaGetDeviceProperties",
    "cudaSetDeviceFlags",
    "cudaDeviceSetCacheConfig",
    "cudaThreadSetCacheConfig",
    "cudaDeviceGetCacheConfig",
    "cudaThreadGetCacheConfig",
    "cudaFuncSetCacheConfig",
    "cudaFuncGetAttributes",
    "cudaDeviceSetSharedMemConfig",
    "cudaThreadSetSharedMemConfig",
    "cudaDeviceGetSharedMemConfig",
    "cudaThreadGetSharedMemConfig",
    "cudaDriverGetVersion",
    "cudaRuntimeGetVersion",
    // Peer access
    "cudaDeviceCanAccessPeer",
    "cudaDeviceDisablePeerAccess",
    "cudaDeviceEnablePeerAccess",
    // Profiler
    "cudaProfilerStart",
    "cudaProfilerStop",
    // Textures
    "cudaCreateChannelDesc",
    "cudaBindTexture",
    "cudaUnbindTexture",
    "tex1D",
    "tex1Dfetch",
    "tex2D",
    // Device-side intrinsics
    "__syncthreads",
    "__threadfence",
    "atomicAdd",
    "atomicSub",
    "atomicExch",
    "atomicMin",
    "atomicMax",
    "atomicCAS",
];

/// Enumerations and their enumerators.
const ENUMS: &[(&str, &[&str])] = &[
    (
        "cudaError",
        &[
            "cudaSuccess",
            "cudaErrorMissingConfiguration",
            "cudaErrorMemoryAllocation",
            "cudaErrorInitializationError",
            "cudaErrorLaunchFailure",
            "cudaErrorLaunchOutOfResources",
            "cudaErrorInvalidConfiguration",
            "cudaErrorInvalidDevice",
            "cudaErrorInvalidValue",
            "cudaErrorInvalidDevicePointer",
            "cudaErrorInvalidMemcpyDirection",
            "cudaErrorInvalidResourceHandle",
            "cudaErrorMemoryFree",
            "cudaErrorUnknownSymbol",
            "cudaErrorOutOfResources",
            "cudaErrorNotReady",
            "cudaErrorNoDevice",
            "cudaErrorUnknown",
        ],
    ),
    (
        "cudaMemcpyKind",
        &[
            "cudaMemcpyHostToHost",
            "cudaMemcpyHostToDevice",
            "cudaMemcpyDeviceToHost",
            "cudaMemcpyDeviceToDevice",
            "cudaMemcpyDefault",
        ],
    ),
    (
        "cudaFuncCache",
        &[
            "cudaFuncCachePreferNone",
            "cudaFuncCachePreferShared",
            "cudaFuncCachePreferL1",
            "cudaFuncCachePreferEqual",
        ],
    ),
    (
        "cudaSharedMemConfig",
        &[
            "cudaSharedMemBankSizeDefault",
            "cudaSharedMemBankSizeFourByte",
            "cudaSharedMemBankSizeEightByte",
        ],
    ),
    (
        "cudaTextureFilterMode",
        &["cudaFilterModePoint", "cudaFilterModeLinear"],
    ),
    (
        "cudaTextureReadMode",
        &["cudaReadModeElementType", "cudaReadModeNormalizedFloat"],
    ),
    (
        "cudaChannelFormatKind",
        &[
            "cudaChannelFormatKindSigned",
            "cudaChannelFormatKindUnsigned",
            "cudaChannelFormatKindFloat",
            "cudaChannelFormatKindNone",
        ],
    ),
];

/// Record types (including class templates such as `texture`).
const RECORDS: &[&str] = &[
    "cudaDeviceProp",
    "cudaChannelFormatDesc",
    "cudaFuncAttributes",
    "cudaPointerAttributes",
    "cudaArray",
    "textureReference",
    "texture",
    "dim3",
    "uint3",
    "CUstream_st",
    "CUevent_st",
];

/// Typedefs: name, target, pointer levels added by the typedef.
const TYPEDEFS: &[(&str, &str, u8)] = &[
    ("cudaError_t", "cudaError", 0),
    ("cudaStream_t", "CUstream_st", 1),
    ("cudaEvent_t", "CUevent_st", 1),
    ("cudaArray_t", "cudaArray", 1),
];

/// Standard library typedefs the runtime header pulls in; they are not
/// part of the vendor API.
const STANDARD_TYPES: &[&str] = &["size_t", "ptrdiff_t"];

/// Builtin coordinate objects and their record types.
const BUILTIN_VARIABLES: &[(&str, &str)] = &[
    ("threadIdx", "__cuda_builtin_threadIdx_t"),
    ("blockIdx", "__cuda_builtin_blockIdx_t"),
    ("blockDim", "__cuda_builtin_blockDim_t"),
    ("gridDim", "__cuda_builtin_gridDim_t"),
];

/// Prefix of the accessor fields of the builtin coordinate records.
pub const BUILTIN_FIELD_PREFIX: &str = "__fetch_builtin_";

/// Plain variables.
const VARIABLES: &[&str] = &["warpSize"];

/// One parameter of the execution-configuration signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigParam {
    pub ty: Rc<str>,
    pub name: &'static str,
    /// Parameter has a default argument
    pub defaulted: bool,
}

/// The declarations the vendor runtime header makes visible.
#[derive(Debug, Clone)]
pub struct VendorModel {
    functions: HashSet<Rc<str>>,
    enumerators: HashMap<Rc<str>, Rc<str>>,
    types: HashMap<Rc<str>, TypeInfo>,
    builtin_variables: HashMap<Rc<str>, Rc<str>>,
    variables: HashSet<Rc<str>>,
    launch_config: Vec<ConfigParam>,
}

impl Default for VendorModel {
    fn default() -> Self {
        Self::cuda_runtime()
    }
}

impl VendorModel {
    /// Model of `cuda_runtime.h`.
    pub fn cuda_runtime() -> Self {
        let mut types = HashMap::new();
        for (name, _) in ENUMS {
            types.insert(Rc::from(*name), vendor_type(TypeKind::Enum, TypeKind::Enum, 0));
        }
        for name in RECORDS {
            types.insert(Rc::from(*name), vendor_type(TypeKind::Record, TypeKind::Record, 0));
        }
        for (name, target, depth) in TYPEDEFS {
            let canonical = match types.get(*target) {
                Some(info) => info.canonical,
                None => TypeKind::Builtin,
            };
            types.insert(Rc::from(*name), vendor_type(TypeKind::Typedef, canonical, *depth));
        }
        for name in STANDARD_TYPES {
            types.insert(Rc::from(*name), vendor_type(TypeKind::Builtin, TypeKind::Builtin, 0));
        }

        let enumerators = ENUMS
            .iter()
            .flat_map(|(enumeration, values)| {
                values
                    .iter()
                    .map(move |value| (Rc::from(*value), Rc::from(*enumeration)))
            })
            .collect();

        let launch_config = vec![
            ConfigParam {
                ty: "dim3".into(),
                name: "gridDim",
                defaulted: false,
            },
            ConfigParam {
                ty: "dim3".into(),
                name: "blockDim",
                defaulted: false,
            },
            ConfigParam {
                ty: "size_t".into(),
                name: "sharedMem",
                defaulted: true,
            },
            ConfigParam {
                ty: "cudaStream_t".into(),
                name: "stream",
                defaulted: true,
            },
        ];

        Self {
            functions: FUNCTIONS.iter().map(|f| Rc::from(*f)).collect(),
            enumerators,
            types,
            builtin_variables: BUILTIN_VARIABLES
                .iter()
                .map(|(var, record)| (Rc::from(*var), Rc::from(*record)))
                .collect(),
            variables: VARIABLES.iter().map(|v| Rc::from(*v)).collect(),
            launch_config,
        }
    }

    /// Resolve a value name (function, enumerator, variable).
    pub fn resolve_value(&self, name: &str) -> Option<ResolvedDecl> {
        let kind = if self.functions.contains(name) {
            DeclKind::Function
        } else if let Some(enumeration) = self.enumerators.get(name) {
            DeclKind::EnumConstant {
                enumeration: enumeration.clone(),
            }
        } else if let Some(record) = self.builtin_variables.get(name) {
            DeclKind::BuiltinVariable {
                record: record.clone(),
            }
        } else if self.variables.contains(name) {
            DeclKind::Variable
        } else {
            return None;
        };
        Some(ResolvedDecl::new(name, kind, DeclOrigin::Vendor))
    }

    /// Type information for a vendor type name.
    pub fn type_info(&self, name: &str) -> Option<TypeInfo> {
        self.types.get(name).copied()
    }

    /// Field a member of a builtin coordinate record resolves to.
    ///
    /// `threadIdx.x` reads the field `__fetch_builtin_x` of
    /// `__cuda_builtin_threadIdx_t`.
    pub fn builtin_member(&self, record: &str, member: &str) -> Option<Rc<str>> {
        let known = self.builtin_variables.values().any(|r| &**r == record);
        (known && matches!(member, "x" | "y" | "z"))
            .then(|| Rc::from(format!("{}{}", BUILTIN_FIELD_PREFIX, member)))
    }

    /// The execution-configuration signature of a kernel launch.
    pub fn launch_config(&self) -> &[ConfigParam] {
        &self.launch_config
    }

    /// Number of configuration arguments a launch must provide.
    pub fn required_config_args(&self) -> usize {
        self.launch_config.iter().filter(|p| !p.defaulted).count()
    }
}

fn vendor_type(kind: TypeKind, canonical: TypeKind, alias_pointer_depth: u8) -> TypeInfo {
    TypeInfo {
        kind,
        canonical,
        alias_pointer_depth,
        origin: DeclOrigin::Vendor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_values() {
        let vendor = VendorModel::cuda_runtime();
        assert_eq!(vendor.resolve_value("cudaMalloc").unwrap().kind, DeclKind::Function);
        assert_eq!(
            vendor.resolve_value("cudaMemcpyHostToDevice").unwrap().kind,
            DeclKind::EnumConstant {
                enumeration: "cudaMemcpyKind".into()
            }
        );
        assert_eq!(
            vendor.resolve_value("threadIdx").unwrap().kind,
            DeclKind::BuiltinVariable {
                record: "__cuda_builtin_threadIdx_t".into()
            }
        );
        assert!(vendor.resolve_value("myHelper").is_none());
    }

    #[test]
    fn test_typedefs_look_through() {
        let vendor = VendorModel::cuda_runtime();
        let stream = vendor.type_info("cudaStream_t").unwrap();
        assert_eq!(stream.kind, TypeKind::Typedef);
        assert_eq!(stream.canonical, TypeKind::Record);
        assert_eq!(stream.alias_pointer_depth, 1);

        let error = vendor.type_info("cudaError_t").unwrap();
        assert_eq!(error.canonical, TypeKind::Enum);

        let size = vendor.type_info("size_t").unwrap();
        assert_eq!(size.kind, TypeKind::Builtin);
    }

    #[test]
    fn test_builtin_member() {
        let vendor = VendorModel::cuda_runtime();
        assert_eq!(
            vendor.builtin_member("__cuda_builtin_blockDim_t", "y").as_deref(),
            Some("__fetch_builtin_y")
        );
        assert!(vendor.builtin_member("__cuda_builtin_blockDim_t", "w").is_none());
        assert!(vendor.builtin_member("dim3", "x").is_none());
    }

    #[test]
    fn test_launch_signature() {
        let vendor = VendorModel::cuda_runtime();
        let types: Vec<&str> = vendor.launch_config().iter().map(|p| &*p.ty).collect();
        assert_eq!(types, vec!["dim3", "dim3", "size_t", "cudaStream_t"]);
        assert_eq!(vendor.required_config_args(), 2);
    }
}
