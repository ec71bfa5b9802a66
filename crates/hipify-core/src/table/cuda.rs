//! CUDA runtime to HIP entries, grouped by symbol class.
//!
//! Coordinate builtins (`threadIdx.x`, ...) are generated in
//! [`RenameTable::cuda_to_hip`](super::RenameTable::cuda_to_hip).

use super::SymbolClass;

type Entries = &'static [(&'static str, &'static str)];

pub(super) const ENTRIES: &[(SymbolClass, Entries)] = &[
    (SymbolClass::Macro, MACROS),
    (SymbolClass::Header, HEADERS),
    (SymbolClass::Type, TYPES),
    (SymbolClass::EnumConstant, ENUM_CONSTANTS),
    (SymbolClass::Function, FUNCTIONS),
    (SymbolClass::Variable, VARIABLES),
];

const MACROS: Entries = &[
    ("__CUDACC__", "__HIPCC__"),
    ("cudaStreamDefault", "hipStreamDefault"),
    ("cudaStreamNonBlocking", "hipStreamNonBlocking"),
];

const HEADERS: Entries = &[
    ("cuda_runtime.h", "hip_runtime.h"),
    ("cuda_runtime_api.h", "hip_runtime_api.h"),
];

const TYPES: Entries = &[
    ("cudaError_t", "hipError_t"),
    ("cudaError", "hipError"),
    ("cudaMemcpyKind", "hipMemcpyKind"),
    ("cudaEvent_t", "hipEvent_t"),
    ("cudaStream_t", "hipStream_t"),
    ("cudaDeviceProp", "hipDeviceProp_t"),
    ("cudaFuncCache", "hipFuncCache"),
    ("cudaSharedMemConfig", "hipSharedMemConfig"),
    ("cudaChannelFormatDesc", "hipChannelFormatDesc"),
];

const ENUM_CONSTANTS: Entries = &[
    // Error codes
    ("cudaSuccess", "hipSuccess"),
    ("cudaErrorUnknown", "hipErrorUnknown"),
    ("cudaErrorMemoryAllocation", "hipErrorMemoryAllocation"),
    ("cudaErrorMemoryFree", "hipErrorMemoryFree"),
    ("cudaErrorUnknownSymbol", "hipErrorUnknownSymbol"),
    ("cudaErrorOutOfResources", "hipErrorOutOfResources"),
    ("cudaErrorInvalidValue", "hipErrorInvalidValue"),
    ("cudaErrorInvalidResourceHandle", "hipErrorInvalidResourceHandle"),
    ("cudaErrorInvalidDevice", "hipErrorInvalidDevice"),
    ("cudaErrorNoDevice", "hipErrorNoDevice"),
    ("cudaErrorNotReady", "hipErrorNotReady"),
    // Copy directions
    ("cudaMemcpyHostToHost", "hipMemcpyHostToHost"),
    ("cudaMemcpyHostToDevice", "hipMemcpyHostToDevice"),
    ("cudaMemcpyDeviceToHost", "hipMemcpyDeviceToHost"),
    ("cudaMemcpyDeviceToDevice", "hipMemcpyDeviceToDevice"),
    ("cudaMemcpyDefault", "hipMemcpyDefault"),
    // Cache and shared memory configuration
    ("cudaFuncCachePreferNone", "hipFuncCachePreferNone"),
    ("cudaFuncCachePreferShared", "hipFuncCachePreferShared"),
    ("cudaFuncCachePreferL1", "hipFuncCachePreferL1"),
    ("cudaFuncCachePreferEqual", "hipFuncCachePreferEqual"),
    ("cudaSharedMemBankSizeDefault", "hipSharedMemBankSizeDefault"),
    ("cudaSharedMemBankSizeFourByte", "hipSharedMemBankSizeFourByte"),
    ("cudaSharedMemBankSizeEightByte", "hipSharedMemBankSizeEightByte"),
    // Textures
    ("cudaFilterModePoint", "hipFilterModePoint"),
    ("cudaReadModeElementType", "hipReadModeElementType"),
];

const FUNCTIONS: Entries = &[
    // Errors
    ("cudaGetLastError", "hipGetLastError"),
    ("cudaPeekAtLastError", "hipPeekAtLastError"),
    ("cudaGetErrorName", "hipGetErrorName"),
    ("cudaGetErrorString", "hipGetErrorString"),
    // Copies
    ("cudaMemcpy", "hipMemcpy"),
    ("cudaMemcpyToSymbol", "hipMemcpyToSymbol"),
    ("cudaMemset", "hipMemset"),
    ("cudaMemsetAsync", "hipMemsetAsync"),
    ("cudaMemcpyAsync", "hipMemcpyAsync"),
    ("cudaMemGetInfo", "hipMemGetInfo"),
    // Memory management
    ("cudaMalloc", "hipMalloc"),
    ("cudaMallocHost", "hipHostAlloc"),
    ("cudaFree", "hipFree"),
    ("cudaFreeHost", "hipHostFree"),
    // Events
    ("cudaEventCreate", "hipEventCreate"),
    ("cudaEventCreateWithFlags", "hipEventCreateWithFlags"),
    ("cudaEventDestroy", "hipEventDestroy"),
    ("cudaEventRecord", "hipEventRecord"),
    ("cudaEventElapsedTime", "hipEventElapsedTime"),
    ("cudaEventSynchronize", "hipEventSynchronize"),
    // Streams
    ("cudaStreamCreate", "hipStreamCreate"),
    ("cudaStreamCreateWithFlags", "hipStreamCreateWithFlags"),
    ("cudaStreamDestroy", "hipStreamDestroy"),
    ("cudaStreamWaitEvent", "hipStreamWaitEvent"),
    ("cudaStreamSynchronize", "hipStreamSynchronize"),
    // Device management; thread-level calls are deprecated aliases
    ("cudaDeviceSynchronize", "hipDeviceSynchronize"),
    ("cudaThreadSynchronize", "hipDeviceSynchronize"),
    ("cudaDeviceReset", "hipDeviceReset"),
    ("cudaThreadExit", "hipDeviceReset"),
    ("cudaSetDevice", "hipSetDevice"),
    ("cudaGetDevice", "hipGetDevice"),
    ("cudaGetDeviceCount", "hipGetDeviceCount"),
    ("cudaGetDeviceProperties", "hipDeviceGetProperties"),
    ("cudaDeviceSetCacheConfig", "hipDeviceSetCacheConfig"),
    ("cudaThreadSetCacheConfig", "hipDeviceSetCacheConfig"),
    ("cudaDeviceGetCacheConfig", "hipDeviceGetCacheConfig"),
    ("cudaThreadGetCacheConfig", "hipDeviceGetCacheConfig"),
    ("cudaFuncSetCacheConfig", "hipFuncSetCacheConfig"),
    ("cudaDeviceSetSharedMemConfig", "hipDeviceSetSharedMemConfig"),
    ("cudaThreadSetSharedMemConfig", "hipDeviceSetSharedMemConfig"),
    ("cudaDeviceGetSharedMemConfig", "hipDeviceGetSharedMemConfig"),
    ("cudaThreadGetSharedMemConfig", "hipDeviceGetSharedMemConfig"),
    // Versions
    ("cudaDriverGetVersion", "hipDriverGetVersion"),
    ("cudaRuntimeGetVersion", "hipRuntimeGetVersion"),
    // Peer to peer
    ("cudaDeviceCanAccessPeer", "hipDeviceCanAccessPeer"),
    ("cudaDeviceDisablePeerAccess", "hipDeviceDisablePeerAccess"),
    ("cudaDeviceEnablePeerAccess", "hipDeviceEnablePeerAccess"),
    ("cudaMemcpyPeerAsync", "hipMemcpyPeerAsync"),
    ("cudaMemcpyPeer", "hipMemcpyPeer"),
    // Profiler
    ("cudaProfilerStart", "hipProfilerStart"),
    ("cudaProfilerStop", "hipProfilerStop"),
    // Textures
    ("cudaCreateChannelDesc", "hipCreateChannelDesc"),
    ("cudaBindTexture", "hipBindTexture"),
    ("cudaUnbindTexture", "hipUnbindTexture"),
];

const VARIABLES: Entries = &[("warpSize", "hipWarpSize")];
