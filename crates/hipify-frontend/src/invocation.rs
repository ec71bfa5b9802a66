//! Compiler argument handling.
//!
//! A pass of the rewriting engine selects its compilation view with the same
//! arguments a CUDA compiler driver understands. Only the arguments that
//! change what the preprocessor sees are interpreted; the rest are ignored.

use crate::parser::ParseError;
use std::path::PathBuf;
use tracing::trace;

/// Which side of a CUDA translation unit is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompilationView {
    /// `--cuda-host-only`
    Host,
    /// `--cuda-device-only`
    Device,
}

/// GPU architecture assumed when none is given.
pub const DEFAULT_GPU_ARCH: u32 = 350;

/// Value of `__cplusplus` under `-std=c++11`.
const CPLUSPLUS_11: &str = "201103L";

/// One macro change requested on the command line, in argument order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroArg {
    /// `-DNAME` or `-DNAME=value`
    Define { name: String, value: String },
    /// `-UNAME`
    Undefine(String),
}

/// The parsed argument list of one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerInvocation {
    pub view: CompilationView,
    /// `__CUDA_ARCH__` value of the device view (`sm_70` is 700)
    pub gpu_arch: u32,
    /// Value for `__cplusplus`
    pub cplusplus: String,
    pub macros: Vec<MacroArg>,
    pub include_dirs: Vec<PathBuf>,
}

impl Default for CompilerInvocation {
    fn default() -> Self {
        Self {
            view: CompilationView::Host,
            gpu_arch: DEFAULT_GPU_ARCH,
            cplusplus: CPLUSPLUS_11.to_string(),
            macros: Vec::new(),
            include_dirs: Vec::new(),
        }
    }
}

impl CompilerInvocation {
    /// Interpret a compiler argument list.
    ///
    /// The last view flag wins; without one the host view is used.
    pub fn from_args(args: &[String]) -> Result<Self, ParseError> {
        let mut invocation = Self::default();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--cuda-host-only" => invocation.view = CompilationView::Host,
                "--cuda-device-only" => invocation.view = CompilationView::Device,
                "-D" | "-U" | "-I" => {
                    let value = iter.next().ok_or_else(|| {
                        ParseError::invocation(format!("argument to '{}' is missing", arg))
                    })?;
                    invocation.apply_valued(arg, value)?;
                }
                other if other.starts_with("--cuda-gpu-arch=") => {
                    invocation.gpu_arch = parse_gpu_arch(&other["--cuda-gpu-arch=".len()..])?;
                }
                other if other.starts_with("-std=") => {
                    invocation.cplusplus = cplusplus_value(&other["-std=".len()..]).to_string();
                }
                other => match joined_valued_flag(other) {
                    Some((flag, value)) => invocation.apply_valued(flag, value)?,
                    None => trace!(argument = other, "ignoring compiler argument"),
                },
            }
        }

        Ok(invocation)
    }

    fn apply_valued(&mut self, flag: &str, value: &str) -> Result<(), ParseError> {
        match flag {
            "-D" => {
                let (name, value) = match value.split_once('=') {
                    Some((name, value)) => (name, value),
                    None => (value, "1"),
                };
                if name.is_empty() {
                    return Err(ParseError::invocation("macro name missing after '-D'"));
                }
                self.macros.push(MacroArg::Define {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
            "-U" => self.macros.push(MacroArg::Undefine(value.to_string())),
            _ => self.include_dirs.push(PathBuf::from(value)),
        }
        Ok(())
    }

    /// Macros defined before the first line of the file, in definition order.
    ///
    /// Both views see `__CUDACC__` and `__NVCC__`; the device view also sees
    /// `__CUDA_ARCH__`. Command-line `-D`/`-U` apply afterwards.
    pub fn predefined_macros(&self) -> Vec<(String, Option<String>)> {
        let mut macros: Vec<(String, Option<String>)> = vec![
            ("__cplusplus".to_string(), Some(self.cplusplus.clone())),
            ("__CUDACC__".to_string(), Some("1".to_string())),
            ("__NVCC__".to_string(), Some("1".to_string())),
        ];
        if self.view == CompilationView::Device {
            macros.push(("__CUDA_ARCH__".to_string(), Some(self.gpu_arch.to_string())));
        }
        for arg in &self.macros {
            match arg {
                MacroArg::Define { name, value } => {
                    macros.push((name.clone(), Some(value.clone())));
                }
                MacroArg::Undefine(name) => macros.push((name.clone(), None)),
            }
        }
        macros
    }
}

/// Split `-DNAME`, `-UNAME` and `-Idir` into flag and value.
fn joined_valued_flag(arg: &str) -> Option<(&'static str, &str)> {
    ["-D", "-U", "-I"].into_iter().find_map(|flag| {
        arg.strip_prefix(flag)
            .filter(|value| !value.is_empty())
            .map(|value| (flag, value))
    })
}

fn parse_gpu_arch(value: &str) -> Result<u32, ParseError> {
    value
        .strip_prefix("sm_")
        .or_else(|| value.strip_prefix("compute_"))
        .and_then(|digits| digits.parse::<u32>().ok())
        .map(|arch| arch * 10)
        .ok_or_else(|| ParseError::invocation(format!("unsupported GPU architecture '{}'", value)))
}

fn cplusplus_value(standard: &str) -> &'static str {
    match standard.trim_start_matches("gnu++").trim_start_matches("c++") {
        "98" | "03" => "199711L",
        "14" | "1y" => "201402L",
        "17" | "1z" => "201703L",
        "20" | "2a" => "202002L",
        _ => CPLUSPLUS_11,
    }
}
