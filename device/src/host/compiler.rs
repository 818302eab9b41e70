//! C compilation and dynamic loading for the host backend.
//!
//! The composite source is compiled into a shared library with the
//! configured compiler (`clang -shared -O2` by default) and loaded with
//! `dlopen`. Every entry point uses the same ABI:
//!
//! ```c
//! void entry(void **args, const struct ipanema_launch *launch);
//! ```
//!
//! `args[i]` points at the data of buffer arguments and at the value of
//! scalar arguments. The entry is invoked once per (block, thread) index.

use std::cell::RefMut;
use std::ffi::c_void;
use std::io::Write;
use std::process::Command;

use snafu::OptionExt;

use crate::allocator::RawBuffer;
use crate::error::{BufferBusySnafu, CompileSnafu, LaunchSnafu, Result, SymbolNotFoundSnafu};
use crate::program::{KernelArg, LaunchConfig, Module, Program};

/// Declarations prepended to every compiled unit.
pub const LAUNCH_PRELUDE: &str = r#"struct ipanema_launch {
    unsigned int thread[3];
    unsigned int block[3];
    unsigned int block_dim[3];
    unsigned int grid_dim[3];
};
#define IPANEMA_GLOBAL_ID(l) ((l)->block[0] * (l)->block_dim[0] + (l)->thread[0])
"#;

/// Mirrors `struct ipanema_launch`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct LaunchIndex {
    thread: [u32; 3],
    block: [u32; 3],
    block_dim: [u32; 3],
    grid_dim: [u32; 3],
}

type HostEntry = unsafe extern "C" fn(*const *mut c_void, *const LaunchIndex);

/// A compiled shared library.
#[derive(Debug)]
pub struct HostModule {
    /// Keep the library alive (prevents dlclose).
    lib: libloading::Library,
    /// Keep the temp directory alive so the .so isn't deleted.
    _tmp_dir: tempfile::TempDir,
}

impl HostModule {
    /// Compile C source with `compiler` and load the resulting shared library.
    pub fn compile(compiler: &str, src: &str) -> Result<Self> {
        let tmp_dir = tempfile::tempdir()
            .map_err(|e| CompileSnafu { reason: format!("failed to create temp directory: {e}") }.build())?;

        let src_path = tmp_dir.path().join("module.c");
        let so_path = tmp_dir.path().join("module.so");

        let mut src_file = std::fs::File::create(&src_path)
            .map_err(|e| CompileSnafu { reason: format!("failed to create source file: {e}") }.build())?;
        src_file
            .write_all(LAUNCH_PRELUDE.as_bytes())
            .and_then(|()| src_file.write_all(src.as_bytes()))
            .map_err(|e| CompileSnafu { reason: format!("failed to write source file: {e}") }.build())?;
        drop(src_file);

        let output = Command::new(compiler)
            .args(["-shared", "-O2", "-fPIC", "-fno-math-errno", "-o"])
            .arg(&so_path)
            .arg(&src_path)
            .arg("-lm")
            .output()
            .map_err(|e| CompileSnafu { reason: format!("failed to run {compiler}: {e}") }.build())?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return CompileSnafu { reason: format!("{compiler} exited with {}:\n{stderr}", output.status) }.fail();
        }

        let lib = unsafe { libloading::Library::new(&so_path) }
            .map_err(|e| CompileSnafu { reason: format!("failed to load shared library: {e}") }.build())?;

        tracing::debug!(compiler, source.len = src.len(), "host module compiled and loaded");
        Ok(Self { lib, _tmp_dir: tmp_dir })
    }
}

impl Module for HostModule {
    fn function(&self, name: &str) -> Result<Box<dyn Program + '_>> {
        let entry = unsafe { self.lib.get::<HostEntry>(name.as_bytes()) }
            .ok()
            .context(SymbolNotFoundSnafu { name })?;
        Ok(Box::new(HostProgram { entry, name: name.to_string() }))
    }
}

struct HostProgram<'lib> {
    entry: libloading::Symbol<'lib, HostEntry>,
    name: String,
}

impl std::fmt::Debug for HostProgram<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostProgram").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Pack a scalar into an 8-byte slot, low bytes first in native order.
fn scalar_slot(arg: &KernelArg<'_>) -> u64 {
    let mut slot = 0u64;
    let bytes = bytemuck::bytes_of_mut(&mut slot);
    match *arg {
        KernelArg::Buffer(_) => {}
        KernelArg::I32(v) => bytes[..4].copy_from_slice(&v.to_ne_bytes()),
        KernelArg::I64(v) => bytes.copy_from_slice(&v.to_ne_bytes()),
        KernelArg::F32(v) => bytes[..4].copy_from_slice(&v.to_ne_bytes()),
        KernelArg::F64(v) => bytes.copy_from_slice(&v.to_ne_bytes()),
    }
    slot
}

fn host_words<'a>(arg: &KernelArg<'a>) -> Result<Option<RefMut<'a, Box<[u64]>>>> {
    match *arg {
        KernelArg::Buffer(buffer) => match buffer.raw() {
            RawBuffer::Cpu { words, .. } => Ok(Some(words.try_borrow_mut().ok().context(BufferBusySnafu)?)),
            #[cfg(feature = "cuda")]
            RawBuffer::Cuda { .. } => LaunchSnafu { reason: "buffer does not live in host memory" }.fail(),
        },
        _ => Ok(None),
    }
}

impl Program for HostProgram<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn launch(&self, args: &[KernelArg<'_>], config: &LaunchConfig) -> Result<()> {
        tracing::debug!(
            kernel.name = %self.name,
            kernel.num_args = args.len(),
            kernel.block = ?config.block,
            kernel.grid = ?config.grid,
            kernel.invocations = config.threads() * config.blocks(),
            "launching host kernel"
        );

        // Buffer borrows are held for the whole launch; binding a buffer twice fails here.
        let mut guards = args.iter().map(host_words).collect::<Result<Vec<_>>>()?;
        let mut scalars: Vec<u64> = args.iter().map(scalar_slot).collect();
        let pointers: Vec<*mut c_void> = guards
            .iter_mut()
            .zip(scalars.iter_mut())
            .map(|(guard, scalar)| match guard {
                Some(words) => words.as_mut_ptr().cast::<c_void>(),
                None => (scalar as *mut u64).cast::<c_void>(),
            })
            .collect();

        let [bx, by, bz] = config.block;
        let [gx, gy] = config.grid;
        let mut index = LaunchIndex { block_dim: config.block, grid_dim: [gx, gy, 1], ..LaunchIndex::default() };
        for block_y in 0..gy {
            for block_x in 0..gx {
                index.block = [block_x, block_y, 0];
                for z in 0..bz {
                    for y in 0..by {
                        for x in 0..bx {
                            index.thread = [x, y, z];
                            // SAFETY: pointers stay valid while `guards` and `scalars` are alive;
                            // matching the kernel signature is the caller's contract.
                            unsafe { (self.entry)(pointers.as_ptr(), &index) };
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
