//! CUDA C source for the built-in primitives.
//!
//! One elementwise kernel per (function, float type) and one single-block
//! reduction kernel per (reduce, map, float type). Integers get direct
//! reductions over 64-bit accumulators. Everything is emitted into a single
//! unit that a session compiles once when it opens.

use ipanema_dtype::DType;
use strum::IntoEnumIterator;

use crate::primitives::{ElementwiseOp, MapOp, ReduceOp};

/// Threads per block used by reduction kernels; also the shared scratch size.
pub const REDUCE_THREADS: u32 = 256;
/// Threads per block used by elementwise kernels.
pub const ELEMENTWISE_THREADS: u32 = 256;

pub const FLOAT_TYPES: [DType; 2] = [DType::Float32, DType::Float64];
/// Accumulator types of integer reductions.
pub const INTEGER_TYPES: [DType; 2] = [DType::Int64, DType::UInt64];

const REDUCE_OPS: [ReduceOp; 4] = [ReduceOp::Sum, ReduceOp::Prod, ReduceOp::Min, ReduceOp::Max];

fn suffix(dtype: DType) -> &'static str {
    match dtype {
        DType::Float32 => "f32",
        DType::Int64 => "i64",
        DType::UInt64 => "u64",
        _ => "f64",
    }
}

pub fn elementwise_name(op: ElementwiseOp, dtype: DType) -> String {
    format!("ipanema_{op}_{}", suffix(dtype))
}

pub fn reduction_name(reduce: ReduceOp, map: MapOp, dtype: DType) -> String {
    format!("ipanema_reduce_{reduce}_{map}_{}", suffix(dtype))
}

fn elementwise_kernel(op: ElementwiseOp, dtype: DType) -> String {
    let name = elementwise_name(op, dtype);
    let ty = dtype.c_style();
    let function = op.c_function(dtype);
    match op.arity() {
        1 => format!(
            r#"
extern "C" __global__ void {name}(const {ty} *x, {ty} *out, long long n) {{
    long long i = (long long)blockIdx.x * blockDim.x + threadIdx.x;
    if (i < n) out[i] = {function}(x[i]);
}}
"#
        ),
        _ => format!(
            r#"
extern "C" __global__ void {name}(const {ty} *a, long long na, const {ty} *b, long long nb, {ty} *out, long long n) {{
    long long i = (long long)blockIdx.x * blockDim.x + threadIdx.x;
    if (i < n) out[i] = {function}(a[na == 1 ? 0 : i], b[nb == 1 ? 0 : i]);
}}
"#
        ),
    }
}

fn identity(reduce: ReduceOp, dtype: DType) -> &'static str {
    match (reduce, dtype) {
        (ReduceOp::Sum, _) => "0",
        (ReduceOp::Prod, _) => "1",
        (ReduceOp::Min, DType::Float32) => "__int_as_float(0x7f800000)",
        (ReduceOp::Min, _) => "__longlong_as_double(0x7ff0000000000000LL)",
        (ReduceOp::Max, DType::Float32) => "__int_as_float(0xff800000)",
        (ReduceOp::Max, _) => "__longlong_as_double(0xfff0000000000000ULL)",
    }
}

fn combine(reduce: ReduceOp, dtype: DType) -> String {
    let f = if dtype == DType::Float32 { "f" } else { "" };
    match reduce {
        ReduceOp::Sum => "a + v".to_string(),
        ReduceOp::Prod => "a * v".to_string(),
        ReduceOp::Min => format!("fmin{f}(a, v)"),
        ReduceOp::Max => format!("fmax{f}(a, v)"),
    }
}

fn map_expr(map: MapOp, dtype: DType) -> String {
    match map {
        MapOp::Identity => "v".to_string(),
        MapOp::Square => "v * v".to_string(),
        MapOp::Abs => format!("{}(v)", ElementwiseOp::Fabs.c_function(dtype)),
    }
}

fn reduction_kernel(reduce: ReduceOp, map: MapOp, dtype: DType) -> String {
    let name = reduction_name(reduce, map, dtype);
    let ty = dtype.c_style();
    let identity = identity(reduce, dtype);
    let combine = combine(reduce, dtype);
    let map = map_expr(map, dtype);
    let sqrt = ElementwiseOp::Sqrt.c_function(dtype);
    format!(
        r#"
extern "C" __global__ void {name}(const {ty} *x, {ty} *out, long long n, int finalize) {{
    __shared__ {ty} scratch[{REDUCE_THREADS}];
    {ty} a = {identity};
    for (long long i = threadIdx.x; i < n; i += blockDim.x) {{
        {ty} v = x[i];
        v = {map};
        a = {combine};
    }}
    scratch[threadIdx.x] = a;
    __syncthreads();
    for (unsigned int s = blockDim.x / 2; s > 0; s >>= 1) {{
        if (threadIdx.x < s) {{
            a = scratch[threadIdx.x];
            {ty} v = scratch[threadIdx.x + s];
            scratch[threadIdx.x] = {combine};
        }}
        __syncthreads();
    }}
    if (threadIdx.x == 0) {{
        {ty} r = scratch[0];
        if (finalize == 1) r = r / ({ty})n;
        else if (finalize == 2) r = {sqrt}(r);
        out[0] = r;
    }}
}}
"#
    )
}

fn integer_identity(reduce: ReduceOp, dtype: DType) -> &'static str {
    match (reduce, dtype) {
        (ReduceOp::Sum, _) => "0",
        (ReduceOp::Prod, _) => "1",
        (ReduceOp::Min, DType::UInt64) => "0xffffffffffffffffULL",
        (ReduceOp::Min, _) => "0x7fffffffffffffffLL",
        (ReduceOp::Max, DType::UInt64) => "0ULL",
        (ReduceOp::Max, _) => "(-0x7fffffffffffffffLL - 1)",
    }
}

fn integer_combine(reduce: ReduceOp, ty: &str) -> String {
    match reduce {
        // Unsigned arithmetic wraps instead of overflowing.
        ReduceOp::Sum => format!("({ty})((unsigned long long)a + (unsigned long long)v)"),
        ReduceOp::Prod => format!("({ty})((unsigned long long)a * (unsigned long long)v)"),
        ReduceOp::Min => "(v < a ? v : a)".to_string(),
        ReduceOp::Max => "(v > a ? v : a)".to_string(),
    }
}

fn integer_reduction_kernel(reduce: ReduceOp, dtype: DType) -> String {
    let name = reduction_name(reduce, MapOp::Identity, dtype);
    let ty = dtype.c_style();
    let identity = integer_identity(reduce, dtype);
    let combine = integer_combine(reduce, ty);
    format!(
        r#"
extern "C" __global__ void {name}(const {ty} *x, {ty} *out, long long n) {{
    __shared__ {ty} scratch[{REDUCE_THREADS}];
    {ty} a = {identity};
    for (long long i = threadIdx.x; i < n; i += blockDim.x) {{
        {ty} v = x[i];
        a = {combine};
    }}
    scratch[threadIdx.x] = a;
    __syncthreads();
    for (unsigned int s = blockDim.x / 2; s > 0; s >>= 1) {{
        if (threadIdx.x < s) {{
            a = scratch[threadIdx.x];
            {ty} v = scratch[threadIdx.x + s];
            scratch[threadIdx.x] = {combine};
        }}
        __syncthreads();
    }}
    if (threadIdx.x == 0) out[0] = scratch[0];
}}
"#
    )
}

/// Source of every primitive kernel.
pub fn primitive_source() -> String {
    let mut source = String::new();
    for dtype in FLOAT_TYPES {
        for op in ElementwiseOp::iter() {
            source.push_str(&elementwise_kernel(op, dtype));
        }
        for reduce in REDUCE_OPS {
            for map in [MapOp::Identity, MapOp::Square, MapOp::Abs] {
                source.push_str(&reduction_kernel(reduce, map, dtype));
            }
        }
    }
    for dtype in INTEGER_TYPES {
        for reduce in REDUCE_OPS {
            source.push_str(&integer_reduction_kernel(reduce, dtype));
        }
    }
    source
}
