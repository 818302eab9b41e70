mod buffer;
mod context;
mod primitives;
#[cfg(feature = "cuda")]
mod cuda;
