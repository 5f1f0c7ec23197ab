//! Utility functions and types

pub mod simd;

pub use simd::SimdOps;
