//! Data preprocessing module
//!
//! Column-wise feature scaling ahead of projection.

mod scaler;

pub use scaler::{Scaler, ScalerType};
