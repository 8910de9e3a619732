//! 跨层共享的基础设施

pub mod error;
