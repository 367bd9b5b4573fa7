// tests/common/mod.rs

#![allow(dead_code)]

pub use clockdag_test_utils::builders;
pub use clockdag_test_utils::{at, init_tracing, with_timeout};
