#![allow(dead_code)]

pub use stackbuild_test_utils::builders;
pub use stackbuild_test_utils::fake_executor;
pub use stackbuild_test_utils::{init_tracing, with_timeout};
