//! Integration tests for qef-rs
//!
//! These fit the library's models end to end, rather than testing
//! individual components.

// Fits of convolved and constrained models
pub mod fit_tests;


/// Routes library logs to the test output; `RUST_LOG=qef_rs=debug` shows them.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
