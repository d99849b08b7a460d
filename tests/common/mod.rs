//! Common test utilities for devto-feed integration tests


#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use server::*;
