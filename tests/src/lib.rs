// Meta-package organizing the Weaver test structure.
//
// The end-to-end tests live in the `integrations` package; crate-level
// tests sit beside each crate.

#[cfg(feature = "integrations")]
pub use weaver_integration_tests as integrations;
