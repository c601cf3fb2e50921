//! Cross-module invariant and property tests: integration-level coverage
//! that doesn't belong to any single file.
