//! Consolidated test modules.
//!
//! End-to-end scenarios that drive the schema model, evaluator, and PATCH
//! validator together through their public API.
