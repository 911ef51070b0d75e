//! Schema-driven SCIM 2.0 engine: attribute model, filter evaluation, and
//! PATCH validation.

pub mod config;
pub mod observability;
pub mod scim;

#[cfg(test)]
mod tests;
