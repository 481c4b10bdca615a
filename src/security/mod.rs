//! Pre-execution checks on snippet text and store keys.

mod name;
mod validator;

#[cfg(test)]
mod tests;

pub use name::NameRules;
pub use validator::{CodeValidator, PolicyViolation, DEFAULT_DENYLIST};
