//! Parley library exports for testing

pub mod api;
pub mod core;
pub mod repl;

#[cfg(test)]
pub mod test_support;
