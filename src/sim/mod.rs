pub mod config;
pub mod harness;
pub mod realmem;
pub mod stats;
pub mod top;

#[cfg(test)]
mod tests;
