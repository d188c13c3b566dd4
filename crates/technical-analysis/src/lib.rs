pub mod atr;
pub mod fibonacci;
pub mod indicators;
pub mod pivots;
pub mod signals;

#[cfg(test)]
mod indicators_tests;

pub use atr::*;
pub use fibonacci::*;
pub use indicators::*;
pub use pivots::*;
pub use signals::*;
