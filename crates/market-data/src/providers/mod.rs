pub mod simulated;
pub mod yahoo;

pub use simulated::SimulatedProvider;
pub use yahoo::YahooProvider;
