pub mod dto;
pub mod market;
pub mod pick;

pub use market::MarketType;
pub use pick::{Leg, Pick};
