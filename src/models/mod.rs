//! Data models for headlines, orders, and price bars.

mod bar;
mod headline;
mod order;

pub use bar::Bar;
pub use headline::Headline;
pub use order::{BracketOrder, OrderSide};
