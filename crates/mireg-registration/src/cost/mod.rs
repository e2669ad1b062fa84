//! Cost terms and their weighted aggregation.

mod aggregator;
mod ncc;
mod ssd;
mod trait_;

pub use aggregator::CostAggregator;
pub use ncc::{NccCost, NccFactory};
pub use ssd::{SsdCost, SsdFactory};
pub use trait_::{CostTerm, CostTermFactory};
