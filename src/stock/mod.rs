//! Stock membership.
//!
//! The stock decides which compounds count as purchasable, and therefore
//! which tree states are solved.

mod memory;
mod traits;

pub use memory::InMemoryStock;
pub use traits::Stock;
