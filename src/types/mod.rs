// Shared domain types — used by the store, coordinator, and API layers.

pub mod account;
pub mod pr;
pub mod repository;

pub use account::*;
pub use pr::*;
pub use repository::*;
