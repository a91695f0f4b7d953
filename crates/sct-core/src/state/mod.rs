//! Contract state repository: base store plus layered tracked views

pub mod overlay;
pub mod store;
pub mod tracked;

pub use store::{Account, ChangeSet, MemoryStore, StateStore};
pub use tracked::{ContractState, TrackedView};
