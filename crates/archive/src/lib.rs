pub mod store;

pub use store::{ArchiveDetails, ArchiveListEntry, ArchiveStore, ModelData, PairDetails};
