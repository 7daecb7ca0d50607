pub mod archive;
pub mod branch;
pub mod diff;
pub mod export;
pub mod search;
pub mod service;
pub mod snapshot;
pub mod stats;
pub mod tags;

pub use archive::*;
pub use branch::*;
pub use diff::*;
pub use export::*;
pub use search::*;
pub use service::*;
pub use snapshot::*;
pub use stats::*;
pub use tags::*;
