pub mod bar;
pub mod labels;
pub mod snapshot;

pub use bar::*;
pub use labels::*;
pub use snapshot::*;
