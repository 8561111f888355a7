pub mod result;
pub mod streaming;

pub use result::{LookupResult, Orientation};
pub use streaming::{StreamingQuery, StreamingQueryStats};
