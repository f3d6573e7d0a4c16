pub mod cache;
pub mod local;
pub mod normalize;
pub mod remote;
pub mod source;

pub use cache::{ConfigCache, ConfigOrigin};
pub use local::LocalTableSource;
pub use normalize::normalize;
pub use remote::SheetsClient;
pub use source::{ConfigSource, RawRow, RawTables, SourceError};
