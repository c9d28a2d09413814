pub mod log;
pub mod record;
pub mod store;

pub use log::LogFile;
pub use record::LogRecord;
pub use store::CollectionStore;
