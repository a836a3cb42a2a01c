//! Pull a Google Sheets range into object storage.

pub mod format;
pub mod params;
pub mod persist;
pub mod pipeline;
pub mod table;
