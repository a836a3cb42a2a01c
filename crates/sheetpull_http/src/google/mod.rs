//! Google service account auth and the Sheets values api.

pub mod credentials;
pub mod sheets;
