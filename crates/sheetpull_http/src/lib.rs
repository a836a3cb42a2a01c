pub mod aws;
pub mod client;
pub mod google;

#[cfg(any(test, feature = "testutil"))]
pub mod stub;

mod hex;

// Re-export some types to use with the http client.
pub use reqwest::header::HeaderMap;
pub use reqwest::{Method, Request, StatusCode};
