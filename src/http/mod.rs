mod client;

#[cfg(test)]
pub(crate) use client::page;
pub use client::{HttpClient, PageResponse};
