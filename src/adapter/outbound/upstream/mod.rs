//! HTTP client for the upstream release service.

mod client;
mod dto;

pub use client::{HttpUpstreamClient, UpstreamSettings};
