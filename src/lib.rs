pub mod api;
pub mod cache;
pub mod config;
pub mod extractor;
pub mod fingerprint;
pub mod gateway;
pub mod humanize;
pub mod observability;
pub mod queue;
pub mod remote;
pub mod worker;
