//! Background download queue

pub mod broker;

pub use broker::DownloadQueue;
