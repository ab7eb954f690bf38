//! Diabetes risk prediction: an HTTP inference service plus an offline
//! trainer, connected only through a serialized pipeline artifact on disk.

pub mod dataset;
pub mod error;
pub mod features;
pub mod model;
pub mod server;
pub mod train;
