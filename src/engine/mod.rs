// Load orchestration: progress aggregation, byte reads, transfer
// interception, the batch loader and tile prewarming.

pub mod asset;
pub mod cache;
pub mod host;
pub mod interceptor;
pub mod loader;
pub mod prewarm;
pub mod progress;
pub mod reader;
