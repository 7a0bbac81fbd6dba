//! Cache backend implementations.

mod memory;
mod redis;

pub use memory::MemoryTileCache;
pub use redis::RedisTileCache;
