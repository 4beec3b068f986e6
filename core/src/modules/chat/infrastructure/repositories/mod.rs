// Chat Infrastructure - Repositories
//
// 状态存储实现：
// - InMemoryStateStorage: 内存存储，用于开发和测试
// - FileStateStorage: 文件持久化存储，用于生产环境

mod file_state_storage;
mod in_memory_state_storage;

pub use file_state_storage::*;
pub use in_memory_state_storage::*;
