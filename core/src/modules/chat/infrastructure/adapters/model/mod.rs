// Model Adapters
// 宿主模型能力的适配器实现

mod mock;

pub use mock::*;
