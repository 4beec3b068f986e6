// Adapters
// 外部能力的适配器实现

pub mod model;
