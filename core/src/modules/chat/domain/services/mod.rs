// Chat Domain - Services
// 领域服务包含不属于任何实体的业务逻辑

mod error_classifier;

pub use error_classifier::*;
