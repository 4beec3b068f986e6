// Config Application Layer
//
// 应用层提供配置服务门面

pub mod service;

pub use service::*;
