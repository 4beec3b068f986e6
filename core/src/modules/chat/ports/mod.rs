// Chat Ports Layer
// 端口定义了模块与外部世界的接口

mod model_port;
mod state_storage;

pub use model_port::*;
pub use state_storage::*;
