pub mod bluetooth;
pub mod http;
pub mod logging;
