pub mod alert;
pub mod amount;
pub mod gateway;
pub mod order;
pub mod ports;
pub mod response_code;
pub mod session;
