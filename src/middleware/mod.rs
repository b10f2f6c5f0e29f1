pub mod request_logger;
pub mod route_guard;
