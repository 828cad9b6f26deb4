pub mod client;
pub mod error;
pub mod request;
pub mod session;
pub mod types;

pub use client::{ApiService, Transport};
pub use error::{ApiError, ApiResult};
pub use request::{Method, RequestDescriptor};
pub use session::Session;
