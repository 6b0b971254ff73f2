//! Request/response model.
//!
//! # Data Flow
//! ```text
//! caller builds Request (method, URL, headers, RequestBody)
//!     → shared behind Arc by the retrying executor
//!     → each attempt: RequestBody::open() → Payload → transport
//!     → transport returns Response (status, headers, ResponseBody)
//!     → discarded attempts: Response::close()
//! ```

pub mod body;
pub mod request;
pub mod response;

pub use body::{ByteStream, Payload, RequestBody, ResponseBody};
pub use request::{Method, Request, RequestBuilder, RequestError};
pub use response::Response;
