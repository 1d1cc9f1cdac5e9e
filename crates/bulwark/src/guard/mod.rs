//! HTTP boundary: guard middleware and JSON rejections.

mod middleware;
mod rejection;

pub use middleware::{csrf, rate_limit};
pub use rejection::{ErrorBody, ErrorDetail, Rejection};
