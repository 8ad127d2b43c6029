//! Request decorators stacked on top of a transport.

mod header;
mod url_param;

pub use header::StaticHeader;
pub use url_param::UrlParam;
