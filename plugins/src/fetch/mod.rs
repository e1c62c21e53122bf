pub mod http;

pub use http::HttpConfigSource;
