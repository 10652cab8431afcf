mod fs;
mod http;

pub use fs::DirectorySource;
pub use http::HttpSource;
