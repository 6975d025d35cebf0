pub mod checksum;
pub mod path_pattern;
pub mod validating_http_body;
pub mod validating_http_downloader;
