pub mod builder;
pub mod request;
pub mod types;

pub use builder::CrawlConfigBuilder;
pub use request::{CrawlRequest, PaginationRequest};
pub use types::{
    CrawlConfig, FetchMode, PaginationConfig, StealthConfig, default_output_dir,
    default_state_file,
};
