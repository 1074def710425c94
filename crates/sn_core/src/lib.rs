pub mod config;
pub mod error;
pub mod storage;
pub mod types;

pub use config::SourceProfile;
pub use error::Error;
pub use storage::NewsStorage;
pub use types::{
    is_placeholder, placeholder_content, Candidate, ContentUpdateReport, NewNewsItem, NewsItem,
    SyncReport,
};

pub type Result<T> = std::result::Result<T, Error>;
