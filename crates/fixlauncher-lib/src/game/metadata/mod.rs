pub mod fetcher;
pub mod resolver;
pub mod types;

pub use fetcher::fetch_version_list;
pub use resolver::{fabric_version_id, resolve_install_plan};
pub use types::*;
