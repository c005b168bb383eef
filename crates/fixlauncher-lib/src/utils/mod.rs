pub mod process;
pub mod version;
