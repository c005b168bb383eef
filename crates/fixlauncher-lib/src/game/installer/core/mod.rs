pub mod archive;
pub mod batch;
pub mod downloader;
pub mod jre_manager;
pub mod modpack_installer;
pub mod traits;
