//! Chromium backend for the page ports
//!
//! `ChromiumBrowser` launches a local Chrome/Chromium through chromiumoxide and
//! hands out `ChromiumPage`s implementing `PagePort`.

pub mod browser;
pub mod config;
pub mod page;
mod scripts;

pub use browser::ChromiumBrowser;
pub use config::{detect_chrome_executable, CdpConfig};
pub use page::ChromiumPage;

pub mod error {
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum AdapterError {
        #[error("Invalid browser configuration: {0}")]
        Config(String),

        #[error("Failed to launch chromium: {0}")]
        Launch(String),

        #[error("I/O error: {0}")]
        Io(#[from] std::io::Error),
    }
}

pub use error::AdapterError;
