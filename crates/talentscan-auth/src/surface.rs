//! Detached UI surfaces used to show the provider consent page.

use url::Url;

/// Error opening a surface.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    /// The environment refused to open the surface.
    #[error("surface blocked")]
    Blocked,

    /// The system browser could not be launched.
    #[error("failed to open browser: {0}")]
    Browser(#[from] opener::OpenError),
}

/// Something that can show a URL outside the current context.
pub trait Surface: Send + Sync {
    /// Opens `url`. Returns as soon as the surface is shown.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface could not be opened at all.
    fn open(&self, url: &Url) -> std::result::Result<(), SurfaceError>;
}

/// Opens URLs in the system web browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserSurface;

impl Surface for BrowserSurface {
    fn open(&self, url: &Url) -> std::result::Result<(), SurfaceError> {
        tracing::debug!("Opening {} in browser", url.host_str().unwrap_or("browser"));
        opener::open_browser(url.as_str())?;
        Ok(())
    }
}
