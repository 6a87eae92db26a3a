//! Build mode configuration for production/development builds.

/// Build mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildMode {
    /// Whether emitted scripts and stylesheets are minified.
    pub minify: bool,

    /// Whether the HTML entry document is minified.
    pub minify_html: bool,
}

impl BuildMode {
    /// Production mode: minified output.
    pub const PRODUCTION: Self = Self {
        minify: true,
        minify_html: true,
    };

    /// Development mode: readable output.
    pub const DEVELOPMENT: Self = Self {
        minify: false,
        minify_html: false,
    };

    /// Check if this is development mode.
    #[inline]
    pub const fn is_dev(&self) -> bool {
        !self.minify
    }
}
