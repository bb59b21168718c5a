//! Window capabilities for a terminal host.
//!
//! A terminal has no page to navigate, so "navigating" prints the URL for the
//! user to open. The consent screen then sends the browser back to the
//! callback URL with the token in its fragment; pasting that URL back in
//! gives the next `authorize` call something to recover the token from.

use std::io::Write;

use parking_lot::Mutex;
use tracing::debug;
use trellogate_core::{Location, MemoryLocation, WindowError};

/// A [`Location`] whose navigations are shown to the user.
pub struct TerminalLocation {
    inner: MemoryLocation,
    out: Mutex<Box<dyn Write + Send>>,
}

impl TerminalLocation {
    /// A location at `href`, printing navigations to stderr.
    pub fn new(href: impl Into<String>) -> Self {
        Self::with_writer(href, Box::new(std::io::stderr()))
    }

    pub fn with_writer(href: impl Into<String>, out: Box<dyn Write + Send>) -> Self {
        Self {
            inner: MemoryLocation::new(href),
            out: Mutex::new(out),
        }
    }

    /// Every URL shown so far.
    pub fn navigations(&self) -> Vec<String> {
        self.inner.navigations()
    }
}

impl Location for TerminalLocation {
    fn href(&self) -> String {
        self.inner.href()
    }

    fn fragment(&self) -> String {
        self.inner.fragment()
    }

    fn set_fragment(&self, fragment: &str) {
        self.inner.set_fragment(fragment);
    }

    fn navigate(&self, url: &str) -> Result<(), WindowError> {
        debug!("showing authorization URL");
        let mut out = self.out.lock();
        writeln!(out, "Open this URL in your browser to authorize:\n\n  {}\n", url)
            .and_then(|_| out.flush())
            .map_err(|e| WindowError::Navigation(e.to_string()))?;

        self.inner.navigate(url)
    }
}

impl std::fmt::Debug for TerminalLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalLocation")
            .field("href", &self.inner.href())
            .finish()
    }
}

/// Parse a `key=value` request parameter.
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got {:?}", raw)),
    }
}
