//! Chat page served from the static asset directory.
//!
//! `GET /` returns `index.html`; every other unmatched path is looked up
//! under the same directory.

use std::path::Path;
use tower_http::services::{ServeDir, ServeFile};

/// Page served at the root path.
pub const INDEX_FILE: &str = "index.html";

/// GET /: serve the chat page.
pub fn index_page(static_dir: &Path) -> ServeFile {
    ServeFile::new(static_dir.join(INDEX_FILE))
}

/// Fallback: serve files under `static_dir`.
pub fn static_files(static_dir: &Path) -> ServeDir {
    ServeDir::new(static_dir)
}

/// Whether the chat page exists, for a startup warning.
pub fn has_index(static_dir: &Path) -> bool {
    static_dir.join(INDEX_FILE).is_file()
}
