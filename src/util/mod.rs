//! Small helpers shared by the UI and the API layer.
//!
//! - **Text**: width-aware truncation and wrapping, control-character
//!   stripping, and HTML summaries reduced to plain text
//! - **Links**: validation before an item link is handed to the browser
//!
//! ```
//! use feedsync::util::{display_width, truncate_to_width};
//!
//! assert_eq!(display_width("Hello 世界"), 10);
//! assert_eq!(truncate_to_width("A long feed title", 10), "A long ...");
//! ```

mod text;
mod url_validator;

pub use text::{display_width, html_to_text, strip_control_chars, truncate_to_width, wrap_to_width};
pub use url_validator::{validate_url_for_open, UrlValidationError};
