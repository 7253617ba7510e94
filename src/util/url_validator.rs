use thiserror::Error;
use url::Url;

/// Errors that can occur when validating an item link before opening it.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host to open.
    #[error("URL has no host")]
    MissingHost,
    /// The URL embeds a username or password.
    #[error("URLs with embedded credentials are not opened")]
    EmbeddedCredentials,
}

/// Validates an item link before handing it to the system browser.
///
/// Item links come from arbitrary feeds, so only plain `http`/`https` URLs
/// with a host and without embedded credentials are accepted. `javascript:`,
/// `file:` and similar schemes are rejected.
///
/// # Examples
///
/// ```
/// use feedsync::util::validate_url_for_open;
///
/// assert!(validate_url_for_open("https://example.com/post/1").is_ok());
/// assert!(validate_url_for_open("javascript:alert(1)").is_err());
/// ```
pub fn validate_url_for_open(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(UrlValidationError::MissingHost),
    }

    if !url.username().is_empty() || url.password().is_some() {
        return Err(UrlValidationError::EmbeddedCredentials);
    }

    Ok(url)
}
