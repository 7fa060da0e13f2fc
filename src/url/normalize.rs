use crate::UrlError;
use url::Url;

/// Normalizes a raw candidate URL into its canonical store key form
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or relative
/// 2. Require an http/https scheme (parsing already lowercases scheme and host)
/// 3. Collapse duplicate slashes in the path
/// 4. Strip the trailing slash unless the path is the root `/`
/// 5. Drop the fragment
/// 6. Keep the query untouched
///
/// The result is idempotent: normalizing an already-normalized URL returns it
/// unchanged.
///
/// # Arguments
///
/// * `url_str` - The URL string to normalize
///
/// # Returns
///
/// * `Ok(Url)` - Normalized URL
/// * `Err(UrlError)` - Failed to parse or normalize the URL
///
/// # Examples
///
/// ```
/// use papermill::url::normalize_url;
///
/// let url = normalize_url("HTTPS://ACLANTHOLOGY.ORG//2020.acl-main.1/").unwrap();
/// assert_eq!(url.as_str(), "https://aclanthology.org/2020.acl-main.1");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    // Step 1: Parse the URL
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    // Step 2: Validate scheme
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    // Steps 3 & 4: Collapse duplicate slashes, strip trailing slash
    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    // Step 5: Drop the fragment
    url.set_fragment(None);

    // Step 6: the query is kept as-is; an empty `?` is dropped
    if url.query() == Some("") {
        url.set_query(None);
    }

    Ok(url)
}

/// Collapses duplicate slashes and strips the trailing slash (except root)
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}
