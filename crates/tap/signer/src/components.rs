use ::url::Url;
use tap_types::TapError;

/// The parts of a target URL that a request signature covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlComponents {
    /// `host[:port]`, port only when explicit and non-default.
    pub authority: String,
    /// Path plus `?query` when present.
    pub path: String,
    /// `scheme://host[:port]`, used to reach sibling pages (cart, checkout).
    pub base_url: String,
}

impl UrlComponents {
    pub fn parse(raw: &str) -> Result<Self, TapError> {
        let url = Url::parse(raw.trim())
            .map_err(|e| TapError::InvalidInput(format!("malformed url `{raw}`: {e}")))?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| TapError::InvalidInput(format!("url `{raw}` has no host")))?;

        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self {
            base_url: format!("{}://{}", url.scheme(), authority),
            authority,
            path,
        })
    }

    /// Sibling URL on the same origin, e.g. `/cart` next to a product page.
    pub fn sibling(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
