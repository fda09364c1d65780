//! HTTP date handling and header value normalization
//!
//! Validators reach the cache layer from two directions: request headers
//! (`http::HeaderValue`, raw bytes) and the cache store (byte strings written
//! by an earlier request). [`HeaderText`] is the single adapter that turns any
//! of them into text before [`parse_http_date`] sees it.

use chrono::{DateTime, NaiveDateTime, SubsecRound, TimeZone, Utc};
use http::HeaderValue;

/// IMF-fixdate, the preferred HTTP-date format (RFC 7231 section 7.1.1.1)
const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
/// Obsolete RFC 850 format
const RFC_850: &str = "%A, %d-%b-%y %H:%M:%S GMT";
/// ANSI C `asctime()` format
const ASCTIME: &str = "%a %b %e %H:%M:%S %Y";

/// Canonical text view of a header-like value
pub trait HeaderText {
    /// Raw bytes of the value
    fn header_bytes(&self) -> &[u8];

    /// Value as trimmed UTF-8 text, `None` when it is not valid UTF-8 or empty
    fn header_text(&self) -> Option<&str> {
        std::str::from_utf8(self.header_bytes())
            .ok()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

impl HeaderText for HeaderValue {
    fn header_bytes(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl HeaderText for [u8] {
    fn header_bytes(&self) -> &[u8] {
        self
    }
}

impl HeaderText for Vec<u8> {
    fn header_bytes(&self) -> &[u8] {
        self
    }
}

impl HeaderText for str {
    fn header_bytes(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl HeaderText for String {
    fn header_bytes(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl<T: HeaderText + ?Sized> HeaderText for &T {
    fn header_bytes(&self) -> &[u8] {
        (**self).header_bytes()
    }
}

/// Parse an HTTP date in any of the three RFC 7231 formats, plus RFC 2822
/// with a numeric offset. Returns `None` for anything unparseable.
pub fn parse_http_date<T: HeaderText + ?Sized>(value: &T) -> Option<DateTime<Utc>> {
    let text = value.header_text()?;

    for format in [IMF_FIXDATE, RFC_850, ASCTIME] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    DateTime::parse_from_rfc2822(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Format a timestamp as IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`)
pub fn format_http_date(time: &DateTime<Utc>) -> String {
    time.format(IMF_FIXDATE).to_string()
}

/// Truncate a timestamp to the one-second resolution of HTTP dates
pub fn to_http_precision(time: DateTime<Utc>) -> DateTime<Utc> {
    time.trunc_subsecs(0)
}

/// The Unix epoch, used when no validator is known
pub fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).single().unwrap_or_default()
}
