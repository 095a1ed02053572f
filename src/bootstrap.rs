//! Page-load bootstrap: the `?room=` join link.
//!
//! A shared link carries the room code in its query string. Opening it
//! pre-fills the join field and nothing more; joining still needs a name and
//! an explicit join.

use url::{form_urlencoded, Url};

use crate::error::Result;

/// Query parameter carrying the room code.
pub const ROOM_PARAM: &str = "room";

/// Extracts the upper-cased room code from a page location.
///
/// `location` may be a full URL or just its query string, with or without
/// the leading `?`. Returns `None` if there is no non-empty `room` value.
///
/// ```
/// use spyword_client::bootstrap::room_code;
///
/// assert_eq!(room_code("https://play.example/?room=ab12").as_deref(), Some("AB12"));
/// assert_eq!(room_code("?lang=en&room=x9q").as_deref(), Some("X9Q"));
/// assert_eq!(room_code("https://play.example/"), None);
/// ```
pub fn room_code(location: &str) -> Option<String> {
    let query = match Url::parse(location) {
        Ok(url) => url.query().unwrap_or_default().to_string(),
        Err(_) => location.trim_start_matches('?').to_string(),
    };
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == ROOM_PARAM)
        .map(|(_, value)| value.trim().to_uppercase())
        .filter(|code| !code.is_empty())
}

/// Builds the shareable join link for `code` on the page at `page`.
///
/// Any query or fragment already on `page` is replaced.
///
/// # Errors
///
/// Returns [`SpyWordError::Url`](crate::error::SpyWordError::Url) if `page`
/// is not an absolute URL.
pub fn join_link(page: &str, code: &str) -> Result<String> {
    let mut url = Url::parse(page)?;
    url.set_fragment(None);
    url.set_query(None);
    url.query_pairs_mut().append_pair(ROOM_PARAM, code);
    Ok(url.into())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn code_is_read_from_full_url() {
        assert_eq!(
            room_code("https://spyword.example/play?room=ab12#top").as_deref(),
            Some("AB12")
        );
    }

    #[test]
    fn code_is_read_from_bare_query() {
        assert_eq!(room_code("room=qq7").as_deref(), Some("QQ7"));
        assert_eq!(room_code("?x=1&room=%20zz%20").as_deref(), Some("ZZ"));
    }

    #[test]
    fn missing_or_empty_code_is_none() {
        assert_eq!(room_code("?room="), None);
        assert_eq!(room_code("?rooms=AB12"), None);
        assert_eq!(room_code(""), None);
    }

    #[test]
    fn join_link_replaces_existing_query() {
        let link = join_link("https://spyword.example/play?room=OLD#x", "AB12").unwrap();
        assert_eq!(link, "https://spyword.example/play?room=AB12");
    }

    #[test]
    fn join_link_needs_absolute_page() {
        assert!(join_link("/play", "AB12").is_err());
    }

    #[test]
    fn link_round_trips_through_bootstrap() {
        let link = join_link("http://localhost:5173/", "K3Y9").unwrap();
        assert_eq!(room_code(&link).as_deref(), Some("K3Y9"));
    }
}
