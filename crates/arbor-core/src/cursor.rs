//! Opaque pagination cursors and list slicing

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 500;

/// Decoded cursor state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    pub offset: usize,
    pub query: String,
}

#[derive(Serialize, Deserialize)]
struct Repr {
    o: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    q: String,
}

/// Encode an offset and query into an opaque `base64url(JSON)` token.
pub fn encode(offset: usize, query: &str) -> String {
    let repr = Repr {
        o: offset,
        q: query.to_string(),
    };
    // Serializing a two-field struct cannot fail.
    let json = serde_json::to_vec(&repr).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

/// Decode a cursor token. The empty string decodes to offset 0; a malformed
/// non-empty token silently resets to offset 0.
pub fn decode(token: &str) -> Cursor {
    if token.is_empty() {
        return Cursor::default();
    }
    let Ok(bytes) = URL_SAFE_NO_PAD.decode(token) else {
        tracing::debug!("undecodable cursor, resetting to offset 0");
        return Cursor::default();
    };
    match serde_json::from_slice::<Repr>(&bytes) {
        Ok(repr) => Cursor {
            offset: repr.o,
            query: repr.q,
        },
        Err(_) => {
            tracing::debug!("malformed cursor payload, resetting to offset 0");
            Cursor::default()
        }
    }
}

/// Clamp a requested page size to `[1, MAX_LIMIT]`, defaulting when absent.
pub fn clamp_limit(requested: Option<u64>) -> usize {
    match requested {
        None => DEFAULT_LIMIT,
        Some(n) => (n as usize).clamp(1, MAX_LIMIT),
    }
}

/// One page of results plus the metadata tools return alongside it.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    #[serde(skip)]
    pub items: Vec<T>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Slice `items[offset..offset+limit]`, producing the follow-up cursor when
/// more items remain.
pub fn paginate<T: Clone>(items: &[T], offset: usize, limit: usize, query: &str) -> Page<T> {
    let total = items.len();
    let start = offset.min(total);
    let end = (start + limit).min(total);
    let has_more = end < total;
    Page {
        items: items[start..end].to_vec(),
        total,
        offset,
        limit,
        has_more,
        next_cursor: has_more.then(|| encode(end, query)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let token = encode(100, "q");
        let cursor = decode(&token);
        assert_eq!(cursor.offset, 100);
        assert_eq!(cursor.query, "q");
    }

    #[test]
    fn empty_token_is_origin() {
        assert_eq!(decode(""), Cursor::default());
    }

    #[test]
    fn garbage_token_resets_silently() {
        assert_eq!(decode("!!not-base64!!"), Cursor::default());
        let valid_b64 = URL_SAFE_NO_PAD.encode(b"not json");
        assert_eq!(decode(&valid_b64), Cursor::default());
    }

    #[test]
    fn limit_clamping() {
        assert_eq!(clamp_limit(None), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(Some(10)), 10);
        assert_eq!(clamp_limit(Some(10_000)), MAX_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
    }

    #[test]
    fn pagination_walks_the_list() {
        let items: Vec<String> = ('a'..='j').map(|c| c.to_string()).collect();
        let mut offset = 0;
        let mut pages = Vec::new();
        loop {
            let page = paginate(&items, offset, 3, "letters");
            pages.push(page.items.clone());
            match page.next_cursor {
                Some(token) => offset = decode(&token).offset,
                None => break,
            }
        }
        assert_eq!(
            pages,
            vec![
                vec!["a", "b", "c"],
                vec!["d", "e", "f"],
                vec!["g", "h", "i"],
                vec!["j"],
            ]
        );
    }

    #[test]
    fn offset_past_end_yields_empty_page() {
        let items = vec![1, 2, 3];
        let page = paginate(&items, 10, 5, "");
        assert!(page.items.is_empty());
        assert!(!page.has_more);
        assert!(page.next_cursor.is_none());
    }
}
