//! Message text that arrives in pieces

use futures::{Stream, StreamExt};

/// Largest message accepted from a streamed text source
pub const MAX_TEXT_BYTES: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum TextStreamError {
    #[error("text exceeds {MAX_TEXT_BYTES} bytes")]
    TooLarge,

    #[error("text is not valid UTF-8")]
    InvalidUtf8,

    #[error("text source failed: {0}")]
    Source(String),
}

/// Join every piece of `parts` into one message.
///
/// Pieces are raw bytes, so a character split across two pieces is fine.
/// Nothing is returned until the source ends.
pub async fn collect_text<S, B, E>(parts: S) -> Result<String, TextStreamError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    futures::pin_mut!(parts);
    let mut text = Vec::new();
    while let Some(part) = parts.next().await {
        let part = part.map_err(|e| TextStreamError::Source(e.to_string()))?;
        let part = part.as_ref();
        if text.len() + part.len() > MAX_TEXT_BYTES {
            return Err(TextStreamError::TooLarge);
        }
        text.extend_from_slice(part);
    }
    String::from_utf8(text).map_err(|_| TextStreamError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn pieces(parts: &[&[u8]]) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> {
        let parts: Vec<_> = parts.iter().map(|part| Ok(part.to_vec())).collect();
        stream::iter(parts)
    }

    #[tokio::test]
    async fn test_pieces_joined_in_order() {
        let parts = [b"The front ".as_slice(), b"door ".as_slice(), b"is open.".as_slice()];
        let text = collect_text(pieces(&parts)).await.unwrap();
        assert_eq!(text, "The front door is open.");
    }

    #[tokio::test]
    async fn test_character_split_across_pieces() {
        // "é" is 0xC3 0xA9
        let parts = [b"caf\xC3".as_slice(), b"\xA9 au lait".as_slice()];
        let text = collect_text(pieces(&parts)).await.unwrap();
        assert_eq!(text, "café au lait");
    }

    #[tokio::test]
    async fn test_empty_source() {
        assert_eq!(collect_text(pieces(&[])).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_invalid_utf8() {
        let err = collect_text(pieces(&[b"\xFF\xFE".as_slice()])).await.unwrap_err();
        assert!(matches!(err, TextStreamError::InvalidUtf8));
    }

    #[tokio::test]
    async fn test_too_large() {
        let big = vec![b'a'; MAX_TEXT_BYTES];
        let parts = stream::iter(vec![Ok::<_, std::io::Error>(big), Ok(b"!".to_vec())]);
        let err = collect_text(parts).await.unwrap_err();
        assert!(matches!(err, TextStreamError::TooLarge));
    }

    #[tokio::test]
    async fn test_source_error_stops_collection() {
        let parts = stream::iter(vec![
            Ok(b"partial".to_vec()),
            Err(std::io::Error::other("pipe closed")),
            Ok(b"never".to_vec()),
        ]);
        let err = collect_text(parts).await.unwrap_err();
        match err {
            TextStreamError::Source(message) => assert!(message.contains("pipe closed")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
