//! Playback URL for the streaming endpoint
//!
//! A playback target fetches this URL and receives the relayed audio.

use super::request::SynthesisRequest;

/// Path of the streaming relay endpoint
pub const STREAM_PATH: &str = "/api/cynvoice/tts_stream";

/// Build `<base>/api/cynvoice/tts_stream?text=..&voice=..` for `request`
pub fn stream_url(public_base_url: &str, request: &SynthesisRequest) -> Result<String, url::ParseError> {
    let mut url = url::Url::parse(&format!("{}{}", public_base_url.trim_end_matches('/'), STREAM_PATH))?;
    url.query_pairs_mut()
        .append_pair("text", request.text())
        .append_pair("voice", request.voice())
        .append_pair("temperature", &request.temperature().to_string())
        .append_pair("repetition_penalty", &request.repetition_penalty().to_string())
        .append_pair("api_url", request.endpoint_url());
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::{RequestBuilder, SettingsLayer, SynthesisOverrides};

    fn request(text: &str) -> SynthesisRequest {
        let empty = SettingsLayer::new();
        RequestBuilder::new(&empty, &empty).build(text, &SynthesisOverrides::default())
    }

    #[test]
    fn test_stream_url_encodes_query() {
        let url = stream_url("http://ha.local:8123", &request("Hello world & more")).unwrap();

        assert!(url.starts_with("http://ha.local:8123/api/cynvoice/tts_stream?"));
        assert!(url.contains("text=Hello+world+%26+more"));
        assert!(url.contains("voice=cyn2"));
        assert!(url.contains("temperature=0.95"));
        assert!(url.contains("repetition_penalty=1.1"));
        assert!(url.contains("api_url=http%3A%2F%2Flocalhost%3A8080%2Fv1%2Ftts"));
    }

    #[test]
    fn test_stream_url_round_trips_text() {
        let text = "Grüße, \"friend\"? 100% ok";
        let url = url::Url::parse(&stream_url("http://ha.local/", &request(text)).unwrap()).unwrap();

        let decoded: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(decoded[0], ("text".to_string(), text.to_string()));
        assert_eq!(url.path(), STREAM_PATH);
    }

    #[test]
    fn test_stream_url_keeps_base_path() {
        let url = stream_url("https://example.com/ha/", &request("hi")).unwrap();
        assert!(url.starts_with("https://example.com/ha/api/cynvoice/tts_stream?text=hi&"));
    }

    #[test]
    fn test_stream_url_rejects_bad_base() {
        assert!(stream_url("not a base", &request("hi")).is_err());
    }
}
