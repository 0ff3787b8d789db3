//! Scenario registry - every relay scenario is listed here

pub mod helpers;
pub mod speak;

use crate::runner::TestCase;

/// Build and return all test cases
///
/// Tests are grouped by category. Each test:
/// 1. Queues a mock upstream response (what the TTS service would return)
/// 2. Sends a request to the REAL proxy
/// 3. Validates the audio and the payload the upstream received
pub fn all_tests() -> Vec<TestCase> {
    macro_rules! test {
        ($name:expr, $desc:expr, $func:path) => {
            TestCase {
                name: $name,
                description: $desc,
                run: Box::new(|ctx| Box::pin($func(ctx))),
            }
        };
    }

    vec![
        // ── Streaming relay ───────────────────────────────────────────────────
        test!(
            "stream/in_order",
            "Audio frames arrive byte-identical and in upstream order",
            streaming::test_stream_in_order
        ),
        test!(
            "stream/headers",
            "Streaming response is audio/wav with caching disabled",
            streaming::test_stream_headers
        ),
        test!(
            "stream/starts_early",
            "First audio reaches the client before synthesis finishes",
            streaming::test_stream_starts_early
        ),
        test!(
            "stream/large_frames",
            "Upstream frames larger than the relay chunk size arrive intact",
            streaming::test_stream_large_frames
        ),
        test!(
            "stream/payload_defaults",
            "Upstream payload carries fixed fields and layered defaults",
            streaming::test_stream_payload_defaults
        ),
        test!(
            "stream/query_overrides",
            "Query parameters override stored settings",
            streaming::test_stream_query_overrides
        ),
        test!(
            "stream/malformed_numbers",
            "Malformed numeric parameters fall back to defaults",
            streaming::test_stream_malformed_numbers
        ),
        test!(
            "stream/text_verbatim",
            "Text is forwarded verbatim; missing text is sent as empty",
            streaming::test_stream_text_verbatim
        ),
        test!(
            "stream/text_body",
            "Text POSTed in pieces is collected, then relayed as one synthesis",
            streaming::test_stream_text_body
        ),
        test!(
            "stream/concurrent",
            "Simultaneous streams do not mix audio",
            streaming::test_concurrent_streams
        ),

        // ── Failure handling ──────────────────────────────────────────────────
        test!(
            "errors/upstream_5xx",
            "Upstream 5xx before audio yields plain 500 \"Streaming error\"",
            errors::test_stream_upstream_error
        ),
        test!(
            "errors/upstream_4xx",
            "Upstream 4xx is handled like 5xx",
            errors::test_stream_upstream_client_error
        ),
        test!(
            "errors/midstream_failure",
            "Mid-stream upstream failure truncates the committed body",
            errors::test_stream_midstream_failure
        ),
        test!(
            "errors/unreachable_upstream",
            "Unreachable api_url override fails with 500",
            errors::test_stream_unreachable_upstream
        ),
        test!(
            "errors/tts_upstream_error",
            "Buffered endpoint reports upstream failures as \"TTS error\"",
            errors::test_tts_upstream_error
        ),
        test!(
            "errors/recovers",
            "A failed request does not affect the next one",
            errors::test_recovers_after_error
        ),

        // ── Entity-style endpoint ─────────────────────────────────────────────
        test!(
            "tts/health",
            "/health returns OK from the proxy itself",
            buffered::test_health
        ),
        test!(
            "tts/buffered",
            "Buffered synthesis returns the whole file as audio/wav",
            buffered::test_tts_buffered
        ),
        test!(
            "tts/body_overrides",
            "Body fields override stored settings",
            buffered::test_tts_body_overrides
        ),
        test!(
            "tts/streaming_flag",
            "streaming:true switches to the chunked relay",
            buffered::test_tts_streaming_flag
        ),

        // ── Speak control plane ───────────────────────────────────────────────
        test!(
            "speak/returns_url",
            "Speak returns a playback URL without calling the upstream",
            speak::test_speak_returns_url
        ),
        test!(
            "speak/url_plays",
            "Fetching the playback URL streams the synthesized audio",
            speak::test_speak_url_plays
        ),
        test!(
            "speak/requires_entities",
            "Empty entity_ids is rejected with 400",
            speak::test_speak_requires_entities
        ),
    ]
}
