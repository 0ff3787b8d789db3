//! Common test helpers and audio builders

use crate::backend::drain_requests;
use crate::runner::TestContext;
use crate::types::ReceivedRequest;

// ─── Audio builders ──────────────────────────────────────────────────────────

/// A 44-byte WAV header as the first frame of a stream, the way a model emits it
pub fn wav_header() -> Vec<u8> {
    let mut header = Vec::with_capacity(44);
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&u32::MAX.to_le_bytes());
    header.extend_from_slice(b"WAVEfmt ");
    header.extend_from_slice(&16u32.to_le_bytes());
    header.extend_from_slice(&1u16.to_le_bytes()); // PCM
    header.extend_from_slice(&1u16.to_le_bytes()); // mono
    header.extend_from_slice(&44_100u32.to_le_bytes());
    header.extend_from_slice(&88_200u32.to_le_bytes());
    header.extend_from_slice(&2u16.to_le_bytes());
    header.extend_from_slice(&16u16.to_le_bytes());
    header.extend_from_slice(b"data");
    header.extend_from_slice(&u32::MAX.to_le_bytes());
    header
}

/// Deterministic PCM-looking frame, distinct per `seed`
pub fn pcm_frame(seed: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
}

/// Header followed by `count` PCM frames of `len` bytes each
pub fn wav_stream(count: usize, len: usize) -> Vec<Vec<u8>> {
    let mut frames = vec![wav_header()];
    frames.extend((0..count).map(|i| pcm_frame(i as u8, len)));
    frames
}

// ─── Upstream inspection ─────────────────────────────────────────────────────

/// The single synthesis payload the upstream received for this test
pub fn single_payload(ctx: &TestContext) -> anyhow::Result<ReceivedRequest> {
    let mut reqs = drain_requests(&ctx.backend_state);
    assert_true(
        reqs.len() == 1,
        &format!("Expected exactly 1 upstream request, got {}", reqs.len()),
    )?;
    Ok(reqs.remove(0))
}

// ─── Assertion helpers ────────────────────────────────────────────────────────

/// Assert two strings are equal, with context on failure
pub fn assert_eq_str(actual: &str, expected: &str, label: &str) -> anyhow::Result<()> {
    if actual != expected {
        Err(anyhow::anyhow!("{label}: expected {:?} but got {:?}", expected, actual))
    } else {
        Ok(())
    }
}

/// Assert a JSON field equals an expected value
pub fn assert_field(body: &serde_json::Value, field: &str, expected: serde_json::Value) -> anyhow::Result<()> {
    let actual = body.get(field).cloned().unwrap_or(serde_json::Value::Null);
    if actual != expected {
        Err(anyhow::anyhow!("{field}: expected {} but got {}", expected, actual))
    } else {
        Ok(())
    }
}

/// Assert condition is true, with message
pub fn assert_true(cond: bool, msg: &str) -> anyhow::Result<()> {
    if !cond {
        Err(anyhow::anyhow!("{}", msg))
    } else {
        Ok(())
    }
}
