//! Control plane - POST /api/cynvoice/speak hands out playback URLs

use serde_json::json;

use crate::backend::drain_requests;
use crate::client::{post_json, stream_url};
use crate::runner::TestContext;

use super::helpers::*;

/// Speak resolves parameters into a URL without touching the upstream
pub async fn test_speak_returns_url(ctx: TestContext) -> anyhow::Result<()> {
    let resp = post_json(
        &ctx.http_client,
        &ctx.proxy_addr,
        "/api/cynvoice/speak",
        json!({
            "entity_ids": ["media_player.kitchen", "media_player.den"],
            "message": "Dinner & dessert",
            "temperature": 0.8,
        }),
    )
    .await?;

    assert_true(resp.status == 200, &format!("Expected 200, got {}", resp.status))?;
    let body = resp.json()?;
    assert_field(&body, "entity_ids", json!(["media_player.kitchen", "media_player.den"]))?;
    assert_field(&body, "media_content_type", json!("music"))?;

    let media_url = body
        .get("media_content_id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing media_content_id"))?;
    let url = url::Url::parse(media_url)?;
    assert_eq_str(url.path(), "/api/cynvoice/tts_stream", "playback path")?;

    let query: std::collections::HashMap<String, String> = url.query_pairs().into_owned().collect();
    assert_eq_str(&query["text"], "Dinner & dessert", "text param")?;
    assert_eq_str(&query["voice"], "e2e-voice", "voice param")?;
    assert_eq_str(&query["temperature"], "0.8", "temperature param")?;

    assert_true(
        drain_requests(&ctx.backend_state).is_empty(),
        "Speak must not call the upstream",
    )?;
    Ok(())
}

/// The returned URL plays: fetching it streams the synthesized audio
pub async fn test_speak_url_plays(ctx: TestContext) -> anyhow::Result<()> {
    let resp = post_json(
        &ctx.http_client,
        &ctx.proxy_addr,
        "/api/cynvoice/speak",
        json!({"entity_ids": "media_player.kitchen", "message": "front door open"}),
    )
    .await?;
    let body = resp.json()?;
    let media_url = body
        .get("media_content_id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing media_content_id"))?;

    let audio = stream_url(&ctx, media_url).await?;

    assert_true(audio.status == 200, &format!("Expected 200, got {}", audio.status))?;
    assert_eq_str(&audio.text(), "<front><door><open>", "played audio")?;

    let payload = single_payload(&ctx)?.body;
    assert_field(&payload, "text", json!("front door open"))?;
    assert_field(&payload, "reference_id", json!("e2e-voice"))?;
    Ok(())
}

/// An empty target list is rejected
pub async fn test_speak_requires_entities(ctx: TestContext) -> anyhow::Result<()> {
    let resp = post_json(
        &ctx.http_client,
        &ctx.proxy_addr,
        "/api/cynvoice/speak",
        json!({"entity_ids": [], "message": "anyone?"}),
    )
    .await?;

    assert_true(resp.status == 400, &format!("Expected 400, got {}", resp.status))?;
    Ok(())
}
