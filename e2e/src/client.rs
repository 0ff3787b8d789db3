//! HTTP client that simulates how media players and automations talk to the proxy

use reqwest::Client;
use std::time::Instant;

use crate::runner::TestContext;
use crate::types::{ProxyResponse, StreamingResponse};

/// Build an HTTP client (no connection pooling for test isolation)
pub fn build_client() -> Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .pool_max_idle_per_host(0)
        .build()
        .expect("Failed to build reqwest client")
}

fn header_value(resp: &reqwest::Response, name: &str) -> String {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

/// GET the streaming endpoint and collect every body frame as it arrives
pub async fn stream_tts(ctx: &TestContext, query: &[(&str, &str)]) -> anyhow::Result<StreamingResponse> {
    let url = format!("http://{}/api/cynvoice/tts_stream", ctx.proxy_addr);
    let resp = read_stream(ctx.http_client.get(&url).query(query)).await?;
    ctx.record(resp.timing());
    Ok(resp)
}

/// Fetch an absolute playback URL the way a media player would
pub async fn stream_url(ctx: &TestContext, url: &str) -> anyhow::Result<StreamingResponse> {
    let resp = read_stream(ctx.http_client.get(url)).await?;
    ctx.record(resp.timing());
    Ok(resp)
}

/// POST to the entity-style endpoint with `streaming: true`, reading frames as they arrive
pub async fn post_streaming(ctx: &TestContext, mut body: serde_json::Value) -> anyhow::Result<StreamingResponse> {
    body["streaming"] = serde_json::Value::Bool(true);
    let url = format!("http://{}/api/cynvoice/tts", ctx.proxy_addr);
    let resp = read_stream(ctx.http_client.post(&url).json(&body)).await?;
    ctx.record(resp.timing());
    Ok(resp)
}

/// POST text to the streaming endpoint as a chunked body, one piece per frame
pub async fn post_text_stream(
    ctx: &TestContext,
    pieces: Vec<&'static str>,
    query: &[(&str, &str)],
) -> anyhow::Result<StreamingResponse> {
    let url = format!("http://{}/api/cynvoice/tts_stream", ctx.proxy_addr);
    let body = futures::stream::iter(pieces.into_iter().map(Ok::<_, std::io::Error>));
    let request = ctx
        .http_client
        .post(&url)
        .query(query)
        .header("Content-Type", "text/plain")
        .body(reqwest::Body::wrap_stream(body));
    let resp = read_stream(request).await?;
    ctx.record(resp.timing());
    Ok(resp)
}

/// Send `request` and read the body frame by frame, noting when each one lands
pub async fn read_stream(request: reqwest::RequestBuilder) -> anyhow::Result<StreamingResponse> {
    let start = Instant::now();
    let mut resp = request
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to send streaming request to proxy: {}", e))?;

    let status = resp.status().as_u16();
    let content_type = header_value(&resp, "content-type");
    let cache_control = header_value(&resp, "cache-control");

    let mut chunks = Vec::new();
    let mut arrivals_ms = Vec::new();
    let complete = loop {
        match resp.chunk().await {
            Ok(Some(chunk)) => {
                arrivals_ms.push(start.elapsed().as_millis() as u64);
                chunks.push(chunk.to_vec());
            }
            Ok(None) => break true,
            // Truncated body: the proxy aborted the stream
            Err(_) => break false,
        }
    };

    Ok(StreamingResponse {
        status,
        content_type,
        cache_control,
        chunks,
        first_chunk_ms: arrivals_ms.first().copied(),
        arrivals_ms,
        total_ms: start.elapsed().as_millis() as u64,
        complete,
    })
}

/// POST a JSON body to the proxy and read the whole response
pub async fn post_json(
    client: &Client,
    proxy_addr: &str,
    path: &str,
    body: serde_json::Value,
) -> anyhow::Result<ProxyResponse> {
    let url = format!("http://{proxy_addr}{path}");

    let resp = client
        .post(&url)
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to POST {}: {}", url, e))?;

    let status = resp.status().as_u16();
    let content_type = header_value(&resp, "content-type");
    let body = resp
        .bytes()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read proxy response: {}", e))?;

    Ok(ProxyResponse {
        status,
        content_type,
        body: body.to_vec(),
    })
}

/// Send a GET request to the proxy (for endpoints like /health)
pub async fn send_get(client: &Client, proxy_addr: &str, path: &str) -> anyhow::Result<ProxyResponse> {
    let url = format!("http://{proxy_addr}{path}");

    let resp = client
        .get(&url)
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to GET {}: {}", url, e))?;

    let status = resp.status().as_u16();
    let content_type = header_value(&resp, "content-type");
    let body = resp.bytes().await.unwrap_or_default();

    Ok(ProxyResponse {
        status,
        content_type,
        body: body.to_vec(),
    })
}
