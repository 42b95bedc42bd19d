//! Providers against in-process warp mock servers

use codemode_providers::prelude::*;
use codemode_registry::{Aggregation, CapabilityError, CapabilityProvider, ProviderError};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::net::SocketAddr;
use warp::http::StatusCode;
use warp::Filter;

/// Tool server exposing `add` and `explode`
fn spawn_tool_server() -> SocketAddr {
    let list = warp::path!("tools").and(warp::get()).map(|| {
        warp::reply::json(&json!([
            {"name": "add", "description": "Adds numbers"},
            {"name": "explode", "description": ""}
        ]))
    });

    let invoke = warp::path!("tools" / String)
        .and(warp::post())
        .and(warp::body::json())
        .map(|name: String, body: Value| {
            let args = body["args"].as_array().cloned().unwrap_or_default();
            let (reply, status) = match name.as_str() {
                "add" => {
                    let sum: f64 = args.iter().filter_map(Value::as_f64).sum();
                    (json!({"result": sum}), StatusCode::OK)
                }
                "explode" => (json!({"error": "boom"}), StatusCode::INTERNAL_SERVER_ERROR),
                _ => (json!({"error": format!("unknown tool {name}")}), StatusCode::NOT_FOUND),
            };
            warp::reply::with_status(warp::reply::json(&reply), status)
        });

    let (addr, server) = warp::serve(list.or(invoke)).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

/// Server whose listing endpoint always fails
fn spawn_broken_server() -> SocketAddr {
    let routes = warp::path!("tools").map(|| {
        warp::reply::with_status("maintenance", StatusCode::SERVICE_UNAVAILABLE)
    });
    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

/// OpenAI-compatible completion endpoint echoing the last user message
fn spawn_completion_server() -> SocketAddr {
    let routes = warp::path!("chat" / "completions")
        .and(warp::post())
        .and(warp::header::<String>("authorization"))
        .and(warp::body::json())
        .map(|auth: String, body: Value| {
            let last = body["messages"]
                .as_array()
                .and_then(|m| m.last())
                .and_then(|m| m["content"].as_str())
                .unwrap_or_default()
                .to_string();
            warp::reply::json(&json!({
                "choices": [{
                    "message": {"role": "assistant", "content": format!("{auth} | {last}")}
                }],
                "citations": ["https://example.org/source"]
            }))
        });
    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

#[tokio::test]
async fn lists_and_invokes_remote_tools() {
    let addr = spawn_tool_server();
    let provider = HttpToolProvider::new("math", format!("http://{addr}/"));

    let capabilities = provider.list_capabilities().await.unwrap();
    let names: Vec<&str> = capabilities.iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["add", "explode"]);
    assert_eq!(capabilities[0].description(), "Adds numbers");

    let sum = capabilities[0].invoke(vec![json!(2), json!(3)]).await.unwrap();
    assert_eq!(sum, json!(5.0));

    let err = capabilities[1].invoke(vec![]).await.unwrap_err();
    assert_eq!(err, CapabilityError::Failed("boom".to_string()));
}

#[tokio::test]
async fn broken_listing_is_unavailable() {
    let addr = spawn_broken_server();
    let provider = HttpToolProvider::new("down", format!("http://{addr}"));

    let err = provider.list_capabilities().await.unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable(msg) if msg.contains("503")));
}

#[tokio::test]
async fn configured_sources_aggregate_with_isolation() {
    let healthy = spawn_tool_server();
    let broken = spawn_broken_server();

    let config = ProvidersConfig::new()
        .with_http(HttpProviderConfig::new("math", format!("http://{healthy}")))
        .with_http(HttpProviderConfig::new("down", format!("http://{broken}")))
        .with_chat_completion(
            CompletionConfig::chat().with_api_key_env("CODEMODE_TEST_UNSET_VARIABLE_90AB"),
        );

    let cache = ReadThroughCache::in_memory();
    let aggregator = aggregator_from_config(&config, &cache, Duration::from_secs(60));
    let Aggregation { registry, report } = aggregator.build_registry(None).await;

    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["math_add", "math_explode"]);
    assert_eq!(
        registry.get("math_explode").unwrap().description(),
        "explode capability provided by math"
    );
    assert!(report.failure("down").is_some());
    assert!(report.failure("chat_completion").is_some());
}

#[tokio::test]
async fn listing_is_served_from_cache() {
    let addr = spawn_tool_server();
    let cache = ReadThroughCache::in_memory();
    let config =
        ProvidersConfig::new().with_http(HttpProviderConfig::new("math", format!("http://{addr}")));

    let aggregator = aggregator_from_config(&config, &cache, Duration::from_secs(60));
    aggregator.build_registry(None).await;
    aggregator.build_registry(None).await;

    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
}

#[tokio::test]
async fn completion_adapters_call_endpoint() {
    let addr = spawn_completion_server();
    let base = format!("http://{addr}");

    let chat =
        ChatCompletionAdapter::from_config(CompletionConfig::chat().with_base_url(base.clone()))
            .with_api_key("sk-test");
    let capability = codemode_registry::CapabilityAdapter::build(&chat).await.unwrap();
    let reply = capability.invoke(vec![json!("hello")]).await.unwrap();
    assert_eq!(reply, json!("Bearer sk-test | hello"));

    let research =
        ResearchSearchAdapter::from_config(CompletionConfig::research().with_base_url(base))
            .with_api_key("pk-test");
    let capability = codemode_registry::CapabilityAdapter::build(&research).await.unwrap();
    let found = capability.invoke(vec![json!("rust async")]).await.unwrap();
    assert_eq!(found["query"], json!("rust async"));
    assert_eq!(found["answer"], json!("Bearer pk-test | rust async"));
    assert_eq!(found["citations"], json!(["https://example.org/source"]));
}
