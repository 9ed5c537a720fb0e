use std::io::Write;

use larder::commands::{run_chat, run_parse, run_probe, ChatArgs};
use larder_intent::{InventoryIntent, TROUBLE_RESPONSE};
use larder_llm_api::{LlmSettings, ProviderSelector};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::NamedTempFile;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ollama_selector(server: &MockServer) -> ProviderSelector {
    ProviderSelector::new(LlmSettings {
        ollama_base_url: Some(server.uri()),
        ..LlmSettings::default()
    })
}

#[tokio::test]
async fn test_parse_command_against_ollama() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"stream": false, "model": "llama3.2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{"function": {"name": "add_items", "arguments": {"items": [{"name": "Milk"}]}}}]
            },
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut inventory = NamedTempFile::new().unwrap();
    inventory
        .write_all(br#"[{"name": "Eggs", "expiration_date": "2030-01-01"}]"#)
        .unwrap();

    let selector = ollama_selector(&server);
    let mut out = Vec::new();
    let intent = run_parse(&selector, "bought milk", Some(inventory.path()), vec!["Eggs".to_string()], true, &mut out)
        .await
        .unwrap();

    assert_eq!(intent.action(), "add");
    assert_eq!(intent.items()[0].name, "Milk");
    let printed: InventoryIntent = serde_json::from_slice(&out).unwrap();
    assert_eq!(printed, intent);

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let system = body["messages"][0]["content"].as_str().unwrap();
    assert!(system.contains("Also on hand: Eggs (fridge)"));
    assert!(system.ends_with("Recently active items: Eggs"));
}

#[tokio::test]
async fn test_parse_command_survives_backend_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "boom"})))
        .mount(&server)
        .await;

    // the engine turns the failure into an unknown intent
    let mut out = Vec::new();
    let intent = run_parse(&ollama_selector(&server), "bought milk", None, Vec::new(), false, &mut out)
        .await
        .unwrap();

    let expected = InventoryIntent::Unknown { response: TROUBLE_RESPONSE.to_string(), confidence: 0.0 };
    assert_eq!(intent, expected);

    let printed: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(printed["action"], "unknown");
    assert_eq!(printed["confidence"], 0.0);
    assert!(printed["response"].as_str().unwrap().contains("trouble understanding"));
}

#[tokio::test]
async fn test_chat_command_streams() {
    let server = MockServer::start().await;
    let body = concat!(
        "{\"message\":{\"content\":\"Hel\"},\"done\":false}\n",
        "{\"message\":{\"content\":\"lo\"},\"done\":true,\"prompt_eval_count\":1,\"eval_count\":2}\n",
    );
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"stream": true, "model": "qwen2.5"})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "application/x-ndjson"))
        .expect(1)
        .mount(&server)
        .await;

    let args = ChatArgs {
        prompt: "hi".to_string(),
        system: Some("be brief".to_string()),
        stream: true,
        temperature: Some(0.5),
        model: Some("qwen2.5".to_string()),
    };
    run_chat(&ollama_selector(&server), args).await.unwrap();
}

#[tokio::test]
async fn test_commands_fail_without_provider() {
    let selector = ProviderSelector::new(LlmSettings::default());
    let err = run_probe(&selector).await.unwrap_err();
    assert!(err.to_string().contains("no LLM provider configured"));
}
