//! End-to-end `run_prompt` tests against mock provider endpoints.
//!
//! Covers request shape, the return-shape contract, citation normalization,
//! structured output validation and the opt-in transient retry.

mod support;

use serde_json::json;
use uniprompt::{Config, PromptError, PromptRequest, PromptResult, PromptReturn, Uniprompt};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn config(json: serde_json::Value) -> Config {
    let config: Config = serde_json::from_value(json).expect("valid config json");
    config.canonicalized()
}

fn openai_config(server: &MockServer) -> Config {
    config(json!({
        "providers": {"openai": {"api_key": "test-key", "base_url": server.uri()}}
    }))
}

fn responses_body(text: &str) -> serde_json::Value {
    json!({
        "output": [
            {"type": "message", "content": [{"type": "output_text", "text": text}]}
        ]
    })
}

fn body_json(req: &Request) -> Option<serde_json::Value> {
    serde_json::from_slice(&req.body).ok()
}

#[tokio::test]
async fn plain_text_run_returns_the_bare_result_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .and(header("authorization", "Bearer test-key"))
        .and(|req: &Request| {
            let Some(v) = body_json(req) else { return false };
            v["model"] == json!("gpt-5.2")
                && v["input"][0]["content"][0]["text"] == json!("say hi")
                && v.get("tools").is_none()
        })
        .respond_with(ResponseTemplate::new(200).set_body_json(responses_body("hi there")))
        .expect(1)
        .mount(&server)
        .await;

    let client = Uniprompt::new(openai_config(&server));
    let output = client
        .run_prompt(PromptRequest::new("say hi").model("chatgpt"))
        .await
        .expect("run ok");

    assert!(matches!(output, PromptReturn::Result(_)));
    assert_eq!(output.result().as_text(), Some("hi there"));
    assert!(output.citations().is_none());
}

#[tokio::test]
async fn requesting_citations_always_yields_the_pair_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .and(|req: &Request| {
            // require_search must surface as the web search tool.
            body_json(req)
                .is_some_and(|v| v["tools"][0]["type"] == json!("web_search_preview"))
        })
        .respond_with(ResponseTemplate::new(200).set_body_json(responses_body("uncited")))
        .expect(1)
        .mount(&server)
        .await;

    let client = Uniprompt::new(openai_config(&server));
    let output = client
        .run_prompt(
            PromptRequest::new("anything new?")
                .model("gpt-5.2")
                .require_search(true)
                .return_citations(true),
        )
        .await
        .expect("run ok");

    // No citations in the reply still means an empty list, never a bare result.
    match output {
        PromptReturn::WithCitations(result, citations) => {
            assert_eq!(result.as_text(), Some("uncited"));
            assert!(citations.is_empty());
        }
        PromptReturn::Result(_) => panic!("expected the citation pair shape"),
    }
}

#[tokio::test]
async fn perplexity_search_results_are_normalized_into_citations() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer pplx-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "According to [1]..."}}],
            "search_results": [
                {"url": "https://example.com/a", "title": "Example A", "snippet": "quoted"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = config(json!({
        "providers": {"perplexity": {"api_key": "pplx-test", "base_url": server.uri()}}
    }));
    let client = Uniprompt::new(cfg);
    let output = client
        .run_prompt(
            PromptRequest::new("find sources")
                .model("sonar-pro")
                .require_search(true)
                .return_citations(true),
        )
        .await
        .expect("run ok");

    let citations = output.citations().expect("citation shape");
    assert_eq!(citations.len(), 1);
    assert_eq!(citations[0].provider, "perplexity");
    assert_eq!(citations[0].url.as_deref(), Some("https://example.com/a"));
    assert_eq!(citations[0].title.as_deref(), Some("Example A"));
    assert_eq!(citations[0].snippet.as_deref(), Some("quoted"));
}

#[tokio::test]
async fn structured_output_is_validated_against_the_schema() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .and(|req: &Request| {
            body_json(req).is_some_and(|v| {
                v["text"]["format"]["type"] == json!("json_schema")
                    && v["text"]["format"]["strict"] == json!(true)
            })
        })
        .respond_with(
            ResponseTemplate::new(200).set_body_json(responses_body(r#"{"answer": 42}"#)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let schema = json!({
        "type": "object",
        "properties": {"answer": {"type": "integer"}},
        "required": ["answer"]
    });

    let client = Uniprompt::new(openai_config(&server));
    let output = client
        .run_prompt(PromptRequest::new("answer").model("gpt-5.2").output_schema(schema))
        .await
        .expect("run ok");

    match output.result() {
        PromptResult::Structured(value) => assert_eq!(value["answer"], json!(42)),
        PromptResult::Text(_) => panic!("expected structured result"),
    }
}

#[tokio::test]
async fn unparsable_structured_output_surfaces_the_raw_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(responses_body("sorry, no json today")),
        )
        .mount(&server)
        .await;

    let schema = json!({"type": "object", "required": ["answer"]});
    let client = Uniprompt::new(openai_config(&server));
    let err = client
        .run_prompt(PromptRequest::new("answer").model("gpt-5.2").output_schema(schema))
        .await
        .unwrap_err();

    match err {
        PromptError::OutputValidation { raw, .. } => {
            assert_eq!(raw, "sorry, no json today");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn extracted_file_context_is_folded_into_the_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, "remember the milk").unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .and(|req: &Request| {
            body_json(req).is_some_and(|v| {
                let prompt = v["input"][0]["content"][0]["text"].as_str().unwrap_or_default();
                prompt.starts_with("summarize my notes")
                    && prompt.contains("----- begin file: notes.txt -----")
                    && prompt.contains("remember the milk")
            })
        })
        .respond_with(ResponseTemplate::new(200).set_body_json(responses_body("done")))
        .expect(1)
        .mount(&server)
        .await;

    let client = Uniprompt::new(openai_config(&server));
    let output = client
        .run_prompt(
            PromptRequest::new("summarize my notes")
                .model("gpt-5.2")
                .file(notes.as_path()),
        )
        .await
        .expect("run ok");
    assert_eq!(output.result().as_text(), Some("done"));
}

#[tokio::test]
async fn rate_limit_is_retried_once_when_the_provider_opts_in() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(responses_body("recovered")))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = config(json!({
        "providers": {"openai": {
            "api_key": "test-key",
            "base_url": server.uri(),
            "retry_transient": true
        }}
    }));
    let client = Uniprompt::new(cfg);
    let output = client
        .run_prompt(PromptRequest::new("try again").model("gpt-5.2"))
        .await
        .expect("second attempt succeeds");
    assert_eq!(output.result().as_text(), Some("recovered"));
}

#[tokio::test]
async fn rate_limit_surfaces_immediately_without_the_opt_in() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .expect(1)
        .mount(&server)
        .await;

    let client = Uniprompt::new(openai_config(&server));
    let err = client
        .run_prompt(PromptRequest::new("once only").model("gpt-5.2"))
        .await
        .unwrap_err();

    assert!(err.is_transient());
    match err {
        PromptError::RateLimit { provider, .. } => assert_eq!(provider, "openai"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn provider_5xx_maps_to_a_provider_error_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .expect(1)
        .mount(&server)
        .await;

    let client = Uniprompt::new(openai_config(&server));
    let err = client
        .run_prompt(PromptRequest::new("boom").model("gpt-5.2"))
        .await
        .unwrap_err();

    match err {
        PromptError::Provider { provider, status, .. } => {
            assert_eq!(provider, "openai");
            assert_eq!(status, Some(500));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn contentless_success_payload_is_a_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = Uniprompt::new(openai_config(&server));
    let err = client
        .run_prompt(PromptRequest::new("hi").model("gpt-5.2"))
        .await
        .unwrap_err();

    match err {
        PromptError::Provider { provider, status, message } => {
            assert_eq!(provider, "openai");
            assert_eq!(status, None);
            assert!(message.contains("no message content"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn missing_credentials_fail_as_configuration_before_any_request() {
    let server = MockServer::start().await;
    // No mock mounted: a request reaching the server would 404 and show up
    // as a provider error instead of the expected configuration error.
    let cfg = config(json!({
        "providers": {"claude": {"base_url": server.uri()}}
    }));
    let _env = support::EnvGuard::unset(&["ANTHROPIC_API_KEY", "CLAUDE_API_KEY"]);

    let client = Uniprompt::new(cfg);
    let err = client
        .run_prompt(PromptRequest::new("hi").model("claude-opus-4-6"))
        .await
        .unwrap_err();

    match err {
        PromptError::Configuration(message) => {
            assert!(message.contains("claude"), "{message}");
            assert!(!message.contains("test-key"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}
