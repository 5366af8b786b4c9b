//! Integration tests for the analysis pipeline.
//!
//! The remote service is replaced by `MockTransport`; everything else
//! (description, prompt, token ceiling, wire format, parsing) runs for real.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ilprobe::analyzer::{is_failure, Analyzer};
use ilprobe::dispatch::mock::MockTransport;
use ilprobe::dispatch::Dispatcher;
use ilprobe::metadata::{
    Instruction, MetadataItem, MethodBody, MethodDef, SelectionFile, SelectionSource,
};
use ilprobe::prompt::AnalysisMode;
use ilprobe::settings::Settings;
use tokio_util::sync::CancellationToken;

const RESPONSES_REPLY: &str = r#"{
    "output": [
        {"type": "reasoning", "summary": []},
        {"type": "message", "content": [{"type": "output_text", "text": "Health is client-authoritative."}]}
    ]
}"#;

const CHAT_REPLY: &str =
    r#"{"choices":[{"message":{"role":"assistant","content":"V1. Hardcoded credential"}}]}"#;

fn testdata_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

fn settings(model: &str) -> Settings {
    Settings {
        api_key: "sk-integration".to_string(),
        model: model.to_string(),
        base_url: "https://llm.example.test/".to_string(),
        ..Default::default()
    }
}

fn analyzer(mode: AnalysisMode, mock: &Arc<MockTransport>) -> Analyzer {
    Analyzer::with_dispatcher(mode, Dispatcher::with_transport(mock.clone()))
}

fn body_json(mock: &MockTransport) -> serde_json::Value {
    let sent = mock.last_request().expect("a request should have been sent");
    serde_json::from_slice(&sent.body).expect("request body should be JSON")
}

#[tokio::test]
async fn test_cheat_analysis_over_responses_format() {
    let selection = SelectionFile::load(testdata_path().join("selection_method.json")).unwrap();
    let mock = Arc::new(MockTransport::ok(RESPONSES_REPLY));
    let a = analyzer(AnalysisMode::CheatDetection, &mock);

    let output = a
        .analyze(
            &a.selection_request(),
            &selection.current_selection(),
            &settings("gpt-5-mini"),
            None,
        )
        .await;

    assert_eq!(output, "Health is client-authoritative.");
    assert_eq!(mock.call_count(), 1);

    let sent = mock.last_request().unwrap();
    assert_eq!(sent.endpoint, "https://llm.example.test/v1/responses");
    assert_eq!(sent.credential, "sk-integration");

    let json = body_json(&mock);
    assert_eq!(json["model"], "gpt-5-mini");
    assert_eq!(json["reasoning"]["effort"], "medium");
    let input = json["input"].as_str().unwrap();
    assert!(input.contains("Analyze the selected code for cheat/hack capabilities"));
    assert!(input.contains("IL_000E: ldfld        System.Single Game.Combat.Health::current"));
}

#[tokio::test]
async fn test_vulnerability_analysis_over_chat_format() {
    let selection = SelectionFile::load(testdata_path().join("selection_mixed.json")).unwrap();
    let mock = Arc::new(MockTransport::ok(CHAT_REPLY));
    let a = analyzer(AnalysisMode::VulnerabilityDetection, &mock);

    let output = a
        .analyze(
            "Is the login flow safe?",
            &selection.current_selection(),
            &settings("gpt-4o"),
            None,
        )
        .await;

    assert_eq!(output, "V1. Hardcoded credential");

    let sent = mock.last_request().unwrap();
    assert_eq!(sent.endpoint, "https://llm.example.test/v1/chat/completions");

    let json = body_json(&mock);
    assert_eq!(json["max_tokens"], 4000);
    assert_eq!(json["messages"][0]["role"], "system");
    let user = json["messages"][1]["content"].as_str().unwrap();
    assert!(user.starts_with("Analyze the following code and provide detailed analysis:"));
    assert!(user.contains("Is the login flow safe?"));
    assert!(user.contains("Game.Net.SessionManager"));
}

#[tokio::test]
async fn test_oversized_selection_never_reaches_the_network() {
    let instructions: Vec<Instruction> = (0..20_000u32)
        .map(|i| {
            Instruction::new(
                i * 5,
                "call",
                Some("System.Void Game.Generated.VeryLongHelperClassName::DoSomethingExpensive(System.Int32)"),
            )
        })
        .collect();
    let selection = SelectionFile {
        items: vec![MetadataItem::Method(MethodDef {
            name: "Huge".into(),
            full_name: "System.Void Game.Generated::Huge()".into(),
            access: "Public".into(),
            attributes: String::new(),
            return_type: "System.Void".into(),
            parameters: vec![],
            body: Some(MethodBody {
                instructions,
                ..Default::default()
            }),
        })],
    };

    let mock = Arc::new(MockTransport::ok(CHAT_REPLY));
    let output = analyzer(AnalysisMode::CheatDetection, &mock)
        .analyze("hi", &selection.current_selection(), &settings("gpt-4o"), None)
        .await;

    assert!(is_failure(&output));
    assert!(output.contains("**Request too large**"));
    assert!(output.contains("120000 token limit"));
    assert!(output.contains("Please select less code"));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_remote_error_is_reported() {
    let mock = Arc::new(MockTransport::reply(
        401,
        r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#,
    ));
    let output = analyzer(AnalysisMode::CheatDetection, &mock)
        .analyze("hi", &[], &settings("gpt-5"), None)
        .await;

    assert!(is_failure(&output));
    assert!(output.contains("**API error**"));
    assert!(output.contains("HTTP 401: Incorrect API key provided"));
}

#[tokio::test]
async fn test_slow_service_times_out() {
    let mock = Arc::new(MockTransport::ok(CHAT_REPLY).with_delay(Duration::from_secs(5)));
    let dispatcher =
        Dispatcher::with_transport(mock.clone()).with_timeout(Duration::from_millis(50));
    let a = Analyzer::with_dispatcher(AnalysisMode::CheatDetection, dispatcher);

    let output = a.analyze("hi", &[], &settings("gpt-4o"), None).await;

    assert!(is_failure(&output));
    assert!(output.contains("**Request timeout**"));
    assert!(output.contains("Estimated tokens:"));
}

#[tokio::test]
async fn test_cancel_while_waiting() {
    let mock = Arc::new(MockTransport::ok(CHAT_REPLY).with_delay(Duration::from_secs(5)));
    let a = analyzer(AnalysisMode::CheatDetection, &mock);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let output = a
        .analyze("hi", &[], &settings("gpt-4o"), Some(cancel))
        .await;

    assert!(is_failure(&output));
    assert!(output.contains("**Request canceled**"));
}

#[tokio::test]
async fn test_unparseable_reply_keeps_raw_body() {
    let mock = Arc::new(MockTransport::ok("<html>502 Bad Gateway</html>"));
    let output = analyzer(AnalysisMode::CheatDetection, &mock)
        .analyze("hi", &[], &settings("gpt-5"), None)
        .await;

    assert!(is_failure(&output));
    assert!(output.contains("<html>502 Bad Gateway</html>"));
}

#[tokio::test]
async fn test_concurrent_calls_share_one_analyzer() {
    let mock = Arc::new(MockTransport::ok(CHAT_REPLY));
    let a = Arc::new(analyzer(AnalysisMode::VulnerabilityDetection, &mock));
    let s = settings("gpt-4o");

    let (first, second) = tokio::join!(
        a.analyze("first", &[], &s, None),
        a.analyze("second", &[], &s, None)
    );

    assert_eq!(first, "V1. Hardcoded credential");
    assert_eq!(second, "V1. Hardcoded credential");
    assert_eq!(mock.call_count(), 2);
}
