mod common;

use common::{test_app, text_response, ScriptedTransport};
use coolify_mcp::mcp::protocol::{parse_line, JsonRpcResponse};
use coolify_mcp::mcp::server::McpServer;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::BufReader;

fn server(transport: Arc<ScriptedTransport>) -> McpServer {
    McpServer::new(test_app(transport))
}

async fn rpc(server: &McpServer, method: &str, params: Value) -> JsonRpcResponse {
    let line = json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params}).to_string();
    let request = parse_line(&line).ok().expect("request");
    server.handle_request(request).await.expect("reply")
}

/// The envelope carried in a successful `tools/call`.
async fn call(server: &McpServer, tool: &str, args: Value) -> Value {
    let reply = rpc(server, "tools/call", json!({"name": tool, "arguments": args})).await;
    assert!(reply.error.is_none(), "{:?}", reply.error);
    let result = reply.result.expect("result");
    assert_eq!(result["content"][0]["type"], json!("text"));
    let text = result["content"][0]["text"].as_str().expect("text");
    serde_json::from_str(text).expect("envelope json")
}

#[tokio::test]
async fn initialize_and_list_tools() {
    let server = server(ScriptedTransport::new());
    let init = rpc(&server, "initialize", json!({})).await.result.expect("result");
    assert_eq!(init["serverInfo"]["name"], json!("coolify"));

    let listed = rpc(&server, "tools/list", json!({})).await.result.expect("result");
    let tools = listed["tools"].as_array().expect("tools");
    assert_eq!(tools.len(), server.app().tool_executor.tool_names().len());
    assert!(tools
        .iter()
        .all(|tool| tool["inputSchema"]["type"] == json!("object")));
}

#[tokio::test]
async fn list_tools_summarize_and_paginate() {
    let transport = ScriptedTransport::new();
    let servers: Vec<Value> = (0..3)
        .map(|i| json!({"uuid": format!("s{}", i), "name": format!("srv-{}", i), "ip": "10.0.0.1"}))
        .collect();
    transport.reply(200, Value::Array(servers));
    let server = server(transport.clone());

    let envelope = call(&server, "list_servers", json!({"max_items": 2})).await;
    assert_eq!(envelope["success"], json!(true));
    assert_eq!(envelope["data"].as_array().map(Vec::len), Some(2));
    assert_eq!(envelope["data"][0]["uuid"], json!("s0"));
    assert!(envelope["data"][0].get("ip").is_none());
    assert_eq!(envelope["pagination"]["total"], json!(3));
    assert_eq!(envelope["pagination"]["truncated"], json!(true));
    assert_eq!(transport.request_lines(), vec!["GET /api/v1/servers"]);
}

#[tokio::test]
async fn deploy_sends_flags_and_default_message() {
    let transport = ScriptedTransport::new();
    transport.reply(200, json!({"deployment_uuid": "d1"}));
    let server = server(transport.clone());

    let envelope = call(
        &server,
        "deploy_application",
        json!({"uuid": "app 1", "force": true}),
    )
    .await;
    assert_eq!(envelope["message"], json!("Application deployment queued"));
    assert_eq!(envelope["data"]["deployment_uuid"], json!("d1"));
    assert_eq!(
        transport.request_lines(),
        vec!["POST /api/v1/applications/app%201/start?force=true"]
    );
    assert_eq!(transport.bodies(), vec![Some(json!({}))]);
}

#[tokio::test]
async fn upstream_failures_become_error_envelopes() {
    let transport = ScriptedTransport::new();
    transport.reply(404, json!({"message": "Server not found."}));
    let server = server(transport);

    let envelope = call(&server, "get_server", json!({"uuid": "missing"})).await;
    assert_eq!(envelope["success"], json!(false));
    assert_eq!(envelope["operation"], json!("get_server"));
    assert_eq!(envelope["error"]["message"], json!("Server not found."));
    assert_eq!(envelope["error"]["code"], json!("404"));
    assert_eq!(envelope["error"]["details"]["httpStatus"], json!(404));
    assert_eq!(envelope["error"]["details"]["args"], json!({"uuid": "missing"}));
    assert!(envelope["error"].get("stack").is_none());
    assert!(envelope["timestamp"].is_string());
}

#[tokio::test]
async fn unknown_tools_and_bad_arguments_are_protocol_errors() {
    let server = server(ScriptedTransport::new());

    let unknown = rpc(&server, "tools/call", json!({"name": "list_server", "arguments": {}})).await;
    let error = unknown.error.expect("error");
    assert_eq!(error.code, -32602);
    assert!(error.message.contains("list_servers"), "{}", error.message);

    let invalid = rpc(&server, "tools/call", json!({"name": "get_server", "arguments": {}})).await;
    let error = invalid.error.expect("error");
    assert_eq!(error.code, -32602);
    assert!(error.message.contains("uuid"));

    let missing = rpc(&server, "resources/list", json!({})).await;
    assert_eq!(missing.error.map(|e| e.code), Some(-32601));
}

#[tokio::test]
async fn batch_env_update_reports_each_variable() {
    let transport = ScriptedTransport::new();
    transport
        .reply(200, json!({"uuid": "e1"}))
        .reply(404, json!({"message": "Environment variable not found."}))
        .reply(201, json!({"uuid": "e2"}))
        .reply(422, json!({"message": "Invalid value."}));
    let server = server(transport.clone());

    let envelope = call(
        &server,
        "update_application_environment_variables",
        json!({
            "uuid": "app-1",
            "variables": [
                {"key": "EXISTING", "value": "1"},
                {"key": "FRESH", "value": "2", "is_build_time": true},
                {"key": "BROKEN", "value": "3"},
            ],
        }),
    )
    .await;

    assert_eq!(envelope["success"], json!(true));
    assert_eq!(envelope["message"], json!("Batch operation completed"));
    assert_eq!(envelope["failed"], json!(1));
    let results = envelope["data"]["results"].as_array().expect("results");
    assert_eq!(results[0]["action"], json!("updated"));
    assert_eq!(results[1]["action"], json!("created"));
    assert_eq!(results[2]["error"], json!("Invalid value."));
    assert_eq!(
        transport.request_lines(),
        vec![
            "PATCH /api/v1/applications/app-1/envs",
            "PATCH /api/v1/applications/app-1/envs",
            "POST /api/v1/applications/app-1/envs",
            "PATCH /api/v1/applications/app-1/envs",
        ]
    );
    assert_eq!(
        transport.bodies()[2],
        Some(json!({"key": "FRESH", "value": "2", "is_build_time": true}))
    );
}

#[tokio::test]
async fn github_app_creation_resolves_source() {
    let transport = ScriptedTransport::new();
    transport
        .reply(200, json!([{"id": 12, "uuid": "gh-default"}]))
        .reply(201, json!({"uuid": "new-app"}));
    let server = server(transport.clone());

    let envelope = call(
        &server,
        "create_private_github_app_application",
        json!({
            "project_uuid": "p",
            "server_uuid": "s",
            "git_repository": "org/repo",
            "git_branch": "main",
            "build_pack": "nixpacks",
            "ports_exposes": "3000",
        }),
    )
    .await;

    assert_eq!(envelope["data"]["uuid"], json!("new-app"));
    assert_eq!(
        transport.request_lines(),
        vec!["GET /api/v1/security/github-apps", "POST /api/v1/applications/public"]
    );
    let body = transport.bodies()[1].clone().expect("body");
    assert_eq!(body["source_id"], json!(12));
    assert_eq!(body["source_type"], json!("App\\Models\\GithubApp"));
    assert!(body.get("github_app_uuid").is_none());
}

#[tokio::test]
async fn unknown_github_app_is_not_found() {
    let transport = ScriptedTransport::new();
    transport.reply(200, json!([]));
    let server = server(transport);

    let envelope = call(
        &server,
        "create_private_github_app_application",
        json!({
            "github_app_uuid": "gh-x",
            "project_uuid": "p",
            "server_uuid": "s",
            "git_repository": "org/repo",
            "git_branch": "main",
            "build_pack": "nixpacks",
            "ports_exposes": "3000",
        }),
    )
    .await;
    assert_eq!(envelope["success"], json!(false));
    assert_eq!(
        envelope["error"]["message"],
        json!("GitHub App not found with UUID: gh-x")
    );
}

#[tokio::test]
async fn logs_are_truncated() {
    let transport = ScriptedTransport::new();
    transport.push(Ok(text_response(200, &"x".repeat(15_000))));
    let server = server(transport.clone());

    let envelope = call(&server, "get_application_logs", json!({"uuid": "a", "lines": 100})).await;
    let logs = envelope["data"].as_str().expect("logs");
    assert!(logs.ends_with("[truncated - content too large]"));
    assert_eq!(
        transport.request_lines(),
        vec!["GET /api/v1/applications/a/logs?lines=100"]
    );
}

#[tokio::test]
async fn serve_answers_requests_and_skips_notifications() {
    let transport = ScriptedTransport::new();
    transport.reply(200, json!([]));
    let server = server(transport);

    let input = [
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string(),
        "not json".to_string(),
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call", "params": {"name": "list_teams"}})
            .to_string(),
    ]
    .join("\n");
    let mut output = Vec::new();
    server
        .serve(BufReader::new(input.as_bytes()), &mut output)
        .await
        .expect("serve");

    let replies: Vec<Value> = String::from_utf8(output)
        .expect("utf8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0]["error"]["code"], json!(-32700));
    assert_eq!(replies[1]["id"], json!(2));
    let text = replies[1]["result"]["content"][0]["text"].as_str().expect("text");
    let envelope: Value = serde_json::from_str(text).expect("envelope");
    assert_eq!(envelope["data"], json!([]));
}

#[tokio::test]
async fn deploy_by_tag_keeps_its_argument_name() {
    let transport = ScriptedTransport::new();
    transport.reply(200, json!({"deployments": [{"deployment_uuid": "d1"}]}));
    let server = server(transport.clone());

    let envelope = call(&server, "deploy_by_tag", json!({"tagOrUuid": "prod,web"})).await;
    assert_eq!(envelope["message"], json!("Deployment triggered successfully"));
    assert_eq!(transport.request_lines(), vec!["GET /api/v1/deploy/prod%2Cweb"]);
}

#[tokio::test]
async fn get_deployments_summarizes_a_capped_page() {
    let transport = ScriptedTransport::new();
    transport.reply(
        200,
        json!({"count": 1, "deployments": [{
            "id": 4,
            "uuid": "d4",
            "status": "finished",
            "git_commit_sha": "abcdef0123456789",
            "message": "release",
            "logs": "[...]",
        }]}),
    );
    let server = server(transport.clone());

    let envelope = call(
        &server,
        "get_deployments",
        json!({"application_uuid": "app-1", "skip": 5, "limit": 200}),
    )
    .await;
    assert_eq!(envelope["data"][0]["commit_sha"], json!("abcdef01"));
    assert_eq!(envelope["data"][0]["message"], json!("release"));
    assert!(envelope["data"][0].get("logs").is_none());
    assert_eq!(envelope["pagination"]["limit"], json!(50));
    assert_eq!(envelope["pagination"]["count"], json!(1));
    assert_eq!(envelope["pagination"]["hasMore"], json!(false));
    assert!(envelope["hint"].is_string());
    assert_eq!(
        transport.request_lines(),
        vec!["GET /api/v1/deployments/applications/app-1?skip=5&take=50"]
    );
}

#[tokio::test]
async fn fullstack_project_creates_the_project() {
    let transport = ScriptedTransport::new();
    transport.reply(201, json!({"uuid": "p1"}));
    let server = server(transport.clone());

    let envelope = call(
        &server,
        "create_fullstack_project",
        json!({"name": "shop", "server_uuid": "s1"}),
    )
    .await;
    assert_eq!(envelope["data"]["project_uuid"], json!("p1"));
    assert_eq!(envelope["data"]["status"], json!("created"));
    assert_eq!(envelope["data"]["services"], json!([]));
    assert_eq!(
        transport.bodies(),
        vec![Some(json!({"name": "shop", "description": "Full-Stack Application Deployment"}))]
    );
}

#[tokio::test]
async fn infrastructure_stack_reports_partial_progress() {
    let transport = ScriptedTransport::new();
    transport
        .reply(201, json!({"uuid": "pg-1"}))
        .reply(500, json!({"message": "Redis template unavailable"}));
    let server = server(transport.clone());

    let envelope = call(
        &server,
        "deploy_infrastructure_stack",
        json!({"project_uuid": "p1", "server_uuid": "s1"}),
    )
    .await;
    assert_eq!(envelope["success"], json!(true));
    assert_eq!(envelope["data"]["status"], json!("failed"));
    assert_eq!(envelope["data"]["services"], json!(["pg-1"]));
    assert_eq!(
        envelope["message"],
        json!("Deployment failed: Redis template unavailable")
    );
    assert_eq!(
        transport.request_lines(),
        vec!["POST /api/v1/services", "POST /api/v1/services"]
    );
    let bodies = transport.bodies();
    assert_eq!(bodies[0].as_ref().map(|b| b["type"].clone()), Some(json!("postgresql")));
    assert_eq!(bodies[1].as_ref().map(|b| b["name"].clone()), Some(json!("app-redis")));
}

#[tokio::test]
async fn infrastructure_stack_honours_component_flags() {
    let transport = ScriptedTransport::new();
    transport.reply(201, json!({"uuid": "minio-1"}));
    let server = server(transport.clone());

    let envelope = call(
        &server,
        "deploy_infrastructure_stack",
        json!({
            "project_uuid": "p1",
            "server_uuid": "s1",
            "include_postgres": false,
            "include_redis": false,
        }),
    )
    .await;
    assert_eq!(envelope["data"]["status"], json!("deployed"));
    assert_eq!(envelope["data"]["services"], json!(["minio-1"]));
    assert_eq!(transport.requests().len(), 1);
}
