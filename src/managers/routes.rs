use crate::errors::ApiError;
use crate::services::coolify_client::CoolifyClient;
use crate::services::retry::{API_PROFILE, DEPLOYMENT_PROFILE};
use crate::services::tool_executor::{ToolHandler, ToolOutput};
use crate::utils::listing::{paginate, ListOptions};
use crate::utils::output::{compact_application, truncate_logs};
use crate::utils::template::{append_query, placeholder_names, query_pairs, render_path};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Patch,
    Delete,
}

impl Verb {
    pub fn method(self) -> Method {
        match self {
            Verb::Get => Method::GET,
            Verb::Post => Method::POST,
            Verb::Patch => Method::PATCH,
            Verb::Delete => Method::DELETE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    None,
    /// `{}`; some control endpoints reject an empty POST.
    EmptyObject,
    /// Arguments left after path, query, and option keys are consumed.
    Args,
    /// The `data` object when given, otherwise the leftover arguments.
    DataOrArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Raw,
    List(&'static str),
    Logs,
    Application,
    /// Pulls an array out of a wrapper object, `[]` when absent.
    Unwrap(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct Route {
    pub tool: &'static str,
    pub verb: Verb,
    pub path: &'static str,
    pub body: BodyMode,
    /// Sent whenever present.
    pub query: &'static [&'static str],
    /// Sent as `=true` only when set to true.
    pub flags: &'static [&'static str],
    pub delete_options: bool,
    pub profile: &'static str,
    pub shape: Shape,
    /// Used when the upstream reply has no `message` of its own.
    pub message: Option<&'static str>,
}

const fn route(tool: &'static str, verb: Verb, path: &'static str) -> Route {
    Route {
        tool,
        verb,
        path,
        body: BodyMode::None,
        query: &[],
        flags: &[],
        delete_options: false,
        profile: API_PROFILE,
        shape: Shape::Raw,
        message: None,
    }
}

const fn list(tool: &'static str, path: &'static str, entity: &'static str) -> Route {
    Route {
        shape: Shape::List(entity),
        ..route(tool, Verb::Get, path)
    }
}

const fn create(tool: &'static str, path: &'static str) -> Route {
    Route {
        body: BodyMode::Args,
        ..route(tool, Verb::Post, path)
    }
}

const fn update(tool: &'static str, path: &'static str) -> Route {
    Route {
        body: BodyMode::DataOrArgs,
        ..route(tool, Verb::Patch, path)
    }
}

const fn delete(tool: &'static str, path: &'static str) -> Route {
    Route {
        delete_options: true,
        ..route(tool, Verb::Delete, path)
    }
}

const fn control(tool: &'static str, verb: Verb, path: &'static str, message: &'static str) -> Route {
    Route {
        message: Some(message),
        ..route(tool, verb, path)
    }
}

const DEPLOY_FLAGS: &[&str] = &["force", "instant_deploy"];
const PAGING: &[&str] = &["skip", "take"];

/// Delete toggles, accepted top-level or under `options` (either casing).
const DELETE_OPTIONS: &[(&str, &str)] = &[
    ("delete_configurations", "deleteConfigurations"),
    ("delete_volumes", "deleteVolumes"),
    ("docker_cleanup", "dockerCleanup"),
    ("delete_connected_networks", "deleteConnectedNetworks"),
];

/// Keys that shape the response and never reach the upstream API.
const SHAPING_KEYS: &[&str] = &["max_items", "limit", "include_details", "fields"];

pub static ROUTES: &[Route] = &[
    // servers
    list("list_servers", "/servers", "servers"),
    route("get_server", Verb::Get, "/servers/{uuid}"),
    route("get_server_resources", Verb::Get, "/servers/{uuid}/resources"),
    route("get_server_domains", Verb::Get, "/servers/{uuid}/domains"),
    route("validate_server", Verb::Get, "/servers/{uuid}/validate"),
    // projects
    list("list_projects", "/projects", "projects"),
    route("get_project", Verb::Get, "/projects/{uuid}"),
    create("create_project", "/projects"),
    update("update_project", "/projects/{uuid}"),
    route("delete_project", Verb::Delete, "/projects/{uuid}"),
    route(
        "get_project_environment",
        Verb::Get,
        "/projects/{project_uuid}/{environment_name_or_uuid}",
    ),
    // applications
    list("list_applications", "/applications", "applications"),
    Route {
        shape: Shape::Application,
        ..route("get_application", Verb::Get, "/applications/{uuid}")
    },
    create("create_application", "/applications/public"),
    create(
        "create_private_deploy_key_application",
        "/applications/private-deploy-key",
    ),
    update("update_application", "/applications/{uuid}"),
    delete("delete_application", "/applications/{uuid}"),
    Route {
        body: BodyMode::EmptyObject,
        flags: DEPLOY_FLAGS,
        profile: DEPLOYMENT_PROFILE,
        ..control(
            "deploy_application",
            Verb::Post,
            "/applications/{uuid}/start",
            "Application deployment queued",
        )
    },
    Route {
        body: BodyMode::EmptyObject,
        flags: DEPLOY_FLAGS,
        profile: DEPLOYMENT_PROFILE,
        ..control(
            "start_application",
            Verb::Post,
            "/applications/{uuid}/start",
            "Application start/deployment queued successfully",
        )
    },
    Route {
        body: BodyMode::EmptyObject,
        ..control(
            "stop_application",
            Verb::Post,
            "/applications/{uuid}/stop",
            "Application stop request queued",
        )
    },
    Route {
        body: BodyMode::EmptyObject,
        profile: DEPLOYMENT_PROFILE,
        ..control(
            "restart_application",
            Verb::Post,
            "/applications/{uuid}/restart",
            "Application restart request queued",
        )
    },
    route(
        "get_application_resources",
        Verb::Get,
        "/applications/{uuid}/resources",
    ),
    Route {
        query: &["since", "until", "lines"],
        shape: Shape::Logs,
        ..route("get_application_logs", Verb::Get, "/applications/{uuid}/logs")
    },
    // databases
    list("list_databases", "/databases", "databases"),
    route("get_database", Verb::Get, "/databases/{uuid}"),
    update("update_database", "/databases/{uuid}"),
    delete("delete_database", "/databases/{uuid}"),
    control(
        "start_database",
        Verb::Get,
        "/databases/{uuid}/start",
        "Database start request queued",
    ),
    control(
        "stop_database",
        Verb::Get,
        "/databases/{uuid}/stop",
        "Database stop request queued",
    ),
    control(
        "restart_database",
        Verb::Get,
        "/databases/{uuid}/restart",
        "Database restart request queued",
    ),
    create("create_database", "/databases/{type}"),
    // services
    list("list_services", "/services", "services"),
    route("get_service", Verb::Get, "/services/{uuid}"),
    create("create_service", "/services"),
    delete("delete_service", "/services/{uuid}"),
    control(
        "start_service",
        Verb::Get,
        "/services/{uuid}/start",
        "Service start request queued",
    ),
    control(
        "stop_service",
        Verb::Get,
        "/services/{uuid}/stop",
        "Service stop request queued",
    ),
    control(
        "restart_service",
        Verb::Get,
        "/services/{uuid}/restart",
        "Service restart request queued",
    ),
    create("create_docker_compose_service", "/services/docker-compose"),
    update(
        "update_docker_compose_service",
        "/services/{uuid}/docker-compose",
    ),
    // deployments
    Route {
        query: PAGING,
        ..route("list_deployments", Verb::Get, "/deployments")
    },
    Route {
        query: PAGING,
        shape: Shape::Unwrap("deployments"),
        ..route(
            "get_application_deployments",
            Verb::Get,
            "/deployments/applications/{uuid}",
        )
    },
    route("get_deployment", Verb::Get, "/deployments/{uuid}"),
    control(
        "cancel_deployment",
        Verb::Post,
        "/deployments/{uuid}/cancel",
        "Deployment cancelled successfully",
    ),
    Route {
        profile: DEPLOYMENT_PROFILE,
        ..control(
            "deploy_by_tag",
            Verb::Get,
            "/deploy/{tagOrUuid}",
            "Deployment triggered successfully",
        )
    },
    // teams and resources
    list("list_teams", "/teams", "teams"),
    route("get_team", Verb::Get, "/teams/{id}"),
    route("get_team_members", Verb::Get, "/teams/{id}/members"),
    route("get_current_team", Verb::Get, "/teams/current"),
    route("get_current_team_members", Verb::Get, "/teams/current/members"),
    list("list_resources", "/resources", "resources"),
];

pub fn route_for(tool: &str) -> Option<&'static Route> {
    ROUTES.iter().find(|route| route.tool == tool)
}

fn option_value<'a>(args: &'a Value, snake: &str, camel: &str) -> Option<&'a Value> {
    let nested = args.get("options");
    args.get(snake)
        .or_else(|| nested.and_then(|o| o.get(snake)))
        .or_else(|| nested.and_then(|o| o.get(camel)))
        .filter(|v| v.is_boolean())
}

pub fn delete_query(args: &Value) -> Vec<(String, String)> {
    DELETE_OPTIONS
        .iter()
        .filter_map(|(snake, camel)| {
            option_value(args, snake, camel).map(|v| (snake.to_string(), v.to_string()))
        })
        .collect()
}

fn flag_query(args: &Value, flags: &[&str]) -> Vec<(String, String)> {
    flags
        .iter()
        .filter(|flag| args.get(**flag).and_then(|v| v.as_bool()).unwrap_or(false))
        .map(|flag| (flag.to_string(), "true".to_string()))
        .collect()
}

/// Method, path with query, and body for one call of `route`.
pub fn build_request(route: &Route, args: &Value) -> Result<(Method, String, Option<Value>), ApiError> {
    let mut path = render_path(route.path, args)?;

    let mut pairs = query_pairs(args, route.query);
    pairs.extend(flag_query(args, route.flags));
    if route.delete_options {
        pairs.extend(delete_query(args));
    }
    path = append_query(&path, &pairs);

    let leftover = || {
        let mut body = args.as_object().cloned().unwrap_or_else(Map::new);
        let consumed = placeholder_names(route.path)
            .into_iter()
            .chain(route.query.iter().copied())
            .chain(route.flags.iter().copied())
            .chain(SHAPING_KEYS.iter().copied())
            .chain(["options"]);
        for key in consumed {
            body.remove(key);
        }
        if route.delete_options {
            for (snake, _) in DELETE_OPTIONS {
                body.remove(*snake);
            }
        }
        Value::Object(body)
    };

    let body = match route.body {
        BodyMode::None => None,
        BodyMode::EmptyObject => Some(Value::Object(Map::new())),
        BodyMode::Args => Some(leftover()),
        BodyMode::DataOrArgs => match args.get("data") {
            Some(data) if data.is_object() => Some(data.clone()),
            _ => Some(leftover()),
        },
    };
    Ok((route.verb.method(), path, body))
}

/// Applies the route's response shaping to a decoded payload.
pub fn shape_response(route: &Route, data: Value, args: &Value) -> ToolOutput {
    let upstream_message = data
        .get("message")
        .and_then(|v| v.as_str())
        .filter(|m| !m.is_empty())
        .map(|m| m.to_string());
    let output = match route.shape {
        Shape::Raw => ToolOutput::new(data),
        Shape::List(entity) => match data.as_array() {
            Some(items) => {
                let page = paginate(items, entity, &ListOptions::from_args(args));
                let extra = page.extra();
                ToolOutput::new(Value::Array(page.items)).with_extra(extra)
            }
            None => ToolOutput::new(data),
        },
        Shape::Logs => {
            let logs = truncate_logs(data);
            let extra = logs
                .as_array()
                .map(|entries| serde_json::json!({"count": entries.len()}));
            let output = ToolOutput::new(logs);
            match extra {
                Some(extra) => output.with_extra(extra),
                None => output,
            }
        }
        Shape::Application => ToolOutput::new(compact_application(data)),
        Shape::Unwrap(key) => {
            let items = match data.get(key) {
                Some(Value::Array(items)) => items.clone(),
                _ => Vec::new(),
            };
            let count = items.len();
            ToolOutput::new(Value::Array(items)).with_extra(serde_json::json!({"count": count}))
        }
    };
    match route.message {
        Some(default) => output.with_message(upstream_message.unwrap_or_else(|| default.to_string())),
        None => output,
    }
}

/// Serves every tool that is a single upstream call.
pub struct RouteManager {
    client: CoolifyClient,
    routes: HashMap<&'static str, &'static Route>,
}

impl RouteManager {
    pub fn new(client: CoolifyClient) -> Self {
        Self {
            client,
            routes: ROUTES.iter().map(|route| (route.tool, route)).collect(),
        }
    }

    pub fn tools(&self) -> Vec<&'static str> {
        ROUTES.iter().map(|route| route.tool).collect()
    }
}

#[async_trait]
impl ToolHandler for RouteManager {
    async fn handle(&self, tool: &str, args: Value) -> Result<ToolOutput, ApiError> {
        let route = self
            .routes
            .get(tool)
            .copied()
            .ok_or_else(|| ApiError::invalid_params(format!("Unknown tool: {}", tool)))?;
        let (method, path, body) = build_request(route, &args)?;
        let data = self
            .client
            .request_with_profile(route.profile, method, &path, body.as_ref())
            .await?;
        Ok(shape_response(route, data, &args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn req(tool: &str, args: Value) -> (Method, String, Option<Value>) {
        build_request(route_for(tool).expect("route"), &args).expect("request")
    }

    #[test]
    fn tool_names_are_unique() {
        let names: HashSet<&str> = ROUTES.iter().map(|r| r.tool).collect();
        assert_eq!(names.len(), ROUTES.len());
    }

    #[test]
    fn update_body_strips_path_keys() {
        let (method, path, body) = req("update_project", json!({"uuid": "p1", "name": "new"}));
        assert_eq!(method, Method::PATCH);
        assert_eq!(path, "/projects/p1");
        assert_eq!(body, Some(json!({"name": "new"})));

        let (_, _, body) = req(
            "update_database",
            json!({"uuid": "d1", "data": {"image": "postgres:16"}}),
        );
        assert_eq!(body, Some(json!({"image": "postgres:16"})));
    }

    #[test]
    fn deploy_flags_only_when_true() {
        let (method, path, body) = req(
            "deploy_application",
            json!({"uuid": "a1", "force": true, "instant_deploy": false}),
        );
        assert_eq!(method, Method::POST);
        assert_eq!(path, "/applications/a1/start?force=true");
        assert_eq!(body, Some(json!({})));
        assert_eq!(route_for("deploy_application").map(|r| r.profile), Some(DEPLOYMENT_PROFILE));
    }

    #[test]
    fn delete_options_accept_both_spellings() {
        let (_, path, body) = req(
            "delete_service",
            json!({"uuid": "s1", "options": {"deleteVolumes": true, "docker_cleanup": false}}),
        );
        assert_eq!(path, "/services/s1?delete_volumes=true&docker_cleanup=false");
        assert_eq!(body, None);
    }

    #[test]
    fn create_database_routes_by_type() {
        let (_, path, body) = req(
            "create_database",
            json!({"type": "postgresql", "server_uuid": "srv", "project_uuid": "p"}),
        );
        assert_eq!(path, "/databases/postgresql");
        assert_eq!(body, Some(json!({"server_uuid": "srv", "project_uuid": "p"})));
    }

    #[test]
    fn missing_path_argument_is_invalid_params() {
        let err = build_request(route_for("get_server").expect("route"), &json!({}))
            .expect_err("missing uuid");
        assert_eq!(err.code(), "INVALID_PARAMS");
    }

    #[test]
    fn shaping_unwraps_and_defaults_messages() {
        let route = route_for("get_application_deployments").expect("route");
        let out = shape_response(route, json!({"count": 1, "deployments": [{"uuid": "d"}]}), &json!({}));
        assert_eq!(out.data, json!([{"uuid": "d"}]));
        let out = shape_response(route, json!({"count": 0}), &json!({}));
        assert_eq!(out.data, json!([]));

        let route = route_for("stop_application").expect("route");
        let out = shape_response(route, json!({}), &json!({}));
        assert_eq!(out.message.as_deref(), Some("Application stop request queued"));
        let out = shape_response(route, json!({"message": "Stopping."}), &json!({}));
        assert_eq!(out.message.as_deref(), Some("Stopping."));
    }

    #[test]
    fn list_shaping_adds_pagination() {
        let route = route_for("list_servers").expect("route");
        let out = shape_response(route, json!([{"uuid": "a", "name": "one", "ip": "1.2.3.4"}]), &json!({}));
        assert_eq!(out.data, json!([{"uuid": "a", "name": "one", "status": null, "created_at": null}]));
        assert_eq!(out.extra.expect("extra")["pagination"]["total"], json!(1));
    }
}
