use std::sync::Arc;

use axum::{body::Bytes, extract::State, http::StatusCode, routing::post, Json, Router};
use phonebook_agent::runtime::AgentRuntime;
use phonebook_core::domain::result::StructuredResult;
use phonebook_core::errors::InterfaceError;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const CONTACTS_COMMAND_PATH: &str = "/api/llm/contacts";

#[derive(Clone)]
pub struct GatewayState {
    runtime: Arc<AgentRuntime>,
}

pub fn router(runtime: Arc<AgentRuntime>) -> Router {
    Router::new()
        .route(CONTACTS_COMMAND_PATH, post(contacts_command))
        .with_state(GatewayState { runtime })
}

/// `POST /api/llm/contacts` with `{"command": "..."}`.
pub async fn contacts_command(
    State(state): State<GatewayState>,
    body: Bytes,
) -> (StatusCode, Json<StructuredResult>) {
    let correlation_id = Uuid::new_v4().to_string();

    let Some(command) = extract_command(&body) else {
        warn!(
            event_name = "gateway.bad_request",
            correlation_id = %correlation_id,
            body_bytes = body.len(),
            "request carried no usable command"
        );
        return error_response(InterfaceError::missing_command(correlation_id));
    };

    info!(
        event_name = "gateway.command.received",
        correlation_id = %correlation_id,
        command = %command,
        "contacts command received"
    );

    match state.runtime.handle_command(&command).await {
        Ok(output) => {
            let result = normalize_output(output);
            info!(
                event_name = "gateway.command.completed",
                correlation_id = %correlation_id,
                contacts = result.contacts.len(),
                "contacts command completed"
            );
            (StatusCode::OK, Json(result))
        }
        Err(failure) => {
            error!(
                event_name = "gateway.command.failed",
                correlation_id = %correlation_id,
                error = %failure,
                "contacts command failed"
            );
            error_response(InterfaceError::internal(failure, correlation_id))
        }
    }
}

fn error_response(error: InterfaceError) -> (StatusCode, Json<StructuredResult>) {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    warn!(
        event_name = "gateway.response.error",
        correlation_id = %error.correlation_id(),
        status = status.as_u16(),
        message = %error.user_message(),
        "contacts command answered with an error"
    );
    (status, Json(error.into_result()))
}

/// The trimmed `command` string, if the body is a JSON object carrying one.
fn extract_command(body: &[u8]) -> Option<String> {
    let payload = serde_json::from_slice::<Value>(body).ok()?;
    let command = payload.get("command")?.as_str()?.trim();
    (!command.is_empty()).then(|| command.to_string())
}

/// Coerces whatever the resolver produced into the response shape.
///
/// An `output` envelope is unwrapped first. Anything that is not already a
/// `{message, contacts}` object becomes its own message with no contacts.
pub fn normalize_output(output: Value) -> StructuredResult {
    let output = match output {
        Value::Object(mut fields) => match fields.remove("output") {
            Some(inner) => inner,
            None => Value::Object(fields),
        },
        other => other,
    };

    let well_formed = output.get("message").is_some_and(Value::is_string)
        && output.get("contacts").is_some_and(Value::is_array);
    if well_formed {
        if let Ok(result) = serde_json::from_value::<StructuredResult>(output.clone()) {
            return result;
        }
    }

    let message = match output {
        Value::String(text) => text,
        other => other.to_string(),
    };
    StructuredResult::message_only(message)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use phonebook_agent::classifier::{Classification, IntentClassifier};
    use phonebook_agent::operations::Operation;
    use phonebook_agent::runtime::AgentRuntime;
    use phonebook_agent::tools::{Tool, ToolRegistry};
    use phonebook_core::domain::contact::Contact;
    use phonebook_db::{connect_with_settings, migrations, DbPool, SqlContactRepository};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{normalize_output, router, CONTACTS_COMMAND_PATH};

    async fn sql_app() -> (Router, DbPool) {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let store = Arc::new(SqlContactRepository::new(pool.clone()));
        (router(Arc::new(AgentRuntime::with_rules(store))), pool)
    }

    async fn post_raw(app: &Router, body: Body) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(CONTACTS_COMMAND_PATH)
            .header("content-type", "application/json")
            .body(body)
            .expect("request");
        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    async fn post_command(app: &Router, command: &str) -> (StatusCode, Value) {
        post_raw(app, Body::from(json!({ "command": command }).to_string())).await
    }

    #[tokio::test]
    async fn empty_phonebook_lists_nothing() {
        let (app, _pool) = sql_app().await;

        let (status, body) = post_command(&app, "list all contacts").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "Your phonebook is empty.", "contacts": []}));
    }

    #[tokio::test]
    async fn add_then_list_returns_exactly_the_new_contact() {
        let (app, _pool) = sql_app().await;

        let (status, created) = post_command(&app, "add Alice, phone 123456789").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            created,
            json!({
                "message": "Added contact Alice.",
                "contacts": [{"name": "Alice", "phone": "123456789"}],
            })
        );

        let (_, listed) = post_command(&app, "show all contacts").await;
        assert_eq!(listed["contacts"], json!([{"name": "Alice", "phone": "123456789"}]));
    }

    #[tokio::test]
    async fn unknown_contact_lookup_is_a_normal_response() {
        let (app, _pool) = sql_app().await;

        let (status, body) = post_command(&app, "what's Carol's number").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "Contact Carol not found.", "contacts": []}));
    }

    #[tokio::test]
    async fn delete_removes_contact_for_later_lookups() {
        let (app, _pool) = sql_app().await;
        post_command(&app, "add Bob with number 987654321").await;

        let (_, deleted) = post_command(&app, "delete Bob").await;
        assert_eq!(deleted["message"], "Deleted contact Bob.");
        assert_eq!(deleted["contacts"], json!([{"name": "Bob", "phone": "987654321"}]));

        let (_, lookup) = post_command(&app, "get Bob").await;
        assert_eq!(lookup, json!({"message": "Contact Bob not found.", "contacts": []}));
    }

    #[tokio::test]
    async fn update_and_rename_are_visible_to_lookups() {
        let (app, _pool) = sql_app().await;
        post_command(&app, "add Patrycja Evans with number 111").await;

        let (_, updated) = post_command(&app, "change Patrycja Evans's number to 222").await;
        assert_eq!(updated["message"], "Updated contact Patrycja Evans from 111 to 222.");

        let (_, renamed) =
            post_command(&app, "rename contact 'Patrycja Evans' to 'Patrycja Michelli'").await;
        assert_eq!(
            renamed["message"],
            "Renamed contact 'Patrycja Evans' to 'Patrycja Michelli'."
        );

        let (_, lookup) = post_command(&app, "what's Patrycja Michelli's number").await;
        assert_eq!(lookup["contacts"], json!([{"name": "Patrycja Michelli", "phone": "222"}]));
    }

    #[tokio::test]
    async fn missing_or_blank_command_is_bad_request() {
        let (app, _pool) = sql_app().await;
        let expected = json!({"message": "No command provided", "contacts": []});

        for body in [
            String::new(),
            "not json".to_string(),
            json!({}).to_string(),
            json!({"command": ""}).to_string(),
            json!({"command": "   "}).to_string(),
            json!({"command": 42}).to_string(),
        ] {
            let (status, response) = post_raw(&app, Body::from(body.clone())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
            assert_eq!(response, expected, "body: {body}");
        }
    }

    #[tokio::test]
    async fn storage_failure_is_internal_error() {
        let (app, pool) = sql_app().await;
        pool.close().await;

        let (status, body) = post_command(&app, "list all contacts").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["message"].as_str().is_some_and(|message| message.starts_with("Error: ")));
        assert_eq!(body["contacts"], json!([]));
    }

    #[tokio::test]
    async fn missing_arguments_get_a_clarification_without_storage_access() {
        let (app, pool) = sql_app().await;

        let (status, body) = post_command(&app, "add Alice").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], Operation::CreateContact.clarification());
        assert_eq!(body["contacts"], json!([]));

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM contacts").fetch_one(&pool).await.expect("count");
        assert_eq!(count, 0);
    }

    struct EnvelopeTool;

    #[async_trait]
    impl Tool for EnvelopeTool {
        fn name(&self) -> &'static str {
            Operation::ListContacts.name()
        }

        fn description(&self) -> &'static str {
            "returns an agent envelope"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, _input: Value) -> Result<Value> {
            Ok(json!({"output": "I could not do that."}))
        }
    }

    struct AlwaysList;

    #[async_trait]
    impl IntentClassifier for AlwaysList {
        async fn classify(&self, _command: &str) -> Result<Classification> {
            Ok(Classification::Invoke { operation: Operation::ListContacts, arguments: json!({}) })
        }
    }

    #[tokio::test]
    async fn malformed_resolver_output_is_coerced() {
        let mut tools = ToolRegistry::default();
        tools.register(EnvelopeTool);
        let app = router(Arc::new(AgentRuntime::new(Box::new(AlwaysList), tools)));

        let (status, body) = post_command(&app, "anything").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "I could not do that.", "contacts": []}));
    }

    #[test]
    fn normalize_forwards_well_formed_results() {
        let result = normalize_output(json!({
            "message": "Here are all your contacts.",
            "contacts": [{"name": "Alice", "phone": "123"}],
        }));

        assert_eq!(result.message, "Here are all your contacts.");
        assert_eq!(result.contacts, vec![Contact::new("Alice", "123")]);
    }

    #[test]
    fn normalize_unwraps_output_envelope() {
        let result = normalize_output(json!({
            "output": {"message": "Added contact Alice.", "contacts": []},
            "input": "add Alice",
        }));

        assert_eq!(result.message, "Added contact Alice.");
        assert!(result.contacts.is_empty());
    }

    #[test]
    fn normalize_stringifies_everything_else() {
        assert_eq!(normalize_output(json!("plain")).message, "plain");
        assert_eq!(normalize_output(json!(42)).message, "42");
        assert_eq!(
            normalize_output(json!({"message": "no contacts key"})).message,
            r#"{"message":"no contacts key"}"#
        );
        let wrong_types = normalize_output(json!({"message": 1, "contacts": []}));
        assert!(wrong_types.message.contains("\"message\":1"));
        assert!(wrong_types.contacts.is_empty());
        assert!(normalize_output(json!(null)).contacts.is_empty());
    }
}
