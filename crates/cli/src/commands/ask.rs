use std::sync::Arc;

use crate::commands::{async_runtime, CommandResult};
use phonebook_agent::AgentRuntime;
use phonebook_core::config::{AppConfig, LoadOptions};
use phonebook_core::errors::MISSING_COMMAND_MESSAGE;
use phonebook_db::{connect_with_settings, migrations, SqlContactRepository};

/// Resolves one natural-language command against the configured database and
/// prints the structured result the HTTP gateway would return.
pub fn run(command: &str) -> CommandResult {
    let command = command.trim();
    if command.is_empty() {
        return CommandResult::failure("ask", "invalid_input", MISSING_COMMAND_MESSAGE, 2);
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match async_runtime("ask") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let resolved = async {
            let store = Arc::new(SqlContactRepository::new(pool.clone()));
            let agent = AgentRuntime::from_config(&config.llm, store)?;
            agent.handle_command(command).await
        }
        .await
        .map_err(|error| ("resolver", format!("Error: {error}"), 6u8));

        pool.close().await;
        resolved
    });

    match result {
        Ok(value) => CommandResult::json(&value),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("ask", error_class, message, exit_code)
        }
    }
}
