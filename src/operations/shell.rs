//! Shell command operation
//!
//! Runs the command named in the request parameters through the bounded
//! command executor:
//!
//! ```json
//! { "params": { "command": "df", "args": ["-h"], "timeout": 10 } }
//! ```

use serde_json::{json, Value};

use super::OperationSettings;
use crate::executor::{execute_command_with_context, ExecError, ExecutionContext};
use crate::models::{CommandInvocation, Operation, OperationResult};

const ID: &str = "shell-command";

pub fn shell_command(settings: OperationSettings) -> Operation {
    Operation::new(
        ID,
        "Shell Command",
        "Runs params.command with params.args under the agent's test timeout",
        move |ctx| {
            let settings = settings.clone();
            async move { run(ctx, &settings).await }
        },
    )
}

async fn run(ctx: ExecutionContext, settings: &OperationSettings) -> OperationResult {
    let result = OperationResult::start(ID);

    let invocation = match invocation_from_params(&ctx, settings) {
        Ok(invocation) => invocation,
        Err(message) => return result.fail(message),
    };

    let outcome = execute_command_with_context(&invocation, &ctx).await;
    let data = json!({
        "command": invocation.to_string(),
        "exit_code": outcome.exit_code,
        "execution_time_ms": outcome.execution_time_ms,
    });
    let result = result.with_output(outcome.output.clone()).with_data(data);

    match &outcome.failure {
        None if outcome.success => result.complete(),
        None => result.fail(format!("command exited with code {}", outcome.exit_code)),
        Some(ExecError::Cancelled) => result.cancel(),
        Some(failure) => result.fail(failure.to_string()),
    }
}

fn invocation_from_params(
    ctx: &ExecutionContext,
    settings: &OperationSettings,
) -> Result<CommandInvocation, String> {
    let command = ctx
        .param_str("command")
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| "missing required parameter 'command'".to_string())?;

    let mut invocation = CommandInvocation::new(command);

    match ctx.param("args") {
        None | Some(Value::Null) => {}
        Some(Value::Array(args)) => {
            for arg in args {
                match arg {
                    Value::String(s) => invocation.args.push(s.clone()),
                    other => invocation.args.push(other.to_string()),
                }
            }
        }
        Some(_) => return Err("parameter 'args' must be an array".to_string()),
    }

    let timeout = ctx
        .param("timeout")
        .and_then(Value::as_i64)
        .filter(|secs| *secs > 0)
        .unwrap_or(settings.timeout_secs as i64);
    invocation = invocation.timeout(timeout);

    let directory = ctx
        .param_str("directory")
        .map(str::to_string)
        .or_else(|| {
            settings
                .work_dir
                .as_ref()
                .map(|dir| dir.display().to_string())
        });
    if let Some(dir) = directory {
        invocation = invocation.directory(dir);
    }

    Ok(invocation)
}
