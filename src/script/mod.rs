//! Sandboxed script execution.
//!
//! User-authored pre-request and post-response scripts run in a purpose-built
//! interpreter over a constrained JavaScript-like subset. The sandbox is
//! capability-based: the only global bindings are `pm`, `console`, and
//! `JSON`, so scripts have no route to the file system, the network, or the
//! host runtime: an attempt to reach anything else is simply an undefined
//! identifier.
//!
//! Script failures never propagate to the caller. A syntax error, a runtime
//! error, or a timeout each append a single failing `"Script execution"`
//! assertion to the context and return normally, so a broken script marks
//! its request failed without aborting the run.

pub mod ast;
pub mod context;
pub mod expect;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod value;

pub use context::ScriptContext;
pub use value::Value;

use interp::{Interpreter, Phase, ScriptError};
use std::time::Duration;

/// Default script timeout.
pub const DEFAULT_SCRIPT_TIMEOUT_MS: u64 = 2_000;

/// Name under which script-level failures are recorded.
const SCRIPT_FAILURE_NAME: &str = "Script execution";

/// Configuration for script execution.
#[derive(Debug, Clone)]
pub struct ScriptConfig {
    /// Wall-clock bound on one script invocation. A script still looping
    /// when the bound expires is aborted and recorded as a failing
    /// assertion.
    pub timeout: Duration,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_SCRIPT_TIMEOUT_MS),
        }
    }
}

/// Executes a pre-request script against the context.
///
/// Blank scripts leave the context unchanged. Never panics or returns an
/// error: failures are recorded on the context as a failing assertion.
pub fn execute_pre_request_script(script: &str, ctx: &mut ScriptContext, config: &ScriptConfig) {
    execute_script(script, ctx, Phase::PreRequest, config);
}

/// Executes a post-response script against the context.
///
/// Blank scripts leave the context unchanged. Never panics or returns an
/// error: failures are recorded on the context as a failing assertion.
pub fn execute_post_response_script(script: &str, ctx: &mut ScriptContext, config: &ScriptConfig) {
    execute_script(script, ctx, Phase::PostResponse, config);
}

fn execute_script(script: &str, ctx: &mut ScriptContext, phase: Phase, config: &ScriptConfig) {
    if script.trim().is_empty() {
        return;
    }

    let program = match parser::parse_program(script) {
        Ok(program) => program,
        Err(err) => {
            ctx.record_failure(SCRIPT_FAILURE_NAME, format!("Syntax error: {}", err));
            return;
        }
    };

    let result = Interpreter::new(ctx, phase, config.timeout).run(&program);

    match result {
        Ok(()) => {}
        Err(ScriptError::Timeout) => {
            ctx.record_failure(
                SCRIPT_FAILURE_NAME,
                format!(
                    "Script timed out after {} ms",
                    config.timeout.as_millis()
                ),
            );
        }
        Err(ScriptError::AssertionFailed(message)) | Err(ScriptError::Error(message)) => {
            ctx.record_failure(SCRIPT_FAILURE_NAME, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn run_pre(script: &str, ctx: &mut ScriptContext) {
        execute_pre_request_script(script, ctx, &ScriptConfig::default());
    }

    #[test]
    fn test_blank_script_is_a_no_op() {
        let mut ctx = ScriptContext::new();
        run_pre("", &mut ctx);
        run_pre("   \n\t  ", &mut ctx);

        assert!(ctx.assertions.is_empty());
        assert!(ctx.console_output.is_empty());
    }

    #[test]
    fn test_syntax_error_records_single_failure() {
        let mut ctx = ScriptContext::new();
        run_pre("var x = ;", &mut ctx);

        assert_eq!(ctx.assertions.len(), 1);
        let failure = &ctx.assertions[0];
        assert_eq!(failure.name, "Script execution");
        assert!(!failure.passed);
    }

    #[test]
    fn test_runtime_error_records_single_failure() {
        let mut ctx = ScriptContext::new();
        run_pre("undefinedThing();", &mut ctx);

        assert_eq!(ctx.assertions.len(), 1);
        assert!(!ctx.assertions[0].passed);
    }

    #[test]
    fn test_infinite_loop_times_out_within_bound() {
        let mut ctx = ScriptContext::new();
        let config = ScriptConfig {
            timeout: Duration::from_millis(100),
        };

        let started = Instant::now();
        execute_pre_request_script("while (true) { var x = 1; }", &mut ctx, &config);
        let elapsed = started.elapsed();

        // Control must return within a small multiple of the bound.
        assert!(elapsed < Duration::from_millis(2_000));
        assert_eq!(ctx.assertions.len(), 1);
        let failure = &ctx.assertions[0];
        assert_eq!(failure.name, "Script execution");
        assert!(!failure.passed);
        assert!(failure.message.as_ref().unwrap().contains("timed out"));
    }

    #[test]
    fn test_sandbox_has_no_host_escape_hatches() {
        for script in [
            "require('fs');",
            "process.exit(1);",
            "new XMLHttpRequest();",
            "fetch('https://example.com');",
            "eval('1 + 1');",
        ] {
            let mut ctx = ScriptContext::new();
            run_pre(script, &mut ctx);
            // Each attempt fails as an undefined identifier, caught and
            // recorded, never an escape.
            assert_eq!(ctx.assertions.len(), 1, "script: {}", script);
            assert!(!ctx.assertions[0].passed);
        }
    }

    #[test]
    fn test_script_caught_error_fails_silently_for_host() {
        // A script that provokes and survives its own failure: the sandbox
        // records nothing when the script does not fail at the top level.
        let mut ctx = ScriptContext::new();
        run_pre("var x = 1 + 2; console.log(x);", &mut ctx);

        assert!(ctx.assertions.is_empty());
        assert_eq!(ctx.console_output, vec!["3"]);
    }
}
