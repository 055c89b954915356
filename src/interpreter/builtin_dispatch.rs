//! Builtin Command Dispatch
//!
//! Handles dispatch of built-in shell commands like export, unset, cd, etc.
//! Separated from interpreter.rs for modularity.

use std::collections::HashMap;
use crate::interpreter::builtins::{
    handle_break, handle_continue, handle_export, handle_return, handle_set, handle_shift,
    handle_shopt, BuiltinResult,
};
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::types::{ExecResult, InterpreterState};
use crate::interpreter::helpers::result::{OK, failure, test_result};
use crate::interpreter::helpers::shell_constants::SHELL_BUILTINS;

fn from_builtin(r: BuiltinResult) -> ExecResult {
    ExecResult::new(r.stdout, r.stderr, r.exit_code)
}

/// Type for the function that runs a command recursively
pub type RunCommandFn<'a> = &'a dyn Fn(
    &str,           // command_name
    &[String],      // args
    &[bool],        // quoted_args
    &str,           // stdin
    bool,           // skip_functions
    bool,           // use_default_path
    i32,            // stdin_source_fd
) -> ExecResult;

/// Type for the function that builds exported environment
pub type BuildExportedEnvFn<'a> = &'a dyn Fn() -> HashMap<String, String>;

/// Type for the function that executes user scripts
pub type ExecuteUserScriptFn<'a> = &'a dyn Fn(&str, &[String], Option<&str>) -> ExecResult;

/// Dispatch context containing dependencies needed for builtin dispatch
pub struct BuiltinDispatchContext<'a> {
    pub state: &'a mut InterpreterState,
    pub run_command: RunCommandFn<'a>,
    pub build_exported_env: BuildExportedEnvFn<'a>,
    pub execute_user_script: ExecuteUserScriptFn<'a>,
}

/// Dispatch a command to the appropriate builtin handler or external command.
///
/// Returns `None` if the command should be handled by external command
/// resolution (functions are resolved by the caller before this is reached).
/// The outer `Result` lets control-flow builtins (`break`, `continue`,
/// `return`, `exit`) propagate their `InterpreterError` for the execution
/// engine to unwind.
pub fn dispatch_builtin(
    dispatch_ctx: &mut BuiltinDispatchContext,
    command_name: &str,
    args: &[String],
    _quoted_args: &[bool],
    stdin: &str,
    skip_functions: bool,
    _use_default_path: bool,
    _stdin_source_fd: i32,
) -> Option<Result<ExecResult, InterpreterError>> {
    // Special builtins (POSIX): cannot be overridden by functions, and
    // their errors propagate as control flow rather than a plain exit code.
    match command_name {
        "export" => {
            return Some(Ok(from_builtin(handle_export(dispatch_ctx.state, args))));
        }
        "exit" => {
            return match crate::interpreter::builtins::handle_exit(dispatch_ctx.state, args) {
                Ok(_) => unreachable!("handle_exit always errors or never returns"),
                Err(e) => Some(Err(e)),
            };
        }
        "set" => {
            return Some(
                handle_set(dispatch_ctx.state, args).map(from_builtin),
            );
        }
        "break" => {
            return Some(handle_break(dispatch_ctx.state, args).map(from_builtin));
        }
        "continue" => {
            return Some(handle_continue(dispatch_ctx.state, args).map(from_builtin));
        }
        "return" => {
            return Some(handle_return(dispatch_ctx.state, args).map(from_builtin));
        }
        "shift" => {
            return Some(handle_shift(dispatch_ctx.state, args).map(from_builtin));
        }
        "shopt" => {
            return Some(Ok(from_builtin(handle_shopt(dispatch_ctx.state, args))));
        }
        _ => {}
    }

    let _ = skip_functions;

    // Simple builtins (can be overridden by functions; caller checks functions first)
    match command_name {
        ":" | "true" => {
            return Some(Ok(OK));
        }
        "false" => {
            return Some(Ok(test_result(false)));
        }
        "command" => {
            return Some(Ok(handle_command_builtin(dispatch_ctx, args, stdin)));
        }
        "builtin" => {
            return Some(Ok(handle_builtin_builtin(dispatch_ctx, args, stdin)));
        }
        "exec" => {
            if args.is_empty() {
                return Some(Ok(OK));
            }
            let cmd = &args[0];
            let rest: Vec<String> = args[1..].to_vec();
            return Some(Ok((dispatch_ctx.run_command)(cmd, &rest, &[], stdin, false, false, -1)));
        }
        "wait" => {
            return Some(Ok(OK));
        }
        _ => {}
    }

    // Return None to indicate command should be handled by external resolution
    None
}

/// Handle the 'command' builtin
fn handle_command_builtin(
    dispatch_ctx: &mut BuiltinDispatchContext,
    args: &[String],
    stdin: &str,
) -> ExecResult {
    if args.is_empty() {
        return OK;
    }

    // Parse options
    let mut use_default_path = false;
    let mut verbose_describe = false;
    let mut show_path = false;
    let mut cmd_args = args.to_vec();

    while !cmd_args.is_empty() && cmd_args[0].starts_with('-') {
        let opt = &cmd_args[0];
        if opt == "--" {
            cmd_args.remove(0);
            break;
        }
        for ch in opt[1..].chars() {
            match ch {
                'p' => use_default_path = true,
                'V' => verbose_describe = true,
                'v' => show_path = true,
                _ => {}
            }
        }
        cmd_args.remove(0);
    }

    if cmd_args.is_empty() {
        return OK;
    }

    // Handle -v and -V: describe commands without executing
    if show_path || verbose_describe {
        return handle_command_v_stub(dispatch_ctx.state, &cmd_args, show_path, verbose_describe);
    }

    // Run command without checking functions
    let cmd = &cmd_args[0];
    let rest: Vec<String> = cmd_args[1..].to_vec();
    (dispatch_ctx.run_command)(cmd, &rest, &[], stdin, true, use_default_path, -1)
}

/// Handle the 'builtin' builtin
fn handle_builtin_builtin(
    dispatch_ctx: &mut BuiltinDispatchContext,
    args: &[String],
    stdin: &str,
) -> ExecResult {
    if args.is_empty() {
        return OK;
    }

    let mut cmd_args = args.to_vec();
    if cmd_args[0] == "--" {
        cmd_args.remove(0);
        if cmd_args.is_empty() {
            return OK;
        }
    }

    let cmd = &cmd_args[0];

    if !SHELL_BUILTINS.contains(cmd.as_str()) {
        return failure(format!("bash: builtin: {}: not a shell builtin\n", cmd));
    }

    let rest: Vec<String> = cmd_args[1..].to_vec();
    (dispatch_ctx.run_command)(cmd, &rest, &[], stdin, true, false, -1)
}

// ============================================================================
// Minor builtins kept local to dispatch (not complex enough for their own module)
// ============================================================================

fn handle_command_v_stub(
    state: &InterpreterState,
    names: &[String],
    show_path: bool,
    verbose_describe: bool,
) -> ExecResult {
    let mut stdout = String::new();
    let mut exit_code = 0;

    for name in names {
        if SHELL_BUILTINS.contains(name.as_str()) {
            if verbose_describe {
                stdout.push_str(&format!("{} is a shell builtin\n", name));
            } else {
                stdout.push_str(&format!("{}\n", name));
            }
        } else if state.functions.contains_key(name) {
            if verbose_describe {
                stdout.push_str(&format!("{} is a function\n", name));
            } else {
                stdout.push_str(&format!("{}\n", name));
            }
        } else {
            exit_code = 1;
        }
    }

    ExecResult::new(stdout, String::new(), exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_export_via_builtin() {
        let mut state = InterpreterState::default();
        let result = from_builtin(handle_export(&mut state, &["FOO=bar".to_string()]));
        assert_eq!(result.exit_code, 0);
        assert_eq!(state.env.get("FOO"), Some(&"bar".to_string()));
    }

}
