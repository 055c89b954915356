//! Control flow execution: `if`/`elif`/`else`, `for`, `while`, `until` and
//! the break/continue unwinding shared by all three loop forms. The C-style
//! `for ((...))` loop lives in `execution_engine.rs` next to the arithmetic
//! evaluator it needs; case statements are driven from there too.

use crate::ast::types::StatementNode;
use crate::interpreter::errors::{BreakError, ContinueError, ExecutionLimitError, InterpreterError, LimitType};
use crate::interpreter::helpers::condition::ConditionResult;
use crate::interpreter::helpers::readonly::check_readonly_error;
use crate::interpreter::types::{ExecResult, InterpreterState};

/// Accumulated output and exit status from an if/for/while/until construct.
#[derive(Debug, Clone, Default)]
pub struct ForResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Run one iteration of a loop body, catching break/continue and decrementing
/// their level for any outer loop. Returns `Ok(Some(()))` to keep looping,
/// `Ok(None)` to stop the loop (plain break / normal completion), and
/// propagates any other error.
fn run_loop_body<G>(
    state: &mut InterpreterState,
    body: &[&StatementNode],
    exec_stmt: &G,
    stdout: &mut String,
    stderr: &mut String,
    exit_code: &mut i32,
) -> Result<bool, InterpreterError>
where
    G: Fn(&mut InterpreterState, &StatementNode) -> Result<ExecResult, InterpreterError>,
{
    state.loop_depth += 1;
    let mut result = Ok(());
    for stmt in body {
        match exec_stmt(state, stmt) {
            Ok(res) => {
                stdout.push_str(&res.stdout);
                stderr.push_str(&res.stderr);
                *exit_code = res.exit_code;
            }
            Err(e) => {
                result = Err(e);
                break;
            }
        }
    }
    state.loop_depth -= 1;

    match result {
        Ok(()) => Ok(true),
        Err(InterpreterError::Break(b)) => {
            if b.levels > 1 {
                Err(InterpreterError::Break(BreakError::new(b.levels - 1, b.stdout, b.stderr)))
            } else {
                Ok(false)
            }
        }
        Err(InterpreterError::Continue(c)) => {
            if c.levels > 1 {
                Err(InterpreterError::Continue(ContinueError::new(c.levels - 1, c.stdout, c.stderr)))
            } else {
                Ok(true)
            }
        }
        Err(e) => Err(e),
    }
}

fn iteration_limit_error(max_iterations: u64) -> InterpreterError {
    InterpreterError::ExecutionLimit(ExecutionLimitError::simple(
        format!(
            "maximum iteration count ({}) exceeded (possible infinite loop)",
            max_iterations
        ),
        LimitType::Iterations,
    ))
}

/// Execute an if/elif/.../else chain. `clauses` is a list of (condition,
/// body) pairs; the first clause whose condition exits 0 has its body
/// executed and its result returned. Falls back to `else_body`, or a bare
/// success result if nothing matched.
pub fn execute_if<F, G>(
    state: &mut InterpreterState,
    clauses: &[(Vec<&StatementNode>, Vec<&StatementNode>)],
    else_body: Option<&[&StatementNode]>,
    eval_condition: F,
    exec_stmt: G,
) -> Result<ForResult, InterpreterError>
where
    F: Fn(&mut InterpreterState, &StatementNode) -> Result<ConditionResult, InterpreterError>,
    G: Fn(&mut InterpreterState, &StatementNode) -> Result<ExecResult, InterpreterError>,
{
    let mut stdout = String::new();
    let mut stderr = String::new();

    for (condition, body) in clauses {
        let mut cond_exit = 0;
        for stmt in condition {
            let res = eval_condition(state, stmt)?;
            stdout.push_str(&res.stdout);
            stderr.push_str(&res.stderr);
            cond_exit = res.exit_code;
        }

        if cond_exit == 0 {
            let mut exit_code = 0;
            for stmt in body {
                let res = exec_stmt(state, stmt)?;
                stdout.push_str(&res.stdout);
                stderr.push_str(&res.stderr);
                exit_code = res.exit_code;
            }
            return Ok(ForResult { stdout, stderr, exit_code });
        }
    }

    let mut exit_code = 0;
    if let Some(else_stmts) = else_body {
        for stmt in else_stmts {
            let res = exec_stmt(state, stmt)?;
            stdout.push_str(&res.stdout);
            stderr.push_str(&res.stderr);
            exit_code = res.exit_code;
        }
    }

    Ok(ForResult { stdout, stderr, exit_code })
}

/// Execute a `for var in words; do body; done` loop.
pub fn execute_for<G>(
    state: &mut InterpreterState,
    variable: &str,
    words: &[String],
    body: &[&StatementNode],
    max_iterations: u64,
    exec_stmt: G,
) -> Result<ForResult, InterpreterError>
where
    G: Fn(&mut InterpreterState, &StatementNode) -> Result<ExecResult, InterpreterError>,
{
    let mut stdout = String::new();
    let mut stderr = String::new();
    let mut exit_code = 0;
    let mut iterations: u64 = 0;

    for word in words {
        iterations += 1;
        if iterations > max_iterations {
            return Err(iteration_limit_error(max_iterations));
        }

        check_readonly_error(state, variable, "for").map_err(InterpreterError::Exit)?;
        state.env.insert(variable.to_string(), word.clone());

        if !run_loop_body(state, body, &exec_stmt, &mut stdout, &mut stderr, &mut exit_code)? {
            break;
        }
    }

    Ok(ForResult { stdout, stderr, exit_code })
}

/// Execute a `while condition; do body; done` loop.
pub fn execute_while<F, G>(
    state: &mut InterpreterState,
    condition: &[&StatementNode],
    body: &[&StatementNode],
    max_iterations: u64,
    eval_condition: F,
    exec_stmt: G,
) -> Result<ForResult, InterpreterError>
where
    F: Fn(&mut InterpreterState, &StatementNode) -> Result<ConditionResult, InterpreterError>,
    G: Fn(&mut InterpreterState, &StatementNode) -> Result<ExecResult, InterpreterError>,
{
    run_conditional_loop(state, condition, body, max_iterations, eval_condition, exec_stmt, true)
}

/// Execute an `until condition; do body; done` loop.
pub fn execute_until<F, G>(
    state: &mut InterpreterState,
    condition: &[&StatementNode],
    body: &[&StatementNode],
    max_iterations: u64,
    eval_condition: F,
    exec_stmt: G,
) -> Result<ForResult, InterpreterError>
where
    F: Fn(&mut InterpreterState, &StatementNode) -> Result<ConditionResult, InterpreterError>,
    G: Fn(&mut InterpreterState, &StatementNode) -> Result<ExecResult, InterpreterError>,
{
    run_conditional_loop(state, condition, body, max_iterations, eval_condition, exec_stmt, false)
}

/// Shared loop driver for `while`/`until`: `continue_while_zero` selects
/// whether a zero condition exit code continues the loop (while) or stops
/// it (until).
fn run_conditional_loop<F, G>(
    state: &mut InterpreterState,
    condition: &[&StatementNode],
    body: &[&StatementNode],
    max_iterations: u64,
    eval_condition: F,
    exec_stmt: G,
    continue_while_zero: bool,
) -> Result<ForResult, InterpreterError>
where
    F: Fn(&mut InterpreterState, &StatementNode) -> Result<ConditionResult, InterpreterError>,
    G: Fn(&mut InterpreterState, &StatementNode) -> Result<ExecResult, InterpreterError>,
{
    let mut stdout = String::new();
    let mut stderr = String::new();
    let mut exit_code = 0;
    let mut iterations: u64 = 0;

    loop {
        let mut cond_exit = 0;
        for stmt in condition {
            let res = eval_condition(state, stmt)?;
            stdout.push_str(&res.stdout);
            stderr.push_str(&res.stderr);
            cond_exit = res.exit_code;
        }

        let keep_going = if continue_while_zero { cond_exit == 0 } else { cond_exit != 0 };
        if !keep_going {
            break;
        }

        iterations += 1;
        if iterations > max_iterations {
            return Err(iteration_limit_error(max_iterations));
        }

        if !run_loop_body(state, body, &exec_stmt, &mut stdout, &mut stderr, &mut exit_code)? {
            break;
        }
    }

    Ok(ForResult { stdout, stderr, exit_code })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_loop_readonly_var_errors() {
        let mut state = InterpreterState::default();
        crate::interpreter::helpers::readonly::mark_readonly(&mut state, "x");

        let body: Vec<&StatementNode> = Vec::new();
        let result = execute_for(
            &mut state,
            "x",
            &["a".to_string(), "b".to_string()],
            &body,
            100,
            |_state, _stmt| Ok(ExecResult::ok()),
        );

        assert!(matches!(result, Err(InterpreterError::Exit(_))));
    }
}
