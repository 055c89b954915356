//! Execution Engine
//!
//! The core execution engine that ties all interpreter components together.
//! Implements the full AST execution chain:
//!
//! execute_script -> execute_statement -> execute_pipeline -> execute_command

use std::sync::Arc;

use crate::ast::types::{
    CommandNode, CompoundCommandNode, PipelineNode, ScriptNode, SimpleCommandNode, StatementNode,
    StatementOperator, WordNode,
};
use crate::commands::{CommandContext, CommandRegistry};
use crate::fs::FileSystem as AsyncFileSystem;
use crate::interpreter::builtin_dispatch::{dispatch_builtin, BuiltinDispatchContext};
use crate::interpreter::builtins::handle_cd;
use crate::interpreter::control_flow::{execute_for, execute_if, execute_while, execute_until, ForResult};
use crate::interpreter::errors::{InterpreterError, ErrexitError, ExitError, ControlFlowError};
use crate::interpreter::functions::{call_function, execute_function_def, get_function, is_function_defined};
use crate::interpreter::helpers::condition::ConditionResult;
use crate::interpreter::helpers::ifs::get_ifs;
use crate::interpreter::helpers::shell_constants::POSIX_SPECIAL_BUILTINS;
use crate::interpreter::interpreter::{
    build_exported_env, check_command_limit, should_trigger_errexit, update_exit_code,
    FileSystem as SyncFileSystem,
};
use crate::interpreter::pipeline_execution::{execute_pipeline, PipelineOptions, PipelineState, set_pipestatus};
use crate::interpreter::redirections::{apply_redirections, resolve_input_redirections};
use crate::interpreter::simple_command_assignments::process_assignments;
use crate::interpreter::subshell_group::{execute_group, execute_subshell};
use crate::interpreter::type_command::{handle_type, TypeCommandContext};
use crate::interpreter::types::{ExecResult, ExecutionLimits, InterpreterState};
use crate::interpreter::word_expansion::{expand_word_no_glob, is_word_fully_quoted, WordExpansionOptions};

/// The execution engine that ties all interpreter components together.
pub struct ExecutionEngine<'a> {
    /// Execution limits (max commands, recursion depth, iterations)
    pub limits: &'a ExecutionLimits,
    /// Sync filesystem interface, used for redirections and interpreter builtins
    pub fs: &'a dyn SyncFileSystem,
    /// Async filesystem handle, passed through to external commands
    pub async_fs: Arc<dyn AsyncFileSystem>,
    /// Registry of external (coreutils-style) commands
    pub registry: Arc<CommandRegistry>,
    /// Tokio handle used to bridge into the async command/filesystem layer
    pub runtime_handle: tokio::runtime::Handle,
}

impl<'a> ExecutionEngine<'a> {
    /// Create a new execution engine.
    pub fn new(
        limits: &'a ExecutionLimits,
        fs: &'a dyn SyncFileSystem,
        async_fs: Arc<dyn AsyncFileSystem>,
        registry: Arc<CommandRegistry>,
        runtime_handle: tokio::runtime::Handle,
    ) -> Self {
        Self { limits, fs, async_fs, registry, runtime_handle }
    }

    /// Expand a word to a single string (no splitting, no glob).
    fn expand_simple(&self, state: &InterpreterState, word: &WordNode) -> String {
        let options = WordExpansionOptions::default();
        expand_word_no_glob(state, word, &options).value
    }

    /// Expand a word into zero or more argument strings, applying IFS word
    /// splitting to unquoted expansions and pathname (glob) expansion.
    fn expand_argument_word(&self, state: &InterpreterState, word: &WordNode) -> Vec<String> {
        let quoted = is_word_fully_quoted(word);
        let options = WordExpansionOptions {
            do_word_split: !quoted,
            do_glob: !quoted && !state.options.noglob,
            ..Default::default()
        };
        let expanded = expand_word_no_glob(state, word, &options).value;

        let split: Vec<String> = if quoted {
            vec![expanded]
        } else {
            let ifs = get_ifs(&state.env);
            let words: Vec<String> = expanded
                .split(|c: char| ifs.contains(c))
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect();
            if words.is_empty() && !expanded.is_empty() {
                vec![expanded]
            } else {
                words
            }
        };

        if quoted || state.options.noglob {
            return split;
        }

        let mut result = Vec::new();
        for word in split {
            match self.fs.glob(&word, &state.cwd) {
                Ok(matches) if !matches.is_empty() => result.extend(matches),
                _ => result.push(word),
            }
        }
        if result.is_empty() && state.shopt_options.nullglob {
            return vec![];
        }
        result
    }

    /// Execute a complete script (list of statements).
    pub fn execute_script(
        &self,
        state: &mut InterpreterState,
        ast: &ScriptNode,
    ) -> Result<ExecResult, InterpreterError> {
        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut exit_code = 0;

        for statement in &ast.statements {
            match self.execute_statement(state, statement) {
                Ok(result) => {
                    stdout.push_str(&result.stdout);
                    stderr.push_str(&result.stderr);
                    exit_code = result.exit_code;
                    update_exit_code(state, exit_code);
                }
                Err(InterpreterError::Exit(e)) => {
                    // ExitError propagates up to terminate the script
                    let mut err = e;
                    err.prepend_output(&stdout, &stderr);
                    return Err(InterpreterError::Exit(err));
                }
                Err(InterpreterError::ExecutionLimit(e)) => {
                    // ExecutionLimitError must always propagate
                    return Err(InterpreterError::ExecutionLimit(e));
                }
                Err(InterpreterError::Errexit(e)) => {
                    // Errexit terminates the script
                    stdout.push_str(&e.stdout);
                    stderr.push_str(&e.stderr);
                    exit_code = e.exit_code;
                    return Ok(ExecResult::new(stdout, stderr, exit_code));
                }
                Err(InterpreterError::Break(mut e)) => {
                    // Break/continue outside loops - silently continue
                    e.prepend_output(&stdout, &stderr);
                    stdout = e.stdout.clone();
                    stderr = e.stderr.clone();
                    continue;
                }
                Err(InterpreterError::Continue(mut e)) => {
                    e.prepend_output(&stdout, &stderr);
                    stdout = e.stdout.clone();
                    stderr = e.stderr.clone();
                    continue;
                }
                Err(InterpreterError::Return(mut e)) => {
                    // Return outside function - propagate
                    e.prepend_output(&stdout, &stderr);
                    return Err(InterpreterError::Return(e));
                }
                Err(e) => {
                    // Other errors - convert to result
                    stderr.push_str(&format!("{}\n", e));
                    exit_code = 1;
                }
            }
        }

        Ok(ExecResult::new(stdout, stderr, exit_code))
    }

    /// Execute a single statement (list of pipelines with && || operators).
    pub fn execute_statement(
        &self,
        state: &mut InterpreterState,
        stmt: &StatementNode,
    ) -> Result<ExecResult, InterpreterError> {
        // Handle deferred syntax errors
        if let Some(ref err) = stmt.deferred_error {
            return Ok(ExecResult::new(
                String::new(),
                format!("bash: syntax error near unexpected token `{}'\n", err.token),
                2,
            ));
        }

        // noexec mode (set -n): parse but don't execute
        if state.options.noexec {
            return Ok(ExecResult::ok());
        }

        // Reset errexit_safe at start of each statement
        state.errexit_safe = Some(false);

        let mut stdout = String::new();
        let mut stderr = String::new();

        // verbose mode (set -v): print source before execution
        if state.options.verbose {
            if let Some(ref source) = stmt.source_text {
                stderr.push_str(source);
                stderr.push('\n');
            }
        }

        let mut exit_code = 0;
        let mut last_executed_index: i32 = -1;
        let mut last_pipeline_negated = false;

        for (i, pipeline) in stmt.pipelines.iter().enumerate() {
            // Check && / || short-circuit
            if i > 0 {
                let op = &stmt.operators[i - 1];
                match op {
                    StatementOperator::And => {
                        if exit_code != 0 {
                            continue;
                        }
                    }
                    StatementOperator::Or => {
                        if exit_code == 0 {
                            continue;
                        }
                    }
                    StatementOperator::Semi => {
                        // Always execute
                    }
                }
            }

            let result = self.execute_pipeline_node(state, pipeline)?;
            stdout.push_str(&result.stdout);
            stderr.push_str(&result.stderr);
            exit_code = result.exit_code;
            last_executed_index = i as i32;
            last_pipeline_negated = pipeline.negated;

            update_exit_code(state, exit_code);
        }

        // Check errexit
        let was_short_circuited = last_executed_index < (stmt.pipelines.len() as i32 - 1);
        let inner_was_safe = state.errexit_safe.unwrap_or(false);

        if should_trigger_errexit(state, exit_code, was_short_circuited, last_pipeline_negated)
            && !inner_was_safe
        {
            return Err(InterpreterError::Errexit(ErrexitError::new(
                exit_code, stdout, stderr,
            )));
        }

        Ok(ExecResult::new(stdout, stderr, exit_code))
    }

    /// Execute a pipeline (list of commands connected by |).
    pub fn execute_pipeline_node(
        &self,
        state: &mut InterpreterState,
        pipeline: &PipelineNode,
    ) -> Result<ExecResult, InterpreterError> {
        let mut pipe_state = PipelineState::new();
        let pipe_stderr = pipeline.pipe_stderr.clone().unwrap_or_default();

        let options = PipelineOptions {
            pipefail: state.options.pipefail,
            lastpipe: state.shopt_options.lastpipe,
            runs_in_subshell: false,
            time_pipeline: pipeline.timed,
            time_posix_format: pipeline.time_posix,
        };

        // We need to pass state through the closure, but execute_pipeline
        // takes ownership of the closure. Use a RefCell pattern.
        use std::cell::RefCell;
        let state_cell = RefCell::new(state);

        let result = execute_pipeline(
            &mut pipe_state,
            &pipeline.commands,
            &pipe_stderr,
            &options,
            |cmd, stdin| {
                let state = &mut *state_cell.borrow_mut();
                self.execute_command(state, cmd, stdin)
            },
        )?;

        // Get state back
        let state = state_cell.into_inner();

        // Set PIPESTATUS
        set_pipestatus(&mut state.env, &result.pipestatus);

        let mut exec_result = result.to_exec_result();

        // Handle negation
        if pipeline.negated {
            exec_result.exit_code = if exec_result.exit_code == 0 { 1 } else { 0 };
        }

        Ok(exec_result)
    }

    /// Execute a single command.
    pub fn execute_command(
        &self,
        state: &mut InterpreterState,
        cmd: &CommandNode,
        stdin: &str,
    ) -> Result<ExecResult, InterpreterError> {
        // Check command limit
        if let Some(msg) = check_command_limit(state, self.limits) {
            return Err(InterpreterError::ExecutionLimit(
                crate::interpreter::errors::ExecutionLimitError::simple(
                    msg,
                    crate::interpreter::errors::LimitType::Commands,
                ),
            ));
        }

        match cmd {
            CommandNode::Simple(simple) => self.execute_simple_command(state, simple, stdin),
            CommandNode::Compound(compound) => {
                self.execute_compound_command(state, compound, stdin)
            }
            CommandNode::FunctionDef(func_def) => {
                let current_source = state.current_source.clone();
                execute_function_def(state, func_def, current_source.as_deref())
                    .map_err(InterpreterError::Exit)
            }
        }
    }

    /// Execute a simple command (name + args + redirections).
    pub fn execute_simple_command(
        &self,
        state: &mut InterpreterState,
        cmd: &SimpleCommandNode,
        stdin: &str,
    ) -> Result<ExecResult, InterpreterError> {
        // Set line number for $LINENO
        if let Some(line) = cmd.line {
            state.current_line = line as u32;
        }

        // Process leading VAR=value assignments. For a bare assignment
        // (no command word) these persist in the current scope; prefixed
        // on a command they're only meant to live for that invocation, but
        // we apply them to the shared env for simplicity and restore them
        // afterwards when a command name is present.
        let assignment_result = process_assignments(state, cmd, |state, word| self.expand_simple(state, word));
        if let Some(err) = assignment_result.error {
            return Ok(err);
        }

        let cmd_name = match &cmd.name {
            Some(word) => self.expand_simple(state, word),
            None => {
                return Ok(ExecResult::new(
                    String::new(),
                    assignment_result.xtrace_output,
                    0,
                ));
            }
        };

        // Expand arguments (word splitting + globbing for unquoted words).
        let mut args: Vec<String> = Vec::new();
        for arg in &cmd.args {
            args.extend(self.expand_argument_word(state, arg));
        }

        // Resolve stdin from `<`, `<<`, `<<-`, `<<<` before running the command.
        let resolved_stdin = match resolve_input_redirections(self.fs, &cmd.redirections, |word| {
            self.expand_simple(state, word)
        }) {
            Ok(Some(content)) => content,
            Ok(None) => stdin.to_string(),
            Err(e) => return Ok(ExecResult::new(String::new(), e, 1)),
        };

        let result = self.run_resolved_command(state, &cmd_name, &args, &resolved_stdin)?;

        let result = apply_redirections(state, self.fs, result, &cmd.redirections, None, |state, word| {
            self.expand_simple(state, word)
        });

        // Temporary assignments only apply to this command's invocation.
        for (name, prior) in assignment_result.temp_assignments {
            match prior {
                Some(value) => { state.env.insert(name, value); }
                None => { state.env.remove(&name); }
            }
        }

        Ok(result)
    }

    /// Resolve and run a command name once assignments/arguments/stdin are ready:
    /// special builtins -> user functions -> simple builtins -> registered
    /// external commands -> "command not found".
    fn run_resolved_command(
        &self,
        state: &mut InterpreterState,
        cmd_name: &str,
        args: &[String],
        stdin: &str,
    ) -> Result<ExecResult, InterpreterError> {
        if POSIX_SPECIAL_BUILTINS.contains(cmd_name) {
            if let Some(result) = self.dispatch_builtin_call(state, cmd_name, args, stdin) {
                return result;
            }
        }

        if is_function_defined(state, cmd_name) {
            let func = get_function(state, cmd_name).unwrap().clone();
            let call_line = Some(state.current_line);
            let max_depth = self.limits.max_recursion_depth;
            return call_function(state, &func, args, stdin, call_line, max_depth, |state, stdin| {
                self.execute_compound_command(state, &func.body, stdin)
            });
        }

        if cmd_name == "test" || cmd_name == "[" {
            return Ok(self.run_test_builtin(cmd_name, args));
        }

        if let Some(result) = self.dispatch_builtin_call(state, cmd_name, args, stdin) {
            return result;
        }

        if cmd_name == "cd" {
            return Ok(handle_cd(state, self.fs, args));
        }

        if cmd_name == "type" {
            return Ok(self.run_type_builtin(state, args));
        }

        if let Some(command) = self.registry.get(cmd_name) {
            let ctx = CommandContext {
                args: args.to_vec(),
                stdin: stdin.to_string(),
                cwd: state.cwd.clone(),
                env: state.env.clone(),
                fs: self.async_fs.clone(),
                exec_fn: None,
                fetch_fn: None,
            };
            let handle = self.runtime_handle.clone();
            let result = tokio::task::block_in_place(|| handle.block_on(command.execute(ctx)));
            return Ok(ExecResult::new(result.stdout, result.stderr, result.exit_code));
        }

        Ok(ExecResult::new(
            String::new(),
            format!("bash: {}: command not found\n", cmd_name),
            127,
        ))
    }

    fn dispatch_builtin_call(
        &self,
        state: &mut InterpreterState,
        cmd_name: &str,
        args: &[String],
        stdin: &str,
    ) -> Option<Result<ExecResult, InterpreterError>> {
        // `dispatch_builtin` needs to both hold `state` mutably (for direct
        // handlers like `export`) and re-enter command resolution through
        // `run_command` (for `exec`/`command`/`builtin`). Those two uses
        // never overlap in time, so we bridge with a raw pointer instead of
        // threading a second `&mut` through the callback type.
        let state_ptr: *mut InterpreterState = &mut *state;

        let run_command = |name: &str, rest: &[String], _quoted: &[bool], stdin: &str, _skip_fn: bool, _default_path: bool, _fd: i32| -> ExecResult {
            let state: &mut InterpreterState = unsafe { &mut *state_ptr };
            match self.run_resolved_command(state, name, rest, stdin) {
                Ok(r) => r,
                Err(_) => ExecResult::new(String::new(), String::new(), 1),
            }
        };

        let build_exported_env_fn = || {
            let state: &InterpreterState = unsafe { &*state_ptr };
            build_exported_env(state)
        };
        let execute_user_script_fn = |_script: &str, _args: &[String], _stdin: Option<&str>| ExecResult::ok();

        let mut ctx = BuiltinDispatchContext {
            state,
            run_command: &run_command,
            build_exported_env: &build_exported_env_fn,
            execute_user_script: &execute_user_script_fn,
        };

        dispatch_builtin(&mut ctx, cmd_name, args, &[], stdin, false, false, -1)
    }

    /// Handle the `test`/`[` builtin. Shares the file-test semantics of
    /// `evaluate_conditional` (the `[[ ... ]]` evaluator) against the same
    /// `self.fs`, but over the flat, unbracketed POSIX `test` argument
    /// grammar rather than a parsed `CondExpr` tree.
    fn run_test_builtin(&self, cmd_name: &str, args: &[String]) -> ExecResult {
        let mut test_args: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
        if cmd_name == "[" {
            if test_args.last().copied() != Some("]") {
                return ExecResult::new(String::new(), "bash: [: missing `]'\n".to_string(), 2);
            }
            test_args.pop();
        }
        let result = evaluate_test_args(self.fs, &test_args);
        ExecResult::new(String::new(), String::new(), if result { 0 } else { 1 })
    }

    /// Handle the `type` builtin. There is no real filesystem PATH in this
    /// sandbox; a registered command reports itself as a "file" hit, keyed
    /// by name rather than by an on-disk path.
    fn run_type_builtin(&self, state: &InterpreterState, args: &[String]) -> ExecResult {
        let ctx = TypeCommandContext { state };
        handle_type(
            &ctx,
            args,
            |name| self.registry.get(name).map(|_| name.to_string()),
            |name| self.registry.get(name).map(|_| name.to_string()).into_iter().collect(),
        )
    }

    /// Execute a compound command (if, for, while, etc.).
    pub fn execute_compound_command(
        &self,
        state: &mut InterpreterState,
        compound: &CompoundCommandNode,
        stdin: &str,
    ) -> Result<ExecResult, InterpreterError> {
        match compound {
            CompoundCommandNode::If(if_node) => {
                // Build clauses for execute_if
                let clauses: Vec<(Vec<&StatementNode>, Vec<&StatementNode>)> = if_node
                    .clauses
                    .iter()
                    .map(|c| {
                        (
                            c.condition.iter().collect(),
                            c.body.iter().collect(),
                        )
                    })
                    .collect();

                let else_body: Option<Vec<&StatementNode>> =
                    if_node.else_body.as_ref().map(|b| b.iter().collect());

                let result = execute_if(
                    state,
                    &clauses,
                    else_body.as_deref(),
                    |state, stmt| {
                        let res = self.execute_statement(state, stmt)?;
                        Ok(ConditionResult {
                            stdout: res.stdout,
                            stderr: res.stderr,
                            exit_code: res.exit_code,
                        })
                    },
                    |state, stmt| self.execute_statement(state, stmt),
                )?;

                Ok(ExecResult::new(result.stdout, result.stderr, result.exit_code))
            }

            CompoundCommandNode::For(for_node) => {
                // Expand words
                let mut words: Vec<String> = Vec::new();
                if let Some(ref word_list) = for_node.words {
                    for word in word_list {
                        words.extend(self.expand_argument_word(state, word));
                    }
                } else {
                    // Default to positional parameters
                    let argc: usize = state.env.get("#")
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(0);
                    for i in 1..=argc {
                        if let Some(val) = state.env.get(&i.to_string()) {
                            words.push(val.clone());
                        }
                    }
                }

                let body: Vec<&StatementNode> = for_node.body.iter().collect();

                let result = execute_for(
                    state,
                    &for_node.variable,
                    &words,
                    &body,
                    self.limits.max_iterations,
                    |state, stmt| self.execute_statement(state, stmt),
                )?;

                Ok(ExecResult::new(result.stdout, result.stderr, result.exit_code))
            }

            CompoundCommandNode::While(while_node) => {
                let condition: Vec<&StatementNode> = while_node.condition.iter().collect();
                let body: Vec<&StatementNode> = while_node.body.iter().collect();

                let result = execute_while(
                    state,
                    &condition,
                    &body,
                    self.limits.max_iterations,
                    |state, stmt| {
                        let res = self.execute_statement(state, stmt)?;
                        Ok(ConditionResult {
                            stdout: res.stdout,
                            stderr: res.stderr,
                            exit_code: res.exit_code,
                        })
                    },
                    |state, stmt| self.execute_statement(state, stmt),
                )?;

                Ok(ExecResult::new(result.stdout, result.stderr, result.exit_code))
            }

            CompoundCommandNode::Until(until_node) => {
                let condition: Vec<&StatementNode> = until_node.condition.iter().collect();
                let body: Vec<&StatementNode> = until_node.body.iter().collect();

                let result = execute_until(
                    state,
                    &condition,
                    &body,
                    self.limits.max_iterations,
                    |state, stmt| {
                        let res = self.execute_statement(state, stmt)?;
                        Ok(ConditionResult {
                            stdout: res.stdout,
                            stderr: res.stderr,
                            exit_code: res.exit_code,
                        })
                    },
                    |state, stmt| self.execute_statement(state, stmt),
                )?;

                Ok(ExecResult::new(result.stdout, result.stderr, result.exit_code))
            }

            CompoundCommandNode::Case(case_node) => {
                self.execute_case(state, case_node, stdin)
            }

            CompoundCommandNode::Subshell(subshell_node) => {
                execute_subshell(
                    state,
                    &subshell_node.body,
                    Some(stdin),
                    |state, stmt| self.execute_statement(state, stmt),
                )
            }

            CompoundCommandNode::Group(group_node) => {
                execute_group(
                    state,
                    &group_node.body,
                    Some(stdin),
                    |state, stmt| self.execute_statement(state, stmt),
                )
            }

            CompoundCommandNode::ArithmeticCommand(arith) => {
                use crate::interpreter::arithmetic::evaluate_arithmetic;
                use crate::interpreter::types::InterpreterContext;

                let mut ctx = InterpreterContext::new(state, self.limits);
                match evaluate_arithmetic(&mut ctx, &arith.expression.expression, false, None) {
                    Ok(value) => {
                        // Arithmetic command: exit 0 if non-zero, exit 1 if zero
                        let exit_code = if value != 0 { 0 } else { 1 };
                        Ok(ExecResult::new(String::new(), String::new(), exit_code))
                    }
                    Err(e) => {
                        Ok(ExecResult::new(
                            String::new(),
                            format!("bash: {}\n", e),
                            1,
                        ))
                    }
                }
            }

            CompoundCommandNode::ConditionalCommand(cond) => {
                match self.evaluate_conditional(state, &cond.expression) {
                    Ok(true) => Ok(ExecResult::ok()),
                    Ok(false) => Ok(ExecResult::new(String::new(), String::new(), 1)),
                    Err(e) => Ok(ExecResult::new(String::new(), format!("bash: {}\n", e), 2)),
                }
            }

            CompoundCommandNode::CStyleFor(cfor) => {
                self.execute_c_style_for(state, cfor, stdin)
            }
        }
    }

    /// Execute a `case WORD in PATTERN) BODY ;; ... esac` statement.
    fn execute_case(
        &self,
        state: &mut InterpreterState,
        case_node: &crate::ast::types::CaseNode,
        stdin: &str,
    ) -> Result<ExecResult, InterpreterError> {
        use crate::ast::types::CaseTerminator;
        use crate::interpreter::conditionals::match_pattern;

        let subject = self.expand_simple(state, &case_node.word);
        let nocasematch = state.shopt_options.nocasematch;
        let extglob = state.shopt_options.extglob;

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut exit_code = 0;
        let mut fallthrough = false;

        for item in &case_node.items {
            let matched = fallthrough
                || item
                    .patterns
                    .iter()
                    .any(|p| match_pattern(&subject, &self.expand_simple(state, p), nocasematch, extglob));

            if matched {
                for stmt in &item.body {
                    let result = self.execute_statement(state, stmt)?;
                    stdout.push_str(&result.stdout);
                    stderr.push_str(&result.stderr);
                    exit_code = result.exit_code;
                }
                match item.terminator {
                    CaseTerminator::DoubleSemi => return Ok(ExecResult::new(stdout, stderr, exit_code)),
                    CaseTerminator::SemiAnd => fallthrough = true,
                    CaseTerminator::SemiSemiAnd => fallthrough = false,
                }
            }
        }

        let _ = stdin;
        Ok(ExecResult::new(stdout, stderr, exit_code))
    }

    /// Execute a C-style `for ((init; cond; update)); do ...; done` loop.
    fn execute_c_style_for(
        &self,
        state: &mut InterpreterState,
        cfor: &crate::ast::types::CStyleForNode,
        _stdin: &str,
    ) -> Result<ExecResult, InterpreterError> {
        use crate::interpreter::arithmetic::evaluate_arithmetic;
        use crate::interpreter::types::InterpreterContext;

        let eval = |state: &mut InterpreterState, limits: &ExecutionLimits, expr: &crate::ast::types::ArithmeticExpressionNode| -> Result<i64, InterpreterError> {
            let mut ctx = InterpreterContext::new(state, limits);
            evaluate_arithmetic(&mut ctx, &expr.expression, false, None)
                .map_err(InterpreterError::Arithmetic)
        };

        if let Some(ref init) = cfor.init {
            eval(state, self.limits, init)?;
        }

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut exit_code = 0;
        let mut iterations: u64 = 0;

        loop {
            if let Some(ref cond) = cfor.condition {
                let value = eval(state, self.limits, cond)?;
                if value == 0 {
                    break;
                }
            }

            iterations += 1;
            if iterations > self.limits.max_iterations as u64 {
                return Err(InterpreterError::ExecutionLimit(
                    crate::interpreter::errors::ExecutionLimitError::simple(
                        format!("maximum iteration count ({}) exceeded (possible infinite loop)", self.limits.max_iterations),
                        crate::interpreter::errors::LimitType::Iterations,
                    ),
                ));
            }

            state.loop_depth += 1;
            let loop_result = (|| -> Result<(), InterpreterError> {
                for stmt in &cfor.body {
                    let result = self.execute_statement(state, stmt)?;
                    stdout.push_str(&result.stdout);
                    stderr.push_str(&result.stderr);
                    exit_code = result.exit_code;
                }
                Ok(())
            })();
            state.loop_depth -= 1;

            match loop_result {
                Ok(()) => {}
                Err(InterpreterError::Break(b)) => {
                    if b.levels > 1 {
                        return Err(InterpreterError::Break(crate::interpreter::errors::BreakError::new(
                            b.levels - 1,
                            b.stdout,
                            b.stderr,
                        )));
                    }
                    break;
                }
                Err(InterpreterError::Continue(c)) => {
                    if c.levels > 1 {
                        return Err(InterpreterError::Continue(crate::interpreter::errors::ContinueError::new(
                            c.levels - 1,
                            c.stdout,
                            c.stderr,
                        )));
                    }
                }
                Err(e) => return Err(e),
            }

            if let Some(ref update) = cfor.update {
                eval(state, self.limits, update)?;
            }
        }

        Ok(ExecResult::new(stdout, stderr, exit_code))
    }

    /// Evaluate a `[[ ... ]]` conditional expression tree.
    fn evaluate_conditional(
        &self,
        state: &mut InterpreterState,
        expr: &crate::ast::types::ConditionalExpressionNode,
    ) -> Result<bool, String> {
        use crate::ast::types::{ConditionalExpressionNode as Cond, CondBinaryOperator as BinOp, CondUnaryOperator as UnOp};
        use crate::interpreter::conditionals::{match_pattern, parse_numeric};

        match expr {
            Cond::Word(w) => {
                let value = self.expand_simple(state, &w.word);
                Ok(!value.is_empty())
            }
            Cond::Not(n) => Ok(!self.evaluate_conditional(state, &n.operand)?),
            Cond::And(a) => {
                Ok(self.evaluate_conditional(state, &a.left)? && self.evaluate_conditional(state, &a.right)?)
            }
            Cond::Or(o) => {
                Ok(self.evaluate_conditional(state, &o.left)? || self.evaluate_conditional(state, &o.right)?)
            }
            Cond::Group(g) => self.evaluate_conditional(state, &g.expression),
            Cond::Unary(u) => {
                let operand = self.expand_simple(state, &u.operand);
                Ok(match u.operator {
                    UnOp::Z => operand.is_empty(),
                    UnOp::LowerN => !operand.is_empty(),
                    UnOp::E | UnOp::A => self.fs.exists(&operand),
                    UnOp::F => self.fs.is_file(&operand),
                    UnOp::D => self.fs.is_dir(&operand),
                    UnOp::R | UnOp::W | UnOp::X => self.fs.exists(&operand),
                    UnOp::S => self
                        .fs
                        .stat(&operand)
                        .map(|st| st.size > 0)
                        .unwrap_or(false),
                    UnOp::V => !state.env.get(&operand).cloned().unwrap_or_default().is_empty()
                        || state.env.contains_key(&operand),
                    _ => false,
                })
            }
            Cond::Binary(b) => {
                let left = self.expand_simple(state, &b.left);
                let right = self.expand_simple(state, &b.right);
                Ok(match b.operator {
                    BinOp::Eq | BinOp::EqEq => {
                        match_pattern(&left, &right, state.shopt_options.nocasematch, state.shopt_options.extglob)
                    }
                    BinOp::Ne => {
                        !match_pattern(&left, &right, state.shopt_options.nocasematch, state.shopt_options.extglob)
                    }
                    BinOp::Lt => left < right,
                    BinOp::Gt => left > right,
                    BinOp::Match => {
                        let re = crate::interpreter::conditionals::posix_ere_to_regex(&right);
                        regex_lite::Regex::new(&re).map(|r| r.is_match(&left)).unwrap_or(false)
                    }
                    BinOp::NumEq => parse_numeric(&left) == parse_numeric(&right),
                    BinOp::NumNe => parse_numeric(&left) != parse_numeric(&right),
                    BinOp::NumLt => parse_numeric(&left) < parse_numeric(&right),
                    BinOp::NumLe => parse_numeric(&left) <= parse_numeric(&right),
                    BinOp::NumGt => parse_numeric(&left) > parse_numeric(&right),
                    BinOp::NumGe => parse_numeric(&left) >= parse_numeric(&right),
                    BinOp::Nt => self.fs.stat(&left).ok().zip(self.fs.stat(&right).ok())
                        .map(|(a, b)| a.mtime > b.mtime)
                        .unwrap_or(false),
                    BinOp::Ot => self.fs.stat(&left).ok().zip(self.fs.stat(&right).ok())
                        .map(|(a, b)| a.mtime < b.mtime)
                        .unwrap_or(false),
                    BinOp::Ef => self.fs.resolve_path("/", &left) == self.fs.resolve_path("/", &right),
                })
            }
        }
    }
}

/// Evaluate a POSIX `test`/`[` argument list (already stripped of the
/// trailing `]` for the bracket form). Recurses on `-a`/`-o` exactly like
/// bash's own grammar: the first `-a`/`-o` token found splits the
/// expression, left-associatively, with `-a` binding tighter than `-o`.
fn evaluate_test_args(fs: &dyn SyncFileSystem, args: &[&str]) -> bool {
    if args.is_empty() {
        return false;
    }
    if args.len() == 1 {
        return !args[0].is_empty();
    }
    if args[0] == "!" {
        return !evaluate_test_args(fs, &args[1..]);
    }

    // `-o` splits before `-a` (lower precedence), scanning left to right.
    if let Some(i) = args.iter().position(|&a| a == "-o") {
        return evaluate_test_args(fs, &args[..i]) || evaluate_test_args(fs, &args[i + 1..]);
    }
    if let Some(i) = args.iter().position(|&a| a == "-a") {
        return evaluate_test_args(fs, &args[..i]) && evaluate_test_args(fs, &args[i + 1..]);
    }

    if args.len() == 2 {
        let operand = args[1];
        return match args[0] {
            "-z" => operand.is_empty(),
            "-n" => !operand.is_empty(),
            "-e" | "-a" => fs.exists(operand),
            "-f" => fs.is_file(operand),
            "-d" => fs.is_dir(operand),
            "-r" | "-w" | "-x" => fs.exists(operand),
            "-s" => fs.stat(operand).map(|st| st.size > 0).unwrap_or(false),
            "-L" | "-h" => fs.stat(operand).map(|st| st.is_symlink).unwrap_or(false),
            _ => false,
        };
    }

    if args.len() == 3 {
        let (left, op, right) = (args[0], args[1], args[2]);
        return match op {
            "=" | "==" => left == right,
            "!=" => left != right,
            "<" => left < right,
            ">" => left > right,
            "-eq" => left.parse::<i64>().unwrap_or(0) == right.parse::<i64>().unwrap_or(0),
            "-ne" => left.parse::<i64>().unwrap_or(0) != right.parse::<i64>().unwrap_or(0),
            "-lt" => left.parse::<i64>().unwrap_or(0) < right.parse::<i64>().unwrap_or(0),
            "-le" => left.parse::<i64>().unwrap_or(0) <= right.parse::<i64>().unwrap_or(0),
            "-gt" => left.parse::<i64>().unwrap_or(0) > right.parse::<i64>().unwrap_or(0),
            "-ge" => left.parse::<i64>().unwrap_or(0) >= right.parse::<i64>().unwrap_or(0),
            "-nt" => fs.stat(left).ok().zip(fs.stat(right).ok())
                .map(|(a, b)| a.mtime > b.mtime).unwrap_or(false),
            "-ot" => fs.stat(left).ok().zip(fs.stat(right).ok())
                .map(|(a, b)| a.mtime < b.mtime).unwrap_or(false),
            "-ef" => fs.resolve_path("/", left) == fs.resolve_path("/", right),
            _ => false,
        };
    }

    false
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{InMemoryFs, FileSystem as AsyncFileSystem};
    use crate::interpreter::sync_fs_adapter::SyncFsAdapter;
    use std::sync::Arc;

    fn make_engine_and_state() -> (ExecutionEngine<'static>, InterpreterState, Arc<InMemoryFs>) {
        let fs = Arc::new(InMemoryFs::new());
        let limits = Box::leak(Box::new(ExecutionLimits::default()));

        // We need a static reference for the test, so we leak the adapter
        let handle = tokio::runtime::Handle::current();
        let adapter = Box::leak(Box::new(SyncFsAdapter::new(fs.clone(), handle.clone())));
        let registry = Arc::new(crate::commands::default_registry());

        let engine = ExecutionEngine::new(limits, adapter, fs.clone() as Arc<dyn AsyncFileSystem>, registry, handle);
        let state = InterpreterState::default();

        (engine, state, fs)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_echo() {
        let (engine, mut state, _fs) = make_engine_and_state();

        let ast = crate::parser::parse("echo hello world").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();

        assert_eq!(result.stdout, "hello world\n");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_variable_expansion() {
        let (engine, mut state, _fs) = make_engine_and_state();
        state.env.insert("NAME".to_string(), "world".to_string());

        let ast = crate::parser::parse("echo hello $NAME").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();

        assert_eq!(result.stdout, "hello world\n");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_true_false() {
        let (engine, mut state, _fs) = make_engine_and_state();

        let ast = crate::parser::parse("true").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.exit_code, 0);

        let ast = crate::parser::parse("false").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.exit_code, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_and_or() {
        let (engine, mut state, _fs) = make_engine_and_state();

        // true && echo yes
        let ast = crate::parser::parse("true && echo yes").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "yes\n");

        // false && echo no (should not print)
        let ast = crate::parser::parse("false && echo no").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "");

        // false || echo fallback
        let ast = crate::parser::parse("false || echo fallback").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "fallback\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_if() {
        let (engine, mut state, _fs) = make_engine_and_state();

        let ast = crate::parser::parse("if true; then echo yes; fi").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "yes\n");

        let ast = crate::parser::parse("if false; then echo no; else echo else; fi").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "else\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_for() {
        let (engine, mut state, _fs) = make_engine_and_state();

        let ast = crate::parser::parse("for i in a b c; do echo $i; done").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "a\nb\nc\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_while() {
        let (engine, mut state, _fs) = make_engine_and_state();
        state.env.insert("x".to_string(), "3".to_string());

        // Simple while that would loop - but we need arithmetic for decrement
        // For now just test basic structure
        let ast = crate::parser::parse("while false; do echo loop; done").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_subshell() {
        let (engine, mut state, _fs) = make_engine_and_state();
        state.env.insert("X".to_string(), "original".to_string());

        // Subshell should not affect parent
        let ast = crate::parser::parse("(X=modified; echo $X); echo $X").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        // Note: assignment in subshell not fully implemented yet
        // Just verify subshell executes
        assert!(result.stdout.contains("original"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_group() {
        let (engine, mut state, _fs) = make_engine_and_state();

        let ast = crate::parser::parse("{ echo a; echo b; }").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "a\nb\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_pwd_cd() {
        let fs = Arc::new(InMemoryFs::new());
        let limits = Box::leak(Box::new(ExecutionLimits::default()));

        // Create directory structure using async API directly
        fs.mkdir("/home", &crate::fs::MkdirOptions { recursive: false }).await.unwrap();
        fs.mkdir("/home/user", &crate::fs::MkdirOptions { recursive: false }).await.unwrap();

        // Now create the sync adapter
        let handle = tokio::runtime::Handle::current();
        let adapter = Box::leak(Box::new(SyncFsAdapter::new(fs.clone(), handle.clone())));
        let registry = Arc::new(crate::commands::default_registry());

        let engine = ExecutionEngine::new(limits, adapter, fs.clone() as Arc<dyn AsyncFileSystem>, registry, handle);
        let mut state = InterpreterState::default();

        state.cwd = "/".to_string();
        state.env.insert("PWD".to_string(), "/".to_string());

        let ast = crate::parser::parse("pwd").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "/\n");

        let ast = crate::parser::parse("cd /home/user && pwd").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "/home/user\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_pipeline() {
        let (engine, mut state, _fs) = make_engine_and_state();

        let ast = crate::parser::parse("printf 'b\\na\\nc\\n' | sort").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "a\nb\nc\n");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_pipeline_pipefail() {
        let (engine, mut state, _fs) = make_engine_and_state();

        let ast = crate::parser::parse("set -o pipefail; false | true").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.exit_code, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_type_builtin() {
        let (engine, mut state, _fs) = make_engine_and_state();

        let ast = crate::parser::parse("type -t echo").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout.trim(), "builtin");

        let ast = crate::parser::parse("type -t sort").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout.trim(), "file");

        let ast = crate::parser::parse("type -t nonexistent_xyz").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.exit_code, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_builtin_string_and_numeric() {
        let (engine, mut state, _fs) = make_engine_and_state();

        let ast = crate::parser::parse("test -n hello").unwrap();
        assert_eq!(engine.execute_script(&mut state, &ast).unwrap().exit_code, 0);

        let ast = crate::parser::parse("[ a = a ]").unwrap();
        assert_eq!(engine.execute_script(&mut state, &ast).unwrap().exit_code, 0);

        let ast = crate::parser::parse("[ 3 -gt 5 ]").unwrap();
        assert_eq!(engine.execute_script(&mut state, &ast).unwrap().exit_code, 1);

        let ast = crate::parser::parse("[ -n a -a -z \"\" ]").unwrap();
        assert_eq!(engine.execute_script(&mut state, &ast).unwrap().exit_code, 0);

        let ast = crate::parser::parse("[ -z a -o -n b ]").unwrap();
        assert_eq!(engine.execute_script(&mut state, &ast).unwrap().exit_code, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_builtin_file_tests() {
        let (engine, mut state, fs) = make_engine_and_state();
        fs.write_file("/f.txt", b"data").await.unwrap();
        fs.mkdir("/d", &crate::fs::MkdirOptions { recursive: false }).await.unwrap();

        let ast = crate::parser::parse("test -f /f.txt").unwrap();
        assert_eq!(engine.execute_script(&mut state, &ast).unwrap().exit_code, 0);

        let ast = crate::parser::parse("test -d /d").unwrap();
        assert_eq!(engine.execute_script(&mut state, &ast).unwrap().exit_code, 0);

        let ast = crate::parser::parse("test -f /d").unwrap();
        assert_eq!(engine.execute_script(&mut state, &ast).unwrap().exit_code, 1);

        let ast = crate::parser::parse("[ -e /missing ]").unwrap();
        assert_eq!(engine.execute_script(&mut state, &ast).unwrap().exit_code, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_bracket_missing_close() {
        let (engine, mut state, _fs) = make_engine_and_state();

        let ast = crate::parser::parse("[ -n a").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.exit_code, 2);
        assert!(result.stderr.contains("missing"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_test_shadowed_by_function() {
        let (engine, mut state, _fs) = make_engine_and_state();

        let ast = crate::parser::parse("test() { echo shadowed; }; test -n x").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "shadowed\n");
    }
}
