// src/commands/touch/mod.rs
use async_trait::async_trait;
use std::time::SystemTime;
use crate::commands::{Command, CommandContext, CommandResult};

pub struct TouchCommand;

#[async_trait]
impl Command for TouchCommand {
    fn name(&self) -> &'static str {
        "touch"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        if ctx.args.iter().any(|a| a == "--help") {
            return CommandResult::success(
                "Usage: touch [OPTION]... FILE...\n\n\
                 Update the access and modification times of each FILE to the current time.\n\n\
                 Options:\n\
                   -c, --no-create    do not create any files\n\
                   -d, --date=STRING  parse STRING and use it instead of current time\n\
                       --help         display this help and exit\n".to_string()
            );
        }

        let mut files: Vec<String> = Vec::new();
        let mut no_create = false;

        let mut i = 0;
        while i < ctx.args.len() {
            let arg = &ctx.args[i];

            if arg == "--" {
                files.extend(ctx.args[i + 1..].iter().cloned());
                break;
            } else if arg == "-d" || arg == "--date" {
                // skip date argument (simplified: dates are ignored)
                i += 1;
            } else if arg.starts_with("--date=") {
                // ignore date
            } else if arg == "-c" || arg == "--no-create" {
                no_create = true;
            } else if arg == "-a" || arg == "-m" || arg == "-r" || arg == "-t" {
                // ignore these options
                if arg == "-r" || arg == "-t" {
                    i += 1; // skip argument
                }
            } else if arg.starts_with('-') && arg.len() > 1 {
                // handle combined short options
                for c in arg[1..].chars() {
                    match c {
                        'c' => no_create = true,
                        'a' | 'm' => {}
                        'd' => {
                            i += 1;
                            break;
                        }
                        _ => {}
                    }
                }
            } else {
                files.push(arg.clone());
            }
            i += 1;
        }

        if files.is_empty() {
            return CommandResult::error("touch: missing file operand\n".to_string());
        }

        let target_time = SystemTime::now();

        let mut stderr = String::new();
        let mut exit_code = 0;

        for file in &files {
            let path = ctx.fs.resolve_path(&ctx.cwd, file);
            let exists = ctx.fs.exists(&path).await;

            if !exists {
                if no_create {
                    continue;
                }
                if let Err(e) = ctx.fs.write_file(&path, &[]).await {
                    stderr.push_str(&format!("touch: cannot touch '{}': {:?}\n", file, e));
                    exit_code = 1;
                    continue;
                }
            }

            if let Err(e) = ctx.fs.utimes(&path, target_time).await {
                stderr.push_str(&format!("touch: cannot touch '{}': {:?}\n", file, e));
                exit_code = 1;
            }
        }

        CommandResult::with_exit_code(String::new(), stderr, exit_code)
    }
}
