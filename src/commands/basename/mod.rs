// src/commands/basename/mod.rs
use async_trait::async_trait;
use crate::commands::{Command, CommandContext, CommandResult};

pub struct BasenameCommand;

#[async_trait]
impl Command for BasenameCommand {
    fn name(&self) -> &'static str {
        "basename"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let args = &ctx.args;

        // check --help
        if args.iter().any(|a| a == "--help") {
            return CommandResult::success(
                "Usage: basename NAME [SUFFIX]\n       basename OPTION... NAME...\n\n\
                 Strip directory and suffix from filenames.\n\n\
                 Options:\n\
                   -a, --multiple   support multiple arguments\n\
                   -s, --suffix=SUFFIX  remove a trailing SUFFIX\n\
                       --help       display this help and exit\n".to_string()
            );
        }

        let mut multiple = false;
        let mut suffix = String::new();
        let mut names: Vec<String> = Vec::new();

        let mut i = 0;
        while i < args.len() {
            let arg = &args[i];
            if arg == "-a" || arg == "--multiple" {
                multiple = true;
            } else if arg == "-s" && i + 1 < args.len() {
                i += 1;
                suffix = args[i].clone();
                multiple = true;
            } else if let Some(s) = arg.strip_prefix("--suffix=") {
                suffix = s.to_string();
                multiple = true;
            } else if !arg.starts_with('-') {
                names.push(arg.clone());
            }
            i += 1;
        }

        if names.is_empty() {
            return CommandResult::error("basename: missing operand\n".to_string());
        }

        // in non-multiple mode, the second argument is the suffix
        if !multiple && names.len() >= 2 {
            suffix = names.pop().unwrap();
        }

        let results: Vec<String> = names
            .iter()
            .map(|name| {
                // strip trailing slashes
                let clean_name = name.trim_end_matches('/');
                let mut base = clean_name
                    .rsplit('/')
                    .next()
                    .unwrap_or(clean_name)
                    .to_string();

                // strip suffix
                if !suffix.is_empty() && base.ends_with(&suffix) && base.len() > suffix.len() {
                    base = base[..base.len() - suffix.len()].to_string();
                }
                base
            })
            .collect();

        CommandResult::success(format!("{}\n", results.join("\n")))
    }
}
