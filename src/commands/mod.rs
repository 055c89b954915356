// src/commands/mod.rs
pub mod basename;
pub mod cat;
pub mod chmod;
pub mod cp;
pub mod cut;
pub mod date;
pub mod dirname;
pub mod echo;
pub mod env;
pub mod head;
pub mod hostname_cmd;
pub mod ln;
pub mod ls;
pub mod mkdir;
pub mod mv;
pub mod printf;
pub mod pwd;
pub mod readlink_cmd;
pub mod registry;
pub mod rev_cmd;
pub mod rm;
pub mod rmdir_cmd;
pub mod seq;
pub mod sleep_cmd;
pub mod sort;
pub mod stat_cmd;
pub mod tac_cmd;
pub mod tail;
pub mod touch;
pub mod tr;
pub mod true_cmd;
pub mod types;
pub mod uniq;
pub mod utils;
pub mod wc;
pub mod which_cmd;
pub mod whoami_cmd;

pub use registry::CommandRegistry;
pub use types::{Command, CommandContext, CommandResult};

/// Build the default command set available to scripts: a curated POSIX-ish
/// coreutils subset. The interpreter's own builtins (cd, export, test, ...)
/// are handled separately and never go through this registry.
pub fn default_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    registry.register(Box::new(basename::BasenameCommand));
    registry.register(Box::new(cat::CatCommand));
    registry.register(Box::new(chmod::ChmodCommand));
    registry.register(Box::new(cp::CpCommand));
    registry.register(Box::new(cut::CutCommand));
    registry.register(Box::new(date::DateCommand));
    registry.register(Box::new(dirname::DirnameCommand));
    registry.register(Box::new(echo::EchoCommand));
    registry.register(Box::new(env::EnvCommand));
    registry.register(Box::new(head::HeadCommand));
    registry.register(Box::new(hostname_cmd::HostnameCommand));
    registry.register(Box::new(ln::LnCommand));
    registry.register(Box::new(ls::LsCommand));
    registry.register(Box::new(mkdir::MkdirCommand));
    registry.register(Box::new(mv::MvCommand));
    registry.register(Box::new(printf::PrintfCommand));
    registry.register(Box::new(pwd::PwdCommand));
    registry.register(Box::new(readlink_cmd::ReadlinkCommand));
    registry.register(Box::new(rev_cmd::RevCommand));
    registry.register(Box::new(rm::RmCommand));
    registry.register(Box::new(rmdir_cmd::RmdirCommand));
    registry.register(Box::new(seq::SeqCommand));
    registry.register(Box::new(sleep_cmd::SleepCommand));
    registry.register(Box::new(sort::SortCommand));
    registry.register(Box::new(stat_cmd::StatCommand));
    registry.register(Box::new(tac_cmd::TacCommand));
    registry.register(Box::new(tail::TailCommand));
    registry.register(Box::new(touch::TouchCommand));
    registry.register(Box::new(tr::TrCommand));
    registry.register(Box::new(true_cmd::TrueCommand));
    registry.register(Box::new(uniq::UniqCommand));
    registry.register(Box::new(wc::WcCommand));
    registry.register(Box::new(which_cmd::WhichCommand));
    registry.register(Box::new(whoami_cmd::WhoamiCommand));
    registry
}
