pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "rtmbot",
    about = "rtmbot operator CLI",
    long_about = "Inspect rtmbot configuration and post messages through the incoming webhook.",
    after_help = "Examples:\n  rtmbot config\n  rtmbot webhook \"deploy finished\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Post a message through the configured incoming webhook")]
    Webhook {
        #[arg(default_value = "Hello!", help = "Message text to post")]
        text: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Webhook { text } => commands::webhook::run(&text),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn webhook_text_defaults_to_greeting() {
        let cli = Cli::try_parse_from(["rtmbot", "webhook"]).expect("parses");
        assert!(matches!(cli.command, Command::Webhook { text } if text == "Hello!"));
    }

    #[test]
    fn webhook_accepts_positional_text() {
        let cli = Cli::try_parse_from(["rtmbot", "webhook", "deploy done"]).expect("parses");
        assert!(matches!(cli.command, Command::Webhook { text } if text == "deploy done"));
    }
}
