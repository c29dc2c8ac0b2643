use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use course_market::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Course Marketplace Moderation",
    about = "Run the course marketplace moderation service or walk through a demo review",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk a course, its lectures and a cancellation request through moderation
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["course-market-api"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn serve_accepts_bind_overrides() {
        let cli = Cli::try_parse_from(["course-market-api", "serve", "--port", "8080"])
            .expect("parses");
        match cli.command {
            Some(Command::Serve(args)) => {
                assert_eq!(args.port, Some(8080));
                assert!(args.host.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn demo_flags_parse() {
        let cli = Cli::try_parse_from(["course-market-api", "demo", "--json", "--skip-batch"])
            .expect("parses");
        match cli.command {
            Some(Command::Demo(args)) => {
                assert!(args.json);
                assert!(args.skip_batch);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
