#![forbid(unsafe_code)]

mod cmd;
mod output;

use anyhow::Context as _;
use clap::{CommandFactory, Parser, Subcommand};
use cmd::Workspace;
use output::{CliError, OutputMode, render_error};
use std::env;
use std::io::IsTerminal;
use std::process::ExitCode;
use storyboard_core::config;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "sb: user stories with filter facets",
    long_about = None
)]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Output mode before any config is read.
    fn fallback_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if std::io::stdout().is_terminal() {
            OutputMode::Pretty
        } else {
            OutputMode::Text
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a storyboard directory",
        long_about = "Create .storyboard/ with a config template and an empty store.",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    sb init\n\n    # Rewrite the config template, keeping the store\n    sb init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Create and list projects",
        after_help = "EXAMPLES:\n    # Create a project (slug: web-shop)\n    sb project create \"Web Shop\"\n\n    # List projects\n    sb project list --json"
    )]
    Project {
        #[command(subcommand)]
        command: cmd::project::ProjectCommand,
    },

    #[command(
        next_help_heading = "Setup",
        about = "Manage story statuses",
        after_help = "EXAMPLES:\n    # Add an open and a closed status\n    sb status add -p web New\n    sb status add -p web Done --closed\n\n    # List statuses in board order\n    sb status list -p web"
    )]
    Status {
        #[command(subcommand)]
        command: cmd::status::StatusCommand,
    },

    #[command(
        next_help_heading = "Setup",
        about = "Manage task statuses",
        after_help = "EXAMPLES:\n    # Add a closed task status\n    sb task-status add -p web Done --closed"
    )]
    TaskStatus {
        #[command(subcommand)]
        command: cmd::status::TaskStatusCommand,
    },

    #[command(
        next_help_heading = "Setup",
        about = "Register people",
        after_help = "EXAMPLES:\n    # Add a person\n    sb person add alice --full-name \"Alice Doe\""
    )]
    Person {
        #[command(subcommand)]
        command: cmd::person::PersonCommand,
    },

    #[command(
        next_help_heading = "Setup",
        about = "Manage project roles",
        after_help = "EXAMPLES:\n    # Add an estimating role\n    sb role add -p web UX --computable"
    )]
    Role {
        #[command(subcommand)]
        command: cmd::role::RoleCommand,
    },

    #[command(
        next_help_heading = "Setup",
        about = "Manage estimation values",
        after_help = "EXAMPLES:\n    # Add points with and without a value\n    sb points add -p web 3 --value 3\n    sb points add -p web ?"
    )]
    Points {
        #[command(subcommand)]
        command: cmd::points::PointsCommand,
    },

    #[command(
        next_help_heading = "Setup",
        about = "Manage project memberships",
        after_help = "EXAMPLES:\n    # Add a member with a role\n    sb member add -p web alice --role ux\n\n    # Record a pending invitation\n    sb member add -p web --email carol@example.com"
    )]
    Member {
        #[command(subcommand)]
        command: cmd::member::MemberCommand,
    },

    #[command(
        next_help_heading = "Stories",
        about = "Create, list and edit user stories",
        after_help = "EXAMPLES:\n    # Create a tagged story\n    sb story create -p web \"Checkout flow\" --owner alice --tag ui\n\n    # Create stories from a file, one per line\n    sb story bulk -p web --file backlog.txt\n\n    # Reorder the backlog\n    sb story order -p web --field backlog 12=1 7=2"
    )]
    Story {
        #[command(subcommand)]
        command: cmd::story::StoryCommand,
    },

    #[command(
        next_help_heading = "Stories",
        about = "Create tasks and change their status",
        after_help = "EXAMPLES:\n    # Add a task to story 12\n    sb task create -p web \"Write tests\" --story 12\n\n    # Close it\n    sb task status 3 Done"
    )]
    Task {
        #[command(subcommand)]
        command: cmd::task::TaskCommand,
    },

    #[command(
        next_help_heading = "Read",
        about = "Show facet counts for a selection",
        long_about = "Count stories per status, assignee, owner and tag. Each facet ignores its own selection.",
        after_help = "EXAMPLES:\n    # Counts for the whole project\n    sb filters -p web\n\n    # Counts among unassigned stories tagged ui\n    sb filters -p web --assigned-to none --tag ui --json"
    )]
    Filters(cmd::filters::FiltersArgs),

    #[command(
        next_help_heading = "Read",
        about = "Export stories as CSV",
        after_help = "EXAMPLES:\n    # Export a project to a file\n    sb export -p web -o stories.csv\n\n    # Export open stories with a semicolon delimiter\n    sb export -p web --open --delimiter ';'"
    )]
    Export(cmd::export::ExportArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    sb completions bash"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

/// `storyboard` covers the library targets (`storyboard_core::*`); the
/// binary's own events are under `sb`.
const DEFAULT_DIRECTIVES: &str = "storyboard=info,sb=info,warn";
const DEBUG_DIRECTIVES: &str = "storyboard=debug,sb=debug,info";

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("STORYBOARD_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            DEBUG_DIRECTIVES
        } else {
            DEFAULT_DIRECTIVES
        })
    });

    let format = env::var("STORYBOARD_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: Cli, output: &mut OutputMode) -> anyhow::Result<()> {
    let project_root = env::current_dir().context("resolve current directory")?;

    match cli.command {
        Commands::Init(ref args) => return cmd::init::run_init(args, *output, &project_root),
        Commands::Completions(ref args) => {
            let mut command = Cli::command();
            return cmd::completions::run_completions(args.shell, &mut command);
        }
        _ => {}
    }

    let effective = config::resolve_config(&project_root, cli.json)?;
    *output = OutputMode::from_name(&effective.resolved_output);
    debug!(output = %effective.resolved_output, "resolved output mode");

    let mut ws = Workspace::open(&project_root, effective.project)?;
    let output = *output;

    match cli.command {
        Commands::Project { ref command } => cmd::project::run_project(command, output, &ws),
        Commands::Status { ref command } => cmd::status::run_status(command, output, &ws),
        Commands::TaskStatus { ref command } => {
            cmd::status::run_task_status(command, output, &ws)
        }
        Commands::Person { ref command } => cmd::person::run_person(command, output, &ws),
        Commands::Role { ref command } => cmd::role::run_role(command, output, &ws),
        Commands::Points { ref command } => cmd::points::run_points(command, output, &ws),
        Commands::Member { ref command } => cmd::member::run_member(command, output, &ws),
        Commands::Story { ref command } => cmd::story::run_story(command, output, &mut ws),
        Commands::Task { ref command } => cmd::task::run_task(command, output, &mut ws),
        Commands::Filters(ref args) => cmd::filters::run_filters(args, output, &ws),
        Commands::Export(ref args) => cmd::export::run_export(args, &ws),
        Commands::Init(_) | Commands::Completions(_) => Ok(()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut output = cli.fallback_mode();
    match run(cli, &mut output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            debug!(error = ?err, "command failed");
            if render_error(output, &CliError::from_anyhow(&err)).is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}
