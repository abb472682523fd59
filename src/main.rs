use clap::Parser;
use hretl::cli::{Cli, Commands};
use hretl::core::logging;
use miette::Result;

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    // Without this, piping to `head`, `grep -q`, etc. causes a panic on broken pipe.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    logging::init(global.verbose, global.quiet);

    match cli.command {
        Commands::Init(args) => hretl::cli::commands::init::run(args, &global),
        Commands::Ingest(args) => hretl::cli::commands::ingest::run(args, &global),
        Commands::Classify(args) => hretl::cli::commands::classify::run(args, &global),
        Commands::Template(args) => hretl::cli::commands::template::run(args, &global),
        Commands::Uploads(cmd) => hretl::cli::commands::uploads::run(cmd, &global),
        Commands::Activity(cmd) => hretl::cli::commands::activity::run(cmd, &global),
    }
}
