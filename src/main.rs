// Entrypoint for the CLI application.
// - Keeps `main` small: parse flags, load the config, pick a roster file
//   and hand everything to the menu loop.
// - Returns `anyhow::Result` so an unrecoverable startup error exits
//   non-zero with a readable message.

use clap::Parser;
use std::path::PathBuf;
use student_roster::config::ConfigStore;
use student_roster::manager::Manager;
use student_roster::ui;

#[derive(Parser)]
#[command(name = "student-roster")]
#[command(about = "Maintain a flat-file roster of student records", version)]
struct Cli {
    /// Roster file to open instead of the one used last time
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Config file location (default: ~/.student_roster.json)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(ConfigStore::default_path);
    let mut manager = Manager::new(ConfigStore::load(config_path));

    ui::print_banner();
    let Some(session) = ui::startup(&mut manager, cli.file)? else {
        println!("Exiting program.");
        return Ok(());
    };

    // Blocks until the user picks "Exit".
    ui::main_menu(&mut manager, session)?;
    Ok(())
}
