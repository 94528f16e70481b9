use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Clinic chatbot: talk to the reception over WhatsApp", long_about = None)]
pub struct Args {
    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Print the WhatsApp link instead of opening the browser
    #[arg(long, global = true)]
    pub no_browser: bool,

    /// Shortest simulated typing pause, in milliseconds
    #[arg(long, value_name = "MS", global = true)]
    pub min_delay_ms: Option<u64>,

    /// Longest simulated typing pause, in milliseconds
    #[arg(long, value_name = "MS", global = true)]
    pub max_delay_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Guided conversation (default)
    Chat,
    /// Send the contact page form directly
    Contact {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long)]
        message: String,
    },
    /// List the clinic units
    Units,
}

impl Args {
    pub fn level_filter(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}
