mod segment;
mod utils;

use clap::{
    Parser,
    Subcommand,
};
use segment::SegmentArgs;
use utils::UtilsArgs;
use wild::ArgsOs;

#[derive(Parser, Debug)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None,)]
struct Cli {
    #[command(subcommand)]
    command: MainMenu,
}

#[derive(Subcommand, Debug)]
enum MainMenu {
    /// Jointly segment the samples of a call table.
    Segment {
        #[clap(flatten)]
        utils: UtilsArgs,
        #[clap(flatten)]
        args:  SegmentArgs,
    },
}

fn main() -> anyhow::Result<()> {
    let args: ArgsOs = wild::args_os();
    let cli = Cli::parse_from(args);

    let success = match cli.command {
        MainMenu::Segment { utils, args } => {
            utils.setup()?;
            args.run(&utils)?
        },
    };
    if !success {
        std::process::exit(1);
    }
    Ok(())
}
