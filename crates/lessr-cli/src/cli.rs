use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lessr")]
#[command(about = "Compiles parsed stylesheet rule trees to CSS")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Parser, Debug)]
pub enum Commands {
    /// Compile a JSON rule tree bundle
    Build {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Options file; flags given here take precedence
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        compress: bool,
        #[arg(long)]
        strict_imports: bool,
        #[arg(long)]
        max_mixin_depth: Option<usize>,
    },
}
