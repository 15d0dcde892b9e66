mod bundle;
mod cli;

use anyhow::{Context, Result};
use bundle::Bundle;
use clap::Parser;
use cli::{Cli, Commands};
use lessr_core::{compile_to_css, CompileOptions};
use log::info;
use std::fs;
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Build {
            input,
            output,
            config,
            compress,
            strict_imports,
            max_mixin_depth,
        } => {
            let mut options = match &config {
                Some(path) => CompileOptions::load(path)?,
                None => CompileOptions::default(),
            };
            options.compress |= compress;
            options.strict_imports |= strict_imports;
            if let Some(depth) = max_mixin_depth {
                options.max_mixin_depth = depth;
            }
            build(input, output, options)
        }
    }
}

fn build(input: PathBuf, output: Option<PathBuf>, options: CompileOptions) -> Result<()> {
    let (rules, imports) = Bundle::load(&input)?.into_parts();
    info!("compiling {} with {:?}", input.display(), options);

    let css = compile_to_css(rules, options, Some(imports))
        .with_context(|| format!("Failed to compile {}", input.display()))?;

    match output {
        Some(path) => fs::write(&path, css)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", css),
    }
    Ok(())
}
