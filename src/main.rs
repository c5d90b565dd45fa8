use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use likes_archive::cli::{Cli, Command};
use likes_archive::config::Config;
use likes_archive::media::HttpFetcher;
use likes_archive::render::SiteRenderer;

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn try_main() -> anyhow::Result<()> {
    likes_archive::logging::init().context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    let mut config = Config::load(Path::new(&cli.config)).context("load config")?;
    if let Some(out) = &cli.out {
        config.output_dir = PathBuf::from(out);
    }

    let raw_records = likes_archive::input::load_raw_records(&config.input_path)
        .context("load raw records")?;

    match cli.command {
        None => {
            let fetcher = HttpFetcher::new()?;
            SiteRenderer::new(&config, fetcher)
                .render(&raw_records)
                .context("render site")?;
        }
        Some(Command::Normalize(args)) => {
            let written = likes_archive::export::write_normalized_jsonl(
                &raw_records,
                Path::new(&args.jsonl),
            )
            .context("normalize")?;
            tracing::info!(written, out = %args.jsonl, "normalized posts written");
        }
    }

    Ok(())
}
