//! `netpack build` — Bundle one entry module to a file or stdout.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use netpack_engine::{build, BuildOptions, BuildResult, Entry, Format, MinifyOptions, StdinOptions};
use netpack_http::{http_plugin, UrlFetcher};
use termcolor::ColorChoice;

use crate::output::Diagnostics;

pub struct BuildArgs {
    pub input: String,
    pub output: Option<PathBuf>,
    pub minify: bool,
    pub bundle: bool,
    pub format: Format,
}

pub fn execute(args: BuildArgs, color: ColorChoice) -> anyhow::Result<()> {
    let entry = read_entry(&args.input)?;
    let result = run(entry, &args, UrlFetcher::new()?)?;

    let mut diagnostics = Diagnostics::new(color);
    for warning in &result.warnings {
        diagnostics.warning(warning);
    }
    for error in &result.errors {
        diagnostics.error(error);
    }
    if !result.is_ok() {
        bail!("build failed with {} error(s)", result.errors.len());
    }

    let contents = result.output().unwrap_or_default();
    match &args.output {
        Some(path) => {
            fs::write(path, contents)
                .with_context(|| format!("failed to write {}", path.display()))?;
            diagnostics.success(&format!("wrote {}", path.display()));
        }
        None => io::stdout().write_all(contents.as_bytes())?,
    }
    Ok(())
}

/// `-` reads the entry text from stdin, resolved against the working directory
fn read_entry(input: &str) -> anyhow::Result<Entry> {
    if input == "-" {
        let mut contents = String::new();
        io::stdin()
            .read_to_string(&mut contents)
            .context("failed to read stdin")?;
        Ok(Entry::Stdin(StdinOptions::new(contents)))
    } else {
        Ok(Entry::File(PathBuf::from(input)))
    }
}

fn run(entry: Entry, args: &BuildArgs, fetcher: UrlFetcher) -> anyhow::Result<BuildResult> {
    let mut options = BuildOptions::new(entry);
    options.format = args.format;
    options.bundle = args.bundle;
    if args.minify {
        options.minify = MinifyOptions::all();
    }
    options.plugins.push(http_plugin(fetcher)?);
    Ok(build(options))
}
