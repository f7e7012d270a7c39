use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use clap::Parser;
use image_inspect::{BoxError, DockerCli, EventHandler, ImageDescription, Inspector};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// Directory to extract the image.
    #[arg(short, long)]
    root: PathBuf,

    /// Program compatible with the `docker` CLI.
    #[arg(long, default_value = "docker")]
    program: String,

    /// Inspect an archive generated by `docker save`, instead of
    /// pulling the image.
    #[arg(short, long)]
    archive: Option<PathBuf>,

    /// Maximum size, in bytes, of a single file.
    #[arg(long)]
    max_file_size: Option<u64>,

    /// Print the image description as JSON.
    #[arg(long)]
    json: bool,

    /// Image reference.
    image: String,
}

struct Logger;

impl EventHandler for Logger {
    fn image_saved(&self, reference: &str, path: &Path) {
        println!("SAVE {reference} {}", path.display());
    }

    fn archive_start(&self, path: &Path, depth: usize) {
        println!("EXTRACT [{depth}] {}", path.display());
    }

    fn entry_skipped(&self, path: &Path, cause: &dyn Display) {
        println!("SKIP {}: {cause}", path.display());
    }
}

fn print_summary(image: &ImageDescription, json: bool) -> Result<(), BoxError> {
    if json {
        println!("{}", serde_json::to_string_pretty(image)?);
    } else {
        println!("{}: {}/{}", image.name, image.os, image.architecture);
        println!("  tags: {}", image.repo_tags.join(", "));
        println!("  files: {}", image.files.len());
        println!("  dirs: {}", image.dirs.len());
    }

    Ok(())
}

fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut inspector = Inspector::new(&args.root).event_handler(Logger);
    if let Some(max) = args.max_file_size {
        inspector = inspector.max_file_size(max);
    }

    match &args.archive {
        Some(archive) => {
            let image = inspector.inspect_archive(&args.image, archive)?;
            print_summary(&image, args.json)?;
        }

        None => {
            let source = DockerCli::new().with_program(&args.program);
            inspector.inspect(&args.image, &source, &mut |image: &ImageDescription| {
                print_summary(image, args.json)
            })?;
        }
    }

    Ok(())
}
