mod generate;

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::generate::{run_generate, run_regions, GenerateArgs, RegionSource};

const HANDLER_PACKAGE: &str = "regional_stack_lambda";
const HANDLER_BIN: &str = "regional_stack_handler";
const HANDLER_ZIP: &str = "regionalcfn.zip";

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the regional stack workspace",
    long_about = "Generates the fan-out deployment document, packages the backing\n\
                  handler, and runs CI checks for the regional stack workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the deployment document with one child per region
    Generate(GenerateArgs),
    /// Print the resolved region list
    Regions(RegionSource),
    /// Build the handler and package it as a Lambda zip
    PackageHandler {
        /// Compilation target triple for the handler binary
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for the binary
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
        /// Directory the zip is written to
        #[arg(long, default_value = "dist")]
        dist_dir: String,
    },
    /// Run CI checks (fmt, clippy, tests)
    Ci,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to execute cargo")
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn package_handler(target: &str, profile: BuildProfile, dist_dir: &str) {
    step("Build regional stack handler");

    let mut cargo_args = vec![
        "build",
        "-p",
        HANDLER_PACKAGE,
        "--target",
        target,
        "--bin",
        HANDLER_BIN,
    ];
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args);

    step("Package handler zip");
    let binary_path = Path::new("target")
        .join(target)
        .join(profile.dir_name())
        .join(HANDLER_BIN);
    let dist_dir = Path::new(dist_dir);
    fs::create_dir_all(dist_dir).expect("failed to create dist directory");

    let zip_path = dist_dir.join(HANDLER_ZIP);
    package_lambda_zip(&binary_path, &zip_path);

    eprintln!(
        "\nPackaged artifact:\n- {}\nUpload it under the handler code key of the source bucket.",
        zip_path.display()
    );
}

/// The provided runtimes start the archive entry named `bootstrap`.
fn package_lambda_zip(binary_path: &Path, zip_path: &Path) {
    if !binary_path.exists() {
        panic!("expected handler binary at '{}'", binary_path.display());
    }

    let binary = fs::read(binary_path).expect("failed to read handler binary");
    let file = fs::File::create(zip_path).expect("failed to create handler zip");
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file("bootstrap", options)
        .expect("failed to start bootstrap entry in handler zip");
    zip.write_all(&binary)
        .expect("failed to write bootstrap entry");
    zip.finish().expect("failed to finish handler zip");
}

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test workspace");
    run_cargo(&["test", "--workspace"]);
}

fn exit_on_error(result: Result<(), String>) {
    if let Err(message) = result {
        eprintln!("error: {message}");
        exit(1);
    }
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => exit_on_error(run_generate(&args)),
        Commands::Regions(source) => exit_on_error(run_regions(&source)),
        Commands::PackageHandler {
            target,
            profile,
            dist_dir,
        } => package_handler(&target, profile, &dist_dir),
        Commands::Ci => {
            ci_check();
            eprintln!("\nCI job passed.");
        }
    }
}
