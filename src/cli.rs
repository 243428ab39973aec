// ============================================================================
// DATMant CLI: annotation status report via command-line arguments
// ============================================================================
//
// Usage examples:
//   datmant --input /data/frames                 (every orthoframe in a folder)
//   datmant -i /data/frames/F00*.marked.jpg      (glob over marked images)
//   datmant -i day1/ day2/ --verbose             (also list companion files)
//
// No GUI is opened in CLI mode. Nothing is written; the report only reads
// which companion files exist.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use crate::io::{self, CompanionFiles, ImageStatus, CUT_MARKED_SUFFIX, MARKED_SUFFIX};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// DATMant headless status report.
#[derive(Parser, Debug)]
#[command(
    name = "datmant",
    about = "DATMant orthoframe annotation status report",
    long_about = "List road orthoframes and how far their annotation has progressed\n\
                  without opening the GUI. An input may be a folder or a glob over\n\
                  NAME.marked.jpg files.\n\n\
                  Example:\n  \
                  datmant --input /data/frames\n  \
                  datmant -i \"/data/frames/*.marked.jpg\" --verbose"
)]
pub struct CliArgs {
    /// Folder(s) or glob pattern(s) selecting orthoframes.
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Also print which companion files exist for each orthoframe.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i")
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Print the status report and return an OS exit code.
/// `0` = at least one orthoframe listed, `1` = nothing matched.
pub fn run(args: CliArgs) -> ExitCode {
    let frames = resolve_inputs(&args.input);
    if frames.is_empty() {
        eprintln!("error: no orthoframes matched the given input(s).");
        return ExitCode::FAILURE;
    }

    let mut counts = [0usize; 3];
    for files in &frames {
        let status = files.status();
        counts[match status {
            ImageStatus::Processed => 0,
            ImageStatus::SeenBefore => 1,
            ImageStatus::New => 2,
        }] += 1;

        println!("{:<12} {}", status.label(), files.dir().join(files.name()).display());
        if args.verbose {
            for (label, path) in files.all() {
                let mark = if path.exists() { "x" } else { " " };
                println!("    [{}] {:<12} {}", mark, label, path.display());
            }
        }
    }

    println!(
        "{} orthoframes: {} processed, {} seen before, {} new",
        frames.len(),
        counts[0],
        counts[1],
        counts[2]
    );
    ExitCode::SUCCESS
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand folders and glob patterns into orthoframes, in input order without
/// duplicates.
fn resolve_inputs(patterns: &[String]) -> Vec<CompanionFiles> {
    let mut result: Vec<CompanionFiles> = Vec::new();
    let mut push = |files: CompanionFiles| {
        if !result.contains(&files) {
            result.push(files);
        }
    };

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.is_dir() {
            match io::list_orthoframes(as_path) {
                Ok(names) => {
                    if names.is_empty() {
                        eprintln!("warning: folder '{}' holds no orthoframes.", pattern);
                    }
                    for name in names {
                        push(CompanionFiles::new(as_path, name));
                    }
                }
                Err(e) => eprintln!("warning: {}", e),
            }
            continue;
        }

        // Literal file or glob pattern over marked images
        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if let Some(files) = companion_of(&entry) {
                        push(files);
                        matched = true;
                    }
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no orthoframes.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Companion set of a `NAME.marked.jpg` path; other files are skipped.
fn companion_of(path: &Path) -> Option<CompanionFiles> {
    let file = path.file_name()?.to_str()?;
    if !file.ends_with(MARKED_SUFFIX) || file.ends_with(CUT_MARKED_SUFFIX) {
        return None;
    }
    let name = file.split('.').next().filter(|n| !n.is_empty())?;
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    Some(CompanionFiles::new(dir, name))
}
