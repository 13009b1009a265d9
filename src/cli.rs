// ============================================================================
// LayerDoc CLI: headless batch processing via command-line arguments
// ============================================================================
//
// Usage examples:
//   layerdoc --new --script build.rhai --output scene.ldoc
//   layerdoc -i scene.ldoc --script tidy.rhai -o tidy.ldoc --summary
//   layerdoc -i "shots/*.ldoc" --script flatten.rhai --output-dir out/
//
// All processing runs synchronously on the current thread.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::logger;
use crate::project::Project;
use crate::script::run_script;
use crate::settings::Settings;
use crate::{log_err, log_info, log_warn};

/// Extension used for project files.
const PROJECT_EXT: &str = "ldoc";

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// LayerDoc headless layer document processor.
#[derive(Parser, Debug)]
#[command(
    name = "layerdoc",
    about = "LayerDoc headless layer document processor",
    long_about = "Apply Rhai intent scripts to layer documents (.ldoc) without a UI.\n\n\
                  Example:\n  \
                  layerdoc --new --script build.rhai --output scene.ldoc\n  \
                  layerdoc -i \"*.ldoc\" --script tidy.rhai --output-dir out/"
)]
pub struct CliArgs {
    /// Input project file(s). Glob patterns accepted (e.g. "*.ldoc").
    #[arg(short, long, num_args = 1.., required_unless_present = "new", conflicts_with = "new")]
    pub input: Vec<String>,

    /// Start from an empty document instead of reading an input file.
    #[arg(long)]
    pub new: bool,

    /// Rhai script file to run against each document.
    #[arg(short, long, value_name = "SCRIPT.rhai")]
    pub script: Option<PathBuf>,

    /// Output file path. Only valid for a single document.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Print the layer table of each processed document.
    #[arg(long)]
    pub summary: bool,

    /// Print script console output and per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Where a document comes from.
#[derive(Clone, Debug, PartialEq)]
enum Source {
    Empty,
    File(PathBuf),
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all documents succeeded, `1` = one or more failed.
pub fn run(args: CliArgs, settings: &Settings) -> ExitCode {
    if process_all(&args, settings) { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

/// Process every requested document. Returns `true` when all succeeded.
fn process_all(args: &CliArgs, settings: &Settings) -> bool {
    let sources: Vec<Source> = if args.new {
        vec![Source::Empty]
    } else {
        resolve_inputs(&args.input).into_iter().map(Source::File).collect()
    };
    if sources.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return false;
    }

    if sources.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            sources.len()
        );
        return false;
    }

    let script_source: Option<String> = match &args.script {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(src) => Some(src),
            Err(e) => {
                eprintln!("error: could not read script '{}': {}", path.display(), e);
                return false;
            }
        },
        None => None,
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return false;
    }

    if args.verbose
        && let Some(path) = logger::log_path()
    {
        println!("log: {}", path.display());
    }

    let total = sources.len();
    let multi = total > 1;
    let mut any_failure = false;
    let mut written: HashSet<PathBuf> = HashSet::new();

    for (idx, source) in sources.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, source_label(source));
        }
        let file_start = Instant::now();

        let output_path = build_output_path(source, args.output.as_deref(), args.output_dir.as_deref());
        if !written.insert(output_path.clone()) {
            log_warn!("{}: output {} already written in this batch", source_label(source), output_path.display());
            eprintln!(
                "  error: {} was already written by an earlier input, skipping.",
                output_path.display()
            );
            any_failure = true;
            continue;
        }

        match run_one(source, &output_path, script_source.as_deref(), settings, args) {
            Ok(()) => {
                log_info!("Wrote {}", output_path.display());
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                log_err!("{}: {}", source_label(source), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    !any_failure
}

// ============================================================================
// Per-document processing pipeline
// ============================================================================

fn run_one(
    source:   &Source,
    output:   &Path,
    script:   Option<&str>,
    settings: &Settings,
    args:     &CliArgs,
) -> Result<(), String> {
    // -- Step 1: Load ----------------------------------------------------
    let mut project = match source {
        Source::Empty => Project::new_untitled(1, settings),
        Source::File(path) => Project::open(path.clone(), settings)
            .map_err(|e| format!("load failed: {}", e))?,
    };

    // -- Step 2: Apply script (optional) ---------------------------------
    if let Some(src) = script {
        let console = run_script(src, &mut project, settings)
            .map_err(|e| format!("script error:\n{}", e.friendly_message()))?;
        if args.verbose {
            for line in &console {
                println!("  [script] {}", line);
            }
        }
    }

    if args.summary {
        println!("  {} layer(s), front first:", project.document.layers.len());
        for line in project.document.summary_lines() {
            println!("  {}", line);
        }
    }

    // -- Step 3: Save ----------------------------------------------------
    project
        .save_as(output.to_path_buf())
        .map_err(|e| format!("save failed: {}", e))
}

// ============================================================================
// Helpers
// ============================================================================

fn source_label(source: &Source) -> String {
    match source {
        Source::Empty => "(new document)".to_string(),
        Source::File(path) => path.display().to_string(),
    }
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    log_warn!("pattern '{}' matched no files", pattern);
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Path equality that sees through `./` and symlinks when both exist.
fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Compute the output path for one document.
///
/// Priority:
/// 1. `--output` (explicit path)
/// 2. `--output-dir` (derives the file name from the input stem, with an
///    `_out` suffix when that would be the input itself)
/// 3. Next to the input as `<stem>_out.ldoc`, or `untitled.ldoc` for `--new`
fn build_output_path(source: &Source, output: Option<&Path>, output_dir: Option<&Path>) -> PathBuf {
    if let Some(out) = output {
        return out.to_path_buf();
    }

    let (stem, parent) = match source {
        Source::Empty => ("untitled".to_string(), PathBuf::from(".")),
        Source::File(input) => (
            input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "untitled".to_string()),
            input.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(".")),
        ),
    };

    let dir = output_dir.map(Path::to_path_buf).unwrap_or(parent);
    let candidate = dir.join(format!("{}.{}", stem, PROJECT_EXT));
    match source {
        // Never overwrite the input
        Source::File(input) if output_dir.is_none() || same_file(&candidate, input) => {
            dir.join(format!("{}_out.{}", stem, PROJECT_EXT))
        }
        _ => candidate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io;
    use tempfile::TempDir;

    #[test]
    fn output_path_priority() {
        let input = Source::File(PathBuf::from("shots/a.ldoc"));
        assert_eq!(
            build_output_path(&input, Some(Path::new("x.ldoc")), Some(Path::new("out"))),
            PathBuf::from("x.ldoc")
        );
        assert_eq!(
            build_output_path(&input, None, Some(Path::new("out"))),
            PathBuf::from("out/a.ldoc")
        );
        assert_eq!(build_output_path(&input, None, None), PathBuf::from("shots/a_out.ldoc"));
        assert_eq!(build_output_path(&Source::Empty, None, None), PathBuf::from("./untitled.ldoc"));
        assert_eq!(
            build_output_path(&Source::Empty, None, Some(Path::new("out"))),
            PathBuf::from("out/untitled.ldoc")
        );
    }

    #[test]
    fn output_dir_never_targets_the_input() {
        let input = Source::File(PathBuf::from("out/a.ldoc"));
        assert_eq!(
            build_output_path(&input, None, Some(Path::new("out"))),
            PathBuf::from("out/a_out.ldoc")
        );
    }

    #[test]
    fn colliding_batch_outputs_are_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        for (sub, layers) in [("a", 1), ("b", 2)] {
            std::fs::create_dir_all(dir.path().join(sub)).unwrap();
            let mut project = Project::new_untitled(1, &Settings::default());
            for _ in 0..layers {
                let _ = project.dispatch(crate::intent::Intent::AddLayer);
            }
            project.save_as(dir.path().join(sub).join("x.ldoc")).unwrap();
        }

        let a = dir.path().join("a").join("x.ldoc").to_string_lossy().into_owned();
        let b = dir.path().join("b").join("x.ldoc").to_string_lossy().into_owned();
        let out_arg = out.to_string_lossy().into_owned();
        let args = CliArgs::try_parse_from([
            "layerdoc",
            "-i",
            a.as_str(),
            b.as_str(),
            "--output-dir",
            out_arg.as_str(),
        ])
        .unwrap();
        assert!(!process_all(&args, &Settings::default()));

        // The first input's result survives
        let doc = io::load_document(&out.join("x.ldoc")).unwrap();
        assert_eq!(doc.layers.len(), 1);
    }

    #[test]
    fn args_require_input_or_new() {
        assert!(CliArgs::try_parse_from(["layerdoc"]).is_err());
        assert!(CliArgs::try_parse_from(["layerdoc", "--new"]).is_ok());
        assert!(CliArgs::try_parse_from(["layerdoc", "--new", "-i", "a.ldoc"]).is_err());
    }

    #[test]
    fn new_document_with_script_is_written() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("build.rhai");
        std::fs::write(&script, "let a = add_layer(); add_rect(a, 0, 0, 8, 8);").unwrap();
        let out = dir.path().join("scene.ldoc");

        let script_arg = script.to_string_lossy().into_owned();
        let out_arg = out.to_string_lossy().into_owned();
        let args = CliArgs::try_parse_from([
            "layerdoc",
            "--new",
            "--script",
            script_arg.as_str(),
            "--output",
            out_arg.as_str(),
        ])
        .unwrap();
        assert!(process_all(&args, &Settings::default()));

        let doc = io::load_document(&out).unwrap();
        assert_eq!(doc.layers.len(), 1);
        assert_eq!(doc.layers[0].objects.len(), 1);
    }

    #[test]
    fn missing_inputs_fail() {
        let dir = TempDir::new().unwrap();
        let pattern = dir.path().join("*.ldoc").to_string_lossy().into_owned();
        let args = CliArgs::try_parse_from(["layerdoc", "-i", pattern.as_str()]).unwrap();
        assert!(!process_all(&args, &Settings::default()));
    }
}
