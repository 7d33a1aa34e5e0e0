use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

use bookdiff::apply::ApplyOptions;
use bookdiff::app::{App, OutputTarget};
use bookdiff::diff::{CompareBy, DiffOptions};
use bookdiff::export::save_tree;
use bookdiff::import::{load_tree_with_format, BookmarkFileFormat};
use bookdiff::model::{BookmarkTree, DiffAction, QueuedDiffOperation, Side};
use bookdiff::session::Session;
use bookdiff::terminal::{ensure_cursor_visible, run_tui, simple_report};

#[derive(Clone, Copy, ValueEnum)]
enum CompareField {
    Title,
    Url,
    Both,
}

impl From<CompareField> for CompareBy {
    fn from(field: CompareField) -> Self {
        match field {
            CompareField::Title => CompareBy::Title,
            CompareField::Url => CompareBy::Url,
            CompareField::Both => CompareBy::Both,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SyncDirection {
    LeftToRight,
    RightToLeft,
}

impl SyncDirection {
    fn action(self) -> DiffAction {
        match self {
            SyncDirection::LeftToRight => DiffAction::CopyLeftToRight,
            SyncDirection::RightToLeft => DiffAction::CopyRightToLeft,
        }
    }
}

#[derive(Parser)]
#[command(name = "bookdiff")]
#[command(about = "Compare and reconcile two browser bookmark files")]
struct Args {
    #[arg(help = "Left bookmark file (HTML or JSON)")]
    left: PathBuf,

    #[arg(help = "Right bookmark file (HTML or JSON)")]
    right: PathBuf,

    #[arg(long, help = "Use simple text output instead of TUI")]
    simple: bool,

    #[arg(short, long, help = "Enable verbose logging to bookdiff.log")]
    verbose: bool,

    #[arg(long, help = "Report bookmarks sharing a URL within one file")]
    duplicates: bool,

    #[arg(
        long,
        value_enum,
        default_value = "both",
        help = "Fields that must match for two nodes to be equal"
    )]
    compare_by: CompareField,

    #[arg(long, help = "Compare titles, URLs and paths case-sensitively")]
    case_sensitive: bool,

    #[arg(long, value_enum, help = "Copy every difference in one direction without the TUI")]
    sync: Option<SyncDirection>,

    #[arg(long, help = "Where to write the left tree")]
    output_left: Option<PathBuf>,

    #[arg(long, help = "Where to write the right tree")]
    output_right: Option<PathBuf>,

    #[arg(long, value_enum, help = "Output format (defaults to the input's format)")]
    format: Option<BookmarkFileFormat>,

    #[arg(long, help = "Pretty-print JSON output")]
    pretty: bool,
}

impl Args {
    fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            include_duplicates: self.duplicates,
            compare_by: self.compare_by.into(),
            case_sensitive: self.case_sensitive,
            ..DiffOptions::default()
        }
    }

    fn output_target(&self, side: Side, input_format: BookmarkFileFormat) -> Option<OutputTarget> {
        let path = match side {
            Side::Left => self.output_left.clone(),
            Side::Right => self.output_right.clone(),
        }?;
        Some(OutputTarget {
            path,
            format: self.format.unwrap_or(input_format),
            pretty: self.pretty,
        })
    }
}

fn load(path: &Path, side: Side) -> Result<(BookmarkTree, BookmarkFileFormat)> {
    load_tree_with_format(path, side).with_context(|| format!("Failed to load {}", path.display()))
}

fn run_sync(
    args: &Args,
    direction: SyncDirection,
    session: &mut Session,
    formats: [BookmarkFileFormat; 2],
) -> Result<()> {
    let diff_options = args.diff_options();
    let action = direction.action();
    let outcome = session.compute_diff(&diff_options)?;
    let operations: Vec<QueuedDiffOperation> = outcome
        .diffs
        .into_iter()
        .filter(|diff| diff.offers(action))
        .map(|diff| QueuedDiffOperation::new(diff, action))
        .collect();

    let options = ApplyOptions {
        diff_options,
        recompute_diff: true,
        ..ApplyOptions::default()
    };
    let applied = session.apply(&operations, &options)?;

    println!(
        "Applied {} operation(s), {} failed",
        applied.applied.len(),
        applied.failed.len()
    );
    for failure in &applied.failed {
        eprintln!(
            "  {} {}: {}",
            failure.operation.action,
            failure.operation.diff.display_path(),
            failure.error
        );
    }
    if let Some(summary) = applied.summary {
        println!("Remaining differences: {}", summary.total);
    }

    for (side, format) in [(Side::Left, formats[0]), (Side::Right, formats[1])] {
        let (Some(target), Some(tree)) = (args.output_target(side, format), session.tree(side))
        else {
            continue;
        };
        save_tree(&target.path, tree, target.format, target.pretty)
            .with_context(|| format!("Failed to write {}", target.path.display()))?;
        println!("Wrote {} tree to {}", side, target.path.display());
    }

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    bookdiff::utils::init_logging(args.verbose);

    let (left, left_format) = load(&args.left, Side::Left)?;
    let (right, right_format) = load(&args.right, Side::Right)?;
    let mut session = Session::with_trees(left, right);

    if let Some(direction) = args.sync {
        return run_sync(&args, direction, &mut session, [left_format, right_format]);
    }

    let left_label = args.left.display().to_string();
    let right_label = args.right.display().to_string();
    let diff_options = args.diff_options();

    if args.simple {
        let outcome = session.compute_diff(&diff_options)?;
        return simple_report(&left_label, &right_label, &outcome);
    }

    let left_target = args.output_target(Side::Left, left_format).unwrap_or(OutputTarget {
        path: args.left.clone(),
        format: args.format.unwrap_or(left_format),
        pretty: args.pretty,
    });
    let right_target = args.output_target(Side::Right, right_format).unwrap_or(OutputTarget {
        path: args.right.clone(),
        format: args.format.unwrap_or(right_format),
        pretty: args.pretty,
    });

    let app = App::new(session.clone(), diff_options.clone())?
        .with_labels(left_label.clone(), right_label.clone())
        .with_outputs(left_target, right_target);

    let result = match run_tui(app) {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("TUI Error: {}", e);
            eprintln!("No usable terminal. Falling back to the text report...");
            let outcome = session.compute_diff(&diff_options)?;
            simple_report(&left_label, &right_label, &outcome)
        }
    };

    ensure_cursor_visible();

    result
}
