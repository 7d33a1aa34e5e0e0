pub mod app;
pub mod apply;
pub mod diff;
pub mod error;
pub mod export;
pub mod import;
pub mod model;
pub mod navigator;
pub mod session;
pub mod terminal;
pub mod ui;
pub mod utils;

pub use app::{App, AppMode, OutputTarget};
pub use apply::{apply_operations, ApplyOptions, ApplyOutcome, ApplyRequest, FailedOperation};
pub use diff::{compute_diff, CompareBy, DiffOptions, DiffOutcome};
pub use error::{BookmarkError, Result};
pub use import::{load_tree, BookmarkFileFormat};
pub use model::{
    BookmarkNode, BookmarkTree, DiffAction, DiffResult, DiffSummary, DiffType, Origin,
    QueuedDiffOperation, Side,
};
pub use navigator::{DiffFilter, DiffNavigator};
pub use session::Session;
pub use terminal::{TerminalManager, TerminalState};
pub use ui::{centered_rect, draw_ui};
