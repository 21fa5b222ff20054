//! View layer (spec.md §4.6): scroll geometry, the `View` trait, the
//! concrete RefView/CommitView/DiffView, status/help/error chrome, and the
//! root view composing them into the default/column layouts.

pub mod commit_view;
pub mod diff_view;
pub mod pos;
pub mod ref_view;
pub mod root;
pub mod status_bar;
pub mod view;

pub use commit_view::CommitView;
pub use diff_view::{DiffHeader, DiffLineType, DiffView};
pub use pos::{compute_view_start_row, ViewPos};
pub use ref_view::RefView;
pub use root::{LayoutMode, RedrawNotifier, Root};
pub use status_bar::{ErrorOverlay, HelpBar, StatusBar};
pub use view::View;
