//! Rendering primitives, theme model, search overlay, and prompt/history
//! state (spec.md §4.6–§4.9).

pub mod prompt;
pub mod search;
pub mod theme;
pub mod window;

pub use prompt::{History, LineEditor, Prompt, PromptKind};
pub use search::{Direction, LineSource, Search};
pub use theme::{Color, ComponentStyle, Theme, ThemeComponentId};
pub use window::{Attrs, Cell, LineBuilder, Window};
