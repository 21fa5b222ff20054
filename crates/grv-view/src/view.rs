//! The `View` trait every view hierarchy node implements (spec.md §4.6).

use grv_events::Action;
use grv_render::{LineBuilder, Theme, Window};

pub trait View {
    fn view_id(&self) -> &'static str;
    fn initialise(&mut self) {}
    fn render(&mut self, window: &mut Window, theme: &Theme);
    /// Returns true if this view consumed the key itself (dispatch falls
    /// back to the parent view otherwise, never to siblings).
    fn handle_key(&mut self, keystring: &str) -> bool;
    fn handle_action(&mut self, action: &Action) -> bool;
    fn on_active_change(&mut self, _active: bool) {}
    fn render_status_bar<'w>(&self, line: LineBuilder<'w>, theme: &Theme) -> LineBuilder<'w> {
        let _ = theme;
        line
    }
    fn render_help_bar<'w>(&self, line: LineBuilder<'w>, theme: &Theme) -> LineBuilder<'w> {
        let _ = theme;
        line
    }
}
