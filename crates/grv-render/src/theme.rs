//! Theme model (spec.md §4.9): maps a closed set of `ThemeComponentId`s to
//! `(fg, bg, attrs)`. Unset components fall back to the terminal default
//! pair so new entries never break an existing theme.

use crate::window::Attrs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    None,
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl Color {
    pub fn from_word(word: &str) -> Option<Self> {
        Some(match word {
            "NONE" => Color::None,
            "BLACK" => Color::Black,
            "RED" => Color::Red,
            "GREEN" => Color::Green,
            "YELLOW" => Color::Yellow,
            "BLUE" => Color::Blue,
            "MAGENTA" => Color::Magenta,
            "CYAN" => Color::Cyan,
            "WHITE" => Color::White,
            _ => return None,
        })
    }
}

/// The closed set of colourable elements (spec.md §4.9, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThemeComponentId {
    Default,
    CommitViewTitle,
    CommitViewDate,
    CommitViewAuthor,
    CommitViewSummary,
    CommitViewRef,
    RefViewLocalBranch,
    RefViewRemoteBranch,
    RefViewTag,
    DiffViewHeader,
    DiffViewAddedLine,
    DiffViewRemovedLine,
    DiffViewHunkHeader,
    DiffViewStatsFile,
    ErrorViewErrors,
    StatusBarNormal,
    HelpBarNormal,
    AllViewSearchMatch,
}

impl ThemeComponentId {
    /// Iterate the closed set so a driver can configure every pair at
    /// start-up (`GetAllComponents`, spec.md §4.9).
    pub fn all() -> &'static [ThemeComponentId] {
        use ThemeComponentId::*;
        &[
            Default,
            CommitViewTitle,
            CommitViewDate,
            CommitViewAuthor,
            CommitViewSummary,
            CommitViewRef,
            RefViewLocalBranch,
            RefViewRemoteBranch,
            RefViewTag,
            DiffViewHeader,
            DiffViewAddedLine,
            DiffViewRemovedLine,
            DiffViewHunkHeader,
            DiffViewStatsFile,
            ErrorViewErrors,
            StatusBarNormal,
            HelpBarNormal,
            AllViewSearchMatch,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentStyle {
    pub fg: Color,
    pub bg: Color,
    pub attrs: Attrs,
}

impl Default for ComponentStyle {
    fn default() -> Self {
        Self {
            fg: Color::None,
            bg: Color::None,
            attrs: Attrs::empty(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Theme {
    name: String,
    styles: std::collections::HashMap<ThemeComponentId, ComponentStyle>,
}

impl Theme {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            styles: std::collections::HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_component(&mut self, id: ThemeComponentId, style: ComponentStyle) {
        self.styles.insert(id, style);
    }

    /// `GetComponent`: the default `(NONE, NONE, NORMAL)` for anything not
    /// explicitly configured.
    pub fn component(&self, id: ThemeComponentId) -> ComponentStyle {
        self.styles.get(&id).copied().unwrap_or_default()
    }

    /// The default theme (spec.md §6): unlisted components keep the
    /// `ComponentStyle::default()` terminal-default pair.
    pub fn default_theme() -> Self {
        let mut theme = Theme::new("default");
        theme.set_component(
            ThemeComponentId::CommitViewTitle,
            ComponentStyle {
                fg: Color::Cyan,
                bg: Color::None,
                attrs: Attrs::empty(),
            },
        );
        theme.set_component(
            ThemeComponentId::CommitViewDate,
            ComponentStyle {
                fg: Color::Blue,
                bg: Color::None,
                attrs: Attrs::empty(),
            },
        );
        theme.set_component(
            ThemeComponentId::CommitViewAuthor,
            ComponentStyle {
                fg: Color::Green,
                bg: Color::None,
                attrs: Attrs::empty(),
            },
        );
        theme.set_component(
            ThemeComponentId::CommitViewSummary,
            ComponentStyle {
                fg: Color::Yellow,
                bg: Color::None,
                attrs: Attrs::empty(),
            },
        );
        theme.set_component(
            ThemeComponentId::DiffViewAddedLine,
            ComponentStyle {
                fg: Color::Green,
                bg: Color::None,
                attrs: Attrs::empty(),
            },
        );
        theme.set_component(
            ThemeComponentId::DiffViewRemovedLine,
            ComponentStyle {
                fg: Color::Red,
                bg: Color::None,
                attrs: Attrs::empty(),
            },
        );
        theme.set_component(
            ThemeComponentId::ErrorViewErrors,
            ComponentStyle {
                fg: Color::White,
                bg: Color::Red,
                attrs: Attrs::empty(),
            },
        );
        theme.set_component(
            ThemeComponentId::AllViewSearchMatch,
            ComponentStyle {
                fg: Color::None,
                bg: Color::Yellow,
                attrs: Attrs::empty(),
            },
        );
        theme
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_component_falls_back_to_terminal_default() {
        let theme = Theme::new("custom");
        assert_eq!(theme.component(ThemeComponentId::CommitViewTitle), ComponentStyle::default());
    }

    #[test]
    fn default_theme_matches_spec_colours() {
        let theme = Theme::default_theme();
        assert_eq!(theme.component(ThemeComponentId::CommitViewTitle).fg, Color::Cyan);
        assert_eq!(theme.component(ThemeComponentId::DiffViewAddedLine).fg, Color::Green);
        assert_eq!(theme.component(ThemeComponentId::ErrorViewErrors).bg, Color::Red);
    }

    #[test]
    fn all_lists_the_closed_component_set() {
        assert!(ThemeComponentId::all().contains(&ThemeComponentId::RefViewTag));
    }
}
