//! Evaluator (spec.md §4.4): validates directive semantics against closed
//! sets of variable names, color words, and theme component names, and
//! applies `set`/`theme` directives to an in-memory `ConfigState`. `map`
//! directives are handed back to the caller rather than applied here,
//! since keymap registration lives in a different crate (DESIGN.md).

use crate::parser::{ConfigError, Directive};
use std::collections::HashMap;

pub const COLOR_WORDS: &[&str] = &[
    "NONE", "BLACK", "RED", "GREEN", "YELLOW", "BLUE", "MAGENTA", "CYAN", "WHITE",
];

pub const THEME_COMPONENTS: &[&str] = &[
    "CommitView.Id",
    "CommitView.Author",
    "CommitView.Date",
    "CommitView.Summary",
    "CommitView.Ref",
    "RefView.Local",
    "RefView.Remote",
    "RefView.Tag",
    "DiffView.Header",
    "DiffView.LineAdded",
    "DiffView.LineRemoved",
    "DiffView.LineContext",
    "StatusBar.Normal",
    "StatusBar.Error",
    "HelpBar.Normal",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ThemeOverride {
    pub name: String,
    pub component: String,
    pub bgcolor: String,
    pub fgcolor: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigState {
    pub variables: HashMap<String, String>,
    pub theme_overrides: Vec<ThemeOverride>,
    /// Theme names seen so far in a `theme <name> ...` directive, plus the
    /// built-in `default` theme. `set theme <name>` is only valid once the
    /// name is a member of this set (spec.md §4.4: "`theme` names an
    /// existing theme").
    pub known_themes: std::collections::HashSet<String>,
    /// The theme named by the most recent successful `set theme <name>`.
    pub active_theme: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Variable { name: String, value: String },
    Theme(ThemeOverride),
    MapRequest { view: String, from: String, to: String },
    /// `theme` is the one variable with registered listeners (spec.md
    /// §4.4/§4.9): on change, this is emitted synchronously alongside the
    /// plain `Variable` entry so the UI can re-initialise its colour pairs.
    ThemeActivated(String),
    Quit,
}

/// Known config variables and a validator for each one's value.
fn validate_variable(
    state: &ConfigState,
    name: &str,
    value: &str,
    line: usize,
    col: usize,
) -> Result<(), ConfigError> {
    match name {
        "tabWidth" => match value.parse::<i64>() {
            Ok(n) if n >= 1 => Ok(()),
            Ok(_) => Err(ConfigError {
                line,
                col,
                message: format!("tabWidth must be >= 1, got {value}"),
            }),
            Err(_) => Err(ConfigError {
                line,
                col,
                message: format!("tabWidth must be an integer, got \"{value}\""),
            }),
        },
        "mouse" | "wrap" | "confirmCheckout" => match value {
            "true" | "false" => Ok(()),
            _ => Err(ConfigError {
                line,
                col,
                message: format!("{name} must be \"true\" or \"false\", got \"{value}\""),
            }),
        },
        "theme" => {
            if value == "default" || state.known_themes.contains(value) {
                Ok(())
            } else {
                Err(ConfigError {
                    line,
                    col,
                    message: format!("Unknown theme \"{value}\""),
                })
            }
        }
        _ => Err(ConfigError {
            line,
            col,
            message: format!("Unknown variable \"{name}\""),
        }),
    }
}

fn validate_color(field: &str, value: &str, line: usize, col: usize) -> Result<(), ConfigError> {
    if COLOR_WORDS.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError {
            line,
            col,
            message: format!("Unknown {field} color \"{value}\""),
        })
    }
}

fn validate_component(value: &str, line: usize, col: usize) -> Result<(), ConfigError> {
    if THEME_COMPONENTS.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError {
            line,
            col,
            message: format!("Unknown theme component \"{value}\""),
        })
    }
}

/// Apply validated directives to `state`, returning every applied change
/// (in order) and every semantic error found. Line/col are best-effort
/// (directives do not currently carry per-field positions; see DESIGN.md).
pub fn apply(state: &mut ConfigState, directives: &[Directive]) -> (Vec<Applied>, Vec<ConfigError>) {
    let mut applied = Vec::new();
    let mut errors = Vec::new();

    // Theme names are registered for the whole batch before anything is
    // validated, so a `set theme <name>` can name a theme defined later in
    // the same file (spec.md §8 scenario 2 loads `set theme dark` ahead of
    // the `theme dark ...` directive that defines it).
    for directive in directives {
        if let Directive::Theme { name, .. } = directive {
            state.known_themes.insert(name.clone());
        }
    }

    for directive in directives {
        match directive {
            Directive::Set { var, value } => {
                match validate_variable(state, var, value, 0, 0) {
                    Ok(()) => {
                        state.variables.insert(var.clone(), value.clone());
                        applied.push(Applied::Variable {
                            name: var.clone(),
                            value: value.clone(),
                        });
                        if var == "theme" {
                            state.active_theme = value.clone();
                            applied.push(Applied::ThemeActivated(value.clone()));
                        }
                    }
                    Err(e) => errors.push(e),
                }
            }
            Directive::Theme {
                name,
                component,
                bgcolor,
                fgcolor,
            } => {
                let mut ok = true;
                if let Err(e) = validate_component(component, 0, 0) {
                    errors.push(e);
                    ok = false;
                }
                if let Err(e) = validate_color("bg", bgcolor, 0, 0) {
                    errors.push(e);
                    ok = false;
                }
                if let Err(e) = validate_color("fg", fgcolor, 0, 0) {
                    errors.push(e);
                    ok = false;
                }
                if ok {
                    let over = ThemeOverride {
                        name: name.clone(),
                        component: component.clone(),
                        bgcolor: bgcolor.clone(),
                        fgcolor: fgcolor.clone(),
                    };
                    state.theme_overrides.push(over.clone());
                    applied.push(Applied::Theme(over));
                }
            }
            Directive::Map { view, from, to } => {
                applied.push(Applied::MapRequest {
                    view: view.clone(),
                    from: from.clone(),
                    to: to.clone(),
                });
            }
            Directive::Quit => applied.push(Applied::Quit),
        }
    }

    (applied, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_width_must_be_positive_integer() {
        let mut state = ConfigState::default();
        let (_applied, errors) = apply(
            &mut state,
            &[Directive::Set {
                var: "tabWidth".into(),
                value: "0".into(),
            }],
        );
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn valid_set_updates_state() {
        let mut state = ConfigState::default();
        let (applied, errors) = apply(
            &mut state,
            &[Directive::Set {
                var: "tabWidth".into(),
                value: "4".into(),
            }],
        );
        assert!(errors.is_empty());
        assert_eq!(applied.len(), 1);
        assert_eq!(state.variables.get("tabWidth"), Some(&"4".to_string()));
    }

    #[test]
    fn set_theme_to_default_is_always_valid() {
        let mut state = ConfigState::default();
        let (applied, errors) = apply(
            &mut state,
            &[Directive::Set {
                var: "theme".into(),
                value: "default".into(),
            }],
        );
        assert!(errors.is_empty());
        assert_eq!(state.active_theme, "default");
        assert!(applied.contains(&Applied::ThemeActivated("default".into())));
    }

    #[test]
    fn set_theme_to_unknown_name_is_rejected() {
        let mut state = ConfigState::default();
        let (_applied, errors) = apply(
            &mut state,
            &[Directive::Set {
                var: "theme".into(),
                value: "dark".into(),
            }],
        );
        assert_eq!(errors.len(), 1);
        assert!(state.active_theme.is_empty());
    }

    #[test]
    fn set_theme_may_forward_reference_a_theme_defined_later_in_the_same_batch() {
        let mut state = ConfigState::default();
        let (applied, errors) = apply(
            &mut state,
            &[
                Directive::Set {
                    var: "theme".into(),
                    value: "dark".into(),
                },
                Directive::Theme {
                    name: "dark".into(),
                    component: "CommitView.Author".into(),
                    bgcolor: "NONE".into(),
                    fgcolor: "MAGENTA".into(),
                },
            ],
        );
        assert!(errors.is_empty());
        assert_eq!(state.active_theme, "dark");
        assert!(applied.contains(&Applied::ThemeActivated("dark".into())));
    }

    #[test]
    fn theme_with_unknown_color_is_rejected() {
        let mut state = ConfigState::default();
        let (applied, errors) = apply(
            &mut state,
            &[Directive::Theme {
                name: "dark".into(),
                component: "CommitView.Author".into(),
                bgcolor: "PURPLE".into(),
                fgcolor: "WHITE".into(),
            }],
        );
        assert_eq!(errors.len(), 1);
        assert!(applied.is_empty());
        assert!(state.theme_overrides.is_empty());
    }

    #[test]
    fn theme_with_unknown_component_is_rejected() {
        let mut state = ConfigState::default();
        let (_applied, errors) = apply(
            &mut state,
            &[Directive::Theme {
                name: "dark".into(),
                component: "CommitView.Bogus".into(),
                bgcolor: "NONE".into(),
                fgcolor: "WHITE".into(),
            }],
        );
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn one_bad_directive_does_not_block_others() {
        let mut state = ConfigState::default();
        let (applied, errors) = apply(
            &mut state,
            &[
                Directive::Set {
                    var: "bogus".into(),
                    value: "1".into(),
                },
                Directive::Set {
                    var: "mouse".into(),
                    value: "false".into(),
                },
            ],
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(applied.len(), 1);
    }
}
