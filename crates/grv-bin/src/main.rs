//! GRV entrypoint: CLI parsing, logging, channel wiring, and the main
//! event loop driving `Root<Git2Backend>` (spec.md §6).

use std::io::{stdout, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    cursor::MoveTo,
    execute, queue,
    style::{Print, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use grv_events::{
    channels, request_redraw, Action, ErrorMessage, ErrorSource, InputEvent, KeyToken, ModMask,
    NamedKey,
};
use grv_git::Git2Backend;
use grv_keymap::{Binding, Dispatcher, DispatchOutcome, KeymapRegistry, MappingSpec, MappingTrie};
use grv_render::{Attrs as CellAttrs, Color, Prompt, PromptKind, Theme, ThemeComponentId, Window};
use grv_repo::RepositoryData;
use grv_terminal::{CrosstermBackend, TerminalBackend};
use grv_view::{RedrawNotifier, Root, View};

/// Accepted `-logLevel` values (spec.md §6). `None` disables the subscriber
/// entirely rather than installing one at a maximally-quiet filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogLevel {
    Panic,
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
    None,
}

impl LogLevel {
    fn filter(self) -> Option<&'static str> {
        match self {
            LogLevel::Panic | LogLevel::Fatal | LogLevel::Error => Some("error"),
            LogLevel::Warn => Some("warn"),
            LogLevel::Info => Some("info"),
            LogLevel::Debug => Some("debug"),
            LogLevel::None => None,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "PANIC" => LogLevel::Panic,
            "FATAL" => LogLevel::Fatal,
            "ERROR" => LogLevel::Error,
            "WARN" => LogLevel::Warn,
            "INFO" => LogLevel::Info,
            "DEBUG" => LogLevel::Debug,
            "NONE" => LogLevel::None,
            other => return Err(format!("unknown log level \"{other}\"")),
        })
    }
}

/// CLI arguments (spec.md §6).
#[derive(Parser, Debug)]
#[command(name = "grv", version, about = "Interactive git repository browser")]
struct Args {
    #[arg(long = "repoFilePath", default_value = ".")]
    repo_file_path: PathBuf,
    #[arg(long = "logLevel", value_enum, default_value = "NONE")]
    log_level: LogLevel,
    #[arg(long = "logFile", default_value = "grv.log")]
    log_file: PathBuf,
}

impl clap::ValueEnum for LogLevel {
    fn value_variants<'a>() -> &'a [Self] {
        &[
            LogLevel::Panic,
            LogLevel::Fatal,
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::None,
        ]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        let name = match self {
            LogLevel::Panic => "PANIC",
            LogLevel::Fatal => "FATAL",
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::None => "NONE",
        };
        Some(clap::builder::PossibleValue::new(name))
    }
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn configure_logging(&mut self, level: LogLevel, log_file: &Path) -> Result<()> {
        let Some(filter) = level.filter() else {
            return Ok(());
        };
        let dir = log_file.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
        let file_name = log_file.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| "grv.log".to_string());
        let file_appender = tracing_appender::rolling::never(dir, file_name);
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
            .with_writer(nb_writer)
            .try_init()
        {
            Ok(()) => self.log_guard = Some(guard),
            Err(_) => {
                // Global subscriber already installed (e.g. under test harness).
            }
        }
        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                let _ = execute!(
                    stdout(),
                    crossterm::terminal::LeaveAlternateScreen,
                    crossterm::cursor::Show
                );
                let _ = crossterm::terminal::disable_raw_mode();
                default_panic(info);
            }));
        });
    }
}

/// Translate a closed THEME_COMPONENTS name (grv-config) to its render-side
/// `ThemeComponentId`, silently dropping names that have no direct render
/// counterpart (see DESIGN.md's grv-config/grv-render boundary note).
fn theme_component_for(name: &str) -> Option<ThemeComponentId> {
    Some(match name {
        "CommitView.Id" => ThemeComponentId::CommitViewTitle,
        "CommitView.Author" => ThemeComponentId::CommitViewAuthor,
        "CommitView.Date" => ThemeComponentId::CommitViewDate,
        "CommitView.Summary" => ThemeComponentId::CommitViewSummary,
        "CommitView.Ref" => ThemeComponentId::CommitViewRef,
        "RefView.Local" => ThemeComponentId::RefViewLocalBranch,
        "RefView.Remote" => ThemeComponentId::RefViewRemoteBranch,
        "RefView.Tag" => ThemeComponentId::RefViewTag,
        "DiffView.Header" => ThemeComponentId::DiffViewHeader,
        "DiffView.LineAdded" => ThemeComponentId::DiffViewAddedLine,
        "DiffView.LineRemoved" => ThemeComponentId::DiffViewRemovedLine,
        "StatusBar.Normal" => ThemeComponentId::StatusBarNormal,
        "HelpBar.Normal" => ThemeComponentId::HelpBarNormal,
        _ => return None,
    })
}

/// Parse a grvrc key-string (`gg`, `<C-w>`, `<Up>`) into the token sequence
/// the keymap trie indexes on. Mirrors `KeyToken::to_key_string`'s notation
/// in reverse.
fn parse_key_sequence(s: &str) -> Option<Vec<KeyToken>> {
    let mut out = Vec::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '<' {
            let mut name = String::new();
            loop {
                match chars.next() {
                    Some('>') => break,
                    Some(c) => name.push(c),
                    None => return None,
                }
            }
            out.push(parse_angle_token(&name)?);
        } else {
            out.push(KeyToken::Char(c));
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn parse_angle_token(name: &str) -> Option<KeyToken> {
    if let Some(named) = NamedKey::from_str(name) {
        return Some(KeyToken::Named(named));
    }
    let mut mods = ModMask::empty();
    let mut rest = name;
    loop {
        if let Some(r) = rest.strip_prefix("C-") {
            mods |= ModMask::CTRL;
            rest = r;
        } else if let Some(r) = rest.strip_prefix("A-") {
            mods |= ModMask::ALT;
            rest = r;
        } else if let Some(r) = rest.strip_prefix("S-") {
            mods |= ModMask::SHIFT;
            rest = r;
        } else {
            break;
        }
    }
    let mut base_chars = rest.chars();
    let base = base_chars.next()?;
    if base_chars.next().is_some() {
        return None;
    }
    if mods.is_empty() {
        Some(KeyToken::Char(base))
    } else {
        Some(KeyToken::Chord { base, mods })
    }
}

fn crossterm_color(c: Color) -> Option<crossterm::style::Color> {
    use crossterm::style::Color as CC;
    Some(match c {
        Color::None => return None,
        Color::Black => CC::Black,
        Color::Red => CC::Red,
        Color::Green => CC::Green,
        Color::Yellow => CC::Yellow,
        Color::Blue => CC::Blue,
        Color::Magenta => CC::Magenta,
        Color::Cyan => CC::Cyan,
        Color::White => CC::White,
    })
}

/// Paint `window` to the real terminal, one row at a time, re-issuing style
/// commands whenever a cell's style differs from the one preceding it
/// (spec.md §4.6/§4.9). Grounded on the teacher's `core-render::Writer`
/// batched-command shape, adapted to a single present-the-whole-frame path
/// since GRV has no partial-repaint engine.
fn present(window: &Window, theme: &Theme) -> Result<()> {
    let mut out = stdout();
    for row in 0..window.rows {
        queue!(out, MoveTo(0, row), Clear(ClearType::CurrentLine))?;
        let mut col = 0u16;
        while col < window.cols {
            let Some(cell) = window.cell(row, col) else {
                break;
            };
            if !cell.is_leader() {
                col += 1;
                continue;
            }
            let style = theme.component(cell.component);
            queue!(out, SetAttribute(crossterm::style::Attribute::Reset))?;
            if let Some(fg) = crossterm_color(style.fg) {
                queue!(out, SetForegroundColor(fg))?;
            }
            if let Some(bg) = crossterm_color(style.bg) {
                queue!(out, SetBackgroundColor(bg))?;
            }
            if style.attrs.contains(CellAttrs::BOLD) {
                queue!(out, SetAttribute(crossterm::style::Attribute::Bold))?;
            }
            if style.attrs.contains(CellAttrs::DIM) {
                queue!(out, SetAttribute(crossterm::style::Attribute::Dim))?;
            }
            if style.attrs.contains(CellAttrs::REVERSE) {
                queue!(out, SetAttribute(crossterm::style::Attribute::Reverse))?;
            }
            queue!(out, Print(cell.cluster.clone()))?;
            col += cell.width.max(1) as u16;
        }
    }
    out.flush()?;
    Ok(())
}

/// Group a `grvrc` `map` directive's target view name into the keymap
/// registry's trie set; `"All"`/empty applies underneath every view.
fn specs_by_view(applied: &[grv_config::Applied]) -> std::collections::HashMap<String, Vec<MappingSpec>> {
    let mut by_view: std::collections::HashMap<String, Vec<MappingSpec>> = std::collections::HashMap::new();
    for a in applied {
        if let grv_config::Applied::MapRequest { view, from, to } = a {
            let (Some(sequence), Some(expansion)) = (parse_key_sequence(from), parse_key_sequence(to)) else {
                warn!(target: "config", from = %from, to = %to, "unparseable map directive, skipping");
                continue;
            };
            by_view.entry(view.clone()).or_default().push(MappingSpec {
                sequence,
                binding: Binding::Mapping(expansion),
            });
        }
    }
    by_view
}

struct Runtime {
    theme: Theme,
    prompt: Arc<Prompt>,
    history: grv_render::History,
    root: Root<Git2Backend>,
    dispatcher: Dispatcher,
    registry: KeymapRegistry,
    input_rx: grv_events::InputReceiver,
    action_rx: grv_events::ActionReceiver,
    error_rx: grv_events::ErrorReceiver,
    display_rx: grv_events::DisplayReceiver,
    input_task: tokio::task::JoinHandle<()>,
    input_shutdown: grv_input::AsyncInputShutdown,
}

impl Runtime {
    async fn run(&mut self) -> Result<()> {
        self.root.initialise();
        self.redraw()?;

        loop {
            tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    info!(target: "runtime", "ctrl_c_received");
                    break;
                }
                Some(input) = self.input_rx.recv() => {
                    if self.handle_input(input)? {
                        break;
                    }
                }
                Some(action) = self.action_rx.recv() => {
                    if self.dispatch_action(action)? {
                        break;
                    }
                }
                Some(err) = self.error_rx.recv() => {
                    self.root.report_error(&err);
                    self.redraw()?;
                }
                Some(()) = self.display_rx.recv() => {
                    self.redraw()?;
                }
                else => break,
            }
        }

        self.shutdown().await;
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));
        let mut window = Window::new(rows, cols);
        self.root.render(&mut window, &self.theme);
        present(&window, &self.theme)
    }

    /// Returns `true` when the runtime should exit.
    fn handle_input(&mut self, input: InputEvent) -> Result<bool> {
        match input {
            InputEvent::CtrlC => return Ok(true),
            InputEvent::Resize(_, _) => {
                self.redraw()?;
            }
            InputEvent::Key(tok) => {
                if self.prompt.active_kind().is_some() {
                    if self.feed_prompt(tok)? {
                        return Ok(true);
                    }
                    self.redraw()?;
                    return Ok(false);
                }
                let chain = vec![self.root.focused_view_id().to_string()];
                for outcome in self.dispatcher.feed(&self.registry, &chain, tok) {
                    match outcome {
                        DispatchOutcome::Pending => {}
                        DispatchOutcome::Action(action) => {
                            if self.dispatch_action(action)? {
                                return Ok(true);
                            }
                        }
                        DispatchOutcome::Literal(tok) => {
                            self.root.handle_key(&tok.to_key_string());
                        }
                    }
                }
                self.redraw()?;
            }
        }
        Ok(false)
    }

    /// Feed one key token to the active prompt's line editor. Returns
    /// `true` when the runtime should exit (a confirmed `:q`).
    fn feed_prompt(&mut self, tok: KeyToken) -> Result<bool> {
        let kind = self.prompt.active_kind();
        match tok {
            KeyToken::Char(c) => self.prompt.feed_char(c),
            KeyToken::Named(NamedKey::Backspace) => self.prompt.backspace(),
            KeyToken::Named(NamedKey::Esc) => self.prompt.cancel(),
            KeyToken::Named(NamedKey::Return) => {
                if let Some(text) = self.prompt.confirm() {
                    if !text.is_empty() {
                        let _ = self.history.append(&text);
                    }
                    return self.confirm_prompt(kind, text);
                }
            }
            _ => {}
        }
        Ok(false)
    }

    fn confirm_prompt(&mut self, kind: Option<PromptKind>, text: String) -> Result<bool> {
        match kind {
            Some(PromptKind::Command) => {
                let result = grv_config::load(&text);
                for applied in result.applied {
                    match applied {
                        grv_config::Applied::Quit => return Ok(true),
                        grv_config::Applied::Theme(over) => self.apply_theme_override(&over),
                        _ => {}
                    }
                }
                let path = grv_config::config_file_display_path();
                for err in result.errors {
                    self.root.report_error(&ErrorMessage::new(
                        ErrorSource::Config,
                        grv_config::describe_error(&path, &err),
                    ));
                }
            }
            Some(PromptKind::Search) | Some(PromptKind::ReverseSearch) => {
                self.root.handle_action(&Action::Search { pattern: text });
            }
            Some(PromptKind::Filter) => {
                self.root.handle_action(&Action::AddFilter { query: text });
            }
            None => {}
        }
        Ok(false)
    }

    fn apply_theme_override(&mut self, over: &grv_config::ThemeOverride) {
        let Some(id) = theme_component_for(&over.component) else {
            return;
        };
        let fg = Color::from_word(&over.fgcolor).unwrap_or(Color::None);
        let bg = Color::from_word(&over.bgcolor).unwrap_or(Color::None);
        self.theme.set_component(
            id,
            grv_render::ComponentStyle {
                fg,
                bg,
                attrs: CellAttrs::empty(),
            },
        );
    }

    /// Returns `true` when the runtime should exit.
    fn dispatch_action(&mut self, action: Action) -> Result<bool> {
        match action {
            Action::Exit => return Ok(true),
            Action::Prompt => self.prompt.activate(PromptKind::Command),
            Action::SearchPrompt => self.prompt.activate(PromptKind::Search),
            Action::ReverseSearchPrompt => self.prompt.activate(PromptKind::ReverseSearch),
            Action::FilterPrompt => self.prompt.activate(PromptKind::Filter),
            other => {
                self.root.handle_action(&other);
            }
        }
        self.redraw()?;
        Ok(false)
    }

    async fn shutdown(&mut self) {
        info!(target: "runtime.shutdown", "begin");
        self.input_shutdown.signal();
        match tokio::time::timeout(std::time::Duration::from_millis(200), &mut self.input_task).await {
            Ok(Ok(())) => info!(target: "runtime.shutdown", "input_task_joined"),
            Ok(Err(err)) => warn!(target: "runtime.shutdown", ?err, "input_task_join_failed"),
            Err(_) => warn!(target: "runtime.shutdown", "input_task_join_timeout"),
        }
        info!(target: "runtime.shutdown", "complete");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut startup = AppStartup::new();
    startup.configure_logging(args.log_level, &args.log_file)?;
    AppStartup::install_panic_hook();
    info!(target: "runtime", "startup");

    let backend = Git2Backend::open(&args.repo_file_path)
        .with_context(|| format!("failed to open repository at {}", args.repo_file_path.display()))?;
    let repo = RepositoryData::new(backend);

    let mut terminal = CrosstermBackend::new();
    terminal.set_title("grv")?;
    let _guard = terminal.enter_guard()?;

    let ((input_tx, input_rx), (_action_tx, action_rx), (_error_tx, error_rx), (display_tx, display_rx)) = channels();
    let (input_task, input_shutdown) = grv_input::spawn_async_input(input_tx);

    let mut theme = Theme::default_theme();
    let config_result = grv_config::config_file_path()
        .and_then(|p| std::fs::read_to_string(p).ok())
        .map(|source| grv_config::load(&source));

    let mut all_specs = grv_keymap::baseline_all_specs();
    let mut by_view = std::collections::HashMap::new();
    if let Some(result) = &config_result {
        let config_path = grv_config::config_file_display_path();
        for err in &result.errors {
            warn!(
                target: "config",
                error = %grv_config::describe_error(&config_path, err),
                "grvrc directive rejected"
            );
        }
        for applied in &result.applied {
            if let grv_config::Applied::Theme(over) = applied {
                if let Some(id) = theme_component_for(&over.component) {
                    let fg = Color::from_word(&over.fgcolor).unwrap_or(Color::None);
                    let bg = Color::from_word(&over.bgcolor).unwrap_or(Color::None);
                    theme.set_component(
                        id,
                        grv_render::ComponentStyle {
                            fg,
                            bg,
                            attrs: CellAttrs::empty(),
                        },
                    );
                }
            }
        }
        by_view = specs_by_view(&result.applied);
    }
    if let Some(all_for_view) = by_view.remove("All") {
        all_specs.extend(all_for_view);
    }
    let all_trie = MappingTrie::build(all_specs);
    let mut registry = KeymapRegistry::new(all_trie);
    for (view, specs) in by_view {
        registry.register_view(view, MappingTrie::build(specs));
    }

    let prompt = Arc::new(Prompt::new());
    let history = grv_render::History::load(grv_config::history_file_path());

    let notifier: RedrawNotifier = Arc::new(move || request_redraw(&display_tx));

    let root = Root::new(repo, args.repo_file_path.display().to_string(), notifier, Arc::clone(&prompt));

    let mut runtime = Runtime {
        theme,
        prompt,
        history,
        root,
        dispatcher: Dispatcher::new(),
        registry,
        input_rx,
        action_rx,
        error_rx,
        display_rx,
        input_task,
        input_shutdown,
    };

    let result = runtime.run().await;
    drop(startup);
    result
}
