use owo_colors::Style;
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

/// Styles of the CLI output, by what is being shown.
#[derive(Debug, Clone)]
pub struct Theme {
    pub header: Style,
    /// New files and packages, successful steps
    pub added: Style,
    pub removed: Style,
    pub changed: Style,
    pub info: Style,
    pub dim: Style,
    pub group: Style,
    pub package: Style,
    pub component: Style,
}

impl Theme {
    /// Colors on a terminal, plain text when piped.
    pub fn for_terminal(is_term: bool) -> Self {
        if is_term { Self::colored() } else { Self::plain() }
    }

    pub fn colored() -> Self {
        Self {
            header: Style::new().cyan().bold(),
            added: Style::new().green().bold(),
            removed: Style::new().red().bold(),
            changed: Style::new().yellow().bold(),
            info: Style::new().magenta(),
            dim: Style::new().white().dimmed(),
            group: Style::new().blue().bold().underline(),
            package: Style::new().blue().bold(),
            component: Style::new().cyan(),
        }
    }

    pub fn plain() -> Self {
        let none = Style::new();
        Self {
            header: none,
            added: none,
            removed: none,
            changed: none,
            info: none,
            dim: none,
            group: none,
            package: none,
            component: none,
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(|| Theme::for_terminal(console::Term::stdout().is_term()))
}
