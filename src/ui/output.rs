use crate::kinds::DiagramType;
use crate::ui::{theme, Icons};
use owo_colors::{OwoColorize, Style};

/// What a scan did to a file or package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Added,
    Modified,
    Deleted,
}

impl Change {
    fn icon_and_style(self) -> (&'static str, Style) {
        match self {
            Change::Added => (Icons::NEW, theme().added),
            Change::Modified => (Icons::MOD, theme().changed),
            Change::Deleted => (Icons::DEL, theme().removed),
        }
    }
}

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, text.style(theme().header));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().added));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().changed));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info),
        label.style(theme().dim),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header));
}

pub fn file_change(change: Change, path: &str) {
    let (icon, style) = change.icon_and_style();
    println!("{} {}", icon.style(style), path);
}

pub fn package_change(change: Change, name: &str) {
    let (icon, style) = change.icon_and_style();
    println!("{} {} {}", icon.style(style), Icons::PACKAGE, name.style(theme().package));
}

/// One line of the node tree, indented two spaces per level.
pub fn tree_line(depth: usize, kind: DiagramType, name: &str, is_group: bool) -> String {
    let style = match kind {
        DiagramType::Repository => theme().group,
        DiagramType::Package if is_group => theme().group,
        DiagramType::Package => theme().package,
        DiagramType::Component => theme().component,
        _ => theme().dim,
    };
    format!("{}{} {}", "  ".repeat(depth), Icons::for_node(kind, is_group), name.style(style))
}

pub fn tree_node(depth: usize, kind: DiagramType, name: &str, is_group: bool) {
    println!("{}", tree_line(depth, kind, name, is_group));
}

pub fn timing(elapsed: &str) {
    println!("{} {}", Icons::CLOCK.style(theme().dim), elapsed);
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().dim), value);
}
