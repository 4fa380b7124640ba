use owo_colors::{OwoColorize, Style};
use std::sync::OnceLock;

use crate::ui::Icons;

/// What a piece of terminal text is telling the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Heading,
    Ok,
    Failure,
    Caution,
    Label,
    Faint,
}

impl Tone {
    fn style(self) -> Style {
        match self {
            Tone::Heading => Style::new().cyan().bold(),
            Tone::Ok => Style::new().green().bold(),
            Tone::Failure => Style::new().red().bold(),
            Tone::Caution => Style::new().yellow().bold(),
            Tone::Label => Style::new().blue(),
            Tone::Faint => Style::new().bright_black(),
        }
    }
}

/// Colors only on a terminal, and never with `NO_COLOR` set
fn colors_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        let no_color = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
        !no_color && console::Term::stdout().is_term()
    })
}

fn paint_with(text: &str, tone: Tone, colored: bool) -> String {
    if colored {
        text.style(tone.style()).to_string()
    } else {
        text.to_string()
    }
}

pub fn paint(text: &str, tone: Tone) -> String {
    paint_with(text, tone, colors_enabled())
}

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, paint(text, Tone::Heading));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, paint(label, Tone::Ok));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, paint(label, Tone::Failure));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, paint(label, Tone::Caution));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        paint(Icons::INFO, Tone::Label),
        paint(label, Tone::Faint),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", paint(title, Tone::Heading));
}

pub fn muted(text: &str) -> String {
    paint(text, Tone::Faint)
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", paint(label, Tone::Faint), value);
}
