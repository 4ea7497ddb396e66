use crate::output::is_quiet;
use crate::ui::{Icons, theme};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}", Icons::ROCKET, text.style(theme().header.clone()));
}

pub fn status(icon: &str, label: &str, value: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}: {}", icon, label.style(theme().dim.clone()), value);
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

pub fn dim(text: &str) -> String {
    text.style(theme().dim.clone()).to_string()
}

pub fn record_created(kind: &str, label: &str) {
    println!("{} {} {}", Icons::NEW.style(theme().success.clone()), kind.style(theme().dim.clone()), label);
}

pub fn record_updated(kind: &str, label: &str) {
    println!("{} {} {}", Icons::MOD.style(theme().warn.clone()), kind.style(theme().dim.clone()), label);
}

pub fn record_deleted(kind: &str, label: &str) {
    println!("{} {} {}", Icons::DEL.style(theme().error.clone()), kind.style(theme().dim.clone()), label);
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().dim.clone()), value);
}
