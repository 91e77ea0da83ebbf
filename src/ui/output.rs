use crate::ui::{Icons, theme};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::CATALOG, text.style(theme().header.clone()));
}

pub fn status(icon: &str, label: &str, value: &str) {
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

pub fn muted(text: &str) -> String {
    text.style(theme().muted.clone()).to_string()
}

/// `name` and its version after a create or update
pub fn entity_saved(icon: &str, name: &str, version: u64) {
    println!(
        "{} {} {}",
        icon.style(theme().success.clone()),
        name.style(theme().key.clone()),
        muted(&format!("(version {})", version))
    );
}

pub fn entity_deleted(name: &str) {
    println!(
        "{} {}",
        Icons::DEL.style(theme().error.clone()),
        name.style(theme().key.clone())
    );
}

/// One changed field: `label: old -> new`
pub fn change(label: &str, old: &str, new: &str) {
    println!(
        "  {} {}: {} {} {}",
        Icons::MOD.style(theme().warn.clone()),
        label.style(theme().dim.clone()),
        muted(old),
        Icons::RIGHT,
        new
    );
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().dim.clone()), value);
}
