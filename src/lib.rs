pub mod app;
pub mod args;
pub mod config;
pub mod error;
pub mod events;
pub mod formatting;
mod help;
pub mod logging;
pub mod note;
pub mod notes_db;
pub mod notes_list;
pub mod render;
pub mod search;
pub mod tags;
pub mod terminal;
pub mod ui;

pub mod shared {
    pub mod table;
}

use std::env;
use std::error::Error;
use std::io::{self, Write};

use app::{App, Controller, Prompt, app_dir, home_dir};
use args::{CommonFlags, parse_number};
use config::Config;
use error::NotesError;
use formatting::{FormatContext, human_date};
use logging::LogContext;
use notes_db::NotesDb;
use render::{LinkOutcome, SystemBrowser, render_markdown};
use terminal::{TerminalPrompt, describe_link_outcome, list_table, print_detail, tags_line};
use ui::TextBuffer;

pub fn entry() -> Result<(), Box<dyn Error>> {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        return help::run(Vec::new());
    }

    let cmd = args.remove(0);
    match cmd.as_str() {
        "help" | "-h" | "--help" => help::run(args),
        "path" => {
            let config = Config::load(&app_dir(), &home_dir())?;
            println!("{}", config.db_path.display());
            Ok(())
        }
        "config" => show_config(),
        "list" | "ls" => list_notes(args),
        "show" | "view" => show_note(args),
        "links" => list_links(args),
        "follow" | "open" => follow_link(args),
        "new" | "add" => new_note(args),
        "append" => append_note(args),
        "tag" => tag_note(args),
        "pin" => pin_note(args, true),
        "unpin" => pin_note(args, false),
        "delete" | "rm" => delete_note(args),
        "status" => status(args),
        "browse" => browse(args),
        other => {
            eprintln!("Unknown command: {other}");
            help::run(Vec::new())
        }
    }
}

/// Terminal width in columns, when stdout is a terminal.
pub fn terminal_columns() -> Option<usize> {
    terminal_size::terminal_size().map(|(terminal_size::Width(w), _)| w as usize)
}

fn color_context(plain: bool) -> FormatContext {
    let mut ctx = FormatContext::from_env();
    ctx.use_color &= !plain;
    ctx
}

/// Load the configuration, start logging in the database directory and
/// open the database.
fn start() -> Result<Controller, Box<dyn Error>> {
    let config = Config::load(&app_dir(), &home_dir())?;
    let log = LogContext::init(&config.db_path)?;
    match Controller::start(config, log, None, Box::new(SystemBrowser)) {
        Ok(controller) => Ok(controller),
        Err(err @ NotesError::Read { .. }) => {
            Err(format!("Sync error: {}", err.user_message()).into())
        }
        Err(err) => Err(err.into()),
    }
}

/// Write pending saves, then run the shutdown check.
fn finish(mut controller: Controller) {
    controller.flush_saves();
    let mut prompt = TerminalPrompt::new(FormatContext::from_env());
    controller.shutdown(&mut prompt);
}

fn show_config() -> Result<(), Box<dyn Error>> {
    let config = Config::load(&app_dir(), &home_dir())?;
    let ctx = FormatContext::from_env();
    let mut prompt = TerminalPrompt::new(FormatContext::from_env());
    for warning in config.warnings() {
        prompt.warn(&warning.title, &warning.message);
    }
    if config.files_read.is_empty() {
        println!("{} (none)", ctx.format_header("Files read:"));
    } else {
        println!("{}", ctx.format_header("Files read:"));
        for path in &config.files_read {
            println!("  {}", path.display());
        }
    }
    let width = config.describe().iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    for (key, value) in config.describe() {
        println!("{key:width$} = {value}");
    }
    Ok(())
}

fn list_notes(args: Vec<String>) -> Result<(), Box<dyn Error>> {
    let flags = CommonFlags::parse(args, "list")?;
    if let Some(extra) = flags.positional.first() {
        return Err(format!("Unexpected argument for list: {extra}").into());
    }
    let mut controller = start()?;
    if let Some(search) = &flags.search {
        controller.set_search(search);
    }
    let ctx = color_context(flags.plain);
    if controller.rows().is_empty() {
        if flags.search.is_some() {
            println!("No matching notes.");
        } else {
            println!("No notes yet. Try `nvnotes new \"text\"`.");
        }
    } else {
        let table =
            list_table(controller.rows(), controller.match_pattern(), &ctx, terminal_columns());
        println!("{table}");
    }
    finish(controller);
    Ok(())
}

fn show_note(args: Vec<String>) -> Result<(), Box<dyn Error>> {
    let flags = CommonFlags::parse(args, "show")?;
    let key = flags.key("nvnotes show <key> [-s text] [--render] [--plain]")?;
    let ctx = color_context(flags.plain);
    let mut controller = start()?;
    controller.open_note(&key, flags.search.as_deref().unwrap_or(""));

    let mut out = io::stdout().lock();
    if flags.render && controller.selected_key().is_some() {
        if let Some(header) = terminal::detail_header(&controller, &ctx) {
            writeln!(out, "{header}\n")?;
        }
        let body = render_markdown(controller.detail().buffer().text(), ctx.use_color);
        writeln!(out, "{body}")?;
    } else {
        print_detail(&mut out, &controller, &ctx)?;
    }
    drop(out);
    finish(controller);
    Ok(())
}

fn list_links(args: Vec<String>) -> Result<(), Box<dyn Error>> {
    let flags = CommonFlags::parse(args, "links")?;
    flags.reject_search("links")?;
    let key = flags.key("nvnotes links <key>")?;
    let ctx = color_context(flags.plain);
    let mut controller = start()?;
    if !controller.open_note(&key, "") {
        return Err(format!("Note {key} not found").into());
    }
    let links = controller.detail().links();
    if links.is_empty() {
        println!("No links.");
    }
    for (idx, link) in links.iter().enumerate() {
        println!("{}", ctx.format_link(link.label(), idx + 1));
    }
    finish(controller);
    Ok(())
}

fn follow_link(args: Vec<String>) -> Result<(), Box<dyn Error>> {
    let flags = CommonFlags::parse(args, "follow")?;
    flags.reject_search("follow")?;
    let usage = "nvnotes follow <key> <n>";
    let key = flags.key(usage)?;
    let number = flags.positional.get(1).ok_or_else(|| format!("Usage: {usage}"))?;
    let number = parse_number(number, "link number")?;
    let ctx = color_context(flags.plain);

    let mut controller = start()?;
    if !controller.open_note(&key, "") {
        return Err(format!("Note {key} not found").into());
    }
    let outcome = controller.follow_link(number);
    println!("{}", describe_link_outcome(&outcome));
    if matches!(outcome, LinkOutcome::Note(_)) {
        print_detail(&mut io::stdout().lock(), &controller, &ctx)?;
    }
    finish(controller);
    match outcome {
        LinkOutcome::NoSuchLink => Err(format!("Note {key} has no link {number}").into()),
        _ => Ok(()),
    }
}

fn new_note(args: Vec<String>) -> Result<(), Box<dyn Error>> {
    let flags = CommonFlags::parse(args, "new")?;
    if flags.search.is_some() || flags.render {
        return Err("new takes only text and -t/--tags".into());
    }
    let content = flags.positional.join(" ");
    if content.trim().is_empty() {
        return Err("Provide the note text, e.g. `nvnotes new \"Title\"`".into());
    }
    let mut controller = start()?;
    let key = controller.create_note(&content, flags.tags.as_deref());
    let ctx = color_context(flags.plain);
    let note = controller.note(&key).unwrap_or_default();
    let tags = tags_line(&note.tags, &ctx);
    if tags.is_empty() {
        println!("Created note {}", ctx.format_key(&key));
    } else {
        println!("Created note {} [{tags}]", ctx.format_key(&key));
    }
    finish(controller);
    Ok(())
}

fn append_note(args: Vec<String>) -> Result<(), Box<dyn Error>> {
    let flags = CommonFlags::parse(args, "append")?;
    flags.reject_search("append")?;
    let usage = "nvnotes append <key> <text...>";
    let key = flags.key(usage)?;
    let text = flags.rest_text();
    if text.is_empty() {
        return Err(format!("Usage: {usage}").into());
    }
    let mut controller = start()?;
    let found = controller.append_to_note(&key, &text);
    finish(controller);
    if !found {
        return Err(format!("Note {key} not found").into());
    }
    println!("Updated {key}");
    Ok(())
}

fn tag_note(args: Vec<String>) -> Result<(), Box<dyn Error>> {
    let flags = CommonFlags::parse(args, "tag")?;
    flags.reject_search("tag")?;
    let key = flags.key("nvnotes tag <key> <tags>")?;
    let tags = flags.rest_text();
    let mut controller = start()?;
    let found = controller.set_tags(&key, &tags);
    let note = controller.note(&key);
    finish(controller);
    match note {
        Some(note) if found => {
            let shown = tags_line(&note.tags, &color_context(flags.plain));
            println!("Tags for {key}: {}", if shown.is_empty() { "(none)" } else { &shown });
            Ok(())
        }
        _ => Err(format!("Note {key} not found").into()),
    }
}

fn pin_note(args: Vec<String>, pinned: bool) -> Result<(), Box<dyn Error>> {
    let command = if pinned { "pin" } else { "unpin" };
    let flags = CommonFlags::parse(args, command)?;
    flags.reject_search(command)?;
    let key = flags.key(&format!("nvnotes {command} <key>"))?;
    let mut controller = start()?;
    let found = controller.set_pinned(&key, pinned) && controller.note(&key).is_some();
    finish(controller);
    if !found {
        return Err(format!("Note {key} not found").into());
    }
    println!("{} {key}", if pinned { "Pinned" } else { "Unpinned" });
    Ok(())
}

fn delete_note(args: Vec<String>) -> Result<(), Box<dyn Error>> {
    let flags = CommonFlags::parse(args, "delete")?;
    flags.reject_search("delete")?;
    let key = flags.key("nvnotes delete <key>")?;
    let mut controller = start()?;
    let found = controller.note(&key).is_some() && controller.delete_note(&key);
    finish(controller);
    if !found {
        return Err(format!("Note {key} not found").into());
    }
    println!("Deleted {key}");
    Ok(())
}

fn status(args: Vec<String>) -> Result<(), Box<dyn Error>> {
    if let Some(extra) = args.first() {
        return Err(format!("Unexpected argument for status: {extra}").into());
    }
    let controller = start()?;
    println!("{}", controller.status());
    println!("Database: {}", controller.db().db_path().display());
    if let Some(path) = controller.log().log_path() {
        println!("Log: {}", path.display());
    }
    let newest = controller
        .db()
        .all_notes()
        .into_iter()
        .filter(|n| !n.note.deleted)
        .map(|n| n.note.modifydate)
        .fold(0.0, f64::max);
    if newest > 0.0 {
        println!("Last change: {}", human_date(newest, chrono::Local::now()));
    }
    finish(controller);
    Ok(())
}

fn browse(args: Vec<String>) -> Result<(), Box<dyn Error>> {
    let flags = CommonFlags::parse(args, "browse")?;
    let ctx = color_context(flags.plain);
    let controller = start()?;
    let mut prompt = TerminalPrompt::new(FormatContext::from_env());
    controller.show_startup_warnings(&mut prompt);

    let mut app = App::new(controller);
    if let Some(search) = flags.search {
        app.controller.set_search(&search);
    }
    let stdin = io::stdin();
    let mut out = io::stdout().lock();
    terminal::browse(&mut app, stdin.lock(), &mut out, &ctx, terminal_columns())?;
    drop(out);

    let report = app.controller.shutdown(&mut prompt);
    if !report.is_busy() {
        app.controller.log().in_scope(|| tracing::debug!("browse session closed"));
    }
    Ok(())
}

