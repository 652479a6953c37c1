//! # RateCalc CLI
//!
//! Command-line front end for `rate_core`. Every invocation loads the store,
//! applies one command, and exits; the session saves after each mutation.
//!
//! Panels and rows are addressed by 1-based position (as shown by `show`)
//! or by id.
//!
//! ```text
//! ratecalc show
//! ratecalc row set 1 1 basicRate 250
//! ratecalc commission rates 1 "1.5" "10 + 2"
//! ratecalc export 1
//! ```

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use rate_core::export::{format_result, Clipboard, PanelTable};
use rate_core::model::{CommissionMode, Panel, RowField};
use rate_core::{parse_formula, AppState, FileStore, RateError, RateResult, Session, Theme};

#[derive(Parser)]
#[command(name = "ratecalc", version, about = "Rate and pricing calculator")]
struct Cli {
    /// Store file holding panels and preferences
    #[arg(long, env = "RATECALC_STORE", default_value = "ratecalc.json", global = true)]
    store: PathBuf,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show all panels, or one
    Show {
        panel: Option<String>,
        /// Print the table view as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage panels
    #[command(subcommand)]
    Panel(PanelCommand),
    /// Manage rows of a panel
    #[command(subcommand)]
    Row(RowCommand),
    /// Configure how a panel derives commissions
    #[command(subcommand)]
    Commission(CommissionCommand),
    /// Evaluate a formula without applying it
    Eval { formula: String },
    /// Print a panel as tab-separated text for pasting into a spreadsheet
    Export { panel: String },
    /// Switch the colour theme
    #[command(subcommand)]
    Theme(ThemeCommand),
    /// Set the UI scale (clamped to 0.5 - 1.2)
    Scale { value: f64 },
    /// Clear all stored data
    Reset {
        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum PanelCommand {
    /// List panels
    List,
    /// Add an empty panel
    Add,
    /// Rename a panel
    Rename { panel: String, name: String },
    /// Rename the freight column labels
    Labels {
        panel: String,
        #[arg(long)]
        freight: Option<String>,
        #[arg(long)]
        freight2: Option<String>,
    },
    /// Delete a panel and all of its rows
    Delete {
        panel: String,
        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum RowCommand {
    /// Append a blank row
    Add { panel: String },
    /// Set one field; an empty value clears it
    Set {
        panel: String,
        row: String,
        /// basicRate, discount, taxPercent, commission, freight or freight2
        field: String,
        #[arg(default_value = "", allow_hyphen_values = true)]
        value: String,
    },
    /// Delete a row
    Delete { panel: String, row: String },
    /// Copy the first row's value into the empty cells below it
    Fill { panel: String, field: String },
}

#[derive(Subcommand)]
enum CommissionCommand {
    /// Derive commissions from two rates (each may be a formula)
    Rates { panel: String, rate1: String, rate2: String },
    /// Put the result of a formula into the first row's commission
    Formula { panel: String, formula: String },
    /// Stop deriving commissions; keep current values
    Manual { panel: String },
}

#[derive(Subcommand)]
enum ThemeCommand {
    Toggle,
    Dark,
    Light,
}

/// Writes exported text to stdout.
struct StdoutClipboard;

impl Clipboard for StdoutClipboard {
    fn copy_text(&mut self, text: &str) -> bool {
        let mut stdout = io::stdout().lock();
        stdout.write_all(text.as_bytes()).and_then(|_| stdout.flush()).is_ok()
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn confirm(prompt: &str) -> bool {
    print!("{} [y/N]: ", prompt);
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut input = String::new();
    if io::stdin().lock().read_line(&mut input).is_err() {
        return false;
    }

    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Resolve a 1-based position or an id to a panel id.
fn resolve_panel(state: &AppState, key: &str) -> RateResult<String> {
    if let Ok(position) = key.parse::<usize>() {
        if let Some(panel) = position.checked_sub(1).and_then(|i| state.panels.get(i)) {
            return Ok(panel.id.clone());
        }
    }
    state
        .panels
        .iter()
        .find(|p| p.id == key)
        .map(|p| p.id.clone())
        .ok_or_else(|| RateError::panel_not_found(key))
}

/// Resolve a 1-based position or an id to a row id within `panel`.
fn resolve_row(panel: &Panel, key: &str) -> RateResult<String> {
    if let Ok(position) = key.parse::<usize>() {
        if let Some(row) = position.checked_sub(1).and_then(|i| panel.rows.get(i)) {
            return Ok(row.id.clone());
        }
    }
    panel
        .row(key)
        .map(|r| r.id.clone())
        .ok_or_else(|| RateError::row_not_found(&panel.id, key))
}

fn mode_label(panel: &Panel) -> String {
    match panel.mode() {
        CommissionMode::Rates(s) => format!("rates {}% / {}%", s.rate1, s.rate2),
        CommissionMode::Formula => match &panel.commission_formula {
            Some(formula) => format!("formula: {}", formula),
            None => "manual".to_string(),
        },
    }
}

fn print_panel(position: usize, panel: &Panel) {
    let table = PanelTable::from_panel(panel);

    let mut header = vec!["#".to_string()];
    header.extend(table.headers.iter().cloned());
    let lines: Vec<Vec<String>> = table
        .rows
        .iter()
        .enumerate()
        .map(|(i, cells)| {
            let mut line = vec![(i + 1).to_string()];
            line.extend(cells.iter().cloned());
            line
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for line in &lines {
        for (w, cell) in widths.iter_mut().zip(line) {
            *w = (*w).max(cell.chars().count());
        }
    }
    let render = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:>width$}", c, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
    };

    println!("═══════════════════════════════════════");
    println!("  [{}] {} ({})", position, table.title, mode_label(panel));
    println!("═══════════════════════════════════════");
    println!("{}", render(&header));
    for line in &lines {
        println!("{}", render(line));
    }
    println!("  Total: {}", table.total);
    println!();
}

fn run(cli: Cli) -> RateResult<()> {
    // Formula preview needs no stored state
    if let Commands::Eval { formula } = &cli.command {
        let result = parse_formula(formula).map_err(|e| RateError::invalid_formula(formula.as_str(), e.to_string()))?;
        println!("{}", result);
        return Ok(());
    }

    log::debug!("Using store {}", cli.store.display());
    let mut session = Session::load(FileStore::open(&cli.store)?)?;

    match cli.command {
        Commands::Show { panel, json } => {
            let selected: Vec<(usize, &Panel)> = match panel {
                Some(key) => {
                    let id = resolve_panel(session.state(), &key)?;
                    let position = session.state().panels.iter().position(|p| p.id == id).unwrap_or(0);
                    vec![(position + 1, session.panel(&id)?)]
                }
                None => session.state().panels.iter().enumerate().map(|(i, p)| (i + 1, p)).collect(),
            };

            if json {
                let tables: Vec<PanelTable> = selected.iter().map(|(_, p)| PanelTable::from_panel(p)).collect();
                println!("{}", serde_json::to_string_pretty(&tables)?);
            } else if selected.is_empty() {
                println!("No panels. Add one with `ratecalc panel add`.");
            } else {
                for (position, panel) in selected {
                    print_panel(position, panel);
                }
            }
        }

        Commands::Panel(command) => match command {
            PanelCommand::List => {
                for (i, panel) in session.state().panels.iter().enumerate() {
                    println!("{:>3}  {}  {} row(s)  {}  [{}]", i + 1, panel.name, panel.rows.len(), mode_label(panel), panel.id);
                }
            }
            PanelCommand::Add => {
                let id = session.add_panel()?;
                println!("Added {} [{}]", session.panel(&id)?.name, id);
            }
            PanelCommand::Rename { panel, name } => {
                let id = resolve_panel(session.state(), &panel)?;
                session.rename_panel(&id, &name)?;
                println!("Renamed to {}", name);
            }
            PanelCommand::Labels {
                panel,
                freight,
                freight2,
            } => {
                let id = resolve_panel(session.state(), &panel)?;
                session.rename_freight_columns(&id, freight.as_deref(), freight2.as_deref())?;
                let panel = session.panel(&id)?;
                println!("Freight columns: {} / {}", panel.freight_name, panel.freight2_name);
            }
            PanelCommand::Delete { panel, yes } => {
                let id = resolve_panel(session.state(), &panel)?;
                let target = session.panel(&id)?;
                let prompt = format!("Delete panel '{}' and its {} row(s)?", target.name, target.rows.len());
                if yes || confirm(&prompt) {
                    let removed = session.delete_panel(&id)?;
                    println!("Deleted {}", removed.name);
                } else {
                    println!("Cancelled");
                }
            }
        },

        Commands::Row(command) => match command {
            RowCommand::Add { panel } => {
                let id = resolve_panel(session.state(), &panel)?;
                let row_id = session.add_row(&id)?;
                println!("Added row {} [{}]", session.panel(&id)?.rows.len(), row_id);
            }
            RowCommand::Set {
                panel,
                row,
                field,
                value,
            } => {
                let field: RowField = field.parse()?;
                let id = resolve_panel(session.state(), &panel)?;
                let row_id = resolve_row(session.panel(&id)?, &row)?;
                session.update_field(&id, &row_id, field, &value)?;

                let row = session.row(&id, &row_id)?;
                println!("Commission: {}  Result: {}", row.commission, format_result(row.result()));
            }
            RowCommand::Delete { panel, row } => {
                let id = resolve_panel(session.state(), &panel)?;
                let row_id = resolve_row(session.panel(&id)?, &row)?;
                session.delete_row(&id, &row_id)?;
                println!("Deleted row");
            }
            RowCommand::Fill { panel, field } => {
                let field: RowField = field.parse()?;
                let id = resolve_panel(session.state(), &panel)?;
                let filled = session.fill_column(&id, field)?;
                println!("Filled {} cell(s) of {}", filled, field);
            }
        },

        Commands::Commission(command) => match command {
            CommissionCommand::Rates { panel, rate1, rate2 } => {
                let id = resolve_panel(session.state(), &panel)?;
                let settings = session.set_commission_rates(&id, &rate1, &rate2)?;
                println!("Commission rates set to {}% / {}%", settings.rate1, settings.rate2);
            }
            CommissionCommand::Formula { panel, formula } => {
                let id = resolve_panel(session.state(), &panel)?;
                match session.apply_commission_formula(&id, &formula)? {
                    Some(result) => println!("Commission set to {}", result),
                    None => println!("Empty formula, nothing applied"),
                }
            }
            CommissionCommand::Manual { panel } => {
                let id = resolve_panel(session.state(), &panel)?;
                session.clear_commission_settings(&id)?;
                println!("Commissions are now entered manually");
            }
        },

        Commands::Eval { .. } => {}

        Commands::Export { panel } => {
            let id = resolve_panel(session.state(), &panel)?;
            if !session.copy_panel(&id, &mut StdoutClipboard)? {
                return Err(RateError::storage("export", "stdout", "could not write output"));
            }
        }

        Commands::Theme(command) => {
            let theme = match command {
                ThemeCommand::Toggle => session.toggle_theme()?,
                ThemeCommand::Dark => {
                    session.set_theme(Theme::Dark)?;
                    Theme::Dark
                }
                ThemeCommand::Light => {
                    session.set_theme(Theme::Light)?;
                    Theme::Light
                }
            };
            println!("Theme: {}", theme);
        }

        Commands::Scale { value } => {
            let stored = session.set_ui_scale(value)?;
            println!("UI scale: {}", stored);
        }

        Commands::Reset { yes } => {
            if yes || confirm("Clear all panels and preferences?") {
                session.reset()?;
                println!("Reset to defaults");
            } else {
                println!("Cancelled");
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let verbose = cli.verbose > 0;

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if e.is_recoverable() {
                eprintln!("The store is busy; try again in a moment.");
            }
            if verbose {
                if let Ok(json) = serde_json::to_string_pretty(&e) {
                    eprintln!();
                    eprintln!("Error JSON:");
                    eprintln!("{}", json);
                }
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_resolve_by_position_or_id() {
        let mut state = AppState::default();
        let second = state.add_panel();

        assert_eq!(resolve_panel(&state, "2").unwrap(), second);
        assert_eq!(resolve_panel(&state, &second).unwrap(), second);
        assert!(resolve_panel(&state, "0").is_err());
        assert!(resolve_panel(&state, "3").is_err());

        let panel = &state.panels[0];
        let row_id = panel.rows[0].id.clone();
        assert_eq!(resolve_row(panel, "1").unwrap(), row_id);
        assert_eq!(resolve_row(panel, &row_id).unwrap(), row_id);
        assert_eq!(resolve_row(panel, "2").unwrap_err().error_code(), "ROW_NOT_FOUND");
    }

    #[test]
    fn test_parse_row_set() {
        let cli = Cli::try_parse_from(["ratecalc", "--store", "x.json", "row", "set", "1", "2", "discount", "-5"]).unwrap();
        match cli.command {
            Commands::Row(RowCommand::Set { field, value, .. }) => {
                assert_eq!(field, "discount");
                assert_eq!(value, "-5");
            }
            _ => panic!("expected row set"),
        }
    }

    #[test]
    fn test_mode_label() {
        let mut panel = Panel::new("P");
        assert_eq!(mode_label(&panel), "rates 1.5% / 12%");
        panel.clear_commission_settings();
        assert_eq!(mode_label(&panel), "manual");
        panel.commission_formula = Some("2 + 2".to_string());
        assert_eq!(mode_label(&panel), "formula: 2 + 2");
    }
}
