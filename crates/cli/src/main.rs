// dbforestale CLI - forest parcel records with derived fields

mod exit_codes;
mod render;
mod session;
mod util;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::json;

use dbforestale_config::{Session, Settings, StorageBackend};
use dbforestale_engine::{
    EditOutcome, EditingContext, Engine, EngineError, FieldId, ParcelForm, StoreError, Table,
};
use dbforestale_io::{open_store, Backend, DataStore};

use exit_codes::{
    engine_exit_code, store_exit_code, EXIT_EDIT_BLOCKED, EXIT_ERROR, EXIT_NO_PARCEL,
    EXIT_NO_PROJECT, EXIT_STORE_IO, EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "dbforestale")]
#[command(about = "Forest parcel survey records with automatically derived fields")]
#[command(version)]
struct Cli {
    /// Data directory (default: storage.dataDir from settings, else the platform data dir)
    #[arg(long, global = true, env = "DBFORESTALE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Settings file (default: <config dir>/dbforestale/settings.json)
    #[arg(long, global = true, env = "DBFORESTALE_CONFIG")]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, list and select projects
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Create, list, select and copy parcels of the current project
    #[command(subcommand)]
    Parcel(ParcelCommands),

    /// Set a field of the current parcel and recompute what depends on it
    #[command(after_help = "\
Examples:
  dbforestale set main_unit 12
  dbforestale set sub_unit_area 1,5
  dbforestale set species.0.percentage 60
  dbforestale set interventions.0.year 2020

Derived fields (composite_key, parcel_area, total_volume, imd, imh, imv and
the computed row columns) cannot be set.")]
    Set {
        /// Field path (e.g. stand_age, species.0.diameter)
        field: String,

        /// New value (empty clears the field)
        #[arg(allow_hyphen_values = true, default_value = "")]
        value: String,

        #[arg(long)]
        json: bool,
    },

    /// Add a row to a parcel table
    #[command(after_help = "\
Examples:
  dbforestale add-row species Abete
  dbforestale add-row interventions thinning
  dbforestale add-row infrastructure tractor-road")]
    AddRow {
        /// species, interventions, cadastral or infrastructure
        table: String,

        /// First column of the new row; required for infrastructure
        value: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Remove a row from a parcel table
    RemoveRow {
        table: String,
        index: usize,

        #[arg(long)]
        json: bool,
    },

    /// Recompute every derived field of the current parcel
    Recalc {
        /// Recompute every parcel of the project
        #[arg(long)]
        all: bool,

        #[arg(long)]
        json: bool,
    },

    /// Check the current parcel (percentages, cadastral areas, field bounds)
    Validate {
        #[arg(long)]
        json: bool,
    },

    /// Export the project table as CSV
    Export {
        /// Output file (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Tab-separated instead of comma-separated
        #[arg(long)]
        tsv: bool,
    },

    /// Interactive edit session on the current parcel, with autosave
    Session,
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Create a project and make it current
    New {
        name: String,

        #[arg(long)]
        location: String,

        #[arg(long)]
        client: String,

        #[arg(long)]
        authority: String,

        #[arg(long)]
        json: bool,
    },

    /// List projects
    List {
        #[arg(long)]
        json: bool,
    },

    /// Make a project current
    Use { id: String },

    /// Show a project (default: the current one)
    Show {
        id: Option<String>,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ParcelCommands {
    /// Append an empty parcel and make it current
    New {
        #[arg(long)]
        json: bool,
    },

    /// Project table: one line per parcel
    List {
        #[arg(long)]
        json: bool,
    },

    /// Show a parcel with every derived field recomputed (default: current)
    Show {
        index: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Make a parcel current
    Edit { index: usize },

    /// Copy a parcel under a new identity
    Duplicate { index: Option<usize> },

    /// Delete a parcel (default: current)
    Delete { index: Option<usize> },
}

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    if verbose > 0 || std::env::var_os("RUST_LOG").is_none() {
        let level = match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        };
        builder.filter_level(level);
    }
    builder.format_timestamp(None).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = App::open(&cli).and_then(|mut app| app.run(cli.command));

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_STORE_IO, message: msg.into(), hint: None }
    }

    /// Error already reported on stdout; only the exit code is left.
    pub fn silent(code: u8) -> Self {
        Self { code, message: String::new(), hint: None }
    }

    pub fn store(err: StoreError) -> Self {
        Self { code: store_exit_code(&err), message: err.to_string(), hint: None }
    }

    /// Create error from engine error with proper exit code.
    pub fn engine(err: EngineError) -> Self {
        let code = engine_exit_code(&err);
        let hint = match &err {
            EngineError::NoCurrentParcel { .. } => {
                Some("select a parcel with `dbforestale parcel edit <index>`".to_string())
            }
            EngineError::UnknownProject(_) => {
                Some("list projects with `dbforestale project list`".to_string())
            }
            EngineError::IndexOutOfRange { .. } => {
                Some("list parcels with `dbforestale parcel list`".to_string())
            }
            EngineError::DerivedField(_) => {
                Some("set the fields it is computed from instead".to_string())
            }
            EngineError::UnknownField(path) if path.starts_with("infrastructure kind") => Some(
                "kinds: main_truck_road, secondary_truck_road, tractor_road, truck_track, \
                 main_tractor_track, secondary_tractor_track, skidding_lines, \
                 permanent_landing, temporary_landing"
                    .to_string(),
            ),
            EngineError::UnknownField(_) => {
                Some("see `dbforestale set --help` for field paths".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        Self::engine(err)
    }
}

fn print_json(value: &serde_json::Value) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError {
        code: EXIT_ERROR,
        message: e.to_string(),
        hint: None,
    })?;
    println!("{text}");
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, CliError> {
    serde_json::to_value(value).map_err(|e| CliError { code: EXIT_ERROR, message: e.to_string(), hint: None })
}

// ============================================================================
// App
// ============================================================================

struct App {
    engine: Engine<DataStore>,
    settings: Settings,
    data_dir: PathBuf,
    session: Session,
}

impl App {
    fn open(cli: &Cli) -> Result<Self, CliError> {
        let settings = match &cli.config {
            Some(path) => Settings::load_from(path),
            None => Settings::load(),
        };
        let data_dir = cli.data_dir.clone().unwrap_or_else(|| settings.data_dir());
        let backend = match settings.storage_backend {
            StorageBackend::Json => Backend::Json,
            StorageBackend::Sqlite => Backend::Sqlite,
        };

        let store = open_store(backend, &data_dir).map_err(|e| {
            CliError::store(e).with_hint(format!("data directory: {}", data_dir.display()))
        })?;
        let engine = Engine::new(store).with_limits(settings.validation_limits());
        let session = Session::load(&data_dir).unwrap_or_default();
        log::debug!("data dir {} ({backend})", data_dir.display());

        Ok(Self { engine, settings, data_dir, session })
    }

    fn run(&mut self, command: Commands) -> Result<(), CliError> {
        match command {
            Commands::Project(cmd) => self.cmd_project(cmd),
            Commands::Parcel(cmd) => self.cmd_parcel(cmd),
            Commands::Set { field, value, json } => self.cmd_set(&field, &value, json),
            Commands::AddRow { table, value, json } => self.cmd_add_row(&table, value.as_deref(), json),
            Commands::RemoveRow { table, index, json } => self.cmd_remove_row(&table, index, json),
            Commands::Recalc { all, json } => self.cmd_recalc(all, json),
            Commands::Validate { json } => self.cmd_validate(json),
            Commands::Export { output, tsv } => self.cmd_export(output, tsv),
            Commands::Session => self.cmd_session(),
        }
    }

    /// Current project, or EXIT_NO_PROJECT.
    fn context(&self) -> Result<EditingContext, CliError> {
        self.session.context().ok_or_else(|| CliError {
            code: EXIT_NO_PROJECT,
            message: "no project selected".to_string(),
            hint: Some("create one with `dbforestale project new` or pick one with `dbforestale project use <id>`".to_string()),
        })
    }

    /// Current project and parcel, or EXIT_NO_PARCEL.
    fn parcel_context(&self) -> Result<EditingContext, CliError> {
        let ctx = self.context()?;
        if ctx.index.is_none() {
            return Err(CliError {
                code: EXIT_NO_PARCEL,
                message: "no parcel selected".to_string(),
                hint: Some("select one with `dbforestale parcel edit <index>`".to_string()),
            });
        }
        Ok(ctx)
    }

    fn remember(&mut self, ctx: &EditingContext) -> Result<(), CliError> {
        self.session.set_context(ctx);
        self.session.save(&self.data_dir).map_err(CliError::io)
    }

    // ------------------------------------------------------------------------
    // project
    // ------------------------------------------------------------------------

    fn cmd_project(&mut self, cmd: ProjectCommands) -> Result<(), CliError> {
        match cmd {
            ProjectCommands::New { name, location, client, authority, json } => {
                let project = self.engine.create_project(&name, &location, &client, &authority)?;
                self.remember(&EditingContext::project(project.id.clone()))?;
                if json {
                    print_json(&to_json(&project)?)
                } else {
                    println!("created project {} ({})", project.name, project.id);
                    Ok(())
                }
            }
            ProjectCommands::List { json } => {
                let projects = self.engine.projects()?;
                let current = self.session.current_project.as_deref();
                if json {
                    return print_json(&to_json(&projects)?);
                }
                if projects.is_empty() {
                    println!("no projects");
                } else {
                    print!("{}", render::projects_table(&projects, current));
                }
                Ok(())
            }
            ProjectCommands::Use { id } => {
                let project = self.engine.project(&id)?;
                self.remember(&EditingContext::project(project.id.clone()))?;
                println!("using project {} ({})", project.name, project.id);
                Ok(())
            }
            ProjectCommands::Show { id, json } => {
                let id = match id {
                    Some(id) => id,
                    None => self.context()?.record_set_id,
                };
                let project = self.engine.project(&id)?;
                if json {
                    let parcels = self.engine.records(&EditingContext::project(id))?.len();
                    let mut value = to_json(&project)?;
                    value["parcels"] = json!(parcels);
                    print_json(&value)
                } else {
                    print!("{}", render::project_details(&project));
                    Ok(())
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // parcel
    // ------------------------------------------------------------------------

    fn cmd_parcel(&mut self, cmd: ParcelCommands) -> Result<(), CliError> {
        match cmd {
            ParcelCommands::New { json } => {
                let mut ctx = self.context()?;
                let index = self.engine.create_parcel(&mut ctx)?;
                self.remember(&ctx)?;
                if json {
                    print_json(&json!({ "index": index }))
                } else {
                    println!("created parcel {index}");
                    Ok(())
                }
            }
            ParcelCommands::List { json } => {
                let ctx = self.context()?;
                let rows = self.engine.project_table(&ctx)?;
                if json {
                    return print_json(&to_json(&rows)?);
                }
                if rows.is_empty() {
                    println!("no parcels");
                } else {
                    print!("{}", render::parcels_table(&rows, ctx.index));
                }
                Ok(())
            }
            ParcelCommands::Show { index, json } => {
                let mut ctx = self.context()?;
                if let Some(index) = index {
                    self.engine.select_parcel(&mut ctx, index)?;
                }
                let form = self.engine.open_parcel(&ctx)?;
                if json {
                    print_json(&to_json(&form)?)
                } else {
                    print!("{}", render::form_details(&form));
                    Ok(())
                }
            }
            ParcelCommands::Edit { index } => {
                let mut ctx = self.context()?;
                self.engine.select_parcel(&mut ctx, index)?;
                self.remember(&ctx)?;
                let form = self.engine.open_parcel(&ctx)?;
                let key = if form.composite_key.is_empty() { "-" } else { form.composite_key.as_str() };
                println!("editing parcel {index} ({key})");
                Ok(())
            }
            ParcelCommands::Duplicate { index } => {
                let ctx = self.context()?;
                let source = self.index_or_current(&ctx, index)?;
                let copy = self.engine.duplicate_parcel(&ctx, source)?;
                println!("duplicated parcel {source} as {copy}");
                Ok(())
            }
            ParcelCommands::Delete { index } => {
                let mut ctx = self.context()?;
                let target = self.index_or_current(&ctx, index)?;
                let removed = self.engine.delete_parcel(&mut ctx, target)?;
                self.remember(&ctx)?;
                let key = if removed.form.composite_key.is_empty() {
                    "-".to_string()
                } else {
                    removed.form.composite_key
                };
                println!("deleted parcel {target} ({key})");
                Ok(())
            }
        }
    }

    fn index_or_current(&self, ctx: &EditingContext, index: Option<usize>) -> Result<usize, CliError> {
        match index.or(ctx.index) {
            Some(index) => Ok(index),
            None => Err(CliError::args("no parcel given and none selected")
                .with_hint("pass an index or select a parcel with `dbforestale parcel edit <index>`")),
        }
    }

    // ------------------------------------------------------------------------
    // edits
    // ------------------------------------------------------------------------

    fn cmd_set(&mut self, field: &str, value: &str, json: bool) -> Result<(), CliError> {
        let ctx = self.parcel_context()?;
        let field = FieldId::parse(field)?;
        let mut live = self.engine.open_parcel(&ctx)?;
        let outcome = self.engine.apply_edit(&ctx, &mut live, &field, value)?;
        report_outcome(&outcome, &live, json)
    }

    fn cmd_add_row(&mut self, table: &str, value: Option<&str>, json: bool) -> Result<(), CliError> {
        let ctx = self.parcel_context()?;
        let table: Table = table.parse()?;
        let mut live = self.engine.open_parcel(&ctx)?;
        let (row, outcome) = self.engine.add_row(&ctx, &mut live, table, value)?;
        if !json {
            println!("added {table} row {row}");
        }
        report_outcome(&outcome, &live, json)
    }

    fn cmd_remove_row(&mut self, table: &str, index: usize, json: bool) -> Result<(), CliError> {
        let ctx = self.parcel_context()?;
        let table: Table = table.parse()?;
        let mut live = self.engine.open_parcel(&ctx)?;
        let outcome = self.engine.remove_row(&ctx, &mut live, table, index)?;
        report_outcome(&outcome, &live, json)
    }

    fn cmd_recalc(&mut self, all: bool, json: bool) -> Result<(), CliError> {
        if all {
            let ctx = self.context()?;
            let report = self.engine.recompute_project(&ctx)?;
            if json {
                let changed: Vec<_> = report
                    .changed
                    .iter()
                    .map(|(index, field)| json!({ "parcel": index, "field": field.to_string() }))
                    .collect();
                print_json(&json!({
                    "changed": changed,
                    "parcels_changed": report.parcels_changed(),
                    "aggregates_updated": report.aggregates_updated,
                    "duration_us": report.duration_us,
                }))
            } else {
                println!("{}", report.summary());
                Ok(())
            }
        } else {
            let ctx = self.parcel_context()?;
            let mut live = self.engine.open_parcel(&ctx)?;
            let outcome = self.engine.recompute(&ctx, &mut live)?;
            report_outcome(&outcome, &live, json)
        }
    }

    fn cmd_validate(&mut self, json: bool) -> Result<(), CliError> {
        let ctx = self.parcel_context()?;
        let live = self.engine.open_parcel(&ctx)?;
        let report = self.engine.validate(&live);
        if json {
            print_json(&render::validation_json(&report))?;
        } else {
            let lines = render::validation_lines(&report);
            if lines.is_empty() {
                println!("ok");
            }
            for line in lines {
                println!("{line}");
            }
        }
        if report.blocks_save() {
            return Err(CliError::silent(EXIT_EDIT_BLOCKED));
        }
        Ok(())
    }

    fn cmd_export(&mut self, output: Option<PathBuf>, tsv: bool) -> Result<(), CliError> {
        let ctx = self.context()?;
        let records = self.engine.records(&ctx)?;
        let result = match (&output, tsv) {
            (Some(path), false) => dbforestale_io::csv::export(&records, path),
            (Some(path), true) => dbforestale_io::csv::export_tsv(&records, path),
            (None, tsv) => {
                let delimiter = if tsv { b'\t' } else { b',' };
                dbforestale_io::csv::write_table(&records, io::stdout().lock(), delimiter)
            }
        };
        result.map_err(CliError::io)?;
        if let Some(path) = output {
            eprintln!("exported {} parcel(s) to {}", records.len(), path.display());
        }
        Ok(())
    }

    fn cmd_session(&mut self) -> Result<(), CliError> {
        let ctx = self.parcel_context()?;
        let interval = self.settings.autosave_interval();
        let edit = session::EditSession::open(&mut self.engine, ctx, interval)?;
        let ctx = edit.context().clone();
        println!("editing parcel {} of {} (type help)", ctx.index.unwrap_or(0), ctx.record_set_id);
        edit.run()?;
        io::stdout().flush().map_err(|e| CliError::io(e.to_string()))?;
        Ok(())
    }
}

/// Print an edit's result. A save refused by validation exits with
/// EXIT_EDIT_BLOCKED after the report.
fn report_outcome(outcome: &EditOutcome, live: &ParcelForm, json: bool) -> Result<(), CliError> {
    if json {
        print_json(&render::outcome_json(outcome, live))?;
    } else {
        for line in render::outcome_lines(outcome, live) {
            println!("{line}");
        }
    }
    if !outcome.saved && outcome.blocks_save() {
        return Err(CliError {
            code: EXIT_EDIT_BLOCKED,
            message: "not saved: species percentages exceed 100%".to_string(),
            hint: Some("lower another species percentage first".to_string()),
        });
    }
    Ok(())
}
