//! Interactive edit session.
//!
//! A reader thread forwards stdin lines over a channel. The session thread
//! owns the engine and the live form; it waits on the channel with
//! `recv_timeout` so the autosave timer fires even while the user is idle.

use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use dbforestale_engine::autosave::Autosave;
use dbforestale_engine::{EditingContext, Engine, EngineError, FieldId, ParcelForm, Store, Table};

use crate::render;

/// Poll period when autosave is disabled.
const IDLE_POLL: Duration = Duration::from_secs(3600);

const HELP: &str = "\
commands:
  set <field> <value>      set a field (e.g. set sub_unit_area 1,5)
  add <table> [value]      add a row to species|interventions|cadastral|infrastructure
  rm <table> <row>         remove a row
  show                     print the parcel
  validate                 run the form checks
  recalc                   recompute every derived field
  save                     save now (refused while percentages exceed 100%)
  help                     this text
  quit                     autosave and leave";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Quit,
}

pub(crate) struct EditSession<'a, S: Store> {
    engine: &'a mut Engine<S>,
    ctx: EditingContext,
    live: ParcelForm,
    autosave: Option<Autosave>,
}

impl<'a, S: Store> EditSession<'a, S> {
    /// Open the context's current parcel for editing.
    pub(crate) fn open(
        engine: &'a mut Engine<S>,
        ctx: EditingContext,
        autosave_interval: Option<Duration>,
    ) -> Result<Self, EngineError> {
        let live = engine.open_parcel(&ctx)?;
        Ok(Self {
            engine,
            ctx,
            live,
            autosave: autosave_interval.map(Autosave::new),
        })
    }

    pub(crate) fn context(&self) -> &EditingContext {
        &self.ctx
    }

    /// Handle one input line, writing any response to `out`.
    pub(crate) fn handle_line(&mut self, line: &str, out: &mut dyn Write) -> io::Result<Flow> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }
        let (cmd, rest) = match line.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (line, ""),
        };

        match cmd {
            "quit" | "exit" | "q" => return Ok(Flow::Quit),
            "help" | "?" => writeln!(out, "{HELP}")?,
            "show" => write!(out, "{}", render::form_details(&self.live))?,
            "validate" => {
                let lines = render::validation_lines(&self.engine.validate(&self.live));
                if lines.is_empty() {
                    writeln!(out, "ok")?;
                }
                for line in lines {
                    writeln!(out, "{line}")?;
                }
            }
            _ => match self.run_edit(cmd, rest) {
                Ok(Some(lines)) => {
                    for line in lines {
                        writeln!(out, "{line}")?;
                    }
                }
                Ok(None) => writeln!(out, "unknown command '{cmd}' (type help)")?,
                Err(e) => writeln!(out, "error: {e}")?,
            },
        }
        Ok(Flow::Continue)
    }

    /// Commands that go through the engine. `None` for an unknown command.
    fn run_edit(&mut self, cmd: &str, args: &str) -> Result<Option<Vec<String>>, EngineError> {
        let outcome = match cmd {
            "set" => {
                let (path, value) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
                let field = FieldId::parse(path)?;
                self.engine.apply_edit(&self.ctx, &mut self.live, &field, value.trim())?
            }
            "add" => {
                let (table, value) = match args.split_once(char::is_whitespace) {
                    Some((table, value)) => (table, Some(value.trim())),
                    None => (args, None),
                };
                let table: Table = table.parse()?;
                let (row, outcome) = self.engine.add_row(&self.ctx, &mut self.live, table, value)?;
                let mut lines = vec![format!("added {table} row {row}")];
                lines.extend(self.describe(&outcome));
                return Ok(Some(lines));
            }
            "rm" => {
                let (table, row) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
                let table: Table = table.parse()?;
                let Ok(row) = row.trim().parse::<usize>() else {
                    return Ok(Some(vec!["usage: rm <table> <row>".to_string()]));
                };
                self.engine.remove_row(&self.ctx, &mut self.live, table, row)?
            }
            "recalc" => self.engine.recompute(&self.ctx, &mut self.live)?,
            "save" => {
                let outcome = self.engine.save(&self.ctx, &mut self.live)?;
                let mut lines = self.describe(&outcome);
                lines.insert(0, if outcome.saved { "saved".to_string() } else { "not saved".to_string() });
                return Ok(Some(lines));
            }
            _ => return Ok(None),
        };
        Ok(Some(self.describe(&outcome)))
    }

    fn describe(&self, outcome: &dbforestale_engine::EditOutcome) -> Vec<String> {
        let mut lines = render::outcome_lines(outcome, &self.live);
        if !outcome.saved && outcome.blocks_save() {
            lines.push("not saved: fix the species percentages first".to_string());
        }
        lines
    }

    /// Time until the next autosave is due.
    pub(crate) fn next_deadline(&self, now: Instant) -> Duration {
        match &self.autosave {
            Some(timer) => timer.remaining(now),
            None => IDLE_POLL,
        }
    }

    /// Autosave when the timer is due. Returns true when something was written.
    /// The period runs from the last autosave only; edits never push it back.
    pub(crate) fn tick(&mut self, now: Instant) -> Result<bool, EngineError> {
        match self.autosave.as_mut() {
            Some(timer) if timer.due(now) => timer.mark(now),
            _ => return Ok(false),
        }
        self.autosave_now()
    }

    pub(crate) fn autosave_now(&mut self) -> Result<bool, EngineError> {
        let written = self.engine.autosave(&self.ctx, &mut self.live)?;
        if !written {
            log::warn!(
                "autosave skipped: parcel {:?} no longer exists in project '{}'",
                self.ctx.index,
                self.ctx.record_set_id
            );
        }
        Ok(written)
    }

    /// Run the session on stdin/stdout until `quit` or end of input.
    pub(crate) fn run(mut self) -> Result<(), EngineError> {
        let (tx, rx) = mpsc::channel::<String>();
        thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        let stdout = io::stdout();
        let _ = prompt(&mut stdout.lock(), &self.live);
        loop {
            let wait = self.next_deadline(Instant::now());
            match rx.recv_timeout(wait) {
                Ok(line) => {
                    let mut out = stdout.lock();
                    let flow = self.handle_line(&line, &mut out).map_err(io_err)?;
                    if flow == Flow::Quit {
                        break;
                    }
                    let _ = prompt(&mut out, &self.live);
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.tick(Instant::now())?;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.autosave_now()?;
        Ok(())
    }
}

fn prompt(out: &mut dyn Write, form: &ParcelForm) -> io::Result<()> {
    let key = if form.composite_key.is_empty() { "-" } else { form.composite_key.as_str() };
    write!(out, "{key}> ")?;
    out.flush()
}

fn io_err(e: io::Error) -> EngineError {
    EngineError::Store(dbforestale_engine::StoreError::Io(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbforestale_engine::MemoryStore;

    fn engine_with_parcel() -> (Engine<MemoryStore>, EditingContext) {
        let mut engine = Engine::new(MemoryStore::new());
        let project = engine
            .create_project("Bosco", "Trento", "Comune", "Servizio Foreste")
            .expect("project");
        let mut ctx = EditingContext::project(project.id);
        engine.create_parcel(&mut ctx).expect("parcel");
        (engine, ctx)
    }

    fn run(session: &mut EditSession<'_, MemoryStore>, line: &str) -> String {
        let mut out = Vec::new();
        session.handle_line(line, &mut out).expect("write");
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn set_prints_changed_fields() {
        let (mut engine, ctx) = engine_with_parcel();
        let mut session = EditSession::open(&mut engine, ctx, None).expect("open");

        run(&mut session, "set main_unit 12");
        let out = run(&mut session, "set sub_unit a");
        assert!(out.contains("composite_key = 12a"), "{out}");

        run(&mut session, "set sub_unit_area 1,5");
        assert_eq!(session.live.parcel_area, "1.5000");
        assert_eq!(session.live.sub_unit_area, "1.5000");
    }

    #[test]
    fn errors_keep_the_session_alive() {
        let (mut engine, ctx) = engine_with_parcel();
        let mut session = EditSession::open(&mut engine, ctx, None).expect("open");

        let out = run(&mut session, "set sub_unit_area 1000");
        assert!(out.starts_with("error: sub_unit_area"), "{out}");
        let out = run(&mut session, "set imv 3");
        assert!(out.contains("computed automatically"), "{out}");
        let out = run(&mut session, "frobnicate");
        assert!(out.contains("unknown command"), "{out}");
        let mut sink = Vec::new();
        assert_eq!(session.handle_line("quit", &mut sink).expect("write"), Flow::Quit);
    }

    #[test]
    fn blocked_percentages_reported() {
        let (mut engine, ctx) = engine_with_parcel();
        let mut session = EditSession::open(&mut engine, ctx, None).expect("open");

        run(&mut session, "add species Abete");
        run(&mut session, "add species Faggio");
        run(&mut session, "set species.0.percentage 60");
        let out = run(&mut session, "set species.1.percentage 45");
        assert!(out.contains("exceeds 100%"), "{out}");
        assert!(out.contains("not saved"), "{out}");

        let out = run(&mut session, "save");
        assert!(out.starts_with("not saved"), "{out}");
    }

    #[test]
    fn autosave_fires_when_due() {
        let (mut engine, ctx) = engine_with_parcel();
        {
            let mut session =
                EditSession::open(&mut engine, ctx.clone(), Some(Duration::from_secs(30))).expect("open");
            run(&mut session, "add species Abete");
            run(&mut session, "add species Faggio");
            run(&mut session, "set species.0.percentage 60");
            run(&mut session, "set species.1.percentage 45");

            let now = Instant::now();
            assert!(!session.tick(now).expect("tick"));
            assert!(session.next_deadline(now) <= Duration::from_secs(30));
            assert!(session.tick(now + Duration::from_secs(31)).expect("tick"));
        }

        let stored = engine.open_parcel(&ctx).expect("open");
        assert_eq!(stored.species[1].percentage, "45");
    }

    #[test]
    fn saved_edits_do_not_postpone_autosave() {
        let (mut engine, ctx) = engine_with_parcel();
        let mut session =
            EditSession::open(&mut engine, ctx, Some(Duration::from_secs(30))).expect("open");
        let opened = Instant::now();

        thread::sleep(Duration::from_millis(50));
        let out = run(&mut session, "set main_unit 4");
        assert!(!out.contains("not saved"), "{out}");
        run(&mut session, "save");

        // The period still counts from when the session opened.
        let elapsed = Duration::from_millis(50);
        assert!(session.next_deadline(Instant::now()) <= Duration::from_secs(30) - elapsed);
        let due = opened + Duration::from_secs(30) + Duration::from_millis(10);
        assert!(session.tick(due).expect("tick"));
    }

    #[test]
    fn remove_row_and_show() {
        let (mut engine, ctx) = engine_with_parcel();
        let mut session = EditSession::open(&mut engine, ctx, None).expect("open");

        let out = run(&mut session, "add infrastructure tractor-road");
        assert!(out.starts_with("added infrastructure row 0"), "{out}");
        assert!(run(&mut session, "show").contains("tractor_road"));
        run(&mut session, "rm infrastructure 0");
        assert!(session.live.infrastructure.is_empty());
        let out = run(&mut session, "rm infrastructure x");
        assert!(out.starts_with("usage:"), "{out}");
        let out = run(&mut session, "rm infrastructure 0");
        assert!(out.starts_with("error: infrastructure"), "{out}");
    }
}
