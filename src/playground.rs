//! One editing session: the file set, the editor, the executor and the
//! display, wired to whatever asks the user questions.

use crate::buffer::{ActiveBuffer, Editor};
use crate::config::{ConfigError, PlaygroundConfig};
use crate::executor::{Executor, RunReport, StopHandle};
use crate::presenter::{Presenter, Surface, View};
use crate::runtime::Console;
use crate::security::NameRules;
use crate::store::{FileStore, StoreError, UploadOutcome};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Blocking questions put to the user
pub trait Dialogs {
    fn confirm(&mut self, message: &str) -> bool;
    /// `None` when the user cancels
    fn prompt(&mut self, message: &str) -> Option<String>;
    fn alert(&mut self, message: &str);
}

pub const NEW_FILE_PROMPT: &str = "New file name (e.g. file.ts):";
pub const NEW_FILE_REJECTED: &str = "File already exists or invalid name.";
pub const DOWNLOAD_PROMPT: &str = "File name to save (leave empty to use the default):";

pub struct Playground<E: Editor, D: Dialogs, S: Surface> {
    store: FileStore,
    buffer: ActiveBuffer<E>,
    executor: Executor,
    presenter: Presenter<S>,
    dialogs: D,
    extension: String,
    download_name: String,
}

impl<E: Editor, D: Dialogs, S: Surface> Playground<E, D, S> {
    pub fn new(
        config: &PlaygroundConfig,
        console: Console,
        editor: E,
        dialogs: D,
        surface: S,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let store = FileStore::new()
            .with_limits(config.store)
            .default_name(config.default_name.trim());
        let executor = Executor::new(console, config.executor).with_validator(config.validator()?);

        Ok(Self {
            store,
            buffer: ActiveBuffer::new(editor),
            executor,
            presenter: Presenter::new(surface),
            dialogs,
            extension: config.extension().to_string(),
            download_name: config.download_name.trim().to_string(),
        })
    }

    /// Ask for a name and add an empty file under it.
    ///
    /// A trailing `.<extension>` typed by the user is dropped, since listings
    /// add it back.
    pub fn new_file(&mut self) -> Option<String> {
        let answer = self.dialogs.prompt(NEW_FILE_PROMPT)?;
        let suffix = format!(".{}", self.extension);
        let answer = answer.trim();
        let name = answer.strip_suffix(suffix.as_str()).unwrap_or(answer);

        match self.store.create(name, "") {
            Ok(name) => Some(name),
            Err(e) => {
                tracing::debug!(error = %e, "new file rejected");
                self.dialogs.alert(NEW_FILE_REJECTED);
                None
            }
        }
    }

    /// Delete after confirmation; false when nothing was removed
    pub fn delete_file(&mut self, name: &str) -> bool {
        let display = NameRules::with_extension(name, &self.extension);
        let dialogs = &mut self.dialogs;
        self.store.delete(name, |_| {
            dialogs.confirm(&format!("Delete file \"{}\"?", display))
        })
    }

    /// Re-key `source` as `target`, replacing any file already there
    pub fn move_file(&mut self, source: &str, target: &str) -> Result<(), StoreError> {
        self.store.move_file(source, target)
    }

    /// Upload a file from disk
    pub fn upload(&mut self, path: &Path) -> Result<UploadOutcome, StoreError> {
        let bytes = fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.upload_bytes(&file_name, &bytes)
    }

    pub fn upload_bytes(
        &mut self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<UploadOutcome, StoreError> {
        let extension = &self.extension;
        let dialogs = &mut self.dialogs;
        self.store
            .upload(file_name, bytes, |key| confirm_overwrite(dialogs, key, extension))
    }

    /// Save the editor text into `dir` under a prompted name.
    ///
    /// Returns `None` when the prompt is cancelled.
    pub fn download(&mut self, dir: &Path) -> Result<Option<PathBuf>, StoreError> {
        let Some(answer) = self.dialogs.prompt(DOWNLOAD_PROMPT) else {
            return Ok(None);
        };
        let name = if answer.trim().is_empty() {
            self.download_name.clone()
        } else {
            NameRules::validate(&answer)?
        };

        let path = dir.join(name);
        fs::write(&path, self.buffer.text())?;
        tracing::info!(path = %path.display(), "editor text downloaded");
        Ok(Some(path))
    }

    pub fn export_archive(&self, path: &Path) -> Result<(), StoreError> {
        let file = File::create(path)?;
        let writer = self
            .store
            .export_archive(BufWriter::new(file), &self.extension)?;
        writer
            .into_inner()
            .map_err(|e| StoreError::Io(e.into_error()))?;
        Ok(())
    }

    pub fn import_archive(
        &mut self,
        path: &Path,
    ) -> Result<Vec<(String, UploadOutcome)>, StoreError> {
        let reader = BufReader::new(File::open(path)?);
        let extension = &self.extension;
        let dialogs = &mut self.dialogs;
        self.store
            .import_archive(reader, |key| confirm_overwrite(dialogs, key, extension))
    }

    pub fn load_dir(&mut self, dir: &Path) -> Result<Vec<(String, UploadOutcome)>, StoreError> {
        let extension = &self.extension;
        let dialogs = &mut self.dialogs;
        self.store
            .load_dir(dir, |key| confirm_overwrite(dialogs, key, extension))
    }

    /// Load a file into the editor
    pub fn select(&mut self, name: &str) -> bool {
        self.buffer.select(&self.store, name)
    }

    /// Run the editor text and show the result.
    ///
    /// Does nothing and returns `None` while a run is in flight.
    pub fn run(&mut self) -> Option<RunReport> {
        if self.executor.is_running() {
            return None;
        }
        self.presenter.render(View::Running);
        let report = self.executor.run(&self.buffer.text(), &self.extension)?;
        self.presenter.render(View::Report(&report));
        Some(report)
    }

    /// Cancel any run, then show the stopped notice on a cleared display
    pub fn stop(&mut self) -> bool {
        let stopped = self.executor.stop();
        self.presenter.clear();
        self.presenter.render(View::Stopped);
        stopped
    }

    /// File names as shown to the user, with the extension
    pub fn listing(&self) -> Vec<String> {
        self.store
            .list()
            .into_iter()
            .map(|name| NameRules::with_extension(name, &self.extension))
            .collect()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.executor.stop_handle()
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn buffer(&self) -> &ActiveBuffer<E> {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut ActiveBuffer<E> {
        &mut self.buffer
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn presenter(&self) -> &Presenter<S> {
        &self.presenter
    }

    pub fn dialogs(&self) -> &D {
        &self.dialogs
    }

    pub fn dialogs_mut(&mut self) -> &mut D {
        &mut self.dialogs
    }
}

fn confirm_overwrite<D: Dialogs>(dialogs: &mut D, key: &str, extension: &str) -> bool {
    dialogs.confirm(&format!(
        "File \"{}\" already exists. Overwrite?",
        NameRules::with_extension(key, extension)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{TextBuffer, INITIAL_TEXT};
    use crate::executor::RunErrorKind;
    use crate::presenter::{MemorySurface, NO_OUTPUT, RUNNING_NOTICE, STOPPED_NOTICE};
    use crate::runtime::MemorySink;
    use std::collections::VecDeque;

    /// Answers questions from a script and records what was asked
    #[derive(Default)]
    struct ScriptedDialogs {
        confirms: VecDeque<bool>,
        prompts: VecDeque<Option<String>>,
        asked: Vec<String>,
        alerts: Vec<String>,
    }

    impl ScriptedDialogs {
        fn confirming(mut self, answer: bool) -> Self {
            self.confirms.push_back(answer);
            self
        }

        fn answering(mut self, answer: Option<&str>) -> Self {
            self.prompts.push_back(answer.map(str::to_string));
            self
        }
    }

    impl Dialogs for ScriptedDialogs {
        fn confirm(&mut self, message: &str) -> bool {
            self.asked.push(message.to_string());
            self.confirms.pop_front().unwrap_or(false)
        }

        fn prompt(&mut self, message: &str) -> Option<String> {
            self.asked.push(message.to_string());
            self.prompts.pop_front().flatten()
        }

        fn alert(&mut self, message: &str) {
            self.alerts.push(message.to_string());
        }
    }

    type TestPlayground = Playground<TextBuffer, ScriptedDialogs, MemorySurface>;

    fn playground(dialogs: ScriptedDialogs) -> TestPlayground {
        Playground::new(
            &PlaygroundConfig::default(),
            Console::new(MemorySink::new()),
            TextBuffer::new(INITIAL_TEXT),
            dialogs,
            MemorySurface::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_initial_text_runs() {
        let mut pg = playground(ScriptedDialogs::default());
        let report = pg.run().unwrap();
        assert_eq!(report.output(), Some(&["Hello, world!".to_string()][..]));

        let frames = pg.presenter().surface().frames();
        assert_eq!(frames[0].text, RUNNING_NOTICE);
        assert_eq!(pg.presenter().displayed(), "Hello, world!");
    }

    #[test]
    fn test_empty_output_shows_notice() {
        let mut pg = playground(ScriptedDialogs::default());
        pg.buffer_mut().set_text("let x: number = 1;");
        pg.run().unwrap();
        assert_eq!(pg.presenter().displayed(), NO_OUTPUT);
    }

    #[test]
    fn test_denylisted_code_shows_error() {
        let mut pg = playground(ScriptedDialogs::default());
        pg.buffer_mut().set_text("fetch(\"https://example.com\")");
        let report = pg.run().unwrap();
        assert_eq!(report.error_kind(), Some(RunErrorKind::ContentPolicy));
        assert_eq!(
            pg.presenter().displayed(),
            "Error: code contains disallowed commands!"
        );
        assert!(!pg.executor().is_running());
    }

    #[test]
    fn test_new_file_strips_extension() {
        let mut pg = playground(ScriptedDialogs::default().answering(Some("notes.ts")));
        assert_eq!(pg.new_file().as_deref(), Some("notes"));
        assert_eq!(pg.store().get("notes"), Some(""));
        assert_eq!(pg.listing(), vec!["notes.ts"]);
    }

    #[test]
    fn test_new_file_duplicate_alerts() {
        let mut pg = playground(
            ScriptedDialogs::default()
                .answering(Some("a"))
                .answering(Some("a"))
                .answering(Some("   ")),
        );
        pg.new_file().unwrap();
        assert!(pg.new_file().is_none());
        assert!(pg.new_file().is_none());
        assert_eq!(pg.dialogs().alerts, vec![NEW_FILE_REJECTED, NEW_FILE_REJECTED]);
        assert_eq!(pg.store().len(), 1);
    }

    #[test]
    fn test_new_file_cancelled_is_silent() {
        let mut pg = playground(ScriptedDialogs::default().answering(None));
        assert!(pg.new_file().is_none());
        assert!(pg.dialogs().alerts.is_empty());
        assert!(pg.store().is_empty());
    }

    #[test]
    fn test_delete_asks_with_display_name() {
        let mut pg = playground(
            ScriptedDialogs::default()
                .answering(Some("a"))
                .confirming(false)
                .confirming(true),
        );
        pg.new_file().unwrap();
        assert!(!pg.delete_file("a"));
        assert!(pg.delete_file("a"));
        assert!(pg.store().is_empty());
        assert_eq!(pg.dialogs().asked[1], "Delete file \"a.ts\"?");
    }

    #[test]
    fn test_upload_overwrite_prompt() {
        let mut pg = playground(ScriptedDialogs::default().confirming(true));
        pg.upload_bytes("demo.ts", b"console.log(1)").unwrap();
        let outcome = pg.upload_bytes("demo.ts", b"console.log(2)").unwrap();
        assert_eq!(outcome, UploadOutcome::Overwritten);
        assert_eq!(
            pg.dialogs().asked,
            vec!["File \"demo.ts\" already exists. Overwrite?"]
        );
        assert_eq!(pg.store().get("demo"), Some("console.log(2)"));
    }

    #[test]
    fn test_select_then_run_uses_editor_text() {
        let mut pg = playground(ScriptedDialogs::default());
        pg.upload_bytes("a.ts", b"console.log(\"from a\")").unwrap();
        assert!(pg.select("a"));
        assert_eq!(pg.run().unwrap().output(), Some(&["from a".to_string()][..]));

        pg.buffer_mut().set_text("console.log(\"edited\")");
        assert_eq!(pg.run().unwrap().output(), Some(&["edited".to_string()][..]));
        assert_eq!(pg.store().get("a"), Some("console.log(\"from a\")"));
    }

    #[test]
    fn test_move_file() {
        let mut pg = playground(ScriptedDialogs::default());
        pg.upload_bytes("a.ts", b"1").unwrap();
        pg.move_file("a", "b").unwrap();
        assert_eq!(pg.listing(), vec!["b.ts"]);
        assert!(matches!(
            pg.move_file("a", "c"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_stop_when_idle_clears_and_notifies() {
        let mut pg = playground(ScriptedDialogs::default());
        pg.run().unwrap();
        assert!(!pg.stop());
        assert_eq!(pg.presenter().displayed(), STOPPED_NOTICE);
        assert_eq!(pg.presenter().surface().clears(), 1);

        // the next run behaves normally
        assert!(pg.run().unwrap().is_success());
    }

    #[test]
    fn test_download_writes_editor_text() {
        let dir = tempfile::tempdir().unwrap();
        let mut pg = playground(
            ScriptedDialogs::default()
                .answering(Some(""))
                .answering(Some("mine.ts"))
                .answering(None),
        );

        let default = pg.download(dir.path()).unwrap().unwrap();
        assert_eq!(default, dir.path().join("untitled.ts"));
        assert_eq!(fs::read_to_string(&default).unwrap(), INITIAL_TEXT);

        let named = pg.download(dir.path()).unwrap().unwrap();
        assert_eq!(named, dir.path().join("mine.ts"));

        assert!(pg.download(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_download_rejects_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut pg = playground(ScriptedDialogs::default().answering(Some("../escape.ts")));
        assert!(matches!(
            pg.download(dir.path()),
            Err(StoreError::InvalidName(_))
        ));
    }

    #[test]
    fn test_archive_export_import() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("set.zip");

        let mut source = playground(ScriptedDialogs::default());
        source.upload_bytes("a.ts", b"1").unwrap();
        source.upload_bytes("b.ts", b"2").unwrap();
        source.export_archive(&archive).unwrap();

        let mut target = playground(ScriptedDialogs::default());
        target.upload_bytes("a.ts", b"old").unwrap();
        let outcomes = target.import_archive(&archive).unwrap();
        assert_eq!(
            outcomes,
            vec![
                ("a.ts".to_string(), UploadOutcome::Declined),
                ("b.ts".to_string(), UploadOutcome::Inserted),
            ]
        );
        assert_eq!(target.store().get("a"), Some("old"));
    }
}
