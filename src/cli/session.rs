//! The session controller: owns the database handle and executes one `Action` at a time.
//!
//! States: `Uninitialized` (no handle) -> `Active` (handle open) -> `Closed` (terminal).
//! Failed commands never change state.

use super::action::{parse, tokenize, Action};
use super::registry::help_table;
use crate::db::{Backend, DatabaseHandle};
use crate::error::{AppError, Result};
use crate::keys::{generate_key, generate_key_from_bytes, resolve_key, KeySource, ResolvedKey};
use crate::logger::Logger;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Active,
    Closed,
}

/// What the prompt should do after a command succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Nothing to print beyond what was logged.
    Silent,
    /// Print this text to the user.
    Text(String),
    /// Stop reading input and shut down.
    Exit,
}

#[derive(Debug, Clone, Copy)]
enum Transfer {
    Export,
    Import,
    ExportEncrypted,
    ImportEncrypted,
}

impl Transfer {
    fn started(&self, path: &Path, source: KeySource) -> String {
        let (what, direction) = match self {
            Transfer::Export => ("Exporting database", "to"),
            Transfer::Import => ("Importing database", "from"),
            Transfer::ExportEncrypted => ("Exporting encrypted database", "to"),
            Transfer::ImportEncrypted => ("Importing encrypted database", "from"),
        };
        format!("{} with {} {} path: {}", what, source, direction, path.display())
    }

    fn finished(&self) -> &'static str {
        match self {
            Transfer::Export => "Database exported successfully.",
            Transfer::Import => "Database imported successfully.",
            Transfer::ExportEncrypted => "Encrypted database exported successfully.",
            Transfer::ImportEncrypted => "Encrypted database imported successfully.",
        }
    }
}

/// Interactive session state over a database `Backend`.
pub struct Session<B: Backend> {
    backend: B,
    handle: Option<B::Handle>,
    closed: bool,
    version: String,
    logger: Arc<Logger>,
}

impl<B: Backend> Session<B> {
    pub fn new(backend: B, version: impl Into<String>, logger: Arc<Logger>) -> Self {
        Self {
            backend,
            handle: None,
            closed: false,
            version: version.into(),
            logger,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.closed {
            SessionState::Closed
        } else if self.handle.is_some() {
            SessionState::Active
        } else {
            SessionState::Uninitialized
        }
    }

    /// Tokenizes, validates and executes one input line. Blank lines are a silent no-op.
    pub fn dispatch(&mut self, line: &str) -> Result<Reply> {
        let tokens = tokenize(line);
        if tokens.is_empty() {
            return Ok(Reply::Silent);
        }
        self.execute(parse(&tokens)?)
    }

    pub fn execute(&mut self, action: Action) -> Result<Reply> {
        debug!(state = ?self.state(), "Executing {}", action.name());
        if action.requires_handle() {
            self.require_active()?;
        }

        match action {
            Action::Init { key, path } => self.init(&key, Path::new(&path)),
            Action::Export { key, path } => self.transfer(Transfer::Export, &key, &path),
            Action::Import { key, path } => self.transfer(Transfer::Import, &key, &path),
            Action::ExportEncrypted { key, path } => {
                self.transfer(Transfer::ExportEncrypted, &key, &path)
            },
            Action::ImportEncrypted { key, path } => {
                self.transfer(Transfer::ImportEncrypted, &key, &path)
            },
            Action::ChangeKey { old, new } => self.change_key(&old, &new),
            Action::NewKey => Ok(Reply::Text(generate_key().to_hex())),
            Action::KeyFrom { input } => {
                Ok(Reply::Text(generate_key_from_bytes(input.as_bytes()).to_hex()))
            },
            Action::Version => Ok(Reply::Text(format!(
                "PolarysDB CLI Version: {}",
                self.version
            ))),
            Action::Help => Ok(Reply::Text(help_table())),
            Action::Exit => Ok(Reply::Exit),
        }
    }

    /// Closes the handle if one is open. Runs at most once; later calls are no-ops.
    ///
    /// # Errors
    ///
    /// Returns the collaborator's error if closing fails. The session is `Closed` either way.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(mut handle) = self.handle.take() {
            self.logger.info("Closing database...");
            handle.close()?;
            self.logger.info("Database closed.");
        }
        Ok(())
    }

    fn require_active(&self) -> Result<()> {
        match self.state() {
            SessionState::Active => Ok(()),
            SessionState::Uninitialized => Err(AppError::NotInitialized),
            SessionState::Closed => Err(AppError::SessionClosed),
        }
    }

    /// Resolves one key token. Only the key's source is logged; the material itself never is.
    fn resolve(&self, token: &str) -> ResolvedKey {
        let resolved = resolve_key(token, &self.logger);
        if resolved.source == KeySource::Generated {
            self.logger
                .warn("No usable key supplied, using a newly generated key.");
        }
        resolved
    }

    fn handle_mut(&mut self) -> Result<&mut B::Handle> {
        self.handle.as_mut().ok_or(AppError::NotInitialized)
    }

    fn init(&mut self, key: &str, path: &Path) -> Result<Reply> {
        if self.closed {
            return Err(AppError::SessionClosed);
        }
        let resolved = self.resolve(key);
        self.logger.info(format!(
            "Initializing database with {} at path: {}",
            resolved.source,
            path.display()
        ));

        // Open the replacement first so a failed init leaves the current handle in place.
        let handle = self.backend.open(&resolved.key, path)?;
        if let Some(mut previous) = self.handle.replace(handle) {
            if let Err(e) = previous.close() {
                self.logger
                    .warn(format!("Failed to close previous database: {}", e));
            }
        }

        self.logger.info("Database initialized successfully.");
        Ok(generated_key_reply(&resolved))
    }

    fn transfer(&mut self, op: Transfer, key: &str, path: &str) -> Result<Reply> {
        let resolved = self.resolve(key);
        let path = Path::new(path);
        self.logger.info(op.started(path, resolved.source));

        let handle = self.handle_mut()?;
        match op {
            Transfer::Export => handle.export(&resolved.key, path),
            Transfer::Import => handle.import(&resolved.key, path),
            Transfer::ExportEncrypted => handle.export_encrypted(&resolved.key, path),
            Transfer::ImportEncrypted => handle.import_encrypted(&resolved.key, path),
        }?;

        self.logger.info(op.finished());
        Ok(generated_key_reply(&resolved))
    }

    fn change_key(&mut self, old: &str, new: &str) -> Result<Reply> {
        // A random "current" key can never match the database.
        let old = resolve_key(old, &self.logger);
        if old.source == KeySource::Generated {
            return Err(AppError::UnusableKey("current"));
        }
        let new = self.resolve(new);
        self.logger.info(format!(
            "Changing database key from {} to {}",
            old.source, new.source
        ));

        self.handle_mut()?.change_key(&old.key, &new.key)?;

        self.logger.info("Database key changed successfully.");
        Ok(generated_key_reply(&new))
    }
}

/// Hands a randomly generated key back to the user through the prompt, never the log.
fn generated_key_reply(resolved: &ResolvedKey) -> Reply {
    if resolved.source != KeySource::Generated {
        return Reply::Silent;
    }
    Reply::Text(format!(
        "Generated key: {}. Keep it to access this data again.",
        resolved.key.to_hex()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{StoreError, StoreResult};
    use crate::keys::KeyMaterial;
    use crate::logger::tests::{capturing_logger, Capture};
    use crate::logger::{Level, LoggerConfig};
    use rstest::rstest;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::tempdir;

    // --- Mock Backend State ---
    // Records every call made through the backend and its handles.
    #[derive(Default)]
    struct MockState {
        opened: Vec<PathBuf>,
        calls: Vec<String>,
        keys: Vec<KeyMaterial>,
        closed: Vec<usize>,
        fail_open: Option<StoreError>,
        fail_next: Option<StoreError>,
    }

    #[derive(Clone, Default)]
    struct MockBackend {
        state: Arc<Mutex<MockState>>,
    }

    impl MockBackend {
        fn calls(&self) -> Vec<String> {
            self.state.lock().unwrap().calls.clone()
        }

        fn keys(&self) -> Vec<KeyMaterial> {
            self.state.lock().unwrap().keys.clone()
        }

        fn closed(&self) -> Vec<usize> {
            self.state.lock().unwrap().closed.clone()
        }

        fn fail_open_with(&self, err: StoreError) {
            self.state.lock().unwrap().fail_open = Some(err);
        }

        fn fail_next_with(&self, err: StoreError) {
            self.state.lock().unwrap().fail_next = Some(err);
        }
    }

    struct MockHandle {
        id: usize,
        state: Arc<Mutex<MockState>>,
    }

    impl MockHandle {
        fn record(&self, call: String, keys: &[&KeyMaterial]) -> StoreResult<()> {
            let mut state = self.state.lock().unwrap();
            if let Some(err) = state.fail_next.take() {
                return Err(err);
            }
            state.calls.push(call);
            state.keys.extend(keys.iter().map(|k| (*k).clone()));
            Ok(())
        }
    }

    impl Backend for MockBackend {
        type Handle = MockHandle;

        fn open(&self, key: &KeyMaterial, path: &Path) -> StoreResult<MockHandle> {
            let mut state = self.state.lock().unwrap();
            if let Some(err) = state.fail_open.take() {
                return Err(err);
            }
            state.opened.push(path.to_path_buf());
            state.calls.push(format!("open {}", path.display()));
            state.keys.push(key.clone());
            Ok(MockHandle {
                id: state.opened.len(),
                state: self.state.clone(),
            })
        }
    }

    impl DatabaseHandle for MockHandle {
        fn export(&mut self, key: &KeyMaterial, path: &Path) -> StoreResult<()> {
            self.record(format!("export {}", path.display()), &[key])
        }

        fn import(&mut self, key: &KeyMaterial, path: &Path) -> StoreResult<()> {
            self.record(format!("import {}", path.display()), &[key])
        }

        fn export_encrypted(&mut self, key: &KeyMaterial, path: &Path) -> StoreResult<()> {
            self.record(format!("export-encrypted {}", path.display()), &[key])
        }

        fn import_encrypted(&mut self, key: &KeyMaterial, path: &Path) -> StoreResult<()> {
            self.record(format!("import-encrypted {}", path.display()), &[key])
        }

        fn change_key(&mut self, old: &KeyMaterial, new: &KeyMaterial) -> StoreResult<()> {
            self.record("change-key".to_string(), &[old, new])
        }

        fn close(&mut self) -> StoreResult<()> {
            let mut state = self.state.lock().unwrap();
            if let Some(err) = state.fail_next.take() {
                return Err(err);
            }
            state.closed.push(self.id);
            Ok(())
        }
    }

    fn new_session() -> (Session<MockBackend>, MockBackend, Capture) {
        let backend = MockBackend::default();
        let (logger, out, _err) = capturing_logger(Level::Info);
        let session = Session::new(backend.clone(), "v1.0.0", Arc::new(logger));
        (session, backend, out)
    }

    fn active_session() -> (Session<MockBackend>, MockBackend, Capture) {
        let (mut session, backend, out) = new_session();
        session.dispatch("init mypassword ./db.dat").unwrap();
        (session, backend, out)
    }

    #[rstest]
    #[case("export k ./out.json")]
    #[case("import k ./in.json")]
    #[case("export-encrypted k ./out.json")]
    #[case("import-encrypted k ./in.json")]
    #[case("change-key old new")]
    fn test_handle_commands_require_init(#[case] line: &str) {
        let (mut session, backend, _out) = new_session();
        let err = session.dispatch(line).unwrap_err();

        assert!(matches!(err, AppError::NotInitialized));
        assert_eq!(
            err.to_string(),
            "database not initialized. Please run 'init' first"
        );
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert!(backend.calls().is_empty());
    }

    #[rstest]
    #[case("export k ./out.json", "export ./out.json")]
    #[case("import k ./in.json", "import ./in.json")]
    #[case("export-encrypted k ./out.json", "export-encrypted ./out.json")]
    #[case("import-encrypted k ./in.json", "import-encrypted ./in.json")]
    #[case("change-key mypassword other", "change-key")]
    fn test_handle_commands_forward_after_init(#[case] line: &str, #[case] call: &str) {
        let (mut session, backend, _out) = active_session();
        assert_eq!(session.dispatch(line).unwrap(), Reply::Silent);
        assert_eq!(backend.calls().last().unwrap(), call);
        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn test_init_then_export_uses_same_derived_key() {
        let (mut session, backend, out) = new_session();
        session.dispatch("init mypassword ./db.dat").unwrap();
        assert_eq!(session.state(), SessionState::Active);
        session.dispatch("export mypassword ./out.json").unwrap();

        let keys = backend.keys();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0], keys[1]);
        assert_eq!(keys[0], generate_key_from_bytes(b"mypassword"));
        assert!(out.contents().contains("Database exported successfully."));
        assert!(!out.contents().contains("mypassword"));
    }

    #[test]
    fn test_sentinel_export_before_init_fails() {
        let (mut session, backend, out) = new_session();
        let err = session.dispatch("export \"\" ./out.json").unwrap_err();
        assert!(matches!(err, AppError::NotInitialized));
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert!(backend.calls().is_empty());
        assert!(out.contents().is_empty());
    }

    #[test]
    fn test_sentinel_key_warns_once_and_uses_empty_key() {
        let (mut session, backend, out) = new_session();
        session.dispatch("init \"\" ./db.dat").unwrap();

        assert!(backend.keys()[0].is_empty());
        let warnings = out.lines().iter().filter(|l| l.contains("WARN:")).count();
        assert_eq!(warnings, 1);
    }

    #[test]
    fn test_generated_key_is_returned_to_the_prompt_only() {
        let (mut session, backend, out) = new_session();
        let long = "x".repeat(40);
        let reply = session.dispatch(&format!("init {} ./db.dat", long)).unwrap();

        let key = backend.keys()[0].clone();
        assert!(!key.is_empty());
        assert_eq!(
            reply,
            Reply::Text(format!(
                "Generated key: {}. Keep it to access this data again.",
                key.to_hex()
            ))
        );
        assert!(!out.contents().contains(&key.to_hex()));
        assert!(out.contents().contains("generated key"));
    }

    #[test]
    fn test_generated_keys_never_reach_log_file() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("session.log");
        let logger = Arc::new(Logger::new(LoggerConfig {
            file_path: Some(log_path.clone()),
            min_level: Level::Info,
            to_console: false,
            to_file: true,
        }));
        let backend = MockBackend::default();
        let mut session = Session::new(backend.clone(), "v1.0.0", logger.clone());

        let init_reply = session
            .dispatch(&format!("init {} ./db.dat", "x".repeat(40)))
            .unwrap();
        let session_key = backend.keys()[0].to_hex();
        assert!(matches!(init_reply, Reply::Text(ref t) if t.contains(&session_key)));

        let rekey_reply = session
            .dispatch(&format!("change-key {} {}", session_key, "z".repeat(40)))
            .unwrap();
        let new_key = backend.keys().last().unwrap().to_hex();
        assert_ne!(new_key, session_key);
        assert!(matches!(rekey_reply, Reply::Text(ref t) if t.contains(&new_key)));
        logger.close();

        let log = std::fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("Database key changed successfully."));
        assert!(!log.contains(&session_key));
        assert!(!log.contains(&new_key));
    }

    #[test]
    fn test_change_key_rejects_unusable_current_key() {
        let (mut session, backend, out) = active_session();
        let calls_before = backend.calls();

        let err = session
            .dispatch(&format!("change-key {} {}", "y".repeat(40), "z".repeat(40)))
            .unwrap_err();

        assert!(matches!(err, AppError::UnusableKey("current")));
        assert_eq!(backend.calls(), calls_before);
        assert_eq!(session.state(), SessionState::Active);
        assert!(!out.contents().contains("generated key"));
    }

    #[test]
    fn test_wrong_arity_leaves_state_unchanged() {
        let (mut session, backend, _out) = active_session();
        let calls_before = backend.calls();

        for command in crate::cli::registry::all() {
            let mut counts = vec![command.arity() + 1];
            if command.arity() > 0 {
                counts.push(command.arity() - 1);
            }
            for count in counts {
                let mut line = command.name.to_string();
                for _ in 0..count {
                    line.push_str(" x");
                }

                let err = session.dispatch(&line).unwrap_err();
                assert!(matches!(err, AppError::Usage(_)), "{:?} for {}", err, line);
                assert_eq!(err.to_string(), format!("usage: {}", command.usage()));
                assert_eq!(session.state(), SessionState::Active);
                assert_eq!(backend.calls(), calls_before);
            }
        }
    }

    #[test]
    fn test_unknown_command_leaves_state_unchanged() {
        let (mut session, backend, _out) = new_session();
        let err = session.dispatch("drop table").unwrap_err();
        assert_eq!(err.to_string(), "unknown command: drop");
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_blank_line_is_silent() {
        let (mut session, backend, _out) = new_session();
        assert_eq!(session.dispatch("   ").unwrap(), Reply::Silent);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_collaborator_error_is_surfaced_verbatim() {
        let (mut session, backend, _out) = active_session();
        backend.fail_next_with(StoreError::InvalidKey(PathBuf::from("./db.dat")));

        let err = session.dispatch("export wrong ./out.json").unwrap_err();
        assert_eq!(err.to_string(), "invalid key for database ./db.dat");
        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn test_failed_init_keeps_prior_state() {
        let (mut session, backend, _out) = new_session();
        backend.fail_open_with(StoreError::Decrypt(PathBuf::from("./db.dat")));
        assert!(session.dispatch("init k ./db.dat").is_err());
        assert_eq!(session.state(), SessionState::Uninitialized);

        session.dispatch("init k ./db.dat").unwrap();
        backend.fail_open_with(StoreError::Decrypt(PathBuf::from("./other.dat")));
        assert!(session.dispatch("init k ./other.dat").is_err());
        assert_eq!(session.state(), SessionState::Active);
        assert!(backend.closed().is_empty());
    }

    #[test]
    fn test_reinit_closes_previous_handle() {
        let (mut session, backend, _out) = active_session();
        session.dispatch("init other ./other.dat").unwrap();

        assert_eq!(backend.closed(), vec![1]);
        assert_eq!(session.state(), SessionState::Active);

        session.shutdown().unwrap();
        assert_eq!(backend.closed(), vec![1, 2]);
    }

    #[test]
    fn test_shutdown_closes_handle_exactly_once() {
        let (mut session, backend, _out) = active_session();
        session.shutdown().unwrap();
        session.shutdown().unwrap();

        assert_eq!(backend.closed(), vec![1]);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_shutdown_without_handle() {
        let (mut session, backend, _out) = new_session();
        session.shutdown().unwrap();
        assert!(backend.closed().is_empty());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_closed_session_rejects_handle_commands() {
        let (mut session, backend, _out) = active_session();
        session.shutdown().unwrap();

        assert!(matches!(
            session.dispatch("export k ./out.json"),
            Err(AppError::SessionClosed)
        ));
        assert!(matches!(
            session.dispatch("init k ./db.dat"),
            Err(AppError::SessionClosed)
        ));
        assert_eq!(backend.calls(), vec!["open ./db.dat".to_string()]);
    }

    #[test]
    fn test_key_from_is_deterministic_and_input_sensitive() {
        let (mut session, _backend, _out) = new_session();
        let abc = session.dispatch("key-from abc").unwrap();
        let abc_again = session.dispatch("key-from abc").unwrap();
        let abcd = session.dispatch("key-from abcd").unwrap();

        assert_eq!(abc, abc_again);
        assert_ne!(abc, abcd);
        assert_eq!(
            abc,
            Reply::Text(generate_key_from_bytes(b"abc").to_hex())
        );
    }

    #[test]
    fn test_new_key_is_fresh_hex() {
        let (mut session, _backend, _out) = new_session();
        let (Reply::Text(a), Reply::Text(b)) = (
            session.dispatch("new-key").unwrap(),
            session.dispatch("new-key").unwrap(),
        ) else {
            panic!("new-key should reply with text");
        };
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert!(hex::decode(&a).is_ok());
    }

    #[test]
    fn test_informational_commands() {
        let (mut session, backend, _out) = new_session();
        assert_eq!(
            session.dispatch("version").unwrap(),
            Reply::Text("PolarysDB CLI Version: v1.0.0".to_string())
        );
        match session.dispatch("help").unwrap() {
            Reply::Text(text) => {
                for command in crate::cli::registry::all() {
                    assert!(text.contains(command.name));
                    assert!(text.contains(command.description));
                }
            },
            other => panic!("unexpected reply {:?}", other),
        }
        assert_eq!(session.dispatch("exit").unwrap(), Reply::Exit);
        assert!(backend.calls().is_empty());
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[test]
    fn test_exit_does_not_close_handle_itself() {
        let (mut session, backend, _out) = active_session();
        assert_eq!(session.dispatch("exit").unwrap(), Reply::Exit);
        assert!(backend.closed().is_empty());
        assert_eq!(session.state(), SessionState::Active);
    }
}
