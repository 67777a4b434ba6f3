//! # Watch Processes
//!
//! `--watch` starts a long-running rebuild command (`npm run watch` by
//! default) in each swapped package so edits to the local checkout are
//! picked up without re-running the tool. The processes outlive the
//! invocation that started them, so they are tracked in a JSON registry
//! shared by every invocation:
//!
//! ```json
//! {"shakapacker": {"pid": 4242, "command": "npm run watch", "started_at": 1718000000}}
//! ```
//!
//! ## Registry
//!
//! All access goes through `RegistryStore`. `JsonFileRegistry` holds an
//! exclusive `fs2` lock on the registry file for each read-modify-write, and
//! only for that long: the lock is never held while a process is being
//! started. A registry that fails to parse is logged and replaced rather
//! than aborting the run.
//!
//! ## Validity
//!
//! A record only counts while its pid is alive and the live command line
//! still contains the watch signature. Stale records are filtered out of
//! `list` without rewriting the file; the next `spawn`, `stop` or
//! `kill_all` cleans them up.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fs2::FileExt;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::process::{self, Termination};

/// Default time a new watch process must survive before it is recorded.
pub const DEFAULT_VERIFY_DELAY: Duration = Duration::from_secs(2);

/// Registry value for one gem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub pid: u32,
    pub command: String,
    /// Seconds since the Unix epoch.
    pub started_at: u64,
}

/// Registry contents keyed by gem name.
pub type Registry = BTreeMap<String, RegistryEntry>;

/// A tracked watch process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchProcessRecord {
    pub gem_name: String,
    pub pid: u32,
    pub command: String,
    pub started_at: u64,
}

impl WatchProcessRecord {
    fn from_entry(gem_name: &str, entry: &RegistryEntry) -> Self {
        Self {
            gem_name: gem_name.to_string(),
            pid: entry.pid,
            command: entry.command.clone(),
            started_at: entry.started_at,
        }
    }
}

/// Persistent storage for the registry.
pub trait RegistryStore {
    /// Current registry; missing or unreadable contents yield an empty map.
    fn load(&self) -> Result<Registry>;

    /// Locked read-modify-write of the whole registry.
    fn update(&self, apply: &mut dyn FnMut(&mut Registry)) -> Result<()>;
}

/// `RegistryStore` backed by a JSON file guarded by an advisory lock.
#[derive(Debug, Clone)]
pub struct JsonFileRegistry {
    path: PathBuf,
}

impl JsonFileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn registry_error(&self, message: impl Into<String>) -> Error {
        Error::Registry {
            path: self.path.clone(),
            message: message.into(),
        }
    }

    fn parse(&self, content: &str) -> Registry {
        if content.trim().is_empty() {
            return Registry::new();
        }
        match serde_json::from_str(content) {
            Ok(registry) => registry,
            Err(e) => {
                warn!(
                    "Ignoring corrupt watch registry {}: {}",
                    self.path.display(),
                    e
                );
                Registry::new()
            }
        }
    }

    fn read_locked(&self, file: &mut File) -> Result<Registry> {
        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| self.registry_error(format!("read failed: {e}")))?;
        Ok(self.parse(&content))
    }
}

impl RegistryStore for JsonFileRegistry {
    fn load(&self) -> Result<Registry> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Registry::new()),
            Err(e) => return Err(self.registry_error(format!("open failed: {e}"))),
        };
        FileExt::lock_shared(&file).map_err(|e| self.registry_error(format!("lock failed: {e}")))?;
        let registry = self.read_locked(&mut file);
        let _ = FileExt::unlock(&file);
        registry
    }

    fn update(&self, apply: &mut dyn FnMut(&mut Registry)) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| self.registry_error(format!("open failed: {e}")))?;

        // Released when `file` is dropped
        FileExt::lock_exclusive(&file)
            .map_err(|e| self.registry_error(format!("lock failed: {e}")))?;

        let mut registry = self.read_locked(&mut file)?;
        apply(&mut registry);

        let json = serde_json::to_string_pretty(&registry)?;
        file.set_len(0)
            .and_then(|_| file.seek(SeekFrom::Start(0)).map(|_| ()))
            .and_then(|_| file.write_all(json.as_bytes()))
            .and_then(|_| file.sync_all())
            .map_err(|e| self.registry_error(format!("write failed: {e}")))?;
        debug!(
            "Wrote watch registry {} ({} entries)",
            self.path.display(),
            registry.len()
        );
        Ok(())
    }
}

/// The command started for each watched package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Tokens that must all appear in a live process's command line for a
    /// record to be trusted.
    pub signature: Vec<String>,
}

impl Default for WatchCommand {
    fn default() -> Self {
        Self {
            program: "npm".to_string(),
            args: vec!["run".to_string(), "watch".to_string()],
            signature: vec!["npm".to_string(), "watch".to_string()],
        }
    }
}

impl WatchCommand {
    /// The command as recorded in the registry.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Outcome of `kill_all` / `stop`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KillReport {
    pub killed: Vec<WatchProcessRecord>,
    /// Already exited, or the pid now belongs to an unrelated process.
    pub already_gone: Vec<WatchProcessRecord>,
    /// Could not be signalled (owned by another user).
    pub denied: Vec<WatchProcessRecord>,
}

impl KillReport {
    pub fn is_empty(&self) -> bool {
        self.killed.is_empty() && self.already_gone.is_empty() && self.denied.is_empty()
    }
}

/// Starts, lists and stops watch processes.
pub struct WatchManager {
    registry: Box<dyn RegistryStore>,
    log_dir: PathBuf,
    command: WatchCommand,
    verify_delay: Duration,
}

impl WatchManager {
    pub fn new(registry: Box<dyn RegistryStore>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            log_dir: log_dir.into(),
            command: WatchCommand::default(),
            verify_delay: DEFAULT_VERIFY_DELAY,
        }
    }

    /// Registry at `<cache_root>/watch_pids.json`, logs in
    /// `<cache_root>/watch_logs/`.
    pub fn in_cache_root(cache_root: &Path) -> Self {
        Self::new(
            Box::new(JsonFileRegistry::new(cache_root.join("watch_pids.json"))),
            cache_root.join("watch_logs"),
        )
    }

    pub fn with_command(mut self, command: WatchCommand) -> Self {
        self.command = command;
        self
    }

    pub fn with_verify_delay(mut self, delay: Duration) -> Self {
        self.verify_delay = delay;
        self
    }

    pub fn command(&self) -> &WatchCommand {
        &self.command
    }

    /// Log file for `gem_name`'s watch process.
    pub fn log_path(&self, gem_name: &str) -> PathBuf {
        self.log_dir.join(format!("{gem_name}.log"))
    }

    /// Start the watch command for `gem_name` in `working_directory` and
    /// record it once it has survived the verification delay.
    pub fn spawn(&self, gem_name: &str, working_directory: &Path) -> Result<WatchProcessRecord> {
        let build_error = |message: String| Error::Build {
            target: gem_name.to_string(),
            message,
        };

        fs::create_dir_all(&self.log_dir)?;
        let log_path = self.log_path(gem_name);
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;
        let log_err = log.try_clone()?;

        let mut command = Command::new(&self.command.program);
        command
            .args(&self.command.args)
            .current_dir(working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err));
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        debug!(
            "Starting '{}' for {} in {}",
            self.command.display(),
            gem_name,
            working_directory.display()
        );
        let mut child = command.spawn().map_err(|e| {
            build_error(format!(
                "could not start '{}': {e}",
                self.command.display()
            ))
        })?;
        let pid = child.id();

        thread::sleep(self.verify_delay);
        if let Some(status) = child.try_wait()? {
            return Err(build_error(format!(
                "watch process {pid} exited during startup ({status}); see {}",
                log_path.display()
            )));
        }

        // Reap the child when it eventually exits
        thread::spawn(move || {
            let _ = child.wait();
        });

        let entry = RegistryEntry {
            pid,
            command: self.command.display(),
            started_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        };
        let signature = self.command.signature.clone();
        let recorded = self.registry.update(&mut |registry| {
            registry.retain(|_, e| process::matches_signature(e.pid, &signature));
            registry.insert(gem_name.to_string(), entry.clone());
        });
        if let Err(e) = recorded {
            let _ = process::terminate_group(pid);
            return Err(e);
        }

        info!(
            "Started watch for {} (pid {}), logging to {}",
            gem_name,
            pid,
            log_path.display()
        );
        Ok(WatchProcessRecord::from_entry(gem_name, &entry))
    }

    fn is_valid(&self, entry: &RegistryEntry) -> bool {
        process::matches_signature(entry.pid, &self.command.signature)
    }

    /// Valid records, sorted by gem name. Does not rewrite the registry.
    pub fn list(&self) -> Result<Vec<WatchProcessRecord>> {
        Ok(self
            .registry
            .load()?
            .iter()
            .filter(|(_, entry)| self.is_valid(entry))
            .map(|(gem, entry)| WatchProcessRecord::from_entry(gem, entry))
            .collect())
    }

    /// The live record for `gem_name`, if any.
    pub fn running(&self, gem_name: &str) -> Result<Option<WatchProcessRecord>> {
        Ok(self
            .list()?
            .into_iter()
            .find(|record| record.gem_name == gem_name))
    }

    /// Terminate every tracked process and clear the registry.
    pub fn kill_all(&self) -> Result<KillReport> {
        let mut drained = Registry::new();
        self.registry
            .update(&mut |registry| drained = std::mem::take(registry))?;
        Ok(self.terminate(drained))
    }

    /// Terminate the processes recorded for `gem_names` and drop their
    /// records.
    pub fn stop(&self, gem_names: &[String]) -> Result<KillReport> {
        let mut drained = Registry::new();
        self.registry.update(&mut |registry| {
            for name in gem_names {
                if let Some(entry) = registry.remove(name) {
                    drained.insert(name.clone(), entry);
                }
            }
        })?;
        Ok(self.terminate(drained))
    }

    fn terminate(&self, entries: Registry) -> KillReport {
        let mut report = KillReport::default();
        for (gem, entry) in &entries {
            let record = WatchProcessRecord::from_entry(gem, entry);
            if !self.is_valid(entry) {
                debug!("Watch record for {} (pid {}) is stale", gem, entry.pid);
                report.already_gone.push(record);
                continue;
            }
            match process::terminate_group(entry.pid) {
                Ok(Termination::Signalled) => {
                    info!("Stopped watch for {} (pid {})", gem, entry.pid);
                    report.killed.push(record);
                }
                Ok(Termination::AlreadyGone) => report.already_gone.push(record),
                Ok(Termination::Denied) => {
                    warn!(
                        "Permission denied stopping watch for {} (pid {})",
                        gem, entry.pid
                    );
                    report.denied.push(record);
                }
                Err(e) => {
                    warn!("Could not stop watch for {}: {}", gem, e);
                    report.denied.push(record);
                }
            }
        }
        report
    }
}
