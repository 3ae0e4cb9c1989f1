//! Local persistence for the launched-instance record.
//!
//! `StateFile` keeps one JSON document under `~/.kiln/` remembering the
//! last launched instance. Writes land in a scratch file in the same
//! directory and are renamed over the live file, so a reader sees either
//! the old record or the new one, never a torn write. Blocking filesystem
//! calls run on tokio's blocking pool.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::InstanceStore;
use crate::domain::instance::{InstanceRecord, validate_instance_id};

const RECORD_FILE: &str = "state.json";
const SCRATCH_FILE: &str = "state.json.partial";

/// Handle to the on-disk instance record.
pub struct StateFile {
    dir: PathBuf,
}

impl StateFile {
    /// Open the default location, `~/.kiln/`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn open_default() -> Result<Self> {
        let home = dirs::home_dir().context("cannot determine home directory")?;
        Ok(Self::in_dir(home.join(".kiln")))
    }

    /// Open a state file kept in an explicit directory.
    #[must_use]
    pub fn in_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn record_path(&self) -> PathBuf {
        self.dir.join(RECORD_FILE)
    }

    /// Forget the remembered instance. Forgetting twice is fine.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be removed.
    pub fn forget(&self) -> Result<()> {
        let path = self.record_path();
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
        }
    }
}

fn read_record(path: &Path) -> Result<Option<InstanceRecord>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    let record: InstanceRecord =
        serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))?;
    validate_instance_id(&record.instance_id)?;
    Ok(Some(record))
}

fn write_record(dir: &Path, record: &InstanceRecord) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let scratch = dir.join(SCRATCH_FILE);
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(&scratch)
        .with_context(|| format!("creating {}", scratch.display()))?;
    serde_json::to_writer_pretty(&mut file, record).context("encoding instance record")?;
    // Flush before the rename so a crash cannot publish an empty record.
    file.sync_all()
        .with_context(|| format!("flushing {}", scratch.display()))?;
    drop(file);

    let live = dir.join(RECORD_FILE);
    std::fs::rename(&scratch, &live).with_context(|| format!("replacing {}", live.display()))
}

impl InstanceStore for StateFile {
    async fn load_async(&self) -> Result<Option<InstanceRecord>> {
        let path = self.record_path();
        tokio::task::spawn_blocking(move || read_record(&path))
            .await
            .context("state read task panicked")?
    }

    async fn save_async(&self, record: &InstanceRecord) -> Result<()> {
        let dir = self.dir.clone();
        let record = record.clone();
        tokio::task::spawn_blocking(move || write_record(&dir, &record))
            .await
            .context("state write task panicked")?
    }
}
