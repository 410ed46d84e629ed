//! I/O boundary traits for testability
//!
//! These traits abstract host I/O operations, allowing backends
//! to be tested with substitute implementations.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::time::Duration;

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Read file contents to string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Write string content to file, replacing it.
    fn write(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Append string content to file, creating it if needed.
    fn append(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a file.
    fn is_file(&self, path: &Path) -> bool;

    /// Check if path is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Create directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Remove a file.
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Create parent directories if needed.
    fn ensure_parent(&self, path: &Path) -> io::Result<()>;

    /// Change owner and/or group of a path.
    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> io::Result<()>;
}

/// A command to run: argv, environment, working directory and identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub argv: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl Invocation {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    fn command(&self) -> io::Result<Command> {
        use std::os::unix::process::CommandExt;

        let (program, args) = self.argv.split_first().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "empty command line")
        })?;

        let mut command = Command::new(program);
        command.args(args).envs(&self.env).stdin(Stdio::null());
        if let Some(dir) = &self.cwd {
            command.current_dir(dir);
        }
        if let Some(gid) = self.gid {
            command.gid(gid);
        }
        if let Some(uid) = self.uid {
            command.uid(uid);
        }
        Ok(command)
    }
}

/// Output of a command whose stdout and stderr share one stream.
#[derive(Debug, Clone)]
pub struct CombinedOutput {
    pub status: ExitStatus,
    pub output: String,
}

/// External command runner abstraction.
pub trait CommandRunner: Send + Sync {
    /// Run to completion, capturing stdout and stderr separately.
    fn run(&self, invocation: &Invocation) -> io::Result<Output>;

    /// Run to completion with stderr merged into stdout, in emission order.
    fn run_combined(&self, invocation: &Invocation) -> io::Result<CombinedOutput>;

    /// Start a long-running process in its own process group.
    ///
    /// Output goes to `log` (appended) when given, otherwise it is discarded.
    fn spawn(&self, invocation: &Invocation, log: Option<&Path>) -> io::Result<Child>;
}

/// Blocking delay, injectable so retry loops can be tested without waiting.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        std::fs::write(path, content)
    }

    fn append(&self, path: &Path, content: &str) -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(content.as_bytes())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                self.create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> io::Result<()> {
        use nix::unistd::{Gid, Uid};

        nix::unistd::chown(path, uid.map(Uid::from_raw), gid.map(Gid::from_raw))
            .map_err(io::Error::from)
    }
}

/// Real command runner implementation.
#[derive(Debug, Default)]
pub struct RealCommandRunner;

impl CommandRunner for RealCommandRunner {
    fn run(&self, invocation: &Invocation) -> io::Result<Output> {
        invocation
            .command()?
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
    }

    fn run_combined(&self, invocation: &Invocation) -> io::Result<CombinedOutput> {
        // Close-on-exec so services spawned meanwhile do not inherit the write end.
        let (reader, writer) =
            nix::unistd::pipe2(nix::fcntl::OFlag::O_CLOEXEC).map_err(io::Error::from)?;
        let writer_err = writer.try_clone()?;

        let mut command = invocation.command()?;
        command
            .stdout(Stdio::from(writer))
            .stderr(Stdio::from(writer_err));
        let mut child = command.spawn()?;
        // Release our copies of the write end, otherwise the read never sees EOF.
        drop(command);

        let mut bytes = Vec::new();
        File::from(reader).read_to_end(&mut bytes)?;
        let status = child.wait()?;

        Ok(CombinedOutput {
            status,
            output: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    fn spawn(&self, invocation: &Invocation, log: Option<&Path>) -> io::Result<Child> {
        use std::os::unix::process::CommandExt;

        let mut command = invocation.command()?;
        command.process_group(0);

        match log {
            Some(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                let file_err = file.try_clone()?;
                command.stdout(Stdio::from(file)).stderr(Stdio::from(file_err));
            }
            None => {
                command.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        command.spawn()
    }
}

/// Real sleeper backed by the current thread.
#[derive(Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
