use std::{
    cell::RefCell,
    fs,
    io::{self, Write as _},
    path::{Path, PathBuf},
    rc::Rc,
};

use tempfile::NamedTempFile;

/// Trait for persisting generated test modules.
///
/// Called with the complete module text every time it changes; implementations replace
/// whatever they held for the class before.
pub trait ArtifactWriter {
    /// Stores the module generated for `class_name`.
    ///
    /// # Arguments
    /// * `class_name` - The instrumented class the module tests.
    /// * `module` - Full Python source of the test module.
    fn write_module(&mut self, class_name: &str, module: &str) -> io::Result<()>;
}

/// Writes `test_<Class>.py` files into a directory.
///
/// Each write goes to a temporary file next to the target and is then renamed over it,
/// so the file on disk is always a complete module.
#[derive(Debug, Clone)]
pub struct FileWriter {
    dir: PathBuf,
}

impl FileWriter {
    /// Creates a writer targeting `dir`, which is created on first write if missing.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the module generated for `class_name`.
    #[must_use]
    pub fn module_path(&self, class_name: &str) -> PathBuf {
        self.dir.join(format!("test_{class_name}.py"))
    }
}

impl ArtifactWriter for FileWriter {
    fn write_module(&mut self, class_name: &str, module: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let target = self.module_path(class_name);
        let mut temp = NamedTempFile::new_in(&self.dir)?;
        temp.write_all(module.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&target).map_err(|e| e.error)?;
        tracing::debug!(path = %target.display(), bytes = module.len(), "test module written");
        Ok(())
    }
}

/// An `ArtifactWriter` that keeps the latest module in memory.
///
/// Useful for testing or for callers that persist modules themselves.
#[derive(Debug, Default)]
pub struct CollectStringWriter {
    latest: Option<String>,
    writes: usize,
}

impl CollectStringWriter {
    /// Creates a new empty `CollectStringWriter`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the most recently written module, if any.
    #[must_use]
    pub fn output(&self) -> Option<&str> {
        self.latest.as_deref()
    }

    /// Number of writes received so far.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Consumes the writer and returns the latest module.
    #[must_use]
    pub fn into_output(self) -> Option<String> {
        self.latest
    }
}

impl ArtifactWriter for CollectStringWriter {
    fn write_module(&mut self, _class_name: &str, module: &str) -> io::Result<()> {
        self.latest = Some(module.to_owned());
        self.writes += 1;
        Ok(())
    }
}

/// `ArtifactWriter` that discards every module.
#[derive(Debug, Default)]
pub struct NoWriter;

impl ArtifactWriter for NoWriter {
    fn write_module(&mut self, _class_name: &str, _module: &str) -> io::Result<()> {
        Ok(())
    }
}

/// A shared writer: the caller keeps a clone of the handle to read what was written.
impl<W: ArtifactWriter> ArtifactWriter for Rc<RefCell<W>> {
    fn write_module(&mut self, class_name: &str, module: &str) -> io::Result<()> {
        self.borrow_mut().write_module(class_name, module)
    }
}
