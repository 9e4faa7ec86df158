// connector.rs — Filesystem operations confined to a sandbox directory.
//
// Each operation is a tg_gate::Operation, so it only ever runs when the gate
// kernel invokes it with its capability:
//
//   filesystem.writeFile  { path, content } → { ok, path, bytes }
//   filesystem.readFile   { path }          → { ok, path, content }
//   filesystem.deleteFile { path }          → { ok, deleted }
//
// Paths are relative to the sandbox root. Absolute paths, `..` segments and
// anything under a protected directory (the gate's own state) are rejected
// before touching the disk.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use serde_json::{json, Value};
use tg_gate::{Capability, GateKernelBuilder, Operation, OperationError};

use crate::error::FsConnectorError;

pub const WRITE_FILE: &str = "filesystem.writeFile";
pub const READ_FILE: &str = "filesystem.readFile";
pub const DELETE_FILE: &str = "filesystem.deleteFile";

/// The directory every filesystem operation is confined to.
#[derive(Debug, Clone)]
pub struct FsSandbox {
    root: PathBuf,
    protected: Vec<PathBuf>,
}

impl FsSandbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            protected: Vec::new(),
        }
    }

    /// Refuse every path at or under `dir`, even when it is inside the root.
    pub fn with_protected(mut self, dir: impl Into<PathBuf>) -> Self {
        self.protected.push(dir.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path inside the sandbox. Rejects traversal.
    pub fn resolve(&self, relative_path: &str) -> Result<PathBuf, FsConnectorError> {
        let rel = Path::new(relative_path);
        let confined = !relative_path.trim().is_empty()
            && !relative_path.contains('\0')
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !confined {
            return Err(FsConnectorError::PathTraversal {
                path: relative_path.to_string(),
            });
        }
        let abs = self.root.join(rel);
        if self.protected.iter().any(|dir| abs.starts_with(dir)) {
            return Err(FsConnectorError::Protected {
                path: relative_path.to_string(),
            });
        }
        Ok(abs)
    }

    /// Bind all three operations into a kernel builder.
    pub fn bind(&self, builder: GateKernelBuilder) -> GateKernelBuilder {
        builder
            .with_operation(WRITE_FILE, WriteFile::new(self.clone()))
            .with_operation(READ_FILE, ReadFile::new(self.clone()))
            .with_operation(DELETE_FILE, DeleteFile::new(self.clone()))
    }
}

fn parse<T: for<'de> Deserialize<'de>>(args: &Value) -> Result<T, FsConnectorError> {
    serde_json::from_value(args.clone()).map_err(|e| FsConnectorError::InvalidArguments(e.to_string()))
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> FsConnectorError + '_ {
    move |source| FsConnectorError::IoError {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Deserialize)]
struct WriteArgs {
    path: String,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct PathArgs {
    path: String,
}

/// `filesystem.writeFile`: create or replace a file, creating parent dirs.
pub struct WriteFile {
    sandbox: FsSandbox,
}

impl WriteFile {
    pub fn new(sandbox: FsSandbox) -> Self {
        Self { sandbox }
    }

    fn run(&self, args: &Value) -> Result<Value, FsConnectorError> {
        let WriteArgs { path, content } = parse(args)?;
        let abs = self.sandbox.resolve(&path)?;
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        fs::write(&abs, &content).map_err(io_error(&abs))?;
        tracing::debug!("wrote {} bytes to {}", content.len(), abs.display());
        Ok(json!({ "ok": true, "path": path, "bytes": content.len() }))
    }
}

impl Operation for WriteFile {
    fn invoke(&self, _cap: &Capability, args: &Value) -> Result<Value, OperationError> {
        Ok(self.run(args)?)
    }
}

/// `filesystem.readFile`: read a UTF-8 file.
pub struct ReadFile {
    sandbox: FsSandbox,
}

impl ReadFile {
    pub fn new(sandbox: FsSandbox) -> Self {
        Self { sandbox }
    }

    fn run(&self, args: &Value) -> Result<Value, FsConnectorError> {
        let PathArgs { path } = parse(args)?;
        let abs = self.sandbox.resolve(&path)?;
        let content = fs::read_to_string(&abs).map_err(io_error(&abs))?;
        Ok(json!({ "ok": true, "path": path, "content": content }))
    }
}

impl Operation for ReadFile {
    fn invoke(&self, _cap: &Capability, args: &Value) -> Result<Value, OperationError> {
        Ok(self.run(args)?)
    }
}

/// `filesystem.deleteFile`: remove a file.
pub struct DeleteFile {
    sandbox: FsSandbox,
}

impl DeleteFile {
    pub fn new(sandbox: FsSandbox) -> Self {
        Self { sandbox }
    }

    fn run(&self, args: &Value) -> Result<Value, FsConnectorError> {
        let PathArgs { path } = parse(args)?;
        let abs = self.sandbox.resolve(&path)?;
        fs::remove_file(&abs).map_err(io_error(&abs))?;
        tracing::debug!("deleted {}", abs.display());
        Ok(json!({ "ok": true, "deleted": path }))
    }
}

impl Operation for DeleteFile {
    fn invoke(&self, _cap: &Capability, args: &Value) -> Result<Value, OperationError> {
        Ok(self.run(args)?)
    }
}
