//! Prompt templates for filesystem-style operations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A filesystem action to be carried out by the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum FileSystemOperation {
    CreateFile { path: String, content: String },
    ReadFile { path: String },
    ModifyFile { path: String, description: String },
    DeleteFile { path: String },
    ListDirectory { path: String },
}

impl FileSystemOperation {
    /// Command name recorded in the audit context.
    pub fn command(&self) -> &'static str {
        match self {
            FileSystemOperation::CreateFile { .. } => "create_file",
            FileSystemOperation::ReadFile { .. } => "read_file",
            FileSystemOperation::ModifyFile { .. } => "modify_file",
            FileSystemOperation::DeleteFile { .. } => "delete_file",
            FileSystemOperation::ListDirectory { .. } => "list_directory",
        }
    }

    pub fn path(&self) -> &str {
        match self {
            FileSystemOperation::CreateFile { path, .. }
            | FileSystemOperation::ReadFile { path }
            | FileSystemOperation::ModifyFile { path, .. }
            | FileSystemOperation::DeleteFile { path }
            | FileSystemOperation::ListDirectory { path } => path,
        }
    }

    /// Natural-language prompt for the generator.
    pub fn prompt(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FileSystemOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSystemOperation::CreateFile { path, content } => write!(
                f,
                "Create a file at path \"{path}\" with the following content:\n{content}"
            ),
            FileSystemOperation::ReadFile { path } => {
                write!(f, "Read the contents of the file at path \"{path}\"")
            }
            FileSystemOperation::ModifyFile { path, description } => {
                write!(f, "Modify the file at path \"{path}\". {description}")
            }
            FileSystemOperation::DeleteFile { path } => {
                write!(f, "Delete the file at path \"{path}\"")
            }
            FileSystemOperation::ListDirectory { path } => {
                write!(f, "List the contents of the directory at path \"{path}\"")
            }
        }
    }
}
