//! Task configuration file: named source/target pairs with options and
//! ignore rules.
//!
//! The file is JSON holding either a single task object or an array of
//! them:
//!
//! ```json
//! [
//!   {
//!     "name": "Documents_Backup",
//!     "enabled": true,
//!     "source_dir": "/home/me/Documents",
//!     "target_dir": "/mnt/backup/Documents",
//!     "options": { "delete_extra": true, "compare_content": true },
//!     "ignore": { "file": ".syncignore", "patterns": ["*.tmp", "temp/"] }
//!   }
//! ]
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::filter::PathMatcher;
use crate::sync::{MirrorJob, SyncOptions};
use crate::{Error, Result};

fn default_enabled() -> bool {
    true
}

/// Where a task's ignore rules come from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreSpec {
    /// Rule file; relative paths are resolved against the source directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// Inline patterns, evaluated after the file's rules.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,
}

/// One configured synchronization task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
    #[serde(default)]
    pub options: SyncOptions,
    #[serde(default)]
    pub ignore: IgnoreSpec,
}

impl TaskConfig {
    /// Enabled task with default options and no ignore rules.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        source_dir: impl Into<PathBuf>,
        target_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            source_dir: source_dir.into(),
            target_dir: target_dir.into(),
            options: SyncOptions::default(),
            ignore: IgnoreSpec::default(),
        }
    }

    /// Check the fields that cannot be checked by deserialization.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty name or directory, or when
    /// source and target are the same path.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("task name cannot be empty"));
        }
        if self.source_dir.as_os_str().is_empty() {
            return Err(Error::validation(format!(
                "task '{}': source_dir cannot be empty",
                self.name
            )));
        }
        if self.target_dir.as_os_str().is_empty() {
            return Err(Error::validation(format!(
                "task '{}': target_dir cannot be empty",
                self.name
            )));
        }
        if self.source_dir == self.target_dir {
            return Err(Error::validation(format!(
                "task '{}': source and target are the same directory",
                self.name
            )));
        }
        Ok(())
    }

    /// Resolved path of the ignore file, if one is configured.
    #[must_use]
    pub fn ignore_file(&self) -> Option<PathBuf> {
        self.ignore.file.as_ref().map(|file| {
            if file.is_absolute() {
                file.clone()
            } else {
                self.source_dir.join(file)
            }
        })
    }

    /// Compile the task's ignore rules: file rules first, then inline ones.
    ///
    /// A configured file that does not exist is skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a pattern is invalid.
    pub fn matcher(&self) -> Result<PathMatcher> {
        let mut matcher = PathMatcher::empty();

        if let Some(file) = self.ignore_file() {
            if file.is_file() {
                let added = matcher.extend_from_file(&file)?;
                tracing::debug!(task = %self.name, path = %file.display(), rules = added, "Loaded ignore file");
            } else {
                tracing::warn!(task = %self.name, path = %file.display(), "Ignore file not found");
            }
        }

        for pattern in &self.ignore.patterns {
            matcher.add_pattern(pattern)?;
        }
        Ok(matcher)
    }

    /// Build the job this task describes.
    ///
    /// # Errors
    ///
    /// Returns an error if the task is invalid, the source directory does
    /// not exist, or the ignore rules cannot be compiled.
    pub fn job(&self) -> Result<MirrorJob> {
        self.validate()?;
        MirrorJob::new(
            &self.source_dir,
            &self.target_dir,
            Arc::new(self.matcher()?),
            self.options,
        )
    }
}

/// Selects a task by position or by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRef<'a> {
    Index(usize),
    Name(&'a str),
}

impl From<usize> for TaskRef<'_> {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl<'a> From<&'a str> for TaskRef<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

impl fmt::Display for TaskRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "#{i}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Partial update applied by [`TaskSet::update_task`].
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub name: Option<String>,
    pub enabled: Option<bool>,
    pub source_dir: Option<PathBuf>,
    pub target_dir: Option<PathBuf>,
    pub delete_extra: Option<bool>,
    pub compare_content: Option<bool>,
    pub ignore_file: Option<Option<PathBuf>>,
    pub ignore_patterns: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TaskFile {
    Many(Vec<TaskConfig>),
    One(TaskConfig),
}

/// The ordered tasks of one configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSet {
    tasks: Vec<TaskConfig>,
}

impl TaskSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a task file.
    ///
    /// Tasks without a name are called `Task_<n>` after their position.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file is missing, is not valid
    /// JSON of the expected shape, or contains an invalid task.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "cannot read configuration file '{}': {e}",
                path.display()
            ))
        })?;

        let set = Self::parse(&text).map_err(|e| match e {
            Error::Config(msg) => Error::config(format!("'{}': {msg}", path.display())),
            other => other,
        })?;
        tracing::info!(path = %path.display(), tasks = set.len(), "Loaded task configuration");
        Ok(set)
    }

    /// Parse task JSON text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the text is malformed or a task is
    /// invalid.
    pub fn parse(text: &str) -> Result<Self> {
        let file: TaskFile = serde_json::from_str(text)
            .map_err(|e| Error::config(format!("invalid task configuration: {e}")))?;
        let mut tasks = match file {
            TaskFile::Many(tasks) => tasks,
            TaskFile::One(task) => vec![task],
        };

        for (idx, task) in tasks.iter_mut().enumerate() {
            if task.name.trim().is_empty() {
                task.name = format!("Task_{}", idx + 1);
            }
            task.validate()
                .map_err(|e| Error::config(format!("invalid task configuration: {e}")))?;
        }
        Ok(Self { tasks })
    }

    /// Write the tasks as a pretty JSON array, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(&self.tasks)
            .map_err(|e| Error::internal(format!("failed to serialize tasks: {e}")))?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), tasks = self.len(), "Saved task configuration");
        Ok(())
    }

    /// Append a task. Relative directories are made absolute against the
    /// current directory and an empty name becomes `Task_<n>`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the task is invalid or its name is
    /// already taken.
    pub fn add_task(&mut self, mut task: TaskConfig) -> Result<&TaskConfig> {
        if task.name.trim().is_empty() {
            task.name = format!("Task_{}", self.tasks.len() + 1);
        }
        task.source_dir = absolutize(&task.source_dir)?;
        task.target_dir = absolutize(&task.target_dir)?;
        task.validate()?;

        if self.find(&task.name).is_some() {
            return Err(Error::validation(format!(
                "task '{}' already exists",
                task.name
            )));
        }

        self.tasks.push(task);
        let idx = self.tasks.len() - 1;
        Ok(&self.tasks[idx])
    }

    /// Remove a task and return it.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no task matches.
    pub fn remove_task<'a>(&mut self, task: impl Into<TaskRef<'a>>) -> Result<TaskConfig> {
        let task = task.into();
        let idx = self.position(task)?;
        Ok(self.tasks.remove(idx))
    }

    /// Apply the fields set in `update` to a task.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no task matches, or a validation
    /// error if the updated task would be invalid. The task is unchanged on
    /// error.
    pub fn update_task<'a>(
        &mut self,
        task: impl Into<TaskRef<'a>>,
        update: TaskUpdate,
    ) -> Result<()> {
        let idx = self.position(task.into())?;
        let mut updated = self.tasks[idx].clone();

        if let Some(name) = update.name {
            if self
                .tasks
                .iter()
                .enumerate()
                .any(|(i, t)| i != idx && t.name == name)
            {
                return Err(Error::validation(format!("task '{name}' already exists")));
            }
            updated.name = name;
        }
        if let Some(enabled) = update.enabled {
            updated.enabled = enabled;
        }
        if let Some(source_dir) = update.source_dir {
            updated.source_dir = source_dir;
        }
        if let Some(target_dir) = update.target_dir {
            updated.target_dir = target_dir;
        }
        if let Some(delete_extra) = update.delete_extra {
            updated.options.delete_extra = delete_extra;
        }
        if let Some(compare_content) = update.compare_content {
            updated.options.compare_by_content = compare_content;
        }
        if let Some(file) = update.ignore_file {
            updated.ignore.file = file;
        }
        if let Some(patterns) = update.ignore_patterns {
            updated.ignore.patterns = patterns;
        }

        updated.validate()?;
        self.tasks[idx] = updated;
        Ok(())
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&TaskConfig> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Look up a task by position or name.
    #[must_use]
    pub fn get<'a>(&self, task: impl Into<TaskRef<'a>>) -> Option<&TaskConfig> {
        match task.into() {
            TaskRef::Index(idx) => self.tasks.get(idx),
            TaskRef::Name(name) => self.find(name),
        }
    }

    #[must_use]
    pub fn tasks(&self) -> &[TaskConfig] {
        &self.tasks
    }

    #[must_use]
    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn enabled_tasks(&self) -> impl Iterator<Item = &TaskConfig> {
        self.tasks.iter().filter(|t| t.enabled)
    }

    /// Resolve names to tasks; no names selects every enabled task.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first unknown task.
    pub fn select(&self, names: &[String]) -> Result<Vec<&TaskConfig>> {
        if names.is_empty() {
            return Ok(self.enabled_tasks().collect());
        }
        names
            .iter()
            .map(|name| {
                self.find(name)
                    .ok_or_else(|| Error::config(format!("task '{name}' not found")))
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Example configuration with one enabled and one disabled task.
    #[must_use]
    pub fn example(home: &Path) -> Self {
        let mut documents = TaskConfig::new(
            "Documents_Backup",
            home.join("Documents"),
            home.join("Backups/Documents"),
        );
        documents.options.delete_extra = true;
        documents.ignore.patterns = ["*.tmp", "*.bak", "temp/", "logs/*.log"]
            .into_iter()
            .map(String::from)
            .collect();

        let mut project = TaskConfig::new(
            "Project_Sync",
            home.join("Projects/MyApp"),
            home.join("Backups/Projects/MyApp"),
        );
        project.enabled = false;
        project.ignore.file = Some(PathBuf::from(".syncignore"));

        Self {
            tasks: vec![documents, project],
        }
    }

    fn position(&self, task: TaskRef<'_>) -> Result<usize> {
        let found = match task {
            TaskRef::Index(idx) => (idx < self.tasks.len()).then_some(idx),
            TaskRef::Name(name) => self.tasks.iter().position(|t| t.name == name),
        };
        found.ok_or_else(|| Error::config(format!("task {task} not found")))
    }
}

impl FromIterator<TaskConfig> for TaskSet {
    fn from_iter<I: IntoIterator<Item = TaskConfig>>(iter: I) -> Self {
        Self {
            tasks: iter.into_iter().collect(),
        }
    }
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() || path.as_os_str().is_empty() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
