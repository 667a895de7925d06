use {
    crate::utils::floor_to_boundary,
    regex::Regex,
    std::{
        collections::HashSet,
        fs, io,
        path::{Path, PathBuf},
        sync::{LazyLock, Mutex, MutexGuard, PoisonError},
    },
};

/// Leaves room for an extension and a ` (chat id)` suffix within the usual 255-byte name limit.
pub const MAX_STEM_LEN: usize = 200;

/// Extensions of the files the bot itself produces in the workspace.
pub const MEDIA_EXTENSIONS: [&str; 11] = [
    "jpg", "jpeg", "png", "webp", "m4a", "mp3", "mp4", "mkv", "webm", "opus", "ogg",
];

#[expect(clippy::expect_used, reason = "the pattern is a constant")]
static RESERVED_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/:*?"<>|\x00-\x1f]"#).expect("valid regex"));

/// Replaces control characters and the characters reserved in paths on common filesystems with `_`.
///
/// The result is never empty and at most [`MAX_STEM_LEN`] bytes long.
pub fn sanitize_filename(title: &str) -> String {
    let sanitized = RESERVED_CHARS.replace_all(title, "_");
    let sanitized = floor_to_boundary(sanitized.trim(), MAX_STEM_LEN).trim_end();
    if sanitized.is_empty() {
        "untitled".to_owned()
    } else {
        sanitized.to_owned()
    }
}

/// The directory where media is downloaded, tagged and uploaded from.
pub struct Workspace {
    dir: PathBuf,
    /// Names of the files that are being written or uploaded right now.
    in_flight: Mutex<HashSet<Box<str>>>,
}

impl Workspace {
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, in_flight: Mutex::default() })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn in_flight(&self) -> MutexGuard<HashSet<Box<str>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `name` as in-flight, `None` if it already is.
    pub fn reserve(&self, name: &str) -> Option<WorkFile<'_>> {
        self.in_flight().insert(name.into()).then(|| WorkFile {
            workspace: self,
            name: name.into(),
            path: self.dir.join(name),
        })
    }

    /// Deletes every file with one of [`MEDIA_EXTENSIONS`] directly inside the workspace,
    /// except the ones in flight. Returns the number of deleted files.
    pub fn clean(&self) -> io::Result<usize> {
        // Held throughout, so no reservation can appear between the check and the removal
        let in_flight = self.in_flight();
        let mut removed = 0;

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let path = entry.path();
            let recognized = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| MEDIA_EXTENSIONS.contains(&&*ext.to_ascii_lowercase()));
            let busy = entry.file_name().to_str().is_some_and(|name| in_flight.contains(name));
            if !recognized || busy {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => log::warn!("Failed to remove {}: {err}", path.display()),
            }
        }

        Ok(removed)
    }
}

/// A file reserved in the [`Workspace`]. Dropping it deletes the file and ends the reservation.
pub struct WorkFile<'ws> {
    workspace: &'ws Workspace,
    name: Box<str>,
    path: PathBuf,
}

impl WorkFile<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkFile<'_> {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => log::warn!("Failed to remove {}: {err}", self.path.display()),
        }
        self.workspace.in_flight().remove(&self.name);
    }
}
