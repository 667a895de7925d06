use {
    super::{Error, Extractor, Metadata},
    crate::bot::telegram::MAX_UPLOAD_SIZE,
    std::{
        ffi::OsString,
        path::Path,
        process::{Output, Stdio},
    },
    tokio::{fs, process::Command},
};

/// Prefers a container the tagger can write to.
const AUDIO_FORMAT: &str = "bestaudio[ext=m4a]/bestaudio/best";

/// Runs the `yt-dlp` executable.
pub struct YtDlp {
    program: Box<str>,
}

impl YtDlp {
    pub fn new(program: &str) -> Self {
        Self { program: program.into() }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&*self.program);
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }
}

/// `-o` takes a template, so `%` in a path must be doubled to be taken literally.
fn output_template(dest: &Path) -> OsString {
    dest.to_string_lossy().replace('%', "%%").into()
}

fn classify_failure(stderr: &[u8]) -> Option<Error> {
    let stderr = String::from_utf8_lossy(stderr);
    if stderr.contains("Unsupported URL") || stderr.contains("is not a valid URL") {
        Some(Error::InvalidLink)
    } else if stderr.trim_end().ends_with("truncated.")
        || stderr.contains("Video unavailable")
        || stderr.contains("HTTP Error 404")
    {
        Some(Error::NotFound)
    } else {
        None
    }
}

impl Extractor for YtDlp {
    async fn extract(&self, url: &str) -> Result<Metadata, Error> {
        let mut cmd = self.command();
        cmd.args(["-J", "--no-download", "--no-playlist", "-f", AUDIO_FORMAT, "--", url]);

        let bytes = match cmd.output().await {
            Ok(Output { status, stderr, stdout }) => if status.success() {
                stdout
            } else {
                return Err(classify_failure(&stderr).unwrap_or_else(|| {
                    log::error!("`yt-dlp` exited unsuccessfully while fetching the metadata:\n\
                                command: {cmd:?}\n\
                                stderr:\n{}",
                                String::from_utf8_lossy(&stderr));
                    Error::MetadataFetchFailed
                }));
            }
            Err(err) => {
                log::error!("failed to launch `yt-dlp` to get the track data: {err}");
                return Err(Error::MetadataFetchFailed);
            }
        };

        let metadata: Metadata = serde_json::from_slice(&bytes).map_err(|err| {
            log::error!("failed to decode track data as JSON: {err}");
            Error::MetadataFetchFailed
        })?;

        if metadata.is_live == Some(true) {
            return Err(Error::IsStream);
        }
        if metadata.format_id.is_empty() || metadata.ext.is_empty() {
            log::error!("`yt-dlp` selected no format for {url}");
            return Err(Error::MetadataFetchFailed);
        }
        if metadata.size_hint().is_some_and(|size| size >= MAX_UPLOAD_SIZE) {
            return Err(Error::TooLarge);
        }

        Ok(metadata)
    }

    async fn download(&self, url: &str, metadata: &Metadata, dest: &Path) -> Result<(), Error> {
        let mut cmd = self.command();
        cmd
            .stdout(Stdio::null())
            .args(["-f", &*metadata.format_id, "--no-playlist", "--no-part", "--force-overwrites", "-o"])
            .arg(output_template(dest))
            .args(["--", url]);

        match cmd.output().await {
            Ok(Output { status, .. }) if status.success() => {}
            Ok(Output { stderr, .. }) => {
                return Err(classify_failure(&stderr).unwrap_or_else(|| {
                    log::error!("`yt-dlp` exited unsuccessfully while downloading:\n\
                                command: {cmd:?}\n\
                                stderr:\n{}",
                                String::from_utf8_lossy(&stderr));
                    Error::DataFetchFailed
                }));
            }
            Err(err) => {
                log::error!("Failed to download media\ncommand: {cmd:#?}\ncause: {err}");
                return Err(Error::DataFetchFailed);
            }
        }

        let size = match fs::metadata(dest).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                log::error!("`yt-dlp` reported success but {} doesn't exist", dest.display());
                return Err(Error::DataFetchFailed);
            }
        };
        if size >= MAX_UPLOAD_SIZE {
            return Err(Error::TooLarge);
        }

        Ok(())
    }
}
