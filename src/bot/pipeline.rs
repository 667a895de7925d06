use {
    super::{
        api::{AudioUpload, ChatApi},
        classify::is_playlist,
        session::Sessions,
    },
    crate::{
        download::{Extractor, Metadata},
        tagging::{Tagger, UNKNOWN_ARTIST},
        utils::Result,
        workspace::{sanitize_filename, WorkFile, Workspace},
    },
    std::io,
};

pub const PROCESSING: &str = "Processing...";
pub const METADATA_EXTRACTED: &str = "Metadata extracted successfully!";
pub const BUSY: &str = "Sorry, I'm currently processing another request. Please wait.";
pub const PLAYLIST_REJECTED: &str = "Sorry, I cannot process playlist URLs. Please send me a single song URL.";
pub const UPLOAD_FAILED: &str = "Error uploading the song.";

/// A single track to deliver.
#[derive(Debug, Clone, Copy)]
pub struct Job<'a> {
    pub chat_id: i64,
    pub url: &'a str,
    /// Performer to fall back on if the extractor finds no artist.
    pub artist_hint: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Delivered,
    /// Playlist links aren't downloaded.
    Rejected,
    /// Another download is running in the chat.
    Busy,
    /// The user has been told what went wrong.
    Failed,
}

/// Extract, download, tag, upload.
pub struct Pipeline<E, T> {
    extractor: E,
    tagger: T,
    workspace: Workspace,
}

impl<E: Extractor, T: Tagger> Pipeline<E, T> {
    pub const fn new(extractor: E, tagger: T, workspace: Workspace) -> Self {
        Self { extractor, tagger, workspace }
    }

    pub const fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    #[cfg(test)]
    pub const fn extractor(&self) -> &E {
        &self.extractor
    }

    fn reserve(&self, metadata: &Metadata, chat_id: i64) -> io::Result<WorkFile<'_>> {
        let stem = sanitize_filename(&metadata.title);
        let ext = sanitize_filename(&metadata.ext);
        self.workspace
            .reserve(&format!("{stem}.{ext}"))
            .or_else(|| self.workspace.reserve(&format!("{stem} ({chat_id}).{ext}")))
            .ok_or_else(|| io::Error::other(format!("{stem}.{ext} is already being downloaded")))
    }

    /// The chat is marked busy for the whole run; the flag is cleared on every way out,
    /// including errors from `api`, which are returned.
    pub async fn run<A: ChatApi>(&self, api: &A, sessions: &Sessions, job: Job<'_>) -> Result<Outcome> {
        let Job { chat_id, url, artist_hint } = job;

        if is_playlist(url) {
            api.send_message(chat_id, PLAYLIST_REJECTED).await?;
            return Ok(Outcome::Rejected);
        }

        let Some(_permit) = sessions.try_acquire(chat_id) else {
            api.send_message(chat_id, BUSY).await?;
            return Ok(Outcome::Busy);
        };

        log::info!("Downloading {url} for chat {chat_id}");
        let status = api.send_message(chat_id, PROCESSING).await?;
        let set_status = move |text: String| async move {
            if let Err(err) = api.edit_message(chat_id, status, &text).await {
                log::warn!("Failed to update the status message in chat {chat_id}: {err}");
            }
        };

        let metadata = match self.extractor.extract(url).await {
            Ok(metadata) => metadata,
            Err(err) => {
                log::warn!("Failed to extract metadata from {url}: {err}");
                api.edit_message(chat_id, status, &format!("Error extracting metadata: {err}")).await?;
                return Ok(Outcome::Failed);
            }
        };
        set_status(METADATA_EXTRACTED.to_owned()).await;

        let file = match self.reserve(&metadata, chat_id) {
            Ok(file) => file,
            Err(err) => {
                log::warn!("Failed to reserve a file for {url}: {err}");
                api.edit_message(chat_id, status, &format!("Error downloading the song: {err}")).await?;
                return Ok(Outcome::Failed);
            }
        };
        if let Err(err) = self.extractor.download(url, &metadata, file.path()).await {
            log::warn!("Failed to download {url}: {err}");
            api.edit_message(chat_id, status, &format!("Error downloading the song: {err}")).await?;
            return Ok(Outcome::Failed);
        }
        set_status(format!("Uploading as: {}", file.name())).await;

        if let Err(err) = self.tagger.tag(file.path(), &metadata).await {
            log::warn!("Failed to tag {}: {err}", file.name());
            set_status(format!("Error adding metadata: {err}")).await;
        }

        let performer = metadata.artist.as_deref().or(artist_hint).unwrap_or(UNKNOWN_ARTIST);
        let caption = metadata.caption();
        let upload = AudioUpload { path: file.path(), title: &metadata.title, performer, caption: &caption };
        if let Err(err) = api.send_audio_file(chat_id, upload).await {
            log::error!("Failed to upload {} to chat {chat_id}: {err}", file.name());
            api.edit_message(chat_id, status, UPLOAD_FAILED).await?;
            return Ok(Outcome::Failed);
        }

        drop(file);
        api.delete_message(chat_id, status).await?;
        Ok(Outcome::Delivered)
    }
}
