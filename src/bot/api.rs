use {
    super::telegram::{
        AnswerCallbackQuery, Client, DeleteMessage, EditMessageText, GetUpdates, InlineKeyboardButton,
        InlineKeyboardMarkup, SendAudio, SendDocument, SendMessage, Update, ALLOWED_UPDATES, MAX_CAPTION_LEN,
        MAX_MSG_LEN,
    },
    crate::utils::{default, truncate, Result},
    reqwest::{multipart::Part, Body},
    std::{future::Future, path::Path},
    tokio::fs::File,
    tokio_util::io::ReaderStream,
};

/// An inline button that answers with `data` when pressed.
#[derive(Debug, Clone, Copy)]
pub struct Button<'a> {
    pub text: &'a str,
    pub data: &'a str,
}

#[derive(Debug, Clone, Copy)]
pub struct AudioUpload<'a> {
    pub path: &'a Path,
    pub title: &'a str,
    pub performer: &'a str,
    pub caption: &'a str,
}

/// What the handlers need from a chat platform.
pub trait ChatApi: Send + Sync {
    /// Returns the ID of the sent message.
    fn send_message(&self, chat_id: i64, text: &str) -> impl Future<Output = Result<i32>> + Send;

    /// Sends `text` with a column of inline buttons underneath, returns the ID of the sent message.
    fn send_message_with_buttons(&self, chat_id: i64, text: &str, buttons: &[Button<'_>])
        -> impl Future<Output = Result<i32>> + Send;

    fn edit_message(&self, chat_id: i64, message_id: i32, text: &str) -> impl Future<Output = Result> + Send;

    fn delete_message(&self, chat_id: i64, message_id: i32) -> impl Future<Output = Result> + Send;

    fn send_audio_file(&self, chat_id: i64, audio: AudioUpload<'_>) -> impl Future<Output = Result> + Send;

    fn send_document(&self, chat_id: i64, path: &Path) -> impl Future<Output = Result> + Send;

    fn answer_callback(&self, query_id: &str, text: Option<&str>) -> impl Future<Output = Result> + Send;

    /// Long-polls for updates starting from `offset`, waiting up to `timeout` seconds.
    fn receive_updates(&self, offset: u64, timeout: u32) -> impl Future<Output = Result<Vec<Update>>> + Send;
}

fn audio_mime_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("mp3") => "audio/mpeg",
        Some("m4a" | "mp4") => "audio/mp4",
        Some("ogg" | "opus") => "audio/ogg",
        Some("webm") => "audio/webm",
        _ => "application/octet-stream",
    }
}

async fn file_part(path: &Path, mime: &str) -> Result<Part> {
    let file = File::open(path).await?;
    let size = file.metadata().await?.len();
    let filename = path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
    Ok(Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), size)
        .file_name(filename)
        .mime_str(mime)?)
}

impl ChatApi for Client {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<i32> {
        let text = truncate(text, MAX_MSG_LEN);
        let msg = self.request(&SendMessage { chat_id, text: &text, disable_web_page_preview: true, ..default() });
        Ok(msg.await?.id)
    }

    async fn send_message_with_buttons(&self, chat_id: i64, text: &str, buttons: &[Button<'_>]) -> Result<i32> {
        let text = truncate(text, MAX_MSG_LEN);
        let markup = InlineKeyboardMarkup {
            inline_keyboard: buttons
                .iter()
                .map(|button| [InlineKeyboardButton { text: button.text, callback_data: button.data }])
                .collect(),
        };
        let msg = self.request(&SendMessage {
            chat_id,
            text: &text,
            disable_web_page_preview: true,
            reply_markup: Some(&markup),
            ..default()
        });
        Ok(msg.await?.id)
    }

    async fn edit_message(&self, chat_id: i64, message_id: i32, text: &str) -> Result {
        let text = truncate(text, MAX_MSG_LEN);
        self.request(&EditMessageText { chat_id, message_id, text: &text, disable_web_page_preview: true })
            .await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result {
        self.request(&DeleteMessage { chat_id, message_id }).await?;
        Ok(())
    }

    async fn send_audio_file(&self, chat_id: i64, audio: AudioUpload<'_>) -> Result {
        let payload = file_part(audio.path, audio_mime_type(audio.path)).await?;
        let caption = truncate(audio.caption, MAX_CAPTION_LEN);
        self.multipart_request(&SendAudio {
            chat_id,
            audio: "attach://payload",
            caption: &caption,
            title: audio.title,
            performer: audio.performer,
        }, payload).await?;
        Ok(())
    }

    async fn send_document(&self, chat_id: i64, path: &Path) -> Result {
        let payload = file_part(path, "text/plain").await?;
        self.multipart_request(&SendDocument { chat_id, document: "attach://payload" }, payload).await?;
        Ok(())
    }

    async fn answer_callback(&self, query_id: &str, text: Option<&str>) -> Result {
        self.request(&AnswerCallbackQuery { callback_query_id: query_id, text }).await?;
        Ok(())
    }

    async fn receive_updates(&self, offset: u64, timeout: u32) -> Result<Vec<Update>> {
        self.request(&GetUpdates { offset, timeout, allowed_updates: ALLOWED_UPDATES }).await
    }
}
