//! In-memory stand-ins for the chat platform, the extractor, the tagger and the search service.

use {
    crate::{
        bot::{
            api::{AudioUpload, Button, ChatApi},
            telegram::Update,
        },
        download::{Error, Extractor, Metadata},
        search::{MoreInfo, SearchHit, SongSearch},
        tagging::Tagger,
        utils::Result,
    },
    std::{
        path::Path,
        sync::{
            atomic::{AtomicI32, AtomicUsize, Ordering::SeqCst},
            Arc, Mutex,
        },
    },
    tokio::sync::Notify,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Send { chat_id: i64, text: String },
    Buttons { chat_id: i64, text: String, buttons: Vec<(String, String)> },
    Edit { chat_id: i64, message_id: i32, text: String },
    Delete { chat_id: i64, message_id: i32 },
    Audio { chat_id: i64, filename: String, title: String, performer: String, caption: String },
    Document { chat_id: i64, filename: String },
    Answer { query_id: String, text: Option<String> },
}

#[derive(Default)]
pub struct RecordingApi {
    pub calls: Mutex<Vec<Call>>,
    pub last_id: AtomicI32,
    pub fail_audio: bool,
    pub fail_delete: bool,
}

impl RecordingApi {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn filename(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

impl ChatApi for RecordingApi {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<i32> {
        self.record(Call::Send { chat_id, text: text.to_owned() });
        Ok(self.last_id.fetch_add(1, SeqCst) + 1)
    }

    async fn send_message_with_buttons(&self, chat_id: i64, text: &str, buttons: &[Button<'_>]) -> Result<i32> {
        let buttons = buttons.iter().map(|b| (b.text.to_owned(), b.data.to_owned())).collect();
        self.record(Call::Buttons { chat_id, text: text.to_owned(), buttons });
        Ok(self.last_id.fetch_add(1, SeqCst) + 1)
    }

    async fn edit_message(&self, chat_id: i64, message_id: i32, text: &str) -> Result {
        self.record(Call::Edit { chat_id, message_id, text: text.to_owned() });
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result {
        if self.fail_delete {
            return Err("Bad Request: message to delete not found".into());
        }
        self.record(Call::Delete { chat_id, message_id });
        Ok(())
    }

    async fn send_audio_file(&self, chat_id: i64, audio: AudioUpload<'_>) -> Result {
        if self.fail_audio {
            return Err("Request Entity Too Large".into());
        }
        assert!(audio.path.is_file(), "uploading a missing file");
        self.record(Call::Audio {
            chat_id,
            filename: filename(audio.path),
            title: audio.title.to_owned(),
            performer: audio.performer.to_owned(),
            caption: audio.caption.to_owned(),
        });
        Ok(())
    }

    async fn send_document(&self, chat_id: i64, path: &Path) -> Result {
        self.record(Call::Document { chat_id, filename: filename(path) });
        Ok(())
    }

    async fn answer_callback(&self, query_id: &str, text: Option<&str>) -> Result {
        self.record(Call::Answer { query_id: query_id.to_owned(), text: text.map(str::to_owned) });
        Ok(())
    }

    async fn receive_updates(&self, _offset: u64, _timeout: u32) -> Result<Vec<Update>> {
        Ok(vec![])
    }
}

/// Makes [`FakeExtractor::extract`] wait until released.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

#[derive(Default)]
pub struct FakeExtractor {
    pub metadata: Option<Metadata>,
    pub extract_error: Option<Error>,
    pub download_error: Option<Error>,
    pub extract_calls: AtomicUsize,
    pub gate: Option<Arc<Gate>>,
}

impl FakeExtractor {
    pub fn song(title: &str, artist: Option<&str>) -> Self {
        Self {
            metadata: Some(Metadata {
                id: "abc".into(),
                title: title.into(),
                artist: artist.map(Into::into),
                abr: Some(128.0),
                ext: "m4a".into(),
                format_id: "140".into(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn failing(error: Error) -> Self {
        Self { extract_error: Some(error), ..Default::default() }
    }
}

impl Extractor for FakeExtractor {
    async fn extract(&self, _url: &str) -> Result<Metadata, Error> {
        self.extract_calls.fetch_add(1, SeqCst);
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        match (&self.extract_error, &self.metadata) {
            (Some(err), _) => Err(*err),
            (None, Some(metadata)) => Ok(metadata.clone()),
            (None, None) => Err(Error::MetadataFetchFailed),
        }
    }

    async fn download(&self, _url: &str, _metadata: &Metadata, dest: &Path) -> Result<(), Error> {
        if let Some(err) = self.download_error {
            return Err(err);
        }
        tokio::fs::write(dest, b"not really audio").await.map_err(|_| Error::DataFetchFailed)
    }
}

#[derive(Default)]
pub struct FakeTagger {
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl Tagger for FakeTagger {
    async fn tag(&self, path: &Path, _metadata: &Metadata) -> Result {
        self.calls.fetch_add(1, SeqCst);
        assert!(path.is_file(), "tagging a missing file");
        if self.fail {
            return Err("unsupported container".into());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeSearch {
    pub hits: Vec<SearchHit>,
    pub queries: Mutex<Vec<String>>,
}

impl FakeSearch {
    pub fn with_titles(titles: &[&str]) -> Self {
        let hits = titles
            .iter()
            .map(|&title| SearchHit {
                title: title.into(),
                album: format!("{title} album").into(),
                url: format!("https://www.jiosaavn.com/song/{title}").into(),
                more_info: MoreInfo { primary_artists: format!("{title} artist").into(), language: "english".into() },
            })
            .collect();
        Self { hits, ..Default::default() }
    }
}

impl SongSearch for FakeSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.queries.lock().unwrap().push(query.to_owned());
        Ok(self.hits.clone())
    }
}
