mod yt_dlp;

pub use yt_dlp::YtDlp;

use {
    serde::Deserialize,
    std::{fmt::{Display, Formatter}, future::Future, path::Path},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The requested track couldn't be found.
    NotFound,
    /// The requested track is a live stream and doesn't have a defined end.
    IsStream,
    /// The requested track is bigger than a bot may upload.
    TooLarge,
    /// The error is related to the metadata of the track.
    MetadataFetchFailed,
    /// The error is related to the audio data itself.
    DataFetchFailed,
    /// The provided link is either malformed or doesn't lead to a downloadable track.
    InvalidLink,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::NotFound => "the link doesn't point to an existing track",
            Self::IsStream => "live streams can't be downloaded while they're ongoing",
            Self::TooLarge => "the track is too large to be sent",
            Self::MetadataFetchFailed => "couldn't fetch the track's metadata",
            Self::DataFetchFailed => "couldn't fetch the track's audio",
            Self::InvalidLink => "the link isn't supported",
        })
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnail {
    pub url: Box<str>,
}

/// What the extractor knows about a track, with the stream to download already selected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub id: Box<str>,
    pub title: Box<str>,
    pub artist: Option<Box<str>>,
    pub album: Option<Box<str>>,
    pub release_year: Option<u32>,
    pub thumbnails: Vec<Thumbnail>,
    pub thumbnail: Option<Box<str>>,
    /// Average audio bitrate in kbps.
    pub abr: Option<f64>,
    pub ext: Box<str>,
    pub format_id: Box<str>,
    pub filesize: Option<u64>,
    pub filesize_approx: Option<u64>,
    pub is_live: Option<bool>,
}

impl Metadata {
    /// Prefers a JPEG or PNG thumbnail, the formats a cover can be embedded as.
    pub fn thumbnail_url(&self) -> Option<&str> {
        let is_embeddable = |url: &str| {
            let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
            [".jpg", ".jpeg", ".png"].iter().any(|ext| path.ends_with(ext))
        };
        self.thumbnails
            .iter()
            .map(|t| &*t.url)
            .find(|url| is_embeddable(url))
            .or(self.thumbnail.as_deref().filter(|url| is_embeddable(url)))
            .or(self.thumbnails.first().map(|t| &*t.url))
            .or(self.thumbnail.as_deref())
    }

    pub fn size_hint(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx)
    }

    /// `"{title} - {abr} kbps"`, or just the title if the bitrate is unknown.
    pub fn caption(&self) -> String {
        match self.abr {
            Some(abr) if abr.is_finite() && abr > 0.0 => format!("{} - {} kbps", self.title, abr.round()),
            _ => self.title.to_string(),
        }
    }
}

/// Turns a link into a track on disk.
pub trait Extractor: Send + Sync {
    fn extract(&self, url: &str) -> impl Future<Output = Result<Metadata, Error>> + Send;

    /// Downloads the stream selected in `metadata` to exactly `dest`.
    fn download(&self, url: &str, metadata: &Metadata, dest: &Path)
        -> impl Future<Output = Result<(), Error>> + Send;
}
