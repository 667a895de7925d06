use {
    crate::{download::Metadata, utils::Result},
    lofty::{
        config::WriteOptions,
        picture::{MimeType, Picture, PictureType},
        prelude::{Accessor, TagExt, TaggedFileExt},
        probe::Probe,
        tag::Tag,
    },
    std::{future::Future, path::{Path, PathBuf}},
};

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Writes metadata into a downloaded audio file.
pub trait Tagger: Send + Sync {
    fn tag(&self, path: &Path, metadata: &Metadata) -> impl Future<Output = Result> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TrackTags {
    title: String,
    artist: String,
    album: String,
    year: Option<u32>,
}

impl From<&Metadata> for TrackTags {
    fn from(metadata: &Metadata) -> Self {
        Self {
            title: metadata.title.to_string(),
            artist: metadata.artist.as_deref().unwrap_or(UNKNOWN_ARTIST).to_owned(),
            album: metadata.album.as_deref().unwrap_or(UNKNOWN_ALBUM).to_owned(),
            year: metadata.release_year,
        }
    }
}

struct Cover {
    mime: MimeType,
    data: Vec<u8>,
}

fn detect_image_type(data: &[u8]) -> Option<MimeType> {
    match data {
        [0xFF, 0xD8, 0xFF, ..] => Some(MimeType::Jpeg),
        [0x89, b'P', b'N', b'G', ..] => Some(MimeType::Png),
        _ => None,
    }
}

fn write_tags(path: &Path, tags: &TrackTags, cover: Option<Cover>) -> Result {
    let mut file = Probe::open(path)?.guess_file_type()?.read()?;
    if file.primary_tag().is_none() {
        let tag_type = file.primary_tag_type();
        file.insert_tag(Tag::new(tag_type));
    }
    let tag = file.primary_tag_mut().ok_or("the file format doesn't support tags")?;

    tag.set_title(tags.title.clone());
    tag.set_artist(tags.artist.clone());
    tag.set_album(tags.album.clone());
    if let Some(year) = tags.year {
        tag.set_year(year);
    }
    if let Some(Cover { mime, data }) = cover {
        tag.remove_picture_type(PictureType::CoverFront);
        tag.push_picture(Picture::new_unchecked(PictureType::CoverFront, Some(mime), None, data));
    }

    tag.save_to_path(path, WriteOptions::default())?;
    Ok(())
}

/// Tags files in place with `lofty`, fetching the cover art over HTTP.
pub struct LoftyTagger {
    http: reqwest::Client,
}

impl LoftyTagger {
    pub const fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn fetch_cover(&self, url: &str) -> Result<Cover> {
        let data = self.http.get(url).send().await?.error_for_status()?.bytes().await?.to_vec();
        let mime = detect_image_type(&data).ok_or("the thumbnail is neither a JPEG nor a PNG")?;
        Ok(Cover { mime, data })
    }
}

impl Tagger for LoftyTagger {
    async fn tag(&self, path: &Path, metadata: &Metadata) -> Result {
        let (cover, cover_err) = match metadata.thumbnail_url() {
            Some(url) => match self.fetch_cover(url).await {
                Ok(cover) => (Some(cover), None),
                Err(err) => (None, Some(err)),
            },
            None => (None, None),
        };

        // The text tags are still worth writing if the cover couldn't be fetched
        let tags = TrackTags::from(metadata);
        let path: PathBuf = path.to_owned();
        tokio::task::spawn_blocking(move || write_tags(&path, &tags, cover)).await??;

        match cover_err {
            Some(err) => Err(format!("couldn't embed the cover: {err}").into()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_for_missing_fields() {
        let metadata = Metadata { title: "T".into(), ..Default::default() };
        assert_eq!(TrackTags::from(&metadata), TrackTags {
            title: "T".to_owned(),
            artist: UNKNOWN_ARTIST.to_owned(),
            album: UNKNOWN_ALBUM.to_owned(),
            year: None,
        });

        let metadata = Metadata {
            title: "T".into(),
            artist: Some("A".into()),
            album: Some("B".into()),
            release_year: Some(2001),
            ..Default::default()
        };
        let tags = TrackTags::from(&metadata);
        assert_eq!((&*tags.artist, &*tags.album, tags.year), ("A", "B", Some(2001)));
    }

    #[test]
    fn cover_formats() {
        assert_eq!(detect_image_type(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]), Some(MimeType::Jpeg));
        assert_eq!(detect_image_type(b"\x89PNG\r\n\x1a\n"), Some(MimeType::Png));
        assert_eq!(detect_image_type(b"RIFF\0\0\0\0WEBP"), None);
        assert_eq!(detect_image_type(b""), None);
    }

    #[tokio::test]
    async fn garbage_files_fail_to_tag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.m4a");
        std::fs::write(&path, b"definitely not an mp4 container").unwrap();

        let tagger = LoftyTagger::new(reqwest::Client::new());
        let metadata = Metadata { title: "T".into(), ..Default::default() };
        assert!(tagger.tag(&path, &metadata).await.is_err());
    }
}
