use {
    crate::utils::Result,
    serde::Deserialize,
    std::{fmt::Write, future::Future},
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MoreInfo {
    pub primary_artists: Box<str>,
    pub language: Box<str>,
}

/// A song as listed by the search service.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchHit {
    pub title: Box<str>,
    pub album: Box<str>,
    pub url: Box<str>,
    pub more_info: MoreInfo,
}

pub trait SongSearch: Send + Sync {
    /// Results come in the service's own order.
    fn search(&self, query: &str) -> impl Future<Output = Result<Vec<SearchHit>>> + Send;
}

/// The service's strings come HTML-escaped.
fn unescape_html(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

impl SearchHit {
    fn unescaped(self) -> Self {
        Self {
            title: unescape_html(&self.title).into(),
            album: unescape_html(&self.album).into(),
            url: self.url,
            more_info: MoreInfo {
                primary_artists: unescape_html(&self.more_info.primary_artists).into(),
                language: self.more_info.language,
            },
        }
    }
}

/// Lists `hits` as text blocks, the URL line is left out if the hits get their own buttons.
pub fn format_results(hits: &[SearchHit], with_urls: bool) -> String {
    let mut text = String::new();
    for (i, hit) in hits.iter().enumerate() {
        if i > 0 {
            text.push('\n');
        }
        _ = writeln!(text, "Title: {}", hit.title);
        _ = writeln!(text, "Album: {}", hit.album);
        if with_urls {
            _ = writeln!(text, "URL: {}", hit.url);
        }
        _ = writeln!(text, "Primary Artists: {}", hit.more_info.primary_artists);
        _ = writeln!(text, "Language: {}", hit.more_info.language);
    }
    text
}

#[derive(Deserialize)]
struct Section {
    #[serde(default)]
    data: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct Autocomplete {
    songs: Option<Section>,
}

/// JioSaavn's public web API.
pub struct JioSaavn {
    http: reqwest::Client,
    api_url: Box<str>,
}

impl JioSaavn {
    pub fn new(http: reqwest::Client, api_url: &str) -> Self {
        Self { http, api_url: api_url.into() }
    }
}

impl SongSearch for JioSaavn {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let response: Autocomplete = self.http
            .get(&*self.api_url)
            .query(&[
                ("__call", "autocomplete.get"),
                ("_format", "json"),
                ("_marker", "0"),
                ("ctx", "web6dot0"),
                ("includeMetaTags", "1"),
                ("query", query),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.songs
            .map(|section| section.data.into_iter().map(SearchHit::unescaped).collect())
            .unwrap_or_default())
    }
}
