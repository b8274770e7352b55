//! Compact (new-generation) sidecar schema: one flat JSON object with short
//! keys, annotation payloads carried as base64 text.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SongbookError};
use crate::types::{Annotation, BookMetadata, Favorite, Rotation, TocEntry, Volume};

/// Version tag written into every compact sidecar.
pub const COMPACT_VERSION: u32 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct CompactDoc {
    v: u32,
    #[serde(default)]
    offset: u32,
    #[serde(default)]
    last: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    written: Option<DateTime<Utc>>,
    #[serde(default)]
    vols: Vec<CompactVolume>,
    #[serde(default)]
    toc: Vec<CompactSong>,
    #[serde(default)]
    favs: Vec<CompactFavorite>,
    #[serde(default)]
    ann: Vec<CompactAnnotation>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CompactVolume {
    f: String,
    p: u32,
    #[serde(default)]
    r: u8,
}

#[derive(Debug, Serialize, Deserialize)]
struct CompactSong {
    t: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    c: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    d: Option<String>,
    p: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct CompactFavorite {
    p: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    n: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CompactAnnotation {
    p: u32,
    w: f32,
    h: f32,
    fmt: String,
    data: String,
}

/// Parse compact sidecar text into a book shell.
pub fn parse(text: &str, origin: &Path) -> Result<BookMetadata> {
    let parse_err = |reason: String| SongbookError::Parse {
        path: origin.to_path_buf(),
        reason,
    };

    let doc: CompactDoc = serde_json::from_str(text).map_err(|err| parse_err(err.to_string()))?;

    let mut book = BookMetadata::default();
    book.page_offset = doc.offset;
    book.last_viewed_page = doc.last;
    book.notes = doc.notes;
    book.last_written = doc.written;

    for vol in doc.vols {
        let rotation = Rotation::from_code(vol.r)
            .ok_or_else(|| parse_err(format!("invalid rotation code {}", vol.r)))?;
        book.volumes.push(Volume {
            file_name: vol.f,
            page_count: vol.p,
            rotation,
        });
    }
    for song in doc.toc {
        book.toc.push(TocEntry {
            title: song.t,
            composer: song.c,
            notes: song.n,
            date: song.d,
            page: song.p,
        });
    }
    for fav in doc.favs {
        book.favorites.push(Favorite {
            page: fav.p,
            name: fav.n,
        });
    }
    for ann in doc.ann {
        let payload = BASE64
            .decode(ann.data.trim())
            .map_err(|err| parse_err(format!("invalid annotation payload: {err}")))?;
        book.annotations.push(Annotation {
            page: ann.p,
            canvas_width: ann.w,
            canvas_height: ann.h,
            format: ann.fmt,
            payload,
        });
    }

    Ok(book)
}

/// Serialize a book to compact sidecar text.
pub fn to_string(book: &BookMetadata) -> Result<String> {
    let doc = CompactDoc {
        v: COMPACT_VERSION,
        offset: book.page_offset,
        last: book.last_viewed_page,
        notes: book.notes.clone(),
        written: book.last_written,
        vols: book
            .volumes
            .iter()
            .map(|volume| CompactVolume {
                f: volume.file_name.clone(),
                p: volume.page_count,
                r: volume.rotation.code(),
            })
            .collect(),
        toc: book
            .toc
            .iter()
            .map(|entry| CompactSong {
                t: entry.title.clone(),
                c: entry.composer.clone(),
                n: entry.notes.clone(),
                d: entry.date.clone(),
                p: entry.page,
            })
            .collect(),
        favs: book
            .favorites
            .iter()
            .map(|favorite| CompactFavorite {
                p: favorite.page,
                n: favorite.name.clone(),
            })
            .collect(),
        ann: book
            .annotations
            .iter()
            .map(|annotation| CompactAnnotation {
                p: annotation.page,
                w: annotation.canvas_width,
                h: annotation.canvas_height,
                fmt: annotation.format.clone(),
                data: BASE64.encode(&annotation.payload),
            })
            .collect(),
    };

    serde_json::to_string(&doc).map_err(|err| SongbookError::Write {
        path: book.source_path.clone(),
        reason: err.to_string(),
    })
}
