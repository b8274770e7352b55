//! In-memory model of a logical book and its sidecar-backed bookkeeping.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::constants::SIDECAR_EXT;
use crate::text::title_from_stem;

/// Page rotation applied to every page of a volume, in quarter turns.
///
/// Wire code 0–3 is shared by both sidecar generations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    None,
    Quarter,
    Half,
    ThreeQuarter,
}

impl Rotation {
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Quarter => 1,
            Self::Half => 2,
            Self::ThreeQuarter => 3,
        }
    }

    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Quarter),
            2 => Some(Self::Half),
            3 => Some(Self::ThreeQuarter),
            _ => None,
        }
    }
}

/// One physical file contributing a contiguous page range to a logical book.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Volume {
    pub file_name: String,
    pub page_count: u32,
    pub rotation: Rotation,
}

impl Volume {
    #[must_use]
    pub fn new(file_name: impl Into<String>, page_count: u32) -> Self {
        Self {
            file_name: file_name.into(),
            page_count,
            rotation: Rotation::default(),
        }
    }
}

/// A named reference to a logical starting page within a book.
///
/// Entries may share a page; insertion order decides lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TocEntry {
    pub title: String,
    pub composer: Option<String>,
    pub notes: Option<String>,
    pub date: Option<String>,
    pub page: u32,
}

impl TocEntry {
    #[must_use]
    pub fn titled(title: impl Into<String>, page: u32) -> Self {
        Self {
            title: title.into(),
            page,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Favorite {
    pub page: u32,
    pub name: Option<String>,
}

/// Opaque per-page payload (ink strokes, stamps) plus the canvas it was
/// captured on. The core never interprets the bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotation {
    pub page: u32,
    pub canvas_width: f32,
    pub canvas_height: f32,
    pub format: String,
    pub payload: Vec<u8>,
}

/// Aggregate root for one logical book.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookMetadata {
    /// Primary physical file, or the folder path for a singles collection.
    pub source_path: PathBuf,
    pub singles: bool,
    /// In-memory state diverges from the persisted sidecar.
    pub dirty: bool,
    /// Page number the first physical page is displayed as.
    pub page_offset: u32,
    pub last_viewed_page: u32,
    pub last_written: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    /// Ordered by continuation order, primary first.
    pub volumes: Vec<Volume>,
    pub toc: Vec<TocEntry>,
    pub favorites: Vec<Favorite>,
    pub annotations: Vec<Annotation>,
}

impl BookMetadata {
    #[must_use]
    pub fn new(source_path: PathBuf, singles: bool) -> Self {
        Self {
            source_path,
            singles,
            ..Self::default()
        }
    }

    /// Sum of all volume page counts.
    #[must_use]
    pub fn total_pages(&self) -> u32 {
        self.volumes.iter().map(|volume| volume.page_count).sum()
    }

    /// File stem of the primary file, or the folder name for singles.
    #[must_use]
    pub fn stem(&self) -> String {
        self.source_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Display title derived from the stem.
    #[must_use]
    pub fn title(&self) -> String {
        title_from_stem(&self.stem())
    }

    /// Sidecar path under the given extension: beside the primary file, or
    /// inside a singles folder and named after it.
    #[must_use]
    pub fn sidecar_path_for(&self, ext: &str) -> PathBuf {
        if self.singles {
            let name = self
                .source_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.source_path.join(format!("{name}.{ext}"))
        } else {
            self.source_path.with_extension(ext)
        }
    }

    /// Sidecar path under the current (compact) extension.
    #[must_use]
    pub fn sidecar_path(&self) -> PathBuf {
        self.sidecar_path_for(SIDECAR_EXT)
    }

    /// Clamp `last_viewed_page` into `[page_offset, page_offset + total)`,
    /// resetting to `page_offset` when out of range.
    ///
    /// Returns `true` when the stored value changed.
    pub fn clamp_last_viewed(&mut self) -> bool {
        let low = self.page_offset;
        let high = low.saturating_add(self.total_pages());
        if self.last_viewed_page >= low && self.last_viewed_page < high {
            return false;
        }
        let changed = self.last_viewed_page != low;
        self.last_viewed_page = low;
        changed
    }

    /// TOC entry describing `page`: the entry with the greatest starting page
    /// not beyond `page`; the first-inserted entry wins ties.
    #[must_use]
    pub fn describe_page(&self, page: u32) -> Option<&TocEntry> {
        let mut best: Option<&TocEntry> = None;
        for entry in &self.toc {
            if entry.page > page {
                continue;
            }
            match best {
                Some(current) if entry.page <= current.page => {}
                _ => best = Some(entry),
            }
        }
        best
    }
}

/// Parent folder the book lives in.
#[must_use]
pub fn book_folder(book: &BookMetadata) -> &Path {
    if book.singles {
        book.source_path.as_path()
    } else {
        book.source_path.parent().unwrap_or(Path::new(""))
    }
}
