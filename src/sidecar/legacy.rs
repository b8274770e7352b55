//! Legacy (hierarchical XML) sidecar schema.
//!
//! Read-only: the writer only emits the compact generation. The format nests
//! one section per list under a `<songbook>` root, scalars as text elements,
//! list items as attribute elements, annotation payloads as base64 text:
//!
//! ```xml
//! <songbook>
//!   <pageoffset>1</pageoffset>
//!   <lastviewed>4</lastviewed>
//!   <notes>loaned out</notes>
//!   <volumes>
//!     <volume file="Fantasia.pdf" pages="6" rotation="2"/>
//!   </volumes>
//!   <contents>
//!     <song title="Fantasia" composer="Telemann" page="1"/>
//!   </contents>
//!   <favorites>
//!     <favorite page="3" name="cadenza"/>
//!   </favorites>
//!   <annotations>
//!     <annotation page="2" width="800" height="600" format="ink">AQID/w==</annotation>
//!   </annotations>
//! </songbook>
//! ```

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Result, SongbookError};
use crate::types::{Annotation, BookMetadata, Favorite, Rotation, TocEntry, Volume};

/// Scalar element currently being read.
#[derive(Debug, Clone, Copy)]
enum Scalar {
    PageOffset,
    LastViewed,
    Notes,
}

/// Parse legacy sidecar text into a book shell.
pub fn parse(text: &str, origin: &Path) -> Result<BookMetadata> {
    let parse_err = |reason: String| SongbookError::Parse {
        path: origin.to_path_buf(),
        reason,
    };

    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut book = BookMetadata::default();
    let mut buf = Vec::new();
    let mut scalar: Option<Scalar> = None;
    let mut pending_annotation: Option<Annotation> = None;
    let mut saw_root = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Err(err) => return Err(parse_err(err.to_string())),
            Ok(Event::Eof) => break,
            Ok(Event::Start(element)) => match element.name().as_ref() {
                b"songbook" => saw_root = true,
                b"pageoffset" => scalar = Some(Scalar::PageOffset),
                b"lastviewed" => scalar = Some(Scalar::LastViewed),
                b"notes" => scalar = Some(Scalar::Notes),
                b"volumes" | b"contents" | b"favorites" | b"annotations" => {}
                b"volume" => book.volumes.push(parse_volume(&element, &parse_err)?),
                b"song" => book.toc.push(parse_song(&element, &parse_err)?),
                b"favorite" => book.favorites.push(parse_favorite(&element, &parse_err)?),
                b"annotation" => {
                    pending_annotation = Some(parse_annotation(&element, &parse_err)?);
                }
                other => {
                    return Err(parse_err(format!(
                        "unexpected element <{}>",
                        String::from_utf8_lossy(other)
                    )));
                }
            },
            Ok(Event::Empty(element)) => match element.name().as_ref() {
                b"songbook" => saw_root = true,
                b"pageoffset" | b"lastviewed" | b"notes" => {}
                b"volumes" | b"contents" | b"favorites" | b"annotations" => {}
                b"volume" => book.volumes.push(parse_volume(&element, &parse_err)?),
                b"song" => book.toc.push(parse_song(&element, &parse_err)?),
                b"favorite" => book.favorites.push(parse_favorite(&element, &parse_err)?),
                b"annotation" => book.annotations.push(parse_annotation(&element, &parse_err)?),
                other => {
                    return Err(parse_err(format!(
                        "unexpected element <{}/>",
                        String::from_utf8_lossy(other)
                    )));
                }
            },
            Ok(Event::Text(value)) => {
                let value = value
                    .unescape()
                    .map_err(|err| parse_err(err.to_string()))?
                    .into_owned();
                if let Some(which) = scalar.take() {
                    apply_scalar(&mut book, which, value.trim(), &parse_err)?;
                } else if let Some(annotation) = pending_annotation.as_mut() {
                    annotation.payload = BASE64
                        .decode(value.trim())
                        .map_err(|err| parse_err(format!("invalid annotation payload: {err}")))?;
                }
            }
            Ok(Event::End(element)) => {
                scalar = None;
                if element.name().as_ref() == b"annotation" {
                    if let Some(annotation) = pending_annotation.take() {
                        book.annotations.push(annotation);
                    }
                }
            }
            Ok(_) => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(parse_err("missing <songbook> root".into()));
    }
    Ok(book)
}

fn apply_scalar(
    book: &mut BookMetadata,
    which: Scalar,
    value: &str,
    parse_err: &impl Fn(String) -> SongbookError,
) -> Result<()> {
    match which {
        Scalar::PageOffset => {
            book.page_offset = value
                .parse()
                .map_err(|_| parse_err(format!("invalid pageoffset {value:?}")))?;
        }
        Scalar::LastViewed => {
            book.last_viewed_page = value
                .parse()
                .map_err(|_| parse_err(format!("invalid lastviewed {value:?}")))?;
        }
        Scalar::Notes => {
            if !value.is_empty() {
                book.notes = Some(value.to_string());
            }
        }
    }
    Ok(())
}

fn attr(
    element: &BytesStart<'_>,
    name: &str,
    parse_err: &impl Fn(String) -> SongbookError,
) -> Result<Option<String>> {
    let Some(found) = element
        .try_get_attribute(name)
        .map_err(|err| parse_err(err.to_string()))?
    else {
        return Ok(None);
    };
    let value = found
        .unescape_value()
        .map_err(|err| parse_err(err.to_string()))?;
    Ok(Some(value.into_owned()))
}

/// Optional attribute with empty strings treated as absent.
fn attr_nonempty(
    element: &BytesStart<'_>,
    name: &str,
    parse_err: &impl Fn(String) -> SongbookError,
) -> Result<Option<String>> {
    Ok(attr(element, name, parse_err)?.filter(|value| !value.is_empty()))
}

fn numeric_attr<T: std::str::FromStr>(
    element: &BytesStart<'_>,
    name: &str,
    default: T,
    parse_err: &impl Fn(String) -> SongbookError,
) -> Result<T> {
    match attr(element, name, parse_err)? {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| parse_err(format!("invalid {name} attribute {value:?}"))),
        None => Ok(default),
    }
}

fn parse_volume(
    element: &BytesStart<'_>,
    parse_err: &impl Fn(String) -> SongbookError,
) -> Result<Volume> {
    let code: u8 = numeric_attr(element, "rotation", 0, parse_err)?;
    let rotation = Rotation::from_code(code)
        .ok_or_else(|| parse_err(format!("invalid rotation code {code}")))?;
    Ok(Volume {
        // An absent or empty file name is left for the repair rules.
        file_name: attr(element, "file", parse_err)?.unwrap_or_default(),
        page_count: numeric_attr(element, "pages", 0, parse_err)?,
        rotation,
    })
}

fn parse_song(
    element: &BytesStart<'_>,
    parse_err: &impl Fn(String) -> SongbookError,
) -> Result<TocEntry> {
    Ok(TocEntry {
        title: attr(element, "title", parse_err)?.unwrap_or_default(),
        composer: attr_nonempty(element, "composer", parse_err)?,
        notes: attr_nonempty(element, "notes", parse_err)?,
        date: attr_nonempty(element, "date", parse_err)?,
        page: numeric_attr(element, "page", 0, parse_err)?,
    })
}

fn parse_favorite(
    element: &BytesStart<'_>,
    parse_err: &impl Fn(String) -> SongbookError,
) -> Result<Favorite> {
    Ok(Favorite {
        page: numeric_attr(element, "page", 0, parse_err)?,
        name: attr_nonempty(element, "name", parse_err)?,
    })
}

fn parse_annotation(
    element: &BytesStart<'_>,
    parse_err: &impl Fn(String) -> SongbookError,
) -> Result<Annotation> {
    Ok(Annotation {
        page: numeric_attr(element, "page", 0, parse_err)?,
        canvas_width: numeric_attr(element, "width", 0.0, parse_err)?,
        canvas_height: numeric_attr(element, "height", 0.0, parse_err)?,
        format: attr(element, "format", parse_err)?.unwrap_or_default(),
        payload: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const FULL: &str = r#"
        <songbook>
          <pageoffset>1</pageoffset>
          <lastviewed>4</lastviewed>
          <notes>loaned out</notes>
          <volumes>
            <volume file="Fantasia.pdf" pages="6" rotation="2"/>
            <volume file="Fantasiaa.pdf" pages="3"/>
          </volumes>
          <contents>
            <song title="Fantasia" composer="Telemann" page="1"/>
            <song title="Bourree" page="5"/>
          </contents>
          <favorites>
            <favorite page="3" name="cadenza"/>
          </favorites>
          <annotations>
            <annotation page="2" width="800" height="600" format="ink">AQID/w==</annotation>
          </annotations>
        </songbook>
    "#;

    fn parse_ok(text: &str) -> BookMetadata {
        parse(text, &PathBuf::from("x.sbx")).expect("parse")
    }

    #[test]
    fn parses_every_section() {
        let book = parse_ok(FULL);
        assert_eq!(book.page_offset, 1);
        assert_eq!(book.last_viewed_page, 4);
        assert_eq!(book.notes.as_deref(), Some("loaned out"));
        assert_eq!(book.volumes.len(), 2);
        assert_eq!(book.volumes[0].rotation, Rotation::Half);
        assert_eq!(book.volumes[1].file_name, "Fantasiaa.pdf");
        assert_eq!(book.toc.len(), 2);
        assert_eq!(book.toc[0].composer.as_deref(), Some("Telemann"));
        assert_eq!(book.toc[1].composer, None);
        assert_eq!(book.favorites.len(), 1);
        assert_eq!(book.annotations.len(), 1);
        assert_eq!(book.annotations[0].payload, vec![1, 2, 3, 255]);
        assert_eq!(book.annotations[0].canvas_width, 800.0);
    }

    #[test]
    fn empty_root_yields_defaults() {
        let book = parse_ok("<songbook/>");
        assert_eq!(book.page_offset, 0);
        assert!(book.volumes.is_empty());
        assert!(book.toc.is_empty());
    }

    #[test]
    fn missing_root_is_rejected() {
        let err = parse("<volumes/>", &PathBuf::from("x.sbx")).expect_err("no root");
        assert!(matches!(err, SongbookError::Parse { .. }));
    }

    #[test]
    fn bad_rotation_is_rejected() {
        let text = "<songbook><volumes><volume file=\"a.pdf\" pages=\"1\" rotation=\"9\"/></volumes></songbook>";
        let err = parse(text, &PathBuf::from("x.sbx")).expect_err("rotation 9");
        assert!(matches!(err, SongbookError::Parse { .. }));
    }

    #[test]
    fn unknown_elements_are_rejected() {
        let err = parse("<songbook><bogus/></songbook>", &PathBuf::from("x.sbx"))
            .expect_err("bogus element");
        assert!(matches!(err, SongbookError::Parse { .. }));
    }
}
