//! Public types exposed by the `songbook-core` crate.

pub mod book;
pub mod options;

pub use book::{Annotation, BookMetadata, Favorite, Rotation, TocEntry, Volume, book_folder};
pub use options::{LoadOptions, MigrateOptions, ReadPreference};
