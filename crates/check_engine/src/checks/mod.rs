//! Structure-tree checks driven by the walker

mod artifacts;
mod empty_element;
mod figures;
mod links;
mod lists;
mod nesting;
mod page_parts;
mod schema_validation;

pub use artifacts::MistaggedArtifact;
pub use empty_element::EmptyElement;
pub use figures::{FigureWithText, MissingAltText};
pub use links::{EmptyLinkTag, ParagraphOfLinks};
pub use lists::{ListlikeParagraphRun, MistaggedBulletedList};
pub use nesting::NeedlessNesting;
pub use page_parts::MissingPageParts;
pub use schema_validation::SchemaValidation;
