//! Page annotations

use crate::{ObjId, Rect};
use serde::{Deserialize, Serialize};

/// Tolerance used when matching annotations by rectangle
pub const ANNOT_RECT_TOLERANCE: f64 = 0.5;

/// Kind of an on-page annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnnotationKind {
    /// Hyperlink region, optionally with a target URI
    Link { uri: Option<String> },
    /// Interactive form widget
    Widget { field: Option<String> },
    /// Anything else, carried by subtype name
    Other(String),
}

/// An on-page annotation object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: ObjId,
    pub kind: AnnotationKind,
    pub rect: Rect,
}

impl Annotation {
    pub fn link(id: ObjId, rect: Rect, uri: Option<String>) -> Self {
        Self {
            id,
            kind: AnnotationKind::Link { uri },
            rect,
        }
    }

    pub fn widget(id: ObjId, rect: Rect, field: Option<String>) -> Self {
        Self {
            id,
            kind: AnnotationKind::Widget { field },
            rect,
        }
    }

    pub fn is_link(&self) -> bool {
        matches!(self.kind, AnnotationKind::Link { .. })
    }

    pub fn is_widget(&self) -> bool {
        matches!(self.kind, AnnotationKind::Widget { .. })
    }

    /// Matching used when removing annotations: identity, full equality,
    /// or rectangle equality within [`ANNOT_RECT_TOLERANCE`].
    pub fn matches(&self, other: &Annotation) -> bool {
        self.id == other.id
            || self == other
            || self.rect.approx_eq(&other.rect, ANNOT_RECT_TOLERANCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_by_identity_and_rect() {
        let a = Annotation::link(ObjId(1), Rect::new(0.0, 0.0, 10.0, 10.0), None);
        let by_id = Annotation::widget(ObjId(1), Rect::new(50.0, 50.0, 60.0, 60.0), None);
        assert!(a.matches(&by_id));

        let by_rect = Annotation::link(ObjId(9), Rect::new(0.2, 0.1, 10.4, 9.9), None);
        assert!(a.matches(&by_rect));

        let neither = Annotation::link(ObjId(9), Rect::new(30.0, 30.0, 40.0, 40.0), None);
        assert!(!a.matches(&neither));
    }
}
