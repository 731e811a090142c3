//! Certificate template model and render job types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::tenant::{OrgId, SchoolId};

/// Page size of the rendered certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum PageSize {
    /// A4, landscape orientation.
    #[default]
    A4Landscape,

    /// A4, portrait orientation.
    A4Portrait,
}

impl PageSize {
    /// Returns the page size as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::A4Landscape => "a4_landscape",
            Self::A4Portrait => "a4_portrait",
        }
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-field font overrides for coordinate placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FontOverride {
    /// Font family name.
    #[serde(default)]
    pub family: Option<String>,

    /// Font size in points.
    #[serde(default)]
    pub size_pt: Option<f64>,

    /// CSS color value.
    #[serde(default)]
    pub color: Option<String>,

    /// Bold rendering.
    #[serde(default)]
    pub bold: bool,
}

/// One field placed on a coordinate layout.
///
/// Positions are percentages of the page dimensions, so a template works
/// across render resolutions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPlacement {
    /// The field this placement renders (key into the resolved field map).
    pub field: String,

    /// Horizontal position as a percentage of page width.
    pub x_pct: f64,

    /// Vertical position as a percentage of page height.
    pub y_pct: f64,

    /// Optional font overrides for this field.
    #[serde(default)]
    pub font: Option<FontOverride>,
}

/// Coordinate-based layout: fields positioned over a background image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateLayout {
    /// Blob-storage path of the background image, when the template has
    /// one.
    #[serde(default)]
    pub background_path: Option<String>,

    /// Field placements.
    pub fields: Vec<FieldPlacement>,
}

/// A certificate template.
///
/// Carries both layout modes; the coordinate layout takes precedence
/// when present, the HTML body is the legacy fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateTemplate {
    /// Template identifier.
    pub id: String,

    /// Owning organization.
    pub organization_id: OrgId,

    /// Owning school; `None` means the template is global to the
    /// organization.
    #[serde(default)]
    pub school_id: Option<SchoolId>,

    /// Display name.
    pub name: String,

    /// Whether the template may be used for issuance.
    pub active: bool,

    /// Coordinate layout, when the template uses one.
    #[serde(default)]
    pub coordinate_layout: Option<CoordinateLayout>,

    /// Legacy HTML body with `{{field}}` placeholders.
    #[serde(default)]
    pub html_body: Option<String>,

    /// Page size of the rendered PDF.
    #[serde(default)]
    pub page: PageSize,
}

impl CertificateTemplate {
    /// Returns `true` when the template is scoped to the given school,
    /// either directly or by being organization-global.
    #[must_use]
    pub fn covers_school(&self, school_id: &str) -> bool {
        match &self.school_id {
            Some(scoped) => scoped == school_id,
            None => true,
        }
    }
}

/// The layout handed to the rendering backend, fully resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderLayout {
    /// Coordinate placements over an optional background image.
    Coordinate {
        /// Background image bytes, when the template has one.
        background: Option<Vec<u8>>,
        /// Field placements.
        placements: Vec<FieldPlacement>,
    },

    /// Final HTML with all placeholders substituted.
    Html {
        /// The substituted body.
        body: String,
    },
}

/// A fully resolved render job.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderJob {
    /// The certificate being rendered.
    pub certificate_id: String,

    /// Page size of the output PDF.
    pub page: PageSize,

    /// Resolved layout.
    pub layout: RenderLayout,

    /// Resolved field values (only fields with data present).
    pub fields: BTreeMap<String, String>,

    /// Resolved images by field name (student photo, QR code).
    pub images: BTreeMap<String, Vec<u8>>,
}

/// The stored artifact produced by the rendering backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    /// Storage path of the rendered PDF.
    pub pdf_path: String,
}
