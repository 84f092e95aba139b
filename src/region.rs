//! DS9 region primitives built from catalogue rows.

use crate::error::CatalogueError;
use crate::sextractor::Catalogue;
use std::io::{self, Write};

/// Column names for one SExtractor position convention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Convention {
    pub x: &'static str,
    pub y: &'static str,
    pub a: &'static str,
    pub b: &'static str,
    pub theta: &'static str,
}

/// Position conventions in order of preference
pub const CONVENTIONS: [Convention; 2] = [
    Convention {
        x: "X_IMAGE",
        y: "Y_IMAGE",
        a: "A_IMAGE",
        b: "B_IMAGE",
        theta: "THETA_IMAGE",
    },
    Convention {
        x: "XWIN_IMAGE",
        y: "YWIN_IMAGE",
        a: "AWIN_IMAGE",
        b: "BWIN_IMAGE",
        theta: "THETAWIN_IMAGE",
    },
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Point {
        x: f64,
        y: f64,
    },
    /// `a` and `b` are the semi-axes, `theta` is in degrees counter-clockwise
    /// from the x axis
    Ellipse {
        x: f64,
        y: f64,
        a: f64,
        b: f64,
        theta: f64,
    },
}

impl Shape {
    pub fn center(&self) -> (f64, f64) {
        match *self {
            Shape::Point { x, y } | Shape::Ellipse { x, y, .. } => (x, y),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub shape: Shape,
    pub label: Option<String>,
}

impl Region {
    /// One DS9 region line, without newline
    pub fn to_ds9(&self) -> String {
        let mut line = match self.shape {
            Shape::Point { x, y } => format!("point({},{}) # point=circle", x, y),
            Shape::Ellipse { x, y, a, b, theta } => {
                format!("ellipse({},{},{},{},{})", x, y, a, b, theta)
            }
        };
        if let Some(label) = &self.label {
            if !line.contains('#') {
                line.push_str(" #");
            }
            line.push_str(&format!(" text={{{}}}", label));
        }
        line
    }
}

#[derive(Debug, Clone)]
pub struct RegionOptions {
    /// Multiplier applied to ellipse semi-axes
    pub scale: f64,
    /// Tag each region with the NUMBER column
    pub label: bool,
}

impl Default for RegionOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            label: false,
        }
    }
}

/// First convention whose position columns are present
pub fn detect_convention(catalogue: &Catalogue) -> Result<Convention, CatalogueError> {
    CONVENTIONS
        .iter()
        .find(|c| catalogue.has_columns(&[c.x, c.y]))
        .copied()
        .ok_or(CatalogueError::NoPositionColumns)
}

/// One region per row: an ellipse when the convention's shape columns are
/// all present, a point otherwise.
pub fn regions_from_catalogue(
    catalogue: &Catalogue,
    options: &RegionOptions,
) -> Result<Vec<Region>, CatalogueError> {
    let convention = detect_convention(catalogue)?;
    let with_shape = catalogue.has_columns(&[convention.a, convention.b, convention.theta]);
    tracing::debug!(
        "Using {}/{} positions, {}",
        convention.x,
        convention.y,
        if with_shape { "ellipses" } else { "points" }
    );

    // has_columns guarantees the lookups below; rows are at least as wide
    // as the header declares
    let get = |row: &[f64], name: &str| catalogue.value(row, name).unwrap_or(f64::NAN);

    let regions = catalogue
        .rows()
        .iter()
        .map(|row| {
            let x = get(row, convention.x);
            let y = get(row, convention.y);
            let shape = if with_shape {
                Shape::Ellipse {
                    x,
                    y,
                    a: get(row, convention.a) * options.scale,
                    b: get(row, convention.b) * options.scale,
                    theta: get(row, convention.theta),
                }
            } else {
                Shape::Point { x, y }
            };
            let label = if options.label {
                catalogue.value(row, "NUMBER").map(|n| n.to_string())
            } else {
                None
            };
            Region { shape, label }
        })
        .collect();

    Ok(regions)
}

/// Write a complete DS9 region file in image coordinates
pub fn write_regions<W: Write>(writer: &mut W, regions: &[Region], colour: &str) -> io::Result<()> {
    writeln!(writer, "# Region file format: DS9 version 4.1")?;
    writeln!(
        writer,
        "global color={} dashlist=8 3 width=1 font=\"helvetica 10 normal roman\" select=1 highlite=1 dash=0 fixed=0 edit=1 move=1 delete=1 include=1 source=1",
        colour
    )?;
    writeln!(writer, "image")?;
    for region in regions {
        writeln!(writer, "{}", region.to_ds9())?;
    }
    Ok(())
}
