//! Style configuration
//!
//! A style file is a JSON document describing, per document class, how to
//! extract parameters and how to write selected values back, plus the
//! tolerance gaps of the catalog matcher:
//!
//! ```json
//! {
//!   "pump": { "flow_gap": 5.0, "lift_gap": 2.0 },
//!   "styles": [
//!     { "name": "默认格式",
//!       "settings": {
//!         "page_num": "default",
//!         "extract": { "matchers": [[ ... ], [ ... ], [ ... ], [ ... ]] },
//!         "writeback": {
//!           "matchers": [ ... ],
//!           "font_size": 9.0, "h_pos": 2.0, "v_pos": 3.0,
//!           "font_color": "blue"
//!         } } }
//!   ]
//! }
//! ```
//!
//! Unknown matcher shapes or handlers fail here, at load time, before any
//! document is touched.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::matcher::{compile_style, CompiledStyle};
use crate::pagination::PageNumbering;
use crate::token::Color;
use crate::DatasheetError;

/// Top-level shape of a style file
#[derive(Debug, Clone, Deserialize)]
pub struct StyleFile {
    pub pump: ToleranceConfig,
    pub styles: Vec<StyleEntry>,
}

/// Symmetric tolerance windows of the catalog matcher
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ToleranceConfig {
    pub flow_gap: f64,
    pub lift_gap: f64,
}

/// One named document-class style
#[derive(Debug, Clone, Deserialize)]
pub struct StyleEntry {
    pub name: String,
    pub settings: StyleConfig,
}

/// The extraction/writeback settings of one style
#[derive(Debug, Clone, Deserialize)]
pub struct StyleConfig {
    pub page_num: PageNumbering,
    pub extract: ExtractConfig,
    pub writeback: WritebackConfig,
}

/// Extraction half: a 2-D table (group × slot) of matcher records or null
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractConfig {
    pub matchers: Vec<Vec<Option<MatcherConfig>>>,
}

/// Writeback half: a flat list of locator records plus global styling
#[derive(Debug, Clone, Deserialize)]
pub struct WritebackConfig {
    pub matchers: Vec<Option<LocatorConfig>>,
    pub font_size: f32,
    /// Horizontal bias applied to vertically-directed insertions
    pub h_pos: f32,
    /// Vertical bias applied to horizontally-directed insertions
    pub v_pos: f32,
    pub font_color: ColorSpec,
}

/// One prefix/postfix element: a literal, a set of alternatives, or null
/// (wildcard position)
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PatternConfig {
    One(String),
    Any(Vec<String>),
}

/// One extraction matcher record, dispatched on `type`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum MatcherConfig {
    #[serde(rename = "list")]
    List {
        pre: Vec<Option<PatternConfig>>,
        #[serde(default)]
        post: Option<Vec<Option<PatternConfig>>>,
        #[serde(default)]
        to_join: usize,
        #[serde(default = "default_skip")]
        skip: bool,
    },
    #[serde(rename = "header")]
    Header {
        pre: Vec<Option<PatternConfig>>,
        #[serde(default)]
        to_join: usize,
        #[serde(default = "default_skip")]
        skip: bool,
    },
    #[serde(rename = "change")]
    Change {
        pre: Vec<Option<PatternConfig>>,
        handler: HandlerConfig,
    },
}

/// Numeric transform of a `change` matcher, dispatched on `type`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum HandlerConfig {
    #[serde(rename = "factor")]
    Factor { arg: f64 },
}

/// One writeback locator record
#[derive(Debug, Clone, Deserialize)]
pub struct LocatorConfig {
    pub pre: Vec<Option<PatternConfig>>,
    pub offset: f32,
    #[serde(default = "default_skip")]
    pub skip: bool,
    #[serde(default)]
    pub is_cn: bool,
    /// 0 = horizontal (beside the anchor), 1 = vertical (below the anchor)
    #[serde(default)]
    pub dir: u8,
}

fn default_skip() -> bool {
    true
}

/// Font color: a named color or an RGB triple
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ColorSpec {
    Rgb([f32; 3]),
    Named(String),
}

impl ColorSpec {
    pub fn resolve(&self) -> Result<Color, DatasheetError> {
        match self {
            ColorSpec::Rgb([r, g, b]) => Ok(Color(*r, *g, *b)),
            ColorSpec::Named(name) => match name.as_str() {
                "black" => Ok(Color(0.0, 0.0, 0.0)),
                "white" => Ok(Color(1.0, 1.0, 1.0)),
                "red" => Ok(Color(1.0, 0.0, 0.0)),
                "green" => Ok(Color(0.0, 1.0, 0.0)),
                "blue" => Ok(Color(0.0, 0.0, 1.0)),
                "gray" => Ok(Color(0.5, 0.5, 0.5)),
                "orange" => Ok(Color(1.0, 0.65, 0.0)),
                "purple" => Ok(Color(0.5, 0.0, 0.5)),
                other => Err(DatasheetError::Config(format!(
                    "unknown font color: {}",
                    other
                ))),
            },
        }
    }
}

/// A loaded style file: compiled styles by position plus the tolerance gaps
///
/// Compilation happens entirely here; the compiled styles are immutable and
/// may be shared across engine instances.
#[derive(Debug)]
pub struct StyleLibrary {
    styles: Vec<(String, CompiledStyle)>,
    tolerance: ToleranceConfig,
}

impl StyleLibrary {
    /// Load and compile a style file from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DatasheetError> {
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Load and compile a style file from a JSON string
    pub fn from_json(data: &str) -> Result<Self, DatasheetError> {
        let file: StyleFile = serde_json::from_str(data)
            .map_err(|e| DatasheetError::Config(format!("malformed style file: {}", e)))?;

        let mut styles = Vec::with_capacity(file.styles.len());
        for entry in &file.styles {
            let compiled = compile_style(&entry.settings).map_err(|e| match e {
                DatasheetError::Config(msg) => {
                    DatasheetError::Config(format!("style \"{}\": {}", entry.name, msg))
                }
                other => other,
            })?;
            styles.push((entry.name.clone(), compiled));
        }

        Ok(StyleLibrary {
            styles,
            tolerance: file.pump,
        })
    }

    /// Display names of the loaded styles, in file order
    pub fn style_names(&self) -> Vec<&str> {
        self.styles.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn get(&self, index: usize) -> Option<&CompiledStyle> {
        self.styles.get(index).map(|(_, style)| style)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    pub fn tolerance(&self) -> ToleranceConfig {
        self.tolerance
    }
}
