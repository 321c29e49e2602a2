use crate::error::SheetTableError;
use crate::spreadsheet::format::NumberFormat;
use crate::spreadsheet::SpreadsheetError;

/// Handle of a style object in a workbook's style table.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct StyleId(pub usize);

/// Horizontal alignment of a cell's content, from `<alignment horizontal>`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HorizontalAlign {
    Left,
    Center,
    Right,
}

impl HorizontalAlign {
    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "left" => Some(Self::Left),
            "center" | "centerContinuous" => Some(Self::Center),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

/// Font attributes carried by a style. Unset fields fall back to the
/// application's default font.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Font {
    pub bold: bool,
    pub italic: bool,
    /// Size in points
    pub size: Option<f64>,
    /// Typeface, e.g. `Calibri`
    pub name: Option<String>,
    /// RGB colour
    pub color: Option<u32>,
}

/// Cell style: what the writer copies between cells.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Style {
    pub number_format: NumberFormat,
    pub font: Font,
    /// Solid fill colour (RGB)
    pub fill: Option<u32>,
    /// Alignment; `None` is the general alignment
    pub align: Option<HorizontalAlign>,
}

impl Style {
    /// A default style apart from its number format.
    pub fn with_number_format(number_format: NumberFormat) -> Self {
        Style {
            number_format,
            ..Default::default()
        }
    }

    /// Whether the style renders like a default cell.
    pub fn is_default(&self) -> bool {
        self.number_format.is_general()
            && self.font == Font::default()
            && self.fill.is_none()
            && self.align.is_none()
    }
}

/// Parses `FFRRGGBB` / `RRGGBB` colour attributes.
pub(crate) fn parse_rgb(value: &str) -> Option<u32> {
    let hex = if value.len() == 8 { value.get(2..)? } else { value };
    u32::from_str_radix(hex, 16).ok().filter(|_| hex.len() == 6)
}

/// Every style object of a workbook. Index 0 is the default style.
///
/// XLSX caps the number of distinct cell formats; allocation past the cap fails
/// instead of producing a file the host application refuses to open.
#[derive(Clone, Debug)]
pub struct StyleTable {
    styles: Vec<Style>,
}

impl StyleTable {
    /// Cell format ceiling of the XLSX format.
    pub const MAX_STYLES: usize = 64_000;

    pub fn new() -> Self {
        StyleTable {
            styles: vec![Style::default()],
        }
    }

    /// Table built from loaded styles; the first one becomes the default.
    pub(crate) fn from_styles(styles: Vec<Style>) -> Self {
        if styles.is_empty() {
            Self::new()
        } else {
            StyleTable { styles }
        }
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// Style by handle; unknown handles resolve to the default style.
    pub fn get(&self, id: StyleId) -> &Style {
        self.styles.get(id.0).unwrap_or(&self.styles[0])
    }

    /// Allocates a new style object.
    pub fn add(&mut self, style: Style) -> Result<StyleId, SheetTableError> {
        if self.styles.len() >= Self::MAX_STYLES {
            Err(SpreadsheetError::TooManyStyles {
                limit: Self::MAX_STYLES,
            })?;
        }
        self.styles.push(style);
        Ok(StyleId(self.styles.len() - 1))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (StyleId, &Style)> {
        self.styles
            .iter()
            .enumerate()
            .map(|(index, style)| (StyleId(index), style))
    }
}

impl Default for StyleTable {
    fn default() -> Self {
        Self::new()
    }
}
