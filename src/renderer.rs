//! Renderer resolution for grid cells.
//!
//! Each cell is rendered by exactly one renderer, chosen by precedence: a
//! `tags` column always uses the tag list, otherwise a negative value uses the
//! warning renderer, otherwise the default renderer applies. Renderers are
//! looked up by name in a [`Registry`]; a missing entry only breaks the cell it
//! was requested for.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::error;
use tracing_error::SpanTrace;

use crate::classifier::Classification;
use crate::columns::{ColumnDescriptor, Formatter};
use crate::domain::VitalsError;
use crate::editor::EditBuffer;
use crate::record::{RESTING_HR, Row, SPO2, TEMPERATURE, Value, format_number};

pub const RENDERER_ERROR: &str = "Renderer Error ☝";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RendererName {
    Default,
    Tags,
    Negative,
}

impl fmt::Display for RendererName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RendererName::Default => "default",
            RendererName::Tags => "tags",
            RendererName::Negative => "negative",
        };
        write!(f, "{name}")
    }
}

impl FromStr for RendererName {
    type Err = VitalsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(RendererName::Default),
            "tags" => Ok(RendererName::Tags),
            "negative" => Ok(RendererName::Negative),
            other => Err(VitalsError::RendererNotFound(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Renderer {
    /// Editable text field showing the focused buffer.
    Editable,
    TagList,
    Warning,
    Custom(Formatter),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Badge {
    pub label: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayOutput {
    Text(String),
    Editable { text: String, dirty: bool },
    Tags(Vec<Badge>),
    /// Out of range value, shown with a warning indicator.
    Warning(String),
    Error(String),
}

impl DisplayOutput {
    /// Text without any decoration, as copied to the clipboard or matched by
    /// the filter.
    pub fn plain_text(&self) -> String {
        match self {
            DisplayOutput::Text(s)
            | DisplayOutput::Editable { text: s, .. }
            | DisplayOutput::Warning(s)
            | DisplayOutput::Error(s) => s.clone(),
            DisplayOutput::Tags(badges) => badges
                .iter()
                .map(|b| match &b.detail {
                    Some(d) => format!("{} {}", b.label, d),
                    None => b.label.clone(),
                })
                .collect::<Vec<String>>()
                .join(", "),
        }
    }

    /// Number of terminal columns the rendered cell occupies.
    pub fn width(&self) -> usize {
        match self {
            DisplayOutput::Warning(s) => s.chars().count() + 2,
            DisplayOutput::Tags(badges) => badges
                .iter()
                .map(|b| b.label.chars().count() + b.detail.as_ref().map_or(0, |d| d.chars().count() + 1) + 3)
                .sum(),
            other => other.plain_text().chars().count(),
        }
    }
}

/// Everything a renderer may look at for one cell.
pub struct RenderContext<'a> {
    pub row_index: usize,
    pub column: &'a ColumnDescriptor,
    pub value: &'a Value,
    /// Focused edit buffer, if it belongs to this cell.
    pub buffer: Option<&'a EditBuffer>,
}

impl<'a> RenderContext<'a> {
    pub fn new(row_index: usize, row: &'a Row, column: &'a ColumnDescriptor) -> Self {
        Self {
            row_index,
            column,
            value: row.get(&column.id),
            buffer: None,
        }
    }

    pub fn with_buffer(mut self, buffer: Option<&'a EditBuffer>) -> Self {
        self.buffer = buffer.filter(|b| b.is_for(self.row_index, &self.column.id));
        self
    }
}

pub fn unit_suffix(field: &str) -> &'static str {
    match field {
        TEMPERATURE => "°F",
        SPO2 | RESTING_HR => "%",
        _ => "",
    }
}

/// One decimal place, dropping a trailing `.0`.
pub fn format_measurement(n: f64) -> String {
    let rounded = (n * 10.0).round() / 10.0;
    // -0.0 prints with its sign
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    let s = format!("{rounded:.1}");
    match s.strip_suffix(".0") {
        Some(whole) => whole.to_string(),
        None => s,
    }
}

/// Measurement with its unit. Non numeric values pass through unformatted.
pub fn format_reading(field: &str, value: &Value) -> String {
    match value.as_number() {
        Some(n) => format!("{}{}", format_measurement(n), unit_suffix(field)),
        None => value.to_string(),
    }
}

pub fn resolve(column: &ColumnDescriptor, classification: Classification) -> RendererName {
    if column.tags {
        RendererName::Tags
    } else if classification.is_negative {
        RendererName::Negative
    } else {
        RendererName::Default
    }
}

impl Renderer {
    /// The renderer actually used for `column`. A column with its own
    /// formatter replaces the editable field with that formatter.
    pub fn for_column(&self, column: &ColumnDescriptor) -> Renderer {
        match (self, column.formatter) {
            (Renderer::Editable, Some(formatter)) => Renderer::Custom(formatter),
            (renderer, _) => *renderer,
        }
    }

    pub fn render(&self, ctx: &RenderContext) -> DisplayOutput {
        match self {
            Renderer::Editable => match ctx.buffer {
                Some(buffer) => DisplayOutput::Editable {
                    text: buffer.text().to_string(),
                    dirty: buffer.is_dirty(),
                },
                None => DisplayOutput::Editable {
                    text: ctx.value.to_string(),
                    dirty: false,
                },
            },
            Renderer::TagList => match ctx.value {
                Value::Tags(tags) => DisplayOutput::Tags(
                    tags.iter()
                        .map(|t| Badge {
                            label: t.label.clone(),
                            detail: t.value.map(format_number),
                        })
                        .collect(),
                ),
                Value::Missing => DisplayOutput::Tags(Vec::new()),
                other => DisplayOutput::Tags(vec![Badge {
                    label: other.to_string(),
                    detail: None,
                }]),
            },
            Renderer::Warning => DisplayOutput::Warning(format_reading(&ctx.column.id, ctx.value)),
            Renderer::Custom(formatter) => DisplayOutput::Text(formatter(ctx.value)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registry {
    renderers: HashMap<RendererName, Renderer>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Registry::empty();
        registry.register(RendererName::Default, Renderer::Editable);
        registry.register(RendererName::Tags, Renderer::TagList);
        registry.register(RendererName::Negative, Renderer::Warning);
        registry
    }
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            renderers: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: RendererName, renderer: Renderer) -> Option<Renderer> {
        self.renderers.insert(name, renderer)
    }

    #[cfg(test)]
    pub fn unregister(&mut self, name: RendererName) -> Option<Renderer> {
        self.renderers.remove(&name)
    }

    pub fn get(&self, name: RendererName) -> Result<&Renderer, VitalsError> {
        self.renderers
            .get(&name)
            .ok_or_else(|| VitalsError::RendererNotFound(name.to_string()))
    }

    pub fn render(&self, name: RendererName, ctx: &RenderContext) -> Result<DisplayOutput, VitalsError> {
        Ok(self.get(name)?.for_column(ctx.column).render(ctx))
    }

    #[cfg(test)]
    pub fn render_named(&self, name: &str, ctx: &RenderContext) -> Result<DisplayOutput, VitalsError> {
        self.render(name.parse()?, ctx)
    }

    /// Resolves and renders one cell. A lookup failure is turned into an
    /// error marker for this cell only.
    pub fn render_cell(&self, classification: Classification, ctx: &RenderContext) -> DisplayOutput {
        let name = resolve(ctx.column, classification);
        self.render(name, ctx).unwrap_or_else(|err| {
            error!(
                "Cell {}:{}: {err}\n{}",
                ctx.row_index,
                ctx.column.id,
                SpanTrace::capture()
            );
            DisplayOutput::Error(RENDERER_ERROR.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::columns::patient_columns;
    use crate::record::{FIRST_NAME, NOTES, STATUS, SYMPTOMS, TagEntry};

    fn column(id: &str) -> ColumnDescriptor {
        patient_columns().into_iter().find(|c| c.id == id).unwrap()
    }

    fn render(registry: &Registry, row: &Row, column: &ColumnDescriptor) -> DisplayOutput {
        let ctx = RenderContext::new(0, row, column);
        registry.render_cell(classify(&column.id, ctx.value), &ctx)
    }

    #[test]
    fn tags_take_precedence_over_negative() {
        let col = ColumnDescriptor::new(TEMPERATURE, "Temp").with_tags(true);
        let negative = Classification { is_negative: true };
        assert_eq!(resolve(&col, negative), RendererName::Tags);
        assert_eq!(resolve(&column(TEMPERATURE), negative), RendererName::Negative);
        assert_eq!(
            resolve(&column(TEMPERATURE), Classification::default()),
            RendererName::Default
        );
    }

    #[test]
    fn resolution_is_idempotent() {
        let col = column(SPO2);
        let c = Classification { is_negative: true };
        let first = resolve(&col, c);
        for _ in 0..10 {
            assert_eq!(resolve(&col, c), first);
        }
    }

    #[test]
    fn negative_temperature_renders_warning() {
        let row = Row::new().with(TEMPERATURE, Value::Number(99.5));
        let out = render(&Registry::default(), &row, &column(TEMPERATURE));
        assert_eq!(out, DisplayOutput::Warning("99.5°F".into()));
    }

    #[test]
    fn spo2_boundary_changes_only_the_indicator() {
        let registry = Registry::default();
        let low = Row::new().with(SPO2, Value::Number(88.0));
        let ok = Row::new().with(SPO2, Value::Number(88.1));
        assert_eq!(
            render(&registry, &low, &column(SPO2)),
            DisplayOutput::Warning("88%".into())
        );
        let out = render(&registry, &ok, &column(SPO2));
        assert_eq!(out, DisplayOutput::Text("88.1%".into()));
        assert!(!matches!(out, DisplayOutput::Warning(_)));
    }

    #[test]
    fn symptoms_render_as_badges() {
        let row = Row::new().with(
            SYMPTOMS,
            Value::Tags(vec![TagEntry::new("cough", Some(3.0))]),
        );
        let out = render(&Registry::default(), &row, &column(SYMPTOMS));
        assert_eq!(
            out,
            DisplayOutput::Tags(vec![Badge {
                label: "cough".into(),
                detail: Some("3".into()),
            }])
        );

        let status = Row::new().with(STATUS, Value::Tags(vec![TagEntry::new("In-patient", None)]));
        let out = render(&Registry::default(), &status, &column(STATUS));
        assert_eq!(out.plain_text(), "In-patient");
    }

    #[test]
    fn tags_column_ignores_negative_classification() {
        let col = ColumnDescriptor::new(TEMPERATURE, "Temp").with_tags(true);
        let row = Row::new().with(TEMPERATURE, Value::Tags(vec![TagEntry::new("cough", Some(3.0))]));
        let ctx = RenderContext::new(0, &row, &col);
        let out = Registry::default().render_cell(Classification { is_negative: true }, &ctx);
        assert_eq!(out.plain_text(), "cough 3");
    }

    #[test]
    fn unknown_renderer_name_is_reported() {
        let row = Row::new();
        let col = column(NOTES);
        let ctx = RenderContext::new(0, &row, &col);
        let err = Registry::default().render_named("nonexistent", &ctx).unwrap_err();
        assert!(matches!(err, VitalsError::RendererNotFound(ref n) if n == "nonexistent"));
        assert!(Registry::default().render_named("tags", &ctx).is_ok());
    }

    #[test]
    fn missing_renderer_only_breaks_its_cell() {
        let mut registry = Registry::default();
        registry.unregister(RendererName::Tags);
        let row = Row::new()
            .with(SYMPTOMS, Value::Tags(vec![TagEntry::new("cough", Some(3.0))]))
            .with(TEMPERATURE, Value::Number(99.5))
            .with(NOTES, Value::Text("ok".into()));

        let outputs: Vec<DisplayOutput> = [SYMPTOMS, TEMPERATURE, NOTES]
            .iter()
            .map(|id| render(&registry, &row, &column(id)))
            .collect();
        assert_eq!(outputs[0], DisplayOutput::Error(RENDERER_ERROR.into()));
        assert_eq!(outputs[1], DisplayOutput::Warning("99.5°F".into()));
        assert_eq!(
            outputs[2],
            DisplayOutput::Editable {
                text: "ok".into(),
                dirty: false
            }
        );
    }

    #[test]
    fn negative_renderer_passes_non_numbers_through() {
        let row = Row::new().with(TEMPERATURE, Value::Text("hot".into()));
        let col = column(TEMPERATURE);
        let ctx = RenderContext::new(0, &row, &col);
        let out = Registry::default().render(RendererName::Negative, &ctx).unwrap();
        assert_eq!(out, DisplayOutput::Warning("hot".into()));
    }

    #[test]
    fn default_renderer_shows_the_focused_buffer() {
        let row = Row::new().with(NOTES, Value::Text("old".into()));
        let col = column(NOTES);
        let mut buffer = EditBuffer::new(0, NOTES, row.get(NOTES));
        buffer.edit("new");

        let ctx = RenderContext::new(0, &row, &col).with_buffer(Some(&buffer));
        assert_eq!(
            Renderer::Editable.render(&ctx),
            DisplayOutput::Editable {
                text: "new".into(),
                dirty: true
            }
        );

        // A buffer of another row is not shown.
        let ctx = RenderContext::new(1, &row, &col).with_buffer(Some(&buffer));
        assert_eq!(
            Renderer::Editable.render(&ctx),
            DisplayOutput::Editable {
                text: "old".into(),
                dirty: false
            }
        );
    }

    #[test]
    fn custom_renderer_overrides_the_default() {
        fn shout(v: &Value) -> String {
            v.to_string().to_uppercase()
        }
        let mut registry = Registry::default();
        registry.register(RendererName::Default, Renderer::Custom(shout));
        let row = Row::new().with(NOTES, Value::Text("quiet".into()));
        assert_eq!(
            render(&registry, &row, &column(NOTES)),
            DisplayOutput::Text("QUIET".into())
        );
    }

    #[test]
    fn measurement_keeps_one_decimal() {
        assert_eq!(format_measurement(99.5), "99.5");
        assert_eq!(format_measurement(88.0), "88");
        assert_eq!(format_measurement(12.345), "12.3");
        assert_eq!(format_reading(NOTES, &Value::Number(4.0)), "4");
    }

    #[test]
    fn near_zero_readings_lose_their_sign() {
        assert_eq!(format_measurement(-0.04), "0");
        assert_eq!(format_measurement(-0.0), "0");
        assert_eq!(format_measurement(-0.06), "-0.1");
    }

    #[test]
    fn high_resting_hr_renders_with_percent() {
        let row = Row::new().with(RESTING_HR, Value::Number(5.5));
        let out = render(&Registry::default(), &row, &column(RESTING_HR));
        assert_eq!(out, DisplayOutput::Warning("5.5%".into()));

        let row = Row::new().with(RESTING_HR, Value::Number(5.0));
        let out = render(&Registry::default(), &row, &column(RESTING_HR));
        assert_eq!(out, DisplayOutput::Text("5%".into()));
    }

    #[test]
    fn formatted_columns_dispatch_to_their_formatter() {
        let registry = Registry::default();
        let default = registry.get(RendererName::Default).unwrap();
        assert!(matches!(default.for_column(&column(FIRST_NAME)), Renderer::Custom(_)));
        assert!(matches!(default.for_column(&column(TEMPERATURE)), Renderer::Custom(_)));
        assert!(matches!(default.for_column(&column(NOTES)), Renderer::Editable));

        let tags = registry.get(RendererName::Tags).unwrap();
        assert!(matches!(tags.for_column(&column(SYMPTOMS)), Renderer::TagList));
    }
}
