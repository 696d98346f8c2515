use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState},
};
use std::iter::once;

use crate::domain::CMDMode;
use crate::model::{Model, SelectionState, UIData};
use crate::renderer::DisplayOutput;

pub const CMDLINE_HEIGH: u16 = 1;
pub const FOOTER_HEIGHT: u16 = 1;
pub const TABLE_HEADER_HEIGHT: u16 = 2;
pub const COLUMN_WIDTH_MARGIN: usize = 1;

const WARNING_RED: Color = Color::Rgb(255, 96, 96);
const POPUP_WIDTH: u16 = 64;
const POPUP_HEIGHT: u16 = 28;

#[derive(Default)]
pub struct TableUI {
    state: TableState,
}

fn checkbox(selected: bool) -> &'static str {
    if selected { "[x]" } else { "[ ]" }
}

fn output_cell(output: &DisplayOutput) -> Cell<'static> {
    match output {
        DisplayOutput::Text(s) => Cell::from(s.clone()),
        DisplayOutput::Editable { text, dirty } => {
            if *dirty {
                Cell::from(Span::styled(
                    text.clone(),
                    Style::new().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
                ))
            } else {
                Cell::from(text.clone())
            }
        }
        DisplayOutput::Tags(badges) => {
            let mut spans = Vec::with_capacity(badges.len() * 3);
            for badge in badges {
                spans.push(Span::styled(
                    format!(" {} ", badge.label),
                    Style::new().fg(Color::Black).bg(Color::Gray),
                ));
                if let Some(detail) = &badge.detail {
                    spans.push(Span::styled(
                        format!("{detail} "),
                        Style::new().fg(Color::White).bg(Color::DarkGray),
                    ));
                }
                spans.push(Span::raw(" "));
            }
            Cell::from(Line::from(spans))
        }
        DisplayOutput::Warning(s) => {
            let style = Style::new().fg(WARNING_RED).add_modifier(Modifier::BOLD);
            Cell::from(Line::from(vec![
                Span::styled("⚠ ", style),
                Span::styled(s.clone(), style),
            ]))
        }
        DisplayOutput::Error(s) => Cell::from(Span::styled(
            s.clone(),
            Style::new().fg(WARNING_RED).add_modifier(Modifier::REVERSED),
        )),
    }
}

fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

fn footer_line(ui: &UIData) -> Line<'static> {
    let page_size = match ui.page_size {
        0 => "all".to_string(),
        n => n.to_string(),
    };
    let mut spans = vec![
        Span::from(format!(" Page {}/{}", ui.page_index + 1, ui.page_count)).bold(),
        Span::from(format!(" | {page_size} per page | {} of {} rows | {} selected", ui.nrows, ui.total_rows, ui.nselected)),
    ];
    if let Some(h) = ui.headers.iter().find(|h| h.sorted.is_some()) {
        let arrow = if h.sorted == Some(true) { "↑" } else { "↓" };
        spans.push(Span::from(format!(" | sorted by {} {arrow}", h.title)));
    }
    if let Some(filter) = &ui.filter {
        spans.push(Span::from(" | filter: "));
        spans.push(Span::from(filter.clone()).yellow());
    }
    Line::from(spans)
}

impl TableUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        self.draw_uidata(model.get_uidata(), frame);
    }

    fn draw_uidata(&mut self, ui: &UIData, frame: &mut Frame) {
        let [table_area, footer_area, cmd_area] = Layout::vertical([
            Constraint::Min(TABLE_HEADER_HEIGHT + 2),
            Constraint::Length(FOOTER_HEIGHT),
            Constraint::Length(CMDLINE_HEIGH),
        ])
        .areas(frame.area());

        self.draw_table(ui, frame, table_area);
        frame.render_widget(Paragraph::new(footer_line(ui)), footer_area);
        Self::draw_cmdline(ui, frame, cmd_area);

        if ui.show_popup {
            let area = popup_area(frame.area(), POPUP_WIDTH, POPUP_HEIGHT);
            frame.render_widget(Clear, area);
            frame.render_widget(
                Paragraph::new(ui.popup_message.as_str())
                    .block(Block::bordered().title(Line::from(" Help ").bold().centered())),
                area,
            );
        }
    }

    fn draw_table(&mut self, ui: &UIData, frame: &mut Frame, area: Rect) {
        let label_width = ui.rows.iter().map(|r| r.label.len()).max().unwrap_or(1);
        let selection_width = (3 + 1 + label_width) as u16;

        let all_selected = match ui.selection {
            SelectionState::All => "[x]",
            SelectionState::Some => "[-]",
            SelectionState::None => "[ ]",
        };
        let header = Row::new(
            once(Cell::from(Text::from(vec![Line::from(""), Line::from(all_selected)]))).chain(
                ui.headers.iter().map(|h| {
                    let title = match h.sorted {
                        Some(true) => format!("{} ↑", h.title),
                        Some(false) => format!("{} ↓", h.title),
                        None => h.title.clone(),
                    };
                    Cell::from(Text::from(vec![
                        Line::from(h.group.clone()).dim(),
                        Line::from(title).bold(),
                    ]))
                }),
            ),
        )
        .height(TABLE_HEADER_HEIGHT);

        let rows = ui.rows.iter().enumerate().map(|(ridx, row)| {
            let selection = Cell::from(format!("{} {:>label_width$}", checkbox(row.selected), row.label));
            Row::new(once(selection).chain(row.cells.iter().enumerate().map(|(cidx, out)| {
                let cell = output_cell(out);
                if ridx == ui.selected_row && cidx == ui.selected_column {
                    let modifier = if ui.editing { Modifier::UNDERLINED } else { Modifier::REVERSED };
                    cell.style(Style::new().add_modifier(modifier))
                } else {
                    cell
                }
            })))
        });

        let widths = once(Constraint::Length(selection_width))
            .chain(ui.headers.iter().map(|h| Constraint::Length(h.width as u16)));

        let table = Table::new(rows, widths)
            .header(header)
            .column_spacing(1)
            .row_highlight_style(Style::new().bg(Color::Rgb(40, 40, 40)))
            .block(
                Block::bordered()
                    .title(Line::from(format!(" {} ", ui.name)).bold().centered())
                    .title_bottom(Line::from(" ? help | q quit ").centered()),
            );

        self.state
            .select((!ui.rows.is_empty()).then_some(ui.selected_row));
        frame.render_stateful_widget(table, area, &mut self.state);
    }

    fn draw_cmdline(ui: &UIData, frame: &mut Frame, area: Rect) {
        if ui.active_cmdinput {
            let prompt = match ui.cmd_mode {
                Some(CMDMode::Filter) => "/",
                Some(CMDMode::EditCell) => "edit: ",
                None => "> ",
            };
            let line = Line::from(vec![
                Span::from(prompt).bold(),
                Span::from(ui.cmdinput.input.clone()),
            ]);
            frame.render_widget(Paragraph::new(line), area);
            let x = area.x + (prompt.chars().count() + ui.cmdinput.curser_pos) as u16;
            frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
        } else {
            frame.render_widget(Paragraph::new(ui.status_message.as_str()).dim(), area);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::patient_columns;
    use crate::config::GridConfig;
    use crate::domain::Message;
    use crate::mockdata::MockGenerator;
    use crate::record::{FIRST_NAME, Row as Record, SPO2, SYMPTOMS, TEMPERATURE, TagEntry, Value};
    use ratatui::{Terminal, backend::TestBackend};

    fn model() -> Model {
        let rows = (0..5)
            .map(|i| {
                Record::new()
                    .with(FIRST_NAME, Value::Text(format!("Patient{i}")))
                    .with(TEMPERATURE, Value::Number(98.0 + i as f64 * 0.5))
                    .with(SPO2, Value::Number(95.0))
                    .with(SYMPTOMS, Value::Tags(vec![TagEntry::new("cough", Some(3.0))]))
            })
            .collect();
        let config = GridConfig::default().with_page_size(2);
        Model::init(&config, "ward", patient_columns(), rows, MockGenerator::new(1))
    }

    fn render(model: &Model) -> String {
        let mut terminal = Terminal::new(TestBackend::new(180, 20)).unwrap();
        let mut ui = TableUI::new();
        terminal.draw(|f| ui.draw(model, f)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn grid_shows_headers_cells_and_footer() {
        let screen = render(&model());
        assert!(screen.contains("Patient"));
        assert!(screen.contains("First Name"));
        assert!(screen.contains("Patient0"));
        assert!(screen.contains("98°F"));
        assert!(screen.contains("cough"));
        assert!(screen.contains("Page 1/3"));
        assert!(screen.contains("[ ]"));
    }

    #[test]
    fn negative_values_get_a_warning_sign() {
        let mut m = model();
        m.update(Some(Message::LastPage));
        let screen = render(&m);
        assert!(screen.contains("⚠ 100°F"));
        assert!(screen.contains("Page 3/3"));
    }

    #[test]
    fn help_popup_is_drawn_on_top() {
        let mut m = model();
        m.update(Some(Message::Help));
        let screen = render(&m);
        assert!(screen.contains("Help"));
        assert!(screen.contains("Navigation"));
    }

    #[test]
    fn popup_area_is_clamped_to_the_frame() {
        let area = popup_area(Rect::new(0, 0, 40, 10), POPUP_WIDTH, POPUP_HEIGHT);
        assert_eq!(area, Rect::new(0, 0, 40, 10));
        let area = popup_area(Rect::new(0, 0, 100, 40), 20, 10);
        assert_eq!(area, Rect::new(40, 15, 20, 10));
    }
}
