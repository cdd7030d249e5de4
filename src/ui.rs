use std::time::Duration;

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState,
        Wrap,
    },
};

use crate::domain::CMDMode;
use crate::model::{ColumnItem, EditView, Model, Popup, UIData};
use crate::pipeline::SortDirection;
use crate::preferences::Theme;

const STATUS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(5);
const EMPTY_CELL: &str = "-";
const ROLE_KEY: &str = "role";
const HIGHLIGHTED_ROLE: &str = "Manager";

struct Palette {
    base: Style,
    title: Style,
    header: Style,
    selected_row: Style,
    selected_cell: Style,
    editing_row: Style,
    muted: Style,
    error: Style,
    chip: Style,
    chip_highlight: Style,
    border: Style,
}

impl Palette {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Light => Palette {
                base: Style::default().fg(Color::Black).bg(Color::White),
                title: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
                header: Style::default()
                    .fg(Color::Black)
                    .bg(Color::Gray)
                    .add_modifier(Modifier::BOLD),
                selected_row: Style::default().bg(Color::LightBlue),
                selected_cell: Style::default().add_modifier(Modifier::REVERSED),
                editing_row: Style::default().bg(Color::LightYellow),
                muted: Style::default().fg(Color::DarkGray),
                error: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                chip: Style::default().fg(Color::Black).bg(Color::Gray),
                chip_highlight: Style::default().fg(Color::White).bg(Color::Magenta),
                border: Style::default().fg(Color::Blue),
            },
            Theme::Dark => Palette {
                base: Style::default().fg(Color::Gray).bg(Color::Black),
                title: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                header: Style::default()
                    .fg(Color::White)
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
                selected_row: Style::default().bg(Color::Blue),
                selected_cell: Style::default().add_modifier(Modifier::REVERSED),
                editing_row: Style::default().bg(Color::Yellow).fg(Color::Black),
                muted: Style::default().fg(Color::DarkGray),
                error: Style::default().fg(Color::LightRed).add_modifier(Modifier::BOLD),
                chip: Style::default().fg(Color::White).bg(Color::DarkGray),
                chip_highlight: Style::default().fg(Color::Black).bg(Color::LightMagenta),
                border: Style::default().fg(Color::Cyan),
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct TableUI {
    table_state: TableState,
}

impl TableUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let palette = Palette::for_theme(uidata.theme);
        let area = frame.area();
        frame.render_widget(Block::default().style(palette.base), area);

        let [title_area, info_area, table_area, footer_area, cmdline_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(area);

        self.draw_title(uidata, &palette, frame, title_area);
        self.draw_info(uidata, &palette, frame, info_area);
        self.draw_table(uidata, &palette, frame, table_area);
        self.draw_footer(uidata, &palette, frame, footer_area);
        self.draw_cmdline(uidata, &palette, frame, cmdline_area);

        match &uidata.popup {
            Some(Popup::Message(message)) => draw_message(message, &palette, frame, area),
            Some(Popup::Confirm(question)) => draw_confirm(question, &palette, frame, area),
            Some(Popup::Columns { items, selected }) => {
                draw_columns(items, *selected, &palette, frame, area)
            }
            Some(Popup::Edit(view)) => draw_edit_form(view, &palette, frame, area),
            None => {}
        }
    }

    fn draw_title(&self, uidata: &UIData, palette: &Palette, frame: &mut Frame, area: Rect) {
        let theme = match uidata.theme {
            Theme::Light => "light",
            Theme::Dark => "dark",
        };
        let line = Line::from(vec![
            Span::styled(format!(" {} ", uidata.title), palette.title),
            Span::styled(format!("[{theme}]"), palette.muted),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }

    /// Search term, running import or the last import error.
    fn draw_info(&self, uidata: &UIData, palette: &Palette, frame: &mut Frame, area: Rect) {
        let line = if let Some(error) = &uidata.import_error {
            Line::from(vec![
                Span::styled(format!(" {error}"), palette.error),
                Span::styled("  (Esc to dismiss)", palette.muted),
            ])
        } else if let Some(path) = &uidata.importing {
            Line::from(vec![
                Span::raw(format!(" Importing {} ...", path.display())),
                Span::styled("  (Esc to cancel)", palette.muted),
            ])
        } else if !uidata.search_term.is_empty() {
            Line::from(vec![
                Span::styled(" Search: ", palette.muted),
                Span::raw(uidata.search_term.clone()),
            ])
        } else {
            Line::from(Span::styled(" Search all fields with /", palette.muted))
        };
        frame.render_widget(Paragraph::new(line), area);
    }

    fn draw_table(&mut self, uidata: &UIData, palette: &Palette, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(palette.border);

        if uidata.rows.is_empty() {
            let inner = block.inner(area);
            frame.render_widget(block, area);
            let [_, middle, _] = Layout::vertical([
                Constraint::Fill(1),
                Constraint::Length(1),
                Constraint::Fill(1),
            ])
            .areas(inner);
            frame.render_widget(
                Paragraph::new("No data available")
                    .style(palette.muted)
                    .alignment(Alignment::Center),
                middle,
            );
            return;
        }

        let header = Row::new(uidata.header.iter().map(|h| {
            let arrow = match h.sort {
                Some(SortDirection::Ascending) => " ↑",
                Some(SortDirection::Descending) => " ↓",
                None => "",
            };
            Cell::from(format!("{}{arrow}", h.label))
        }))
        .style(palette.header);

        let rows = uidata.rows.iter().map(|row| {
            let cells = row
                .cells
                .iter()
                .zip(uidata.header.iter())
                .map(|(value, header)| render_cell(value, &header.key, palette));
            let style = if row.editing {
                palette.editing_row
            } else {
                Style::default()
            };
            Row::new(cells).style(style)
        });

        let widths = vec![Constraint::Fill(1); uidata.header.len()];
        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .column_spacing(2)
            .row_highlight_style(palette.selected_row)
            .cell_highlight_style(palette.selected_cell);

        self.table_state.select(Some(uidata.selected_row));
        self.table_state.select_column(Some(uidata.selected_column));
        frame.render_stateful_widget(table, area, &mut self.table_state);
    }

    fn draw_footer(&self, uidata: &UIData, palette: &Palette, frame: &mut Frame, area: Rect) {
        let (first, last) = uidata.showing_range();
        let text = format!(
            " Showing {first} to {last} of {} entries · Page {}/{}",
            uidata.total_matches, uidata.current_page, uidata.page_count
        );
        frame.render_widget(Paragraph::new(text).style(palette.muted), area);
    }

    fn draw_cmdline(&self, uidata: &UIData, palette: &Palette, frame: &mut Frame, area: Rect) {
        if uidata.active_cmdinput {
            let prompt = match uidata.cmd_mode {
                Some(CMDMode::Search) => "/",
                Some(CMDMode::ImportPath) => "Import CSV file: ",
                Some(CMDMode::AddColumn) => "Column label: ",
                None => ":",
            };
            let input = &uidata.cmdinput;
            frame.render_widget(
                Paragraph::new(format!("{prompt}{}", input.input)),
                area,
            );
            let offset = (prompt.chars().count() + input.curser_pos) as u16;
            frame.set_cursor_position(Position::new(area.x + offset, area.y));
            return;
        }

        let line = if uidata.last_status_message_update.elapsed() < STATUS_MESSAGE_TIMEOUT {
            Line::from(format!(" {}", uidata.status_message))
        } else {
            Line::from(Span::styled(" ? help  q quit", palette.muted))
        };
        frame.render_widget(Paragraph::new(line), area);
    }
}

fn render_cell<'a>(value: &'a str, key: &str, palette: &Palette) -> Cell<'a> {
    if value.is_empty() {
        return Cell::from(Span::styled(EMPTY_CELL, palette.muted));
    }
    if key == ROLE_KEY {
        let style = if value == HIGHLIGHTED_ROLE {
            palette.chip_highlight
        } else {
            palette.chip
        };
        return Cell::from(Span::styled(format!(" {value} "), style));
    }
    Cell::from(value)
}

pub fn centered_area(area: Rect, max_width: u16, max_height: u16) -> Rect {
    let width = area.width.min(max_width);
    let height = area.height.min(max_height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn popup_block<'a>(title: &'a str, palette: &Palette) -> Block<'a> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(palette.border)
        .style(palette.base)
}

fn draw_message(message: &str, palette: &Palette, frame: &mut Frame, area: Rect) {
    let height = message.lines().count() as u16 + 2;
    let dialog = centered_area(area, 64, height);
    frame.render_widget(Clear, dialog);
    frame.render_widget(
        Paragraph::new(message)
            .block(popup_block(" Help ", palette))
            .wrap(Wrap { trim: false }),
        dialog,
    );
}

fn draw_confirm(question: &str, palette: &Palette, frame: &mut Frame, area: Rect) {
    let dialog = centered_area(area, 50, 5);
    frame.render_widget(Clear, dialog);
    let text = Text::from(vec![
        Line::from(question),
        Line::from(""),
        Line::from(Span::styled("y / Enter: delete   n / Esc: keep", palette.muted)),
    ]);
    frame.render_widget(
        Paragraph::new(text)
            .alignment(Alignment::Center)
            .block(popup_block(" Confirm ", palette)),
        dialog,
    );
}

fn draw_columns(
    items: &[ColumnItem],
    selected: usize,
    palette: &Palette,
    frame: &mut Frame,
    area: Rect,
) {
    let dialog = centered_area(area, 48, items.len() as u16 + 4);
    frame.render_widget(Clear, dialog);
    let block = popup_block(" Columns ", palette);
    let inner = block.inner(dialog);
    frame.render_widget(block, dialog);

    let [list_area, hint_area] =
        Layout::vertical([Constraint::Fill(1), Constraint::Length(1)]).areas(inner);
    let list = List::new(items.iter().map(|item| {
        let mark = if item.visible { "[x]" } else { "[ ]" };
        ListItem::new(Line::from(vec![
            Span::raw(format!("{mark} {}", item.label)),
            Span::styled(format!("  {}", item.key), palette.muted),
        ]))
    }))
    .highlight_style(palette.selected_row);
    let mut state = ListState::default().with_selected(Some(selected));
    frame.render_stateful_widget(list, list_area, &mut state);
    frame.render_widget(
        Paragraph::new("Space toggle  J/K move  a add").style(palette.muted),
        hint_area,
    );
}

fn draw_edit_form(view: &EditView, palette: &Palette, frame: &mut Frame, area: Rect) {
    let label_width = view
        .fields
        .iter()
        .map(|(label, _)| label.chars().count())
        .max()
        .unwrap_or(0)
        + 2;
    let height = (view.fields.len() + view.errors.len()) as u16 + 5;
    let dialog = centered_area(area, 64, height);
    frame.render_widget(Clear, dialog);
    let title = format!(" {} ", view.title);
    let block = popup_block(&title, palette);
    let inner = block.inner(dialog);
    frame.render_widget(block, dialog);

    let mut lines: Vec<Line> = view
        .fields
        .iter()
        .enumerate()
        .map(|(idx, (label, input))| {
            let label = Span::styled(format!("{label:>label_width$} "), palette.muted);
            let value = if idx == view.active {
                Span::styled(input.input.clone(), palette.selected_row)
            } else {
                Span::raw(input.input.clone())
            };
            Line::from(vec![label, value])
        })
        .collect();
    lines.push(Line::from(""));
    lines.extend(
        view.errors
            .iter()
            .map(|e| Line::from(Span::styled(format!("• {e}"), palette.error))),
    );
    lines.push(Line::from(Span::styled(
        "Tab next  Enter save  Esc cancel",
        palette.muted,
    )));
    frame.render_widget(Paragraph::new(lines), inner);

    if let Some((_, input)) = view.fields.get(view.active) {
        let x = inner.x + (label_width + 1 + input.curser_pos) as u16;
        let y = inner.y + view.active as u16;
        if x < inner.right() && y < inner.bottom() {
            frame.set_cursor_position(Position::new(x, y));
        }
    }
}

#[cfg(test)]
mod tests {
    use ratatui::{Terminal, backend::TestBackend};

    use super::*;
    use crate::domain::{Config, Message};
    use crate::record::seed_records;

    fn render(model: &Model) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        let mut ui = TableUI::new();
        terminal.draw(|f| ui.draw(model, f)).unwrap();
        let buffer = terminal.backend().buffer();
        (0..buffer.area.height)
            .map(|y| {
                (0..buffer.area.width)
                    .map(|x| buffer[(x, y)].symbol())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn renders_table_and_footer() {
        let model = Model::init(&Config::default().page_size(2), seed_records(), None);
        let screen = render(&model);
        assert!(screen.contains("Name"));
        assert!(screen.contains("John Doe"));
        assert!(!screen.contains("Mike Johnson"));
        assert!(screen.contains("Showing 1 to 2 of 5 entries"));
    }

    #[test]
    fn renders_sort_arrow_and_empty_page() {
        let mut model = Model::init(&Config::default(), seed_records(), None);
        model.update(Some(Message::Sort));
        assert!(render(&model).contains("Name ↑"));

        model.update(Some(Message::Search));
        for c in "nobody".chars() {
            let key = ratatui::crossterm::event::KeyEvent::new(
                ratatui::crossterm::event::KeyCode::Char(c),
                ratatui::crossterm::event::KeyModifiers::NONE,
            );
            model.update(Some(Message::RawKey(key)));
        }
        let screen = render(&model);
        assert!(screen.contains("No data available"));
        assert!(screen.contains("Showing 0 to 0 of 0 entries"));
    }

    #[test]
    fn centered_area_fits_inside() {
        let area = Rect::new(0, 0, 40, 10);
        assert_eq!(centered_area(area, 20, 4), Rect::new(10, 3, 20, 4));
        assert_eq!(centered_area(area, 80, 20), area);
    }
}
