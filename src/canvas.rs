use crate::text::{Face, FontSpec};
use crate::types::{Color, Pt, Rect, Size};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SaveState,
    RestoreState,
    // Non-rendered metadata used for page-aware reporting. Ignored by the content writer.
    Meta {
        key: String,
        value: String,
    },
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(Pt),
    SetFont {
        face: Face,
        size: Pt,
    },
    MoveTo {
        x: Pt,
        y: Pt,
    },
    LineTo {
        x: Pt,
        y: Pt,
    },
    Fill,
    Stroke,
    DrawRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    DrawString {
        x: Pt,
        y: Pt,
        text: String,
    },
    DrawImage {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        resource_id: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct GraphicsState {
    fill_color: Color,
    stroke_color: Color,
    line_width: Pt,
    font: Option<(Face, Pt)>,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::from_f32(1.0),
            font: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub commands: Vec<Command>,
    state: GraphicsState,
    state_stack: Vec<GraphicsState>,
}

impl Page {
    fn new() -> Self {
        Self {
            commands: Vec::new(),
            state: GraphicsState::default(),
            state_stack: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.commands
            .iter()
            .all(|cmd| matches!(cmd, Command::Meta { .. }))
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|cmd| match cmd {
            Command::DrawString { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn meta_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.commands.iter().filter_map(move |cmd| match cmd {
            Command::Meta { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }
}

/// Overlay book: one command list per output page, addressed by page index.
#[derive(Debug, Clone)]
pub struct Document {
    pub page_size: Size,
    pub pages: Vec<Page>,
}

/// Records drawing commands in PDF user space (origin bottom-left).
pub struct Canvas {
    page_size: Size,
    pages: Vec<Page>,
    current: usize,
}

impl Canvas {
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            pages: vec![Page::new()],
            current: 0,
        }
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn page_index(&self) -> usize {
        self.current
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Switches to `index`, creating empty pages up to it when needed.
    pub fn goto_page(&mut self, index: usize) {
        while self.pages.len() <= index {
            self.pages.push(Page::new());
        }
        self.current = index;
    }

    /// Starts a fresh page after the last one and makes it current.
    pub fn show_page(&mut self) -> usize {
        let index = self.pages.len();
        self.goto_page(index);
        index
    }

    fn page(&mut self) -> &mut Page {
        &mut self.pages[self.current]
    }

    fn push(&mut self, command: Command) {
        self.page().commands.push(command);
    }

    pub fn save_state(&mut self) {
        let page = self.page();
        page.state_stack.push(page.state.clone());
        page.commands.push(Command::SaveState);
    }

    pub fn restore_state(&mut self) {
        let page = self.page();
        if let Some(state) = page.state_stack.pop() {
            page.state = state;
            page.commands.push(Command::RestoreState);
        }
    }

    pub fn meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.push(Command::Meta {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn set_fill_color(&mut self, color: Color) {
        let page = self.page();
        if page.state.fill_color == color {
            return;
        }
        page.state.fill_color = color;
        page.commands.push(Command::SetFillColor(color));
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        let page = self.page();
        if page.state.stroke_color == color {
            return;
        }
        page.state.stroke_color = color;
        page.commands.push(Command::SetStrokeColor(color));
    }

    pub fn set_line_width(&mut self, width: Pt) {
        let width = width.max(Pt::ZERO);
        let page = self.page();
        if page.state.line_width == width {
            return;
        }
        page.state.line_width = width;
        page.commands.push(Command::SetLineWidth(width));
    }

    pub fn set_font(&mut self, font: FontSpec) {
        let page = self.page();
        if page.state.font == Some((font.face, font.size)) {
            return;
        }
        page.state.font = Some((font.face, font.size));
        page.commands.push(Command::SetFont {
            face: font.face,
            size: font.size,
        });
    }

    pub fn move_to(&mut self, x: Pt, y: Pt) {
        self.push(Command::MoveTo { x, y });
    }

    pub fn line_to(&mut self, x: Pt, y: Pt) {
        self.push(Command::LineTo { x, y });
    }

    pub fn fill(&mut self) {
        self.push(Command::Fill);
    }

    pub fn stroke(&mut self) {
        self.push(Command::Stroke);
    }

    pub fn draw_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.push(Command::DrawRect {
            x,
            y,
            width,
            height,
        });
    }

    pub fn stroke_rect(&mut self, rect: Rect) {
        self.draw_rect(rect.x, rect.y, rect.width, rect.height);
        self.stroke();
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.set_fill_color(color);
        self.draw_rect(rect.x, rect.y, rect.width, rect.height);
        self.fill();
        self.set_fill_color(Color::BLACK);
    }

    pub fn hline(&mut self, x0: Pt, x1: Pt, y: Pt) {
        self.move_to(x0, y);
        self.line_to(x1, y);
        self.stroke();
    }

    pub fn vline(&mut self, x: Pt, y0: Pt, y1: Pt) {
        self.move_to(x, y0);
        self.line_to(x, y1);
        self.stroke();
    }

    pub fn draw_string(&mut self, x: Pt, y: Pt, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        self.push(Command::DrawString { x, y, text });
    }

    pub fn draw_text(&mut self, font: FontSpec, x: Pt, y: Pt, text: impl Into<String>) {
        self.set_font(font);
        self.draw_string(x, y, text);
    }

    pub fn draw_image(
        &mut self,
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        resource_id: impl Into<String>,
    ) {
        self.push(Command::DrawImage {
            x,
            y,
            width,
            height,
            resource_id: resource_id.into(),
        });
    }

    pub fn current_command_count(&self) -> usize {
        self.pages[self.current].commands.len()
    }

    pub fn finish(self) -> Document {
        Document {
            page_size: self.page_size,
            pages: self.pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redundant_state_changes_are_elided() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.set_font(FontSpec::regular(9.0));
        canvas.set_font(FontSpec::regular(9.0));
        canvas.set_stroke_color(Color::BLACK);
        canvas.set_line_width(Pt::from_f32(1.0));
        assert_eq!(canvas.current_command_count(), 1);
    }

    #[test]
    fn goto_page_creates_intermediate_pages() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.goto_page(2);
        canvas.draw_string(Pt::ZERO, Pt::ZERO, "third");
        let doc = canvas.finish();
        assert_eq!(doc.pages.len(), 3);
        assert!(doc.pages[0].is_empty());
        assert_eq!(doc.pages[2].texts().collect::<Vec<_>>(), vec!["third"]);
    }

    #[test]
    fn graphics_state_is_tracked_per_page() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.set_font(FontSpec::bold(12.0));
        canvas.show_page();
        canvas.set_font(FontSpec::bold(12.0));
        let doc = canvas.finish();
        assert_eq!(doc.pages[1].commands.len(), 1);
    }

    #[test]
    fn empty_strings_are_not_recorded() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.draw_string(Pt::ZERO, Pt::ZERO, "");
        assert_eq!(canvas.current_command_count(), 0);
    }
}
