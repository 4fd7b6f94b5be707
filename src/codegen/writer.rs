/// Line buffer that tracks the current indentation level.
pub(super) struct CodeWriter {
    lines: Vec<String>,
    level: usize,
    width: usize,
}

impl CodeWriter {
    pub fn new(width: usize) -> Self {
        Self {
            lines: Vec::new(),
            level: 0,
            width,
        }
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if text.is_empty() {
            self.lines.push(String::new());
        } else {
            self.lines
                .push(format!("{}{}", " ".repeat(self.level * self.width), text));
        }
    }

    pub fn blank(&mut self) {
        self.lines.push(String::new());
    }

    pub fn indent(&mut self) {
        self.level += 1;
    }

    pub fn dedent(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    pub fn finish(self) -> String {
        let mut code = self.lines.join("\n");
        code.push('\n');
        code
    }
}
