use crate::events::KeyAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Open,
    Confirmed(usize),
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct SelectionTable<T> {
    items: Vec<T>,
    selected: usize,
    page_size: usize,
    state: SelectionState,
}

impl<T> SelectionTable<T> {
    pub fn new(items: Vec<T>, page_size: usize) -> Self {
        Self {
            items,
            selected: 0,
            page_size: page_size.max(1),
            state: SelectionState::Open,
        }
    }

    pub fn handle(&mut self, action: KeyAction) -> SelectionState {
        if self.state != SelectionState::Open {
            return self.state;
        }
        match action {
            KeyAction::MoveUp | KeyAction::InputChar('k') => self.move_by(-1),
            KeyAction::MoveDown | KeyAction::InputChar('j') => self.move_by(1),
            KeyAction::PageUp => self.move_by(-(self.page_size as isize)),
            KeyAction::PageDown => self.move_by(self.page_size as isize),
            KeyAction::Home => self.selected = 0,
            KeyAction::End => self.selected = self.items.len().saturating_sub(1),
            KeyAction::Submit => {
                if !self.items.is_empty() {
                    self.state = SelectionState::Confirmed(self.selected);
                }
            }
            KeyAction::Escape | KeyAction::ClearOrQuit | KeyAction::InputChar('q') => {
                self.state = SelectionState::Cancelled;
            }
            _ => {}
        }
        self.state
    }

    fn move_by(&mut self, delta: isize) {
        let last = self.items.len().saturating_sub(1);
        self.selected = self.selected.saturating_add_signed(delta).min(last);
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    // First row index that keeps the selection inside `rows` visible rows.
    pub fn window_start(&self, rows: usize) -> usize {
        self.selected.saturating_sub(rows.max(1) - 1)
    }

    pub fn into_confirmed(mut self) -> Option<T> {
        match self.state {
            SelectionState::Confirmed(idx) if idx < self.items.len() => {
                Some(self.items.swap_remove(idx))
            }
            _ => None,
        }
    }
}
