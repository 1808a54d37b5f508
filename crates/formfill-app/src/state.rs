// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

/// Entries whose lowercase form contains the trimmed, lowercased query,
/// sorted case-insensitively. An empty query keeps every entry.
pub fn filter_entries(entries: &[String], query: &str) -> Vec<String> {
    let needle = query.trim().to_lowercase();
    let mut matches: Vec<String> = if needle.is_empty() {
        entries.to_vec()
    } else {
        entries
            .iter()
            .filter(|entry| entry.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    };
    matches.sort_by_cached_key(|entry| entry.to_lowercase());
    matches
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PickList {
    entries: Vec<String>,
    query: String,
    visible: Vec<String>,
    cursor: usize,
}

impl PickList {
    pub fn new(entries: Vec<String>) -> Self {
        let visible = filter_entries(&entries, "");
        Self {
            entries,
            query: String::new(),
            visible,
            cursor: 0,
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn visible(&self) -> &[String] {
        &self.visible
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn selected(&self) -> Option<&str> {
        self.visible.get(self.cursor).map(String::as_str)
    }

    fn refilter(&mut self) {
        self.visible = filter_entries(&self.entries, &self.query);
        self.cursor = 0;
    }

    fn set_cursor(&mut self, index: usize) -> Option<usize> {
        if self.visible.is_empty() {
            self.cursor = 0;
            return None;
        }
        self.cursor = index.min(self.visible.len() - 1);
        Some(self.cursor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    pub picklist: PickList,
    pub status_line: Option<String>,
}

impl AppState {
    pub fn new(entries: Vec<String>) -> Self {
        Self {
            picklist: PickList::new(entries),
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    PushQueryChar(char),
    PopQueryChar,
    ClearQuery,
    MoveCursor(isize),
    SelectFirst,
    SelectLast,
    SelectIndex(usize),
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    QueryChanged { query: String, matches: usize },
    SelectionChanged(Option<usize>),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::PushQueryChar(ch) => {
                self.picklist.query.push(ch);
                self.query_changed()
            }
            AppCommand::PopQueryChar => {
                if self.picklist.query.pop().is_none() {
                    return Vec::new();
                }
                self.query_changed()
            }
            AppCommand::ClearQuery => {
                if self.picklist.query.is_empty() {
                    return Vec::new();
                }
                self.picklist.query.clear();
                self.query_changed()
            }
            AppCommand::MoveCursor(delta) => {
                let current = self.picklist.cursor as isize;
                let next = current.saturating_add(delta).max(0) as usize;
                vec![AppEvent::SelectionChanged(self.picklist.set_cursor(next))]
            }
            AppCommand::SelectFirst => {
                vec![AppEvent::SelectionChanged(self.picklist.set_cursor(0))]
            }
            AppCommand::SelectLast => {
                vec![AppEvent::SelectionChanged(
                    self.picklist.set_cursor(usize::MAX),
                )]
            }
            AppCommand::SelectIndex(index) => {
                if index >= self.picklist.visible.len() {
                    return Vec::new();
                }
                vec![AppEvent::SelectionChanged(self.picklist.set_cursor(index))]
            }
            AppCommand::SetStatus(message) => {
                self.status_line = Some(message.clone());
                vec![AppEvent::StatusUpdated(message)]
            }
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn query_changed(&mut self) -> Vec<AppEvent> {
        self.picklist.refilter();
        vec![
            AppEvent::QueryChanged {
                query: self.picklist.query.clone(),
                matches: self.picklist.visible.len(),
            },
            AppEvent::SelectionChanged(self.picklist.selected().map(|_| 0)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::{AppCommand, AppEvent, AppState, filter_entries};

    fn entries(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_owned()).collect()
    }

    #[test]
    fn filter_matches_substring_case_insensitively() {
        let values = entries(&["value1", "value2"]);
        assert_eq!(filter_entries(&values, "val"), values);
        assert_eq!(filter_entries(&values, "VAL"), values);
    }

    #[test]
    fn filter_trims_query_and_keeps_everything_when_blank() {
        let values = entries(&["beta", "Alpha"]);
        assert_eq!(filter_entries(&values, "   "), entries(&["Alpha", "beta"]));
        assert_eq!(filter_entries(&values, " ALP "), entries(&["Alpha"]));
    }

    #[test]
    fn filter_sorts_ignoring_case() {
        let values = entries(&["delta", "Charlie", "bravo", "Alpha"]);
        assert_eq!(
            filter_entries(&values, ""),
            entries(&["Alpha", "bravo", "Charlie", "delta"])
        );
    }

    #[test]
    fn filter_returns_nothing_for_unmatched_query() {
        let values = entries(&["value1", "value2"]);
        assert!(filter_entries(&values, "zzz").is_empty());
    }

    #[test]
    fn typing_narrows_visible_entries_and_resets_cursor() {
        let mut state = AppState::new(entries(&["Globex", "Acme", "Initech"]));
        state.dispatch(AppCommand::MoveCursor(2));
        assert_eq!(state.picklist.selected(), Some("Initech"));

        let events = state.dispatch(AppCommand::PushQueryChar('e'));
        assert_eq!(
            events,
            vec![
                AppEvent::QueryChanged {
                    query: "e".to_owned(),
                    matches: 3,
                },
                AppEvent::SelectionChanged(Some(0)),
            ]
        );

        state.dispatch(AppCommand::PushQueryChar('x'));
        assert_eq!(state.picklist.visible(), &entries(&["Globex"])[..]);
        assert_eq!(state.picklist.selected(), Some("Globex"));
    }

    #[test]
    fn backspace_on_empty_query_is_a_no_op() {
        let mut state = AppState::new(entries(&["Acme"]));
        assert!(state.dispatch(AppCommand::PopQueryChar).is_empty());
        assert!(state.dispatch(AppCommand::ClearQuery).is_empty());
    }

    #[test]
    fn cursor_clamps_to_visible_range() {
        let mut state = AppState::new(entries(&["a", "b", "c"]));
        state.dispatch(AppCommand::MoveCursor(-5));
        assert_eq!(state.picklist.cursor(), 0);
        state.dispatch(AppCommand::MoveCursor(10));
        assert_eq!(state.picklist.cursor(), 2);
        state.dispatch(AppCommand::SelectFirst);
        assert_eq!(state.picklist.cursor(), 0);
        state.dispatch(AppCommand::SelectLast);
        assert_eq!(state.picklist.selected(), Some("c"));
    }

    #[test]
    fn selection_is_none_when_nothing_matches() {
        let mut state = AppState::new(entries(&["Acme"]));
        let events = state.dispatch(AppCommand::PushQueryChar('z'));
        assert_eq!(events[1], AppEvent::SelectionChanged(None));
        assert_eq!(state.picklist.selected(), None);
        assert_eq!(
            state.dispatch(AppCommand::MoveCursor(1)),
            vec![AppEvent::SelectionChanged(None)]
        );
    }

    #[test]
    fn select_index_ignores_out_of_range_rows() {
        let mut state = AppState::new(entries(&["a", "b"]));
        assert!(state.dispatch(AppCommand::SelectIndex(5)).is_empty());
        assert_eq!(
            state.dispatch(AppCommand::SelectIndex(1)),
            vec![AppEvent::SelectionChanged(Some(1))]
        );
    }

    #[test]
    fn status_set_and_clear() {
        let mut state = AppState::default();
        state.dispatch(AppCommand::SetStatus("filling Acme".to_owned()));
        assert_eq!(state.status_line.as_deref(), Some("filling Acme"));
        assert_eq!(
            state.dispatch(AppCommand::ClearStatus),
            vec![AppEvent::StatusCleared]
        );
        assert_eq!(state.status_line, None);
    }
}
