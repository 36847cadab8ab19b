//! Key dispatch.
//!
//! Maps one key press to state changes and, where needed, a command for the controller.
//! Modal layers take precedence: alert, then dialog, then the filter editor.

use super::state::{UiState, HELP_TAB};
use crate::dialog::{DialogResult, LineInput, RecordDialog};
use crate::model::RecordKind;
use crate::orchestrator::UiCommand;
use crate::table::{PageNav, SortKey, ViewMessage};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug)]
pub(crate) enum KeyOutcome {
    Continue,
    Command(UiCommand),
    Quit,
}

const TAB_COUNT: usize = 3;

pub(crate) fn handle_key(state: &mut UiState, key: KeyEvent) -> KeyOutcome {
    if key.modifiers == KeyModifiers::CONTROL && key.code == KeyCode::Char('c') {
        return KeyOutcome::Quit;
    }
    if state.alert.is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
            state.alert = None;
        }
        return KeyOutcome::Continue;
    }
    if state.dialog.is_some() {
        return dialog_key(state, key);
    }
    if state.filter_editing {
        filter_key(state, key);
        return KeyOutcome::Continue;
    }
    table_key(state, key)
}

/// Shared line editing; returns false when the key is not an editing key.
fn edit_line(input: &mut LineInput, code: KeyCode) -> bool {
    match code {
        KeyCode::Char(ch) => input.insert(ch),
        KeyCode::Backspace => input.backspace(),
        KeyCode::Delete => input.delete(),
        KeyCode::Left => input.left(),
        KeyCode::Right => input.right(),
        KeyCode::Home => input.home(),
        KeyCode::End => input.end(),
        _ => return false,
    }
    true
}

fn dialog_key(state: &mut UiState, key: KeyEvent) -> KeyOutcome {
    let Some(dialog) = state.dialog.as_mut() else {
        return KeyOutcome::Continue;
    };

    let confirm_delete = dialog.is_read_only() && key.code == KeyCode::Char('y');
    let cancel_delete = dialog.is_read_only() && key.code == KeyCode::Char('n');

    let result = match key.code {
        KeyCode::Esc => Some(dialog.cancel()),
        _ if cancel_delete => Some(dialog.cancel()),
        KeyCode::Enter => match dialog.confirm() {
            Ok(res) => Some(res),
            Err(errors) => {
                state.info = format!("{} field(s) need attention", errors.len());
                None
            }
        },
        _ if confirm_delete => dialog.confirm().ok(),
        KeyCode::Tab | KeyCode::Down => {
            dialog.focus_next();
            None
        }
        KeyCode::BackTab | KeyCode::Up => {
            dialog.focus_prev();
            None
        }
        code => {
            if let Some(input) = dialog.focused_mut() {
                edit_line(input, code);
            }
            None
        }
    };

    let Some(result) = result else {
        return KeyOutcome::Continue;
    };
    state.dialog = None;
    if result.code() != DialogResult::CONFIRMED {
        state.info = "Cancelled".into();
        return KeyOutcome::Continue;
    }
    match result.into_action() {
        Some(action) => KeyOutcome::Command(UiCommand::Apply(action)),
        None => KeyOutcome::Continue,
    }
}

fn filter_key(state: &mut UiState, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => state.filter_editing = false,
        KeyCode::Esc => {
            state.filter_editing = false;
            state.filter_input.clear();
            state.update_view(ViewMessage::FilterChanged(String::new()));
        }
        code => {
            if edit_line(&mut state.filter_input, code) {
                let text = state.filter_input.value().to_string();
                state.update_view(ViewMessage::FilterChanged(text));
            }
        }
    }
}

fn switch_tab(state: &mut UiState, tab: usize) -> KeyOutcome {
    state.set_tab(tab);
    match state.kind() {
        Some(kind) => KeyOutcome::Command(UiCommand::SelectKind(kind)),
        None => KeyOutcome::Continue,
    }
}

fn table_key(state: &mut UiState, key: KeyEvent) -> KeyOutcome {
    match key.code {
        KeyCode::Char('q') => return KeyOutcome::Quit,
        KeyCode::Tab => return switch_tab(state, (state.tab + 1) % TAB_COUNT),
        KeyCode::BackTab => return switch_tab(state, (state.tab + TAB_COUNT - 1) % TAB_COUNT),
        KeyCode::Char('?') => {
            state.set_tab(HELP_TAB);
            return KeyOutcome::Continue;
        }
        _ => {}
    }

    let Some(kind) = state.kind() else {
        return KeyOutcome::Continue;
    };

    match key.code {
        KeyCode::Char('r') => return KeyOutcome::Command(UiCommand::Reload),
        KeyCode::Char('/') => state.filter_editing = true,
        KeyCode::Down | KeyCode::Char('j') => state.select_next(),
        KeyCode::Up | KeyCode::Char('k') => state.select_prev(),
        KeyCode::Right | KeyCode::Char('l') => state.navigate(PageNav::Next),
        KeyCode::Left | KeyCode::Char('h') => state.navigate(PageNav::Prev),
        KeyCode::Char('g') | KeyCode::Home => state.navigate(PageNav::First),
        KeyCode::Char('G') | KeyCode::End => state.navigate(PageNav::Last),
        KeyCode::Char('+') => state.navigate(PageNav::Larger),
        KeyCode::Char('-') => state.navigate(PageNav::Smaller),
        KeyCode::Char('i') => state.update_view(ViewMessage::SortClicked(SortKey::Id)),
        KeyCode::Char('n') => state.update_view(ViewMessage::SortClicked(SortKey::Name)),
        KeyCode::Char('p') => state.update_view(ViewMessage::SortClicked(SortKey::Price)),
        KeyCode::Char('m') => state.update_view(ViewMessage::SortClicked(SortKey::Amount)),
        KeyCode::Char('a') => state.dialog = Some(RecordDialog::add()),
        KeyCode::Char('e') | KeyCode::Enter => open_for_selected(state, kind, RecordDialog::edit),
        KeyCode::Char('d') => open_for_selected(state, kind, RecordDialog::delete),
        _ => {}
    }
    KeyOutcome::Continue
}

fn open_for_selected(
    state: &mut UiState,
    kind: RecordKind,
    open: fn(&crate::model::Record) -> RecordDialog,
) {
    let dialog = state.selected_record().map(open);
    match dialog {
        Some(dialog) => state.dialog = Some(dialog),
        None => state.info = format!("No {} selected", kind.singular()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::DialogAction;
    use crate::model::Record;
    use crate::table::ViewState;
    use std::sync::Arc;

    fn press(state: &mut UiState, code: KeyCode) -> KeyOutcome {
        handle_key(state, KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_str(state: &mut UiState, s: &str) {
        for ch in s.chars() {
            press(state, KeyCode::Char(ch));
        }
    }

    fn loaded() -> UiState {
        let mut s = UiState::new(RecordKind::Stocks, ViewState::default(), false);
        let recs = vec![
            Record {
                id: 1,
                name: "Alpha".into(),
                price: "10.0000".into(),
                amount: "5".into(),
            },
            Record {
                id: 2,
                name: "Beta".into(),
                price: "20.0000".into(),
                amount: "3".into(),
            },
        ];
        s.apply_records(RecordKind::Stocks, Arc::new(recs), "t".into());
        s
    }

    fn ids(s: &UiState) -> Vec<u64> {
        s.table().unwrap().page().rows.iter().map(|r| r.id).collect()
    }

    #[test]
    fn typing_filters_on_every_key() {
        let mut s = loaded();
        press(&mut s, KeyCode::Char('/'));
        type_str(&mut s, "be");
        assert_eq!(ids(&s), vec![2]);
        press(&mut s, KeyCode::Backspace);
        press(&mut s, KeyCode::Backspace);
        assert_eq!(ids(&s), vec![1, 2]);
        type_str(&mut s, "zz");
        press(&mut s, KeyCode::Esc);
        assert!(!s.filter_editing);
        assert_eq!(ids(&s), vec![1, 2]);
    }

    #[test]
    fn sort_keys_cycle_direction() {
        let mut s = loaded();
        press(&mut s, KeyCode::Char('p'));
        assert_eq!(ids(&s), vec![1, 2]);
        press(&mut s, KeyCode::Char('p'));
        assert_eq!(ids(&s), vec![2, 1]);
    }

    #[test]
    fn add_dialog_emits_create_command() {
        let mut s = loaded();
        press(&mut s, KeyCode::Char('a'));
        type_str(&mut s, "Gamma");
        press(&mut s, KeyCode::Tab);
        type_str(&mut s, "1.5");
        press(&mut s, KeyCode::Tab);
        type_str(&mut s, "2");
        match press(&mut s, KeyCode::Enter) {
            KeyOutcome::Command(UiCommand::Apply(DialogAction::Create(r))) => {
                assert_eq!(r.name, "Gamma");
                assert_eq!(r.price, "1.5");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(s.dialog.is_none());
    }

    #[test]
    fn invalid_dialog_stays_open() {
        let mut s = loaded();
        press(&mut s, KeyCode::Char('a'));
        assert!(matches!(press(&mut s, KeyCode::Enter), KeyOutcome::Continue));
        assert!(s.dialog.is_some());
        assert_eq!(s.info, "3 field(s) need attention");
        press(&mut s, KeyCode::Esc);
        assert!(s.dialog.is_none());
        assert_eq!(s.info, "Cancelled");
    }

    #[test]
    fn delete_confirms_with_y() {
        let mut s = loaded();
        press(&mut s, KeyCode::Down);
        press(&mut s, KeyCode::Char('d'));
        // letters do not edit a delete dialog
        match press(&mut s, KeyCode::Char('y')) {
            KeyOutcome::Command(UiCommand::Apply(DialogAction::Delete(id))) => assert_eq!(id, 2),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn alert_swallows_keys_until_dismissed() {
        let mut s = loaded();
        s.alert = Some("Error occurred. Details: HttpErrorResponse boom".into());
        assert!(matches!(press(&mut s, KeyCode::Char('q')), KeyOutcome::Continue));
        press(&mut s, KeyCode::Enter);
        assert!(s.alert.is_none());
        assert!(matches!(press(&mut s, KeyCode::Char('q')), KeyOutcome::Quit));
    }

    #[test]
    fn tab_switch_selects_kind() {
        let mut s = loaded();
        match press(&mut s, KeyCode::Tab) {
            KeyOutcome::Command(UiCommand::SelectKind(RecordKind::Brokers)) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(matches!(press(&mut s, KeyCode::Tab), KeyOutcome::Continue));
        assert!(s.kind().is_none());
        assert!(matches!(
            press(&mut s, KeyCode::Tab),
            KeyOutcome::Command(UiCommand::SelectKind(RecordKind::Stocks))
        ));
    }

    #[test]
    fn edit_without_rows_reports() {
        let mut s = UiState::new(RecordKind::Brokers, ViewState::default(), false);
        press(&mut s, KeyCode::Char('e'));
        assert!(s.dialog.is_none());
        assert_eq!(s.info, "No broker selected");
    }
}
