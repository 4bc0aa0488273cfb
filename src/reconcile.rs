use crate::records::Student;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Replaced { index: usize },
    Unmatched,
}

impl Reconciled {
    pub fn matched(&self) -> bool {
        matches!(self, Reconciled::Replaced { .. })
    }
}

/// Puts `edited` in place of the first record sharing its identity key.
/// Order and length never change; an edit that matches nothing (or carries
/// no key at all) leaves `master` untouched.
pub fn reconcile(master: &mut [Student], edited: Student) -> Reconciled {
    let Some(key) = edited.identity_key() else {
        return Reconciled::Unmatched;
    };
    let Some(index) = master.iter().position(|s| s.identity_key() == Some(key)) else {
        return Reconciled::Unmatched;
    };
    master[index] = edited;
    Reconciled::Replaced { index }
}
