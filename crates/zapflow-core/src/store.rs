use crate::domain::{Contact, ContactId, ContactStatus};

/// Per-status tallies for progress and summary output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub sent: usize,
    pub skipped: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.sent + self.skipped + self.error
    }

    pub fn done(&self) -> usize {
        self.total() - self.pending
    }
}

/// Ordered contact list with mutable delivery status.
///
/// No transition rules live here; the queue only asks for
/// `pending -> sent|skipped|error`.
#[derive(Clone, Debug, Default)]
pub struct ContactStore {
    contacts: Vec<Contact>,
}

impl ContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace_all(&mut self, contacts: Vec<Contact>) {
        self.contacts = contacts;
    }

    /// Returns `false` when no record has `id`.
    pub fn update_status(&mut self, id: ContactId, status: ContactStatus) -> bool {
        match self.contacts.iter_mut().find(|c| c.id == id) {
            Some(c) => {
                c.status = status;
                true
            }
            None => false,
        }
    }

    pub fn all(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn get(&self, id: ContactId) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.id == id)
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for c in &self.contacts {
            match c.status {
                ContactStatus::Pending => counts.pending += 1,
                ContactStatus::Sent => counts.sent += 1,
                ContactStatus::Skipped => counts.skipped += 1,
                ContactStatus::Error => counts.error += 1,
            }
        }
        counts
    }
}
