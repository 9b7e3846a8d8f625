//! The searchable application list.

use crate::error::LookupError;
use crate::live::{Live, Projection};
use crate::models::{ApplicationRecord, Snapshot};

/// Records in store order (date descending), replaced on every snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationList {
    records: Vec<ApplicationRecord>,
}

impl Projection for ApplicationList {
    fn apply(&mut self, snapshot: &Snapshot) {
        self.records = snapshot.records();
    }
}

impl ApplicationList {
    pub fn records(&self) -> &[ApplicationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ApplicationRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Finds a record by full id or by a unique id prefix.
    pub fn resolve(&self, id_or_prefix: &str) -> Result<&ApplicationRecord, LookupError> {
        if let Some(exact) = self.get(id_or_prefix) {
            return Ok(exact);
        }
        let mut matches = self.records.iter().filter(|r| !id_or_prefix.is_empty() && r.id.starts_with(id_or_prefix));
        match (matches.next(), matches.count()) {
            (Some(record), 0) => Ok(record),
            (Some(_), rest) => Err(LookupError::Ambiguous {
                prefix: id_or_prefix.to_string(),
                matches: rest + 1,
            }),
            (None, _) => Err(LookupError::NotFound(id_or_prefix.to_string())),
        }
    }

    /// Records whose name contains `query`, ignoring case, in list order.
    /// An empty query returns every record.
    pub fn filter(&self, query: &str) -> Vec<&ApplicationRecord> {
        let needle = query.to_lowercase();
        self.records.iter().filter(|r| r.matches(&needle)).collect()
    }
}

/// The list kept live against one user's collection.
pub type ApplicationListModel = Live<ApplicationList>;

impl Live<ApplicationList> {
    pub fn records(&self) -> &[ApplicationRecord] {
        self.view().records()
    }

    pub fn filter(&self, query: &str) -> Vec<&ApplicationRecord> {
        self.view().filter(query)
    }

    pub fn get(&self, id: &str) -> Option<&ApplicationRecord> {
        self.view().get(id)
    }

    pub fn resolve(&self, id_or_prefix: &str) -> Result<&ApplicationRecord, LookupError> {
        self.view().resolve(id_or_prefix)
    }
}
