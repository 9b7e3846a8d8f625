//! Aggregate counts for the dashboard chart.

use crate::live::{Live, Projection, SyncState};
use crate::models::{Snapshot, Status};

/// Totals recomputed from each snapshot.
///
/// Records whose status is `Unknown` count toward `total` but land in no
/// histogram bucket, so the bucket sum can be lower than the total.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardStats {
    total: usize,
    histogram: [usize; Status::ALL.len()],
}

impl Projection for DashboardStats {
    fn apply(&mut self, snapshot: &Snapshot) {
        let mut histogram = [0; Status::ALL.len()];
        for record in snapshot.records() {
            if let Some(i) = record.status.index() {
                histogram[i] += 1;
            }
        }
        self.total = snapshot.len();
        self.histogram = histogram;
    }
}

impl DashboardStats {
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn count(&self, status: Status) -> usize {
        status.index().map_or(0, |i| self.histogram[i])
    }

    pub fn offers(&self) -> usize {
        self.count(Status::Offer)
    }

    /// `(status, count)` for every known status, in chart order.
    pub fn histogram(&self) -> impl Iterator<Item = (Status, usize)> + '_ {
        Status::ALL.into_iter().zip(self.histogram.iter().copied())
    }

    pub fn bucket_sum(&self) -> usize {
        self.histogram.iter().sum()
    }

    /// Parallel label and count sequences for a proportional chart.
    pub fn chart_series(&self) -> (Vec<&'static str>, Vec<usize>) {
        self.histogram().map(|(status, n)| (status.label(), n)).unzip()
    }

    /// Whether there is anything to chart; otherwise show the empty state.
    pub fn has_data(&self) -> bool {
        self.total > 0
    }
}

/// Dashboard counts kept live against one user's collection.
pub type DashboardAggregator = Live<DashboardStats>;

impl Live<DashboardStats> {
    pub fn is_loading(&self) -> bool {
        self.state() == SyncState::Loading
    }

    pub fn stats(&self) -> &DashboardStats {
        self.view()
    }
}
