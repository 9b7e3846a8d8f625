//! One subscription feeding both the list and the dashboard.

use crate::dashboard::DashboardStats;
use crate::list_model::ApplicationList;
use crate::live::Live;

pub type Tracker = Live<(ApplicationList, DashboardStats)>;

impl Live<(ApplicationList, DashboardStats)> {
    pub fn list(&self) -> &ApplicationList {
        &self.view().0
    }

    pub fn stats(&self) -> &DashboardStats {
        &self.view().1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{ApplicationFormController, delete_application};
    use crate::live::SyncState;
    use crate::models::Status;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn both_views_follow_one_subscription() {
        let store = MemoryStore::new();
        let mut tracker = Tracker::new();
        tracker.activate(&store, "u1").await.unwrap();
        assert_eq!(store.subscriber_count("u1"), 1);
        tracker.sync_pending();
        assert_eq!(tracker.state(), SyncState::Ready);
        assert!(!tracker.stats().has_data());

        let mut form = ApplicationFormController::new();
        for (name, status) in [("Acme", Status::Offer), ("Globex", Status::Rejected)] {
            form.open_for_create();
            form.set_name(name);
            form.set_position("Engineer");
            form.select_status(status);
            form.submit(&store, Some("u1")).await.unwrap();
        }
        tracker.sync_pending();
        assert_eq!(tracker.list().len(), 2);
        assert_eq!(tracker.stats().total(), 2);
        assert_eq!(tracker.stats().offers(), 1);

        let globex = tracker.list().filter("glo")[0].id.clone();
        delete_application(&store, Some("u1"), &globex).await.unwrap();
        // nothing changes until the store's notification is applied
        assert_eq!(tracker.list().len(), 2);
        tracker.sync_pending();
        assert_eq!(tracker.list().len(), 1);
        assert_eq!(tracker.stats().count(Status::Rejected), 0);
    }
}
