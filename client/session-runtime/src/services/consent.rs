use crate::models::Route;

/// Pre-interview acknowledgements. Both are required to start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsentForm {
    rules_accepted: bool,
    tracking_accepted: bool,
}

impl ConsentForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rules_accepted(&mut self, accepted: bool) {
        self.rules_accepted = accepted;
    }

    pub fn set_tracking_accepted(&mut self, accepted: bool) {
        self.tracking_accepted = accepted;
    }

    pub fn all_accepted(&self) -> bool {
        self.rules_accepted && self.tracking_accepted
    }

    pub fn start(&self) -> Option<Route> {
        self.all_accepted().then_some(Route::Interview)
    }

    pub fn decline(&self) -> Route {
        Route::Declined
    }
}
