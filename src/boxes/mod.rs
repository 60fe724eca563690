//! Box scheduling and review notifications

pub mod notifications;
pub mod scheduler;

pub use notifications::{
    evaluate, DueFlags, NotificationGate, NotificationSink, NOTIFICATION_FIELDS,
};
pub use scheduler::{
    clamp_box, next_review_after, review_interval_days, BoxScheduler, BoxTransition, BOX_COUNT,
    FIRST_BOX, LAST_BOX,
};
