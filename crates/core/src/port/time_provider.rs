// Time Provider Port (for testability)

use chrono::{DateTime, Local, NaiveDateTime, Utc};

/// Clock interface (allows mocking in tests)
pub trait TimeProvider: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;

    /// Current wall-clock time in the user's timezone (season and business hours)
    fn local_now(&self) -> NaiveDateTime;
}

/// System clock (production)
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Settable clock. Local time is the UTC time without offset.
    pub struct FixedTimeProvider {
        now: Mutex<DateTime<Utc>>,
    }

    impl FixedTimeProvider {
        pub fn new(now: DateTime<Utc>) -> Self {
            Self {
                now: Mutex::new(now),
            }
        }

        pub fn set(&self, now: DateTime<Utc>) {
            *self.now.lock().unwrap() = now;
        }

        pub fn advance(&self, by: chrono::Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl TimeProvider for FixedTimeProvider {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }

        fn local_now(&self) -> NaiveDateTime {
            self.now.lock().unwrap().naive_utc()
        }
    }
}
