pub mod ms {
    pub const POLL_INTERVAL: u64 = 100;
    pub const WINDOW_CLOSE_POLL: u64 = 500;
    pub const LOGIN_POLL_INTERVAL: u64 = 1500;
    pub const NAVIGATION: u64 = 30_000;
}

pub mod secs {
    pub const LOGIN_NAVIGATION: u64 = 30;
    pub const LOGIN_CEILING: u64 = 300;
    pub const REQUEST: u64 = 120;
}
